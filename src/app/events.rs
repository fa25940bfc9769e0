//! Outbound application events.
//!
//! The [`ConnectionStateMachine`](super::service::ConnectionStateMachine)
//! emits these through the [`EventSink`](super::ports::EventSink) port.

use crate::error::{FailureReason, FrameError};
use crate::fsm::ConnectionState;
use crate::protocol::responses::Response;

/// Structured events produced for the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// The FSM transitioned between states.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// A decoded response or notification.
    Response(Response),

    /// One inbound frame was dropped.  The session keeps running.
    FrameError(FrameError),

    /// The session ended.  Emitted exactly once per failure.
    Disconnected { reason: FailureReason },
}
