//! Shared mutable context threaded through every FSM handler.
//!
//! `SessionContext` is the blackboard state handlers read from and write
//! to: the device family, the engine configuration, the live
//! [`ConnectionSession`] and two outboxes.  Handlers never call the
//! transport.  They queue [`TransportAction`]s and [`ProtocolEvent`]s here
//! and the service drains both after every step.

use crate::app::events::ProtocolEvent;
use crate::app::ports::CharacteristicRef;
use crate::config::EngineConfig;
use crate::error::FailureReason;
use crate::protocol::variant::{HandshakeStep, ProtocolVariant};
use crate::session::ConnectionSession;

// ---------------------------------------------------------------------------
// Transport actions (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

/// A request for the GATT transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAction {
    Connect,
    DiscoverServices,
    WriteCharacteristic { target: CharacteristicRef, data: Vec<u8> },
    /// Write the client characteristic configuration descriptor.
    WriteDescriptor { target: CharacteristicRef, data: Vec<u8> },
    Disconnect,
}

// ---------------------------------------------------------------------------
// Top-level context
// ---------------------------------------------------------------------------

pub struct SessionContext {
    pub variant: &'static ProtocolVariant,
    pub config: EngineConfig,

    /// Present from `Connecting` until the link is torn down.
    pub session: Option<ConnectionSession>,

    /// Index of the handshake write awaiting confirmation.
    pub handshake_step: usize,

    /// Set by whichever handler sends the FSM to `Failed`; consumed on entry.
    pub failure: Option<FailureReason>,

    /// Outbound transport requests, in order.
    pub actions: Vec<TransportAction>,
    /// Outbound application events, in order.
    pub events: Vec<ProtocolEvent>,
}

impl SessionContext {
    pub fn new(variant: &'static ProtocolVariant, config: EngineConfig) -> Self {
        Self {
            variant,
            config,
            session: None,
            handshake_step: 0,
            failure: None,
            actions: Vec::new(),
            events: Vec::new(),
        }
    }

    /// The handshake step currently awaiting confirmation, if any remain.
    pub fn current_step(&self) -> Option<&'static HandshakeStep> {
        self.variant.handshake.get(self.handshake_step)
    }

    /// Record why the session is about to fail.  The first reason wins.
    pub fn fail(&mut self, reason: FailureReason) {
        if self.failure.is_none() {
            self.failure = Some(reason);
        }
    }

    pub fn command_target(&self) -> CharacteristicRef {
        CharacteristicRef {
            service: self.variant.control_service,
            characteristic: self.variant.command_characteristic,
        }
    }

    pub fn response_target(&self) -> CharacteristicRef {
        CharacteristicRef {
            service: self.variant.control_service,
            characteristic: self.variant.response_characteristic,
        }
    }

    pub fn push_action(&mut self, action: TransportAction) {
        self.actions.push(action);
    }

    pub fn push_event(&mut self, event: ProtocolEvent) {
        self.events.push(event);
    }
}
