//! Port traits: the boundary between the protocol engine and the BLE stack.
//!
//! ```text
//!   GATT adapter ──▶ TransportEvent ──▶ ConnectionStateMachine ──▶ EventSink
//!        ▲                                        │
//!        └──────────── GattTransport ◀────────────┘
//! ```
//!
//! The platform BLE stack implements [`GattTransport`] and turns its own
//! callbacks into [`TransportEvent`]s.  The application implements
//! [`EventSink`] (or hands over an `mpsc::Sender`).  Nothing in the engine
//! depends on a concrete radio.

use std::sync::mpsc::Sender;

use log::warn;

use super::events::ProtocolEvent;
use crate::error::TransportError;

// ───────────────────────────────────────────────────────────────
// GATT addressing
// ───────────────────────────────────────────────────────────────

/// A characteristic under a specific service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicRef {
    pub service: u128,
    pub characteristic: u128,
}

/// One service as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: u128,
    pub characteristics: Vec<u128>,
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: engine → radio)
// ───────────────────────────────────────────────────────────────

/// Asynchronous GATT primitives.
///
/// Each call only starts the operation.  Completion arrives later as a
/// [`TransportEvent`] fed back through
/// [`ConnectionStateMachine::handle_event`](super::service::ConnectionStateMachine::handle_event).
/// An `Err` means the operation never started.
pub trait GattTransport {
    fn connect(&mut self) -> Result<(), TransportError>;

    fn discover_services(&mut self) -> Result<(), TransportError>;

    /// Write with response; completion is `CharacteristicWritten` or `WriteFailed`.
    fn write_characteristic(
        &mut self,
        target: CharacteristicRef,
        data: &[u8],
    ) -> Result<(), TransportError>;

    /// Write the characteristic's client configuration descriptor.
    fn write_descriptor(
        &mut self,
        target: CharacteristicRef,
        data: &[u8],
    ) -> Result<(), TransportError>;

    fn disconnect(&mut self) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Transport events (driving adapter: radio → engine)
// ───────────────────────────────────────────────────────────────

/// Everything the BLE stack can report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    ServicesDiscovered(Vec<GattService>),
    CharacteristicWritten { characteristic: u128 },
    DescriptorWritten { characteristic: u128 },
    WriteFailed { characteristic: u128, error: TransportError },
    /// One notification chunk, in arrival order.
    Notification { characteristic: u128, data: Vec<u8> },
    Disconnected,
    /// Controller or service error code.
    Error(i32),
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: engine → application)
// ───────────────────────────────────────────────────────────────

/// The engine emits [`ProtocolEvent`]s through this port, in order and
/// at most once each.
pub trait EventSink {
    fn emit(&mut self, event: &ProtocolEvent);
}

/// Channel delivery.  A hung-up receiver drops events.
impl EventSink for Sender<ProtocolEvent> {
    fn emit(&mut self, event: &ProtocolEvent) {
        if self.send(event.clone()).is_err() {
            warn!("Session: event receiver gone, dropping {event:?}");
        }
    }
}

/// Collects every event; handy for callers that poll.
impl EventSink for Vec<ProtocolEvent> {
    fn emit(&mut self, event: &ProtocolEvent) {
        self.push(event.clone());
    }
}
