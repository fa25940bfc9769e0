//! BLE protocol engine for Sphero robots.
//!
//! Frames commands, reassembles and decodes responses, and drives the
//! connection handshake for both device families.  The BLE stack itself
//! plugs in through the port traits in [`app::ports`].
//!
//! ```text
//!   protocol/   codec · commands · registry · responses · variants
//!   session/    sequence numbers · reassembly · encode · dispatch
//!   fsm/        connection lifecycle table
//!   app/        ConnectionStateMachine + ports
//! ```

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod protocol;
pub mod session;

pub use app::events::ProtocolEvent;
pub use app::ports::{CharacteristicRef, EventSink, GattService, GattTransport, TransportEvent};
pub use app::service::ConnectionStateMachine;
pub use config::EngineConfig;
pub use fsm::ConnectionState;
pub use protocol::{Command, ProtocolVariant, Response, SPHERO_CLASSIC, SPHERO_V2};
