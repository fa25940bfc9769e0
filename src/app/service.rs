//! Connection service, the hexagonal core.
//!
//! [`ConnectionStateMachine`] owns the FSM and the session context.  All
//! I/O flows through port traits injected at call sites, so the whole
//! lifecycle runs against mock adapters in tests.
//!
//! ```text
//!  TransportEvent ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                     │  ConnectionStateMachine  │
//!   GattTransport ◀── │  FSM · Session · Codec   │
//!                     └──────────────────────────┘
//! ```
//!
//! Every entry point runs the FSM, applies the queued transport actions,
//! then emits the queued events.  Transport writes therefore always go out
//! before the application hears about the state that caused them.

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{FailureReason, SessionError};
use crate::fsm::context::{SessionContext, TransportAction};
use crate::fsm::states::build_state_table;
use crate::fsm::{ConnectionState, Fsm};
use crate::protocol::commands::Command;
use crate::protocol::variant::ProtocolVariant;
use crate::session::{CommandEncoder, ConnectionSession, EncodedCommand};

use super::ports::{EventSink, GattTransport, TransportEvent};

// ───────────────────────────────────────────────────────────────
// ConnectionStateMachine
// ───────────────────────────────────────────────────────────────

/// Drives one device from discovery to `Ready` and routes its traffic.
pub struct ConnectionStateMachine {
    fsm: Fsm,
    ctx: SessionContext,
}

impl ConnectionStateMachine {
    /// Build an idle machine for `variant`.
    ///
    /// An invalid `config` is replaced by [`EngineConfig::default`].
    pub fn new(variant: &'static ProtocolVariant, config: EngineConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!("Session: rejecting config ({e}), using defaults");
                EngineConfig::default()
            }
        };

        let mut ctx = SessionContext::new(variant, config);
        let mut fsm = Fsm::new(build_state_table(), ConnectionState::Disconnected);
        fsm.start(&mut ctx);
        Self { fsm, ctx }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start connecting.  Only valid from `Disconnected` or `Failed`;
    /// there is no automatic reconnect, so a supervisor calls this again
    /// after a failure.
    pub fn connect(&mut self, transport: &mut impl GattTransport, sink: &mut impl EventSink) {
        let state = self.fsm.current_state();
        if state.is_active() {
            warn!("Session: connect ignored in {state:?}");
            return;
        }
        self.fsm.force_transition(ConnectionState::Connecting, &mut self.ctx);
        self.flush(transport, sink);
    }

    /// Tear the link down on request.  No `Disconnected` failure event is
    /// emitted; the state change is the notification.
    pub fn disconnect(&mut self, transport: &mut impl GattTransport, sink: &mut impl EventSink) {
        if !self.fsm.current_state().is_active() {
            return;
        }
        info!("Session: disconnect requested");
        self.ctx.push_action(TransportAction::Disconnect);
        self.fsm.force_transition(ConnectionState::Disconnected, &mut self.ctx);
        self.flush(transport, sink);
    }

    /// Feed one callback from the BLE stack.
    pub fn handle_event(
        &mut self,
        event: TransportEvent,
        transport: &mut impl GattTransport,
        sink: &mut impl EventSink,
    ) {
        self.fsm.handle(&mut self.ctx, &event);
        self.flush(transport, sink);
    }

    // ── Commands ──────────────────────────────────────────────

    /// Encode and write a catalog command.  Returns its sequence number.
    pub fn send(
        &mut self,
        command: &Command,
        transport: &mut impl GattTransport,
    ) -> Result<u8, SessionError> {
        let reset_timeout = self.ctx.config.reset_timeout;
        let session = self.ready_session()?;
        let encoded = CommandEncoder::build_command(session, command, reset_timeout)?;
        self.write_command(encoded, transport)
    }

    /// Encode and write an arbitrary `(target, command)` pair.
    pub fn send_raw(
        &mut self,
        target: u8,
        command: u8,
        payload: &[u8],
        synchronous: bool,
        transport: &mut impl GattTransport,
    ) -> Result<u8, SessionError> {
        let reset_timeout = self.ctx.config.reset_timeout;
        let session = self.ready_session()?;
        let encoded =
            CommandEncoder::build(session, target, command, payload, synchronous, reset_timeout)?;
        self.write_command(encoded, transport)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.fsm.current_state()
    }

    pub fn variant(&self) -> &'static ProtocolVariant {
        self.ctx.variant
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// The live session, from `Connecting` until teardown.
    pub fn session(&self) -> Option<&ConnectionSession> {
        self.ctx.session.as_ref()
    }

    // ── Internal ──────────────────────────────────────────────

    fn ready_session(&mut self) -> Result<&mut ConnectionSession, SessionError> {
        if self.fsm.current_state() != ConnectionState::Ready {
            return Err(SessionError::NotReady);
        }
        self.ctx.session.as_mut().ok_or(SessionError::NotReady)
    }

    fn write_command(
        &mut self,
        encoded: EncodedCommand,
        transport: &mut impl GattTransport,
    ) -> Result<u8, SessionError> {
        transport
            .write_characteristic(self.ctx.command_target(), &encoded.bytes)
            .map_err(|e| {
                warn!("Session: {} (seq {}) not written: {e}", encoded.name, encoded.sequence);
                e
            })?;
        Ok(encoded.sequence)
    }

    /// Apply queued actions until none remain, then emit queued events.
    fn flush(&mut self, transport: &mut impl GattTransport, sink: &mut impl EventSink) {
        while !self.ctx.actions.is_empty() {
            let action = self.ctx.actions.remove(0);
            self.apply(action, transport);
        }
        for event in self.ctx.events.drain(..) {
            sink.emit(&event);
        }
    }

    /// Synchronous write failures are replayed as `WriteFailed` so the
    /// current state decides what they mean.
    fn apply(&mut self, action: TransportAction, transport: &mut impl GattTransport) {
        let result = match &action {
            TransportAction::Connect => transport.connect(),
            TransportAction::DiscoverServices => transport.discover_services(),
            TransportAction::WriteCharacteristic { target, data } => {
                transport.write_characteristic(*target, data)
            }
            TransportAction::WriteDescriptor { target, data } => {
                transport.write_descriptor(*target, data)
            }
            TransportAction::Disconnect => transport.disconnect(),
        };

        let Err(error) = result else {
            return;
        };

        match action {
            TransportAction::WriteCharacteristic { target, .. }
            | TransportAction::WriteDescriptor { target, .. } => {
                let event = TransportEvent::WriteFailed {
                    characteristic: target.characteristic,
                    error,
                };
                self.fsm.handle(&mut self.ctx, &event);
            }
            TransportAction::Connect | TransportAction::DiscoverServices => {
                warn!("Session: {action:?} failed to start: {error}");
                self.ctx.fail(FailureReason::Transport(error));
                self.fsm.force_transition(ConnectionState::Failed, &mut self.ctx);
            }
            TransportAction::Disconnect => {
                debug!("Session: disconnect returned {error}");
            }
        }
    }
}
