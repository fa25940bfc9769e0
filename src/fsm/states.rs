//! Concrete state handler functions and table builder.
//!
//! Each state is three plain `fn` pointers.  Handlers only read the event
//! and the context; every transport request goes through the context's
//! action queue.
//!
//! ```text
//!  DISCONNECTED ──[connect]──▶ CONNECTING ──[connected]──▶ DISCOVERING
//!                                                               │
//!                                               [services found]│
//!                                                               ▼
//!  READY ◀──[CCCD written]── SUBSCRIBING ◀──[last step ok]── HANDSHAKE
//!    │                                                     (one write at
//!    └──[app disconnect]──▶ DISCONNECTED                    a time)
//!
//!  Any active state ──[link lost | error | write refused]──▶ FAILED
//! ```

use super::context::{SessionContext, TransportAction};
use super::{ConnectionState, StateDescriptor};
use crate::app::events::ProtocolEvent;
use crate::app::ports::{CharacteristicRef, GattService, TransportEvent};
use crate::error::FailureReason;
use crate::protocol::responses::Response;
use crate::session::{CommandEncoder, ConnectionSession};
use log::{debug, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once per state machine.
pub fn build_state_table() -> [StateDescriptor; ConnectionState::COUNT] {
    [
        // Index 0: Disconnected
        StateDescriptor {
            id: ConnectionState::Disconnected,
            name: "Disconnected",
            on_enter: Some(disconnected_enter),
            on_exit: None,
            on_event: ignore_event,
        },
        // Index 1: Connecting
        StateDescriptor {
            id: ConnectionState::Connecting,
            name: "Connecting",
            on_enter: Some(connecting_enter),
            on_exit: None,
            on_event: connecting_event,
        },
        // Index 2: DiscoveringControlService
        StateDescriptor {
            id: ConnectionState::DiscoveringControlService,
            name: "DiscoveringControlService",
            on_enter: Some(discovering_enter),
            on_exit: None,
            on_event: discovering_event,
        },
        // Index 3: RunningHandshake
        StateDescriptor {
            id: ConnectionState::RunningHandshake,
            name: "RunningHandshake",
            on_enter: Some(handshake_enter),
            on_exit: None,
            on_event: handshake_event,
        },
        // Index 4: SubscribingNotifications
        StateDescriptor {
            id: ConnectionState::SubscribingNotifications,
            name: "SubscribingNotifications",
            on_enter: Some(subscribing_enter),
            on_exit: None,
            on_event: subscribing_event,
        },
        // Index 5: Ready
        StateDescriptor {
            id: ConnectionState::Ready,
            name: "Ready",
            on_enter: Some(ready_enter),
            on_exit: Some(ready_exit),
            on_event: ready_event,
        },
        // Index 6: Failed
        StateDescriptor {
            id: ConnectionState::Failed,
            name: "Failed",
            on_enter: Some(failed_enter),
            on_exit: None,
            on_event: ignore_event,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared guards
// ═══════════════════════════════════════════════════════════════════════════

/// Link loss and controller errors end the session from any active state.
fn link_lost(ctx: &mut SessionContext, event: &TransportEvent) -> Option<ConnectionState> {
    match event {
        TransportEvent::Disconnected => {
            warn!("Session: link dropped");
            ctx.fail(FailureReason::TransportDisconnected);
            Some(ConnectionState::Failed)
        }
        TransportEvent::Error(code) => {
            warn!("Session: transport error {code}");
            ctx.fail(FailureReason::TransportError(*code));
            Some(ConnectionState::Failed)
        }
        _ => None,
    }
}

fn ignore_event(_ctx: &mut SessionContext, event: &TransportEvent) -> Option<ConnectionState> {
    debug!("Session: ignoring {event:?} while inactive");
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISCONNECTED state
// ═══════════════════════════════════════════════════════════════════════════

fn disconnected_enter(ctx: &mut SessionContext) {
    ctx.session = None;
    ctx.handshake_step = 0;
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTING state
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_enter(ctx: &mut SessionContext) {
    ctx.session = Some(ConnectionSession::new(ctx.variant, &ctx.config));
    ctx.handshake_step = 0;
    ctx.failure = None;
    info!("Session: connecting ({})", ctx.variant.name);
    ctx.push_action(TransportAction::Connect);
}

fn connecting_event(ctx: &mut SessionContext, event: &TransportEvent) -> Option<ConnectionState> {
    if let Some(next) = link_lost(ctx, event) {
        return Some(next);
    }
    match event {
        TransportEvent::Connected => Some(ConnectionState::DiscoveringControlService),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISCOVERING state
// ═══════════════════════════════════════════════════════════════════════════

fn discovering_enter(ctx: &mut SessionContext) {
    ctx.push_action(TransportAction::DiscoverServices);
}

fn discovering_event(ctx: &mut SessionContext, event: &TransportEvent) -> Option<ConnectionState> {
    if let Some(next) = link_lost(ctx, event) {
        return Some(next);
    }
    let TransportEvent::ServicesDiscovered(services) = event else {
        return None;
    };

    if let Err(reason) = check_services(ctx, services) {
        warn!("Session: discovery incomplete: {reason}");
        ctx.fail(reason);
        return Some(ConnectionState::Failed);
    }

    debug!("Session: {} services discovered", services.len());
    if ctx.variant.handshake.is_empty() {
        Some(ConnectionState::SubscribingNotifications)
    } else {
        Some(ConnectionState::RunningHandshake)
    }
}

/// Every handshake characteristic plus the command and response
/// characteristics must be present under their services.
fn check_services(ctx: &SessionContext, services: &[GattService]) -> Result<(), FailureReason> {
    let variant = ctx.variant;
    for service in variant.required_services() {
        if !services.iter().any(|s| s.uuid == service) {
            return Err(FailureReason::MissingService(service));
        }
    }

    let control = [ctx.command_target(), ctx.response_target()];
    let required = variant
        .handshake
        .iter()
        .map(|step| CharacteristicRef {
            service: step.service,
            characteristic: step.characteristic,
        })
        .chain(control);

    for target in required {
        let found = services
            .iter()
            .filter(|s| s.uuid == target.service)
            .any(|s| s.characteristics.contains(&target.characteristic));
        if !found {
            return Err(FailureReason::MissingCharacteristic(target.characteristic));
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
//  HANDSHAKE state
// ═══════════════════════════════════════════════════════════════════════════

fn handshake_enter(ctx: &mut SessionContext) {
    ctx.handshake_step = 0;
    write_current_step(ctx);
}

fn handshake_event(ctx: &mut SessionContext, event: &TransportEvent) -> Option<ConnectionState> {
    if let Some(next) = link_lost(ctx, event) {
        return Some(next);
    }
    let step = ctx.current_step()?;

    match event {
        TransportEvent::CharacteristicWritten { characteristic }
            if *characteristic == step.characteristic =>
        {
            info!("Handshake: step {} ({}) confirmed", ctx.handshake_step, step.name);
            ctx.handshake_step += 1;
            if ctx.current_step().is_some() {
                write_current_step(ctx);
                None
            } else {
                Some(ConnectionState::SubscribingNotifications)
            }
        }
        TransportEvent::WriteFailed { characteristic, error }
            if *characteristic == step.characteristic =>
        {
            warn!(
                "Handshake: step {} ({}) failed: {error}",
                ctx.handshake_step, step.name
            );
            ctx.fail(FailureReason::HandshakeStepFailed {
                step: ctx.handshake_step,
            });
            Some(ConnectionState::Failed)
        }
        TransportEvent::CharacteristicWritten { characteristic }
        | TransportEvent::WriteFailed { characteristic, .. } => {
            debug!("Handshake: ignoring write result for 0x{characteristic:032x}");
            None
        }
        _ => None,
    }
}

fn write_current_step(ctx: &mut SessionContext) {
    let Some(step) = ctx.current_step() else {
        return;
    };
    info!(
        "Handshake: step {} ({}) writing {} bytes",
        ctx.handshake_step,
        step.name,
        step.payload.len()
    );
    ctx.push_action(TransportAction::WriteCharacteristic {
        target: CharacteristicRef {
            service: step.service,
            characteristic: step.characteristic,
        },
        data: step.payload.to_vec(),
    });
}

// ═══════════════════════════════════════════════════════════════════════════
//  SUBSCRIBING state
// ═══════════════════════════════════════════════════════════════════════════

fn subscribing_enter(ctx: &mut SessionContext) {
    let target = ctx.response_target();
    debug!("Session: enabling notifications on 0x{:032x}", target.characteristic);
    let data = ctx.config.notification_enable.to_vec();
    ctx.push_action(TransportAction::WriteDescriptor { target, data });
}

fn subscribing_event(ctx: &mut SessionContext, event: &TransportEvent) -> Option<ConnectionState> {
    if let Some(next) = link_lost(ctx, event) {
        return Some(next);
    }
    let response = ctx.variant.response_characteristic;
    match event {
        TransportEvent::DescriptorWritten { characteristic } if *characteristic == response => {
            Some(ConnectionState::Ready)
        }
        TransportEvent::WriteFailed { characteristic, error } if *characteristic == response => {
            warn!("Session: subscription failed: {error}");
            ctx.fail(FailureReason::SubscriptionFailed);
            Some(ConnectionState::Failed)
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  READY state
// ═══════════════════════════════════════════════════════════════════════════

fn ready_enter(ctx: &mut SessionContext) {
    info!("Session: ready ({})", ctx.variant.name);
    if !ctx.config.baseline_query {
        return;
    }

    let variant = ctx.variant;
    let target = ctx.command_target();
    let reset_timeout = ctx.config.reset_timeout;
    let Some(session) = ctx.session.as_mut() else {
        return;
    };
    match CommandEncoder::build_command(session, &variant.baseline_query, reset_timeout) {
        Ok(cmd) => ctx.actions.push(TransportAction::WriteCharacteristic {
            target,
            data: cmd.bytes,
        }),
        Err(e) => warn!("Session: baseline query not sent: {e}"),
    }
}

fn ready_exit(ctx: &mut SessionContext) {
    if let Some(session) = ctx.session.as_ref() {
        let outstanding = session.pending_acks().outstanding();
        if outstanding > 0 {
            debug!("Session: leaving Ready with {outstanding} unacknowledged commands");
        }
    }
}

fn ready_event(ctx: &mut SessionContext, event: &TransportEvent) -> Option<ConnectionState> {
    if let Some(next) = link_lost(ctx, event) {
        return Some(next);
    }
    match event {
        TransportEvent::Notification { characteristic, data }
            if *characteristic == ctx.variant.response_characteristic =>
        {
            let events = &mut ctx.events;
            if let Some(session) = ctx.session.as_mut() {
                session.receive(data, |item| {
                    events.push(match item {
                        Ok(response) => ProtocolEvent::Response(response),
                        Err(error) => ProtocolEvent::FrameError(error),
                    });
                });
            }
        }
        TransportEvent::Notification { characteristic, data }
            if Some(*characteristic) == ctx.variant.rssi_characteristic =>
        {
            if let Some(&raw) = data.first() {
                ctx.push_event(ProtocolEvent::Response(Response::SignalStrength(raw as i8)));
            }
        }
        TransportEvent::WriteFailed { characteristic, error } => {
            // Commands are at-most-once; a lost write is not fatal.
            warn!("Session: write to 0x{characteristic:032x} failed: {error}");
        }
        _ => {}
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  FAILED state
// ═══════════════════════════════════════════════════════════════════════════

fn failed_enter(ctx: &mut SessionContext) {
    let reason = ctx.failure.take().unwrap_or(FailureReason::TransportDisconnected);
    warn!("Session: failed: {reason}");

    ctx.session = None;
    ctx.handshake_step = 0;
    if reason != FailureReason::TransportDisconnected {
        ctx.push_action(TransportAction::Disconnect);
    }
    ctx.push_event(ProtocolEvent::Disconnected { reason });
}
