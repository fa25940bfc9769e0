//! Function-pointer finite state machine for one BLE session.
//!
//! Classic table-driven FSM: one row per connection state.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                        │
//! │  ┌──────────────────────────┬──────────┬─────────┬───────────────┐ │
//! │  │ ConnectionState          │ on_enter │ on_exit │ on_event      │ │
//! │  ├──────────────────────────┼──────────┼─────────┼───────────────┤ │
//! │  │ Disconnected             │ fn(ctx)  │         │ fn(ctx, ev)   │ │
//! │  │ Connecting               │ fn(ctx)  │         │ fn(ctx, ev)   │ │
//! │  │ DiscoveringControlService│ fn(ctx)  │         │ fn(ctx, ev)   │ │
//! │  │ RunningHandshake         │ fn(ctx)  │         │ fn(ctx, ev)   │ │
//! │  │ SubscribingNotifications │ fn(ctx)  │         │ fn(ctx, ev)   │ │
//! │  │ Ready                    │ fn(ctx)  │ fn(ctx) │ fn(ctx, ev)   │ │
//! │  │ Failed                   │ fn(ctx)  │         │ fn(ctx, ev)   │ │
//! │  └──────────────────────────┴──────────┴─────────┴───────────────┘ │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each transport event is passed to `on_event` of the **current** state.
//! If it returns `Some(next)`, the engine runs `on_exit` for the current
//! state, records a `StateChanged` event, then runs `on_enter` for the
//! next.  Handlers never touch the transport; they queue
//! [`TransportAction`](context::TransportAction)s on the context and the
//! service applies them.

pub mod context;
pub mod states;

use context::SessionContext;
use log::info;

use crate::app::events::ProtocolEvent;
use crate::app::ports::TransportEvent;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Lifecycle of one connection.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    DiscoveringControlService = 2,
    RunningHandshake = 3,
    SubscribingNotifications = 4,
    Ready = 5,
    /// Terminal until the caller asks to connect again.
    Failed = 6,
}

impl ConnectionState {
    /// Total number of states, sizes the table array.
    pub const COUNT: usize = 7;

    /// Convert a table index back to a state.  Out-of-range indices map
    /// to `Failed`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::DiscoveringControlService,
            3 => Self::RunningHandshake,
            4 => Self::SubscribingNotifications,
            5 => Self::Ready,
            6 => Self::Failed,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Failed
            }
        }
    }

    /// A link exists or is being set up.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut SessionContext);

/// Signature for the per-event handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateEventFn = fn(&mut SessionContext, &TransportEvent) -> Option<ConnectionState>;

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: ConnectionState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_event: StateEventFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `ConnectionState as usize`.
    table: [StateDescriptor; ConnectionState::COUNT],
    current: usize,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; ConnectionState::COUNT], initial: ConnectionState) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    pub fn start(&mut self, ctx: &mut SessionContext) {
        info!("Session: FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Deliver one transport event to the current state.
    pub fn handle(&mut self, ctx: &mut SessionContext, event: &TransportEvent) {
        if let Some(next) = (self.table[self.current].on_event)(ctx, event) {
            self.transition(next, ctx);
        }
    }

    /// Force an immediate transition (application connect/disconnect,
    /// synchronous transport failures).
    pub fn force_transition(&mut self, next: ConnectionState, ctx: &mut SessionContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> ConnectionState {
        ConnectionState::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: ConnectionState, ctx: &mut SessionContext) {
        let from = self.current_state();
        let next_idx = next as usize;

        info!(
            "Session: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        ctx.events.push(ProtocolEvent::StateChanged { from, to: next });

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
