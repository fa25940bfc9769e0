//! Per-connection protocol state.
//!
//! A [`ConnectionSession`] is created when the handshake starts and dropped
//! on disconnect.  It owns everything that must not outlive one link: the
//! sequence counter, the table of commands awaiting acknowledgment and the
//! reassembly buffer.

pub mod dispatcher;
pub mod encoder;
pub mod reassembler;

use crate::config::EngineConfig;
use crate::error::FrameError;
use crate::protocol::responses::Response;
use crate::protocol::variant::ProtocolVariant;

use reassembler::ResponseReassembler;

pub use dispatcher::ResponseDispatcher;
pub use encoder::{CommandEncoder, EncodedCommand};
pub use reassembler::Reassembly;

/// Session-scoped sequence numbers, wrapping at 256.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCounter {
    next: u8,
}

impl SequenceCounter {
    /// The number the next command will carry.
    pub fn peek(&self) -> u8 {
        self.next
    }

    pub fn advance(&mut self) -> u8 {
        let current = self.next;
        self.next = self.next.wrapping_add(1);
        current
    }
}

/// `(device id, command id)` of each synchronous command, by sequence.
///
/// Classic acknowledgments echo only the sequence number, so this is how
/// the dispatcher learns which decoder applies.  A slot is overwritten
/// when its sequence number comes round again.
pub struct PendingAcks {
    slots: [Option<(u8, u8)>; 256],
}

impl PendingAcks {
    pub fn new() -> Self {
        Self { slots: [None; 256] }
    }

    pub fn record(&mut self, sequence: u8, target: u8, command: u8) {
        self.slots[sequence as usize] = Some((target, command));
    }

    pub fn take(&mut self, sequence: u8) -> Option<(u8, u8)> {
        self.slots[sequence as usize].take()
    }

    pub fn outstanding(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for PendingAcks {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ConnectionSession {
    variant: &'static ProtocolVariant,
    pub(crate) sequence: SequenceCounter,
    pub(crate) pending: PendingAcks,
    pub(crate) reassembler: ResponseReassembler,
}

impl ConnectionSession {
    pub fn new(variant: &'static ProtocolVariant, config: &EngineConfig) -> Self {
        Self {
            variant,
            sequence: SequenceCounter::default(),
            pending: PendingAcks::new(),
            reassembler: ResponseReassembler::new(
                variant.framing,
                variant.prompt_artifacts,
                config.reassembly_ceiling,
            ),
        }
    }

    pub fn variant(&self) -> &'static ProtocolVariant {
        self.variant
    }

    pub fn next_sequence(&self) -> u8 {
        self.sequence.peek()
    }

    pub fn pending_acks(&self) -> &PendingAcks {
        &self.pending
    }

    pub fn buffered_bytes(&self) -> usize {
        self.reassembler.len()
    }

    /// Feed one notification chunk through reassembly and dispatch.
    ///
    /// `on_item` runs once per candidate frame, in arrival order, before
    /// this call returns.
    pub fn receive(&mut self, chunk: &[u8], mut on_item: impl FnMut(Result<Response, FrameError>)) {
        let variant = self.variant;
        let pending = &mut self.pending;
        self.reassembler.feed(chunk, |item| match item {
            Reassembly::Frame(bytes) => on_item(ResponseDispatcher::decode(variant, pending, bytes)),
            Reassembly::Overflow { discarded } => {
                on_item(Err(FrameError::BufferOverflow { discarded }));
            }
        });
    }
}
