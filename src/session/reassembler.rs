//! Response reassembly: notification chunks in, candidate frames out.
//!
//! The radio delivers inbound frames split across notifications of
//! arbitrary size and occasionally interleaves non-frame bytes.  The
//! reassembler accumulates chunks in a fixed-capacity buffer and hands out
//! byte ranges that look like one complete frame.  It does not validate
//! them; that is the dispatcher's job.
//!
//! ```text
//!  chunk ──► strip prompt ──► restart / append ──► align on marker
//!                                                      │
//!                          ┌───────────────────────────┘
//!                          ▼
//!                    frame_extent ──► Complete(n) ──► emit, drain n, loop
//!                          │
//!                          ├──► Invalid{skip} ──► drain skip, loop
//!                          └──► Incomplete ──► wait for next chunk
//! ```
//!
//! Bounded memory: if the buffer would pass the configured ceiling
//! without resolving into a frame, everything is discarded and an
//! overflow is reported.

use heapless::Vec as HVec;
use log::{debug, warn};

use crate::protocol::codec::{Extent, Framing};

// ── Constants ────────────────────────────────────────────────

/// Hard capacity of the accumulation buffer.
pub const REASSEMBLY_CAPACITY: usize = 10_000;

/// What a fed chunk produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reassembly<'a> {
    /// One candidate frame, still unvalidated.
    Frame(&'a [u8]),
    /// The buffer hit its ceiling and was cleared.
    Overflow { discarded: usize },
}

pub struct ResponseReassembler {
    framing: Framing,
    artifacts: &'static [&'static [u8]],
    ceiling: usize,
    buffer: HVec<u8, REASSEMBLY_CAPACITY>,
}

impl ResponseReassembler {
    /// `ceiling` is clamped to [`REASSEMBLY_CAPACITY`].
    pub fn new(framing: Framing, artifacts: &'static [&'static [u8]], ceiling: usize) -> Self {
        Self {
            framing,
            artifacts,
            ceiling: ceiling.min(REASSEMBLY_CAPACITY),
            buffer: HVec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes held while waiting for the rest of a frame.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Consume one notification chunk, calling `sink` for every candidate
    /// frame (in order) and for an overflow.
    pub fn feed(&mut self, chunk: &[u8], mut sink: impl FnMut(Reassembly<'_>)) {
        let chunk = self.strip_artifacts(chunk);
        if chunk.is_empty() {
            return;
        }

        // A marker-led chunk starts a new frame; whatever was pending
        // belongs to a frame whose tail was lost.
        if self.framing.starts_frame(chunk) && !self.buffer.is_empty() {
            debug!(
                "Reassembler: new frame start, dropping {} buffered bytes",
                self.buffer.len()
            );
            self.buffer.clear();
        }

        if self.buffer.len() + chunk.len() > self.ceiling
            || self.buffer.extend_from_slice(chunk).is_err()
        {
            let discarded = self.buffer.len() + chunk.len();
            warn!(
                "Reassembler: buffer ceiling {} exceeded, discarding {discarded} bytes",
                self.ceiling
            );
            self.buffer.clear();
            sink(Reassembly::Overflow { discarded });
            return;
        }

        self.extract(&mut sink);
    }

    fn strip_artifacts<'c>(&self, mut chunk: &'c [u8]) -> &'c [u8] {
        while let Some(artifact) = self
            .artifacts
            .iter()
            .find(|a| !a.is_empty() && chunk.starts_with(a))
        {
            debug!("Reassembler: stripped {}-byte prompt", artifact.len());
            chunk = &chunk[artifact.len()..];
        }
        chunk
    }

    fn extract(&mut self, sink: &mut impl FnMut(Reassembly<'_>)) {
        loop {
            match self.framing.find_start(&self.buffer) {
                None => {
                    if !self.buffer.is_empty() {
                        debug!(
                            "Reassembler: no frame marker, discarding {} bytes",
                            self.buffer.len()
                        );
                        self.buffer.clear();
                    }
                    return;
                }
                Some(0) => {}
                Some(n) => {
                    debug!("Reassembler: discarding {n} bytes before marker");
                    self.drain(n);
                }
            }

            match self.framing.frame_extent(&self.buffer, self.ceiling) {
                Extent::Incomplete => return,
                Extent::Complete(n) => {
                    sink(Reassembly::Frame(&self.buffer[..n]));
                    self.drain(n);
                }
                Extent::Invalid { skip } => {
                    debug!("Reassembler: unusable frame start, skipping {skip} bytes");
                    self.drain(skip);
                }
            }
        }
    }

    /// Drop the first `n` bytes.
    fn drain(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        let len = self.buffer.len();
        self.buffer.copy_within(n.., 0);
        self.buffer.truncate(len - n);
    }
}
