//! Outgoing command encoding.
//!
//! Stamps a command with the session's next sequence number and flag
//! bits, then hands it to the variant's codec.  Delivery is at-most-once:
//! nothing here retries or waits for an acknowledgment.

use log::debug;

use crate::error::EncodeError;
use crate::protocol::commands::Command;
use crate::protocol::frame::{Frame, PacketFlags};

use super::ConnectionSession;

/// Bytes ready for the command characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    pub name: &'static str,
    pub sequence: u8,
    pub bytes: Vec<u8>,
}

pub struct CommandEncoder;

impl CommandEncoder {
    /// Encode a raw `(target, command)` pair.
    ///
    /// The sequence counter advances only when encoding succeeds.
    pub fn build(
        session: &mut ConnectionSession,
        target: u8,
        command: u8,
        payload: &[u8],
        synchronous: bool,
        reset_timeout: bool,
    ) -> Result<EncodedCommand, EncodeError> {
        Self::encode(session, "raw", target, command, payload, synchronous, reset_timeout)
    }

    /// Encode a catalog command for the session's device family.
    pub fn build_command(
        session: &mut ConnectionSession,
        cmd: &Command,
        reset_timeout: bool,
    ) -> Result<EncodedCommand, EncodeError> {
        let spec = session
            .variant()
            .command(cmd)
            .ok_or(EncodeError::UnsupportedCommand(cmd.name()))?;
        Self::encode(
            session,
            spec.name,
            spec.target,
            spec.id,
            &spec.payload,
            spec.synchronous,
            reset_timeout,
        )
    }

    fn encode(
        session: &mut ConnectionSession,
        name: &'static str,
        target: u8,
        command: u8,
        payload: &[u8],
        synchronous: bool,
        reset_timeout: bool,
    ) -> Result<EncodedCommand, EncodeError> {
        let mut flags = PacketFlags::NONE;
        flags.set(PacketFlags::SYNCHRONOUS, synchronous);
        flags.set(PacketFlags::RESET_TIMEOUT, reset_timeout);

        let sequence = session.sequence.peek();
        let frame = Frame::command(target, command, flags, sequence, payload);
        let bytes = session.variant().codec().encode(&frame)?;

        session.sequence.advance();
        if synchronous {
            session.pending.record(sequence, target, command);
        }
        debug!(
            "Session: {name} did=0x{target:02X} cid=0x{command:02X} seq={sequence} len={}",
            bytes.len()
        );
        Ok(EncodedCommand {
            name,
            sequence,
            bytes,
        })
    }
}
