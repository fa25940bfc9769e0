//! Unified error types for the protocol engine.
//!
//! Two families, matching how far an error is allowed to travel:
//!
//! - **Per-frame** errors ([`DecodeError`], [`PayloadError`], [`FrameError`])
//!   are local.  The offending frame is dropped, the reassembly buffer is
//!   reset if needed, and the session keeps running.
//! - **Session-fatal** errors ([`FailureReason`]) move the connection state
//!   machine to `Failed` and tear the session down.
//!
//! Every variant is `Copy` so errors can be threaded through the FSM context
//! and event queue without allocation.

use core::fmt;

use crate::protocol::registry::ResponseKey;

// ---------------------------------------------------------------------------
// Frame decoding
// ---------------------------------------------------------------------------

/// Why a byte buffer could not be decoded into a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the minimum header (plus checksum) are present.
    TooShort { len: usize, min: usize },
    /// Start/end markers are absent or misplaced, or the fixed prefix is wrong.
    InvalidFraming,
    /// An escape byte was followed by an unrecognised code (or nothing).
    InvalidEscapeSequence { code: Option<u8> },
    /// Recomputed checksum differs from the trailing checksum byte.
    ChecksumMismatch { expected: u8, actual: u8 },
    /// Declared payload length disagrees with the buffer length.
    LengthMismatch { declared: usize, actual: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { len, min } => write!(f, "frame too short ({len} < {min} bytes)"),
            Self::InvalidFraming => write!(f, "invalid framing"),
            Self::InvalidEscapeSequence { code: Some(c) } => {
                write!(f, "invalid escape sequence 0xAB 0x{c:02X}")
            }
            Self::InvalidEscapeSequence { code: None } => {
                write!(f, "escape byte at end of frame")
            }
            Self::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch (expected 0x{expected:02X}, got 0x{actual:02X})"
            ),
            Self::LengthMismatch { declared, actual } => write!(
                f,
                "length mismatch (header declares {declared}, buffer holds {actual})"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload decoding
// ---------------------------------------------------------------------------

/// A typed payload decoder rejected the payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// The payload is not the fixed size the record requires.
    UnexpectedLength { expected: usize, actual: usize },
    /// A field read ran past the end of the payload.
    Truncated { offset: usize, wanted: usize },
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedLength { expected, actual } => {
                write!(f, "payload is {actual} bytes, record needs {expected}")
            }
            Self::Truncated { offset, wanted } => {
                write!(f, "payload truncated reading {wanted} bytes at offset {offset}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Non-fatal per-frame errors surfaced to the application
// ---------------------------------------------------------------------------

/// Non-fatal problems observed on the response stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The candidate frame failed codec validation.
    Decode(DecodeError),
    /// The frame was valid but no decoder is registered for its tag.
    UnknownResponseType(ResponseKey),
    /// An acknowledgment whose sequence number matches no command sent
    /// on this session.
    UnexpectedAck { sequence: Option<u8> },
    /// A registered decoder rejected the payload.
    Payload { key: ResponseKey, error: PayloadError },
    /// The reassembly buffer passed its ceiling and was cleared.
    BufferOverflow { discarded: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::UnknownResponseType(key) => write!(f, "unknown response type {key}"),
            Self::UnexpectedAck { sequence: Some(seq) } => {
                write!(f, "acknowledgment for unknown sequence {seq}")
            }
            Self::UnexpectedAck { sequence: None } => write!(f, "acknowledgment without sequence"),
            Self::Payload { key, error } => write!(f, "payload of {key}: {error}"),
            Self::BufferOverflow { discarded } => {
                write!(f, "reassembly overflow, discarded {discarded} bytes")
            }
        }
    }
}

impl From<DecodeError> for FrameError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// Payload does not fit the variant's length field.
    PayloadTooLarge { len: usize, max: usize },
    /// The session's variant has no descriptor for this command.
    UnsupportedCommand(&'static str),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload of {len} bytes exceeds maximum of {max}")
            }
            Self::UnsupportedCommand(name) => {
                write!(f, "command {name} is not supported by this device family")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Immediate failure of a transport primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    NotConnected,
    /// The peer or the stack refused the operation.
    Refused,
    /// Platform-specific error code.
    Io(i32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "GATT: not connected"),
            Self::Refused => write!(f, "GATT: operation refused"),
            Self::Io(code) => write!(f, "GATT: I/O error {code}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session-fatal failures
// ---------------------------------------------------------------------------

/// Why a session ended up in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// A handshake write was refused or reported as failed.
    HandshakeStepFailed { step: usize },
    /// Enabling notifications on the response characteristic failed.
    SubscriptionFailed,
    /// Service discovery finished without a service the variant needs.
    MissingService(u128),
    /// Service discovery finished without a characteristic the variant needs.
    MissingCharacteristic(u128),
    /// The link dropped.
    TransportDisconnected,
    /// The transport reported a service/controller error.
    TransportError(i32),
    /// A transport primitive failed synchronously.
    Transport(TransportError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandshakeStepFailed { step } => write!(f, "handshake step {step} failed"),
            Self::SubscriptionFailed => write!(f, "enabling notifications failed"),
            Self::MissingService(uuid) => write!(f, "service {uuid:032x} not found"),
            Self::MissingCharacteristic(uuid) => {
                write!(f, "characteristic {uuid:032x} not found")
            }
            Self::TransportDisconnected => write!(f, "transport disconnected"),
            Self::TransportError(code) => write!(f, "transport error {code}"),
            Self::Transport(e) => write!(f, "{e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Application-facing session errors
// ---------------------------------------------------------------------------

/// Errors returned to callers of
/// [`ConnectionStateMachine::send`](crate::app::service::ConnectionStateMachine::send).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Commands are accepted only in `Ready`.
    NotReady,
    Encode(EncodeError),
    Transport(TransportError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "session is not ready"),
            Self::Encode(e) => write!(f, "encode: {e}"),
            Self::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl From<EncodeError> for SessionError {
    fn from(e: EncodeError) -> Self {
        Self::Encode(e)
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}
