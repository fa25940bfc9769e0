//! Frame codec: checksum, byte-stuffing and header layout.
//!
//! Two incompatible wire formats are supported.
//!
//! Plain framing (classic robots), outgoing commands:
//! ```text
//! ┌──────┬──────────────┬─────┬─────┬─────┬──────┬─────────────┬─────┐
//! │ 0xFF │ 0xFC|flags   │ DID │ CID │ SEQ │ DLEN │ payload     │ CHK │
//! └──────┴──────────────┴─────┴─────┴─────┴──────┴─────────────┴─────┘
//!                         └──────────── checksummed ───────────┘
//! ```
//! Incoming frames are either an acknowledgment
//! `FF FF MRSP SEQ DLEN data CHK` or an asynchronous notification
//! `FF FE ID DLEN_HI DLEN_LO data CHK`.  `DLEN` always counts the checksum.
//!
//! Escape framing (v2 robots):
//! ```text
//! ┌──────┬───────────────────────────────────────────────────┬──────┐
//! │ 0x8D │ esc( FLAGS [TID] [SID] DID CID SEQ [ERR] data CHK ) │ 0xD8 │
//! └──────┴───────────────────────────────────────────────────┴──────┘
//! ```
//! The checksum covers the whole unescaped body.  In both schemes it is
//! `!(sum of covered bytes mod 256)`.
//!
//! The codec is stateless.  Decoding validates the checksum before the
//! declared length so that any single-bit corruption inside the covered
//! range is reported as [`DecodeError::ChecksumMismatch`].

use crate::error::{DecodeError, EncodeError};

use super::frame::{Frame, FrameClass, PacketFlags, ResponseFrame};

// ── Plain framing constants ──────────────────────────────────

/// First byte of every plain frame.
pub const PLAIN_SOP1: u8 = 0xFF;
/// SOP2 of a command: the low two bits carry flags.
const PLAIN_SOP2_BASE: u8 = 0xFC;
const PLAIN_SOP2_SYNC: u8 = 0x02;
const PLAIN_SOP2_RESET: u8 = 0x01;
/// SOP2 of an acknowledgment.
pub const PLAIN_SOP2_ANSWER: u8 = 0xFF;
/// SOP2 of an asynchronous notification.
pub const PLAIN_SOP2_ASYNC: u8 = 0xFE;

const PLAIN_COMMAND_HEADER: usize = 6;
const PLAIN_RESPONSE_HEADER: usize = 5;
/// Bytes before the checksummed range.
const PLAIN_CHECKSUM_OFFSET: usize = 2;
/// `DLEN` is one byte and includes the checksum.
const PLAIN_MAX_PAYLOAD: usize = u8::MAX as usize - 1;

// ── Escape framing constants ─────────────────────────────────

pub const SOP: u8 = 0x8D;
pub const EOP: u8 = 0xD8;
pub const ESC: u8 = 0xAB;
const ESC_ESC: u8 = 0x23;
const ESC_SOP: u8 = 0x03;
const ESC_EOP: u8 = 0x50;

const WIRE_HAS_TARGET: u8 = 0x10;
const WIRE_HAS_SOURCE: u8 = 0x20;
const WIRE_EXTENDED_FLAGS: u8 = 0x80;

/// FLAGS DID CID SEQ.
const ESCAPED_MIN_HEADER: usize = 4;

/// `!(Σ bytes mod 256)`.
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

// ═══════════════════════════════════════════════════════════════
//  Framing scheme
// ═══════════════════════════════════════════════════════════════

/// Which wire format a device family speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Fixed header with a length byte, no escaping.
    Plain,
    /// Start/end markers with byte-stuffing, no length field.
    Escaped,
}

/// How much of a buffer (which starts at a frame marker) forms a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    /// More bytes are needed before the frame boundary is known.
    Incomplete,
    /// The first `n` bytes are one candidate frame.
    Complete(usize),
    /// The buffer cannot start a frame here; drop `skip` bytes and rescan.
    Invalid { skip: usize },
}

impl Framing {
    /// Flags the wire format can carry.
    pub const fn supported_flags(self) -> PacketFlags {
        match self {
            Self::Plain => PacketFlags::SYNCHRONOUS.union(PacketFlags::RESET_TIMEOUT),
            Self::Escaped => PacketFlags::from_bits(0x0F),
        }
    }

    /// Inbound header size before the length is known.
    pub const fn min_header(self) -> usize {
        match self {
            Self::Plain => PLAIN_RESPONSE_HEADER,
            Self::Escaped => ESCAPED_MIN_HEADER,
        }
    }

    /// Offset of the first byte that may start an inbound frame.
    pub fn find_start(self, buf: &[u8]) -> Option<usize> {
        match self {
            Self::Plain => (0..buf.len()).find(|&i| {
                buf[i] == PLAIN_SOP1
                    && buf
                        .get(i + 1)
                        .is_none_or(|b| *b == PLAIN_SOP2_ANSWER || *b == PLAIN_SOP2_ASYNC)
            }),
            Self::Escaped => buf.iter().position(|b| *b == SOP),
        }
    }

    /// Whether `chunk` opens with a complete inbound frame marker.
    ///
    /// Plain framing needs both marker bytes, so a lone trailing `0xFF`
    /// never counts.
    pub fn starts_frame(self, chunk: &[u8]) -> bool {
        match self {
            Self::Plain => matches!(
                chunk,
                [PLAIN_SOP1, PLAIN_SOP2_ANSWER | PLAIN_SOP2_ASYNC, ..]
            ),
            Self::Escaped => chunk.first() == Some(&SOP),
        }
    }

    /// Measure the frame at the start of `buf`.
    ///
    /// `ceiling` bounds declared lengths so that a corrupt length field
    /// never makes the caller wait for more bytes than it will buffer.
    pub fn frame_extent(self, buf: &[u8], ceiling: usize) -> Extent {
        match self {
            Self::Plain => plain_extent(buf, ceiling),
            Self::Escaped => escaped_extent(buf),
        }
    }
}

fn plain_extent(buf: &[u8], ceiling: usize) -> Extent {
    if buf.len() < 2 {
        return Extent::Incomplete;
    }
    if buf[0] != PLAIN_SOP1 {
        return Extent::Invalid { skip: 1 };
    }
    if buf.len() < PLAIN_RESPONSE_HEADER {
        return match buf[1] {
            PLAIN_SOP2_ANSWER | PLAIN_SOP2_ASYNC => Extent::Incomplete,
            _ => Extent::Invalid { skip: 1 },
        };
    }
    let declared = match buf[1] {
        PLAIN_SOP2_ANSWER => buf[4] as usize,
        PLAIN_SOP2_ASYNC => u16::from_be_bytes([buf[3], buf[4]]) as usize,
        _ => return Extent::Invalid { skip: 1 },
    };
    let total = PLAIN_RESPONSE_HEADER + declared;
    if declared == 0 || total > ceiling {
        return Extent::Invalid { skip: 1 };
    }
    if buf.len() >= total {
        Extent::Complete(total)
    } else {
        Extent::Incomplete
    }
}

fn escaped_extent(buf: &[u8]) -> Extent {
    if buf.first() != Some(&SOP) {
        return Extent::Invalid { skip: 1 };
    }
    for (i, b) in buf.iter().enumerate().skip(1) {
        match *b {
            EOP => return Extent::Complete(i + 1),
            // A new frame started before this one ended.
            SOP => return Extent::Invalid { skip: i },
            _ => {}
        }
    }
    Extent::Incomplete
}

// ═══════════════════════════════════════════════════════════════
//  Codec
// ═══════════════════════════════════════════════════════════════

/// Stateless encoder/decoder for one framing scheme.
#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    framing: Framing,
}

impl PacketCodec {
    pub const fn new(framing: Framing) -> Self {
        Self { framing }
    }

    pub const fn framing(&self) -> Framing {
        self.framing
    }

    /// Serialise `frame` to wire bytes.
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
        match self.framing {
            Framing::Plain => encode_plain(frame),
            Framing::Escaped => Ok(encode_escaped(frame)),
        }
    }

    /// Parse wire bytes produced by [`encode`](Self::encode).
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame, DecodeError> {
        match self.framing {
            Framing::Plain => decode_plain_command(bytes),
            Framing::Escaped => decode_escaped(bytes),
        }
    }

    /// Parse a frame sent by the robot.
    pub fn decode_response(&self, bytes: &[u8]) -> Result<ResponseFrame, DecodeError> {
        match self.framing {
            Framing::Plain => decode_plain_response(bytes),
            Framing::Escaped => {
                let frame = decode_escaped(bytes)?;
                let class = if frame.flags.contains(PacketFlags::RESPONSE) {
                    FrameClass::Acknowledgment
                } else {
                    FrameClass::Notification
                };
                Ok(ResponseFrame {
                    class,
                    target: Some(frame.target),
                    code: Some(frame.command),
                    sequence: Some(frame.sequence),
                    status: frame.error_code.unwrap_or(0),
                    payload: frame.payload,
                })
            }
        }
    }
}

// ── Plain ────────────────────────────────────────────────────

fn encode_plain(frame: &Frame) -> Result<Vec<u8>, EncodeError> {
    if frame.payload.len() > PLAIN_MAX_PAYLOAD {
        return Err(EncodeError::PayloadTooLarge {
            len: frame.payload.len(),
            max: PLAIN_MAX_PAYLOAD,
        });
    }

    let mut sop2 = PLAIN_SOP2_BASE;
    if frame.flags.contains(PacketFlags::SYNCHRONOUS) {
        sop2 |= PLAIN_SOP2_SYNC;
    }
    if frame.flags.contains(PacketFlags::RESET_TIMEOUT) {
        sop2 |= PLAIN_SOP2_RESET;
    }

    let mut out = Vec::with_capacity(PLAIN_COMMAND_HEADER + frame.payload.len() + 1);
    out.extend_from_slice(&[
        PLAIN_SOP1,
        sop2,
        frame.target,
        frame.command,
        frame.sequence,
        (frame.payload.len() + 1) as u8,
    ]);
    out.extend_from_slice(&frame.payload);
    out.push(checksum(&out[PLAIN_CHECKSUM_OFFSET..]));
    Ok(out)
}

/// Verify the trailing checksum over `bytes[PLAIN_CHECKSUM_OFFSET..len-1]`.
fn verify_plain_checksum(bytes: &[u8]) -> Result<(), DecodeError> {
    let last = bytes.len() - 1;
    let expected = checksum(&bytes[PLAIN_CHECKSUM_OFFSET..last]);
    if bytes[last] != expected {
        return Err(DecodeError::ChecksumMismatch {
            expected,
            actual: bytes[last],
        });
    }
    Ok(())
}

fn decode_plain_command(bytes: &[u8]) -> Result<Frame, DecodeError> {
    let min = PLAIN_COMMAND_HEADER + 1;
    if bytes.len() < min {
        return Err(DecodeError::TooShort {
            len: bytes.len(),
            min,
        });
    }
    if bytes[0] != PLAIN_SOP1 || bytes[1] & PLAIN_SOP2_BASE != PLAIN_SOP2_BASE {
        return Err(DecodeError::InvalidFraming);
    }
    verify_plain_checksum(bytes)?;

    let declared = PLAIN_COMMAND_HEADER + bytes[5] as usize;
    if bytes[5] == 0 || declared != bytes.len() {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }

    let mut flags = PacketFlags::NONE;
    flags.set(PacketFlags::SYNCHRONOUS, bytes[1] & PLAIN_SOP2_SYNC != 0);
    flags.set(PacketFlags::RESET_TIMEOUT, bytes[1] & PLAIN_SOP2_RESET != 0);

    Ok(Frame::command(
        bytes[2],
        bytes[3],
        flags,
        bytes[4],
        &bytes[PLAIN_COMMAND_HEADER..bytes.len() - 1],
    ))
}

fn decode_plain_response(bytes: &[u8]) -> Result<ResponseFrame, DecodeError> {
    let min = PLAIN_RESPONSE_HEADER + 1;
    if bytes.len() < min {
        return Err(DecodeError::TooShort {
            len: bytes.len(),
            min,
        });
    }
    if bytes[0] != PLAIN_SOP1 || !matches!(bytes[1], PLAIN_SOP2_ANSWER | PLAIN_SOP2_ASYNC) {
        return Err(DecodeError::InvalidFraming);
    }
    verify_plain_checksum(bytes)?;

    let is_answer = bytes[1] == PLAIN_SOP2_ANSWER;
    let dlen = if is_answer {
        bytes[4] as usize
    } else {
        u16::from_be_bytes([bytes[3], bytes[4]]) as usize
    };
    let declared = PLAIN_RESPONSE_HEADER + dlen;
    if dlen == 0 || declared != bytes.len() {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }

    let payload = bytes[PLAIN_RESPONSE_HEADER..bytes.len() - 1].to_vec();
    Ok(if is_answer {
        ResponseFrame {
            class: FrameClass::Acknowledgment,
            target: None,
            code: None,
            sequence: Some(bytes[3]),
            status: bytes[2],
            payload,
        }
    } else {
        ResponseFrame {
            class: FrameClass::Notification,
            target: None,
            code: Some(bytes[2]),
            sequence: None,
            status: 0,
            payload,
        }
    })
}

// ── Escaped ──────────────────────────────────────────────────

fn push_escaped(out: &mut Vec<u8>, byte: u8) {
    match byte {
        ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
        SOP => out.extend_from_slice(&[ESC, ESC_SOP]),
        EOP => out.extend_from_slice(&[ESC, ESC_EOP]),
        b => out.push(b),
    }
}

/// Wrap an unescaped body (checksum included) in markers.
pub(crate) fn stuff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 2 + body.len() / 8);
    out.push(SOP);
    for b in body {
        push_escaped(&mut out, *b);
    }
    out.push(EOP);
    out
}

/// Strip markers and reverse the stuffing.
pub(crate) fn unstuff(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if bytes.len() < 2 || bytes[0] != SOP || bytes[bytes.len() - 1] != EOP {
        return Err(DecodeError::InvalidFraming);
    }
    let interior = &bytes[1..bytes.len() - 1];
    let mut out = Vec::with_capacity(interior.len());
    let mut iter = interior.iter();
    while let Some(&b) = iter.next() {
        match b {
            ESC => match iter.next() {
                Some(&ESC_ESC) => out.push(ESC),
                Some(&ESC_SOP) => out.push(SOP),
                Some(&ESC_EOP) => out.push(EOP),
                other => {
                    return Err(DecodeError::InvalidEscapeSequence {
                        code: other.copied(),
                    });
                }
            },
            SOP | EOP => return Err(DecodeError::InvalidFraming),
            b => out.push(b),
        }
    }
    Ok(out)
}

fn encode_escaped(frame: &Frame) -> Vec<u8> {
    let flags = frame.flags.intersection(Framing::Escaped.supported_flags());
    let mut wire_flags = flags.bits();
    if frame.target_address.is_some() {
        wire_flags |= WIRE_HAS_TARGET;
    }
    if frame.source_address.is_some() {
        wire_flags |= WIRE_HAS_SOURCE;
    }

    let mut body = Vec::with_capacity(ESCAPED_MIN_HEADER + 4 + frame.payload.len());
    body.push(wire_flags);
    body.extend(frame.target_address);
    body.extend(frame.source_address);
    body.extend_from_slice(&[frame.target, frame.command, frame.sequence]);
    if flags.contains(PacketFlags::RESPONSE) {
        body.push(frame.error_code.unwrap_or(0));
    }
    body.extend_from_slice(&frame.payload);
    body.push(checksum(&body));
    stuff(&body)
}

fn decode_escaped(bytes: &[u8]) -> Result<Frame, DecodeError> {
    let body = unstuff(bytes)?;
    let min = ESCAPED_MIN_HEADER + 1;
    if body.len() < min {
        return Err(DecodeError::TooShort {
            len: body.len(),
            min,
        });
    }

    let last = body.len() - 1;
    let expected = checksum(&body[..last]);
    if body[last] != expected {
        return Err(DecodeError::ChecksumMismatch {
            expected,
            actual: body[last],
        });
    }
    let body = &body[..last];

    let wire_flags = body[0];
    if wire_flags & WIRE_EXTENDED_FLAGS != 0 {
        return Err(DecodeError::InvalidFraming);
    }
    let flags = PacketFlags::from_bits(wire_flags);
    let has_target = wire_flags & WIRE_HAS_TARGET != 0;
    let has_source = wire_flags & WIRE_HAS_SOURCE != 0;
    let has_error = flags.contains(PacketFlags::RESPONSE);

    let header =
        ESCAPED_MIN_HEADER + usize::from(has_target) + usize::from(has_source) + usize::from(has_error);
    if body.len() < header {
        return Err(DecodeError::TooShort {
            len: body.len() + 1,
            min: header + 1,
        });
    }

    let mut pos = 1;
    let mut take = |present: bool| {
        present.then(|| {
            let b = body[pos];
            pos += 1;
            b
        })
    };
    let target_address = take(has_target);
    let source_address = take(has_source);
    let target = body[pos];
    let command = body[pos + 1];
    let sequence = body[pos + 2];
    pos += 3;
    let error_code = has_error.then(|| body[pos]);
    if has_error {
        pos += 1;
    }

    Ok(Frame {
        target,
        command,
        flags,
        sequence,
        target_address,
        source_address,
        error_code,
        payload: body[pos..].to_vec(),
    })
}

// ── Tests ────────────────────────────────────────────────────
