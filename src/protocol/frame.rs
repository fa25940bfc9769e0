//! Logical frame types shared by every framing scheme.

use core::fmt;

/// Semantic packet flags.
///
/// Bit values match the escape-framed wire format.  The plain framing
/// maps `SYNCHRONOUS` and `RESET_TIMEOUT` onto its own SOP2 bits and has
/// no room for the others.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PacketFlags(u8);

impl PacketFlags {
    pub const NONE: Self = Self(0);
    /// Frame is a response and carries an error-code byte.
    pub const RESPONSE: Self = Self(0x01);
    /// Sender wants an acknowledgment.
    pub const SYNCHRONOUS: Self = Self(0x02);
    /// Sender wants an acknowledgment only on error.
    pub const REPORT_ERROR: Self = Self(0x04);
    /// Receiving the frame resets the device's inactivity timeout.
    pub const RESET_TIMEOUT: Self = Self(0x08);

    const ALL: u8 = 0x0F;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub fn set(&mut self, other: Self, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl core::ops::BitOr for PacketFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for PacketFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::RESPONSE, "RESPONSE"),
            (Self::SYNCHRONOUS, "SYNCHRONOUS"),
            (Self::REPORT_ERROR, "REPORT_ERROR"),
            (Self::RESET_TIMEOUT, "RESET_TIMEOUT"),
        ];
        let mut first = true;
        write!(f, "PacketFlags(")?;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        write!(f, ")")
    }
}

/// One protocol message as the codec sees it, before/after the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Device (subsystem) id the command is addressed to.
    pub target: u8,
    pub command: u8,
    pub flags: PacketFlags,
    pub sequence: u8,
    /// Routing bytes of multi-processor robots (escape framing only).
    pub target_address: Option<u8>,
    pub source_address: Option<u8>,
    /// Present exactly when `flags` contains [`PacketFlags::RESPONSE`].
    pub error_code: Option<u8>,
    pub payload: Vec<u8>,
}

impl Frame {
    /// A plain command frame without routing or error code.
    pub fn command(target: u8, command: u8, flags: PacketFlags, sequence: u8, payload: &[u8]) -> Self {
        Self {
            target,
            command,
            flags,
            sequence,
            target_address: None,
            source_address: None,
            error_code: None,
            payload: payload.to_vec(),
        }
    }
}

/// Whether an inbound frame answers a command or arrived unsolicited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameClass {
    Acknowledgment,
    Notification,
}

/// A validated inbound frame, ready for the decoder registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub class: FrameClass,
    /// Device id (escape framing only; plain frames do not echo it).
    pub target: Option<u8>,
    /// Command id (escape framing) or notification id code (plain framing).
    pub code: Option<u8>,
    /// Sequence number; plain notifications carry none.
    pub sequence: Option<u8>,
    /// Acknowledgment status (`0` is success).
    pub status: u8,
    pub payload: Vec<u8>,
}
