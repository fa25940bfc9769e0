//! Decoder registry: maps a response tag to a named payload decoder.
//!
//! A registry is a static list rather than a map so that two entries
//! sharing a key survive as a visible conflict instead of one silently
//! shadowing the other.  Lookups on a conflicting key return every
//! candidate name and let the caller pick by context.

use core::fmt;

use crate::error::PayloadError;

use super::frame::FrameClass;
use super::responses::Response;

/// Typed payload decoder.  Receives the payload without header or checksum.
pub type PayloadDecoder = fn(&[u8]) -> Result<Response, PayloadError>;

/// Tag a decoded frame is dispatched on.
///
/// For acknowledgments `(target, code)` is the device and command id of
/// the request being answered.  For plain-framed notifications the
/// target is always `0` and `code` is the notification id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    pub class: FrameClass,
    pub target: u8,
    pub code: u8,
}

impl ResponseKey {
    pub const fn ack(target: u8, code: u8) -> Self {
        Self {
            class: FrameClass::Acknowledgment,
            target,
            code,
        }
    }

    pub const fn notification(target: u8, code: u8) -> Self {
        Self {
            class: FrameClass::Notification,
            target,
            code,
        }
    }
}

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = match self.class {
            FrameClass::Acknowledgment => "ack",
            FrameClass::Notification => "notification",
        };
        write!(f, "{class} 0x{:02X}/0x{:02X}", self.target, self.code)
    }
}

/// One named decoder.  `decode: None` means the frame carries nothing
/// worth parsing and is surfaced as a bare acknowledgment/notification.
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub key: ResponseKey,
    pub name: &'static str,
    pub decode: Option<PayloadDecoder>,
}

impl RegistryEntry {
    pub const fn new(key: ResponseKey, name: &'static str, decode: Option<PayloadDecoder>) -> Self {
        Self { key, name, decode }
    }
}

/// Outcome of a registry lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Unknown,
    Found(RegistryEntry),
    /// Several entries claim the key; names in registration order.
    Conflict(Vec<&'static str>),
}

impl PartialEq for RegistryEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.name == other.name
    }
}

impl Eq for RegistryEntry {}

#[derive(Debug, Clone, Copy)]
pub struct DecoderRegistry {
    entries: &'static [RegistryEntry],
}

impl DecoderRegistry {
    pub const fn new(entries: &'static [RegistryEntry]) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &'static [RegistryEntry] {
        self.entries
    }

    pub fn lookup(&self, key: ResponseKey) -> Lookup {
        let mut matches = self.entries.iter().filter(|e| e.key == key);
        let Some(first) = matches.next() else {
            return Lookup::Unknown;
        };
        let rest: Vec<&'static str> = matches.map(|e| e.name).collect();
        if rest.is_empty() {
            Lookup::Found(*first)
        } else {
            let mut names = Vec::with_capacity(rest.len() + 1);
            names.push(first.name);
            names.extend(rest);
            Lookup::Conflict(names)
        }
    }

    /// Every key claimed by more than one entry, with the claimant names.
    pub fn conflicts(&self) -> Vec<(ResponseKey, Vec<&'static str>)> {
        let mut out: Vec<(ResponseKey, Vec<&'static str>)> = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if self.entries[..i].iter().any(|e| e.key == entry.key) {
                continue;
            }
            if let Lookup::Conflict(names) = self.lookup(entry.key) {
                out.push((entry.key, names));
            }
        }
        out
    }
}
