//! Response dispatch: candidate frame in, typed [`Response`] out.
//!
//! Every failure here is per-frame.  The caller reports it and keeps the
//! session running; firmware may well emit tags this crate does not know.

use log::{debug, warn};

use crate::error::FrameError;
use crate::protocol::frame::{FrameClass, ResponseFrame};
use crate::protocol::registry::{Lookup, ResponseKey};
use crate::protocol::responses::Response;
use crate::protocol::variant::ProtocolVariant;

use super::{ConnectionSession, PendingAcks};

pub struct ResponseDispatcher;

impl ResponseDispatcher {
    /// Validate `candidate` with the session's codec and decode its payload.
    pub fn dispatch(session: &mut ConnectionSession, candidate: &[u8]) -> Result<Response, FrameError> {
        Self::decode(session.variant(), &mut session.pending, candidate)
    }

    pub(crate) fn decode(
        variant: &ProtocolVariant,
        pending: &mut PendingAcks,
        candidate: &[u8],
    ) -> Result<Response, FrameError> {
        let frame = variant.codec().decode_response(candidate).map_err(|e| {
            warn!("Dispatch: dropped {}-byte frame: {e}", candidate.len());
            FrameError::Decode(e)
        })?;

        let key = Self::key_for(pending, &frame);

        if frame.status != 0 {
            warn!(
                "Dispatch: {} failed with status 0x{:02X}",
                key.map_or_else(|| "acknowledgment".into(), |k| k.to_string()),
                frame.status
            );
            return Ok(Response::AckError {
                key,
                sequence: frame.sequence,
                status: frame.status,
            });
        }

        let Some(key) = key else {
            warn!("Dispatch: acknowledgment for unknown sequence {:?}", frame.sequence);
            return Err(FrameError::UnexpectedAck {
                sequence: frame.sequence,
            });
        };

        match variant.registry.lookup(key) {
            Lookup::Unknown => {
                warn!(
                    "Dispatch: unknown {key} ({} payload bytes), dropped",
                    frame.payload.len()
                );
                Err(FrameError::UnknownResponseType(key))
            }
            Lookup::Conflict(candidates) => {
                warn!("Dispatch: {key} is claimed by {candidates:?}");
                Ok(Response::Ambiguous {
                    key,
                    candidates,
                    payload: frame.payload,
                })
            }
            Lookup::Found(entry) => {
                debug!("Dispatch: {} ({key})", entry.name);
                match (entry.decode, key.class) {
                    (Some(decode), _) => decode(&frame.payload).map_err(|error| {
                        warn!("Dispatch: {} payload rejected: {error}", entry.name);
                        FrameError::Payload { key, error }
                    }),
                    (None, FrameClass::Acknowledgment) => Ok(Response::Ack {
                        key,
                        name: entry.name,
                        sequence: frame.sequence,
                        payload: frame.payload,
                    }),
                    (None, FrameClass::Notification) => Ok(Response::Notification {
                        key,
                        name: entry.name,
                        payload: frame.payload,
                    }),
                }
            }
        }
    }

    /// Tag the frame.  Acknowledgments consume their pending entry whether
    /// or not the frame echoes the command id itself.
    fn key_for(pending: &mut PendingAcks, frame: &ResponseFrame) -> Option<ResponseKey> {
        match frame.class {
            FrameClass::Acknowledgment => {
                let recorded = frame.sequence.and_then(|seq| pending.take(seq));
                match (frame.target, frame.code) {
                    (Some(target), Some(code)) => Some(ResponseKey::ack(target, code)),
                    _ => recorded.map(|(target, code)| ResponseKey::ack(target, code)),
                }
            }
            FrameClass::Notification => frame
                .code
                .map(|code| ResponseKey::notification(frame.target.unwrap_or(0), code)),
        }
    }
}
