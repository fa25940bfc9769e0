//! Wire protocol: frames, codec, command catalog, response decoders and
//! the per-family variant tables that tie them together.

pub mod codec;
pub mod commands;
pub mod frame;
pub mod registry;
pub mod responses;
pub mod variant;

pub use codec::{Framing, PacketCodec};
pub use commands::Command;
pub use frame::{Frame, FrameClass, PacketFlags, ResponseFrame};
pub use registry::{DecoderRegistry, ResponseKey};
pub use responses::Response;
pub use variant::{ProtocolVariant, SPHERO_CLASSIC, SPHERO_V2};
