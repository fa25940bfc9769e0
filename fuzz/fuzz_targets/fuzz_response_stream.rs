//! Fuzz target: `ConnectionSession::receive`
//!
//! The first input byte picks the device family and a chunk size; the rest
//! is fed as notification chunks through reassembly and dispatch.
//! Asserts that nothing panics and the buffer never passes its ceiling.
//!
//! cargo fuzz run fuzz_response_stream

#![no_main]

use libfuzzer_sys::fuzz_target;
use spherolink::EngineConfig;
use spherolink::error::FrameError;
use spherolink::protocol::variant::{SPHERO_CLASSIC, SPHERO_V2};
use spherolink::session::ConnectionSession;

const CEILING: usize = 256;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, stream)) = data.split_first() else {
        return;
    };

    let variant = if selector & 0x80 == 0 { &SPHERO_CLASSIC } else { &SPHERO_V2 };
    let chunk_size = usize::from(selector & 0x3F) + 1;
    let config = EngineConfig {
        reassembly_ceiling: CEILING,
        ..EngineConfig::default()
    };
    let mut session = ConnectionSession::new(variant, &config);

    for chunk in stream.chunks(chunk_size) {
        session.receive(chunk, |item| {
            if let Err(FrameError::BufferOverflow { discarded }) = item {
                assert!(discarded > CEILING, "overflow reported below ceiling");
            }
        });
        assert!(session.buffered_bytes() <= CEILING);
    }
});
