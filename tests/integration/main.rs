//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below exercises one slice of the connection lifecycle
//! against the mock GATT transport.  Everything runs on the host with no
//! radio required.

mod handshake_tests;
mod mock_transport;
mod streaming_tests;
