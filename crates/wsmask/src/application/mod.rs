//! Application layer for wsmask.
//!
//! Knows *what* a tunnel session does, generic over any async byte stream so
//! it can be driven by real sockets, in-memory duplex pipes or scripted mocks.
//!
//! - [`handshake`] writes the synthetic upgrade response.
//! - [`relay`] runs the two pump loops and tears the session down when the
//!   first one ends.
//!
//! Opening sockets, dialing the backend and socket options live in the
//! infrastructure layer.

pub mod handshake;
pub mod relay;

pub use handshake::send_upgrade_response;
pub use relay::{
    pump_backend_to_client, pump_client_to_backend, relay, Direction, PumpEnd, PumpReport,
    RelaySummary, PUMP_BUFFER_SIZE,
};
