//! # wsmask-core
//!
//! Shared, I/O-free building blocks for the wsmask TCP tunnel.
//!
//! wsmask accepts a TCP connection, answers it with a fabricated WebSocket
//! `101 Switching Protocols` response and then relays raw bytes to a fixed
//! backend.  To a passive observer the stream looks like an upgraded
//! WebSocket session; no WebSocket framing ever follows.
//!
//! This crate holds the two pieces of that behaviour that need no sockets:
//!
//! - **`handshake`** – Builds the upgrade response: the random
//!   `Sec-WebSocket-Accept` token, the RFC 1123 `Date` header and the exact
//!   byte layout written to the client.
//!
//! - **`skip`** – The packet-skip state machine.  The first *N* read events
//!   from a client are discarded before anything is forwarded, which defeats
//!   naive fingerprinting of the first bytes of a stream.
//!
//! The service crate (`wsmask`) wires both into the per-connection relay.

pub mod handshake;
pub mod skip;

pub use handshake::{generate_accept_token, http_date, UpgradeResponse, ACCEPT_TOKEN_LEN};
pub use skip::{ChunkVerdict, PacketSkipper};
