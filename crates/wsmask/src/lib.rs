//! wsmask library crate.
//!
//! A TCP tunnel that greets every client with a fabricated WebSocket
//! `101 Switching Protocols` response and then relays raw bytes to one fixed
//! backend, optionally discarding the client's first few reads.
//!
//! # Architecture
//!
//! ```text
//! Client (looks like a WebSocket upgrade)
//!         ↕
//! [wsmask]
//!   ├── domain/           TunnelConfig, config layering
//!   ├── application/      Handshake emitter, pump loops, relay coordination
//!   └── infrastructure/
//!         ├── listener/   Accept loop, per-session task
//!         ├── backend/    Dial with timeout, keep-alive, startup probe
//!         └── config_file/ Optional TOML file
//!         ↕
//! Backend (SSH or any other TCP service)
//! ```
//!
//! # Layer rules
//!
//! - `domain` does no I/O.
//! - `application` is generic over `AsyncRead`/`AsyncWrite`; it never opens
//!   sockets.
//! - `infrastructure` owns every socket and the Tokio listener.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: handshake emitter and relay engine.
pub mod application;

/// Infrastructure layer: listener, backend connections, config file.
pub mod infrastructure;
