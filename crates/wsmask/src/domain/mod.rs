//! Domain layer for wsmask.
//!
//! Pure configuration types with no I/O.  The infrastructure layer and
//! `main.rs` are responsible for populating them from the command line,
//! environment variables and the optional TOML file.

pub mod config;

pub use config::{ConfigError, ConfigLayer, TunnelConfig, DEFAULT_SERVER_HEADER};
