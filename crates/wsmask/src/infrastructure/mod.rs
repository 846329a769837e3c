//! Infrastructure layer for wsmask.
//!
//! Everything that touches the operating system:
//!
//! - Binding the listener and spawning one task per accepted connection
//! - Dialing the backend with a timeout and tuning TCP keep-alive
//! - The one-off startup connectivity probe
//! - Reading the optional TOML config file

pub mod backend;
pub mod config_file;
pub mod listener;

pub use backend::{dial_backend, enable_keepalive, probe_backend, DialError};
pub use config_file::{load_config_file, ConfigFileError};
pub use listener::TunnelServer;
