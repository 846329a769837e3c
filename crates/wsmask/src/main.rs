//! wsmask: entry point.
//!
//! Listens for TCP clients, answers each one with a synthetic WebSocket
//! upgrade response and relays the rest of the connection to a fixed
//! backend (typically an SSH server).
//!
//! # Usage
//!
//! ```text
//! wsmask [OPTIONS]
//!
//! Options:
//!   --port          <PORT>  Listen port                      [env: PORT, default: 8080]
//!   --bind          <IP>    Listen address                   [env: BIND_ADDR, default: 0.0.0.0]
//!   --dest-host     <HOST>  Backend host (required)          [env: DHOST]
//!   --dest-port     <PORT>  Backend port                     [env: DPORT, default: 22]
//!   --skip-packets  <N>     Client reads discarded up front  [env: PACKSKIP, default: 0]
//!   --server-header <NAME>  Value of the Server: header      [env: SERVER_HEADER]
//!   --dial-timeout  <SECS>  Backend dial timeout             [env: DIAL_TIMEOUT_SECS, default: 15]
//!   --probe-timeout <SECS>  Startup probe timeout            [env: PROBE_TIMEOUT_SECS, default: 10]
//!   --keepalive     <SECS>  TCP keep-alive period            [env: KEEPALIVE_SECS, default: 60]
//!   --config        <PATH>  Optional TOML config file        [env: WSMASK_CONFIG]
//! ```
//!
//! Command-line flags beat environment variables, which beat the config
//! file, which beats the built-in defaults.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wsmask::domain::config::{BackendLayer, ListenLayer, TimeoutsLayer, TunnelLayer};
use wsmask::domain::{ConfigLayer, TunnelConfig};
use wsmask::infrastructure::{load_config_file, probe_backend, TunnelServer};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// TCP tunnel disguised as a WebSocket upgrade.
///
/// Every flag is optional on the command line; unset flags fall back to the
/// environment, then to the config file, then to defaults.
#[derive(Debug, Parser)]
#[command(
    name = "wsmask",
    about = "TCP tunnel that greets clients with a synthetic WebSocket upgrade",
    version
)]
struct Cli {
    /// TCP port to listen on [default: 8080].
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// IP address to bind the listener to [default: 0.0.0.0].
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// Backend host every session is relayed to.
    #[arg(long, env = "DHOST")]
    dest_host: Option<String>,

    /// Backend TCP port [default: 22].
    #[arg(long, env = "DPORT")]
    dest_port: Option<u16>,

    /// Number of initial client reads to discard in each session [default: 0].
    #[arg(long, env = "PACKSKIP")]
    skip_packets: Option<usize>,

    /// Value of the `Server:` header in the upgrade response.
    #[arg(long, env = "SERVER_HEADER")]
    server_header: Option<String>,

    /// Backend dial timeout in seconds [default: 15].
    #[arg(long, env = "DIAL_TIMEOUT_SECS")]
    dial_timeout: Option<u64>,

    /// Startup connectivity probe timeout in seconds [default: 10].
    #[arg(long, env = "PROBE_TIMEOUT_SECS")]
    probe_timeout: Option<u64>,

    /// TCP keep-alive period in seconds [default: 60].
    #[arg(long, env = "KEEPALIVE_SECS")]
    keepalive: Option<u64>,

    /// Path of an optional TOML config file.
    #[arg(long, env = "WSMASK_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// The highest-priority configuration layer: flags and environment.
    fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            listen: ListenLayer {
                port: self.port,
                bind: self.bind.clone(),
            },
            backend: BackendLayer {
                host: self.dest_host.clone(),
                port: self.dest_port,
            },
            tunnel: TunnelLayer {
                skip_packets: self.skip_packets,
                server_header: self.server_header.clone(),
            },
            timeouts: TimeoutsLayer {
                dial_secs: self.dial_timeout,
                probe_secs: self.probe_timeout,
                keepalive_secs: self.keepalive,
            },
        }
    }

    /// Merges flags/environment over the optional config file and resolves
    /// the result into a [`TunnelConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded, no backend host
    /// is configured, or the bind address is not an IP address.
    fn into_tunnel_config(self) -> anyhow::Result<TunnelConfig> {
        let file_layer = match &self.config {
            Some(path) => load_config_file(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => ConfigLayer::default(),
        };

        self.to_layer()
            .or(file_layer)
            .resolve()
            .context("invalid configuration")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Initialise `tracing_subscriber` (level from `RUST_LOG`, default `info`).
/// 2. Parse flags/environment and build the [`TunnelConfig`].
/// 3. Probe the backend once; a failure is only a warning.
/// 4. Bind the listener (fatal on failure) and serve until Ctrl+C.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_tunnel_config()?;

    info!("=== wsmask TCP tunnel ===");
    info!("backend:      {}", config.backend_authority());
    info!("listen:       {}", config.listen_addr);
    info!("skip packets: {}", config.skip_count);
    info!("server:       {}", config.server_header);

    if !probe_backend(&config.backend_host, config.backend_port, config.probe_timeout).await {
        info!("initial connectivity check failed; starting anyway");
    }

    let server = TunnelServer::bind(config).await?;

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, no longer accepting connections");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    server.run(running).await?;

    info!("wsmask stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_flags_populate_layer() {
        // Arrange
        let cli = Cli::parse_from([
            "wsmask",
            "--port",
            "9000",
            "--dest-host",
            "vps.example.net",
            "--dest-port",
            "2222",
            "--skip-packets",
            "2",
        ]);

        // Act
        let layer = cli.to_layer();

        // Assert
        assert_eq!(layer.listen.port, Some(9000));
        assert_eq!(layer.backend.host.as_deref(), Some("vps.example.net"));
        assert_eq!(layer.backend.port, Some(2222));
        assert_eq!(layer.tunnel.skip_packets, Some(2));
    }

    #[test]
    fn test_cli_timeouts_become_durations() {
        let cli = Cli::parse_from([
            "wsmask",
            "--dest-host",
            "h",
            "--dial-timeout",
            "7",
            "--probe-timeout",
            "3",
            "--keepalive",
            "30",
        ]);

        let cfg = cli.into_tunnel_config().unwrap();

        assert_eq!(cfg.dial_timeout, Duration::from_secs(7));
        assert_eq!(cfg.probe_timeout, Duration::from_secs(3));
        assert_eq!(cfg.keepalive_period, Duration::from_secs(30));
    }

    #[test]
    fn test_cli_bind_and_port_form_listen_addr() {
        let cli = Cli::parse_from([
            "wsmask",
            "--dest-host",
            "h",
            "--bind",
            "127.0.0.1",
            "--port",
            "8443",
        ]);

        let cfg = cli.into_tunnel_config().unwrap();

        assert_eq!(cfg.listen_addr.to_string(), "127.0.0.1:8443");
    }

    #[test]
    fn test_cli_invalid_bind_returns_error() {
        let cli = Cli::parse_from(["wsmask", "--dest-host", "h", "--bind", "not.an.ip"]);

        let result = cli.into_tunnel_config();

        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_non_numeric_port() {
        let result = Cli::try_parse_from(["wsmask", "--port", "eighty"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_flags_override_config_file() {
        // Arrange: file sets host and skip count, flag overrides skip count
        let path = std::env::temp_dir().join(format!(
            "wsmask-main-test-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "[backend]\nhost = \"from-file\"\nport = 2200\n[tunnel]\nskip_packets = 9\n",
        )
        .unwrap();
        let path_arg = path.to_string_lossy().to_string();

        let cli = Cli::parse_from([
            "wsmask",
            "--config",
            path_arg.as_str(),
            "--dest-host",
            "from-flag",
            "--skip-packets",
            "1",
        ]);

        // Act
        let result = cli.into_tunnel_config();
        let _ = std::fs::remove_file(&path);
        let cfg = result.unwrap();

        // Assert
        assert_eq!(cfg.backend_host, "from-flag");
        assert_eq!(cfg.skip_count, 1);
    }

    #[test]
    fn test_cli_missing_config_file_returns_error() {
        let cli = Cli::parse_from([
            "wsmask",
            "--dest-host",
            "h",
            "--config",
            "/nonexistent/wsmask.toml",
        ]);

        let err = cli.into_tunnel_config().unwrap_err();

        assert!(format!("{err:#}").contains("failed to load config file"));
    }
}
