//! Backend connections: per-session dial, keep-alive and the startup probe.
//!
//! The backend is always the same `host:port`.  The host is resolved on
//! every dial so a DNS change reaches new sessions without a restart.

use std::io;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{info, warn};

/// Errors from dialing the backend.
#[derive(Debug, Error)]
pub enum DialError {
    /// The connect did not complete within the allowed time.
    #[error("timed out after {timeout:?} connecting to {authority}")]
    Timeout {
        authority: String,
        timeout: Duration,
    },

    /// Resolution or the TCP connect itself failed.
    #[error("failed to connect to {authority}: {source}")]
    Connect {
        authority: String,
        #[source]
        source: io::Error,
    },
}

/// Opens a TCP connection to `host:port` within `dial_timeout`.
///
/// # Errors
///
/// [`DialError::Timeout`] when the deadline passes first, otherwise
/// [`DialError::Connect`] with the underlying I/O error.  There is no retry.
pub async fn dial_backend(
    host: &str,
    port: u16,
    dial_timeout: Duration,
) -> Result<TcpStream, DialError> {
    match timeout(dial_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(DialError::Connect {
            authority: format!("{host}:{port}"),
            source,
        }),
        Err(_) => Err(DialError::Timeout {
            authority: format!("{host}:{port}"),
            timeout: dial_timeout,
        }),
    }
}

/// Turns on TCP keep-alive probing for `stream`: first probe after `period`
/// of idleness, then one probe every `period`.
///
/// Keeps NAT boxes and firewalls from reaping quiet tunnels.  On targets
/// where socket2 cannot set the probe interval only the idle time is
/// applied.  Callers treat a failure as non-fatal.
pub fn enable_keepalive(stream: &TcpStream, period: Duration) -> io::Result<()> {
    let keepalive = TcpKeepalive::new().with_time(period);

    #[cfg(any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "fuchsia",
        target_os = "illumos",
        target_os = "ios",
        target_os = "linux",
        target_os = "macos",
        target_os = "netbsd",
        target_os = "tvos",
        target_os = "watchos",
        target_os = "windows",
    ))]
    let keepalive = keepalive.with_interval(period);

    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

/// Attempts one timed connection to the backend and logs the result.
///
/// Used once at startup so a misconfigured backend shows up in the logs
/// immediately.  The connection is closed straight away; the return value is
/// informational only and never stops the listener from starting.
pub async fn probe_backend(host: &str, port: u16, probe_timeout: Duration) -> bool {
    info!("checking TCP connectivity to {host}:{port}...");

    match dial_backend(host, port, probe_timeout).await {
        Ok(_stream) => {
            info!("backend reachable at {host}:{port}");
            true
        }
        Err(e) => {
            warn!("backend connectivity check failed: {e}");
            false
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
