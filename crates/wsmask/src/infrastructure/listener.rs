//! Listener: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting client connections, numbering them, and spawning one Tokio
//!    task per connection.
//! 3. Running each session: upgrade response → backend dial → keep-alive →
//!    relay until either side is done.
//! 4. Stopping the accept loop when the `running` flag is cleared.
//!
//! Sessions are fully isolated: a failed handshake, dial or relay is logged
//! and only closes that client's connection.  There is no connection limit.

use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::application::{relay, send_upgrade_response, RelaySummary};
use crate::domain::TunnelConfig;
use crate::infrastructure::backend::{dial_backend, enable_keepalive};

/// How often the accept loop wakes up to check the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Pause after a failed `accept()` so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// A bound tunnel listener.
///
/// Splitting [`bind`](Self::bind) from [`run`](Self::run) lets callers learn
/// the actual port when binding to port 0.
pub struct TunnelServer {
    listener: TcpListener,
    config: Arc<TunnelConfig>,
}

impl TunnelServer {
    /// Binds the listener on `config.listen_addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the port is already in use or the process lacks
    /// permission to bind.  This is fatal for the process.
    pub async fn bind(config: TunnelConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr)
            .await
            .with_context(|| format!("failed to bind listener on {}", config.listen_addr))?;

        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    /// Returns the address the listener is actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `running` is set to `false`.
    ///
    /// Sessions that are already running are not interrupted when the loop
    /// stops; they end on their own when either peer disconnects.
    pub async fn run(self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        info!("tunnel listening on {}", self.local_addr()?);

        // Only this loop touches the counter.
        let mut connection_count: u64 = 0;

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            // Use a timeout so we can periodically check the running flag.
            match timeout(ACCEPT_POLL_INTERVAL, self.listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    connection_count += 1;
                    info!("connection #{connection_count} accepted from {peer_addr}");

                    // Each session gets its own task and a shared handle on the
                    // read-only config.  Nothing is tracked after the spawn: a
                    // session owns its sockets and cleans up after itself.
                    let cfg = Arc::clone(&self.config);
                    let seq = connection_count;
                    tokio::spawn(async move {
                        handle_session(stream, peer_addr, seq, cfg).await;
                    });
                }
                Ok(Err(e)) => {
                    // Transient (e.g. the peer reset before we accepted, or
                    // the descriptor limit was hit); keep serving.
                    error!("accept error: {e}");
                    sleep(ACCEPT_ERROR_BACKOFF).await;
                }
                Err(_) => {
                    // No connection within the poll interval; re-check the flag.
                }
            }
        }

        Ok(())
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Entry point of each per-session task: runs the session and logs how it
/// ended.
async fn handle_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    seq: u64,
    config: Arc<TunnelConfig>,
) {
    let session_id = format!("#{seq} ({peer_addr})");

    match run_session(stream, &session_id, config).await {
        Ok(summary) => {
            info!(
                "session {session_id}: tunnel closed, {} ended first ({}, {} bytes)",
                summary.first.direction, summary.first.end, summary.first.bytes_forwarded
            );
            // The sibling normally gets aborted mid-read; it only has a report
            // when both directions finished at the same moment.
            match summary.second {
                Some(second) => debug!(
                    "session {session_id}: {} also finished ({}, {} bytes)",
                    second.direction, second.end, second.bytes_forwarded
                ),
                None => debug!("session {session_id}: remaining pump aborted"),
            }
        }
        Err(e) => warn!("session {session_id}: aborted: {e:#}"),
    }
}

/// Runs the complete lifecycle of one tunnel session.
///
/// 1. Writes the synthetic upgrade response (nothing is read first).
/// 2. Dials the backend within `config.dial_timeout`.
/// 3. Enables keep-alive on both sockets, best effort.
/// 4. Relays until either direction ends; both sockets are closed on return.
///
/// # Errors
///
/// Returns an error if the handshake write or the backend dial fails.  The
/// client socket is dropped (closed) on the way out; nothing else is sent.
async fn run_session(
    mut client: TcpStream,
    session_id: &str,
    config: Arc<TunnelConfig>,
) -> anyhow::Result<RelaySummary> {
    // ── Step 1: Upgrade response ──────────────────────────────────────────────
    // Sent before anything is read from the client and before the backend is
    // known to be reachable.  If the write fails there is no one to relay for.
    let written = send_upgrade_response(&mut client, &config.server_header)
        .await
        .context("failed to send upgrade response")?;
    debug!("session {session_id}: sent upgrade response ({written} bytes)");

    // ── Step 2: Backend dial ──────────────────────────────────────────────────
    // One attempt per session.  On failure the client is dropped right after
    // its handshake; it never sees an error payload.
    let authority = config.backend_authority();
    debug!("session {session_id}: connecting to {authority}");
    let backend = dial_backend(&config.backend_host, config.backend_port, config.dial_timeout)
        .await
        .context("backend unavailable")?;

    // ── Step 3: Keep-alive ────────────────────────────────────────────────────
    for (label, stream) in [("client", &client), ("backend", &backend)] {
        if let Err(e) = enable_keepalive(stream, config.keepalive_period) {
            debug!("session {session_id}: keep-alive not enabled on {label} socket: {e}");
        }
    }

    info!("session {session_id}: tunnel established to {authority}");

    // ── Step 4: Relay ─────────────────────────────────────────────────────────
    // `into_split` hands each pump an owned half, so no lock is shared
    // between the two directions.
    let summary = relay(
        client.into_split(),
        backend.into_split(),
        config.skip_count,
        session_id.to_string(),
    )
    .await
    .context("relay task panicked")?;

    Ok(summary)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
