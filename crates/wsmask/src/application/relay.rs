//! Relay engine: two pump loops and their shutdown coordination.
//!
//! ```text
//!              ┌──────────── client → backend pump ────────────┐
//!  client_read ┤  read ─► PacketSkipper ─► (discard | write)   ├ backend_write
//!              └───────────────────────────────────────────────┘
//!              ┌──────────── backend → client pump ────────────┐
//! backend_read ┤  read ─► write verbatim                       ├ client_write
//!              └───────────────────────────────────────────────┘
//! ```
//!
//! Each pump runs in its own Tokio task and owns exactly one read half and
//! one write half, so no locking is needed.  The first pump to finish (clean
//! EOF, read error or write error) wins: [`relay`] aborts the other task,
//! which drops its halves.  Once every half of a socket has been dropped the
//! socket is closed, so a pump blocked on an idle read is released without
//! any timeout.

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinError;
use tracing::{debug, warn};

use wsmask_core::{ChunkVerdict, PacketSkipper};

/// Size of the read buffer owned by each pump.
pub const PUMP_BUFFER_SIZE: usize = 4096;

/// Which way a pump moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToBackend => f.write_str("client->backend"),
            Direction::BackendToClient => f.write_str("backend->client"),
        }
    }
}

/// Why a pump stopped.
#[derive(Debug)]
pub enum PumpEnd {
    /// The source reported a clean end of stream.
    Eof,
    /// Reading from the source failed.
    ReadError(io::Error),
    /// Writing to the sink failed.
    WriteError(io::Error),
}

impl fmt::Display for PumpEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpEnd::Eof => f.write_str("end of stream"),
            PumpEnd::ReadError(e) => write!(f, "read error: {e}"),
            PumpEnd::WriteError(e) => write!(f, "write error: {e}"),
        }
    }
}

/// What a pump did before it stopped.  Counters are for logging only.
#[derive(Debug)]
pub struct PumpReport {
    pub direction: Direction,
    /// Bytes written to the sink.
    pub bytes_forwarded: u64,
    /// Reads discarded by the packet skipper.
    pub chunks_skipped: usize,
    pub end: PumpEnd,
}

/// Outcome of one relay: the pump that ended the session and, if it also
/// completed before being aborted, its sibling.
#[derive(Debug)]
pub struct RelaySummary {
    pub first: PumpReport,
    pub second: Option<PumpReport>,
}

/// Copies client bytes to the backend, discarding the first reads as told by
/// `skipper`.
///
/// Each discarded read counts as one skip whatever its length.  Returns when
/// the client reaches EOF or either side errors.
pub async fn pump_client_to_backend<R, W>(
    reader: R,
    writer: W,
    skipper: PacketSkipper,
    session_id: &str,
) -> PumpReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pump(Direction::ClientToBackend, reader, writer, skipper, session_id).await
}

/// Copies backend bytes to the client verbatim.
pub async fn pump_backend_to_client<R, W>(reader: R, writer: W, session_id: &str) -> PumpReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pump(
        Direction::BackendToClient,
        reader,
        writer,
        PacketSkipper::new(0),
        session_id,
    )
    .await
}

async fn pump<R, W>(
    direction: Direction,
    mut reader: R,
    mut writer: W,
    mut skipper: PacketSkipper,
    session_id: &str,
) -> PumpReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUFFER_SIZE];
    let mut bytes_forwarded: u64 = 0;

    let end = loop {
        // A zero-length read is a clean EOF from the peer.
        let n = match reader.read(&mut buf).await {
            Ok(0) => break PumpEnd::Eof,
            Ok(n) => n,
            Err(e) => break PumpEnd::ReadError(e),
        };

        // Every read counts as one packet for the skipper, whatever its size.
        if let ChunkVerdict::Discard { ordinal } = skipper.classify() {
            debug!(
                "session {session_id}: skipping packet {ordinal}/{} ({n} bytes)",
                skipper.skip_count()
            );
            continue;
        }

        if let Err(e) = writer.write_all(&buf[..n]).await {
            break PumpEnd::WriteError(e);
        }
        bytes_forwarded += n as u64;
    };

    match &end {
        PumpEnd::Eof => {
            debug!("session {session_id}: {direction} reached EOF after {bytes_forwarded} bytes")
        }
        other => {
            warn!("session {session_id}: {direction} stopped after {bytes_forwarded} bytes: {other}")
        }
    }

    PumpReport {
        direction,
        bytes_forwarded,
        chunks_skipped: skipper.skipped(),
        end,
    }
}

/// Runs both pumps until the first one ends, then tears the other down.
///
/// `skip_count` initial client reads are discarded before anything reaches
/// the backend.  When this returns, every half passed in has been dropped.
///
/// # Errors
///
/// Returns the [`JoinError`] if the finishing pump task panicked.  The
/// sibling is aborted in that case too.
pub async fn relay<CR, CW, BR, BW>(
    client: (CR, CW),
    backend: (BR, BW),
    skip_count: usize,
    session_id: String,
) -> Result<RelaySummary, JoinError>
where
    CR: AsyncRead + Unpin + Send + 'static,
    CW: AsyncWrite + Unpin + Send + 'static,
    BR: AsyncRead + Unpin + Send + 'static,
    BW: AsyncWrite + Unpin + Send + 'static,
{
    let (client_read, client_write) = client;
    let (backend_read, backend_write) = backend;

    // ── Spawn the two pumps ───────────────────────────────────────────────────
    // Each task takes ownership of one read half and the opposite write half.
    // The skipper lives inside the client->backend task only.
    let c2b_id = session_id.clone();
    let mut client_to_backend = tokio::spawn(async move {
        pump_client_to_backend(
            client_read,
            backend_write,
            PacketSkipper::new(skip_count),
            &c2b_id,
        )
        .await
    });

    let b2c_id = session_id.clone();
    let mut backend_to_client = tokio::spawn(async move {
        pump_backend_to_client(backend_read, client_write, &b2c_id).await
    });

    // ── Wait for the first pump to finish ─────────────────────────────────────
    // Whichever handle resolves first is consumed here; the other is moved
    // out below and aborted.
    let winner = tokio::select! {
        res = &mut client_to_backend => (Direction::ClientToBackend, res),
        res = &mut backend_to_client => (Direction::BackendToClient, res),
    };

    let (first, sibling) = match winner {
        (Direction::ClientToBackend, res) => (res, backend_to_client),
        (Direction::BackendToClient, res) => (res, client_to_backend),
    };

    // ── Tear down the sibling ─────────────────────────────────────────────────
    // The sibling is usually parked on a read that will never complete (an
    // idle peer), so it is aborted rather than asked to stop.  Awaiting it
    // afterwards guarantees its halves are dropped, and both sockets closed,
    // by the time we return.  It reports `Some` only if it had already
    // finished on its own before the abort landed.
    sibling.abort();
    let second = match sibling.await {
        Ok(report) => Some(report),
        Err(e) if e.is_cancelled() => None,
        Err(e) => {
            warn!("session {session_id}: sibling pump failed: {e}");
            None
        }
    };

    Ok(RelaySummary {
        first: first?,
        second,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
