//! Handshake emitter.
//!
//! Writes the fabricated `101 Switching Protocols` response to a freshly
//! accepted client.  Nothing is read from the client first: whatever request
//! it sent (if any) stays in the socket buffer and becomes the first packet
//! seen by the client → backend pump.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use wsmask_core::UpgradeResponse;

/// Writes one upgrade response with a fresh accept token to `writer`.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns the I/O error if the client already went away (reset, broken
/// pipe).  Callers must abort the session without dialing the backend.
pub async fn send_upgrade_response<W>(writer: &mut W, server: &str) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let bytes = UpgradeResponse::new(server).to_bytes();
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(bytes.len())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
