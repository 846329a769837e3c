//! Packet-skip state machine for the client → backend direction.
//!
//! A "packet" here is one successful read from the client socket, whatever
//! its length.  The first `skip_count` packets are dropped on the floor; from
//! then on every packet is forwarded for the rest of the session.  The window
//! never re-opens.
//!
//! ```text
//!   skip_count = 2
//!
//!   read #1 "A"  → Discard { ordinal: 1 }
//!   read #2 "B"  → Discard { ordinal: 2 }
//!   read #3 "C"  → Forward
//!   read #4 ...  → Forward
//! ```
//!
//! The skipper is owned by exactly one pump loop, so it needs no
//! synchronisation.

/// What to do with the chunk that was just read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkVerdict {
    /// Drop the chunk.  `ordinal` is 1-based: the first discarded chunk is 1.
    Discard { ordinal: usize },
    /// Write the chunk to the backend unchanged.
    Forward,
}

/// Counts discarded read events until the configured skip count is reached.
///
/// # Invariants
///
/// - `skipped` starts at 0 and never decreases.
/// - `skipped` never exceeds `skip_count`.
#[derive(Debug, Clone)]
pub struct PacketSkipper {
    skip_count: usize,
    skipped: usize,
}

impl PacketSkipper {
    /// Creates a skipper that discards the first `skip_count` chunks.
    pub fn new(skip_count: usize) -> Self {
        Self {
            skip_count,
            skipped: 0,
        }
    }

    /// Classifies the next chunk read from the client and advances the state.
    ///
    /// Call exactly once per successful, non-empty read.
    pub fn classify(&mut self) -> ChunkVerdict {
        if self.skipped < self.skip_count {
            self.skipped += 1;
            ChunkVerdict::Discard {
                ordinal: self.skipped,
            }
        } else {
            ChunkVerdict::Forward
        }
    }

    /// Returns `true` while chunks are still being discarded.
    pub fn is_skipping(&self) -> bool {
        self.skipped < self.skip_count
    }

    /// Number of chunks discarded so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// The configured number of chunks to discard.
    pub fn skip_count(&self) -> usize {
        self.skip_count
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
