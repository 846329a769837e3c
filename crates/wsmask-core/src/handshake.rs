//! Synthetic WebSocket upgrade response.
//!
//! Every accepted connection is greeted with the same response shape:
//!
//! ```text
//! HTTP/1.1 101 Switching Protocols\r\n
//! Connection: Upgrade\r\n
//! Date: Sun, 06 Nov 1994 08:49:37 GMT\r\n
//! Sec-WebSocket-Accept: <base64 of 20 random bytes>\r\n
//! Upgrade: websocket\r\n
//! Server: <identifier>\r\n\r\n
//! ```
//!
//! # This is not a real handshake
//!
//! RFC 6455 derives `Sec-WebSocket-Accept` from the client's
//! `Sec-WebSocket-Key`.  Here the client request is never read, so the token
//! is simply 20 fresh random bytes encoded as standard base64.  The response
//! only has to *look* like a successful upgrade to passive observers.
//!
//! Everything in this module is pure: the caller decides when to write the
//! bytes and to which socket.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes behind each `Sec-WebSocket-Accept` token.
pub const ACCEPT_TOKEN_LEN: usize = 20;

/// `strftime` pattern for the IMF-fixdate form of RFC 1123 used by HTTP.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Generates a fresh `Sec-WebSocket-Accept` token.
///
/// The token is [`ACCEPT_TOKEN_LEN`] bytes from the operating system's
/// CSPRNG, encoded with the standard base64 alphabet (28 characters with one
/// `=` of padding).
///
/// # Example
///
/// ```rust
/// use wsmask_core::generate_accept_token;
///
/// let token = generate_accept_token();
/// assert_eq!(token.len(), 28);
/// ```
pub fn generate_accept_token() -> String {
    let mut raw = [0u8; ACCEPT_TOKEN_LEN];
    OsRng.fill_bytes(&mut raw);
    STANDARD.encode(raw)
}

/// Formats `at` as an HTTP `Date` header value.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use wsmask_core::http_date;
///
/// let at = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
/// assert_eq!(http_date(at), "Sun, 06 Nov 1994 08:49:37 GMT");
/// ```
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

/// A fully populated upgrade response, ready to be serialised.
///
/// Build one per session with [`UpgradeResponse::new`]; every call draws a
/// new accept token and stamps the current time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeResponse {
    /// Value of the `Date` header.
    pub date: String,
    /// Value of the `Sec-WebSocket-Accept` header.
    pub accept_token: String,
    /// Value of the `Server` header.
    pub server: String,
}

impl UpgradeResponse {
    /// Creates a response stamped with the current time and a fresh token.
    pub fn new(server: impl Into<String>) -> Self {
        Self::with_parts(server, http_date(Utc::now()), generate_accept_token())
    }

    /// Creates a response from explicit header values.
    ///
    /// Mostly useful for tests and benchmarks that need stable output.
    pub fn with_parts(
        server: impl Into<String>,
        date: impl Into<String>,
        accept_token: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            accept_token: accept_token.into(),
            server: server.into(),
        }
    }

    /// Serialises the response into the exact bytes sent on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for UpgradeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HTTP/1.1 101 Switching Protocols\r\n\
             Connection: Upgrade\r\n\
             Date: {}\r\n\
             Sec-WebSocket-Accept: {}\r\n\
             Upgrade: websocket\r\n\
             Server: {}\r\n\r\n",
            self.date, self.accept_token, self.server
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
