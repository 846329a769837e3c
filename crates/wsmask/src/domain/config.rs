//! Tunnel configuration.
//!
//! [`TunnelConfig`] is built once at startup and then shared read-only with
//! every session through an `Arc`.  Sessions never read process state such as
//! environment variables; whatever they need is passed in here.
//!
//! # Layering
//!
//! Settings come from up to three sources.  Each source is expressed as a
//! [`ConfigLayer`] where every field is optional; layers are merged with
//! [`ConfigLayer::or`] (the receiver wins) and the result is resolved against
//! the built-in defaults:
//!
//! ```text
//! command line / environment  >  TOML file  >  TunnelConfig::default()
//! ```

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// `Server:` header value used when none is configured.
pub const DEFAULT_SERVER_HEADER: &str = concat!("wsmask/", env!("CARGO_PKG_VERSION"));

/// All runtime settings for the tunnel.
///
/// ```rust
/// use wsmask::domain::TunnelConfig;
///
/// let cfg = TunnelConfig::default();
/// assert_eq!(cfg.listen_addr.port(), 8080);
/// assert_eq!(cfg.backend_port, 22);
/// assert_eq!(cfg.skip_count, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Address the listener binds to.
    pub listen_addr: SocketAddr,

    /// Hostname or IP of the backend every session is relayed to.
    ///
    /// Resolved on each dial, so DNS changes are picked up by new sessions.
    pub backend_host: String,

    /// TCP port of the backend.
    pub backend_port: u16,

    /// Number of initial client reads discarded in every session.
    pub skip_count: usize,

    /// Value of the `Server:` header in the upgrade response.
    pub server_header: String,

    /// Upper bound on the per-session backend dial.
    pub dial_timeout: Duration,

    /// Upper bound on the one-off connectivity probe at startup.
    pub probe_timeout: Duration,

    /// TCP keep-alive period applied to both sockets of a session.
    pub keepalive_period: Duration,
}

impl TunnelConfig {
    /// Returns the backend as `host:port`, bracketing IPv6 literals.
    pub fn backend_authority(&self) -> String {
        if self.backend_host.contains(':') && !self.backend_host.starts_with('[') {
            format!("[{}]:{}", self.backend_host, self.backend_port)
        } else {
            format!("{}:{}", self.backend_host, self.backend_port)
        }
    }
}

impl Default for TunnelConfig {
    /// | Field            | Default         |
    /// |------------------|-----------------|
    /// | listen_addr      | `0.0.0.0:8080`  |
    /// | backend_host     | empty (unset)   |
    /// | backend_port     | 22              |
    /// | skip_count       | 0               |
    /// | server_header    | `wsmask/<ver>`  |
    /// | dial_timeout     | 15 seconds      |
    /// | probe_timeout    | 10 seconds      |
    /// | keepalive_period | 60 seconds      |
    ///
    /// There is no usable default backend: the empty host only fills the slot
    /// for struct-update syntax.  [`ConfigLayer::resolve`] refuses to produce
    /// a config without a host.
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backend_host: String::new(),
            backend_port: 22,
            skip_count: 0,
            server_header: DEFAULT_SERVER_HEADER.to_string(),
            dial_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(10),
            keepalive_period: Duration::from_secs(60),
        }
    }
}

// ── Layered sources ───────────────────────────────────────────────────────────

/// Errors raised while turning configuration layers into a [`TunnelConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No layer named a backend host.
    #[error("backend host is required (set DHOST, --dest-host or backend.host)")]
    MissingBackendHost,

    /// The listen bind address is not an IP address.
    #[error("invalid bind address '{addr}': {source}")]
    InvalidBindAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },
}

/// `[listen]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenLayer {
    pub port: Option<u16>,
    pub bind: Option<String>,
}

/// `[backend]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendLayer {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// `[tunnel]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TunnelLayer {
    pub skip_packets: Option<usize>,
    pub server_header: Option<String>,
}

/// `[timeouts]` section, all values in whole seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsLayer {
    pub dial_secs: Option<u64>,
    pub probe_secs: Option<u64>,
    pub keepalive_secs: Option<u64>,
}

/// One partially specified source of configuration.
///
/// Deserialises directly from the TOML config file:
///
/// ```toml
/// [listen]
/// port = 8080
/// bind = "0.0.0.0"
///
/// [backend]
/// host = "vps.example.net"
/// port = 22
///
/// [tunnel]
/// skip_packets = 1
/// server_header = "nginx"
///
/// [timeouts]
/// dial_secs = 15
/// probe_secs = 10
/// keepalive_secs = 60
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub listen: ListenLayer,
    pub backend: BackendLayer,
    pub tunnel: TunnelLayer,
    pub timeouts: TimeoutsLayer,
}

impl ConfigLayer {
    /// Fills every unset field of `self` from `lower`.
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            listen: ListenLayer {
                port: self.listen.port.or(lower.listen.port),
                bind: self.listen.bind.or(lower.listen.bind),
            },
            backend: BackendLayer {
                host: self.backend.host.or(lower.backend.host),
                port: self.backend.port.or(lower.backend.port),
            },
            tunnel: TunnelLayer {
                skip_packets: self.tunnel.skip_packets.or(lower.tunnel.skip_packets),
                server_header: self.tunnel.server_header.or(lower.tunnel.server_header),
            },
            timeouts: TimeoutsLayer {
                dial_secs: self.timeouts.dial_secs.or(lower.timeouts.dial_secs),
                probe_secs: self.timeouts.probe_secs.or(lower.timeouts.probe_secs),
                keepalive_secs: self.timeouts.keepalive_secs.or(lower.timeouts.keepalive_secs),
            },
        }
    }

    /// Resolves the merged layer against the defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingBackendHost`] if no layer set a backend host,
    /// [`ConfigError::InvalidBindAddress`] if the bind address is not an IP.
    pub fn resolve(self) -> Result<TunnelConfig, ConfigError> {
        let defaults = TunnelConfig::default();

        let backend_host = self
            .backend
            .host
            .filter(|h| !h.trim().is_empty())
            .ok_or(ConfigError::MissingBackendHost)?;

        let bind_ip = match self.listen.bind {
            Some(addr) => addr
                .parse::<IpAddr>()
                .map_err(|source| ConfigError::InvalidBindAddress { addr, source })?,
            None => defaults.listen_addr.ip(),
        };
        let listen_port = self.listen.port.unwrap_or(defaults.listen_addr.port());

        let secs = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_secs).unwrap_or(fallback)
        };

        Ok(TunnelConfig {
            listen_addr: SocketAddr::new(bind_ip, listen_port),
            backend_host,
            backend_port: self.backend.port.unwrap_or(defaults.backend_port),
            skip_count: self.tunnel.skip_packets.unwrap_or(defaults.skip_count),
            server_header: self
                .tunnel
                .server_header
                .unwrap_or(defaults.server_header),
            dial_timeout: secs(self.timeouts.dial_secs, defaults.dial_timeout),
            probe_timeout: secs(self.timeouts.probe_secs, defaults.probe_timeout),
            keepalive_period: secs(self.timeouts.keepalive_secs, defaults.keepalive_period),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listen_port_is_8080() {
        let cfg = TunnelConfig::default();
        assert_eq!(cfg.listen_addr.port(), 8080);
        assert!(cfg.listen_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_timeouts() {
        // Dial and probe deliberately use different bounds.
        let cfg = TunnelConfig::default();
        assert_eq!(cfg.dial_timeout, Duration::from_secs(15));
        assert_eq!(cfg.probe_timeout, Duration::from_secs(10));
        assert_eq!(cfg.keepalive_period, Duration::from_secs(60));
    }

    #[test]
    fn test_default_has_no_backend_host() {
        let cfg = TunnelConfig::default();
        assert!(cfg.backend_host.is_empty());
        assert_eq!(cfg.backend_port, 22);
    }

    #[test]
    fn test_default_server_header_carries_version() {
        let cfg = TunnelConfig::default();
        assert!(cfg.server_header.starts_with("wsmask/"));
        assert!(cfg.server_header.len() > "wsmask/".len());
    }

    #[test]
    fn test_backend_authority_hostname() {
        let cfg = TunnelConfig {
            backend_host: "vps.example.net".to_string(),
            backend_port: 2222,
            ..TunnelConfig::default()
        };
        assert_eq!(cfg.backend_authority(), "vps.example.net:2222");
    }

    fn layer_with_host(host: &str) -> ConfigLayer {
        ConfigLayer {
            backend: BackendLayer {
                host: Some(host.to_string()),
                port: None,
            },
            ..ConfigLayer::default()
        }
    }

    #[test]
    fn test_resolve_requires_backend_host() {
        let result = ConfigLayer::default().resolve();
        assert!(matches!(result, Err(ConfigError::MissingBackendHost)));
    }

    #[test]
    fn test_resolve_rejects_blank_backend_host() {
        let result = layer_with_host("  ").resolve();
        assert!(matches!(result, Err(ConfigError::MissingBackendHost)));
    }

    #[test]
    fn test_resolve_applies_defaults() {
        // Arrange: only the mandatory host is set
        let layer = layer_with_host("vps.example.net");

        // Act
        let cfg = layer.resolve().unwrap();

        // Assert
        assert_eq!(
            cfg,
            TunnelConfig {
                backend_host: "vps.example.net".to_string(),
                ..TunnelConfig::default()
            }
        );
    }

    #[test]
    fn test_resolve_rejects_hostname_as_bind_address() {
        let mut layer = layer_with_host("h");
        layer.listen.bind = Some("not.an.ip".to_string());

        let result = layer.resolve();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidBindAddress { ref addr, .. }) if addr == "not.an.ip"
        ));
    }

    #[test]
    fn test_resolve_accepts_ipv6_bind() {
        let mut layer = layer_with_host("h");
        layer.listen.bind = Some("::".to_string());
        layer.listen.port = Some(9000);

        let cfg = layer.resolve().unwrap();

        assert_eq!(cfg.listen_addr, "[::]:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_or_prefers_upper_layer() {
        // Arrange
        let mut upper = layer_with_host("upper");
        upper.tunnel.skip_packets = Some(3);
        let mut lower = layer_with_host("lower");
        lower.tunnel.skip_packets = Some(1);
        lower.backend.port = Some(2222);
        lower.timeouts.dial_secs = Some(5);

        // Act
        let cfg = upper.or(lower).resolve().unwrap();

        // Assert: upper wins where set, lower fills the gaps
        assert_eq!(cfg.backend_host, "upper");
        assert_eq!(cfg.skip_count, 3);
        assert_eq!(cfg.backend_port, 2222);
        assert_eq!(cfg.dial_timeout, Duration::from_secs(5));
        assert_eq!(cfg.probe_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_backend_authority_brackets_ipv6() {
        let cfg = TunnelConfig {
            backend_host: "::1".to_string(),
            ..TunnelConfig::default()
        };
        assert_eq!(cfg.backend_authority(), "[::1]:22");
    }
}
