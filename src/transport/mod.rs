//! TLS transport to the TAK server.
//!
//! A TAK endpoint is reached over TCP with a TLS client-certificate
//! handshake. This module owns the endpoint model, the credential and TLS
//! configuration, and the async connect; everything above it (framing,
//! handshake, session state) never touches a socket directly.

mod config;
mod tls;

pub use config::{Credential, TlsClientConfig};
pub use tls::{connect, TlsStream};

use crate::error::{Result, TakError};

/// Default TAK server TLS port.
pub const DEFAULT_TLS_PORT: u16 = 8089;

/// Transport kind for a TAK endpoint.
///
/// Only the TLS-secured stream variant is supported; the enum exists so the
/// endpoint model states its transport explicitly rather than implying it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportKind {
    /// TCP with TLS and client certificate authentication.
    #[default]
    Tls,
}

impl TransportKind {
    /// Get descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tls => "TLS",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for TransportKind {
    type Err = TakError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ssl" | "tls" => Ok(Self::Tls),
            other => Err(TakError::Endpoint(format!(
                "unknown transport kind: {other}"
            ))),
        }
    }
}

/// Remote TAK server endpoint. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server hostname or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Transport kind.
    pub kind: TransportKind,
}

impl Endpoint {
    /// Create a TLS endpoint from host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            kind: TransportKind::Tls,
        }
    }

    /// Parse an endpoint URL.
    ///
    /// Accepted forms: `ssl://host:port`, `tls://host:port`, and the
    /// port-less variants, which default to port 8089. Any other scheme is
    /// rejected.
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim();

        let (scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| TakError::Endpoint(format!("missing scheme in URL: {trimmed}")))?;
        let kind: TransportKind = scheme.parse()?;

        if rest.is_empty() {
            return Err(TakError::Endpoint(format!("missing host in URL: {trimmed}")));
        }

        // rsplit_once keeps IPv6-ish hosts with embedded colons intact
        if let Some((host, port_str)) = rest.rsplit_once(':') {
            if let Ok(port) = port_str.parse::<u16>() {
                return Ok(Self {
                    host: host.to_string(),
                    port,
                    kind,
                });
            }
        }

        Ok(Self {
            host: rest.to_string(),
            port: DEFAULT_TLS_PORT,
            kind,
        })
    }

    /// Socket address string (`host:port`).
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.kind.name().to_lowercase(), self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ssl_url() {
        let endpoint = Endpoint::parse("ssl://tak.example.com:8089").unwrap();
        assert_eq!(endpoint.host, "tak.example.com");
        assert_eq!(endpoint.port, 8089);
        assert_eq!(endpoint.kind, TransportKind::Tls);
    }

    #[test]
    fn test_parse_tls_url_default_port() {
        let endpoint = Endpoint::parse("tls://tak.example.com").unwrap();
        assert_eq!(endpoint.port, DEFAULT_TLS_PORT);
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert!(matches!(
            Endpoint::parse("tcp://tak.example.com:8087"),
            Err(TakError::Endpoint(_))
        ));
        assert!(matches!(
            Endpoint::parse("tak.example.com:8089"),
            Err(TakError::Endpoint(_))
        ));
    }

    #[test]
    fn test_endpoint_addr() {
        let endpoint = Endpoint::new("10.0.0.5", 8089);
        assert_eq!(endpoint.addr(), "10.0.0.5:8089");
        assert_eq!(endpoint.to_string(), "tls://10.0.0.5:8089");
    }
}
