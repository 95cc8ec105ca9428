//! Gateway configuration.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (applied by the binary on top of these)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TakError};
use crate::transport::{Credential, Endpoint, TlsClientConfig};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// TAK server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client authentication material
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| TakError::Config(format!("Failed to read config file: {e}")))?;

        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("TAK_SERVER_URL") {
            config.server.url = url;
        }
        if let Ok(val) = std::env::var("TAK_VERIFY_SERVER") {
            config.server.verify_certificate = matches!(val.as_str(), "1" | "true" | "yes");
        }
        if let Ok(cert) = std::env::var("TAK_CLIENT_CERT") {
            config.auth.cert = Some(PathBuf::from(cert));
        }
        if let Ok(key) = std::env::var("TAK_CLIENT_KEY") {
            config.auth.key = Some(PathBuf::from(key));
        }
        if let Ok(ca) = std::env::var("TAK_CA_CERT") {
            config.auth.ca = Some(PathBuf::from(ca));
        }

        config
    }

    /// Merge with another config (other takes precedence)
    pub fn merge(self, other: Self) -> Self {
        Self {
            server: ServerConfig {
                url: if other.server.url != ServerConfig::default().url {
                    other.server.url
                } else {
                    self.server.url
                },
                verify_certificate: other.server.verify_certificate
                    || self.server.verify_certificate,
            },
            auth: AuthConfig {
                cert: other.auth.cert.or(self.auth.cert),
                key: other.auth.key.or(self.auth.key),
                ca: other.auth.ca.or(self.auth.ca),
            },
        }
    }

    /// Default config file location (`<config dir>/takgw/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("takgw").join("config.toml"))
    }

    /// Resolve the configured endpoint
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.server.url)
    }

    /// Build the session TLS configuration from this config
    pub fn tls_config(&self) -> Result<TlsClientConfig> {
        let mut config = match (&self.auth.cert, &self.auth.key) {
            (Some(cert), Some(key)) => TlsClientConfig::new(Credential::from_files(cert, key)),
            // Left unauthenticated: the connect reports the missing
            // credential as a usage fault
            _ => TlsClientConfig::unauthenticated(),
        };

        if self.server.verify_certificate {
            config.verify_server = true;
            if let Some(ca_path) = &self.auth.ca {
                let ca_pem = std::fs::read_to_string(ca_path).map_err(|e| {
                    TakError::Config(format!("Failed to read CA file {ca_path:?}: {e}"))
                })?;
                config.ca_pem = Some(ca_pem);
            }
        }

        Ok(config)
    }
}

/// TAK server connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server URL (e.g. `ssl://tak.example.com:8089`)
    pub url: String,

    /// Verify the server certificate chain (requires `auth.ca`)
    pub verify_certificate: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "ssl://localhost:8089".to_string(),
            verify_certificate: false,
        }
    }
}

/// Client authentication material (PEM paths)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Path to the PEM client certificate
    pub cert: Option<PathBuf>,

    /// Path to the PEM client private key
    pub key: Option<PathBuf>,

    /// Path to a PEM CA bundle for strict server verification
    pub ca: Option<PathBuf>,
}
