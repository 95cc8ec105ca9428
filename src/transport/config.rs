//! Client credential and TLS configuration.
//!
//! Credentials arrive as PEM-encoded certificate and key material; this
//! module only loads and parses what it is given — fetching, decrypting
//! PKCS#12 bundles, and storage belong to the caller.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use rcgen::{Certificate, CertificateParams};

use crate::error::{Result, TakError};

/// Client identity source.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Load PEM certificate and key from files.
    Files {
        /// Path to PEM certificate file.
        cert_path: PathBuf,
        /// Path to PEM private key file.
        key_path: PathBuf,
    },
    /// Use in-memory PEM text.
    Pem {
        /// PEM-encoded certificate chain.
        cert_pem: String,
        /// PEM-encoded private key.
        key_pem: String,
    },
    /// Generate a self-signed identity (development only).
    SelfSigned {
        /// Common name for the certificate.
        common_name: String,
    },
}

impl Credential {
    /// Create a credential from PEM files.
    pub fn from_files(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self::Files {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    /// Create a credential from in-memory PEM text.
    pub fn from_pem(cert_pem: impl Into<String>, key_pem: impl Into<String>) -> Self {
        Self::Pem {
            cert_pem: cert_pem.into(),
            key_pem: key_pem.into(),
        }
    }

    /// Create a self-signed development credential.
    pub fn self_signed(common_name: impl Into<String>) -> Self {
        Self::SelfSigned {
            common_name: common_name.into(),
        }
    }

    /// Load and return the certificate chain and private key.
    pub fn load(&self) -> Result<(Vec<rustls::Certificate>, rustls::PrivateKey)> {
        match self {
            Self::Files { cert_path, key_path } => {
                let cert_pem = fs::read_to_string(cert_path).map_err(|e| {
                    TakError::Config(format!("Failed to read cert file {cert_path:?}: {e}"))
                })?;
                let key_pem = fs::read_to_string(key_path).map_err(|e| {
                    TakError::Config(format!("Failed to read key file {key_path:?}: {e}"))
                })?;

                parse_pem(&cert_pem, &key_pem)
            }
            Self::Pem { cert_pem, key_pem } => parse_pem(cert_pem, key_pem),
            Self::SelfSigned { common_name } => {
                tracing::warn!(
                    "Using self-signed client certificate for '{}' - NOT FOR PRODUCTION",
                    common_name
                );

                let mut params = CertificateParams::new(vec![common_name.clone()]);
                params.distinguished_name = rcgen::DistinguishedName::new();
                params
                    .distinguished_name
                    .push(rcgen::DnType::CommonName, common_name.clone());

                let cert = Certificate::from_params(params).map_err(|e| {
                    TakError::Config(format!("Failed to generate self-signed cert: {e}"))
                })?;

                let cert_der = rustls::Certificate(cert.serialize_der().map_err(|e| {
                    TakError::Config(format!("Failed to serialize cert: {e}"))
                })?);
                let key_der = rustls::PrivateKey(cert.serialize_private_key_der());

                Ok((vec![cert_der], key_der))
            }
        }
    }
}

/// Parse PEM certificate chain and private key text.
fn parse_pem(cert_pem: &str, key_pem: &str) -> Result<(Vec<rustls::Certificate>, rustls::PrivateKey)> {
    let certs: Vec<rustls::Certificate> = rustls_pemfile::certs(&mut cert_pem.as_bytes())
        .map_err(|e| TakError::Config(format!("Failed to parse cert PEM: {e}")))?
        .into_iter()
        .map(rustls::Certificate)
        .collect();

    if certs.is_empty() {
        return Err(TakError::Config(
            "No certificates found in PEM input".to_string(),
        ));
    }

    // Try PKCS8 first, then RSA
    let key = rustls_pemfile::pkcs8_private_keys(&mut key_pem.as_bytes())
        .map_err(|e| TakError::Config(format!("Failed to parse key PEM: {e}")))?
        .into_iter()
        .next()
        .map(rustls::PrivateKey)
        .or_else(|| {
            rustls_pemfile::rsa_private_keys(&mut key_pem.as_bytes())
                .ok()?
                .into_iter()
                .next()
                .map(rustls::PrivateKey)
        })
        .ok_or_else(|| TakError::Config("No private key found in PEM input".to_string()))?;

    Ok((certs, key))
}

/// TLS client configuration for one session.
///
/// Server certificate verification is OFF by default: TAK deployments
/// routinely run private or self-signed CAs, and the operational contract of
/// this client is to present its own certificate while accepting the
/// server's. Flip [`verify_server`] on (and supply `ca_pem`) to opt into
/// strict chain validation — changing the default would change the trust
/// contract of every existing deployment.
///
/// [`verify_server`]: TlsClientConfig::verify_server
#[derive(Debug, Clone)]
pub struct TlsClientConfig {
    /// Client identity; absent means the connect fails with
    /// [`TakError::MissingCredential`].
    pub credential: Option<Credential>,
    /// Server name for SNI; defaults to the endpoint host.
    pub server_name: Option<String>,
    /// Verify the server certificate chain against `ca_pem`.
    pub verify_server: bool,
    /// PEM CA bundle for strict verification.
    pub ca_pem: Option<String>,
}

impl TlsClientConfig {
    /// Create a configuration with the given client credential and the
    /// default relaxed server trust.
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
            server_name: None,
            verify_server: false,
            ca_pem: None,
        }
    }

    /// Create a configuration with no client credential.
    ///
    /// Connecting with this configuration fails; it exists so callers can
    /// build configuration incrementally.
    pub fn unauthenticated() -> Self {
        Self {
            credential: None,
            server_name: None,
            verify_server: false,
            ca_pem: None,
        }
    }

    /// Set server name for SNI.
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    /// Enable strict server verification against a PEM CA bundle.
    pub fn with_ca(mut self, ca_pem: impl Into<String>) -> Self {
        self.verify_server = true;
        self.ca_pem = Some(ca_pem.into());
        self
    }

    /// Build the rustls client configuration.
    pub fn build_rustls_config(&self) -> Result<rustls::ClientConfig> {
        let credential = self
            .credential
            .as_ref()
            .ok_or(TakError::MissingCredential)?;
        let (certs, key) = credential.load()?;

        let builder = rustls::ClientConfig::builder().with_safe_defaults();

        let config = if self.verify_server {
            let ca_pem = self.ca_pem.as_ref().ok_or_else(|| {
                TakError::Config(
                    "Server verification enabled but no CA certificate provided".to_string(),
                )
            })?;

            let mut roots = rustls::RootCertStore::empty();
            let ca_certs = rustls_pemfile::certs(&mut ca_pem.as_bytes())
                .map_err(|e| TakError::Config(format!("Failed to parse CA PEM: {e}")))?;
            if ca_certs.is_empty() {
                return Err(TakError::Config(
                    "No certificates found in CA PEM".to_string(),
                ));
            }
            for ca in ca_certs {
                roots
                    .add(&rustls::Certificate(ca))
                    .map_err(|e| TakError::Config(format!("Invalid CA certificate: {e}")))?;
            }

            builder
                .with_root_certificates(roots)
                .with_client_auth_cert(certs, key)?
        } else {
            builder
                .with_custom_certificate_verifier(Arc::new(super::tls::AcceptAnyServerCert))
                .with_client_auth_cert(certs, key)?
        };

        Ok(config)
    }
}
