//! TAK client error types.
//!
//! The variants follow the fault taxonomy of the protocol core:
//!
//! - **Transport faults** (`Connect`, `Io`) are fatal to a session and are
//!   surfaced once; the caller constructs a new session to retry.
//! - **Document faults** (`Document`) are per-document and recoverable; the
//!   session logs and discards the offending document without touching the
//!   connection.
//! - **Usage faults** (`NotConnected`, `MissingCredential`, `Config`,
//!   `Endpoint`) are reported synchronously at the invalid call site.

use thiserror::Error;

use crate::session::SessionState;

/// TAK client errors.
#[derive(Error, Debug)]
pub enum TakError {
    /// Configuration error (bad file, missing CA for strict mode, ...).
    #[error("Config error: {0}")]
    Config(String),

    /// Endpoint URL could not be parsed or uses an unsupported scheme.
    #[error("Endpoint error: {0}")]
    Endpoint(String),

    /// Connection establishment failed (DNS, TCP, or TLS handshake).
    #[error("Connect error: {0}")]
    Connect(String),

    /// A framed document could not be parsed.
    #[error("Document error: {0}")]
    Document(String),

    /// Client credential is required for a TLS endpoint but was not supplied.
    #[error("Missing client credential for TLS endpoint")]
    MissingCredential,

    /// Operation requires a connected session.
    #[error("Session not connected (state: {0:?})")]
    NotConnected(SessionState),

    /// The session terminated while the operation was in flight.
    #[error("Session terminated: {0}")]
    SessionTerminated(String),

    /// I/O error on the underlying transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for TAK client operations
pub type Result<T> = std::result::Result<T, TakError>;

impl From<rustls::Error> for TakError {
    fn from(err: rustls::Error) -> Self {
        TakError::Connect(err.to_string())
    }
}

impl From<toml::de::Error> for TakError {
    fn from(err: toml::de::Error) -> Self {
        TakError::Config(err.to_string())
    }
}
