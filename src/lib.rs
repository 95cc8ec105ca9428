//! # TAK Core - Streaming Cursor-on-Target Client
//!
//! Long-lived, mutually authenticated TLS client for TAK servers speaking
//! the Cursor-on-Target (CoT) event protocol: XML documents concatenated on
//! a raw byte stream with no length prefix and no delimiter other than the
//! documents' own tags.
//!
//! ## Features
//!
//! - **Stream reframing**: reconstructs whole documents from arbitrarily
//!   split, merged, or partially delivered reads
//! - **Protocol handshake**: answers keepalive requests and records the
//!   announced server version without bothering consumers
//! - **Client-certificate TLS**: presents PEM credentials; server trust is
//!   a documented, explicit configuration choice
//! - **Channel-based consumer contract**: decoded documents and lifecycle
//!   events on one ordered event stream
//!
//! ## Architecture
//!
//! ```text
//!          TAK server
//!              │ TLS bytes
//!              ▼
//!      ┌───────────────┐      ┌──────────────┐      ┌───────────────┐
//!      │   transport   │ ───> │ FrameBuffer  │ ───> │  classify()   │
//!      │ (tokio-rustls)│      │ (reframing)  │      │  (handshake)  │
//!      └───────────────┘      └──────────────┘      └───────┬───────┘
//!              ▲                                            │
//!              │            keepalive replies               │
//!              └───────────── write queue <─────────────────┤
//!                                  ▲                        │ application
//!                                  │ write()                ▼ documents
//!                              consumer  <──────────── SessionEvent
//! ```
//!
//! The [`session::Session`] composes the three layers and owns the state
//! machine (`Connecting → Connected → Closed`, with `Error` reachable from
//! any non-terminal state).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tak::{Config, Credential, Endpoint, Session, SessionEvent, TlsClientConfig};
//!
//! # async fn run() -> tak::Result<()> {
//! let endpoint = Endpoint::parse("ssl://tak.example.com:8089")?;
//! let tls = TlsClientConfig::new(Credential::from_files(
//!     "/etc/takgw/client.pem",
//!     "/etc/takgw/client.key",
//! ));
//!
//! let mut session = Session::connect(endpoint, tls).await?;
//! let mut events = session.events();
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::Document(cot) => println!("{} {}", cot.event_type(), cot),
//!         SessionEvent::Closed => break,
//!         SessionEvent::Error(e) => return Err(e),
//!         SessionEvent::Connected => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`cot`]: CoT document model (parse, compose, serialize)
//! - [`protocol`]: stream reframing and the control-document handshake
//! - [`transport`]: endpoints, credentials, TLS connection establishment
//! - [`session`]: the live connection and its consumer contract
//! - [`config`]: TOML/env gateway configuration
//! - [`error`]: error types and result alias

pub mod config;
pub mod cot;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use config::Config;
pub use cot::CotEvent;
pub use error::{Result, TakError};
pub use protocol::{classify, FrameBuffer, Reaction};
pub use session::{Session, SessionEvent, SessionState};
pub use transport::{Credential, Endpoint, TlsClientConfig, TransportKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
