//! TLS connection establishment.

use std::sync::Arc;
use std::time::SystemTime;

use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ServerName};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use super::{Endpoint, TlsClientConfig};
use crate::error::{Result, TakError};

/// The secured stream type produced by [`connect`].
pub type TlsStream = tokio_rustls::client::TlsStream<TcpStream>;

/// Certificate verifier that accepts any server certificate.
///
/// TAK deployments commonly run private or self-signed CAs, so chain
/// validation against public roots would refuse servers that are, for this
/// client's purposes, the right ones. The client still authenticates itself
/// with its own certificate; only the server side of the trust check is
/// relaxed. Selected by `TlsClientConfig::verify_server = false`.
pub(crate) struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// Establish the secured connection to a TAK endpoint.
///
/// Suspends until the TCP connect and TLS handshake both complete, or
/// returns the fatal fault. No timeout is imposed here; callers wanting one
/// wrap this future themselves.
pub async fn connect(endpoint: &Endpoint, config: &TlsClientConfig) -> Result<TlsStream> {
    let rustls_config = config.build_rustls_config()?;
    let connector = TlsConnector::from(Arc::new(rustls_config));

    let tcp = TcpStream::connect(endpoint.addr())
        .await
        .map_err(|e| TakError::Connect(format!("TCP connect to {} failed: {e}", endpoint.addr())))?;
    debug!(endpoint = %endpoint, "tcp connection established");

    let sni = config.server_name.as_deref().unwrap_or(&endpoint.host);
    let server_name = ServerName::try_from(sni)
        .map_err(|e| TakError::Connect(format!("Invalid server name '{sni}': {e}")))?;

    let stream = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| TakError::Connect(format!("TLS handshake with {} failed: {e}", endpoint.addr())))?;
    info!(endpoint = %endpoint, "tls connection established");

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Credential;

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        // Port 1 on localhost is essentially guaranteed closed
        let endpoint = Endpoint::new("127.0.0.1", 1);
        let config = TlsClientConfig::new(Credential::self_signed("takgw-test"));

        let result = connect(&endpoint, &config).await;
        assert!(matches!(result, Err(TakError::Connect(_))));
    }

    #[tokio::test]
    async fn test_connect_without_credential_fails_before_io() {
        let endpoint = Endpoint::new("127.0.0.1", 1);
        let config = TlsClientConfig::unauthenticated();

        let result = connect(&endpoint, &config).await;
        assert!(matches!(result, Err(TakError::MissingCredential)));
    }
}
