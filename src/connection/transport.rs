//! Transport setup: plain TCP, optionally wrapped in TLS.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

/// Byte stream the engine reads and writes.
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Stream for T {}

/// Type-erased transport.
pub type BoxedStream = Box<dyn Stream>;

/// Opens transports. Tests substitute an in-memory implementation.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &str, port: u16, tls: bool) -> EngineResult<BoxedStream>;
}

/// Real network connector.
#[derive(Debug, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16, tls: bool) -> EngineResult<BoxedStream> {
        let tcp = TcpStream::connect((host, port)).await?;
        if let Err(e) = tcp.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        if !tls {
            return Ok(Box::new(tcp));
        }
        let stream = upgrade_to_tls(tcp, host).await?;
        Ok(Box::new(stream))
    }
}

/// Client config trusting the platform root certificates.
fn tls_client_config() -> ClientConfig {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        if let Err(e) = roots.add(cert) {
            warn!("Failed to add root cert: {}", e);
        }
    }
    for e in &certs.errors {
        warn!("Error loading native certs: {}", e);
    }

    ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

/// Upgrades a TCP stream to TLS, verifying the server against `hostname`.
async fn upgrade_to_tls(
    tcp: TcpStream,
    hostname: &str,
) -> EngineResult<tokio_rustls::client::TlsStream<TcpStream>> {
    let connector = TlsConnector::from(Arc::new(tls_client_config()));
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|e| EngineError::Tls(format!("invalid server name {hostname}: {e}")))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| EngineError::Tls(e.to_string()))
}
