//! Plaintext and TLS transports behind one trait.
//!
//! The accept loop only ever sees a [`TcpStream`]. A [`Transport`] turns it
//! into a ready-to-use byte stream: [`Plain`] hands it back untouched, [`Tls`]
//! runs the rustls handshake first. Everything downstream (parser, router,
//! dispatcher) works on a boxed `AsyncRead + AsyncWrite` and never learns
//! which transport produced it.

use std::fs::File;
use std::future::Future;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;

use crate::error::Error;

/// Object-safe union of the stream traits the dispatcher needs.
pub(crate) trait Io: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Io for T {}

/// A connection with its transport erased.
pub(crate) type BoxedIo = Box<dyn Io>;

/// Turns an accepted TCP stream into a readable/writable connection.
///
/// Implemented by [`Plain`] and [`Tls`]. The server bounds `accept` with the
/// configured handshake timeout. A failed or timed-out `accept` is treated like
/// a failed TCP accept: the server logs it, drops the connection and keeps
/// accepting.
pub trait Transport: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Short label used in logs (`"http"`, `"https"`).
    fn name(&self) -> &'static str;

    fn accept(&self, tcp: TcpStream) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Unencrypted HTTP.
#[derive(Clone, Copy, Debug, Default)]
pub struct Plain;

impl Transport for Plain {
    type Stream = TcpStream;

    fn name(&self) -> &'static str {
        "http"
    }

    async fn accept(&self, tcp: TcpStream) -> io::Result<TcpStream> {
        Ok(tcp)
    }
}

/// HTTPS via rustls.
///
/// ```rust,no_run
/// use switchyard::{Server, Tls};
///
/// let tls = Tls::from_pem_files("cert.pem", "key.pem").unwrap();
/// Server::tls(8443, 4, tls).start().unwrap();
/// ```
#[derive(Clone)]
pub struct Tls {
    acceptor: TlsAcceptor,
}

impl Tls {
    /// Uses a prepared rustls config as-is.
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { acceptor: TlsAcceptor::from(config) }
    }

    /// Single certificate chain plus private key, no client auth, ALPN
    /// `http/1.1`.
    pub fn from_der(
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, Error> {
        let mut config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Ok(Self::new(Arc::new(config)))
    }

    /// Loads a PEM certificate chain and the first PEM private key found in
    /// `key`.
    pub fn from_pem_files(cert: impl AsRef<Path>, key: impl AsRef<Path>) -> Result<Self, Error> {
        let cert = cert.as_ref();
        let key = key.as_ref();

        let mut rd = BufReader::new(File::open(cert)?);
        let certs = rustls_pemfile::certs(&mut rd).collect::<Result<Vec<_>, _>>()?;
        if certs.is_empty() {
            return Err(Error::Tls(format!("no certificates in {}", cert.display())));
        }

        let mut rd = BufReader::new(File::open(key)?);
        let key = rustls_pemfile::private_key(&mut rd)?
            .ok_or_else(|| Error::Tls(format!("no private key in {}", key.display())))?;

        Self::from_der(certs, key)
    }
}

impl Transport for Tls {
    type Stream = TlsStream<TcpStream>;

    fn name(&self) -> &'static str {
        "https"
    }

    async fn accept(&self, tcp: TcpStream) -> io::Result<Self::Stream> {
        self.acceptor.accept(tcp).await
    }
}
