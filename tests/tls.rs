use std::io;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use switchyard::{Method, Request, ResponseWriter, Router, Server, StatusCode, Tls};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

mod common;

async fn hi(mut res: ResponseWriter, _req: Request) -> io::Result<()> {
    res.send(StatusCode::OK, "text/plain", "hi").await
}

async fn fallback(mut res: ResponseWriter, _req: Request) -> io::Result<()> {
    res.send(StatusCode::OK, "text/plain", "fallback").await
}

fn router() -> Router {
    Router::new().get("/hello", hi).default_route(Method::GET, "/.*", fallback)
}

/// Server-side TLS plus a connector that trusts it.
fn tls_pair() -> (Tls, TlsConnector) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap();
    let cert: CertificateDer<'static> = certified.cert.der().clone();
    let key = PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());

    let tls = Tls::from_der(vec![cert.clone()], key.into()).unwrap();

    let mut roots = RootCertStore::empty();
    roots.add(cert).unwrap();
    let client = ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();

    (tls, TlsConnector::from(Arc::new(client)))
}

async fn tls_get(connector: &TlsConnector, addr: std::net::SocketAddr, raw: &[u8]) -> String {
    let tcp = TcpStream::connect(addr).await.unwrap();
    let name = ServerName::try_from("localhost").unwrap();
    let stream = connector.connect(name, tcp).await.unwrap();
    common::exchange(stream, raw).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_routes_over_tls() {
    let (tls, connector) = tls_pair();
    let running = common::spawn(Server::tls(0, 2, tls).with_router(router())).await;

    let res = tls_get(&connector, running.addr, b"GET /hello HTTP/1.1\r\n\r\n").await;
    assert_eq!(common::body(&res), "hi");

    let res = tls_get(&connector, running.addr, b"GET /other HTTP/1.1\r\n\r\n").await;
    assert_eq!(common::body(&res), "fallback");

    let res = tls_get(&connector, running.addr, b"POST /hello HTTP/1.1\r\n\r\n").await;
    assert_eq!(common::status(&res), 404);

    let res = tls_get(&connector, running.addr, b"GET /\r\n\r\n").await;
    assert_eq!(common::status(&res), 400);

    running.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn plaintext_client_fails_handshake_and_server_keeps_going() {
    let (tls, connector) = tls_pair();
    let running = common::spawn(Server::tls(0, 2, tls).with_router(router())).await;

    // Not a TLS ClientHello: the handshake fails and the connection is dropped
    // without an HTTP response.
    let mut tcp = TcpStream::connect(running.addr).await.unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut tcp, b"GET /hello HTTP/1.1\r\n\r\n").await.unwrap();
    let mut out = Vec::new();
    let _ = tokio::io::AsyncReadExt::read_to_end(&mut tcp, &mut out).await;
    assert!(!out.starts_with(b"HTTP/1.1"));

    let res = tls_get(&connector, running.addr, b"GET /hello HTTP/1.1\r\n\r\n").await;
    assert_eq!(common::body(&res), "hi");

    running.stop().await.unwrap();
}
