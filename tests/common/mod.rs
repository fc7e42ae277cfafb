#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Once;
use std::time::{Duration, Instant};

use switchyard::{Config, Error, Plain, Router, Server, Transport};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub fn setup_logger() {
    static START: Once = Once::new();
    START.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// A server running in the background on an ephemeral localhost port.
pub struct Running {
    pub addr: SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), Error>>,
}

impl Running {
    /// Signals shutdown and waits for the drain to finish.
    pub async fn stop(self) -> Result<(), Error> {
        let _ = self.stop.send(());
        self.handle.await.expect("server task panicked")
    }
}

pub async fn spawn<T: Transport>(server: Server<T>) -> Running {
    setup_logger();

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    let (stop, stopped) = oneshot::channel::<()>();

    let handle = tokio::spawn(server.serve_with_shutdown(listener, async move {
        let _ = stopped.await;
    }));

    Running { addr, stop, handle }
}

/// Writes `raw` and reads until the server closes the connection.
pub async fn exchange<S>(mut stream: S, raw: &[u8]) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(raw).await.expect("write request");
    stream.flush().await.expect("flush request");
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.expect("read response");
    String::from_utf8(out).expect("utf-8 response")
}

pub async fn send(addr: SocketAddr, raw: &[u8]) -> String {
    let tcp = TcpStream::connect(addr).await.expect("connect");
    exchange(tcp, raw).await
}

pub async fn get(addr: SocketAddr, path: &str) -> String {
    send(addr, format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes()).await
}

pub fn status(response: &str) -> u16 {
    response
        .split(' ')
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("no status line in {response:?}"))
}

pub fn body(response: &str) -> &str {
    match response.split_once("\r\n\r\n") {
        Some((_, body)) => body,
        None => panic!("no header terminator in {response:?}"),
    }
}

/// Runs `Server::start` on its own OS thread, listening on a free localhost
/// port, and returns once the port accepts connections.
///
/// `start` only returns on a process signal, so the thread is left running
/// until the test binary exits.
pub fn start_detached(num_threads: usize, router: Router) -> SocketAddr {
    setup_logger();

    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("reserve port")
        .port();
    let config = Config::new(port).ip(Ipv4Addr::LOCALHOST.into()).num_threads(num_threads);
    let server = Server::with_config(config, Plain).with_router(router);

    std::thread::spawn(move || {
        if let Err(e) = server.start() {
            panic!("server failed: {e}");
        }
    });

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let deadline = Instant::now() + Duration::from_secs(5);
    while std::net::TcpStream::connect(addr).is_err() {
        assert!(Instant::now() < deadline, "server never started listening on {addr}");
        std::thread::sleep(Duration::from_millis(20));
    }
    addr
}

/// Blocking counterpart of [`send`], for tests that do not run inside tokio.
pub fn send_blocking(addr: SocketAddr, raw: &[u8], read_timeout: Duration) -> io::Result<String> {
    let mut stream = std::net::TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(read_timeout))?;
    stream.write_all(raw)?;
    let mut out = Vec::new();
    stream.read_to_end(&mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub fn get_blocking(addr: SocketAddr, path: &str, read_timeout: Duration) -> io::Result<String> {
    let raw = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    send_blocking(addr, raw.as_bytes(), read_timeout)
}
