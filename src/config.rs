//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Listening endpoint, worker pool size and per-connection limits.
///
/// Every setter consumes and returns `self`, so a config reads as one chain:
///
/// ```rust
/// use std::time::Duration;
/// use switchyard::Config;
///
/// let config = Config::new(8080)
///     .num_threads(4)
///     .header_read_timeout(Duration::from_secs(5));
/// assert_eq!(config.addr().port(), 8080);
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) ip: IpAddr,
    pub(crate) port: u16,
    pub(crate) num_threads: usize,
    pub(crate) handshake_timeout: Duration,
    pub(crate) header_read_timeout: Duration,
    pub(crate) drain_timeout: Duration,
    pub(crate) max_head_bytes: usize,
    pub(crate) max_headers: usize,
}

impl Config {
    /// `0.0.0.0:port`, one worker thread.
    pub fn new(port: u16) -> Self {
        Self { port, ..Self::default() }
    }

    /// Address to listen on. Defaults to `0.0.0.0`.
    pub fn ip(mut self, ip: IpAddr) -> Self {
        self.ip = ip;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Number of runtime worker threads. Zero is treated as one.
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = n.max(1);
        self
    }

    /// Upper bound on the transport handshake (TLS only; plaintext has none).
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Upper bound on receiving the full request line and headers.
    pub fn header_read_timeout(mut self, timeout: Duration) -> Self {
        self.header_read_timeout = timeout;
        self
    }

    /// How long shutdown waits for in-flight connections before aborting them.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Largest accepted request head (request line plus headers), in bytes.
    pub fn max_head_bytes(mut self, n: usize) -> Self {
        self.max_head_bytes = n;
        self
    }

    pub fn max_headers(mut self, n: usize) -> Self {
        self.max_headers = n;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    pub fn threads(&self) -> usize {
        self.num_threads
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            num_threads: 1,
            handshake_timeout: Duration::from_secs(10),
            header_read_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(30),
            max_head_bytes: 16 * 1024,
            max_headers: 64,
        }
    }
}
