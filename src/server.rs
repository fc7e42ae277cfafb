//! Server core: runtime, listener, accept loop and graceful shutdown.
//!
//! # Threads
//!
//! [`Server::start`] builds one multi-threaded tokio runtime. Its
//! `num_threads` workers accept, parse and drive socket I/O; handlers run on
//! the runtime's blocking pool, capped at `num_threads` threads. The calling
//! thread drives the accept loop.
//!
//! Every accepted socket is spawned as its own task and the loop goes straight
//! back to `accept()`. A handler that sleeps or blocks its thread holds up one
//! handler thread, never the next accept. With every handler thread busy,
//! further requests are parsed and wait for a free one.
//!
//! # Shutdown
//!
//! On **SIGTERM** or **SIGINT** the server:
//! 1. stops calling `listener.accept()`,
//! 2. waits up to [`Config::drain_timeout`] for in-flight connections,
//! 3. returns from [`Server::start`].
//!
//! [`Server::serve_with_shutdown`] takes any future as the shutdown signal,
//! for embedding in an existing runtime or in tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::handler::Handler;
use crate::parse::Limits;
use crate::router::Router;
use crate::transport::{Plain, Tls, Transport};

/// Pause after a failed `accept()`, so running out of file descriptors does
/// not turn the loop into a busy spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// The HTTP(S) server.
///
/// ```rust,no_run
/// use switchyard::{Method, Request, ResponseWriter, Server, StatusCode};
///
/// async fn hello(mut res: ResponseWriter, _req: Request) -> std::io::Result<()> {
///     res.send(StatusCode::OK, "text/plain", "hi").await
/// }
///
/// let mut server = Server::new(8080, 4);
/// server.add_route(Method::GET, "/hello", hello);
/// server.start().unwrap();
/// ```
pub struct Server<T: Transport = Plain> {
    config: Config,
    router: Router,
    transport: T,
}

impl Server<Plain> {
    /// Plaintext server on `0.0.0.0:port`. `num_threads` of 0 means 1.
    pub fn new(port: u16, num_threads: usize) -> Self {
        Self::with_config(Config::new(port).num_threads(num_threads), Plain)
    }
}

impl Server<Tls> {
    /// HTTPS server on `0.0.0.0:port`.
    pub fn tls(port: u16, num_threads: usize, tls: Tls) -> Self {
        Self::with_config(Config::new(port).num_threads(num_threads), tls)
    }
}

impl<T: Transport> Server<T> {
    pub fn with_config(config: Config, transport: T) -> Self {
        Self { config, router: Router::new(), transport }
    }

    /// Replaces the route table with a prebuilt one.
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Registers a primary route. Must be called before the server starts.
    pub fn add_route(&mut self, method: Method, pattern: &str, handler: impl Handler) -> &mut Self {
        self.router.insert_primary(method, pattern, handler);
        self
    }

    /// Registers a fallback route for `method`.
    pub fn add_default_route(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
    ) -> &mut Self {
        self.router.insert_default(method, pattern, handler);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Binds the configured address and serves until SIGTERM / Ctrl-C.
    ///
    /// Blocks the calling thread. Invalid route patterns, runtime creation
    /// and bind failures are returned before any connection is accepted.
    pub fn start(mut self) -> Result<(), Error> {
        self.router.check()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.num_threads)
            .max_blocking_threads(self.config.num_threads)
            .thread_name("switchyard-worker")
            .enable_all()
            .build()?;

        info!(threads = self.config.num_threads, "switchyard runtime started");
        let drain_timeout = self.config.drain_timeout;

        let served = runtime.block_on(async move {
            let listener = TcpListener::bind(self.config.addr()).await?;
            self.serve_with_shutdown(listener, shutdown_signal()).await
        });

        // A handler stuck in blocking code cannot be cancelled; do not wait
        // on it forever.
        runtime.shutdown_timeout(drain_timeout);
        served
    }

    /// Serves on an already-bound listener until SIGTERM / Ctrl-C.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `signal` resolves, then drains.
    pub async fn serve_with_shutdown<S>(
        self,
        listener: TcpListener,
        signal: S,
    ) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let Self { config, mut router, transport } = self;
        router.check()?;

        let addr = listener.local_addr()?;
        let limits = Limits {
            max_head_bytes: config.max_head_bytes,
            max_headers: config.max_headers,
        };
        let dispatcher = Arc::new(Dispatcher::new(router, limits, config.header_read_timeout));
        let transport = Arc::new(transport);

        info!(%addr, transport = transport.name(), "switchyard listening");

        let mut tasks = JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown first, so a signal stops accepting even when more
                // connections are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining");
                    break;
                }

                res = listener.accept() => {
                    let (tcp, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };

                    let transport = Arc::clone(&transport);
                    let dispatcher = Arc::clone(&dispatcher);
                    let handshake_timeout = config.handshake_timeout;

                    tasks.spawn(async move {
                        let io = establish(&*transport, tcp, peer, handshake_timeout).await;
                        if let Some(io) = io {
                            dispatcher.handle(Box::new(io), peer).await;
                        }
                    });
                }

                // Reap finished connection tasks so the set does not grow
                // without bound.
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("connection task failed: {e}");
                    }
                }
            }
        }

        let drain = async { while tasks.join_next().await.is_some() {} };
        if timeout(config.drain_timeout, drain).await.is_err() {
            warn!(remaining = tasks.len(), "drain timeout elapsed, aborting connections");
            tasks.abort_all();
            // Aborted tasks are dropped on their next poll; wait for that so
            // their sockets and handlers are released before returning.
            while tasks.join_next().await.is_some() {}
        }

        info!("switchyard stopped");
        Ok(())
    }
}

/// Runs the transport handshake on a fresh TCP stream.
///
/// Failures are logged and swallowed: one bad client must not disturb the
/// accept loop.
async fn establish<T: Transport>(
    transport: &T,
    tcp: TcpStream,
    peer: SocketAddr,
    handshake_timeout: Duration,
) -> Option<T::Stream> {
    if let Err(e) = tcp.set_nodelay(true) {
        debug!(%peer, "set_nodelay failed: {e}");
    }

    match timeout(handshake_timeout, transport.accept(tcp)).await {
        Ok(Ok(io)) => Some(io),
        Ok(Err(e)) => {
            warn!(%peer, transport = transport.name(), "handshake failed: {e}");
            None
        }
        Err(_) => {
            warn!(%peer, transport = transport.name(), "handshake timed out");
            None
        }
    }
}

/// Resolves on the first SIGTERM or SIGINT the process receives.
///
/// If a handler cannot be installed the corresponding arm never fires; the
/// server then runs until the process is killed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
