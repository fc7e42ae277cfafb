//! One connection, one request: parse, route, invoke, close.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tokio::io::BufReader;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinError;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::error::BoxError;
use crate::handler::BoxFuture;
use crate::parse::{self, Limits};
use crate::request::{Body, Request};
use crate::response::ResponseWriter;
use crate::router::Router;
use crate::transport::BoxedIo;

/// Per-connection request handling, shared by every connection task.
pub(crate) struct Dispatcher {
    router: Arc<Router>,
    limits: Limits,
    header_read_timeout: Duration,
}

impl Dispatcher {
    pub(crate) fn new(router: Router, limits: Limits, header_read_timeout: Duration) -> Self {
        Self { router: Arc::new(router), limits, header_read_timeout }
    }

    /// Serves exactly one request on `io`, then closes it.
    ///
    /// Never fails: every outcome is either written to the peer or logged.
    pub(crate) async fn handle(&self, io: BoxedIo, peer: SocketAddr) {
        let (rd, wr) = tokio::io::split(io);
        let mut reader = BufReader::new(rd);
        let mut res = ResponseWriter::new(wr);

        let parsed = timeout(self.header_read_timeout, parse::parse(&mut reader, self.limits));
        let head = match parsed.await {
            Ok(Ok(head)) => head,
            Ok(Err(e)) => {
                debug!(%peer, "rejecting request: {e}");
                if let Some(status) = e.status() {
                    self.reject(&mut res, status, peer).await;
                }
                res.close().await;
                return;
            }
            Err(_) => {
                debug!(%peer, "timed out waiting for request head");
                self.reject(&mut res, StatusCode::REQUEST_TIMEOUT, peer).await;
                res.close().await;
                return;
            }
        };

        let Some((handler, captures)) = self.router.resolve(&head.method, &head.path) else {
            debug!(%peer, method = %head.method, path = %head.path, "no route");
            self.reject(&mut res, StatusCode::NOT_FOUND, peer).await;
            res.close().await;
            return;
        };

        let method = head.method.clone();
        let path = head.path.clone();
        let body = Body::new(reader, head.framing);
        let req = Request::new(head, body, captures, peer);

        let outcome = run_handler(handler.call(res.share(), req)).await;

        match outcome {
            Ok(Some(Ok(()))) => {
                debug!(%peer, %method, %path, bytes = res.bytes_written(), "request served");
            }
            Ok(Some(Err(e))) => {
                warn!(%peer, %method, %path, "handler failed: {e}");
            }
            Ok(None) => {
                debug!(%peer, %method, %path, "handler cancelled");
            }
            Err(e) if e.is_panic() => {
                error!(%peer, %method, %path, "handler panicked");
            }
            Err(e) => {
                warn!(%peer, %method, %path, "handler task cancelled: {e}");
            }
        }

        res.close().await;
    }

    async fn reject(&self, res: &mut ResponseWriter, status: StatusCode, peer: SocketAddr) {
        if let Err(e) = res.send_error(status).await {
            debug!(%peer, status = status.as_u16(), "could not send error response: {e}");
        }
    }
}

/// Runs a handler future on the blocking pool, so a handler that blocks its
/// thread never stalls the runtime workers that accept and drive I/O.
///
/// A panic surfaces as the `JoinError`. Dropping the returned future (a
/// drain timeout aborting the connection) drops the handler at its next
/// await point, which releases both halves of the connection.
async fn run_handler(fut: BoxFuture) -> Result<Option<Result<(), BoxError>>, JoinError> {
    let (_alive, gone) = oneshot::channel::<()>();
    let runtime = Handle::current();

    tokio::task::spawn_blocking(move || {
        runtime.block_on(async move {
            tokio::select! {
                biased;
                _ = gone => None,
                out = fut => Some(out),
            }
        })
    })
    .await
}
