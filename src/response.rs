//! The writable half of a connection, as handed to handlers.
//!
//! Handlers write the whole response themselves: status line, headers, body.
//! [`ResponseWriter`] implements [`AsyncWrite`], so anything from
//! `tokio::io::AsyncWriteExt` works on it. The [`send`](ResponseWriter::send)
//! and [`write_head`](ResponseWriter::write_head) helpers cover the common
//! fixed-length case.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use tokio::io::{AsyncWrite, AsyncWriteExt, WriteHalf};

use crate::transport::BoxedIo;

struct Shared {
    io: WriteHalf<BoxedIo>,
    written: u64,
}

/// Response stream bound to one connection.
///
/// The dispatcher keeps its own handle on the same connection, so once the
/// handler returns (or fails) it can flush and close the stream.
pub struct ResponseWriter {
    shared: Arc<Mutex<Shared>>,
}

impl ResponseWriter {
    pub(crate) fn new(io: WriteHalf<BoxedIo>) -> Self {
        Self { shared: Arc::new(Mutex::new(Shared { io, written: 0 })) }
    }

    /// A second handle on the same stream, kept by the dispatcher.
    pub(crate) fn share(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // A poisoned lock only means a handler panicked mid-write; the stream
        // itself is still usable for closing.
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Total bytes accepted by the stream so far.
    pub fn bytes_written(&self) -> u64 {
        self.lock().written
    }

    /// Writes an HTTP/1.1 status line and headers, followed by the blank line.
    /// The body, if any, is up to the caller.
    pub async fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        let mut buf = BytesMut::with_capacity(256);
        put_status_line(&mut buf, status);
        for (name, value) in headers {
            buf.put_slice(name.as_str().as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");
        self.write_all(&buf).await
    }

    /// Writes a complete response with a `content-length` body and flushes it.
    pub async fn send(
        &mut self,
        status: StatusCode,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> io::Result<()> {
        let body = body.into();
        let mut buf = BytesMut::with_capacity(128 + body.len());
        put_status_line(&mut buf, status);
        buf.put_slice(format!("content-type: {content_type}\r\n").as_bytes());
        buf.put_slice(format!("content-length: {}\r\n", body.len()).as_bytes());
        buf.put_slice(b"connection: close\r\n\r\n");
        buf.put_slice(&body);
        self.write_all(&buf).await?;
        self.flush().await
    }

    /// Plain-text error response whose body is the reason phrase.
    pub(crate) async fn send_error(&mut self, status: StatusCode) -> io::Result<()> {
        let reason = status.canonical_reason().unwrap_or("");
        self.send(status, "text/plain; charset=utf-8", format!("{} {reason}", status.as_u16()))
            .await
    }

    /// Flushes and shuts down the write side. Errors only mean the peer is
    /// already gone.
    pub(crate) async fn close(&mut self) {
        if let Err(e) = self.shutdown().await {
            tracing::debug!("closing connection: {e}");
        }
    }
}

fn put_status_line(buf: &mut BytesMut, status: StatusCode) {
    let reason = status.canonical_reason().unwrap_or("");
    buf.put_slice(format!("HTTP/1.1 {} {reason}\r\n", status.as_u16()).as_bytes());
}

impl AsyncWrite for ResponseWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut shared = self.lock();
        let poll = Pin::new(&mut shared.io).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            shared.written += n as u64;
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.lock().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.lock().io).poll_shutdown(cx)
    }
}
