//! Incoming HTTP request type and its lazily-read body.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Method, Version};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader, ReadHalf};

use crate::parse::{Framing, Head};
use crate::transport::BoxedIo;

/// Buffered read side of a connection. The head parser and the body share it,
/// so bytes buffered past the head are not lost.
pub(crate) type ConnReader = BufReader<ReadHalf<BoxedIo>>;

/// Longest accepted chunk-size or trailer line in a chunked body.
const MAX_CHUNK_LINE: u64 = 4096;

/// An incoming HTTP request.
///
/// Handlers receive it fully parsed: method, path, headers and the capture
/// groups of the route pattern that selected the handler. Only the body is
/// still on the wire.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) version: Version,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Body,
    pub(crate) captures: Captures,
    pub(crate) remote_addr: SocketAddr,
}

impl Request {
    pub(crate) fn new(head: Head, body: Body, captures: Captures, remote_addr: SocketAddr) -> Self {
        Self {
            method: head.method,
            path: head.path,
            query: head.query,
            version: head.version,
            headers: head.headers,
            body,
            captures,
            remote_addr,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn version(&self) -> Version { self.version }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn remote_addr(&self) -> SocketAddr { self.remote_addr }

    /// Case-insensitive header lookup. Non-UTF-8 values read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Capture group `i` of the matched route pattern. Group 0 is the whole
    /// path; groups that did not participate in the match are `None`.
    ///
    /// For a route `/users/([0-9]+)`, `req.capture(1)` on `/users/42`
    /// returns `Some("42")`.
    pub fn capture(&self, i: usize) -> Option<&str> {
        self.captures.get(i)
    }

    /// Named capture group, for patterns like `/users/(?P<id>[0-9]+)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.captures.name(name)
    }

    pub fn captures(&self) -> &Captures { &self.captures }

    pub fn body_mut(&mut self) -> &mut Body { &mut self.body }

    /// Consumes the request, keeping only its body.
    pub fn into_body(self) -> Body { self.body }
}

/// Capture groups produced by matching a path against a route pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Captures {
    groups: Vec<Option<String>>,
    names: HashMap<String, usize>,
}

impl Captures {
    pub(crate) fn from_regex(re: &regex::Regex, caps: &regex::Captures<'_>) -> Self {
        let groups = caps.iter().map(|m| m.map(|m| m.as_str().to_owned())).collect();
        let names = re
            .capture_names()
            .enumerate()
            .filter_map(|(i, name)| name.map(|n| (n.to_owned(), i)))
            .collect();
        Self { groups, names }
    }

    pub fn get(&self, i: usize) -> Option<&str> {
        self.groups.get(i)?.as_deref()
    }

    pub fn name(&self, name: &str) -> Option<&str> {
        self.get(*self.names.get(name)?)
    }

    /// Number of groups, including group 0.
    pub fn len(&self) -> usize { self.groups.len() }

    pub fn is_empty(&self) -> bool { self.groups.is_empty() }
}

/// The request body, read on demand from the connection.
///
/// Framing follows `Content-Length` or `Transfer-Encoding: chunked`; a request
/// with neither has an empty body. Reads never go past the end of the body.
///
/// ```rust,no_run
/// # use switchyard::{Request, ResponseWriter};
/// # use switchyard::StatusCode;
/// async fn echo(mut res: ResponseWriter, mut req: Request) -> std::io::Result<()> {
///     let body = req.body_mut().read_to_end().await?;
///     res.send(StatusCode::OK, "application/octet-stream", body).await
/// }
/// ```
pub struct Body {
    reader: Option<ConnReader>,
    state: BodyState,
}

#[derive(Debug)]
enum BodyState {
    Length { remaining: u64 },
    Chunked { remaining: u64, need_crlf: bool },
    Done,
}

impl Body {
    pub(crate) fn new(reader: ConnReader, framing: Framing) -> Self {
        let state = match framing {
            Framing::Empty => BodyState::Done,
            Framing::Length(n) => BodyState::Length { remaining: n },
            Framing::Chunked => BodyState::Chunked { remaining: 0, need_crlf: false },
        };
        Self { reader: Some(reader), state }
    }

    /// A body with nothing to read.
    pub fn empty() -> Self {
        Self { reader: None, state: BodyState::Done }
    }

    /// Bytes still to be read, when framed by `Content-Length`.
    pub fn content_length(&self) -> Option<u64> {
        match self.state {
            BodyState::Length { remaining } => Some(remaining),
            _ => None,
        }
    }

    /// Whether the body has been fully read (or was empty to begin with).
    pub fn is_end(&self) -> bool {
        matches!(self.state, BodyState::Done)
    }

    /// Next piece of the body, or `None` once it is exhausted.
    pub async fn chunk(&mut self) -> io::Result<Option<Bytes>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        loop {
            match &mut self.state {
                BodyState::Done => return Ok(None),
                BodyState::Length { remaining } => {
                    let data = read_bounded(reader, *remaining).await?;
                    *remaining -= data.len() as u64;
                    if *remaining == 0 {
                        self.state = BodyState::Done;
                    }
                    return Ok(Some(data));
                }
                BodyState::Chunked { remaining, need_crlf } => {
                    if *remaining > 0 {
                        let data = read_bounded(reader, *remaining).await?;
                        *remaining -= data.len() as u64;
                        *need_crlf = *remaining == 0;
                        return Ok(Some(data));
                    }
                    if *need_crlf {
                        let line = read_line(reader).await?;
                        if line != b"\r\n" && line != b"\n" {
                            return Err(invalid("missing CRLF after chunk data"));
                        }
                        *need_crlf = false;
                    }
                    let size = read_chunk_size(reader).await?;
                    if size == 0 {
                        skip_trailers(reader).await?;
                        self.state = BodyState::Done;
                    } else {
                        *remaining = size;
                    }
                }
            }
        }
    }

    /// Reads the rest of the body into one buffer.
    pub async fn read_to_end(&mut self) -> io::Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl Default for Body {
    fn default() -> Self { Self::empty() }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_owned())
}

/// Returns whatever is buffered, up to `limit` bytes.
async fn read_bounded<R>(reader: &mut R, limit: u64) -> io::Result<Bytes>
where
    R: AsyncBufRead + Unpin,
{
    let buf = reader.fill_buf().await?;
    if buf.is_empty() {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    let n = buf.len().min(usize::try_from(limit).unwrap_or(usize::MAX));
    let data = Bytes::copy_from_slice(&buf[..n]);
    reader.consume(n);
    Ok(data)
}

async fn read_line<R>(reader: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    (&mut *reader).take(MAX_CHUNK_LINE).read_until(b'\n', &mut line).await?;
    if !line.ends_with(b"\n") {
        return Err(invalid("chunk line too long or truncated"));
    }
    Ok(line)
}

async fn read_chunk_size<R>(reader: &mut R) -> io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader).await?;
    match httparse::parse_chunk_size(&line) {
        Ok(httparse::Status::Complete((_, size))) => Ok(size),
        _ => Err(invalid("bad chunk size")),
    }
}

async fn skip_trailers<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let line = read_line(reader).await?;
        if line == b"\r\n" || line == b"\n" {
            return Ok(());
        }
    }
}
