//! Request-head parser.
//!
//! Reads the request line and headers up to the first empty line, then hands
//! the buffered head to [`httparse`]. The body is left unread in the reader;
//! [`Framing`] records how the handler's [`Body`](crate::Body) should
//! consume it.

use std::fmt;
use std::io;

use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, Version};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Size and count limits applied while reading a head.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Limits {
    pub(crate) max_head_bytes: usize,
    pub(crate) max_headers: usize,
}

/// How the request body is delimited on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Framing {
    Empty,
    Length(u64),
    Chunked,
}

/// A parsed request line plus headers.
#[derive(Debug)]
pub(crate) struct Head {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) version: Version,
    pub(crate) headers: HeaderMap,
    pub(crate) framing: Framing,
}

/// Why a request head could not be read.
#[derive(Debug)]
pub(crate) enum ParseError {
    /// The peer closed the connection before sending anything.
    Closed,
    Io(io::Error),
    Malformed(String),
    /// The head exceeded the byte or header-count limit.
    TooLarge,
}

impl ParseError {
    /// Status to answer with, or `None` when nobody is listening.
    pub(crate) fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Closed | Self::Io(_) => None,
            Self::Malformed(_) => Some(StatusCode::BAD_REQUEST),
            Self::TooLarge => Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("connection closed before request"),
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Malformed(msg) => write!(f, "malformed request: {msg}"),
            Self::TooLarge => f.write_str("request head too large"),
        }
    }
}

fn malformed(msg: impl Into<String>) -> ParseError {
    ParseError::Malformed(msg.into())
}

/// Reads one request head from `reader`.
pub(crate) async fn parse<R>(reader: &mut R, limits: Limits) -> Result<Head, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let raw = read_head(reader, limits.max_head_bytes).await?;

    let mut slots = vec![httparse::EMPTY_HEADER; limits.max_headers];
    let mut req = httparse::Request::new(&mut slots);
    match req.parse(&raw) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => return Err(malformed("incomplete request head")),
        Err(httparse::Error::TooManyHeaders) => return Err(ParseError::TooLarge),
        Err(e) => return Err(malformed(e.to_string())),
    }

    let method = req.method.ok_or_else(|| malformed("missing method"))?;
    let method = Method::from_bytes(method.as_bytes()).map_err(|e| malformed(e.to_string()))?;

    let target = req.path.ok_or_else(|| malformed("missing request target"))?;
    let uri: Uri = target.parse().map_err(|_| malformed(format!("bad target `{target}`")))?;

    let version = match req.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        _ => return Err(malformed("unsupported HTTP version")),
    };

    let mut headers = HeaderMap::with_capacity(req.headers.len());
    for h in req.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|_| malformed(format!("bad header name `{}`", h.name)))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|_| malformed(format!("bad value for header `{}`", h.name)))?;
        // Framing headers must agree; for everything else the last one wins.
        if let Some(prev) = headers.get(&name) {
            if name == TRANSFER_ENCODING || (name == CONTENT_LENGTH && *prev != value) {
                return Err(malformed(format!("conflicting `{name}` headers")));
            }
        }
        headers.insert(name, value);
    }

    let framing = framing(&headers)?;

    Ok(Head {
        method,
        path: uri.path().to_owned(),
        query: uri.query().map(str::to_owned),
        version,
        headers,
        framing,
    })
}

/// Buffers lines until the blank line that ends the head.
async fn read_head<R>(reader: &mut R, max: usize) -> Result<Vec<u8>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = Vec::with_capacity(512);
    loop {
        let remaining = max.saturating_sub(head.len());
        if remaining == 0 {
            return Err(ParseError::TooLarge);
        }

        let start = head.len();
        let n = (&mut *reader)
            .take(remaining as u64)
            .read_until(b'\n', &mut head)
            .await
            .map_err(ParseError::Io)?;

        if n == 0 {
            return Err(if head.is_empty() {
                ParseError::Closed
            } else {
                malformed("connection closed mid-head")
            });
        }

        let line = &head[start..];
        if !line.ends_with(b"\n") {
            return Err(if head.len() >= max {
                ParseError::TooLarge
            } else {
                malformed("connection closed mid-line")
            });
        }

        if line == b"\r\n" || line == b"\n" {
            if start == 0 {
                // Stray CRLF ahead of the request line (RFC 9112 §2.2).
                head.clear();
                continue;
            }
            return Ok(head);
        }
    }
}

fn framing(headers: &HeaderMap) -> Result<Framing, ParseError> {
    let te = headers.get(TRANSFER_ENCODING);
    let cl = headers.get(CONTENT_LENGTH);

    match (te, cl) {
        (Some(_), Some(_)) => Err(malformed("both transfer-encoding and content-length")),
        (Some(te), None) => {
            let te = te.to_str().map_err(|_| malformed("bad transfer-encoding"))?;
            let last = te.rsplit(',').next().unwrap_or("").trim();
            if last.eq_ignore_ascii_case("chunked") {
                Ok(Framing::Chunked)
            } else {
                Err(malformed(format!("unsupported transfer-encoding `{te}`")))
            }
        }
        (None, Some(cl)) => {
            let len = cl
                .to_str()
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .ok_or_else(|| malformed("bad content-length"))?;
            Ok(if len == 0 { Framing::Empty } else { Framing::Length(len) })
        }
        (None, None) => Ok(Framing::Empty),
    }
}
