//! Unified error type.

use std::fmt;

/// Boxed error returned by handlers that fail.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by switchyard's fallible operations.
///
/// Application-level outcomes (404, 400 and friends) are written to the
/// connection, not returned as `Error`s. This type surfaces startup failures:
/// binding the listening port, building the runtime, or an invalid route
/// pattern.
#[derive(Debug)]
pub enum Error {
    /// Socket or runtime failure.
    Io(std::io::Error),
    /// A registered route pattern is not a valid regular expression.
    Route { pattern: String, source: regex::Error },
    /// TLS material could not be loaded or the TLS config was rejected.
    Tls(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Route { pattern, source } => write!(f, "invalid route `{pattern}`: {source}"),
            Self::Tls(msg) => write!(f, "tls: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Route { source, .. } => Some(source),
            Self::Tls(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Self::Tls(e.to_string())
    }
}
