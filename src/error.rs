//! Unified error type.
//!
//! Every failure the chain can report travels up to whoever called
//! [`Chain::dispatch`](crate::Chain::dispatch). Nothing here is recovered
//! internally: configuration mistakes and exhausted chains are programming
//! defects, and [`HttpError`]s belong to whichever unit chooses to catch them.

use std::fmt;

use http::StatusCode;

use crate::container::LookupError;
use crate::response::Response;

/// The error type returned by tether's fallible operations.
#[derive(Debug)]
pub enum Error {
    /// The chain was assembled wrongly. Never retried.
    Config(ConfigError),
    /// A unit called the continuation after the last unit had run.
    Exhausted,
    /// The continuation was called on a chain that is not dispatching.
    NotDispatched,
    /// A unit gave up with an HTTP status.
    Http(HttpError),
    /// [`HttpError::new`] was given a code that is not an HTTP error.
    InvalidStatus(u16),
    /// Binding, accepting or emitting failed.
    Io(std::io::Error),
}

impl Error {
    /// `true` for every failure caused by how the chain was assembled.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration: {e}"),
            Self::Exhausted => f.write_str("middleware chain exhausted, no unit produced a response"),
            Self::NotDispatched => f.write_str("continuation invoked outside of dispatch"),
            Self::Http(e) => write!(f, "http: {e}"),
            Self::InvalidStatus(code) => write!(f, "not a valid http error status ({code})"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Http(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

// ── ConfigError ──────────────────────────────────────────────────────────────

/// Ways a chain can be assembled wrongly.
#[derive(Debug)]
pub enum ConfigError {
    /// `Chain::new` was given no middleware.
    EmptyChain,
    /// A named reference was reached but the chain has no container.
    NoContainer { name: String },
    /// The container does not know the name.
    Lookup(LookupError),
    /// The container returned something that is not middleware.
    InvalidMiddleware { name: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyChain => f.write_str("empty middleware chain"),
            Self::NoContainer { name } => {
                write!(f, "no container available to resolve middleware `{name}`")
            }
            Self::Lookup(e) => write!(f, "lookup failed: {e}"),
            Self::InvalidMiddleware { name } => {
                write!(f, "`{name}` does not resolve to a middleware instance")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Lookup(e) => Some(e),
            _ => None,
        }
    }
}

// ── HttpError ────────────────────────────────────────────────────────────────

/// An error a unit raises when it wants the request to end with an HTTP
/// error status.
///
/// Units placed early in the chain can catch it from `next.handle(..)` and
/// render their own error page; otherwise it reaches the dispatch caller.
///
/// ```rust
/// use tether::HttpError;
///
/// let err = HttpError::new(404).unwrap().with_context("path", "/missing");
/// assert_eq!(err.status().as_u16(), 404);
/// assert_eq!(err.context("path"), Some("/missing"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpError {
    status: StatusCode,
    context: Vec<(String, String)>,
}

impl HttpError {
    /// Accepts 4xx and 5xx codes that carry a registered reason phrase.
    pub fn new(code: u16) -> Result<Self, Error> {
        let status = StatusCode::from_u16(code).map_err(|_| Error::InvalidStatus(code))?;
        let is_error = status.is_client_error() || status.is_server_error();
        if !is_error || status.canonical_reason().is_none() {
            return Err(Error::InvalidStatus(code));
        }
        Ok(Self { status, context: Vec::new() })
    }

    /// `500 Internal Server Error`, the status used when nothing better fits.
    pub fn internal() -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, context: Vec::new() }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn context_pairs(&self) -> &[(String, String)] { &self.context }

    /// First context value stored under `key`.
    pub fn context(&self, key: &str) -> Option<&str> {
        self.context.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Plain-text response carrying the status and its reason phrase.
    pub fn into_response(self) -> Response {
        let reason = self.status.canonical_reason().unwrap_or_default();
        Response::builder()
            .status(self.status)
            .text(reason)
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = self.status.canonical_reason().unwrap_or_default();
        write!(f, "{} {reason}", self.status.as_u16())
    }
}

impl std::error::Error for HttpError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_rejects_non_error_codes() {
        assert!(matches!(HttpError::new(200), Err(Error::InvalidStatus(200))));
        assert!(matches!(HttpError::new(99), Err(Error::InvalidStatus(99))));
        assert!(matches!(HttpError::new(599), Err(Error::InvalidStatus(599))));
    }

    #[test]
    fn http_error_renders_reason() {
        let err = HttpError::new(503).unwrap();
        assert_eq!(err.to_string(), "503 Service Unavailable");

        let res = err.into_response();
        assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.body().as_ref(), b"Service Unavailable");
    }

    #[test]
    fn internal_is_a_plain_500() {
        let err = HttpError::internal().with_context("stage", "render");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.context("stage"), Some("render"));
        assert_eq!(HttpError::internal(), HttpError::new(500).unwrap());

        let res = HttpError::internal().into_response();
        assert_eq!(res.body().as_ref(), b"Internal Server Error");
    }

    #[test]
    fn config_errors_classify() {
        let err = Error::from(ConfigError::EmptyChain);
        assert!(err.is_config());
        assert!(!Error::Exhausted.is_config());
        assert_eq!(err.to_string(), "configuration: empty middleware chain");
    }
}
