//! Error types for streamget
//!
//! Errors detectable before any I/O (bad schemes, malformed proxy options) are
//! returned synchronously; everything after the first request has been issued
//! travels through the download's event channel.

use thiserror::Error;

/// Main error type for streamget operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed option input, e.g. a proxy scheme other than http/https
    #[error("Invalid options: {0}")]
    Validation(String),

    /// Source scheme outside of http/https
    #[error("Your URL must use either HTTP or HTTPS.")]
    UnsupportedScheme(String),

    /// The source URL has no determinable scheme
    #[error("Could not parse URL '{0}'")]
    UrlParse(String),

    /// The redirect hop limit was reached
    #[error("Infinite redirect loop detected")]
    RedirectLoop,

    /// A 3xx response arrived without a Location header
    #[error("Server responded with redirect status {0} but no Location header")]
    MissingLocation(u16),

    /// Any status code other than 200/301/302/307
    #[error("Server responded with unhandled status: {0}")]
    ServerStatus(u16),

    /// Connection, TLS or body stream failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Destination file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller aborted the request
    #[error("Request aborted")]
    Aborted,

    /// A download was started outside of a tokio runtime
    #[error("Downloads must be started from within a tokio runtime")]
    NoRuntime,
}

impl Error {
    /// Whether this error can only be observed after I/O has begun
    pub fn is_runtime(&self) -> bool {
        !matches!(
            self,
            Error::Validation(_) | Error::UnsupportedScheme(_) | Error::NoRuntime
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Error::ServerStatus(status.as_u16());
        }
        Error::Transport(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::UrlParse(err.to_string())
    }
}

/// Convenience result type for streamget operations
pub type Result<T> = std::result::Result<T, Error>;
