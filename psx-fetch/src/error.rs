//! Error types for psx-fetch.

use std::fmt;

use psx_core::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Classification of a single failed network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request or read timed out (includes HTTP 408).
    Timeout,
    /// DNS, refused or reset connection.
    Connection,
    /// HTTP 5xx.
    Server,
    /// HTTP 429.
    RateLimited,
    /// HTTP 4xx other than 408/429, or a request that could never succeed.
    Client,
    /// The response arrived but does not have the expected shape.
    Malformed,
    Other,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connection => "connection",
            ErrorKind::Server => "server",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Client => "client",
            ErrorKind::Malformed => "malformed",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an HTTP status code to an [`ErrorKind`].
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        408 => ErrorKind::Timeout,
        429 => ErrorKind::RateLimited,
        400..=499 => ErrorKind::Client,
        500..=599 => ErrorKind::Server,
        _ => ErrorKind::Other,
    }
}

/// One failed attempt, as returned by the operation handed to `fetch_with_retry`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct RequestError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl RequestError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Error for a non-success HTTP response.
    pub fn from_status(status: u16, url: &str) -> Self {
        Self {
            kind: classify_status(status),
            status: Some(status),
            message: format!("HTTP {status} from {url}"),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, message)
    }
}

/// What callers of the retry wrapper see.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A terminal error; surfaced on the attempt that produced it.
    #[error("request rejected: {error}")]
    Rejected {
        /// Attempts made, counting the one that was rejected.
        attempts: u32,
        #[source]
        error: RequestError,
    },

    /// Every permitted attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        /// How many of those attempts failed with HTTP 5xx.
        server_errors: u32,
        #[source]
        last: Box<RequestError>,
    },

    /// The cancel token fired or its deadline passed.
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// A local listing could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FetchError {
    /// A terminal error on the first attempt.
    pub fn rejected(error: RequestError) -> Self {
        FetchError::Rejected { attempts: 1, error }
    }

    /// `true` when retries ran out and every attempt was an HTTP 5xx.
    pub fn exhausted_by_server_errors(&self) -> bool {
        matches!(
            self,
            FetchError::Exhausted { attempts, server_errors, .. } if *attempts > 0 && server_errors == attempts
        )
    }

    /// Kind of the final underlying request error, if there was one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            FetchError::Rejected { error, .. } => Some(error.kind),
            FetchError::Exhausted { last, .. } => Some(last.kind),
            FetchError::Cancelled { .. } | FetchError::Store(_) => None,
        }
    }

    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            FetchError::Rejected { attempts, .. }
            | FetchError::Exhausted { attempts, .. }
            | FetchError::Cancelled { attempts } => *attempts,
            FetchError::Store(_) => 0,
        }
    }
}
