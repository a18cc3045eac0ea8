use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

/// How many characters of an unparseable SSE data block are kept for
/// diagnostics.
const SNIPPET_LEN: usize = 100;

/// Possible errors when interacting with `plexi_lib`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A rate limiter was constructed with a zero capacity or a
    /// non-positive period
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),

    /// The service returned HTTP 401; this is never retried
    #[error("authentication failed; token may be invalid or expired")]
    AuthenticationFailed,

    /// The service kept returning HTTP 403 through all retry attempts
    #[error("access forbidden after {attempts} attempts")]
    Forbidden {
        /// Number of connection attempts made before giving up
        attempts: usize,
    },

    /// The service kept returning HTTP 429 through all retry attempts
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimited {
        /// Number of connection attempts made before giving up
        attempts: usize,
    },

    /// A connection failure or 5xx response persisted through all retry
    /// attempts
    #[error("network or server error after {attempts} attempts: {reason}")]
    NetworkOrServerError {
        /// Number of connection attempts made before giving up
        attempts: usize,
        /// Status code or transport error description of the last attempt
        reason: String,
    },

    /// An SSE data block could not be parsed as JSON; fatal for the
    /// current stream, since the connect phase is already committed
    #[error("malformed SSE frame, data is not valid JSON: {snippet}")]
    MalformedFrame {
        /// Leading characters of the offending data block
        snippet: String,
    },

    /// Any other non-success status code; surfaced immediately without
    /// retries
    #[error("unexpected status code: {0}")]
    RejectedStatusCode(StatusCode),

    /// Reqwest network error outside of the retry-classified cases
    #[error("network error while trying to connect to an endpoint")]
    ReqwestError(#[from] reqwest::Error),

    /// The given header could not be parsed
    #[error("header could not be parsed")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The given string can not be parsed into a valid URL
    #[error("cannot parse URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Any form of I/O error occurred while reading from a given path
    #[error("failed to read from path: `{path}`, reason: {1}", path = match .0 {
        Some(p) => p.to_str().unwrap_or("<MALFORMED PATH>"),
        None => "<MALFORMED PATH>",
    })]
    IoError(Option<PathBuf>, std::io::Error),

    /// Errors which can occur when attempting to interpret a sequence of
    /// u8 as a string
    #[error("attempted to interpret an invalid sequence of bytes as a string")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// A request or response body could not be (de)serialized
    #[error("invalid JSON body: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The stored token could not be encrypted, decrypted, or accessed
    #[error("token storage error: {0}")]
    TokenStorage(String),
}

impl ErrorKind {
    /// Create a [`ErrorKind::MalformedFrame`] from the raw data of an
    /// SSE block, truncated to a short diagnostic snippet.
    pub(crate) fn malformed_frame(data: &str) -> Self {
        Self::MalformedFrame {
            snippet: data.chars().take(SNIPPET_LEN).collect(),
        }
    }
}

impl From<(PathBuf, std::io::Error)> for ErrorKind {
    fn from(value: (PathBuf, std::io::Error)) -> Self {
        Self::IoError(Some(value.0), value.1)
    }
}

impl From<std::io::Error> for ErrorKind {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(None, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_frame_truncates_snippet() {
        let data = "x".repeat(500);
        let ErrorKind::MalformedFrame { snippet } = ErrorKind::malformed_frame(&data) else {
            panic!("expected MalformedFrame");
        };
        assert_eq!(snippet.len(), 100);
    }

    #[test]
    fn test_malformed_frame_respects_char_boundaries() {
        let data = "ü".repeat(200);
        let ErrorKind::MalformedFrame { snippet } = ErrorKind::malformed_frame(&data) else {
            panic!("expected MalformedFrame");
        };
        assert_eq!(snippet.chars().count(), 100);
    }
}
