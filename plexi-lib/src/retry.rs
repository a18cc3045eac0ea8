use http::StatusCode;

/// An extension trait to help determine if a failed connection attempt
/// is retryable.
///
/// 401 (invalid token) and 403 (possible bot challenge, retried with
/// backoff) are classified by the caller; this trait covers the
/// remaining statuses and transport-level failures.
pub(crate) trait RetryExt {
    fn should_retry(&self) -> bool;
}

impl RetryExt for StatusCode {
    fn should_retry(&self) -> bool {
        self.is_server_error() || *self == StatusCode::TOO_MANY_REQUESTS
    }
}

impl RetryExt for reqwest::Error {
    fn should_retry(&self) -> bool {
        if self.is_body() || self.is_decode() || self.is_builder() || self.is_redirect() {
            false
        } else {
            self.is_timeout() || self.is_connect() || self.is_request()
        }
    }
}
