//! Streaming HTTP client for the answer API.
//!
//! This module defines two structs, [`Client`] and [`ClientBuilder`].
//! `Client` submits queries over a streaming POST and decodes the SSE
//! response into discrete JSON messages. `ClientBuilder` exposes a
//! finer level of granularity for building a `Client`.
//!
//! Retries apply only to the connect/initial-response phase: once a
//! stream is open, a mid-stream failure is terminal for that call,
//! since re-issuing the request could duplicate partial output.

mod sse;

use std::collections::HashMap;
use std::time::Duration;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use log::{debug, warn};
use reqwest::Response;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::time::sleep;
use typed_builder::TypedBuilder;
use url::Url;

use crate::retry::RetryExt;
use crate::{ErrorKind, QueryRequest, Result, SseMessage};
use sse::SseDecoder;

/// Default number of connection attempts before a request is deemed as
/// failed, 3.
pub const DEFAULT_MAX_RETRIES: usize = 3;
/// Default timeout in seconds before a request is deemed as failed, 60.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Default user agent, `plexi-<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("plexi/", env!("CARGO_PKG_VERSION"));
/// Default base URL of the service.
pub const DEFAULT_BASE_URL: &str = "https://www.perplexity.ai";

/// A timeout for only the connect phase of a Client.
const CONNECT_TIMEOUT: u64 = 10;
/// Path of the SSE query endpoint, relative to the base URL.
const QUERY_ENDPOINT: &str = "/rest/sse/perplexity_ask";

/// Builder for [`Client`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
pub struct ClientBuilder {
    /// Bearer token used to authenticate against the API.
    ///
    /// Requests without a token are accepted by the builder but will be
    /// rejected by the service with a 401.
    token: Option<SecretString>,

    /// Session cookies forwarded with every request.
    ///
    /// A `csrftoken` cookie is additionally sent as an `X-CSRFToken`
    /// header, which the service requires for authenticated writes.
    cookies: HashMap<String, String>,

    /// Overall request timeout.
    #[builder(default = Duration::from_secs(DEFAULT_TIMEOUT_SECS))]
    timeout: Duration,

    /// Maximum number of connection attempts for one logical request.
    ///
    /// This bounds total attempts, not retries after the first: a value
    /// of 3 means at most 3 requests hit the wire.
    #[builder(default = DEFAULT_MAX_RETRIES)]
    max_retries: usize,

    /// User agent to send with every request.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,

    /// Base URL of the service; `None` means [`DEFAULT_BASE_URL`].
    base_url: Option<Url>,
}

impl Default for ClientBuilder {
    #[must_use]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiate a [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or a header value cannot be
    /// parsed, or if the underlying HTTP client cannot be built.
    pub fn client(self) -> Result<Client> {
        let Self {
            token,
            cookies,
            timeout,
            max_retries,
            user_agent,
            base_url,
        } = self;

        let base_url = match base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL)?,
        };

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_str(&user_agent)?);

        let origin = base_url.as_str().trim_end_matches('/').to_string();
        headers.insert(header::ORIGIN, HeaderValue::from_str(&origin)?);
        headers.insert(header::REFERER, HeaderValue::from_str(&format!("{origin}/"))?);

        if let Some(token) = token {
            let mut auth =
                HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
            auth.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, auth);
        }

        if !cookies.is_empty() {
            let cookie_header = cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            let mut cookie = HeaderValue::from_str(&cookie_header)?;
            cookie.set_sensitive(true);
            headers.insert(header::COOKIE, cookie);

            if let Some(csrf) = cookies.get("csrftoken") {
                headers.insert(
                    HeaderName::from_static("x-csrftoken"),
                    HeaderValue::from_str(csrf)?,
                );
            }
        }

        let reqwest_client = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .build()
            .map_err(ErrorKind::ReqwestError)?;

        Ok(Client {
            reqwest_client,
            base_url,
            timeout,
            max_retries,
        })
    }
}

/// Handler of streaming query requests.
///
/// One instance holds no mutable state across calls; concurrent calls
/// on the same instance are independent.
#[derive(Debug, Clone)]
pub struct Client {
    /// Underlying `reqwest` client instance with default headers
    reqwest_client: reqwest::Client,
    /// Base URL of the service
    base_url: Url,
    /// Per-request timeout
    timeout: Duration,
    /// Maximum connection attempts per logical request
    max_retries: usize,
}

impl Client {
    /// The base URL this client talks to.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Submit a query and stream the decoded answer messages.
    ///
    /// The returned stream is lazy, finite, and not restartable: it
    /// ends when the server closes the connection, and a fresh call
    /// re-issues a fresh request. Dropping the stream early releases
    /// the underlying connection.
    ///
    /// # Errors
    ///
    /// Building the request can fail with [`ErrorKind::InvalidUrl`] or
    /// [`ErrorKind::JsonError`]. Each stream item can fail with one of
    /// the connect-phase errors ([`ErrorKind::AuthenticationFailed`],
    /// [`ErrorKind::Forbidden`], [`ErrorKind::RateLimited`],
    /// [`ErrorKind::NetworkOrServerError`],
    /// [`ErrorKind::RejectedStatusCode`]) or a terminal mid-stream
    /// [`ErrorKind::MalformedFrame`].
    pub fn submit_query(
        &self,
        request: &QueryRequest,
    ) -> Result<impl Stream<Item = Result<SseMessage>> + '_> {
        let url = self.base_url.join(QUERY_ENDPOINT)?;
        let body = serde_json::to_value(request)?;
        Ok(self
            .stream(url, body)
            .map(|value| value.and_then(SseMessage::from_value)))
    }

    /// POST `body` to `url` and decode the SSE response into a stream
    /// of JSON messages, in the exact order their frames were received.
    pub fn stream(&self, url: Url, body: Value) -> impl Stream<Item = Result<Value>> + '_ {
        try_stream! {
            // The response lives inside this generator scope, so the
            // connection is released on every exit path, including the
            // consumer dropping the stream early.
            let response = self.connect(&url, &body).await?;
            debug!("SSE stream opened for {url}");

            let mut decoder = SseDecoder::new();
            let mut buffer: Vec<u8> = Vec::new();
            let mut chunks = response.bytes_stream();

            while let Some(chunk) = chunks.next().await {
                // Mid-stream transport failures are terminal; the
                // connect phase is already committed.
                let chunk = chunk.map_err(ErrorKind::ReqwestError)?;
                buffer.extend_from_slice(&chunk);

                // A UTF-8 continuation byte can never be `\n`, so
                // splitting on newlines before decoding is safe even
                // when a chunk boundary falls inside a character.
                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = std::str::from_utf8(&raw[..pos])?;
                    let line = line.strip_suffix('\r').unwrap_or(line);
                    if let Some(message) = decoder.push_line(line)? {
                        yield message;
                    }
                }
            }

            // Trailing line without a final newline
            if !buffer.is_empty() {
                let line = std::str::from_utf8(&buffer)?;
                let line = line.strip_suffix('\r').unwrap_or(line);
                if let Some(message) = decoder.push_line(line)? {
                    yield message;
                }
            }

            if let Some(message) = decoder.finish()? {
                yield message;
            }
            debug!("SSE stream completed");
        }
    }

    /// Plain JSON POST used by non-streaming endpoints (thread
    /// listing). 401 maps to [`ErrorKind::AuthenticationFailed`]; any
    /// other non-success status is rejected without retries.
    pub async fn post_json(&self, url: Url, body: &Value) -> Result<Value> {
        let response = self
            .reqwest_client
            .post(url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ErrorKind::AuthenticationFailed);
        }
        if !status.is_success() {
            return Err(ErrorKind::RejectedStatusCode(status));
        }
        Ok(response.json().await?)
    }

    /// Open the streaming POST, applying the status-driven retry policy
    /// to the connect/initial-response phase:
    ///
    /// - 2xx: start streaming, no further retries
    /// - 401: fail immediately, never retried
    /// - 403: exponential backoff (2s, 4s, ...), then retry
    /// - 429: retry immediately (`Retry-After` handling is left to the
    ///   caller or a higher layer, matching the 403/429 asymmetry of
    ///   the service)
    /// - other 5xx and transport errors: retry immediately
    /// - anything else: fail immediately
    async fn connect(&self, url: &Url, body: &Value) -> Result<Response> {
        let mut attempt: usize = 0;

        loop {
            debug!(
                "streaming POST to {url} (attempt {}/{})",
                attempt + 1,
                self.max_retries
            );

            let result = self
                .reqwest_client
                .post(url.clone())
                .header(header::ACCEPT, "text/event-stream")
                .json(body)
                .timeout(self.timeout)
                .send()
                .await;

            let has_attempts_left = attempt + 1 < self.max_retries;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if status == StatusCode::UNAUTHORIZED {
                        return Err(ErrorKind::AuthenticationFailed);
                    }

                    if status == StatusCode::FORBIDDEN {
                        if has_attempts_left {
                            attempt += 1;
                            let backoff = Duration::from_secs(1 << attempt);
                            warn!(
                                "HTTP 403 (may be a bot challenge), retrying in {}s (attempt {}/{})",
                                backoff.as_secs(),
                                attempt + 1,
                                self.max_retries
                            );
                            sleep(backoff).await;
                            continue;
                        }
                        return Err(ErrorKind::Forbidden {
                            attempts: self.max_retries,
                        });
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if has_attempts_left {
                            attempt += 1;
                            warn!(
                                "HTTP 429, retrying (attempt {}/{})",
                                attempt + 1,
                                self.max_retries
                            );
                            continue;
                        }
                        return Err(ErrorKind::RateLimited {
                            attempts: self.max_retries,
                        });
                    }

                    if status.should_retry() {
                        if has_attempts_left {
                            attempt += 1;
                            warn!(
                                "HTTP {status}, retrying (attempt {}/{})",
                                attempt + 1,
                                self.max_retries
                            );
                            continue;
                        }
                        return Err(ErrorKind::NetworkOrServerError {
                            attempts: self.max_retries,
                            reason: format!("HTTP {status}"),
                        });
                    }

                    return Err(ErrorKind::RejectedStatusCode(status));
                }
                Err(err) => {
                    if err.should_retry() && has_attempts_left {
                        attempt += 1;
                        warn!(
                            "network error, retrying (attempt {}/{}): {err}",
                            attempt + 1,
                            self.max_retries
                        );
                        continue;
                    }
                    return Err(ErrorKind::NetworkOrServerError {
                        attempts: attempt + 1,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{Client, ClientBuilder, QUERY_ENDPOINT};
    use crate::{ErrorKind, QueryRequest, Result};

    const SSE_BODY: &str = concat!(
        "event: message\n",
        "data: {\"status\": \"pending\", \"blocks\": []}\n",
        "\n",
        "event: message\n",
        "data: {\"status\": \"completed\", \"final_sse_message\": true, \"blocks\": []}\n",
        "\n",
    );

    fn client(server: &MockServer, max_retries: usize) -> Client {
        ClientBuilder::builder()
            .token(Some(SecretString::from("test-token".to_string())))
            .base_url(Some(Url::parse(&server.uri()).unwrap()))
            .max_retries(max_retries)
            .build()
            .client()
            .unwrap()
    }

    async fn collect(client: &Client, server: &MockServer) -> Vec<Result<Value>> {
        let url = Url::parse(&server.uri())
            .unwrap()
            .join(QUERY_ENDPOINT)
            .unwrap();
        let stream = client.stream(url, json!({}));
        futures::pin_mut!(stream);
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item);
        }
        items
    }

    async fn request_count(server: &MockServer) -> usize {
        server.received_requests().await.unwrap().len()
    }

    fn sse_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
    }

    #[tokio::test]
    async fn test_streams_messages_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(QUERY_ENDPOINT))
            .respond_with(sse_response(SSE_BODY))
            .mount(&server)
            .await;

        let client = client(&server, 3);
        let items = collect(&client, &server).await;

        let values: Vec<Value> = items.into_iter().collect::<Result<_>>().unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["status"], "pending");
        assert_eq!(values[1]["final_sse_message"], true);
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_submit_query_decodes_messages() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: message\n",
            "data: {\"status\": \"completed\", \"final_sse_message\": true,\n",
            "data:  \"blocks\": [{\"intended_usage\": \"ask_text\", \"answer\": \"42\"}]}\n",
            "\n",
        );
        Mock::given(method("POST"))
            .and(path(QUERY_ENDPOINT))
            .respond_with(sse_response(body))
            .mount(&server)
            .await;

        let client = client(&server, 3);
        let request = QueryRequest::new("meaning of life");
        let stream = client.submit_query(&request).unwrap();
        futures::pin_mut!(stream);

        let message = stream.next().await.unwrap().unwrap();
        assert!(message.final_sse_message);
        assert_eq!(message.answer_text(), Some("42"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_no_retry_on_401() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client(&server, 3);
        let items = collect(&client, &server).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ErrorKind::AuthenticationFailed)));
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_forbidden_after_exhausting_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = client(&server, 2);
        let items = collect(&client, &server).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(ErrorKind::Forbidden { attempts: 2 })
        ));
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn test_retry_on_403_then_success() {
        let server = MockServer::start().await;
        // First attempt is blocked, the retry goes through.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(sse_response(SSE_BODY))
            .mount(&server)
            .await;

        let client = client(&server, 2);
        let items = collect(&client, &server).await;

        let values: Vec<Value> = items.into_iter().collect::<Result<_>>().unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn test_rate_limited_after_exhausting_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client(&server, 3);
        let items = collect(&client, &server).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(ErrorKind::RateLimited { attempts: 3 })
        ));
        assert_eq!(request_count(&server).await, 3);
    }

    #[tokio::test]
    async fn test_server_error_after_exhausting_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client(&server, 2);
        let items = collect(&client, &server).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(ErrorKind::NetworkOrServerError { attempts: 2, .. })
        ));
        assert_eq!(request_count(&server).await, 2);
    }

    #[tokio::test]
    async fn test_unclassified_status_fails_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client(&server, 3);
        let items = collect(&client, &server).await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ErrorKind::RejectedStatusCode(_))));
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_is_terminal_mid_stream() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: message\n",
            "data: {\"ok\": true}\n",
            "\n",
            "event: message\n",
            "data: certainly not json\n",
            "\n",
            "event: message\n",
            "data: {\"never\": \"reached\"}\n",
            "\n",
        );
        Mock::given(method("POST"))
            .respond_with(sse_response(body))
            .mount(&server)
            .await;

        let client = client(&server, 3);
        let items = collect(&client, &server).await;

        // The first message was already yielded and is not retracted.
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &json!({"ok": true}));
        assert!(matches!(items[1], Err(ErrorKind::MalformedFrame { .. })));
        // The stream is not retried after the connect phase.
        assert_eq!(request_count(&server).await, 1);
    }
}
