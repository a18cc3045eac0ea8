//! `plexi-lib` is the core of `plexi`, an unofficial client for the
//! Perplexity.ai answer engine.
//!
//! It provides a streaming HTTP client which submits queries over the
//! SSE (Server-Sent Events) protocol, a token-bucket rate limiter for
//! pacing requests against the service quota, a scraper for the thread
//! library, and an encrypted on-disk token store.
//!
//! ```no_run
//! use futures::StreamExt;
//! use plexi_lib::{ClientBuilder, QueryRequest, Result};
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ClientBuilder::builder()
//!         .token(Some(SecretString::from("my-session-token".to_string())))
//!         .build()
//!         .client()?;
//!
//!     let request = QueryRequest::new("How do rockets work?");
//!     let stream = client.submit_query(&request)?;
//!     futures::pin_mut!(stream);
//!
//!     while let Some(message) = stream.next().await {
//!         if let Some(text) = message?.answer_text() {
//!             println!("{text}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod auth;
mod client;
mod ratelimit;
mod retry;
mod threads;
mod types;

pub use auth::TokenStore;
pub use client::{
    Client, ClientBuilder, DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT,
};
pub use ratelimit::{RateLimiter, RateLimiterStats};
pub use threads::{ThreadRecord, ThreadScraper};
pub use types::*;
