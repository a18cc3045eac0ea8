//! Paginated export of the account's past query threads.
//!
//! The listing endpoint is the same one the web frontend's history page
//! uses: POST with an offset-based cursor, newest first. Each page's
//! entries carry a `has_next_page` flag, so pagination stops when the
//! service says so rather than on a short page.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::{Client, RateLimiter, Result, types::API_VERSION};

/// Threads fetched per request; the frontend uses the same size.
const PAGE_SIZE: usize = 100;
/// Path of the thread listing endpoint, relative to the base URL.
const LIST_ENDPOINT: &str = "/rest/thread/list_ask_threads";

/// One exported thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadRecord {
    /// Thread title as shown in the history page
    pub title: String,
    /// Shareable URL of the thread
    pub url: String,
    /// When the thread was last queried
    pub created_at: DateTime<Utc>,
}

/// Shape of one entry in the listing response. Only the fields the
/// export needs; everything else the service sends is dropped.
#[derive(Debug, Deserialize)]
struct ThreadListEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    last_query_datetime: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

/// Walks the thread listing endpoint page by page and collects every
/// thread, optionally throttled by a [`RateLimiter`] and filtered to a
/// date range.
pub struct ThreadScraper<'c> {
    client: &'c Client,
    limiter: Option<RateLimiter>,
}

impl<'c> ThreadScraper<'c> {
    /// A scraper issuing unthrottled requests through `client`.
    #[must_use]
    pub const fn new(client: &'c Client) -> Self {
        Self {
            client,
            limiter: None,
        }
    }

    /// A scraper that acquires a token from `limiter` after each page.
    #[must_use]
    pub const fn with_rate_limiter(client: &'c Client, limiter: RateLimiter) -> Self {
        Self {
            client,
            limiter: Some(limiter),
        }
    }

    /// Fetch all threads, newest first.
    ///
    /// `from` and `to` bound the thread date inclusively; `None` leaves
    /// that side open. `progress` is invoked once per fetched page with
    /// the page count and the number of records collected so far.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::AuthenticationFailed`](crate::ErrorKind::AuthenticationFailed)
    /// on a 401 and otherwise propagates transport and decoding errors.
    /// Entries without a timestamp or slug are skipped with a warning,
    /// not treated as failures.
    pub async fn scrape_all(
        &mut self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<Vec<ThreadRecord>> {
        let mut url = self.client.base_url().join(LIST_ENDPOINT)?;
        url.query_pairs_mut()
            .append_pair("version", API_VERSION)
            .append_pair("source", "default");

        let mut records = Vec::new();
        let mut offset = 0usize;
        let mut pages = 0usize;

        loop {
            let body = json!({
                "limit": PAGE_SIZE,
                "ascending": false,
                "offset": offset,
                "search_term": "",
            });
            let response = self.client.post_json(url.clone(), &body).await?;
            let entries: Vec<ThreadListEntry> = serde_json::from_value(response)?;

            pages += 1;
            debug!("thread listing page {pages}: {} entries", entries.len());
            if entries.is_empty() {
                progress(pages, records.len());
                break;
            }

            let has_next_page = entries[0].has_next_page;
            offset += entries.len();

            for entry in entries {
                if let Some(record) = self.to_record(entry, from, to)? {
                    records.push(record);
                }
            }
            progress(pages, records.len());

            if !has_next_page {
                break;
            }
            if let Some(limiter) = &mut self.limiter {
                let waited = limiter.acquire().await;
                if !waited.is_zero() {
                    debug!("rate limiter delayed next page by {waited:?}");
                }
            }
        }

        Ok(records)
    }

    /// Convert one listing entry, applying the date filter. `Ok(None)`
    /// means the entry is skipped.
    fn to_record(
        &self,
        entry: ThreadListEntry,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Option<ThreadRecord>> {
        let Some(slug) = entry.slug else {
            warn!("skipping thread entry without a slug: {:?}", entry.title);
            return Ok(None);
        };

        // The service reports naive local-less timestamps; treat them
        // as UTC.
        let created_at = match entry
            .last_query_datetime
            .as_deref()
            .and_then(|ts| ts.parse::<NaiveDateTime>().ok())
        {
            Some(naive) => naive.and_utc(),
            None => {
                warn!("skipping thread entry without a timestamp: {:?}", entry.title);
                return Ok(None);
            }
        };

        let date = created_at.date_naive();
        if from.is_some_and(|from| date < from) || to.is_some_and(|to| date > to) {
            return Ok(None);
        }

        let url = self.client.base_url().join(&format!("/search/{slug}"))?;
        Ok(Some(ThreadRecord {
            title: entry.title,
            url: url.to_string(),
            created_at,
        }))
    }
}
