//! Token-bucket rate limiting for outbound API requests.
//!
//! The service enforces an account-level request quota; this module
//! spreads bursts of requests over time instead of tripping it. A
//! bucket of `capacity` tokens refills continuously over `period`;
//! every [`RateLimiter::acquire`] call consumes one token, sleeping
//! until one has been earned when the bucket is empty.
//!
//! A limiter is owned by a single task: `acquire` takes `&mut self`,
//! so unsynchronized sharing across tasks is rejected at compile time.
//! Tasks that genuinely need to share one limiter must wrap it in a
//! [`tokio::sync::Mutex`].

use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::{ErrorKind, Result};

/// Token bucket-based rate limiter for API requests.
///
/// Allows `capacity` requests per `period`, with automatic waiting to
/// spread requests over time.
///
/// ```no_run
/// use std::time::Duration;
/// use plexi_lib::RateLimiter;
///
/// # async fn example() -> plexi_lib::Result<()> {
/// // Allow 20 requests per 60 seconds
/// let mut limiter = RateLimiter::new(20, Duration::from_secs(60))?;
///
/// // Before each request, acquire a token (waits if necessary)
/// let waited = limiter.acquire().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum number of tokens (requests allowed per period)
    capacity: u32,
    /// Time over which `capacity` tokens regenerate
    period: Duration,
    /// Currently available tokens
    tokens: f64,
    /// Clock reading of the last refill computation
    last_refill: Instant,
    /// Number of `acquire` calls so far
    total_requests: u64,
    /// Total time spent sleeping in `acquire`
    total_wait_time: Duration,
}

/// Point-in-time snapshot of a [`RateLimiter`], for logging and
/// backpressure measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterStats {
    /// Configured request limit per period
    pub capacity: u32,
    /// Configured time period
    pub period: Duration,
    /// Total `acquire` calls made
    pub total_requests: u64,
    /// Total time spent waiting
    pub total_wait_time: Duration,
    /// Average wait per request (zero if no requests were made yet)
    pub average_wait: Duration,
    /// Current token bucket fill level
    pub current_tokens: f64,
}

impl RateLimiter {
    /// Create a rate limiter allowing `capacity` requests per `period`.
    ///
    /// The bucket starts full, so the first `capacity` requests pass
    /// without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidRateLimit`] if `capacity` is zero or
    /// `period` is zero.
    pub fn new(capacity: u32, period: Duration) -> Result<Self> {
        if capacity < 1 {
            return Err(ErrorKind::InvalidRateLimit(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if period.is_zero() {
            return Err(ErrorKind::InvalidRateLimit(
                "period must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            period,
            tokens: f64::from(capacity),
            last_refill: Instant::now(),
            total_requests: 0,
            total_wait_time: Duration::ZERO,
        })
    }

    /// Acquire one token, waiting if none is available.
    ///
    /// Tokens earned since the last call are credited first, at a rate
    /// of `capacity / period` tokens per second and never beyond
    /// `capacity` (excess elapsed time is not banked). If a full token
    /// is available it is consumed immediately; otherwise the task
    /// sleeps until the deficit is earned, then the bucket is reset to
    /// empty.
    ///
    /// Returns the time slept, purely informational: zero when a token
    /// was free, the backpressure delay otherwise.
    pub async fn acquire(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.last_refill;

        // Refill rate: capacity / period tokens per second
        let refill_rate = f64::from(self.capacity) / self.period.as_secs_f64();
        let earned = elapsed.as_secs_f64() * refill_rate;
        self.tokens = (self.tokens + earned).min(f64::from(self.capacity));
        self.last_refill = now;

        let waited = if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Duration::ZERO
        } else {
            // Time to earn the missing fraction of a token
            let deficit = 1.0 - self.tokens;
            let wait = Duration::from_secs_f64(deficit / refill_rate);
            sleep(wait).await;

            // The sleep consumed exactly the deficit; the token earned
            // during it is spent right away.
            self.tokens = 0.0;
            self.last_refill = Instant::now();
            wait
        };

        self.total_requests += 1;
        self.total_wait_time += waited;
        waited
    }

    /// Get a snapshot of the limiter state and its cumulative wait
    /// statistics. Pure read, no side effect.
    #[must_use]
    pub fn stats(&self) -> RateLimiterStats {
        let average_wait = if self.total_requests == 0 {
            Duration::ZERO
        } else {
            #[allow(clippy::cast_possible_truncation)]
            {
                self.total_wait_time / self.total_requests as u32
            }
        };
        RateLimiterStats {
            capacity: self.capacity,
            period: self.period,
            total_requests: self.total_requests,
            total_wait_time: self.total_wait_time,
            average_wait,
            current_tokens: self.tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_rejects_zero_capacity() {
        let result = RateLimiter::new(0, Duration::from_secs(1));
        assert!(matches!(result, Err(ErrorKind::InvalidRateLimit(_))));
    }

    #[test]
    fn test_rejects_zero_period() {
        let result = RateLimiter::new(1, Duration::ZERO);
        assert!(matches!(result, Err(ErrorKind::InvalidRateLimit(_))));
    }

    // With a paused clock, no time passes between calls, so the bucket
    // drains exactly one token per call.
    #[tokio::test(start_paused = true)]
    async fn test_tokens_drain_monotonically() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(60)).unwrap();
        for k in 1..=5u32 {
            let waited = limiter.acquire().await;
            assert_eq!(waited, Duration::ZERO);
            assert!((limiter.stats().current_tokens - f64::from(5 - k)).abs() < EPSILON);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_never_exceeds_capacity() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(1)).unwrap();
        limiter.acquire().await;
        limiter.acquire().await;

        // Wait far longer than the bucket needs to refill completely.
        tokio::time::advance(Duration::from_secs(3600)).await;

        let waited = limiter.acquire().await;
        assert_eq!(waited, Duration::ZERO);
        // Refilled to capacity (2), then one token consumed.
        assert!((limiter.stats().current_tokens - 1.0).abs() < EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_acquire_waits_one_period() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(1)).unwrap();

        let first = limiter.acquire().await;
        assert_eq!(first, Duration::ZERO);

        let before = Instant::now();
        let second = limiter.acquire().await;
        let elapsed = Instant::now() - before;

        assert!(second > Duration::ZERO);
        assert!(elapsed >= second);
        assert!((second.as_secs_f64() - 1.0).abs() < 1e-6);
    }

    // 20 requests per 60 seconds: one token regenerates every 3 seconds,
    // so the 21st rapid call waits roughly that long.
    #[tokio::test(start_paused = true)]
    async fn test_burst_then_single_token_wait() {
        let mut limiter = RateLimiter::new(20, Duration::from_secs(60)).unwrap();
        for _ in 0..20 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        let waited = limiter.acquire().await;
        assert!((waited.as_secs_f64() - 3.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_accumulate() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(1)).unwrap();
        assert_eq!(limiter.stats().average_wait, Duration::ZERO);

        limiter.acquire().await;
        let waited = limiter.acquire().await;

        let stats = limiter.stats();
        assert_eq!(stats.capacity, 1);
        assert_eq!(stats.period, Duration::from_secs(1));
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.total_wait_time, waited);
        assert_eq!(stats.average_wait, waited / 2);
    }
}
