//! # Request Rate Ceiling
//!
//! A token bucket shared by every network operation in the process. One
//! instance is built by the application and handed to each component that
//! touches the network, so a single ceiling governs pings, fallback connects
//! and port probes alike.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

const TOKEN_EPSILON: f64 = 1e-9;

/// Thread-safe token bucket.
///
/// When a caller finds the bucket short it computes the deficit, releases the
/// lock, sleeps, then re-locks and re-evaluates against whatever rate is
/// current at that moment. The lock is never held across the sleep, so waiting
/// callers do not block each other, but ordering among them is only
/// approximately first-come-first-served.
///
/// A missing, zero or negative rate turns the limiter into a pass-through that
/// still counts requests.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    limit: Option<Limit>,
    tokens: f64,
    last_refill: Instant,
    total_requests: u64,
    throttled_requests: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Limit {
    rate: f64,
    capacity: f64,
}

impl Limit {
    fn new(rate: Option<f64>, burst: Option<f64>) -> Option<Self> {
        let rate = rate.filter(|r| r.is_finite() && *r > 0.0)?;
        let capacity = burst
            .filter(|b| b.is_finite() && *b > 0.0)
            .unwrap_or(rate * 2.0);
        Some(Self { rate, capacity })
    }
}

impl Bucket {
    fn new(limit: Option<Limit>) -> Self {
        Self {
            limit,
            tokens: limit.map_or(0.0, |l| l.capacity),
            last_refill: Instant::now(),
            total_requests: 0,
            throttled_requests: 0,
        }
    }

    fn refill(&mut self, now: Instant) {
        if let Some(limit) = self.limit {
            let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
            self.tokens = (self.tokens + elapsed * limit.rate).min(limit.capacity);
        }
        self.last_refill = now;
    }

    /// Debits `need` tokens if they are available; otherwise returns the
    /// time until they will be.
    fn debit(&mut self, need: f64, limit: Limit) -> Result<(), Duration> {
        if self.tokens + TOKEN_EPSILON >= need {
            self.tokens = (self.tokens - need).max(0.0);
            Ok(())
        } else {
            Err(Duration::from_secs_f64((need - self.tokens) / limit.rate))
        }
    }
}

/// Point-in-time view of the limiter for renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimiterStats {
    pub rate: Option<f64>,
    pub burst: Option<f64>,
    pub tokens_remaining: Option<f64>,
    pub total_requests: u64,
    pub throttled_requests: u64,
    pub throttle_percent: f64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl RateLimiter {
    /// `burst` defaults to twice the rate.
    pub fn new(rate: Option<f64>, burst: Option<f64>) -> Self {
        Self {
            bucket: Mutex::new(Bucket::new(Limit::new(rate, burst))),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None, None)
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until `n` tokens are available and takes them.
    ///
    /// Returns the time spent sleeping. Requests larger than the bucket's
    /// capacity are satisfied by a full bucket.
    pub async fn acquire(&self, n: u32) -> Duration {
        let mut waited = Duration::ZERO;
        let mut first_attempt = true;

        loop {
            let wait = {
                let mut bucket = self.lock();
                if first_attempt {
                    bucket.total_requests += u64::from(n);
                }
                bucket.refill(Instant::now());

                let Some(limit) = bucket.limit else {
                    return waited;
                };
                let need = f64::from(n).min(limit.capacity);
                match bucket.debit(need, limit) {
                    Ok(()) => return waited,
                    Err(wait) => {
                        if first_attempt {
                            bucket.throttled_requests += u64::from(n);
                        }
                        wait
                    }
                }
            };

            first_attempt = false;
            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    /// Takes `n` tokens if they are available right now.
    pub fn try_acquire(&self, n: u32) -> bool {
        let mut bucket = self.lock();
        bucket.total_requests += u64::from(n);
        bucket.refill(Instant::now());

        let Some(limit) = bucket.limit else {
            return true;
        };
        let need = f64::from(n).min(limit.capacity);
        match bucket.debit(need, limit) {
            Ok(()) => true,
            Err(_) => {
                bucket.throttled_requests += u64::from(n);
                false
            }
        }
    }

    /// Replaces rate and capacity and refills the bucket to the new capacity.
    ///
    /// Callers currently sleeping inside [`RateLimiter::acquire`] pick up the
    /// new settings when they wake.
    pub fn set_rate(&self, rate: Option<f64>, burst: Option<f64>) {
        let mut bucket = self.lock();
        let limit = Limit::new(rate, burst);
        bucket.limit = limit;
        bucket.tokens = limit.map_or(0.0, |l| l.capacity);
        bucket.last_refill = Instant::now();
    }

    pub fn stats(&self) -> RateLimiterStats {
        let mut bucket = self.lock();
        bucket.refill(Instant::now());

        let throttle_percent = if bucket.total_requests > 0 {
            bucket.throttled_requests as f64 / bucket.total_requests as f64 * 100.0
        } else {
            0.0
        };

        RateLimiterStats {
            rate: bucket.limit.map(|l| l.rate),
            burst: bucket.limit.map(|l| l.capacity),
            tokens_remaining: bucket.limit.map(|_| bucket.tokens),
            total_requests: bucket.total_requests,
            throttled_requests: bucket.throttled_requests,
            throttle_percent,
        }
    }

    pub fn reset_stats(&self) {
        let mut bucket = self.lock();
        bucket.total_requests = 0;
        bucket.throttled_requests = 0;
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
