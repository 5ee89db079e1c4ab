//! Request-rate governor
//!
//! Enforces a minimum inter-request interval per logical channel (primary
//! fetch vs. detail enrichment). Built on the governor crate with a quota
//! of one permit per `60 / requests_per_minute` seconds, so the time
//! between any two consecutive permitted requests on a channel is at least
//! that period, even under concurrent callers.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Per-channel request pacer
///
/// Cheap to clone; clones share the same underlying state, so every caller
/// on a channel observes the same spacing.
#[derive(Clone)]
pub struct RateGovernor {
    limiter: Option<Arc<DirectLimiter>>,
    period: Duration,
}

impl RateGovernor {
    /// Create a governor allowing `requests_per_minute` requests.
    ///
    /// `None` or a non-positive rate disables pacing entirely.
    pub fn per_minute(requests_per_minute: Option<u32>) -> Self {
        let period = match requests_per_minute {
            Some(rpm) if rpm > 0 => Duration::from_secs_f64(60.0 / f64::from(rpm)),
            _ => Duration::ZERO,
        };

        let limiter = Quota::with_period(period)
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        Self { limiter, period }
    }

    /// Create an unlimited governor (every `wait()` is a no-op)
    pub fn unlimited() -> Self {
        Self {
            limiter: None,
            period: Duration::ZERO,
        }
    }

    /// Suspend until at least one period has elapsed since the last
    /// permitted request on this channel. No-op when unlimited.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Whether this channel enforces a rate at all
    pub fn is_limited(&self) -> bool {
        self.limiter.is_some()
    }

    /// The minimum spacing between permitted requests
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl std::fmt::Debug for RateGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGovernor")
            .field("period", &self.period)
            .finish()
    }
}
