use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Spaces outgoing provider requests to stay under a request quota.
#[derive(Clone)]
pub struct RequestPacer {
    limiter: Arc<DirectRateLimiter>,
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer").finish_non_exhaustive()
    }
}

impl RequestPacer {
    /// Allows `quota_limit` requests per `quota_window`, with the full limit as burst.
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(
                quota_window,
                quota_limit,
            ))),
        }
    }

    /// Waits until the quota has room for one more request.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit).unwrap_or(NonZeroU32::MIN);
    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
