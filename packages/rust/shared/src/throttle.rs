//! Request-rate ceilings for external APIs.
//!
//! One [`Throttle`] exists per external API and is shared (via `Arc`) by every
//! worker that calls it, so the ceiling holds for the whole run.

use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::debug;

/// Token-bucket limiter for one external API.
pub struct Throttle {
    name: &'static str,
    limiter: DefaultDirectRateLimiter,
}

impl Throttle {
    /// Allow `requests_per_minute` calls per minute, bursting up to the same
    /// amount. Zero is treated as one.
    pub fn per_minute(name: &'static str, requests_per_minute: u32) -> Self {
        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            name,
            limiter: RateLimiter::direct(Quota::per_minute(rpm)),
        }
    }

    /// Take one token without waiting. Returns `false` when the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Wait until a call is permitted.
    pub async fn acquire(&self) {
        if self.try_acquire() {
            return;
        }
        debug!(api = self.name, "rate limit reached, waiting");
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle").field("name", &self.name).finish()
    }
}
