//! Per-host token-bucket rate limiting.
//!
//! One bucket per hostname, created lazily on first contact. A single
//! [`HostLimiter`] is shared by every fetcher and by enrichment, so all
//! traffic to a given host draws from the same budget regardless of which
//! part of the pipeline sends it.

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use url::Url;

use crate::config::RateLimitConfig;

pub struct HostLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl HostLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        // Config validation rejects zeroes, this is just the type's proof.
        let rps = NonZeroU32::new(config.per_host_rps).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(burst);
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Wait until a request to `host` is allowed.
    pub async fn acquire(&self, host: &str) {
        self.limiter.until_key_ready(&host.to_string()).await;
    }

    /// Wait for the host of `url`; URLs without a host pass through.
    pub async fn acquire_url(&self, url: &Url) {
        if let Some(host) = url.host_str() {
            self.acquire(host).await;
        }
    }
}
