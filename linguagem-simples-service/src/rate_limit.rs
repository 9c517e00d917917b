//! Per-client request rate limiting.
//!
//! A keyed governor limiter allows `rate_limit.requests_per_minute` requests
//! per client with the same burst. The limiter lives in an `ArcSwap` so a
//! settings change swaps in a freshly built one.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::HeaderMap;
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tracing::{debug, info};

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Client identity used when nothing better is known
pub const UNKNOWN_CLIENT: &str = "unknown";

struct LimiterState {
    requests_per_minute: u32,
    /// `None` when limiting is disabled
    limiter: Option<KeyedLimiter>,
}

impl LimiterState {
    fn new(requests_per_minute: u32) -> Self {
        let limiter = NonZeroU32::new(requests_per_minute)
            .map(|n| RateLimiter::keyed(Quota::per_minute(n)));
        Self {
            requests_per_minute,
            limiter,
        }
    }
}

pub struct ClientRateLimiter {
    state: ArcSwap<LimiterState>,
    clock: DefaultClock,
}

impl ClientRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            state: ArcSwap::from_pointee(LimiterState::new(requests_per_minute)),
            clock: DefaultClock::default(),
        }
    }

    /// Rebuild the limiter if the configured rate changed.
    ///
    /// Rebuilding forgets the history of every client.
    pub fn reconfigure(&self, requests_per_minute: u32) {
        if self.state.load().requests_per_minute == requests_per_minute {
            return;
        }
        info!(requests_per_minute, "Rate limit changed, rebuilding limiter");
        self.state
            .store(Arc::new(LimiterState::new(requests_per_minute)));
    }

    /// Admit one request for `client`, or return how long to wait.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        let state = self.state.load();
        let Some(limiter) = &state.limiter else {
            return Ok(());
        };

        limiter.check_key(&client.to_string()).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            debug!(client = %client, wait_ms = wait.as_millis() as u64, "Client rate limited");
            wait
        })
    }

    /// Drop state for clients that are back at full burst.
    pub fn retain_recent(&self) {
        let state = self.state.load();
        if let Some(limiter) = &state.limiter {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.state
            .load()
            .limiter
            .as_ref()
            .map(|limiter| limiter.len())
            .unwrap_or(0)
    }
}

/// Identify the client behind a request.
///
/// The first `X-Forwarded-For` entry wins when proxies are trusted, then the
/// socket peer address.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for
        && let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    {
        return forwarded.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Seconds to report in `Retry-After`, never zero.
pub fn retry_after_secs(wait: Duration) -> u64 {
    wait.as_secs_f64().ceil().max(1.0) as u64
}
