use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::analytics::Analytics;
use crate::config::{Config, SeedConfig};
use crate::storage::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub analytics: Analytics,
    /// `None` disables rate limiting.
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub seed: SeedConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, analytics: Analytics, config: &Config) -> Self {
        let rate_limiter = config.rate_limit.enabled.then(|| {
            Arc::new(RateLimiter::new(
                config.rate_limit.max_requests,
                config.rate_limit.window(),
            ))
        });
        Self {
            store,
            analytics,
            rate_limiter,
            seed: config.seed.clone(),
        }
    }
}

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory fixed-window rate limiter keyed by client IP.
pub struct RateLimiter {
    tracker: Mutex<IpTracker>,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    /// Ok if the request is allowed, otherwise the seconds until the window resets.
    pub async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;
        let now = Instant::now();

        // Drop idle clients so the map does not grow without bound.
        if tracker.len() > 10_000 {
            let window = self.window;
            tracker.retain(|_, (_, start)| now.duration_since(*start) < window);
        }

        let entry = tracker.entry(ip).or_insert((0, now));

        let elapsed = now.duration_since(entry.1);
        if elapsed >= self.window {
            entry.0 = 0;
            entry.1 = now;
        }

        entry.0 += 1;
        if entry.0 > self.max_requests {
            let remaining = self.window.saturating_sub(now.duration_since(entry.1));
            Err(remaining.as_secs().max(1))
        } else {
            Ok(())
        }
    }
}
