//! Fixed-window request limiting per client.
//!
//! Each client gets a [`RateWindow`] counting requests until its reset time.
//! Expired windows are purged lazily during later checks; there is no
//! background task.

use crate::config::RateLimitConfig;
use crate::error::ServerError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Request count for one client within the current window.
#[derive(Debug, Clone, Copy)]
pub struct RateWindow {
    pub count: u32,
    pub reset_at: Instant,
}

impl RateWindow {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_at
    }
}

struct RateLimiterState {
    windows: HashMap<String, RateWindow>,
    last_purge: Instant,
}

/// Per-client fixed-window rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<RateLimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RateLimiterState {
                windows: HashMap::new(),
                last_purge: Instant::now(),
            }),
        }
    }

    /// Count one request for `client_id`.
    ///
    /// Returns [`ServerError::RateLimited`] once the client has used up its
    /// window. Always succeeds when limiting is disabled.
    pub fn check(&self, client_id: &str) -> Result<(), ServerError> {
        if !self.config.enabled {
            return Ok(());
        }

        let now = Instant::now();
        let mut state = self.state.lock();

        if now.duration_since(state.last_purge) >= self.config.window {
            state.windows.retain(|_, window| !window.is_expired(now));
            state.last_purge = now;
        }

        let window = state
            .windows
            .entry(client_id.to_string())
            .or_insert(RateWindow {
                count: 0,
                reset_at: now + self.config.window,
            });

        if window.is_expired(now) {
            *window = RateWindow {
                count: 0,
                reset_at: now + self.config.window,
            };
        }

        if window.count >= self.config.max_requests {
            let retry_after = window.reset_at.saturating_duration_since(now);
            debug!("Rate limit hit for client '{}'", client_id);
            return Err(ServerError::RateLimited {
                retry_after_seconds: retry_after.as_secs().max(1),
            });
        }

        window.count += 1;
        Ok(())
    }
}
