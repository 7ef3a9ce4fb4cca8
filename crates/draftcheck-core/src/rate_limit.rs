//! Request budget for the remote API
//!
//! A fixed number of grants per rolling window, plus a manual trip that shuts
//! the budget for a cooldown when the API itself reports a rate limit.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(60_000);
pub const DEFAULT_MAX_REQUESTS_PER_WINDOW: u32 = 3;
pub const DEFAULT_TRIP_COOLDOWN: Duration = Duration::from_millis(60_000);

/// One limiter is shared by every surface in the process.
pub type SharedRateLimiter = Arc<Mutex<RateLimiter>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
    pub trip_cooldown: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_requests: DEFAULT_MAX_REQUESTS_PER_WINDOW,
            trip_cooldown: DEFAULT_TRIP_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimiterState {
    /// `None` until the first grant
    pub window_start: Option<Instant>,
    pub count_in_window: u32,
    pub tripped: bool,
    pub trip_expiry: Option<Instant>,
}

#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: RateLimiterState,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: RateLimiterState::default(),
        }
    }

    pub fn shared(config: RateLimitConfig) -> SharedRateLimiter {
        Arc::new(Mutex::new(Self::new(config)))
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn state(&self) -> &RateLimiterState {
        &self.state
    }

    /// Ask for one remote call. Grants count against the current window;
    /// denials do not.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.state.tripped {
            if self.trip_active(now) {
                return false;
            }
            self.clear_trip(now);
        }

        if self.window_expired(now) {
            self.state.window_start = Some(now);
            self.state.count_in_window = 0;
        }

        if self.state.count_in_window >= self.config.max_requests {
            return false;
        }

        self.state.count_in_window += 1;
        true
    }

    /// Shut the budget for the configured cooldown.
    pub fn trip(&mut self, now: Instant) {
        self.trip_for(now, self.config.trip_cooldown);
    }

    pub fn trip_for(&mut self, now: Instant, cooldown: Duration) {
        tracing::info!(cooldown_ms = cooldown.as_millis() as u64, "rate limiter tripped");
        self.state.tripped = true;
        self.state.trip_expiry = Some(now + cooldown);
    }

    /// Whether a call made right now would be refused. Does not consume budget
    /// and does not clear an expired trip.
    pub fn is_limited(&self, now: Instant) -> bool {
        if self.state.tripped && self.trip_active(now) {
            return true;
        }
        !self.window_expired(now) && self.state.count_in_window >= self.config.max_requests
    }

    pub fn is_tripped(&self, now: Instant) -> bool {
        self.state.tripped && self.trip_active(now)
    }

    /// Forget all usage and any active trip.
    pub fn reset(&mut self) {
        self.state = RateLimiterState::default();
    }

    fn trip_active(&self, now: Instant) -> bool {
        self.state.trip_expiry.is_some_and(|expiry| now < expiry)
    }

    fn clear_trip(&mut self, now: Instant) {
        tracing::info!("rate limit cooldown over; remote requests resumed");
        self.state = RateLimiterState {
            window_start: Some(now),
            count_in_window: 0,
            tripped: false,
            trip_expiry: None,
        };
    }

    fn window_expired(&self, now: Instant) -> bool {
        match self.state.window_start {
            None => true,
            Some(start) => now.saturating_duration_since(start) >= self.config.window,
        }
    }
}
