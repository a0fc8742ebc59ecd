//! Per-sender transfer rate limiting
//!
//! Fixed-window counter: each sender gets `limit` transfers per `window`,
//! counted from the first attempt in the window. A limit of zero disables
//! the check.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::warn;

use crate::types::{AccountId, TransferError};

/// Transfers allowed per window by default
pub const DEFAULT_LIMIT: u32 = 5;

/// Default window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Thread-safe fixed-window limiter keyed by sender
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<AccountId, Window>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: DashMap::new(),
        }
    }

    /// Limiter that never rejects
    pub fn disabled() -> Self {
        Self::new(0, DEFAULT_WINDOW)
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Count one attempt by `sender` and reject it if over the limit
    pub fn check(&self, sender: AccountId) -> Result<(), TransferError> {
        self.check_at(sender, Instant::now())
    }

    /// [`RateLimiter::check`] as of `now`
    pub fn check_at(&self, sender: AccountId, now: Instant) -> Result<(), TransferError> {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut entry = self.windows.entry(sender).or_insert(Window {
            started: now,
            count: 0,
        });
        let window = entry.value_mut();
        if now.saturating_duration_since(window.started) >= self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        if window.count >= self.limit {
            warn!(sender, limit = self.limit, "transfer rate limit exceeded");
            return Err(TransferError::RateLimited {
                account: sender,
                limit: self.limit,
                window_secs: self.window.as_secs(),
            });
        }
        window.count += 1;
        Ok(())
    }
}
