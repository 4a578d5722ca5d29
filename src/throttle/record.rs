//! Per-client counting record for a single window.

use chrono::{DateTime, TimeDelta, Utc};

/// Requests observed from one client in its current window.
///
/// A record always represents at least one request: it starts at a count of
/// one for the request that opened the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRecord {
    /// Requests counted in this window, rejected ones included
    count: u64,
    /// When this window ends and the next request opens a fresh one
    window_reset_at: DateTime<Utc>,
}

impl ThrottleRecord {
    /// Open a window at `now` for the request that triggered it.
    pub fn start(now: DateTime<Utc>, window: TimeDelta) -> Self {
        Self {
            count: 1,
            window_reset_at: now
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Whether the window has ended at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.window_reset_at <= now
    }

    /// Count one more request in the current window and return the new count.
    pub fn hit(&mut self) -> u64 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Get the current count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Get the instant the window resets.
    pub fn window_reset_at(&self) -> DateTime<Utc> {
        self.window_reset_at
    }

    /// Quota left under `limit`, never below zero.
    pub fn remaining(&self, limit: u64) -> u64 {
        limit.saturating_sub(self.count)
    }
}
