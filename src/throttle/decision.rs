//! The outcome of a throttle check and its response-header rendering.

use chrono::{DateTime, SecondsFormat, Utc};

/// Header carrying the configured per-window quota.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Header carrying the quota left in the current window.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Header carrying the ISO-8601 instant the window resets.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";

/// Result of admitting (or refusing) one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub admitted: bool,
    /// The configured maximum requests per window
    pub limit: u64,
    /// `max(0, limit - count)`
    pub remaining: u64,
    /// When the client's window resets
    pub reset_at: DateTime<Utc>,
}

impl Decision {
    /// Whole seconds until the window resets, rounded up and never negative.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds();
        if millis <= 0 {
            return 0;
        }
        // millis is positive here
        (millis as u64).div_ceil(1000)
    }

    /// The reset instant formatted for the `X-RateLimit-Reset` header.
    pub fn reset_header_value(&self) -> String {
        self.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// The three quota headers, in a fixed order.
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, self.reset_header_value()),
        ]
    }
}
