//! Core throttle implementation.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::decision::Decision;
use super::key::ClientKey;
use super::record::ThrottleRecord;
use crate::config::ThrottleConfig;
use crate::error::Result;

/// Fixed-window request throttle keyed by client.
///
/// The throttle exclusively owns its record store. It is thread-safe and is
/// meant to be shared behind an `Arc` between the middleware and the janitor.
pub struct Throttle {
    /// Window and quota settings
    config: ThrottleConfig,
    /// Window length, precomputed for timestamp arithmetic
    window: TimeDelta,
    /// One record per tracked client
    records: DashMap<ClientKey, ThrottleRecord>,
}

impl Throttle {
    /// Create a throttle with an empty record store.
    pub fn new(config: ThrottleConfig) -> Result<Self> {
        config.validate()?;

        // validate() bounds the window to i64 milliseconds
        let window = TimeDelta::milliseconds(config.window_duration_ms as i64);

        Ok(Self {
            config,
            window,
            records: DashMap::new(),
        })
    }

    /// Count a request from `key` arriving at `now` and decide whether to admit it.
    ///
    /// A request at or after the stored reset instant opens a fresh window.
    /// Rejected requests still count, so a client that keeps retrying stays
    /// over its quota until the window ends.
    pub fn admit(&self, key: &ClientKey, now: DateTime<Utc>) -> Decision {
        // The entry guard holds the shard lock across the whole read-modify-write.
        let record = match self.records.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.is_expired(now) {
                    *record = ThrottleRecord::start(now, self.window);
                    debug!(key = %key, reset_at = %record.window_reset_at(), "Starting new throttle window");
                } else {
                    record.hit();
                }
                *record
            }
            Entry::Vacant(vacant) => {
                let record = ThrottleRecord::start(now, self.window);
                debug!(key = %key, reset_at = %record.window_reset_at(), "Tracking new client");
                *vacant.insert(record)
            }
        };

        let decision = self.decide(&record);

        trace!(
            key = %key,
            count = record.count(),
            remaining = decision.remaining,
            admitted = decision.admitted,
            "Throttle check"
        );

        if !decision.admitted {
            debug!(
                key = %key,
                count = record.count(),
                limit = self.config.max_requests_per_window,
                "Throttle limit exceeded"
            );
        }

        decision
    }

    /// Report the current decision state for `key` without counting a request.
    ///
    /// Returns `None` when the key is untracked or its window has ended.
    pub fn peek(&self, key: &str, now: DateTime<Utc>) -> Option<Decision> {
        let record = *self.records.get(key)?;
        if record.is_expired(now) {
            return None;
        }
        Some(self.decide(&record))
    }

    /// Remove every record whose window has ended at `now`.
    ///
    /// Returns how many records were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let keep = !record.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Get the number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.records.len()
    }

    /// Drop all records.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Get the throttle configuration.
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    fn decide(&self, record: &ThrottleRecord) -> Decision {
        let limit = self.config.max_requests_per_window;
        Decision {
            admitted: record.count() <= limit,
            limit,
            remaining: record.remaining(limit),
            reset_at: record.window_reset_at(),
        }
    }
}
