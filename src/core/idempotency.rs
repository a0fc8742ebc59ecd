//! Idempotency reservations
//!
//! A transfer submitted with an idempotency token first reserves
//! `wallet:idempotency:<token>` here. The reservation is atomic: of two
//! concurrent submissions with the same token exactly one gets it. Entries
//! expire after their TTL, so a token can be reused once the window passes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::traits::DeduplicationStore;

/// Prefix of every reservation key
pub const KEY_PREFIX: &str = "wallet:idempotency:";

/// Default reservation lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Reservations between two sweeps of expired entries
pub const SWEEP_INTERVAL: usize = 256;

/// Storage key for a client token
pub fn reservation_key(token: &str) -> String {
    format!("{}{}", KEY_PREFIX, token)
}

/// In-process reservation store with per-key expiry
#[derive(Debug, Default)]
pub struct InMemoryDeduplicationStore {
    /// Key to expiry instant; `None` never expires
    entries: DashMap<String, Option<Instant>>,

    /// Reservations taken since the last sweep
    since_sweep: AtomicUsize,
}

fn is_live(expires: &Option<Instant>, now: Instant) -> bool {
    expires.map_or(true, |at| at > now)
}

impl InMemoryDeduplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `key` as of `now`
    ///
    /// An existing entry whose expiry is at or before `now` is replaced. A
    /// TTL too large to represent as an instant never expires. Every
    /// `SWEEP_INTERVAL` reservations the expired entries are dropped.
    pub fn reserve_at(&self, key: &str, ttl: Duration, now: Instant) -> bool {
        let expires = now.checked_add(ttl);
        let reserved = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                if is_live(slot.get(), now) {
                    false
                } else {
                    slot.insert(expires);
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(expires);
                true
            }
        };

        // the entry guard is gone here; retain locks every shard
        if reserved && self.since_sweep.fetch_add(1, Ordering::Relaxed) + 1 >= SWEEP_INTERVAL {
            self.since_sweep.store(0, Ordering::Relaxed);
            self.purge_expired(now);
        }
        reserved
    }

    /// Drop every entry expired as of `now`; returns how many were removed
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires| is_live(expires, now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "expired idempotency reservations purged");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DeduplicationStore for InMemoryDeduplicationStore {
    fn reserve(&self, key: &str, ttl: Duration) -> bool {
        self.reserve_at(key, ttl, Instant::now())
    }

    fn release(&self, key: &str) {
        self.entries.remove(key);
    }
}
