//! Recently-replied cache — bounds replies to one per sender per horizon.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

/// Hours before the whole set resets. Fixed, not configurable.
const CACHE_HORIZON_HOURS: i64 = 24;

/// Addresses replied to since the last clear.
///
/// Expiry is whole-set only: once the horizon elapses the set is replaced
/// with a fresh empty one, so suppression for an individual sender lasts
/// anywhere between zero and the full horizon depending on when it was
/// recorded. Every member was added by a confirmed send since the last clear.
#[derive(Debug)]
pub struct RepliedCache {
    addresses: HashSet<String>,
    last_cleared: DateTime<Utc>,
}

impl RepliedCache {
    /// Empty cache with the clear clock starting at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            addresses: HashSet::new(),
            last_cleared: now,
        }
    }

    /// Whether this sender was replied to since the last clear.
    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    /// Record a confirmed send. Call only after the transport reported
    /// success — a failed send must leave the sender eligible for retry.
    pub fn record(&mut self, address: &str) {
        self.addresses.insert(address.to_lowercase());
    }

    /// Reset the whole set once the horizon has elapsed since the last
    /// clear. Returns true when a clear happened so the caller can log it.
    pub fn clear_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        if now - self.last_cleared <= Duration::hours(CACHE_HORIZON_HOURS) {
            return false;
        }
        self.addresses = HashSet::new();
        self.last_cleared = now;
        true
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}
