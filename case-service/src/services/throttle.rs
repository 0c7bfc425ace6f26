//! Brute-force login throttling.
//!
//! Ephemeral, in-process counters keyed by (normalized identity, origin
//! address). This is abuse mitigation, not a forensic record - the login
//! audit trail is persistent, this map is not, and losing it on restart
//! only resets throttling, never authorization. The trait seam exists so
//! a multi-instance deployment can swap in a shared keyed store.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Throttle state for one (identity, origin) pair.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleState {
    pub attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl ThrottleState {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.locked_until
            .map(|until| (until - now).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }
}

/// Failed-login counter store.
pub trait LoginThrottle: Send + Sync {
    /// Record a failed attempt; returns the resulting state.
    fn register_failure(&self, identity: &str, origin: &str, now: DateTime<Utc>) -> ThrottleState;

    /// Current state for a key; an elapsed lock reads as absent.
    fn check(&self, identity: &str, origin: &str, now: DateTime<Utc>) -> Option<ThrottleState>;

    /// Drop the key entirely (successful authentication).
    fn clear(&self, identity: &str, origin: &str);
}

/// Process-local implementation backed by a concurrent map.
pub struct InMemoryThrottle {
    entries: DashMap<(String, String), ThrottleState>,
    threshold: u32,
    lock_duration: Duration,
}

impl InMemoryThrottle {
    pub fn new(threshold: u32, lock_minutes: i64) -> Self {
        Self {
            entries: DashMap::new(),
            threshold: threshold.max(1),
            lock_duration: Duration::minutes(lock_minutes),
        }
    }

    fn key(identity: &str, origin: &str) -> (String, String) {
        (identity.to_string(), origin.to_string())
    }
}

impl LoginThrottle for InMemoryThrottle {
    fn register_failure(&self, identity: &str, origin: &str, now: DateTime<Utc>) -> ThrottleState {
        let mut entry = self
            .entries
            .entry(Self::key(identity, origin))
            .or_insert(ThrottleState {
                attempts: 0,
                locked_until: None,
            });

        // A previous lock that has elapsed starts a fresh count.
        if entry.locked_until.is_some_and(|until| until <= now) {
            entry.attempts = 0;
            entry.locked_until = None;
        }

        entry.attempts += 1;
        if entry.attempts >= self.threshold {
            entry.locked_until = Some(now + self.lock_duration);
        }
        *entry
    }

    fn check(&self, identity: &str, origin: &str, now: DateTime<Utc>) -> Option<ThrottleState> {
        let key = Self::key(identity, origin);
        let state = *self.entries.get(&key)?;

        // Lazy expiry: an elapsed lock is treated as absent.
        if state.locked_until.is_some_and(|until| until <= now) {
            self.entries.remove(&key);
            return None;
        }
        Some(state)
    }

    fn clear(&self, identity: &str, origin: &str) {
        self.entries.remove(&Self::key(identity, origin));
    }
}
