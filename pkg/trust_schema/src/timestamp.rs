//! Replay-timestamp tracking for signed Interests: each signing key's most
//! recently accepted timestamp is remembered so that a repeated or
//! out-of-order timestamp from the same key is rejected.
//!
//! The validator consults this twice per Interest, not once: [`TimestampTracker::record`]
//! runs *before* the signature is cryptographically verified — this is
//! where the actual grace-interval/monotonicity decision happens and the
//! new timestamp is committed — and [`TimestampTracker::confirm`] runs
//! again as the continuation of a successful verification, re-checking the
//! value it just committed. The second call is a deliberate no-op in the
//! common case; it exists so that the check and the verification stay
//! expressed as two steps of the same state machine rather than the
//! timestamp being trusted purely because `record` once said so.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, SchemaError};
use crate::name::Name;

struct Entry {
    timestamp: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
}

pub struct TimestampTracker {
    last_seen: HashMap<Name, Entry>,
    max_tracked_keys: usize,
    key_timestamp_ttl: Duration,
    grace_interval: Duration,
}

impl TimestampTracker {
    pub fn new(max_tracked_keys: usize, key_timestamp_ttl: Duration, grace_interval: Duration) -> Self {
        Self { last_seen: HashMap::new(), max_tracked_keys, key_timestamp_ttl, grace_interval }
    }

    /// Checks `timestamp` against this key's last accepted one (or, if
    /// there isn't one yet, against the grace interval around `now`), and
    /// commits it if acceptable.
    pub fn record(&mut self, key_name: &Name, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        match self.last_seen.get(key_name) {
            Some(entry) if timestamp <= entry.timestamp => {
                return Err(SchemaError::Replay(format!(
                    "timestamp for '{}' did not advance past the last accepted one",
                    key_name
                )));
            }
            None => {
                let delta = (now - timestamp).num_milliseconds().abs();
                if delta > self.grace_interval.num_milliseconds() {
                    return Err(SchemaError::Replay(format!(
                        "first timestamp seen for '{}' is outside the grace interval",
                        key_name
                    )));
                }
            }
            _ => {}
        }

        self.last_seen.insert(key_name.clone(), Entry { timestamp, recorded_at: now });
        self.evict_expired(now);
        self.evict_over_capacity();
        Ok(())
    }

    /// Re-checks that `timestamp` is still this key's recorded value.
    /// Fails only if something evicted the entry (TTL or capacity)
    /// between the `record` call and this one.
    pub fn confirm(&self, key_name: &Name, timestamp: DateTime<Utc>) -> Result<()> {
        match self.last_seen.get(key_name) {
            Some(entry) if entry.timestamp == timestamp => Ok(()),
            _ => Err(SchemaError::Replay(format!(
                "timestamp record for '{}' was evicted before it could be confirmed",
                key_name
            ))),
        }
    }

    fn evict_expired(&mut self, now: DateTime<Utc>) {
        self.last_seen.retain(|_, entry| now - entry.recorded_at < self.key_timestamp_ttl);
    }

    /// Evicts the least-recently-recorded entries until the tracker is
    /// back within `max_tracked_keys`. Computed fresh over whatever
    /// survived TTL eviction, so the entry chosen as "oldest" can never be
    /// one that TTL eviction already removed in this same pass.
    fn evict_over_capacity(&mut self) {
        while self.last_seen.len() > self.max_tracked_keys {
            let oldest = self
                .last_seen
                .iter()
                .min_by_key(|(_, entry)| entry.recorded_at)
                .map(|(name, _)| name.clone());
            match oldest {
                Some(name) => {
                    self.last_seen.remove(&name);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> TimestampTracker {
        TimestampTracker::new(2, Duration::hours(1), Duration::milliseconds(3000))
    }

    #[test]
    fn first_timestamp_must_be_within_grace_interval() {
        let mut t = tracker();
        let now = Utc::now();
        assert!(t.record(&Name::parse("/a/KEY"), now, now).is_ok());

        let mut t2 = tracker();
        assert!(t2
            .record(&Name::parse("/a/KEY"), now - Duration::seconds(30), now)
            .is_err());
    }

    #[test]
    fn rejects_non_advancing_timestamp() {
        let mut t = tracker();
        let now = Utc::now();
        let key = Name::parse("/a/KEY");
        t.record(&key, now, now).unwrap();
        assert!(t.record(&key, now, now).is_err());
        assert!(t.record(&key, now - Duration::seconds(1), now).is_err());
        assert!(t.record(&key, now + Duration::seconds(1), now).is_ok());
    }

    #[test]
    fn confirm_sees_the_just_recorded_value() {
        let mut t = tracker();
        let now = Utc::now();
        let key = Name::parse("/a/KEY");
        t.record(&key, now, now).unwrap();
        assert!(t.confirm(&key, now).is_ok());
    }

    #[test]
    fn over_capacity_evicts_the_oldest_recording() {
        let mut t = tracker();
        let now = Utc::now();
        t.record(&Name::parse("/a/KEY"), now, now).unwrap();
        t.record(&Name::parse("/b/KEY"), now, now + Duration::seconds(1)).unwrap();
        t.record(&Name::parse("/c/KEY"), now, now + Duration::seconds(2)).unwrap();

        assert_eq!(t.len(), 2);
        assert!(t.confirm(&Name::parse("/a/KEY"), now).is_err());
        assert!(t.confirm(&Name::parse("/c/KEY"), now).is_ok());
    }
}
