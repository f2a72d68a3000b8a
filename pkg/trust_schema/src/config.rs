//! Tunables for the [`validator`](crate::validator), mirroring
//! `ValidatorSchema`'s constructor defaults.

use chrono::Duration;

/// Knobs for [`validator::Validator`](crate::validator::Validator). The
/// `Default` impl reproduces `ValidatorSchema`'s own constructor defaults.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// How many certificate-fetch hops a single validation may take before
    /// giving up.
    pub step_limit: usize,

    /// How many distinct signing keys' timestamps to remember at once.
    pub max_tracked_keys: usize,

    /// Slack allowed around "now" for the very first Interest seen from a
    /// key, before any timestamp has been recorded for it.
    pub grace_interval: Duration,

    /// How long a key's last-seen timestamp is kept before it is evicted
    /// as stale, independent of the `max_tracked_keys` cap.
    pub key_timestamp_ttl: Duration,

    /// How long a fetched (non-anchor) certificate stays in the
    /// validator's cache before it must be refetched and reverified.
    pub cache_ttl: Duration,

    /// Applied to a `refresh "0s"` (or any unit with a zero count) in a
    /// dynamic trust anchor declaration.
    pub default_refresh_period: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            step_limit: 10,
            max_tracked_keys: 1000,
            grace_interval: Duration::milliseconds(3000),
            key_timestamp_ttl: Duration::hours(1),
            cache_ttl: Duration::hours(1),
            default_refresh_period: Duration::seconds(3600),
        }
    }
}
