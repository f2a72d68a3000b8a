//! A certificate cache keyed by key name, used by the validator to avoid
//! refetching a certificate it has already retrieved and verified while
//! walking a chain up to a trust anchor.
//!
//! Expiry is checked lazily on lookup rather than swept by a background
//! task: an embedder drives the validator from its own event loop, and a
//! cache this small (bounded by how many distinct keys it has ever seen
//! signing traffic) doesn't need a scheduled sweep to stay small.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::external::Certificate;
use crate::name::Name;

struct Entry {
    cert: std::sync::Arc<dyn Certificate>,
    inserted_at: DateTime<Utc>,
}

pub struct CertificateCache {
    entries: HashMap<Name, Entry>,
    ttl: chrono::Duration,
}

impl CertificateCache {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self { entries: HashMap::new(), ttl }
    }

    pub fn insert(&mut self, cert: std::sync::Arc<dyn Certificate>, now: DateTime<Utc>) {
        self.entries.insert(cert.key_name(), Entry { cert, inserted_at: now });
    }

    /// Returns the cached certificate for `key_name`, evicting it first if
    /// its cache TTL (not its own `notAfter`, a distinct and also-checked
    /// property) has elapsed.
    pub fn get(&mut self, key_name: &Name, now: DateTime<Utc>) -> Option<std::sync::Arc<dyn Certificate>> {
        let expired = match self.entries.get(key_name) {
            Some(entry) => now - entry.inserted_at >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(key_name);
            return None;
        }
        self.entries.get(key_name).map(|e| e.cert.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct FakeCert(Name);
    impl crate::external::Signable for FakeCert {
        fn name(&self) -> &Name {
            &self.0
        }
        fn signature(&self) -> &crate::external::SignatureInfo {
            unimplemented!("not exercised by these tests")
        }
        fn signature_value(&self) -> &[u8] {
            b""
        }
    }
    impl Certificate for FakeCert {
        fn not_before(&self) -> DateTime<Utc> {
            Utc::now() - Duration::days(1)
        }
        fn not_after(&self) -> DateTime<Utc> {
            Utc::now() + Duration::days(1)
        }
        fn public_key_info(&self) -> &[u8] {
            b""
        }
        fn wire_bytes(&self) -> &[u8] {
            b""
        }
    }

    #[test]
    fn hits_before_ttl_and_misses_after() {
        let mut cache = CertificateCache::new(Duration::seconds(60));
        let now = Utc::now();
        let cert: std::sync::Arc<dyn Certificate> = std::sync::Arc::new(FakeCert(Name::parse("/a/KEY/1")));
        cache.insert(cert, now);

        assert!(cache.get(&Name::parse("/a/KEY"), now + Duration::seconds(30)).is_some());
        assert!(cache.get(&Name::parse("/a/KEY"), now + Duration::seconds(90)).is_none());
        assert!(cache.is_empty());
    }
}
