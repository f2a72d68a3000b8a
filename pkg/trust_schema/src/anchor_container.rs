//! A small multi-index collection of [`TrustAnchor`]s: lookup by id,
//! lookup by key-name hash, and (for refresh purposes) a sweep over every
//! anchor due for reload.
//!
//! The upstream container keeps a third index ordered by `lastRefresh` so
//! its refresh sweep can stop at the first not-yet-due entry. With the
//! anchor counts a schema realistically holds (tens, not millions) a full
//! O(n) sweep every `refresh_due` call is simpler and behaviorally
//! identical, so that ordered index isn't reproduced here.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::anchor::TrustAnchor;
use crate::external::CertificateLoader;
use crate::hash::name_hash;

#[derive(Default)]
pub struct AnchorContainer {
    anchors: Vec<TrustAnchor>,
    by_id: HashMap<String, usize>,
    by_key_hash: HashMap<u64, usize>,
}

impl AnchorContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, anchor: TrustAnchor) {
        let idx = self.anchors.len();
        self.by_id.insert(anchor.id.clone(), idx);
        self.by_key_hash.insert(name_hash(&anchor.key_name().wire_encode()), idx);
        self.anchors.push(anchor);
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&TrustAnchor> {
        self.by_id.get(id).map(|&i| &self.anchors[i])
    }

    pub fn find_by_key_name(&self, key_name: &crate::name::Name) -> Option<&TrustAnchor> {
        let idx = *self.by_key_hash.get(&name_hash(&key_name.wire_encode()))?;
        let anchor = &self.anchors[idx];
        // The hash index alone can't rule out a collision; confirm the
        // actual key name matches before returning it.
        if &anchor.key_name() == key_name {
            Some(anchor)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrustAnchor> {
        self.anchors.iter()
    }

    /// Rereads every anchor whose refresh period has elapsed, using
    /// `loader` to reload its backing file. Called lazily from inside
    /// signature checking rather than on a timer.
    pub fn refresh_due(&mut self, loader: &dyn CertificateLoader, now: DateTime<Utc>) {
        for anchor in &mut self.anchors {
            if anchor.is_due_for_refresh(now) {
                let path = anchor.refresh.as_ref().map(|s| s.path.clone());
                if let Some(path) = path {
                    if let Ok(cert) = loader.load_from_file(&path) {
                        anchor.apply_refresh(cert, now);
                    }
                }
            }
        }
        // The key-name hash index must be rebuilt since a refreshed
        // anchor's certificate (and so its key name) may have changed.
        self.by_key_hash.clear();
        for (idx, anchor) in self.anchors.iter().enumerate() {
            self.by_key_hash.insert(name_hash(&anchor.key_name().wire_encode()), idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::Certificate;
    use crate::name::Name;
    use chrono::Duration;
    use std::sync::Arc;

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
    fn finds_by_id_and_key_name() {
        let mut c = AnchorContainer::new();
        let cert = Arc::new(FakeCert(Name::parse("/ndn/KEY/1")));
        c.insert(TrustAnchor::new_static("root", cert));

        assert!(c.find_by_id("root").is_some());
        assert!(c.find_by_id("missing").is_none());
        assert!(c.find_by_key_name(&Name::parse("/ndn/KEY")).is_some());
        assert!(c.find_by_key_name(&Name::parse("/other/KEY")).is_none());
    }
}
