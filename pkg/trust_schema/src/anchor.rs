//! Trust anchors: certificates the schema treats as axiomatically valid,
//! either loaded once from a file/base64 blob (static) or periodically
//! refetched from disk on a schedule (dynamic).
//!
//! An anchor names one concrete identity, not a family of them, so it
//! carries no pattern of its own — a signer reference that resolves to an
//! anchor is satisfied by exact equality against the anchor's key name,
//! never by a pattern match (see [`crate::schema`]).

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::external::Certificate;
use crate::name::Name;

/// A dynamic anchor's refresh schedule: how often to reread its backing
/// file, and when that last happened.
#[derive(Debug, Clone)]
pub struct RefreshSchedule {
    pub period: chrono::Duration,
    pub last_refresh: DateTime<Utc>,
    /// The resolved (already-absolute) path to reread on refresh.
    pub path: PathBuf,
}

/// One trust anchor: an id used by signer references and the certificate
/// itself.
pub struct TrustAnchor {
    pub id: String,
    pub cert: Arc<dyn Certificate>,
    /// `Some` for a dynamic (file-backed, periodically reread) anchor;
    /// `None` for a static anchor loaded once from a base64 blob or a file
    /// with no `refresh` clause.
    pub refresh: Option<RefreshSchedule>,
}

impl std::fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustAnchor")
            .field("id", &self.id)
            .field("key_name", &self.cert.key_name())
            .field("refresh", &self.refresh.is_some())
            .finish()
    }
}

impl TrustAnchor {
    pub fn new_static(id: impl Into<String>, cert: Arc<dyn Certificate>) -> Self {
        Self { id: id.into(), cert, refresh: None }
    }

    pub fn new_dynamic(
        id: impl Into<String>,
        cert: Arc<dyn Certificate>,
        period: chrono::Duration,
        now: DateTime<Utc>,
        path: PathBuf,
    ) -> Self {
        Self { id: id.into(), cert, refresh: Some(RefreshSchedule { period, last_refresh: now, path }) }
    }

    pub fn key_name(&self) -> Name {
        self.cert.key_name()
    }

    /// Whether this anchor is due to be reread, given the current time.
    /// Always `false` for a static anchor.
    pub fn is_due_for_refresh(&self, now: DateTime<Utc>) -> bool {
        match &self.refresh {
            Some(sched) => now >= sched.last_refresh + sched.period,
            None => false,
        }
    }

    /// Installs a freshly reloaded certificate and resets the refresh
    /// clock. Called by the schema's `refresh_anchors` sweep.
    pub fn apply_refresh(&mut self, cert: Arc<dyn Certificate>, now: DateTime<Utc>) {
        self.cert = cert;
        if let Some(sched) = &mut self.refresh {
            sched.last_refresh = now;
        }
    }
}
