//! The async validator state machine: checks a signed packet's name and
//! signer against the loaded schema, then walks the signer's certificate
//! chain — anchor container first, cache second, network fetch last —
//! recursively re-validating any certificate it had to fetch, down to a
//! configured step limit.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cache::CertificateCache;
use crate::config::ValidatorConfig;
use crate::error::{Result, SchemaError};
use crate::external::{Certificate, CertificateLoader, Face, KeyLocator, Signable, SignatureInfo, SignatureType, Verifier};
use crate::name::Name;
use crate::schema::Schema;
use crate::timestamp::TimestampTracker;

#[derive(Clone, Copy)]
enum RuleKind {
    Data,
    Interest,
}

/// Ties a loaded [`Schema`] to the mutable state (certificate cache,
/// per-key timestamp tracker) a live validator accumulates while it runs.
pub struct Validator {
    schema: Schema,
    config: ValidatorConfig,
    /// `None` when constructed without a [`Face`] — nothing would ever be
    /// fetched to populate it, matching the upstream validator only
    /// standing up a cache when it has a face to fetch with.
    cache: Option<CertificateCache>,
    timestamps: TimestampTracker,
}

impl Validator {
    pub fn new(schema: Schema, config: ValidatorConfig, has_face: bool) -> Self {
        let cache = if has_face { Some(CertificateCache::new(config.cache_ttl)) } else { None };
        let timestamps =
            TimestampTracker::new(config.max_tracked_keys, config.key_timestamp_ttl, config.grace_interval);
        Self { schema, config, cache, timestamps }
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    /// Validates a Data packet: its name against the data-rule set, and
    /// its signer's certificate chain up to a trust anchor.
    pub async fn validate_data(
        &mut self,
        data: &dyn Signable,
        packet_bytes: &[u8],
        loader: &dyn CertificateLoader,
        verifier: &dyn Verifier,
        face: Option<&dyn Face>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.check_policy(
            data.name(),
            data.signature(),
            data.signature_value(),
            packet_bytes,
            RuleKind::Data,
            loader,
            verifier,
            face,
            now,
            0,
        )
        .await
    }

    /// Validates a signed Interest: its name against the Interest-rule
    /// set, its embedded timestamp against the replay window, and its
    /// signer's certificate chain.
    ///
    /// `timestamp` is decoded from the Interest name by the caller — this
    /// crate reasons about timestamps, not about where in a name they are
    /// encoded.
    pub async fn validate_interest(
        &mut self,
        interest: &dyn Signable,
        timestamp: DateTime<Utc>,
        packet_bytes: &[u8],
        loader: &dyn CertificateLoader,
        verifier: &dyn Verifier,
        face: Option<&dyn Face>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let key_name = key_locator_name(interest.signature())?;

        // First call: the actual grace-interval/monotonicity decision,
        // committed immediately so a concurrent validation of a second
        // Interest from the same key sees it.
        self.timestamps.record(&key_name, timestamp, now)?;

        self.check_policy(
            interest.name(),
            interest.signature(),
            interest.signature_value(),
            packet_bytes,
            RuleKind::Interest,
            loader,
            verifier,
            face,
            now,
            0,
        )
        .await?;

        // Second call: re-confirms the timestamp this validation started
        // with is still the one on record, now that the signature itself
        // has been cryptographically verified.
        self.timestamps.confirm(&key_name, timestamp)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn check_policy(
        &mut self,
        name: &Name,
        sig: &SignatureInfo,
        signature_value: &[u8],
        packet_bytes: &[u8],
        kind: RuleKind,
        loader: &dyn CertificateLoader,
        verifier: &dyn Verifier,
        face: Option<&dyn Face>,
        now: DateTime<Utc>,
        n_steps: usize,
    ) -> Result<()> {
        if self.schema.bypass() {
            return Ok(());
        }

        if !self.schema.sig_req().check(sig.sig_type, signature_value.len()) {
            return Err(SchemaError::PolicyRejected(format!("{:?} is not an accepted signature type", sig.sig_type)));
        }

        if sig.sig_type == SignatureType::DigestSha256 {
            return self.check_digest(name, signature_value, packet_bytes, kind, verifier);
        }

        let key_name = key_locator_name(sig)?;
        match kind {
            RuleKind::Data => self.schema.check_data_rule(name, &key_name)?,
            RuleKind::Interest => self.schema.check_interest_rule(name, &key_name)?,
        }

        let cert = self.get_certificate(&key_name, loader, verifier, face, now, n_steps).await?;

        if cert.is_too_early(now) || cert.is_too_late(now) {
            return Err(SchemaError::BadSignature(format!(
                "certificate for '{}' is outside its validity window",
                key_name
            )));
        }

        let ok = verifier.verify_public_key(packet_bytes, signature_value, cert.public_key_info(), sig.sig_type);
        if !ok {
            return Err(SchemaError::BadSignature(format!("signature over '{}' did not verify", name)));
        }
        Ok(())
    }

    fn check_digest(
        &self,
        name: &Name,
        signature_value: &[u8],
        packet_bytes: &[u8],
        kind: RuleKind,
        verifier: &dyn Verifier,
    ) -> Result<()> {
        // A digest signature carries no signer identity, so the rule
        // check is against the empty name rather than a key locator — a
        // rule that requires a digest signer still has to match the
        // packet's own name.
        let empty = Name::new();
        match kind {
            RuleKind::Data => self.schema.check_data_rule(name, &empty)?,
            RuleKind::Interest => self.schema.check_interest_rule(name, &empty)?,
        }
        if verifier.verify_digest(packet_bytes, signature_value) {
            Ok(())
        } else {
            Err(SchemaError::BadSignature("digest did not verify".to_string()))
        }
    }

    /// Resolves `key_name` to a verified certificate: the anchor
    /// containers first, the cache second, and only as a last resort (and
    /// only if a [`Face`] was supplied and the step limit hasn't been
    /// reached) a network fetch followed by recursively validating the
    /// fetched certificate itself.
    async fn get_certificate(
        &mut self,
        key_name: &Name,
        loader: &dyn CertificateLoader,
        verifier: &dyn Verifier,
        face: Option<&dyn Face>,
        now: DateTime<Utc>,
        n_steps: usize,
    ) -> Result<Arc<dyn Certificate>> {
        self.schema.refresh_anchors(loader, now);

        if let Some(cert) = self.schema.find_anchor_certificate(key_name) {
            return Ok(cert);
        }
        if let Some(cache) = &mut self.cache {
            if let Some(cert) = cache.get(key_name, now) {
                return Ok(cert);
            }
        }

        if n_steps >= self.config.step_limit {
            return Err(SchemaError::MaxSteps);
        }
        let face = face.ok_or(SchemaError::MaxSteps)?;
        let cert = face.fetch_certificate(key_name).await?;

        // Boxed because this closes a cycle back into `check_policy`, which
        // itself calls `get_certificate` — an unboxed `async fn` can't
        // describe its own recursive future type.
        Box::pin(self.check_policy(
            cert.name(),
            cert.signature(),
            cert.signature_value(),
            cert.wire_bytes(),
            RuleKind::Data,
            loader,
            verifier,
            Some(face),
            now,
            n_steps + 1,
        ))
        .await?;

        if let Some(cache) = &mut self.cache {
            cache.insert(cert.clone(), now);
        }
        Ok(cert)
    }
}

fn key_locator_name(sig: &SignatureInfo) -> Result<Name> {
    match &sig.key_locator {
        Some(KeyLocator(name)) => Ok(name.clone()),
        None => Err(SchemaError::BadSignature("signature has no key locator".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::TrustAnchor;
    use crate::doc::SchemaDocument;
    use crate::external::KeyLocator;
    use crate::rule::{parse_signers, Rule};
    use crate::pattern::Pattern;

    struct FakeCert {
        name: Name,
        sig: SignatureInfo,
    }
    impl Signable for FakeCert {
        fn name(&self) -> &Name {
            &self.name
        }
        fn signature(&self) -> &SignatureInfo {
            &self.sig
        }
        fn signature_value(&self) -> &[u8] {
            b"root-signature-value"
        }
    }
    impl Certificate for FakeCert {
        fn not_before(&self) -> DateTime<Utc> {
            Utc::now() - chrono::Duration::days(1)
        }
        fn not_after(&self) -> DateTime<Utc> {
            Utc::now() + chrono::Duration::days(1)
        }
        fn public_key_info(&self) -> &[u8] {
            b"root-public-key"
        }
        fn wire_bytes(&self) -> &[u8] {
            b"root-cert-bytes"
        }
    }

    struct AlwaysOkVerifier;
    impl Verifier for AlwaysOkVerifier {
        fn verify_digest(&self, _packet_bytes: &[u8], _signature_value: &[u8]) -> bool {
            true
        }
        fn verify_public_key(&self, _: &[u8], _: &[u8], _: &[u8], _: SignatureType) -> bool {
            true
        }
    }

    struct RejectingVerifier;
    impl Verifier for RejectingVerifier {
        fn verify_digest(&self, _: &[u8], _: &[u8]) -> bool {
            false
        }
        fn verify_public_key(&self, _: &[u8], _: &[u8], _: &[u8], _: SignatureType) -> bool {
            false
        }
    }

    struct NoopLoader;
    impl CertificateLoader for NoopLoader {
        fn load_from_file(&self, _path: &std::path::Path) -> Result<Arc<dyn Certificate>> {
            unimplemented!()
        }
        fn load_from_base64(&self, _blob: &str) -> Result<Arc<dyn Certificate>> {
            unimplemented!()
        }
    }

    fn validator_with_anchor_signed_rule() -> Validator {
        let mut schema = Schema::new();
        let mut doc = SchemaDocument::default();
        doc.data_rules.push(Rule::new(
            "blog-post",
            Pattern::compile("<ndn><blog><author><>*").unwrap(),
            parse_signers("root()").unwrap(),
        ));
        doc.static_anchors.push(TrustAnchor::new_static(
            "root",
            Arc::new(FakeCert {
                name: Name::parse("/ndn/KEY/rootkey"),
                sig: SignatureInfo { sig_type: SignatureType::DigestSha256, key_locator: None },
            }),
        ));
        schema.load(doc);
        Validator::new(schema, ValidatorConfig::default(), false)
    }

    fn data_with_key_locator(name: &str, locator: &str) -> (Name, SignatureInfo) {
        (
            Name::parse(name),
            SignatureInfo {
                sig_type: SignatureType::Sha256WithEcdsa,
                key_locator: Some(KeyLocator(Name::parse(locator))),
            },
        )
    }

    struct TestData {
        name: Name,
        sig: SignatureInfo,
    }
    impl Signable for TestData {
        fn name(&self) -> &Name {
            &self.name
        }
        fn signature(&self) -> &SignatureInfo {
            &self.sig
        }
        fn signature_value(&self) -> &[u8] {
            b"a-signature-value"
        }
    }

    #[async_std::test]
    async fn accepts_a_name_signed_by_a_trust_anchor() {
        let mut validator = validator_with_anchor_signed_rule();
        let (name, sig) = data_with_key_locator("/ndn/blog/alice/post1", "/ndn/KEY");
        let data = TestData { name, sig };

        let result = validator
            .validate_data(&data, b"packet-bytes", &NoopLoader, &AlwaysOkVerifier, None, Utc::now())
            .await;
        assert!(result.is_ok());
    }

    #[async_std::test]
    async fn rejects_when_crypto_verification_fails() {
        let mut validator = validator_with_anchor_signed_rule();
        let (name, sig) = data_with_key_locator("/ndn/blog/alice/post1", "/ndn/KEY");
        let data = TestData { name, sig };

        let result = validator
            .validate_data(&data, b"packet-bytes", &NoopLoader, &RejectingVerifier, None, Utc::now())
            .await;
        assert!(matches!(result, Err(SchemaError::BadSignature(_))));
    }

    #[async_std::test]
    async fn rejects_a_name_no_rule_covers() {
        let mut validator = validator_with_anchor_signed_rule();
        let (name, sig) = data_with_key_locator("/unrelated/name", "/ndn/KEY");
        let data = TestData { name, sig };

        let result = validator
            .validate_data(&data, b"packet-bytes", &NoopLoader, &AlwaysOkVerifier, None, Utc::now())
            .await;
        assert_eq!(result.unwrap_err(), SchemaError::NoRule);
    }

    #[async_std::test]
    async fn a_signer_that_does_not_match_the_anchor_is_no_chain() {
        let mut validator = validator_with_anchor_signed_rule();
        let (name, sig) = data_with_key_locator("/ndn/blog/alice/post1", "/not/the/anchor/KEY");
        let data = TestData { name, sig };

        let result = validator
            .validate_data(&data, b"packet-bytes", &NoopLoader, &AlwaysOkVerifier, None, Utc::now())
            .await;
        assert_eq!(result.unwrap_err(), SchemaError::NoChain);
    }

    #[async_std::test]
    async fn a_chain_reaching_past_the_anchor_container_without_a_face_hits_the_step_limit() {
        let mut schema = Schema::new();
        let mut doc = SchemaDocument::default();
        doc.data_rules.push(Rule::new(
            "blog-post",
            Pattern::compile("<ndn><blog><author><>*").unwrap(),
            parse_signers("blog-key()").unwrap(),
        ));
        doc.data_rules.push(Rule::new(
            "blog-key",
            Pattern::compile("<ndn><blog><KEY><>").unwrap(),
            parse_signers("root()").unwrap(),
        ));
        doc.static_anchors.push(TrustAnchor::new_static(
            "root",
            Arc::new(FakeCert {
                name: Name::parse("/ndn/KEY/rootkey"),
                sig: SignatureInfo { sig_type: SignatureType::DigestSha256, key_locator: None },
            }),
        ));
        schema.load(doc);
        let mut validator = Validator::new(schema, ValidatorConfig::default(), false);

        let (name, sig) = data_with_key_locator("/ndn/blog/alice/post1", "/ndn/blog/KEY/1");
        let data = TestData { name, sig };
        let result = validator
            .validate_data(&data, b"packet-bytes", &NoopLoader, &AlwaysOkVerifier, None, Utc::now())
            .await;
        assert_eq!(result.unwrap_err(), SchemaError::MaxSteps);
    }

    #[async_std::test]
    async fn an_any_true_schema_accepts_a_name_no_rule_covers() {
        let mut schema = Schema::new();
        let mut doc = SchemaDocument::default();
        doc.bypass = true;
        schema.load(doc);
        let mut validator = Validator::new(schema, ValidatorConfig::default(), false);

        let (name, sig) = data_with_key_locator("/totally/unrelated", "/nobody/KEY");
        let data = TestData { name, sig };
        let result = validator
            .validate_data(&data, b"packet-bytes", &NoopLoader, &RejectingVerifier, None, Utc::now())
            .await;
        assert!(result.is_ok());
    }
}
