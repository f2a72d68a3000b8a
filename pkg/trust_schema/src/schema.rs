//! The schema interpreter: holds the loaded rules and trust anchors, and
//! answers "does this signer name satisfy this rule?" for both data and
//! Interest names. Crypto verification and certificate-chain recursion are
//! the validator's job (see [`crate::validator`]); this module only ever
//! reasons about names and patterns.

use chrono::{DateTime, Utc};

use crate::anchor_container::AnchorContainer;
use crate::doc::SchemaDocument;
use crate::error::{Result, SchemaError};
use crate::external::CertificateLoader;
use crate::name::Name;
use crate::pattern::Pattern;
use crate::rule::{BackRef, Rule, Signer};
use crate::sig_req::SignatureRequirement;

pub(crate) enum SignerTarget<'a> {
    DataRule(&'a Rule),
    Anchor(&'a crate::anchor::TrustAnchor),
}

/// The loaded trust schema: data and Interest rules, static and dynamic
/// trust anchors, and an optional signature-strength floor.
#[derive(Default)]
pub struct Schema {
    data_rules: Vec<Rule>,
    interest_rules: Vec<Rule>,
    static_anchors: AnchorContainer,
    dynamic_anchors: AnchorContainer,
    sig_req: Option<SignatureRequirement>,
    bypass: bool,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all currently loaded state with `doc`'s, mirroring the
    /// interpreter's own reset-then-load sequencing: a schema is always
    /// loaded wholesale, never merged into what came before.
    pub fn load(&mut self, doc: SchemaDocument) {
        self.reset();
        self.data_rules = doc.data_rules;
        self.interest_rules = doc.interest_rules;
        for anchor in doc.static_anchors {
            self.static_anchors.insert(anchor);
        }
        for anchor in doc.dynamic_anchors {
            self.dynamic_anchors.insert(anchor);
        }
        self.sig_req = doc.sig_req;
        self.bypass = doc.bypass;
    }

    pub fn reset(&mut self) {
        self.data_rules.clear();
        self.interest_rules.clear();
        self.static_anchors = AnchorContainer::new();
        self.dynamic_anchors = AnchorContainer::new();
        self.sig_req = None;
        self.bypass = false;
    }

    pub fn is_empty(&self) -> bool {
        self.data_rules.is_empty()
            && self.interest_rules.is_empty()
            && self.static_anchors.is_empty()
            && self.dynamic_anchors.is_empty()
    }

    pub fn sig_req(&self) -> SignatureRequirement {
        self.sig_req.clone().unwrap_or_default()
    }

    /// Whether an `any true` section disabled rule/signer checking for
    /// this schema session entirely.
    pub fn bypass(&self) -> bool {
        self.bypass
    }

    /// Rereads every dynamic anchor past its refresh period. Called lazily
    /// from inside signature checking, not on a background timer.
    pub fn refresh_anchors(&mut self, loader: &dyn CertificateLoader, now: DateTime<Utc>) {
        self.dynamic_anchors.refresh_due(loader, now);
    }

    /// Whether `key_locator_name` satisfies a rule covering `data_name`.
    /// `Err(NoRule)` if no rule's pattern matches the data name at all;
    /// `Err(NoChain)` if one or more rules matched but none of their
    /// signer alternatives accept `key_locator_name`.
    pub fn check_data_rule(&self, data_name: &Name, key_locator_name: &Name) -> Result<()> {
        self.check_rule_set(&self.data_rules, data_name, key_locator_name)
    }

    /// As [`Schema::check_data_rule`], for the Interest rule set.
    pub fn check_interest_rule(&self, interest_name: &Name, key_locator_name: &Name) -> Result<()> {
        self.check_rule_set(&self.interest_rules, interest_name, key_locator_name)
    }

    fn check_rule_set(&self, rules: &[Rule], name: &Name, key_locator_name: &Name) -> Result<()> {
        let mut any_rule_matched = false;
        for rule in rules {
            if !rule.pattern.is_match(name) {
                continue;
            }
            any_rule_matched = true;
            for signer in &rule.signers {
                if self.check_signer(signer, &rule.pattern, key_locator_name)? {
                    return Ok(());
                }
            }
        }
        if any_rule_matched {
            Err(SchemaError::NoChain)
        } else {
            Err(SchemaError::NoRule)
        }
    }

    fn check_signer(&self, signer: &Signer, caller_pattern: &Pattern, key_locator_name: &Name) -> Result<bool> {
        let target = match self.resolve_signer_id(&signer.id) {
            Some(t) => t,
            None => return Ok(false),
        };

        match target {
            SignerTarget::Anchor(anchor) => Ok(&anchor.key_name() == key_locator_name),
            SignerTarget::DataRule(target_rule) => {
                // Rather than match `key_locator_name` against
                // `target_rule.pattern` directly — an independent
                // backtracking match that can diverge from the derived
                // pattern whenever the target has an ambiguous split — bind
                // the caller's groups through the signer's back-references
                // first, derive the concrete pattern they imply, and match
                // against that.
                let derived = match derive_signer_pattern(target_rule, signer, caller_pattern) {
                    Ok(d) => d,
                    Err(_) => return Ok(false),
                };
                let derived_pattern = Pattern::compile(&derived)?;
                Ok(derived_pattern.is_match(key_locator_name))
            }
        }
    }

    /// Resolution precedence for a signer id: another data rule by id,
    /// then a static anchor by id, then a dynamic anchor by id. The first
    /// match wins.
    pub(crate) fn resolve_signer_id(&self, id: &str) -> Option<SignerTarget<'_>> {
        if let Some(rule) = self.data_rules.iter().find(|r| r.id == id) {
            return Some(SignerTarget::DataRule(rule));
        }
        if let Some(anchor) = self.static_anchors.find_by_id(id) {
            return Some(SignerTarget::Anchor(anchor));
        }
        if let Some(anchor) = self.dynamic_anchors.find_by_id(id) {
            return Some(SignerTarget::Anchor(anchor));
        }
        None
    }

    /// Looks up a loaded trust anchor's certificate by its key name,
    /// checking static anchors before dynamic ones.
    pub fn find_anchor_certificate(
        &self,
        key_name: &Name,
    ) -> Option<std::sync::Arc<dyn crate::external::Certificate>> {
        self.static_anchors
            .find_by_key_name(key_name)
            .or_else(|| self.dynamic_anchors.find_by_key_name(key_name))
            .map(|a| a.cert.clone())
    }
}

/// Derives `target_rule`'s own certificate-name pattern as seen through
/// `signer`'s back-references against `caller_pattern`'s current binding:
/// every resolvable group is substituted with the literal name it resolves
/// to, via the same `infer`/`derive_pattern` pair the rest of the
/// interpreter uses to go from bound examples to a pattern. Shared between
/// [`Schema::check_signer`] and the planner, which both need to match a
/// key-locator name against this derived pattern rather than against
/// `target_rule.pattern` directly.
pub(crate) fn derive_signer_pattern(target_rule: &Rule, signer: &Signer, caller_pattern: &Pattern) -> Result<String> {
    let group_count = target_rule.pattern.group_count();
    if group_count == 0 {
        return Ok(target_rule.pattern.source().to_string());
    }

    let mut examples = Vec::with_capacity(group_count);
    for i in 0..group_count {
        let resolved = match signer.back_refs.get(i) {
            Some(BackRef::Ref(k)) => k.checked_sub(1).and_then(|idx| caller_pattern.group(idx)),
            Some(BackRef::Literal(n)) => Some(n.clone()),
            Some(BackRef::Null) | None => None,
        };
        match resolved {
            Some(n) => examples.push(n),
            // A null (or missing) back-reference argument leaves this
            // group unconstrained, but `infer` requires every declared
            // group to resolve to a concrete example. Rather than invent
            // one, fall back to the rule's own pattern source unchanged —
            // its `<>`/`<>*` wildcards still get random-filled when the
            // planner derives an identity name from it, and still match
            // anything at all when used directly for a signer check.
            // TODO: infer only the resolvable groups and leave the rest as
            // wildcards, instead of abandoning inference for the whole
            // pattern the moment one group is unconstrained.
            None => return Ok(target_rule.pattern.source().to_string()),
        }
    }

    target_rule.pattern.infer(&examples)?;
    target_rule.pattern.derive_pattern()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::Certificate;
    use crate::rule::parse_signers;
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

    fn schema_with_anchor_signed_rule() -> Schema {
        let mut schema = Schema::new();
        let rule = Rule::new(
            "blog-post",
            Pattern::compile("<ndn><blog>(<author>)<>*").unwrap(),
            parse_signers("root()").unwrap(),
        );
        let mut doc = SchemaDocument::default();
        doc.data_rules.push(rule);
        doc.static_anchors.push(crate::anchor::TrustAnchor::new_static(
            "root",
            Arc::new(FakeCert(Name::parse("/ndn/KEY/rootkey"))),
        ));
        schema.load(doc);
        schema
    }

    #[test]
    fn data_rule_accepts_anchor_signed_name() {
        let schema = schema_with_anchor_signed_rule();
        assert!(schema
            .check_data_rule(&Name::parse("/ndn/blog/alice/post1"), &Name::parse("/ndn/KEY"))
            .is_ok());
    }

    #[test]
    fn data_rule_rejects_wrong_signer() {
        let schema = schema_with_anchor_signed_rule();
        let err = schema
            .check_data_rule(&Name::parse("/ndn/blog/alice/post1"), &Name::parse("/someone/else/KEY"))
            .unwrap_err();
        assert_eq!(err, SchemaError::NoChain);
    }

    #[test]
    fn unmatched_name_is_no_rule() {
        let schema = schema_with_anchor_signed_rule();
        let err = schema
            .check_data_rule(&Name::parse("/totally/unrelated"), &Name::parse("/ndn/KEY"))
            .unwrap_err();
        assert_eq!(err, SchemaError::NoRule);
    }

    #[test]
    fn signer_backref_must_match_callers_bound_group() {
        let mut schema = Schema::new();
        let mut doc = SchemaDocument::default();
        doc.data_rules.push(Rule::new(
            "post",
            Pattern::compile("<ndn><blog>(<author>)<>*").unwrap(),
            parse_signers("author-key($1)").unwrap(),
        ));
        doc.data_rules.push(Rule::new(
            "author-key",
            Pattern::compile("<ndn><blog>(<author>)<KEY><>").unwrap(),
            parse_signers("root()").unwrap(),
        ));
        doc.static_anchors.push(crate::anchor::TrustAnchor::new_static(
            "root",
            Arc::new(FakeCert(Name::parse("/ndn/KEY/rootkey"))),
        ));
        schema.load(doc);

        assert!(schema
            .check_data_rule(
                &Name::parse("/ndn/blog/alice/post1"),
                &Name::parse("/ndn/blog/alice/KEY/1")
            )
            .is_ok());
        assert_eq!(
            schema
                .check_data_rule(
                    &Name::parse("/ndn/blog/alice/post1"),
                    &Name::parse("/ndn/blog/bob/KEY/1")
                )
                .unwrap_err(),
            SchemaError::NoChain
        );
    }
}
