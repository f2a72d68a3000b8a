//! The `sig-req` section of a schema document: the minimum signature
//! strength every rule (data and Interest alike) is held to, independent of
//! which rule or signer matched.

use crate::external::SignatureType;

/// One signing algorithm name as it appears in a `sig-req` document's
/// `signing` field, e.g. the `rsa` in `signing "rsa|ecdsa"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    Rsa,
    Ecdsa,
}

/// Minimum RSA modulus size, in bytes, a security-level bound requires.
/// Indexed by matching `key_size_bits` against the lower bound of its
/// bracket; ECDSA is never checked against a key-size bound, and
/// `DigestSha256` never reaches this table at all.
const RSA_KEY_SIZE_TABLE: &[(u32, usize)] = &[(256, 1920), (192, 960), (128, 384), (112, 256)];

/// The signature policy a schema document's `sig-req` section loads. Every
/// signature the validator checks, and every key the planner generates, is
/// held to this regardless of which rule matched.
///
/// `signing` is a set rather than a single flag: the document grammar's
/// `signing` field is a pipe-separated subset of `{rsa, ecdsa}` (e.g.
/// `signing "rsa"` alone permits RSA but not ECDSA), so RSA and ECDSA
/// acceptance are tracked independently instead of behind one combined
/// boolean.
#[derive(Debug, Clone)]
pub struct SignatureRequirement {
    hash_ok: bool,
    rsa_ok: bool,
    ecdsa_ok: bool,
    min_rsa_key_size_bytes: Option<usize>,
}

impl SignatureRequirement {
    /// Builds a requirement from a `sig-req` section's fields, parsed
    /// strictly in the order `hash`, `signing`, `key-size` (matching the
    /// document grammar's field ordering). `algorithms` is the `signing`
    /// field's parsed pipe-separated set.
    pub fn new(hash_allowed: bool, algorithms: &[SigningAlgorithm], security_level_bits: Option<u32>) -> Self {
        let min_rsa_key_size_bytes = security_level_bits.map(|bits| {
            RSA_KEY_SIZE_TABLE
                .iter()
                .find(|(floor, _)| bits >= *floor)
                .map(|(_, bytes)| *bytes)
                .unwrap_or(1920)
        });
        Self {
            hash_ok: hash_allowed,
            rsa_ok: algorithms.contains(&SigningAlgorithm::Rsa),
            ecdsa_ok: algorithms.contains(&SigningAlgorithm::Ecdsa),
            min_rsa_key_size_bytes,
        }
    }

    /// `true` if `sig_type` is allowed at all by this requirement, and (for
    /// `Sha256WithRsa`) `value_len` meets the configured key-size floor.
    /// ECDSA signatures are never checked against the key-size floor;
    /// digest signatures bypass this check's remaining conditions entirely.
    pub fn check(&self, sig_type: SignatureType, value_len: usize) -> bool {
        match sig_type {
            SignatureType::DigestSha256 => self.hash_ok,
            SignatureType::Sha256WithEcdsa => self.ecdsa_ok,
            SignatureType::Sha256WithRsa => self.rsa_ok && self.check_rsa_key_size(value_len),
        }
    }

    fn check_rsa_key_size(&self, value_len: usize) -> bool {
        match self.min_rsa_key_size_bytes {
            Some(min) => value_len >= min,
            None => true,
        }
    }

    /// Whether this requirement permits RSA signing.
    pub fn rsa_allowed(&self) -> bool {
        self.rsa_ok
    }

    /// Whether this requirement permits ECDSA signing.
    pub fn ecdsa_allowed(&self) -> bool {
        self.ecdsa_ok
    }

    /// The RSA modulus floor, in bytes, this requirement was built with.
    pub fn min_rsa_key_size_bytes(&self) -> Option<usize> {
        self.min_rsa_key_size_bytes
    }
}

impl Default for SignatureRequirement {
    /// No `sig-req` section at all: hash, RSA, and ECDSA signatures are
    /// all allowed, with no key-size floor.
    fn default() -> Self {
        Self { hash_ok: true, rsa_ok: true, ecdsa_ok: true, min_rsa_key_size_bytes: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_only_rejects_rsa_and_ecdsa() {
        let req = SignatureRequirement::new(true, &[], None);
        assert!(req.check(SignatureType::DigestSha256, 0));
        assert!(!req.check(SignatureType::Sha256WithRsa, 4096));
        assert!(!req.check(SignatureType::Sha256WithEcdsa, 64));
    }

    #[test]
    fn rsa_key_size_floor_by_security_level() {
        let req = SignatureRequirement::new(false, &[SigningAlgorithm::Rsa], Some(128));
        assert!(req.check(SignatureType::Sha256WithRsa, 384));
        assert!(!req.check(SignatureType::Sha256WithRsa, 383));
    }

    #[test]
    fn ecdsa_ignores_key_size_floor() {
        let req = SignatureRequirement::new(false, &[SigningAlgorithm::Ecdsa], Some(256));
        assert!(req.check(SignatureType::Sha256WithEcdsa, 1));
    }

    #[test]
    fn unbracketed_security_level_falls_back_to_the_highest_floor() {
        let req = SignatureRequirement::new(false, &[SigningAlgorithm::Rsa], Some(1024));
        assert!(req.check(SignatureType::Sha256WithRsa, 1920));
        assert!(!req.check(SignatureType::Sha256WithRsa, 1919));
    }

    #[test]
    fn default_allows_everything_unconditionally() {
        let req = SignatureRequirement::default();
        assert!(req.check(SignatureType::Sha256WithRsa, 1));
        assert!(req.check(SignatureType::DigestSha256, 0));
    }

    #[test]
    fn rsa_only_policy_rejects_ecdsa() {
        let req = SignatureRequirement::new(true, &[SigningAlgorithm::Rsa], None);
        assert!(req.check(SignatureType::Sha256WithRsa, 1));
        assert!(!req.check(SignatureType::Sha256WithEcdsa, 1));
    }

    #[test]
    fn ecdsa_only_policy_rejects_rsa() {
        let req = SignatureRequirement::new(true, &[SigningAlgorithm::Ecdsa], None);
        assert!(!req.check(SignatureType::Sha256WithRsa, 4096));
        assert!(req.check(SignatureType::Sha256WithEcdsa, 1));
    }
}
