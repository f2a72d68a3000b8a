//! The interfaces this crate consumes but does not define: certificate wire
//! encoding/decoding, the cryptographic signature operations themselves, and
//! the network face used to fetch missing certificates. An embedder wires
//! its own implementations of these traits into the [`validator`](crate::validator)
//! and [`planner`](crate::planner) state machines; this crate only ever
//! calls them.

use async_trait::async_trait;

use crate::error::Result;
use crate::name::Name;

/// The handful of signature algorithms the schema language can reason
/// about. Anything else is rejected before it reaches `sig-req` checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureType {
    DigestSha256,
    Sha256WithRsa,
    Sha256WithEcdsa,
}

/// A name-valued key locator, the only kind this schema language resolves
/// signer identity against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLocator(pub Name);

/// The signature metadata the validator and the rule checker need to
/// resolve a rule and a signer — not the signature's own bytes, which
/// [`Signable::signature_value`] carries separately.
#[derive(Debug, Clone)]
pub struct SignatureInfo {
    pub sig_type: SignatureType,
    pub key_locator: Option<KeyLocator>,
}

/// Anything with a name and a signature: what the validator checks. A
/// [`Certificate`] is one, since validating a fetched certificate before
/// trusting its public key means running it through the same check as any
/// other signed packet.
pub trait Signable {
    fn name(&self) -> &Name;
    fn signature(&self) -> &SignatureInfo;

    /// The raw signature bytes, handed unopened to a [`Verifier`] alongside
    /// the packet's own encoded bytes.
    fn signature_value(&self) -> &[u8];
}

/// A certificate as the schema engine needs to see it: just enough to
/// check a trust anchor's or cache entry's identity and validity window,
/// and — since a fetched certificate is itself validated before its public
/// key is trusted — its own name, signature, and wire bytes. Its wire
/// format is entirely an external concern; this crate only ever passes
/// `wire_bytes()` through to a [`Verifier`] unopened.
pub trait Certificate: Signable + Send + Sync {
    /// `name().prefix(1)`, cached by implementors that derive it once.
    fn key_name(&self) -> Name {
        self.name().prefix(1)
    }

    fn not_before(&self) -> chrono::DateTime<chrono::Utc>;
    fn not_after(&self) -> chrono::DateTime<chrono::Utc>;

    fn is_too_early(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now < self.not_before()
    }
    fn is_too_late(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now > self.not_after()
    }

    /// Opaque public-key material, handed to the embedder's verifier
    /// alongside the packet and its signature.
    fn public_key_info(&self) -> &[u8];

    /// The certificate's own encoded bytes, handed to a [`Verifier`] to
    /// check the signature over it while validating the chain above this
    /// certificate.
    fn wire_bytes(&self) -> &[u8];
}

/// The cryptographic half of validation, supplied by the embedder.
pub trait Verifier: Send + Sync {
    fn verify_digest(&self, packet_bytes: &[u8], signature_value: &[u8]) -> bool;
    fn verify_public_key(
        &self,
        packet_bytes: &[u8],
        signature_value: &[u8],
        public_key_info: &[u8],
        sig_type: SignatureType,
    ) -> bool;
}

/// Fetches a certificate named by a key locator, e.g. by sending an
/// Interest for it. The validator calls this only when the anchor
/// container and certificate cache both miss.
#[async_trait]
pub trait Face: Send + Sync {
    async fn fetch_certificate(&self, name: &Name) -> Result<std::sync::Arc<dyn Certificate>>;
}

/// How a trust anchor's certificate bytes get from disk or from a schema
/// document's inline blob into a [`Certificate`]. Reading the file and
/// decoding the wire format are both outside this crate's scope; [`doc`](crate::doc)
/// only resolves the path and hands it (or the decoded base64 bytes) here.
pub trait CertificateLoader: Send + Sync {
    fn load_from_file(&self, path: &std::path::Path) -> Result<std::sync::Arc<dyn Certificate>>;
    fn load_from_base64(&self, blob: &str) -> Result<std::sync::Arc<dyn Certificate>>;
}

/// The signing half the planner hands materialized identities to: generate
/// a key pair, then issue and sign a certificate for it, then (at the top
/// of the chain) sign the original packet.
#[async_trait]
pub trait KeyGenerator: Send + Sync {
    /// Creates a new key pair under `identity`, of the algorithm implied by
    /// `sig_type`, and returns its key name.
    async fn generate_key_pair(
        &self,
        identity: &Name,
        is_ksk: bool,
        sig_type: SignatureType,
        key_size: usize,
    ) -> Result<Name>;

    /// Builds, signs (with the key named `signer_cert_name`), and records as
    /// its identity's default certificate, a certificate for `key_name`
    /// issued by `signer_identity`. Returned already signed: unlike the
    /// outer packet a caller holds directly, a certificate is shared
    /// immediately afterward (cached, installed as a trust anchor, handed
    /// back up the chain as the next link's signer), so this crate never
    /// needs mutable access to one.
    #[allow(clippy::too_many_arguments)]
    async fn issue_certificate(
        &self,
        key_name: &Name,
        signer_identity: &Name,
        signer_cert_name: &Name,
        not_before: chrono::DateTime<chrono::Utc>,
        not_after: chrono::DateTime<chrono::Utc>,
    ) -> Result<std::sync::Arc<dyn Certificate>>;

    /// Signs `target` (the original Data or Interest being planned for)
    /// using the key named `signer_cert_name`.
    async fn sign_as(&self, target: &mut dyn Signable, signer_cert_name: &Name) -> Result<()>;
}
