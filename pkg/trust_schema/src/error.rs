//! Error kinds surfaced by the schema engine (see the error handling design).

use std::fmt;

use failure::Fail;

/// Top level classification of everything that can go wrong while loading a
/// schema, validating a packet, or planning a signature.
#[derive(Fail, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Schema document syntax error: unknown section, missing key, bad time
    /// unit, bad numeric field, wrong key ordering.
    Parse(String),

    /// A trust-anchor certificate file was unreadable, its base64 was
    /// undecodable, or the certificate itself was malformed.
    Load(String),

    /// No rule in the schema matched the packet (or the only chain that
    /// matched was dead).
    NoRule,

    /// A rule matched but no signer in its alternation reaches an anchor.
    NoChain,

    /// The signature's type or key size violates the loaded `sig-req`.
    PolicyRejected(String),

    /// Cryptographic verification failed, or the key-locator name could not
    /// be decoded.
    BadSignature(String),

    /// An Interest's embedded timestamp fell outside the replay window.
    Replay(String),

    /// Certificate-fetch recursion exceeded the configured step limit.
    MaxSteps,

    /// Wire-level decoding of a packet field failed.
    Decode(String),

    /// `Pattern::expand` was given a back-reference index with no matching
    /// capture group.
    ExpandRange(usize),

    /// `Pattern::infer` was given examples that don't agree with the
    /// pattern's arity or with each other.
    InferMismatch(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "schema parse error: {}", msg),
            Self::Load(msg) => write!(f, "schema load error: {}", msg),
            Self::NoRule => write!(f, "no rule matched this name"),
            Self::NoChain => write!(f, "no signer chain reaches a trust anchor"),
            Self::PolicyRejected(msg) => write!(f, "signature policy rejected: {}", msg),
            Self::BadSignature(msg) => write!(f, "signature verification failed: {}", msg),
            Self::Replay(msg) => write!(f, "replayed or out-of-window timestamp: {}", msg),
            Self::MaxSteps => write!(f, "certificate chain exceeded the step limit"),
            Self::Decode(msg) => write!(f, "packet decode error: {}", msg),
            Self::ExpandRange(k) => write!(f, "expand template referenced unknown group ${}", k),
            Self::InferMismatch(msg) => write!(f, "pattern inference mismatch: {}", msg),
        }
    }
}

impl std::error::Error for SchemaError {}

pub type Result<T> = std::result::Result<T, SchemaError>;
