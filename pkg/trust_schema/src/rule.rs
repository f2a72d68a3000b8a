//! Data and Interest rules: a name pattern paired with an alternation of
//! signer references the name's signer name must satisfy one of.

use crate::error::{Result, SchemaError};
use crate::name::Name;
use crate::pattern::Pattern;

/// What a signer's back-reference argument resolves to against the data
/// rule's own capture groups. Distinguished at parse time (a bare digit vs.
/// anything else) rather than by attempting a numeric parse and falling
/// back, since the grammar never actually needs the fallback to be lazy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackRef {
    /// `null`: this argument position is unconstrained.
    Null,
    /// `$k`: the data rule's own `k`th capture group.
    Ref(usize),
    /// A bare literal name segment used as an argument as-is.
    Literal(Name),
}

impl BackRef {
    fn parse(token: &str) -> Self {
        let token = token.trim();
        if token == "null" {
            BackRef::Null
        } else if let Some(rest) = token.strip_prefix('$') {
            match rest.parse::<usize>() {
                Ok(k) => BackRef::Ref(k),
                Err(_) => BackRef::Literal(Name::parse(token)),
            }
        } else {
            BackRef::Literal(Name::parse(token))
        }
    }
}

/// One alternative in a rule's signer list: the id of another rule or
/// trust anchor this name's signer must satisfy, plus the back-references
/// carried over from the data rule's own pattern.
#[derive(Debug, Clone)]
pub struct Signer {
    pub id: String,
    pub back_refs: Vec<BackRef>,
}

impl Signer {
    /// Parses one `id(arg1,arg2,...)` alternative. The argument list may be
    /// empty (`id()`).
    fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let open = text.find('(').ok_or_else(|| {
            SchemaError::Parse(format!("signer '{}' is missing its argument list", text))
        })?;
        if !text.ends_with(')') {
            return Err(SchemaError::Parse(format!("signer '{}' is missing a closing ')'", text)));
        }
        let id = text[..open].trim().to_string();
        let args = &text[open + 1..text.len() - 1];
        let back_refs = if args.trim().is_empty() {
            Vec::new()
        } else {
            args.split(',').map(BackRef::parse).collect()
        };
        Ok(Self { id, back_refs })
    }
}

/// Parses a `|`-separated signer alternation, e.g. `"id1($1,null)|id2()"`.
pub fn parse_signers(text: &str) -> Result<Vec<Signer>> {
    text.split('|').map(Signer::parse).collect()
}

/// A single rule: names matching `pattern` must be signed by a key whose
/// name satisfies one of `signers` (first match in document order wins, but
/// all are tried — see [`crate::schema`]).
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub pattern: Pattern,
    pub signers: Vec<Signer>,
}

impl Rule {
    pub fn new(id: impl Into<String>, pattern: Pattern, signers: Vec<Signer>) -> Self {
        Self { id: id.into(), pattern, signers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_null_and_backref_and_literal_args() {
        let signers = parse_signers("kid($1,null)|anchor(/ndn/root)").unwrap();
        assert_eq!(signers.len(), 2);
        assert_eq!(signers[0].id, "kid");
        assert_eq!(signers[0].back_refs, vec![BackRef::Ref(1), BackRef::Null]);
        assert_eq!(signers[1].id, "anchor");
        assert_eq!(signers[1].back_refs, vec![BackRef::Literal(Name::parse("/ndn/root"))]);
    }

    #[test]
    fn parses_empty_argument_list() {
        let signers = parse_signers("root()").unwrap();
        assert_eq!(signers[0].back_refs, Vec::new());
    }

    #[test]
    fn rejects_a_missing_argument_list() {
        assert!(parse_signers("root").is_err());
    }
}
