//! The bespoke component-sequence pattern language used throughout the
//! schema: rule, signer, and anchor names are all written against patterns
//! compiled by this module rather than matched as plain strings.
//!
//! A [`Pattern`] is a compiled syntax tree (see [`node`]) plus a cell of
//! whichever bindings its most recent [`Pattern::is_match`] or
//! [`Pattern::infer`] call produced. Storing the bindings on the pattern
//! itself — rather than returning them separately — mirrors how the rest of
//! the interpreter chains these calls: a signer's pattern is matched or
//! inferred once, and then `expand`ed any number of times while planning a
//! certificate chain, all against whatever binding is currently live.

mod charregex;
pub mod node;
mod syntax;

use std::cell::RefCell;

use crate::error::{Result, SchemaError};
use crate::name::{Component, Name};
use node::Node;

pub use charregex::CharRegex;
pub use node::render_literal_name;

#[derive(Debug, Clone)]
struct MatchState {
    /// Set only after `is_match`; `infer` has no single name to point to.
    full: Option<Name>,
    groups: Vec<Option<Name>>,
}

#[derive(Debug)]
pub struct Pattern {
    source: String,
    root: Node,
    num_groups: usize,
    state: RefCell<Option<MatchState>>,
}

impl Clone for Pattern {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            root: self.root.clone(),
            num_groups: self.num_groups,
            state: RefCell::new(self.state.borrow().clone()),
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}
impl Eq for Pattern {}

impl Pattern {
    pub fn compile(source: &str) -> Result<Self> {
        let (root, num_groups) = syntax::parse_pattern(source)?;
        Ok(Self { source: source.to_string(), root, num_groups, state: RefCell::new(None) })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn group_count(&self) -> usize {
        self.num_groups
    }

    /// Tests `name` against the pattern, requiring the whole name to be
    /// consumed. On success, the pattern's capture groups are bound to the
    /// sub-names that matched them and can be read with [`Pattern::group`]
    /// or substituted into an [`Pattern::expand`] template.
    pub fn is_match(&self, name: &Name) -> bool {
        let groups = RefCell::new(vec![None; self.num_groups]);
        let conflict = RefCell::new(None);
        let ok = match_node(&self.root, name, 0, name.len(), &groups, &conflict, &|pos| {
            pos == name.len()
        });
        if ok {
            *self.state.borrow_mut() =
                Some(MatchState { full: Some(name.clone()), groups: groups.into_inner() });
        }
        ok
    }

    pub fn group(&self, index: usize) -> Option<Name> {
        self.state.borrow().as_ref().and_then(|st| st.groups.get(index).cloned().flatten())
    }

    /// Binds each declared group `i` against `examples[i]`, requiring a full
    /// sub-match of that group's own sub-pattern, and requiring that every
    /// declared group actually be reached during the walk.
    ///
    /// The upstream inference routine this is modeled on skips validating a
    /// group whose supplied example is empty instead of running it through
    /// the sub-pattern at all, which lets a malformed schema silently bind
    /// an empty name to a group that was never declared to accept one. This
    /// version always runs the match, empty example or not, and separately
    /// rejects the case where a declared group's sub-pattern is never
    /// reached by any example.
    pub fn infer(&self, examples: &[Name]) -> Result<()> {
        if examples.len() != self.num_groups {
            return Err(SchemaError::InferMismatch(format!(
                "pattern '{}' declares {} group(s) but {} example name(s) were given",
                self.source,
                self.num_groups,
                examples.len()
            )));
        }

        let groups = RefCell::new(vec![None::<Name>; self.num_groups]);
        let conflict = RefCell::new(None);

        for (index, example) in examples.iter().enumerate() {
            let group_node = find_group(&self.root, index).ok_or_else(|| {
                SchemaError::InferMismatch(format!(
                    "pattern '{}' has no group numbered {}",
                    self.source, index
                ))
            })?;

            let ok = match_node(group_node, example, 0, example.len(), &groups, &conflict, &|pos| {
                pos == example.len()
            });

            if let Some(msg) = conflict.borrow_mut().take() {
                return Err(SchemaError::InferMismatch(format!(
                    "pattern '{}': {}",
                    self.source, msg
                )));
            }
            if !ok {
                return Err(SchemaError::InferMismatch(format!(
                    "pattern '{}': example '{}' does not match group {}",
                    self.source, example, index
                )));
            }
            // The group itself isn't written by matching its own inner node
            // (only nested groups are, as a side effect of the match above),
            // so bind it explicitly here, checking for the same
            // already-bound-differently conflict the nested case checks.
            let mut g = groups.borrow_mut();
            match &g[index] {
                Some(existing) if existing != example => {
                    return Err(SchemaError::InferMismatch(format!(
                        "pattern '{}': group {} bound inconsistently to both '{}' and '{}'",
                        self.source, index, existing, example
                    )));
                }
                _ => g[index] = Some(example.clone()),
            }
        }

        if groups.borrow().iter().any(Option::is_none) {
            return Err(SchemaError::InferMismatch(format!(
                "pattern '{}' has a group that no example reached",
                self.source
            )));
        }

        *self.state.borrow_mut() = Some(MatchState { full: None, groups: groups.into_inner() });
        Ok(())
    }

    /// Re-renders the pattern's source with every group substituted by the
    /// literal components its current binding matched. Requires a prior
    /// successful [`Pattern::is_match`] or [`Pattern::infer`].
    pub fn derive_pattern(&self) -> Result<String> {
        let state = self.state.borrow();
        let st = state.as_ref().ok_or_else(|| {
            SchemaError::InferMismatch(format!(
                "pattern '{}' has not been matched or inferred yet",
                self.source
            ))
        })?;
        Ok(self.root.render(&|index| st.groups.get(index).cloned().flatten().map(|n| render_literal_name(&n))))
    }

    /// Expands a `$k`/literal template against the pattern's current
    /// binding. `$0` is the whole matched name (only meaningful after
    /// `is_match`); `$k` for `k >= 1` is the `k`th group, 1-indexed.
    pub fn expand(&self, template: &str) -> Result<Name> {
        let tokens = tokenize_expand(template)?;
        let state = self.state.borrow();
        let st = state.as_ref().ok_or_else(|| SchemaError::ExpandRange(0))?;

        let mut out = Name::new();
        for token in tokens {
            let piece = match token {
                ExpandToken::Literal(name) => name,
                ExpandToken::Ref(0) => {
                    st.full.clone().ok_or(SchemaError::ExpandRange(0))?
                }
                ExpandToken::Ref(k) => st
                    .groups
                    .get(k - 1)
                    .cloned()
                    .flatten()
                    .ok_or(SchemaError::ExpandRange(k))?,
            };
            out = out.join(&piece);
        }
        Ok(out)
    }
}

enum ExpandToken {
    Literal(Name),
    Ref(usize),
}

/// Tokenizes an `expand` template: a concatenation of bracketed `<literal>`
/// tokens (the same single-component syntax used everywhere else in the
/// pattern language) and `$k` group references. A run of adjacent
/// `<literal>` tokens with no `$k` between them collects into one
/// [`ExpandToken::Literal`] name of several components.
fn tokenize_expand(template: &str) -> Result<Vec<ExpandToken>> {
    let mut tokens = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    let mut literal = Name::new();

    while i < bytes.len() {
        match bytes[i] {
            b'$' => {
                if !literal.is_empty() {
                    tokens.push(ExpandToken::Literal(std::mem::replace(&mut literal, Name::new())));
                }
                i += 1;
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i == start {
                    return Err(SchemaError::Parse(format!(
                        "'$' not followed by a group number in expand template '{}'",
                        template
                    )));
                }
                let k: usize = template[start..i].parse().unwrap();
                tokens.push(ExpandToken::Ref(k));
            }
            b'<' => {
                let close = template[i..].find('>').map(|offset| i + offset).ok_or_else(|| {
                    SchemaError::Parse(format!("unterminated '<' in expand template '{}'", template))
                })?;
                let unescaped = unescape_literal_token(&template[i + 1..close]);
                literal = literal.append(Component::from_bytes(unescaped.into_bytes()));
                i = close + 1;
            }
            _ => {
                return Err(SchemaError::Parse(format!(
                    "expand template '{}' has a character outside of a <literal> token or $k reference",
                    template
                )));
            }
        }
    }
    if !literal.is_empty() {
        tokens.push(ExpandToken::Literal(literal));
    }
    Ok(tokens)
}

fn unescape_literal_token(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Finds the `Group` node declared with the given index.
fn find_group(node: &Node, index: usize) -> Option<&Node> {
    match node {
        Node::Group { inner, index: i } => {
            if *i == index {
                Some(inner)
            } else {
                find_group(inner, index)
            }
        }
        Node::Repeat { inner, .. } => find_group(inner, index),
        Node::Seq(items) => items.iter().find_map(|n| find_group(n, index)),
        Node::Literal(_) | Node::Wildcard | Node::Regex(_) | Node::Set { .. } => None,
    }
}

type Groups = RefCell<Vec<Option<Name>>>;
type Conflict = RefCell<Option<String>>;

fn match_node(
    node: &Node,
    name: &Name,
    pos: usize,
    end: usize,
    groups: &Groups,
    conflict: &Conflict,
    cont: &dyn Fn(usize) -> bool,
) -> bool {
    match node {
        Node::Literal(bytes) => {
            pos < end
                && name.get(pos).map(|c| c.as_bytes() == bytes.as_slice()).unwrap_or(false)
                && cont(pos + 1)
        }
        Node::Wildcard => pos < end && cont(pos + 1),
        Node::Regex(re) => {
            pos < end
                && name.get(pos).map(|c| re.is_full_match(&c.uri_escaped())).unwrap_or(false)
                && cont(pos + 1)
        }
        Node::Set { negate, items } => {
            pos < end
                && name
                    .get(pos)
                    .map(|c| items.iter().any(|item| c.as_bytes() == item.as_slice()) != *negate)
                    .unwrap_or(false)
                && cont(pos + 1)
        }
        Node::Repeat { inner, op } => {
            let (min, max) = op.bounds();
            match_repeat(inner, min, max, 0, name, pos, end, groups, conflict, cont)
        }
        Node::Group { inner, index } => {
            let idx = *index;
            match_node(inner, name, pos, end, groups, conflict, &|p2| {
                let candidate = name.slice(pos, p2);
                let mut g = groups.borrow_mut();
                match &g[idx] {
                    Some(existing) if *existing != candidate => {
                        *conflict.borrow_mut() = Some(format!(
                            "group {} bound inconsistently to both '{}' and '{}'",
                            idx, existing, candidate
                        ));
                        false
                    }
                    _ => {
                        g[idx] = Some(candidate);
                        drop(g);
                        cont(p2)
                    }
                }
            })
        }
        Node::Seq(items) => match_seq(items, name, pos, end, groups, conflict, cont),
    }
}

fn match_seq(
    items: &[Node],
    name: &Name,
    pos: usize,
    end: usize,
    groups: &Groups,
    conflict: &Conflict,
    cont: &dyn Fn(usize) -> bool,
) -> bool {
    match items.split_first() {
        None => cont(pos),
        Some((head, tail)) => match_node(head, name, pos, end, groups, conflict, &|p2| {
            match_seq(tail, name, p2, end, groups, conflict, cont)
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn match_repeat(
    inner: &Node,
    min: usize,
    max: Option<usize>,
    count: usize,
    name: &Name,
    pos: usize,
    end: usize,
    groups: &Groups,
    conflict: &Conflict,
    cont: &dyn Fn(usize) -> bool,
) -> bool {
    if max.map_or(true, |m| count < m) {
        let extended = match_node(inner, name, pos, end, groups, conflict, &|p2| {
            if p2 == pos {
                return false;
            }
            match_repeat(inner, min, max, count + 1, name, p2, end, groups, conflict, cont)
        });
        if extended {
            return true;
        }
    }
    count >= min && cont(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_literal_sequence() {
        let p = Pattern::compile("<a><b><c>").unwrap();
        assert!(p.is_match(&Name::parse("/a/b/c")));
        assert!(!p.is_match(&Name::parse("/a/b")));
    }

    #[test]
    fn wildcard_star_matches_any_length_tail() {
        let p = Pattern::compile("<a><>*").unwrap();
        assert!(p.is_match(&Name::parse("/a")));
        assert!(p.is_match(&Name::parse("/a/b/c/d/e/f")));
        assert!(!p.is_match(&Name::parse("/x/b")));
    }

    #[test]
    fn derive_pattern_keeps_wildcard_syntax_but_substitutes_groups() {
        // Only the group gets rendered as the literal components it bound
        // to; the trailing bare `<>` keeps its original wildcard syntax
        // even though it matched the concrete component "1".
        let p = Pattern::compile("(<>*)<KEY><>").unwrap();
        assert!(p.is_match(&Name::parse("/a/b/KEY/1")));
        let derived = p.derive_pattern().unwrap();
        assert_eq!(derived, "<a><b><KEY><>");
    }

    #[test]
    fn expand_substitutes_group_backreferences() {
        let p = Pattern::compile("(<>*)<c>").unwrap();
        assert!(p.is_match(&Name::parse("/a/b/c")));
        let expanded = p.expand("<prefix>$1<suffix>").unwrap();
        assert_eq!(expanded.to_string(), "/prefix/a/b/suffix");
    }

    #[test]
    fn expand_dollar_zero_is_the_whole_match() {
        let p = Pattern::compile("<a><b>").unwrap();
        assert!(p.is_match(&Name::parse("/a/b")));
        assert_eq!(p.expand("$0").unwrap().to_string(), "/a/b");
    }

    #[test]
    fn expand_parses_adjacent_literal_tokens_as_separate_components() {
        let p = Pattern::compile("(<>*)<KEY>(<>)").unwrap();
        assert!(p.is_match(&Name::parse("/a/KEY/1")));
        // A prior version fed "<ndn><blog>" to a slash-delimited name
        // parser, mangling it into a single malformed component instead of
        // the two components this bracketed syntax declares.
        let expanded = p.expand("<ndn><blog>$1<KEY>$2").unwrap();
        assert_eq!(expanded.to_string(), "/ndn/blog/a/KEY/1");
    }

    #[test]
    fn infer_requires_every_group_to_be_reached() {
        let p = Pattern::compile("(<a>)(<b>)").unwrap();
        let ok = p.infer(&[Name::parse("/a"), Name::parse("/b")]);
        assert!(ok.is_ok());
        assert_eq!(p.expand("$1").unwrap().to_string(), "/a");
    }

    #[test]
    fn infer_rejects_an_example_that_does_not_match_its_group() {
        let p = Pattern::compile("(<a>)(<b>)").unwrap();
        let err = p.infer(&[Name::parse("/a"), Name::parse("/x")]);
        assert!(err.is_err());
    }

    #[test]
    fn component_set_and_regex_tokens_match() {
        let p = Pattern::compile("[<a><b>]<[0-9]+>").unwrap();
        assert!(p.is_match(&Name::parse("/b/42")));
        assert!(!p.is_match(&Name::parse("/c/42")));
        assert!(!p.is_match(&Name::parse("/b/x")));
    }

    #[test]
    fn exact_and_ranged_repetitions() {
        let exact = Pattern::compile("[<a><b>]{3}").unwrap();
        assert!(exact.is_match(&Name::parse("/a/b/a")));
        assert!(!exact.is_match(&Name::parse("/a/b")));

        let ranged = Pattern::compile("[<a><b>]{2,3}").unwrap();
        assert!(ranged.is_match(&Name::parse("/a/b")));
        assert!(ranged.is_match(&Name::parse("/a/b/a")));
        assert!(!ranged.is_match(&Name::parse("/a")));
    }
}
