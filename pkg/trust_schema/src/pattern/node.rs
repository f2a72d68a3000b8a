//! The component-sequence pattern tree, modeled on
//! `automata::regexp::node::RegExpNode` but one level up: each node here
//! consumes whole [`Component`](crate::name::Component)s of a
//! [`Name`](crate::name::Name) rather than characters of a string.

use crate::name::Name;
use crate::pattern::charregex::CharRegex;

/// The repetition operator actually written in the pattern source. Kept
/// distinct from the `(min, max)` bounds it implies so that `derivePattern`
/// can render `<>*` back out as `<>*` rather than some normalized form —
/// the schema document is meant to be re-diffable against what an author
/// wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatOp {
    Star,
    Plus,
    Opt,
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl RepeatOp {
    pub fn bounds(&self) -> (usize, Option<usize>) {
        match self {
            RepeatOp::Star => (0, None),
            RepeatOp::Plus => (1, None),
            RepeatOp::Opt => (0, Some(1)),
            RepeatOp::Exact(n) => (*n, Some(*n)),
            RepeatOp::AtLeast(n) => (*n, None),
            RepeatOp::Range(lo, hi) => (*lo, Some(*hi)),
        }
    }

    pub fn render(&self) -> String {
        match self {
            RepeatOp::Star => "*".to_string(),
            RepeatOp::Plus => "+".to_string(),
            RepeatOp::Opt => "?".to_string(),
            RepeatOp::Exact(n) => format!("{{{}}}", n),
            RepeatOp::AtLeast(n) => format!("{{{},}}", n),
            RepeatOp::Range(lo, hi) => format!("{{{},{}}}", lo, hi),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    /// `<literal>`: matches exactly one component equal to these bytes.
    Literal(Vec<u8>),

    /// `<>`: matches any single component.
    Wildcard,

    /// `<regex>`: matches one component whose URI-escaped text satisfies the
    /// compiled character regex.
    Regex(CharRegex),

    /// `[<a><b><c>]` or `[^<a><b><c>]`: matches one component equal (or, if
    /// negated, not equal) to any of the listed literals.
    Set { negate: bool, items: Vec<Vec<u8>> },

    /// An item followed by a repetition operator.
    Repeat { inner: Box<Node>, op: RepeatOp },

    /// A parenthesized sub-sequence, numbered in left-to-right order of
    /// opening parentheses (the usual regex back-reference convention).
    Group { inner: Box<Node>, index: usize },

    /// A bare concatenation of items, used both for the whole pattern and
    /// for the contents of a group.
    Seq(Vec<Node>),
}

fn escape_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        let c = b as char;
        if matches!(c, '.' | '[' | '{' | '}' | '(' | ')' | '\\' | '*' | '+' | '?' | '|' | '^' | '$' | '<' | '>') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl Node {
    /// Re-renders this node back into pattern syntax. `resolve` supplies the
    /// bound [`Name`](crate::name::Name) for a given group index (used only
    /// by [`Node::Group`]) — every other node type renders its own original
    /// syntax unchanged, even a `<>*` that matched several concrete
    /// components, preserving what the schema author actually wrote.
    pub fn render(&self, resolve: &dyn Fn(usize) -> Option<String>) -> String {
        match self {
            Node::Literal(bytes) => format!("<{}>", escape_literal(bytes)),
            Node::Wildcard => "<>".to_string(),
            Node::Regex(re) => format!("<{}>", re.source()),
            Node::Set { negate, items } => {
                let mut s = String::from("[");
                if *negate {
                    s.push('^');
                }
                for item in items {
                    s.push('<');
                    s.push_str(&escape_literal(item));
                    s.push('>');
                }
                s.push(']');
                s
            }
            Node::Repeat { inner, op } => format!("{}{}", inner.render(resolve), op.render()),
            Node::Group { inner, index } => {
                let _ = inner;
                resolve(*index).unwrap_or_default()
            }
            Node::Seq(items) => items.iter().map(|n| n.render(resolve)).collect(),
        }
    }

    /// The number of groups nested inside (and including) this node.
    pub fn group_count(&self) -> usize {
        match self {
            Node::Literal(_) | Node::Wildcard | Node::Regex(_) | Node::Set { .. } => 0,
            Node::Repeat { inner, .. } => inner.group_count(),
            Node::Group { inner, .. } => 1 + inner.group_count(),
            Node::Seq(items) => items.iter().map(Node::group_count).sum(),
        }
    }
}

/// Renders a concrete [`Name`] as a literal-only pattern, e.g. `/a/b` becomes
/// `<a><b>`. Used both by [`Node::render`] for a bound group and by the
/// planner when it needs to treat a just-derived name as a pattern in its
/// own right.
pub fn render_literal_name(name: &Name) -> String {
    let mut out = String::new();
    for component in &name.0 {
        out.push('<');
        out.push_str(&escape_literal(component.as_bytes()));
        out.push('>');
    }
    out
}
