//! A small character-level regex engine for the `<regex>` component token.
//!
//! This exists instead of depending on the `automata` crate's own regex
//! engine because `automata::regexp::syntax` is written against a more
//! general `Parser<Input, T>` than the `Bytes`-only combinators this
//! workspace's `parsing` crate provides (see the dependency notes). The node
//! shape below mirrors `automata::regexp::node::RegExpNode` closely enough
//! that porting across later is mostly mechanical; the backtracking matcher
//! follows the same continuation-passing style as `automata::fsm`.

use std::fmt;

#[derive(Debug, Clone)]
enum ClassItem {
    Char(char),
    Range(char, char),
}

#[derive(Debug, Clone)]
enum CNode {
    Literal(char),
    Any,
    Class { negate: bool, items: Vec<ClassItem> },
    Concat(Vec<CNode>),
    Repeat { inner: Box<CNode>, min: usize, max: Option<usize> },
}

/// A compiled component-content pattern, e.g. the body of `<[A-Za-z0-9]+>`.
#[derive(Debug, Clone)]
pub struct CharRegex {
    source: String,
    root: CNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharRegexError(String);

impl fmt::Display for CharRegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid component regex: {}", self.0)
    }
}

impl CharRegex {
    pub fn compile(source: &str) -> Result<Self, CharRegexError> {
        let chars: Vec<char> = source.chars().collect();
        let mut pos = 0;
        let root = parse_concat(&chars, &mut pos)?;
        if pos != chars.len() {
            return Err(CharRegexError(format!(
                "unexpected trailing input at offset {} in '{}'",
                pos, source
            )));
        }
        Ok(Self { source: source.to_string(), root })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the whole of `text` matches (anchored on both ends, matching
    /// the way a component's full URI-escaped text is tested).
    pub fn is_full_match(&self, text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        match_node(&self.root, &chars, 0, &mut |pos| pos == chars.len())
    }
}

fn parse_concat(s: &[char], pos: &mut usize) -> Result<CNode, CharRegexError> {
    let mut items = Vec::new();
    while *pos < s.len() && s[*pos] != ')' {
        items.push(parse_quantified(s, pos)?);
    }
    Ok(CNode::Concat(items))
}

fn parse_quantified(s: &[char], pos: &mut usize) -> Result<CNode, CharRegexError> {
    let atom = parse_atom(s, pos)?;
    if *pos >= s.len() {
        return Ok(atom);
    }
    match s[*pos] {
        '*' => {
            *pos += 1;
            Ok(CNode::Repeat { inner: Box::new(atom), min: 0, max: None })
        }
        '+' => {
            *pos += 1;
            Ok(CNode::Repeat { inner: Box::new(atom), min: 1, max: None })
        }
        '?' => {
            *pos += 1;
            Ok(CNode::Repeat { inner: Box::new(atom), min: 0, max: Some(1) })
        }
        '{' => {
            let (min, max) = parse_braces(s, pos)?;
            Ok(CNode::Repeat { inner: Box::new(atom), min, max })
        }
        _ => Ok(atom),
    }
}

fn parse_braces(s: &[char], pos: &mut usize) -> Result<(usize, Option<usize>), CharRegexError> {
    debug_assert_eq!(s[*pos], '{');
    *pos += 1;
    let lo = parse_number(s, pos)?;
    if *pos < s.len() && s[*pos] == ',' {
        *pos += 1;
        let hi = if *pos < s.len() && s[*pos].is_ascii_digit() {
            Some(parse_number(s, pos)?)
        } else {
            None
        };
        expect(s, pos, '}')?;
        Ok((lo, hi))
    } else {
        expect(s, pos, '}')?;
        Ok((lo, Some(lo)))
    }
}

fn parse_number(s: &[char], pos: &mut usize) -> Result<usize, CharRegexError> {
    let start = *pos;
    while *pos < s.len() && s[*pos].is_ascii_digit() {
        *pos += 1;
    }
    if *pos == start {
        return Err(CharRegexError("expected a number".to_string()));
    }
    s[start..*pos]
        .iter()
        .collect::<String>()
        .parse()
        .map_err(|_| CharRegexError("number out of range".to_string()))
}

fn expect(s: &[char], pos: &mut usize, c: char) -> Result<(), CharRegexError> {
    if *pos < s.len() && s[*pos] == c {
        *pos += 1;
        Ok(())
    } else {
        Err(CharRegexError(format!("expected '{}'", c)))
    }
}

fn parse_atom(s: &[char], pos: &mut usize) -> Result<CNode, CharRegexError> {
    if *pos >= s.len() {
        return Err(CharRegexError("unexpected end of pattern".to_string()));
    }
    match s[*pos] {
        '(' => {
            *pos += 1;
            let inner = parse_concat(s, pos)?;
            expect(s, pos, ')')?;
            Ok(inner)
        }
        '.' => {
            *pos += 1;
            Ok(CNode::Any)
        }
        '[' => parse_class(s, pos),
        '\\' => {
            *pos += 1;
            let c = *s.get(*pos).ok_or_else(|| CharRegexError("dangling escape".to_string()))?;
            *pos += 1;
            Ok(CNode::Literal(c))
        }
        c => {
            *pos += 1;
            Ok(CNode::Literal(c))
        }
    }
}

fn parse_class(s: &[char], pos: &mut usize) -> Result<CNode, CharRegexError> {
    debug_assert_eq!(s[*pos], '[');
    *pos += 1;
    let negate = if *pos < s.len() && s[*pos] == '^' {
        *pos += 1;
        true
    } else {
        false
    };
    let mut items = Vec::new();
    while *pos < s.len() && s[*pos] != ']' {
        let c = if s[*pos] == '\\' {
            *pos += 1;
            let c = *s.get(*pos).ok_or_else(|| CharRegexError("dangling escape in class".to_string()))?;
            *pos += 1;
            c
        } else {
            let c = s[*pos];
            *pos += 1;
            c
        };
        if *pos + 1 < s.len() && s[*pos] == '-' && s[*pos + 1] != ']' {
            *pos += 1;
            let end = s[*pos];
            *pos += 1;
            items.push(ClassItem::Range(c, end));
        } else {
            items.push(ClassItem::Char(c));
        }
    }
    expect(s, pos, ']')?;
    Ok(CNode::Class { negate, items })
}

fn class_matches(items: &[ClassItem], negate: bool, c: char) -> bool {
    let hit = items.iter().any(|item| match item {
        ClassItem::Char(x) => *x == c,
        ClassItem::Range(lo, hi) => *lo <= c && c <= *hi,
    });
    hit != negate
}

fn match_node(node: &CNode, s: &[char], pos: usize, cont: &mut dyn FnMut(usize) -> bool) -> bool {
    match node {
        CNode::Literal(c) => s.get(pos) == Some(c) && cont(pos + 1),
        CNode::Any => pos < s.len() && cont(pos + 1),
        CNode::Class { negate, items } => {
            pos < s.len() && class_matches(items, *negate, s[pos]) && cont(pos + 1)
        }
        CNode::Concat(items) => match_seq(items, s, pos, cont),
        CNode::Repeat { inner, min, max } => match_repeat(inner, *min, *max, 0, s, pos, cont),
    }
}

fn match_seq(items: &[CNode], s: &[char], pos: usize, cont: &mut dyn FnMut(usize) -> bool) -> bool {
    match items.split_first() {
        None => cont(pos),
        Some((head, tail)) => match_node(head, s, pos, &mut |p2| match_seq(tail, s, p2, cont)),
    }
}

fn match_repeat(
    inner: &CNode,
    min: usize,
    max: Option<usize>,
    count: usize,
    s: &[char],
    pos: usize,
    cont: &mut dyn FnMut(usize) -> bool,
) -> bool {
    if max.map_or(true, |m| count < m) {
        let extended = match_node(inner, s, pos, &mut |p2| {
            if p2 == pos {
                return false;
            }
            match_repeat(inner, min, max, count + 1, s, p2, cont)
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
    fn matches_plain_literal() {
        let r = CharRegex::compile("abc").unwrap();
        assert!(r.is_full_match("abc"));
        assert!(!r.is_full_match("abcd"));
    }

    #[test]
    fn matches_character_class_with_range() {
        let r = CharRegex::compile("[a-z0-9]+").unwrap();
        assert!(r.is_full_match("v3"));
        assert!(!r.is_full_match("V3"));
    }

    #[test]
    fn matches_dot_star() {
        let r = CharRegex::compile(".*").unwrap();
        assert!(r.is_full_match(""));
        assert!(r.is_full_match("anything%20at%20all"));
    }

    #[test]
    fn rejects_unbalanced_group() {
        assert!(CharRegex::compile("(abc").is_err());
    }
}
