//! Recursive-descent parser for the component-sequence pattern language
//! (`<lit>`, `<regex>`, `<>`, `[...]`, repetition, and `(...)` groups).
//!
//! This grammar nests in the same way `automata::regexp::syntax` does, but
//! is hand-written against a plain `&[char]` cursor instead of the
//! `parsing` crate's combinators: the vendored `automata` grammar is written
//! against a more general `Parser<Input, T>` than the `Bytes`-only
//! combinators available here support, so reusing that machinery for a
//! second nested grammar wasn't worth fighting (see the dependency notes).

use crate::error::{Result, SchemaError};
use crate::pattern::charregex::CharRegex;
use crate::pattern::node::{Node, RepeatOp};

const METACHARS: &str = ".[]{}()\\*+?|^$<>";

pub fn parse_pattern(source: &str) -> Result<(Node, usize)> {
    let chars: Vec<char> = source.chars().collect();
    let mut pos = 0;
    let mut next_group = 0usize;
    let node = parse_seq(&chars, &mut pos, &mut next_group, source)?;
    if pos != chars.len() {
        return Err(SchemaError::Parse(format!(
            "unexpected trailing input at offset {} in pattern '{}'",
            pos, source
        )));
    }
    Ok((node, next_group))
}

fn err(source: &str, msg: impl Into<String>) -> SchemaError {
    SchemaError::Parse(format!("{} (in pattern '{}')", msg.into(), source))
}

fn parse_seq(s: &[char], pos: &mut usize, next_group: &mut usize, source: &str) -> Result<Node> {
    let mut items = Vec::new();
    while *pos < s.len() && s[*pos] != ')' {
        items.push(parse_quantified(s, pos, next_group, source)?);
    }
    Ok(Node::Seq(items))
}

fn parse_quantified(
    s: &[char],
    pos: &mut usize,
    next_group: &mut usize,
    source: &str,
) -> Result<Node> {
    let atom = parse_atom(s, pos, next_group, source)?;
    if *pos >= s.len() {
        return Ok(atom);
    }
    let op = match s[*pos] {
        '*' => {
            *pos += 1;
            Some(RepeatOp::Star)
        }
        '+' => {
            *pos += 1;
            Some(RepeatOp::Plus)
        }
        '?' => {
            *pos += 1;
            Some(RepeatOp::Opt)
        }
        '{' => Some(parse_braces(s, pos, source)?),
        _ => None,
    };
    Ok(match op {
        Some(op) => Node::Repeat { inner: Box::new(atom), op },
        None => atom,
    })
}

fn parse_braces(s: &[char], pos: &mut usize, source: &str) -> Result<RepeatOp> {
    debug_assert_eq!(s[*pos], '{');
    *pos += 1;
    let lo = parse_number(s, pos, source)?;
    let op = if *pos < s.len() && s[*pos] == ',' {
        *pos += 1;
        if *pos < s.len() && s[*pos].is_ascii_digit() {
            let hi = parse_number(s, pos, source)?;
            if hi < lo {
                return Err(err(source, "repetition upper bound is below the lower bound"));
            }
            RepeatOp::Range(lo, hi)
        } else {
            RepeatOp::AtLeast(lo)
        }
    } else {
        RepeatOp::Exact(lo)
    };
    expect(s, pos, '}', source)?;
    Ok(op)
}

fn parse_number(s: &[char], pos: &mut usize, source: &str) -> Result<usize> {
    let start = *pos;
    while *pos < s.len() && s[*pos].is_ascii_digit() {
        *pos += 1;
    }
    if *pos == start {
        return Err(err(source, "expected a number in repetition operator"));
    }
    s[start..*pos]
        .iter()
        .collect::<String>()
        .parse()
        .map_err(|_| err(source, "repetition count out of range"))
}

fn expect(s: &[char], pos: &mut usize, c: char, source: &str) -> Result<()> {
    if *pos < s.len() && s[*pos] == c {
        *pos += 1;
        Ok(())
    } else {
        Err(err(source, format!("expected '{}'", c)))
    }
}

fn parse_atom(s: &[char], pos: &mut usize, next_group: &mut usize, source: &str) -> Result<Node> {
    if *pos >= s.len() {
        return Err(err(source, "unexpected end of pattern"));
    }
    match s[*pos] {
        '(' => {
            *pos += 1;
            let index = *next_group;
            *next_group += 1;
            let inner = parse_seq(s, pos, next_group, source)?;
            expect(s, pos, ')', source)?;
            Ok(Node::Group { inner: Box::new(inner), index })
        }
        '<' => parse_component(s, pos, source),
        '[' => parse_set(s, pos, source),
        c => Err(err(source, format!("unexpected character '{}'", c))),
    }
}

/// Reads raw text up to (but not including) the next unescaped `>`,
/// un-escaping `\>` to a literal `>` along the way.
fn read_angle_body(s: &[char], pos: &mut usize, source: &str) -> Result<String> {
    debug_assert_eq!(s[*pos], '<');
    *pos += 1;
    let mut body = String::new();
    loop {
        if *pos >= s.len() {
            return Err(err(source, "unterminated '<' component"));
        }
        match s[*pos] {
            '>' => {
                *pos += 1;
                return Ok(body);
            }
            '\\' if *pos + 1 < s.len() => {
                body.push(s[*pos]);
                body.push(s[*pos + 1]);
                *pos += 2;
            }
            c => {
                body.push(c);
                *pos += 1;
            }
        }
    }
}

fn parse_component(s: &[char], pos: &mut usize, source: &str) -> Result<Node> {
    let body = read_angle_body(s, pos, source)?;
    if body.is_empty() {
        return Ok(Node::Wildcard);
    }
    if body.contains(|c| METACHARS.contains(c)) {
        let re = CharRegex::compile(&body)
            .map_err(|e| err(source, format!("bad component regex '{}': {}", body, e)))?;
        Ok(Node::Regex(re))
    } else {
        Ok(Node::Literal(body.into_bytes()))
    }
}

fn parse_set(s: &[char], pos: &mut usize, source: &str) -> Result<Node> {
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
        if s[*pos] != '<' {
            return Err(err(source, "component sets may only contain literal '<...>' items"));
        }
        let body = read_angle_body(s, pos, source)?;
        if body.contains(|c| METACHARS.contains(c)) {
            return Err(err(source, "component sets may only contain literal '<...>' items"));
        }
        items.push(body.into_bytes());
    }
    expect(s, pos, ']', source)?;
    if items.is_empty() {
        return Err(err(source, "component set must not be empty"));
    }
    Ok(Node::Set { negate, items })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wildcard_and_literal() {
        let (node, groups) = parse_pattern("<a><>").unwrap();
        assert_eq!(groups, 0);
        match node {
            Node::Seq(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0], Node::Literal(_)));
                assert!(matches!(items[1], Node::Wildcard));
            }
            _ => panic!("expected Seq"),
        }
    }

    #[test]
    fn assigns_group_indices_in_open_paren_order() {
        let (_node, groups) = parse_pattern("(<a>(<b>))").unwrap();
        assert_eq!(groups, 2);
    }

    #[test]
    fn parses_component_set_and_repeat() {
        let (_node, _) = parse_pattern("[<a><b>]{2,3}").unwrap();
    }

    #[test]
    fn rejects_regex_inside_component_set() {
        assert!(parse_pattern("[<[a-z]+>]").is_err());
    }
}
