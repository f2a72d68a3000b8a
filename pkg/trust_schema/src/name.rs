//! Hierarchical names: ordered sequences of opaque octet-string components.

use std::fmt;

/// One element of a [`Name`]. Components are arbitrary binary data; they are
/// not required to be valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Component(pub Vec<u8>);

impl Component {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The URI-escaped rendering of this component, used as the input to a
    /// `<regex>` component matcher. Non-printable and reserved bytes are
    /// percent-escaped; alphanumerics and `-._~` pass through unescaped.
    pub fn uri_escaped(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for &b in &self.0 {
            let is_unreserved = b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~');
            if is_unreserved {
                out.push(b as char);
            } else {
                out.push('%');
                out.push_str(&format!("{:02X}", b));
            }
        }
        out
    }
}

impl From<&str> for Component {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri_escaped())
    }
}

/// An ordered sequence of [`Component`]s. Empty names are permitted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Name(pub Vec<Component>);

impl Name {
    pub fn new() -> Self {
        Self(vec![])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Component> {
        self.0.get(i)
    }

    /// Returns the sub-name `[begin, end)`.
    pub fn slice(&self, begin: usize, end: usize) -> Name {
        Name(self.0[begin..end].to_vec())
    }

    /// Returns this name with the last `n` components removed.
    ///
    /// `prefix(-1)` (the common case of dropping one component, e.g. to turn
    /// a certificate name into its key name) is expressed as `prefix(1)`.
    pub fn prefix(&self, drop: usize) -> Name {
        let keep = self.0.len().saturating_sub(drop);
        self.slice(0, keep)
    }

    pub fn append(&self, component: Component) -> Name {
        let mut v = self.0.clone();
        v.push(component);
        Name(v)
    }

    pub fn join(&self, other: &Name) -> Name {
        let mut v = self.0.clone();
        v.extend(other.0.iter().cloned());
        Name(v)
    }

    /// Parses a `/`-delimited URI-style name. A leading `/` is optional;
    /// empty segments (e.g. from a trailing slash) are dropped.
    pub fn parse(uri: &str) -> Name {
        let trimmed = uri.trim_start_matches('/');
        if trimmed.is_empty() {
            return Name::new();
        }
        Name(
            trimmed
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| Component::from(unescape_uri(s).as_str()))
                .collect(),
        )
    }

    /// Wire encoding used as the input to the name-hash (see the anchor
    /// container's `NameHash`): each component length-prefixed with a
    /// varint-free `u32` big-endian length, concatenated in order.
    pub fn wire_encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for c in &self.0 {
            out.extend_from_slice(&(c.0.len() as u32).to_be_bytes());
            out.extend_from_slice(&c.0);
        }
        out
    }
}

fn unescape_uri(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(v) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for c in &self.0 {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uri_names() {
        let n = Name::parse("/ndn/edu/ucla/haitao/cs/bh");
        assert_eq!(n.len(), 6);
        assert_eq!(n.get(0).unwrap().as_bytes(), b"ndn");
    }

    #[test]
    fn empty_name_round_trips() {
        let n = Name::parse("/");
        assert!(n.is_empty());
        assert_eq!(n.to_string(), "/");
    }

    #[test]
    fn prefix_drops_from_the_end() {
        let n = Name::parse("/a/b/config/key");
        assert_eq!(n.prefix(1).to_string(), "/a/b/config");
    }

    #[test]
    fn wire_encode_distinguishes_component_boundaries() {
        let a = Name::parse("/ab/c");
        let b = Name::parse("/a/bc");
        assert_ne!(a.wire_encode(), b.wire_encode());
    }
}
