//! Parser for the schema document's own (INFO-tree-like) text format: a
//! sequence of `rule`, `interest-rule`, `anchor`, `sig-req`, and `any`
//! blocks, each with a fixed field order — mirroring how the
//! interpreter's config loader reads its fields off a property tree
//! strictly in sequence rather than by name lookup.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

use crate::anchor::TrustAnchor;
use crate::error::{Result, SchemaError};
use crate::external::CertificateLoader;
use crate::pattern::Pattern;
use crate::rule::{parse_signers, Rule};
use crate::sig_req::{SignatureRequirement, SigningAlgorithm};

/// Everything a loaded schema document contributes to a [`crate::schema::Schema`].
#[derive(Default)]
pub struct SchemaDocument {
    pub data_rules: Vec<Rule>,
    pub interest_rules: Vec<Rule>,
    pub static_anchors: Vec<TrustAnchor>,
    pub dynamic_anchors: Vec<TrustAnchor>,
    pub sig_req: Option<SignatureRequirement>,
    /// The document's `any` bypass flag: `true` disables rule/signer
    /// checking for the whole schema session. Absent a section, this
    /// defaults to `false` (normal checking).
    pub bypass: bool,
}

/// Parses a schema document's text, resolving any `file` anchor paths
/// relative to `base_dir` (the document's own directory) and handing
/// certificate bytes to `loader` rather than decoding them itself.
pub fn parse_document(
    source: &str,
    base_dir: &Path,
    loader: &dyn CertificateLoader,
    default_refresh_period: Duration,
    now: DateTime<Utc>,
) -> Result<SchemaDocument> {
    let lines: Vec<&str> = source
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let mut doc = SchemaDocument::default();
    let mut i = 0;
    while i < lines.len() {
        let block_start = lines[i];
        let (keyword, _) = split_once_word(block_start);
        i += 1;
        let body_start = i;
        while i < lines.len() && lines[i] != "end" {
            i += 1;
        }
        if i >= lines.len() {
            return Err(SchemaError::Parse(format!("'{}' block has no matching 'end'", keyword)));
        }
        let body = &lines[body_start..i];
        i += 1; // past "end"

        match keyword {
            "rule" => {
                doc.data_rules.push(parse_rule_block(body)?);
            }
            "interest-rule" => {
                doc.interest_rules.push(parse_rule_block(body)?);
            }
            "anchor" => {
                let anchor = parse_anchor_block(body, base_dir, loader, default_refresh_period, now)?;
                match anchor {
                    AnchorKind::Static(a) => doc.static_anchors.push(a),
                    AnchorKind::Dynamic(a) => doc.dynamic_anchors.push(a),
                }
            }
            "sig-req" => {
                doc.sig_req = Some(parse_sig_req_block(body)?);
            }
            "any" => {
                doc.bypass = parse_any_block(body)?;
            }
            other => return Err(SchemaError::Parse(format!("unknown section '{}'", other))),
        }
    }

    Ok(doc)
}

/// Parses a `rule`/`interest-rule` block's shared field layout (`id`,
/// `pattern`, `signer`). The two section keywords differ only in which
/// rule set the caller pushes the result into — data rules and Interest
/// rules are each their own top-level section, not one shared block with a
/// `for` field distinguishing them.
fn parse_rule_block(body: &[&str]) -> Result<Rule> {
    let mut lines = body.iter();

    let id = expect_field(&mut lines, "id")?;
    let pattern_src = expect_field(&mut lines, "pattern")?;
    let signer_src = expect_field(&mut lines, "signer")?;

    let pattern = Pattern::compile(&pattern_src)?;
    let signers = parse_signers(&signer_src)?;
    Ok(Rule::new(id, pattern, signers))
}

enum AnchorKind {
    Static(TrustAnchor),
    Dynamic(TrustAnchor),
}

fn parse_anchor_block(
    body: &[&str],
    base_dir: &Path,
    loader: &dyn CertificateLoader,
    default_refresh_period: Duration,
    now: DateTime<Utc>,
) -> Result<AnchorKind> {
    let mut lines = body.iter();

    let id = expect_field(&mut lines, "id")?;

    let (keyword, value) = split_once_word(lines.next().ok_or_else(|| {
        SchemaError::Parse(format!("anchor '{}' is missing a 'file' or 'base64' field", id))
    })?);

    match keyword {
        "base64" => {
            let cert = loader.load_from_base64(value)?;
            Ok(AnchorKind::Static(TrustAnchor::new_static(id, cert)))
        }
        "file" => {
            let path = resolve_relative(base_dir, value);
            let cert = loader.load_from_file(&path)?;
            match lines.next() {
                None => Ok(AnchorKind::Static(TrustAnchor::new_static(id, cert))),
                Some(refresh_line) => {
                    let (refresh_keyword, refresh_value) = split_once_word(refresh_line);
                    if refresh_keyword != "refresh" {
                        return Err(SchemaError::Parse(format!(
                            "anchor '{}' has unexpected field '{}' after 'file'",
                            id, refresh_keyword
                        )));
                    }
                    let period = parse_refresh_period(refresh_value, default_refresh_period)?;
                    Ok(AnchorKind::Dynamic(TrustAnchor::new_dynamic(
                        id, cert, period, now, path,
                    )))
                }
            }
        }
        other => Err(SchemaError::Parse(format!(
            "anchor '{}' has unknown field '{}', expected 'file' or 'base64'",
            id, other
        ))),
    }
}

fn parse_sig_req_block(body: &[&str]) -> Result<SignatureRequirement> {
    let mut lines = body.iter();
    let hash = parse_yes_no(&expect_field(&mut lines, "hash")?)?;
    let algorithms = parse_signing_algorithms(&expect_field(&mut lines, "signing")?)?;
    let key_size_bits = match lines.next() {
        None => None,
        Some(line) => {
            let (keyword, value) = split_once_word(line);
            if keyword != "key-size" {
                return Err(SchemaError::Parse(format!(
                    "sig-req has unexpected field '{}' after 'signing'",
                    keyword
                )));
            }
            Some(value.parse::<u32>().map_err(|_| {
                SchemaError::Parse(format!("sig-req 'key-size' value '{}' is not a number", value))
            })?)
        }
    };
    Ok(SignatureRequirement::new(hash, &algorithms, key_size_bits))
}

/// Parses a `signing` field's pipe-separated algorithm set, e.g.
/// `"rsa|ecdsa"` or a bare `"rsa"`.
fn parse_signing_algorithms(value: &str) -> Result<Vec<SigningAlgorithm>> {
    value
        .split('|')
        .map(|token| match token.trim() {
            "rsa" => Ok(SigningAlgorithm::Rsa),
            "ecdsa" => Ok(SigningAlgorithm::Ecdsa),
            other => Err(SchemaError::Parse(format!(
                "sig-req 'signing' has unknown algorithm '{}', expected 'rsa' or 'ecdsa'",
                other
            ))),
        })
        .collect()
}

/// Parses an `any` block's single boolean body line: `true`/`yes` disables
/// rule checking for the whole schema session, `false`/`no` restores it.
fn parse_any_block(body: &[&str]) -> Result<bool> {
    let value = body.first().ok_or_else(|| SchemaError::Parse("'any' block has no value".to_string()))?;
    match *value {
        "true" | "yes" => Ok(true),
        "false" | "no" => Ok(false),
        other => Err(SchemaError::Parse(format!("'any' value '{}' is not 'true' or 'false'", other))),
    }
}

fn parse_yes_no(value: &str) -> Result<bool> {
    match value {
        "yes" => Ok(true),
        "no" => Ok(false),
        other => Err(SchemaError::Parse(format!("expected 'yes' or 'no', got '{}'", other))),
    }
}

/// Parses a `"<N><unit>"` duration such as `"1h"`, `"30m"`, `"45s"`. A
/// literal zero count (in any unit) falls back to `default_period`,
/// matching the interpreter's own default-refresh-period behavior.
fn parse_refresh_period(token: &str, default_period: Duration) -> Result<Duration> {
    let unit = token.chars().last().ok_or_else(|| {
        SchemaError::Parse("empty 'refresh' value".to_string())
    })?;
    let digits = &token[..token.len() - unit.len_utf8()];
    let count: i64 = digits
        .parse()
        .map_err(|_| SchemaError::Parse(format!("'refresh' value '{}' is not a number+unit", token)))?;
    if count == 0 {
        return Ok(default_period);
    }
    match unit {
        'h' => Ok(Duration::hours(count)),
        'm' => Ok(Duration::minutes(count)),
        's' => Ok(Duration::seconds(count)),
        other => Err(SchemaError::Parse(format!("unknown 'refresh' time unit '{}'", other))),
    }
}

fn resolve_relative(base_dir: &Path, value: &str) -> PathBuf {
    let candidate = Path::new(value);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    }
}

fn expect_field<'a>(lines: &mut impl Iterator<Item = &'a &'a str>, keyword: &str) -> Result<String> {
    let line = lines
        .next()
        .ok_or_else(|| SchemaError::Parse(format!("expected '{}' field, found end of block", keyword)))?;
    let (found_keyword, value) = split_once_word(line);
    if found_keyword != keyword {
        return Err(SchemaError::Parse(format!(
            "expected '{}' field, found '{}' (fields must appear in order)",
            keyword, found_keyword
        )));
    }
    Ok(value.to_string())
}

fn split_once_word(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim_start()),
        None => (line, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::Certificate;
    use crate::name::Name;
    use std::sync::Arc;

    struct FakeCert {
        name: Name,
    }
    impl crate::external::Signable for FakeCert {
        fn name(&self) -> &Name {
            &self.name
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

    struct FakeLoader;
    impl CertificateLoader for FakeLoader {
        fn load_from_file(&self, path: &Path) -> Result<Arc<dyn Certificate>> {
            Ok(Arc::new(FakeCert { name: Name::parse(&format!("/loaded{}", path.display())) }))
        }
        fn load_from_base64(&self, _blob: &str) -> Result<Arc<dyn Certificate>> {
            Ok(Arc::new(FakeCert { name: Name::parse("/embedded/KEY/1") }))
        }
    }

    #[test]
    fn parses_a_full_document() {
        let src = "
            rule
            id trusted-data
            pattern <ndn><blog><author><>*
            signer blog-key()
            end

            interest-rule
            id cmd
            pattern <ndn><blog>(<>*)<KEY><>
            signer owner($1)
            end

            anchor
            id root
            file root.cert
            refresh 1h
            end

            anchor
            id embedded
            base64 ZmFrZQ==
            end

            sig-req
            hash no
            signing rsa|ecdsa
            key-size 128
            end

            any
            false
            end
        ";
        let doc = parse_document(src, Path::new("/schemas"), &FakeLoader, Duration::hours(1), Utc::now())
            .unwrap();
        assert_eq!(doc.data_rules.len(), 1);
        assert_eq!(doc.interest_rules.len(), 1);
        assert_eq!(doc.static_anchors.len(), 1);
        assert_eq!(doc.dynamic_anchors.len(), 1);
        assert!(doc.sig_req.is_some());
        assert!(!doc.bypass);
    }

    #[test]
    fn an_any_true_block_sets_the_bypass_flag() {
        let src = "
            any
            true
            end
        ";
        let doc = parse_document(src, Path::new("/schemas"), &FakeLoader, Duration::hours(1), Utc::now())
            .unwrap();
        assert!(doc.bypass);
    }

    #[test]
    fn rejects_fields_out_of_order() {
        let src = "
            rule
            pattern <ndn>
            id trusted-data
            signer blog-key()
            end
        ";
        let loader = FakeLoader;
        assert!(parse_document(src, Path::new("/schemas"), &loader, Duration::hours(1), Utc::now())
            .is_err());
    }

    #[test]
    fn signing_field_accepts_a_single_algorithm() {
        let src = "
            sig-req
            hash yes
            signing rsa
            end
        ";
        let doc = parse_document(src, Path::new("/schemas"), &FakeLoader, Duration::hours(1), Utc::now())
            .unwrap();
        let sig_req = doc.sig_req.unwrap();
        assert!(sig_req.rsa_allowed());
        assert!(!sig_req.ecdsa_allowed());
    }

    #[test]
    fn zero_refresh_falls_back_to_default() {
        assert_eq!(parse_refresh_period("0h", Duration::seconds(3600)).unwrap(), Duration::seconds(3600));
        assert_eq!(parse_refresh_period("2h", Duration::seconds(3600)).unwrap(), Duration::hours(2));
    }
}
