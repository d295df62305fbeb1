//! Distinguished names
//!
//! A [`Dn`] is an ordered sequence of relative distinguished names where
//! index 0 is the leaf entry and the last index is the root suffix
//! component. All parsing normalizes attribute types and values up front,
//! so equality, hashing and the hierarchy relations below operate on
//! normalized form only. `Display` output round-trips through [`Dn::parse`].

use std::fmt;
use std::str::FromStr;

use crate::name::normalizer::{normalize_attribute_type, normalize_value};
use crate::{CoreError, Result};

// ============================================================================
// Attribute/value assertion
// ============================================================================

/// One `attr=value` assertion inside an RDN, stored in normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ava {
    attr: String,
    value: String,
}

impl Ava {
    fn new(attr: &str, raw_value: &str) -> Result<Self> {
        let attr = normalize_attribute_type(attr);
        if attr.is_empty() {
            return Err(CoreError::InvalidSyntax("empty attribute type".into()));
        }
        if !attr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        {
            return Err(CoreError::InvalidSyntax(format!(
                "invalid attribute type '{attr}'"
            )));
        }
        let value = normalize_value(&attr, &unescape_value(raw_value)?);
        Ok(Self { attr, value })
    }

    /// Normalized attribute type.
    pub fn attr(&self) -> &str {
        &self.attr
    }

    /// Normalized attribute value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Ava {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attr, escape_value(&self.value))
    }
}

// ============================================================================
// Relative distinguished name
// ============================================================================

/// One component of a DN. Multi-valued RDNs (`cn=a+sn=b`) hold their AVAs
/// sorted so the normalized form is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rdn {
    avas: Vec<Ava>,
}

impl Rdn {
    fn parse(component: &str) -> Result<Self> {
        let mut avas = Vec::new();
        for part in split_unescaped(component, '+') {
            let part = part.trim();
            if part.is_empty() {
                return Err(CoreError::InvalidSyntax(format!(
                    "empty assertion in RDN '{component}'"
                )));
            }
            let eq = find_unescaped(part, '=').ok_or_else(|| {
                CoreError::InvalidSyntax(format!("missing '=' in RDN '{component}'"))
            })?;
            avas.push(Ava::new(&part[..eq], &part[eq + 1..])?);
        }
        if avas.is_empty() {
            return Err(CoreError::InvalidSyntax("empty RDN".into()));
        }
        avas.sort();
        avas.dedup();
        Ok(Self { avas })
    }

    /// The assertions of this RDN, in canonical order.
    pub fn avas(&self) -> &[Ava] {
        &self.avas
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ava) in self.avas.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{ava}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Distinguished name
// ============================================================================

/// A normalized distinguished name. Index 0 of the RDN sequence is the
/// leaf; the last index is the root suffix component. The empty sequence
/// is the root DN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Dn {
    rdns: Vec<Rdn>,
}

impl Dn {
    /// The empty root DN.
    pub fn root() -> Self {
        Self { rdns: Vec::new() }
    }

    /// Parse and normalize a DN string. The empty string is the root DN.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::root());
        }
        let mut rdns = Vec::new();
        for component in split_unescaped(text, ',') {
            rdns.push(Rdn::parse(component)?);
        }
        Ok(Self { rdns })
    }

    /// Whether this is the root DN.
    pub fn is_root(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Number of RDN levels.
    pub fn level(&self) -> usize {
        self.rdns.len()
    }

    /// The leaf RDN, if any.
    pub fn rdn(&self) -> Option<&Rdn> {
        self.rdns.first()
    }

    /// All RDNs, leaf first.
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The DN one level up, or `None` for the root DN.
    pub fn parent(&self) -> Option<Dn> {
        if self.rdns.is_empty() {
            None
        } else {
            Some(Dn {
                rdns: self.rdns[1..].to_vec(),
            })
        }
    }

    /// Whether `self` is a proper ancestor of `other`: the RDN sequence of
    /// `self` is a proper suffix of `other`'s.
    pub fn is_ancestor_of(&self, other: &Dn) -> bool {
        self.level() < other.level() && other.rdns[other.level() - self.level()..] == self.rdns
    }

    /// Ancestor relation, equality included.
    pub fn is_ancestor_or_equal(&self, other: &Dn) -> bool {
        self == other || self.is_ancestor_of(other)
    }

    /// Whether `self` is exactly one level above `other`.
    pub fn is_immediate_parent_of(&self, other: &Dn) -> bool {
        other.level() == self.level() + 1 && self.is_ancestor_of(other)
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{rdn}")?;
        }
        Ok(())
    }
}

impl FromStr for Dn {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Dn::parse(s)
    }
}

// ============================================================================
// Escaping
// ============================================================================

/// Split on a separator, ignoring separators preceded by a backslash.
fn split_unescaped(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == sep {
            parts.push(&text[start..i]);
            start = i + ch.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Position of the first unescaped occurrence of `sep`.
fn find_unescaped(text: &str, sep: char) -> Option<usize> {
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == sep {
            return Some(i);
        }
    }
    None
}

/// Resolve RFC 4514 backslash escapes and trim unescaped outer spaces.
fn unescape_value(raw: &str) -> Result<String> {
    // Each byte carries a flag telling whether it was produced by an
    // escape, so only unescaped outer spaces are trimmed afterwards.
    let mut bytes: Vec<(u8, bool)> = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            for b in ch.encode_utf8(&mut buf).bytes() {
                bytes.push((b, false));
            }
            continue;
        }
        let next = chars
            .next()
            .ok_or_else(|| CoreError::InvalidSyntax(format!("dangling escape in '{raw}'")))?;
        if next.is_ascii_hexdigit() {
            let second = chars.next().filter(|c| c.is_ascii_hexdigit()).ok_or_else(|| {
                CoreError::InvalidSyntax(format!("invalid hex escape in '{raw}'"))
            })?;
            let hi = next.to_digit(16).unwrap() as u8;
            let lo = second.to_digit(16).unwrap() as u8;
            bytes.push((hi << 4 | lo, true));
        } else if matches!(next, ' ' | '#' | '"' | '+' | ',' | ';' | '<' | '>' | '=' | '\\') {
            bytes.push((next as u8, true));
        } else {
            return Err(CoreError::InvalidSyntax(format!(
                "invalid escape '\\{next}' in '{raw}'"
            )));
        }
    }
    while matches!(bytes.first(), Some((b' ', false))) {
        bytes.remove(0);
    }
    while matches!(bytes.last(), Some((b' ', false))) {
        bytes.pop();
    }
    String::from_utf8(bytes.into_iter().map(|(b, _)| b).collect())
        .map_err(|_| CoreError::InvalidSyntax(format!("invalid UTF-8 in '{raw}'")))
}

/// Re-apply the escapes needed for the value to survive a round trip.
fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, ch) in value.char_indices() {
        let leading = i == 0 && (ch == ' ' || ch == '#');
        let trailing = ch == ' ' && i + ch.len_utf8() == value.len();
        if leading || trailing || matches!(ch, '"' | '+' | ',' | ';' | '<' | '>' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dn(s: &str) -> Dn {
        Dn::parse(s).unwrap()
    }

    #[test]
    fn test_parse_and_normalize() {
        let a = dn("CN=Test, OU=Department, DC=Example, DC=Com");
        let b = dn("cn=test,ou=department,dc=example,dc=com");
        assert_eq!(a, b);
        assert_eq!(a.level(), 4);
        assert_eq!(a.to_string(), "cn=test,ou=department,dc=example,dc=com");
    }

    #[test]
    fn test_display_round_trip() {
        for text in [
            "cn=test,ou=department,dc=example,dc=com",
            "cn=a\\,b,dc=example",
            "cn=first last,dc=example",
            "uid=x+cn=y,dc=example",
            "",
        ] {
            let parsed = dn(text);
            assert_eq!(dn(&parsed.to_string()), parsed);
        }
    }

    #[test]
    fn test_escapes() {
        let d = dn("cn=Smith\\, John,dc=example,dc=com");
        assert_eq!(d.level(), 3);
        assert_eq!(d.rdn().unwrap().avas()[0].value(), "smith, john");

        let hex = dn("cn=ab\\2Ccd,dc=example");
        assert_eq!(hex.rdn().unwrap().avas()[0].value(), "ab,cd");
    }

    #[test]
    fn test_multi_valued_rdn_canonical_order() {
        assert_eq!(dn("uid=x+cn=y,dc=example"), dn("cn=Y+uid=X,dc=example"));
    }

    #[test]
    fn test_invalid_syntax() {
        assert!(Dn::parse("cn=a,,dc=b").is_err());
        assert!(Dn::parse("noequals,dc=b").is_err());
        assert!(Dn::parse("=value,dc=b").is_err());
        assert!(Dn::parse("cn=a\\").is_err());
        assert!(Dn::parse("cn=a\\2").is_err());
        assert!(Dn::parse("cn=a\\x").is_err());
    }

    #[test]
    fn test_ancestor_relations() {
        let child = dn("cn=test,ou=department,dc=example,dc=com");
        let parent = dn("ou=department,dc=example,dc=com");
        let suffix = dn("dc=example,dc=com");
        let other = dn("ou=people,dc=example,dc=com");

        assert!(parent.is_ancestor_of(&child));
        assert!(suffix.is_ancestor_of(&child));
        assert!(!other.is_ancestor_of(&child));
        assert!(!child.is_ancestor_of(&child));
        assert!(child.is_ancestor_or_equal(&child));

        assert!(parent.is_immediate_parent_of(&child));
        assert!(!suffix.is_immediate_parent_of(&child));

        assert_eq!(child.parent().unwrap(), parent);
        assert_eq!(dn("dc=com").parent().unwrap(), Dn::root());
        assert!(Dn::root().parent().is_none());
    }

    #[test]
    fn test_ancestor_asymmetry() {
        // isAncestorOf(a, b) implies neither the reverse nor equality
        let pairs = [
            ("dc=com", "dc=example,dc=com"),
            ("ou=a,dc=com", "cn=x,ou=a,dc=com"),
            ("", "dc=com"),
        ];
        for (a, b) in pairs {
            let (a, b) = (dn(a), dn(b));
            assert!(a.is_ancestor_of(&b));
            assert!(!b.is_ancestor_of(&a));
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_root_is_ancestor_of_all() {
        assert!(Dn::root().is_ancestor_of(&dn("dc=com")));
        assert!(Dn::root().is_immediate_parent_of(&dn("dc=com")));
        assert!(!Dn::root().is_ancestor_of(&Dn::root()));
    }

    #[test]
    fn test_normalization_idempotent() {
        let once = dn("CN=First  Last,OU=Dept,DC=Example,DC=Com");
        let twice = dn(&once.to_string());
        assert_eq!(once, twice);
        assert_eq!(once.to_string(), twice.to_string());
    }
}
