//! Attribute value normalization
//!
//! Maps attribute types to syntax-specific normalizers so that two DNs
//! written with different casing or spacing compare equal. Attributes with
//! a known case-ignore syntax get deep-trim-to-lower; telephone numbers
//! additionally drop separators; anything unknown falls back to plain
//! case folding.

/// Attribute types whose syntax is case-ignore with insignificant spaces.
const CASE_IGNORE_ATTRIBUTES: &[&str] = &[
    "c",
    "cn",
    "dc",
    "description",
    "gn",
    "l",
    "o",
    "ou",
    "sn",
    "st",
    "street",
    "uid",
];

/// Normalize an attribute type: ASCII lowercase, surrounding space removed.
pub fn normalize_attribute_type(attr: &str) -> String {
    attr.trim().to_ascii_lowercase()
}

/// Normalize an attribute value according to the attribute's syntax.
///
/// `attr` must already be in normalized form (see
/// [`normalize_attribute_type`]).
pub fn normalize_value(attr: &str, value: &str) -> String {
    if attr == "telephonenumber" {
        telephone_number(value)
    } else if CASE_IGNORE_ATTRIBUTES.contains(&attr) {
        deep_trim_to_lower(value)
    } else {
        // Unknown syntax: case-insensitive byte comparison.
        value.to_ascii_lowercase()
    }
}

/// Trim, collapse internal whitespace runs to a single space, lowercase.
fn deep_trim_to_lower(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_space = false;
    for ch in value.trim().chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
    }
    out
}

/// Telephone numbers compare with spaces and hyphens ignored.
fn telephone_number(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

// ============================================================================
// Tests
// ============================================================================
