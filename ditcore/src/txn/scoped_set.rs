//! Scoped DN sets
//!
//! A [`ScopedSet`] records which regions of the name tree a transaction
//! has touched, as `(DN, scope)` pairs. Two sets intersect when any pair
//! of entries denotes overlapping point sets; that predicate is what the
//! conflict detector runs at commit time.

use std::io;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::name::Dn;

// ============================================================================
// Search scope
// ============================================================================

/// Region selector relative to a base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SearchScope {
    /// The base entry only.
    Object = 0,
    /// The base entry and its immediate children. Enumerating children
    /// reads the base, so the base is part of the region.
    OneLevel = 1,
    /// The base entry and all descendants.
    Subtree = 2,
}

impl SearchScope {
    fn mask(self) -> u8 {
        1 << self as u8
    }

    const ALL: [SearchScope; 3] = [SearchScope::Object, SearchScope::OneLevel, SearchScope::Subtree];
}

impl TryFrom<u8> for SearchScope {
    type Error = io::Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(SearchScope::Object),
            1 => Ok(SearchScope::OneLevel),
            2 => Ok(SearchScope::Subtree),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid search scope {value}"),
            )),
        }
    }
}

// ============================================================================
// Scoped entry
// ============================================================================

/// One `(DN, scope)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedEntry {
    pub dn: Dn,
    pub scope: SearchScope,
}

/// Whether two scoped entries denote intersecting regions of the tree.
///
/// Symmetric by construction; the cross-scope rows delegate to a single
/// ordering of the pair.
pub fn entries_match(l_dn: &Dn, l_scope: SearchScope, r_dn: &Dn, r_scope: SearchScope) -> bool {
    use SearchScope::*;
    match (l_scope, r_scope) {
        (Object, Object) => l_dn == r_dn,
        (Object, OneLevel) => object_vs_onelevel(l_dn, r_dn),
        (OneLevel, Object) => object_vs_onelevel(r_dn, l_dn),
        (Object, Subtree) => r_dn.is_ancestor_or_equal(l_dn),
        (Subtree, Object) => l_dn.is_ancestor_or_equal(r_dn),
        (OneLevel, OneLevel) => {
            l_dn == r_dn || l_dn.is_immediate_parent_of(r_dn) || r_dn.is_immediate_parent_of(l_dn)
        }
        (OneLevel, Subtree) => onelevel_vs_subtree(l_dn, r_dn),
        (Subtree, OneLevel) => onelevel_vs_subtree(r_dn, l_dn),
        (Subtree, Subtree) => l_dn.is_ancestor_or_equal(r_dn) || r_dn.is_ancestor_or_equal(l_dn),
    }
}

fn object_vs_onelevel(object: &Dn, base: &Dn) -> bool {
    object == base || base.is_immediate_parent_of(object)
}

fn onelevel_vs_subtree(base: &Dn, root: &Dn) -> bool {
    root.is_ancestor_or_equal(base) || base.is_immediate_parent_of(root)
}

// ============================================================================
// Scoped set
// ============================================================================

/// Set of scoped entries, indexed by normalized DN with a scope bitmask
/// per DN. `add` is idempotent and O(1) amortized.
///
/// Once the owning transaction leaves ACTIVE the set is frozen and may be
/// read without synchronization.
#[derive(Debug, Clone, Default)]
pub struct ScopedSet {
    entries: AHashMap<Dn, u8>,
}

impl ScopedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Re-inserting an existing `(dn, scope)` pair is a
    /// no-op.
    pub fn add(&mut self, dn: Dn, scope: SearchScope) {
        *self.entries.entry(dn).or_insert(0) |= scope.mask();
    }

    /// Whether the exact `(dn, scope)` pair is present.
    pub fn contains(&self, dn: &Dn, scope: SearchScope) -> bool {
        self.entries
            .get(dn)
            .is_some_and(|mask| mask & scope.mask() != 0)
    }

    /// Number of `(dn, scope)` pairs.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .map(|mask| mask.count_ones() as usize)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate all `(dn, scope)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Dn, SearchScope)> + '_ {
        self.entries.iter().flat_map(|(dn, mask)| {
            SearchScope::ALL
                .into_iter()
                .filter(move |s| mask & s.mask() != 0)
                .map(move |s| (dn, s))
        })
    }

    /// Whether any entry of `self` denotes a region overlapping any entry
    /// of `other`. Symmetric.
    pub fn intersects(&self, other: &ScopedSet) -> bool {
        // Scan the smaller side against the other; sets are typically a
        // handful of entries so the pairwise walk stays cheap.
        let (a, b) = if self.entries.len() <= other.entries.len() {
            (self, other)
        } else {
            (other, self)
        };
        a.iter()
            .any(|(dn, scope)| b.iter().any(|(o_dn, o_scope)| entries_match(dn, scope, o_dn, o_scope)))
    }
}

// ============================================================================
// Tests
// ============================================================================
