//! Operation kinds
//!
//! Operation handlers describe what they are about to do as a tagged
//! variant carrying only what conflict tracking needs: the target DN and
//! the effective scope of the change. The mapping to scoped read/write
//! entries lives here so handlers never touch the sets directly.

use crate::name::Dn;
use crate::txn::scoped_set::SearchScope;

/// A directory operation reduced to its conflict-tracking footprint.
#[derive(Debug, Clone)]
pub enum OpKind {
    /// Create an entry.
    Add { dn: Dn },
    /// Change an entry's attributes.
    Modify { dn: Dn },
    /// Remove a leaf entry.
    Delete { dn: Dn },
    /// Move or rename an entry and everything under it.
    ModifyDn { dn: Dn, new_dn: Dn },
    /// Search from a base with a scope.
    Search { base: Dn, scope: SearchScope },
    /// Authenticate against an entry.
    Bind { dn: Dn },
}

impl OpKind {
    /// Regions this operation reads.
    pub fn reads(&self) -> Vec<(Dn, SearchScope)> {
        match self {
            OpKind::Search { base, scope } => vec![(base.clone(), *scope)],
            OpKind::Bind { dn } => vec![(dn.clone(), SearchScope::Object)],
            _ => Vec::new(),
        }
    }

    /// Regions this operation writes.
    pub fn writes(&self) -> Vec<(Dn, SearchScope)> {
        match self {
            OpKind::Add { dn } | OpKind::Modify { dn } | OpKind::Delete { dn } => {
                vec![(dn.clone(), SearchScope::Object)]
            }
            // A move touches both subtrees wholesale
            OpKind::ModifyDn { dn, new_dn } => vec![
                (dn.clone(), SearchScope::Subtree),
                (new_dn.clone(), SearchScope::Subtree),
            ],
            OpKind::Search { .. } | OpKind::Bind { .. } => Vec::new(),
        }
    }
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
    fn test_write_ops() {
        let target = dn("cn=test,dc=example,dc=com");
        for op in [
            OpKind::Add { dn: target.clone() },
            OpKind::Modify { dn: target.clone() },
            OpKind::Delete { dn: target.clone() },
        ] {
            assert!(op.reads().is_empty());
            assert_eq!(op.writes(), vec![(target.clone(), SearchScope::Object)]);
        }
    }

    #[test]
    fn test_modify_dn_covers_both_subtrees() {
        let op = OpKind::ModifyDn {
            dn: dn("ou=old,dc=example,dc=com"),
            new_dn: dn("ou=new,dc=example,dc=com"),
        };
        let writes = op.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|(_, scope)| *scope == SearchScope::Subtree));
    }

    #[test]
    fn test_read_ops() {
        let search = OpKind::Search {
            base: dn("ou=people,dc=example,dc=com"),
            scope: SearchScope::OneLevel,
        };
        assert!(search.writes().is_empty());
        assert_eq!(search.reads().len(), 1);

        let bind = OpKind::Bind { dn: dn("cn=admin,dc=example,dc=com") };
        assert_eq!(bind.reads(), vec![(dn("cn=admin,dc=example,dc=com"), SearchScope::Object)]);
        assert!(bind.writes().is_empty());
    }
}
