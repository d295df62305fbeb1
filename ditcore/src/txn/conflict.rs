//! Conflict detection
//!
//! Snapshot-isolation validation run at commit time. A committing
//! transaction is checked against every recently committed peer; a peer
//! induces a conflict only when it committed after the committer's start
//! snapshot and its write set overlaps the committer's read or write set.

use crate::txn::record::{Transaction, TxnState};

/// Commit-time validation policy.
///
/// Write-write and read-write overlaps on any scoped region abort the
/// later committer; read-read overlaps and writes that committed before
/// the checked transaction began are permitted.
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn new() -> Self {
        Self
    }

    /// Whether `txn` conflicts with `other`.
    ///
    /// Asymmetric while `txn` is still committing: only COMMITTED peers
    /// can be conflicted with, and peers that committed before `txn`
    /// began are already visible to it.
    pub fn has_conflict(&self, txn: &Transaction, other: &Transaction) -> bool {
        if other.state() != TxnState::Committed {
            return false;
        }
        let Some(commit_snapshot) = other.commit_snapshot() else {
            return false;
        };
        if commit_snapshot <= txn.start_snapshot() {
            return false;
        }
        if other.write_set().is_empty() {
            return false;
        }
        txn.write_set().intersects(other.write_set())
            || txn.read_set().intersects(other.write_set())
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
