//! Transaction records
//!
//! One [`Transaction`] per begin call. The record is mutated only by the
//! owning caller while ACTIVE; once it transitions to a terminal state it
//! is frozen, and the manager shares it read-only for conflict checks.

use crate::name::Dn;
use crate::txn::manager::{SnapshotId, TxnId};
use crate::txn::scoped_set::{ScopedSet, SearchScope};
use crate::wal::Lsn;
use crate::{CoreError, Result};

/// Lifecycle state. COMMITTED and ABORTED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Committed,
    Aborted,
}

/// Per-transaction state: identity, snapshots, scoped read/write sets and
/// the transaction's span in the log.
#[derive(Debug)]
pub struct Transaction {
    id: TxnId,
    state: TxnState,
    read_only: bool,
    start_snapshot: SnapshotId,
    commit_snapshot: Option<SnapshotId>,
    read_set: ScopedSet,
    write_set: ScopedSet,
    start_lsn: Lsn,
    end_lsn: Option<Lsn>,
}

impl Transaction {
    pub(crate) fn new(id: TxnId, read_only: bool, start_snapshot: SnapshotId, start_lsn: Lsn) -> Self {
        Self {
            id,
            state: TxnState::Active,
            read_only,
            start_snapshot,
            commit_snapshot: None,
            read_set: ScopedSet::new(),
            write_set: ScopedSet::new(),
            start_lsn,
            end_lsn: None,
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Snapshot the transaction reads against.
    pub fn start_snapshot(&self) -> SnapshotId {
        self.start_snapshot
    }

    /// Commit snapshot, set once the transaction commits.
    pub fn commit_snapshot(&self) -> Option<SnapshotId> {
        self.commit_snapshot
    }

    pub fn read_set(&self) -> &ScopedSet {
        &self.read_set
    }

    pub fn write_set(&self) -> &ScopedSet {
        &self.write_set
    }

    pub fn has_writes(&self) -> bool {
        !self.write_set.is_empty()
    }

    /// LSNs of the transaction's Begin record and terminal record.
    pub fn log_span(&self) -> (Lsn, Option<Lsn>) {
        (self.start_lsn, self.end_lsn)
    }

    // ========================================================================
    // Mutation (owning caller, ACTIVE only)
    // ========================================================================

    pub(crate) fn add_read(&mut self, dn: Dn, scope: SearchScope) {
        debug_assert_eq!(self.state, TxnState::Active);
        self.read_set.add(dn, scope);
    }

    pub(crate) fn add_write(&mut self, dn: Dn, scope: SearchScope) -> Result<()> {
        debug_assert_eq!(self.state, TxnState::Active);
        if self.read_only {
            return Err(CoreError::ReadOnlyTxn(self.id));
        }
        self.write_set.add(dn, scope);
        Ok(())
    }

    pub(crate) fn mark_committed(&mut self, commit_snapshot: SnapshotId, end_lsn: Lsn) {
        debug_assert_eq!(self.state, TxnState::Active);
        self.state = TxnState::Committed;
        self.commit_snapshot = Some(commit_snapshot);
        self.end_lsn = Some(end_lsn);
    }

    pub(crate) fn mark_aborted(&mut self, end_lsn: Lsn) {
        debug_assert_eq!(self.state, TxnState::Active);
        self.state = TxnState::Aborted;
        self.end_lsn = Some(end_lsn);
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
    fn test_read_only_rejects_writes() {
        let mut txn = Transaction::new(1, true, 10, 0);
        txn.add_read(dn("cn=a,dc=example"), SearchScope::Object);
        assert!(matches!(
            txn.add_write(dn("cn=a,dc=example"), SearchScope::Object),
            Err(CoreError::ReadOnlyTxn(1))
        ));
        assert_eq!(txn.read_set().len(), 1);
        assert!(txn.write_set().is_empty());
    }

    #[test]
    fn test_add_read_idempotent() {
        let mut txn = Transaction::new(1, false, 10, 0);
        txn.add_read(dn("cn=a,dc=example"), SearchScope::Subtree);
        txn.add_read(dn("cn=a,dc=example"), SearchScope::Subtree);
        assert_eq!(txn.read_set().len(), 1);
    }

    #[test]
    fn test_terminal_transitions() {
        let mut txn = Transaction::new(3, false, 10, 42);
        txn.add_write(dn("cn=a,dc=example"), SearchScope::Object).unwrap();
        txn.mark_committed(11, 99);
        assert_eq!(txn.state(), TxnState::Committed);
        assert_eq!(txn.commit_snapshot(), Some(11));
        assert_eq!(txn.log_span(), (42, Some(99)));

        let mut txn = Transaction::new(4, false, 10, 0);
        txn.mark_aborted(55);
        assert_eq!(txn.state(), TxnState::Aborted);
        assert_eq!(txn.commit_snapshot(), None);
    }
}
