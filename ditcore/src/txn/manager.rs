//! Transaction manager
//!
//! Coordinates transaction creation, commit, and abort across the server.
//! Integrates the conflict detector and the write-ahead log and owns the
//! process-wide singleton lifecycle (`init` / `shutdown`).

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::name::Dn;
use crate::txn::conflict::ConflictDetector;
use crate::txn::record::Transaction;
use crate::txn::scoped_set::SearchScope;
use crate::wal::{LogRecord, Lsn, ReplayedRecord, Wal};
use crate::{CoreError, Result};

// ============================================================================
// Identifiers
// ============================================================================

/// Unique transaction identifier, assigned at begin.
pub type TxnId = u64;

/// Logical point in commit order. Distinct from the transaction id so
/// read-only snapshots do not consume commit positions.
pub type SnapshotId = u64;

// ============================================================================
// Configuration
// ============================================================================

/// Transaction manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnConfig {
    /// Directory holding log segment files; created if absent.
    pub log_folder: PathBuf,
    /// In-memory log buffer size in bytes.
    pub log_buffer_size: usize,
    /// Segment rollover threshold in bytes.
    pub log_file_size: u64,
}

impl Default for TxnConfig {
    fn default() -> Self {
        Self {
            log_folder: PathBuf::from("txnlog"),
            log_buffer_size: 1 << 12,
            log_file_size: 1 << 13,
        }
    }
}

impl TxnConfig {
    /// Configuration with the given log folder and default sizes.
    pub fn new(log_folder: impl Into<PathBuf>) -> Self {
        Self {
            log_folder: log_folder.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Recovery summary
// ============================================================================

/// What replay reconstructed at startup.
#[derive(Debug, Clone)]
pub struct RecoveryInfo {
    /// Ids of durably committed transactions, in commit order.
    pub committed_txns: Vec<TxnId>,
    /// User-data payloads of committed transactions, in stream order.
    pub committed_user_data: Vec<(TxnId, Vec<u8>)>,
    /// First transaction id to hand out.
    pub next_txn_id: TxnId,
    /// First snapshot id to hand out.
    pub next_snapshot: SnapshotId,
}

impl RecoveryInfo {
    fn from_records(records: &[ReplayedRecord]) -> Self {
        let mut max_txn_id: TxnId = 0;
        let mut max_snapshot: SnapshotId = 0;
        let mut committed_txns = Vec::new();
        for replayed in records {
            max_txn_id = max_txn_id.max(replayed.record.txn_id());
            match &replayed.record {
                LogRecord::Begin { start_snap, .. } => {
                    max_snapshot = max_snapshot.max(*start_snap);
                }
                LogRecord::Commit { txn_id, commit_snap } => {
                    max_snapshot = max_snapshot.max(*commit_snap);
                    committed_txns.push(*txn_id);
                }
                _ => {}
            }
        }
        let committed: HashSet<TxnId> = committed_txns.iter().copied().collect();
        let committed_user_data = records
            .iter()
            .filter_map(|replayed| match &replayed.record {
                LogRecord::UserData { txn_id, data } if committed.contains(txn_id) => {
                    Some((*txn_id, data.clone()))
                }
                _ => None,
            })
            .collect();
        Self {
            committed_txns,
            committed_user_data,
            next_txn_id: max_txn_id + 1,
            next_snapshot: max_snapshot + 1,
        }
    }
}

// ============================================================================
// Per-caller current transaction
// ============================================================================

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// The calling thread's current transaction, per manager instance.
    static CURRENT_TXN: RefCell<HashMap<u64, TxnId>> = RefCell::new(HashMap::new());
}

// ============================================================================
// Transaction manager
// ============================================================================

struct ManagerState {
    /// Transactions still ACTIVE, keyed by id.
    active: BTreeMap<TxnId, Transaction>,
    /// COMMITTED transactions retained for conflict checks, in commit
    /// order.
    recent: Vec<Arc<Transaction>>,
}

/// Central transaction manager.
///
/// Lifecycle per transaction:
/// 1. begin: allocate id + start snapshot, log Begin (buffered)
/// 2. work: reads/writes recorded in the transaction's scoped sets
/// 3. commit: validate against recent committers, log Commit durably
/// 4. abort: log Abort, drop the record
///
/// Commits are serialized by `commit_lock`, which fixes both the commit
/// snapshot order and the order of Commit records in the log.
pub struct TxnManager {
    manager_id: u64,
    config: TxnConfig,
    state: Mutex<ManagerState>,
    wal: Mutex<Wal>,
    commit_lock: Mutex<()>,
    detector: ConflictDetector,
    /// Next transaction id to assign.
    next_txn_id: AtomicU64,
    /// Last assigned commit snapshot.
    last_snapshot: AtomicU64,
    /// Highest commit snapshot whose Commit record is durable. Begins
    /// read this one, so a transaction never starts "after" a commit
    /// that could still be lost.
    published_snapshot: AtomicU64,
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
    /// Set after a log failure; the manager then refuses new work.
    no_accept: AtomicBool,
    recovery: RecoveryInfo,
}

impl TxnManager {
    /// Open a manager against `config.log_folder`, replaying any existing
    /// log. In-flight transactions from a previous run are discarded by
    /// replay; counters resume past the highest recovered values.
    pub fn open(config: TxnConfig) -> Result<Self> {
        let (wal, records) = Wal::open(
            &config.log_folder,
            config.log_buffer_size,
            config.log_file_size,
        )?;
        let recovery = RecoveryInfo::from_records(&records);
        info!(
            folder = %config.log_folder.display(),
            committed = recovery.committed_txns.len(),
            next_txn_id = recovery.next_txn_id,
            next_snapshot = recovery.next_snapshot,
            "transaction manager opened"
        );
        Ok(Self {
            manager_id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            config,
            state: Mutex::new(ManagerState {
                active: BTreeMap::new(),
                recent: Vec::new(),
            }),
            wal: Mutex::new(wal),
            commit_lock: Mutex::new(()),
            detector: ConflictDetector::new(),
            next_txn_id: AtomicU64::new(recovery.next_txn_id),
            last_snapshot: AtomicU64::new(recovery.next_snapshot - 1),
            published_snapshot: AtomicU64::new(recovery.next_snapshot - 1),
            total_committed: AtomicU64::new(0),
            total_aborted: AtomicU64::new(0),
            no_accept: AtomicBool::new(false),
            recovery,
        })
    }

    /// The configuration the manager was opened with.
    pub fn config(&self) -> &TxnConfig {
        &self.config
    }

    /// What replay reconstructed when the manager was opened.
    pub fn recovery(&self) -> &RecoveryInfo {
        &self.recovery
    }

    // ========================================================================
    // Lifecycle, explicit handles
    // ========================================================================

    /// Begin a transaction, returning its handle. The caller owns the
    /// handle; nothing is registered on the calling thread.
    pub fn begin(&self, read_only: bool) -> Result<TxnId> {
        self.check_accepting()?;
        let id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let start_snapshot = self.published_snapshot.load(Ordering::SeqCst);
        let start_lsn = self.wal_append(&LogRecord::Begin {
            txn_id: id,
            start_snap: start_snapshot,
        })?;
        self.state
            .lock()
            .active
            .insert(id, Transaction::new(id, read_only, start_snapshot, start_lsn));
        debug!(txn = id, start_snapshot, read_only, "transaction begun");
        Ok(id)
    }

    /// Validate and commit. On conflict the transaction is aborted and
    /// [`CoreError::Conflict`] is returned; the caller may retry with a
    /// fresh transaction.
    pub fn commit(&self, id: TxnId) -> Result<()> {
        let _ordering = self.commit_lock.lock();

        let mut state = self.state.lock();
        let mut txn = state
            .active
            .remove(&id)
            .ok_or(CoreError::TxnNotFound(id))?;

        let commit_snapshot = self.last_snapshot.fetch_add(1, Ordering::SeqCst) + 1;

        // Read-only transactions hold no writes and their reads stay
        // valid under their snapshot, so validation is skipped.
        let conflicting = if txn.is_read_only() {
            None
        } else {
            state
                .recent
                .iter()
                .find(|other| self.detector.has_conflict(&txn, other))
                .map(|other| other.id())
        };

        if let Some(other_id) = conflicting {
            drop(state);
            self.abort_removed(&mut txn);
            debug!(txn = id, conflicting = other_id, "commit rejected on conflict");
            return Err(CoreError::Conflict(id, other_id));
        }
        drop(state);

        let end_lsn = match self.wal_append_durable(&LogRecord::Commit {
            txn_id: id,
            commit_snap: commit_snapshot,
        }) {
            Ok(lsn) => lsn,
            Err(err) => {
                // Durability is gone; the transaction counts as aborted
                // (no durable Commit record) and the manager stops
                // accepting work.
                self.total_aborted.fetch_add(1, Ordering::Relaxed);
                self.clear_cur_txn(id);
                return Err(err);
            }
        };

        txn.mark_committed(commit_snapshot, end_lsn);
        self.published_snapshot.store(commit_snapshot, Ordering::SeqCst);

        let mut state = self.state.lock();
        state.recent.push(Arc::new(txn));
        Self::prune_recent(&mut state);
        drop(state);

        self.total_committed.fetch_add(1, Ordering::Relaxed);
        self.clear_cur_txn(id);
        debug!(txn = id, commit_snapshot, "transaction committed");
        Ok(())
    }

    /// Abort a transaction and discard its record.
    pub fn abort(&self, id: TxnId) -> Result<()> {
        let mut txn = self
            .state
            .lock()
            .active
            .remove(&id)
            .ok_or(CoreError::TxnNotFound(id))?;
        self.abort_removed(&mut txn);
        debug!(txn = id, "transaction aborted");
        Ok(())
    }

    /// Abort bookkeeping for a record already removed from `active`.
    /// Abort records are buffered, not durable: an aborted transaction is
    /// already implicit in the absence of its Commit record.
    fn abort_removed(&self, txn: &mut Transaction) {
        let id = txn.id();
        match self.wal_append(&LogRecord::Abort { txn_id: id }) {
            Ok(lsn) => txn.mark_aborted(lsn),
            Err(_) => {
                // wal_append already poisoned the manager; the missing
                // Abort record is harmless for recovery.
            }
        }
        self.total_aborted.fetch_add(1, Ordering::Relaxed);
        self.clear_cur_txn(id);
    }

    // ========================================================================
    // Lifecycle, current-transaction registration
    // ========================================================================

    /// Begin a transaction and register it as the calling thread's
    /// current transaction. At most one ACTIVE transaction per caller.
    pub fn begin_transaction(&self, read_only: bool) -> Result<TxnId> {
        let occupied = CURRENT_TXN.with(|cur| cur.borrow().contains_key(&self.manager_id));
        if occupied {
            return Err(CoreError::NestedTxn);
        }
        let id = self.begin(read_only)?;
        CURRENT_TXN.with(|cur| cur.borrow_mut().insert(self.manager_id, id));
        Ok(id)
    }

    /// The calling thread's current transaction.
    pub fn cur_txn(&self) -> Result<TxnId> {
        CURRENT_TXN
            .with(|cur| cur.borrow().get(&self.manager_id).copied())
            .ok_or(CoreError::NoCurrentTxn)
    }

    /// Commit the calling thread's current transaction.
    pub fn commit_transaction(&self) -> Result<()> {
        let id = self.cur_txn()?;
        self.commit(id)
    }

    /// Abort the calling thread's current transaction.
    pub fn abort_transaction(&self) -> Result<()> {
        let id = self.cur_txn()?;
        self.abort(id)
    }

    fn clear_cur_txn(&self, id: TxnId) {
        CURRENT_TXN.with(|cur| {
            let mut map = cur.borrow_mut();
            if map.get(&self.manager_id) == Some(&id) {
                map.remove(&self.manager_id);
            }
        });
    }

    // ========================================================================
    // Read/write tracking and user data
    // ========================================================================

    /// Record a read of `(dn, scope)` in a transaction's read set.
    pub fn add_read(&self, id: TxnId, dn: &Dn, scope: SearchScope) -> Result<()> {
        self.with_txn(id, |txn| {
            txn.add_read(dn.clone(), scope);
            Ok(())
        })
    }

    /// Record a write of `(dn, scope)` in a transaction's write set.
    pub fn add_write(&self, id: TxnId, dn: &Dn, scope: SearchScope) -> Result<()> {
        self.with_txn(id, |txn| txn.add_write(dn.clone(), scope))
    }

    /// Append an opaque user-data record tied to a transaction
    /// (buffered).
    pub fn log_user_data(&self, id: TxnId, data: &[u8]) -> Result<Lsn> {
        if !self.state.lock().active.contains_key(&id) {
            return Err(CoreError::TxnNotFound(id));
        }
        self.wal_append(&LogRecord::UserData {
            txn_id: id,
            data: data.to_vec(),
        })
    }

    pub(crate) fn with_txn<F, R>(&self, id: TxnId, f: F) -> Result<R>
    where
        F: FnOnce(&mut Transaction) -> Result<R>,
    {
        let mut state = self.state.lock();
        let txn = state
            .active
            .get_mut(&id)
            .ok_or(CoreError::TxnNotFound(id))?;
        f(txn)
    }

    /// Run the conflict detector for one ACTIVE transaction against an
    /// ACTIVE or retained COMMITTED peer.
    pub fn has_conflict(&self, id: TxnId, other_id: TxnId) -> Result<bool> {
        let state = self.state.lock();
        let other: &Transaction = if let Some(txn) = state.active.get(&other_id) {
            txn
        } else if let Some(arc) = state.recent.iter().find(|txn| txn.id() == other_id) {
            arc
        } else {
            return Err(CoreError::TxnNotFound(other_id));
        };
        let txn = state
            .active
            .get(&id)
            .ok_or(CoreError::TxnNotFound(id))?;
        Ok(self.detector.has_conflict(txn, other))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn check_accepting(&self) -> Result<()> {
        if self.no_accept.load(Ordering::SeqCst) {
            Err(CoreError::NoAccept)
        } else {
            Ok(())
        }
    }

    fn wal_append(&self, record: &LogRecord) -> Result<Lsn> {
        self.wal.lock().append(record).map_err(|err| {
            self.no_accept.store(true, Ordering::SeqCst);
            error!(error = %err, "log append failed, refusing new transactions");
            err
        })
    }

    fn wal_append_durable(&self, record: &LogRecord) -> Result<Lsn> {
        self.wal.lock().append_durable(record).map_err(|err| {
            self.no_accept.store(true, Ordering::SeqCst);
            error!(error = %err, "durable log append failed, refusing new transactions");
            err
        })
    }

    /// Drop committed records no ACTIVE transaction can conflict with
    /// anymore.
    fn prune_recent(state: &mut ManagerState) {
        match state.active.values().map(Transaction::start_snapshot).min() {
            None => state.recent.clear(),
            Some(min_start) => state
                .recent
                .retain(|txn| txn.commit_snapshot().is_some_and(|snap| snap > min_start)),
        }
    }

    // ========================================================================
    // Monitoring
    // ========================================================================

    /// Number of ACTIVE transactions.
    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Number of committed transactions retained for conflict checks.
    pub fn recent_count(&self) -> usize {
        self.state.lock().recent.len()
    }

    pub fn total_committed(&self) -> u64 {
        self.total_committed.load(Ordering::Relaxed)
    }

    pub fn total_aborted(&self) -> u64 {
        self.total_aborted.load(Ordering::Relaxed)
    }

    /// Whether a transaction is still ACTIVE.
    pub fn is_active(&self, id: TxnId) -> bool {
        self.state.lock().active.contains_key(&id)
    }

    /// Flush and sync the log. Called by [`shutdown`]; also usable on a
    /// standalone instance before dropping it.
    pub fn close(&self) -> Result<()> {
        self.wal.lock().sync()
    }
}

// ============================================================================
// Global singleton lifecycle
// ============================================================================

static GLOBAL: Lazy<RwLock<Option<Arc<TxnManager>>>> = Lazy::new(|| RwLock::new(None));

/// Initialize the process-wide transaction manager.
pub fn init(config: TxnConfig) -> Result<Arc<TxnManager>> {
    let mut slot = GLOBAL.write();
    if slot.is_some() {
        return Err(CoreError::AlreadyInitialized);
    }
    let manager = Arc::new(TxnManager::open(config)?);
    *slot = Some(Arc::clone(&manager));
    Ok(manager)
}

/// The process-wide transaction manager.
pub fn txn_manager() -> Result<Arc<TxnManager>> {
    GLOBAL.read().clone().ok_or(CoreError::NotInitialized)
}

/// Tear down the process-wide manager, flushing the log.
pub fn shutdown() -> Result<()> {
    let manager = GLOBAL
        .write()
        .take()
        .ok_or(CoreError::NotInitialized)?;
    manager.close()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ENTRY: &str = "cn=test,ou=department,dc=example,dc=com";

    fn dn(s: &str) -> Dn {
        Dn::parse(s).unwrap()
    }

    fn open(dir: &std::path::Path) -> TxnManager {
        TxnManager::open(TxnConfig::new(dir)).unwrap()
    }

    #[test]
    fn test_begin_commit() {
        let dir = tempdir().unwrap();
        let mgr = open(dir.path());
        let id = mgr.begin(false).unwrap();

        assert!(mgr.is_active(id));
        assert_eq!(mgr.active_count(), 1);

        mgr.commit(id).unwrap();
        assert!(!mgr.is_active(id));
        assert_eq!(mgr.active_count(), 0);
        assert_eq!(mgr.total_committed(), 1);
    }

    #[test]
    fn test_begin_abort() {
        let dir = tempdir().unwrap();
        let mgr = open(dir.path());
        let id = mgr.begin(false).unwrap();
        mgr.add_write(id, &dn(ENTRY), SearchScope::Object).unwrap();

        mgr.abort(id).unwrap();
        assert_eq!(mgr.total_aborted(), 1);
        assert!(matches!(mgr.commit(id), Err(CoreError::TxnNotFound(_))));
    }

    #[test]
    fn test_current_txn_registration() {
        let dir = tempdir().unwrap();
        let mgr = open(dir.path());

        assert!(matches!(mgr.cur_txn(), Err(CoreError::NoCurrentTxn)));
        let id = mgr.begin_transaction(false).unwrap();
        assert_eq!(mgr.cur_txn().unwrap(), id);
        assert!(matches!(
            mgr.begin_transaction(false),
            Err(CoreError::NestedTxn)
        ));

        mgr.commit_transaction().unwrap();
        assert!(matches!(mgr.cur_txn(), Err(CoreError::NoCurrentTxn)));
    }

    #[test]
    fn test_write_write_conflict_detected() {
        let dir = tempdir().unwrap();
        let mgr = open(dir.path());

        // Both txns start before either commits
        let txn1 = mgr.begin(false).unwrap();
        let txn2 = mgr.begin(false).unwrap();

        mgr.add_write(txn1, &dn(ENTRY), SearchScope::Object).unwrap();
        mgr.add_write(txn2, &dn(ENTRY), SearchScope::Object).unwrap();

        mgr.commit(txn1).unwrap();

        match mgr.commit(txn2) {
            Err(CoreError::Conflict(id, other)) => {
                assert_eq!(id, txn2);
                assert_eq!(other, txn1);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(mgr.total_committed(), 1);
        assert_eq!(mgr.total_aborted(), 1);
    }

    #[test]
    fn test_non_conflicting_commits() {
        let dir = tempdir().unwrap();
        let mgr = open(dir.path());

        let txn1 = mgr.begin(false).unwrap();
        let txn2 = mgr.begin(false).unwrap();

        mgr.add_write(txn1, &dn(ENTRY), SearchScope::Object).unwrap();
        mgr.add_write(txn2, &dn("cn=other,ou=department,dc=example,dc=com"), SearchScope::Object)
            .unwrap();

        mgr.commit(txn1).unwrap();
        mgr.commit(txn2).unwrap();
        assert_eq!(mgr.total_committed(), 2);
    }

    #[test]
    fn test_sequential_txns_never_conflict() {
        let dir = tempdir().unwrap();
        let mgr = open(dir.path());

        let txn1 = mgr.begin(false).unwrap();
        mgr.add_write(txn1, &dn(ENTRY), SearchScope::Object).unwrap();
        mgr.commit(txn1).unwrap();

        // Begun after txn1's commit was durable: sees its effects
        let txn2 = mgr.begin(false).unwrap();
        mgr.add_write(txn2, &dn(ENTRY), SearchScope::Object).unwrap();
        mgr.commit(txn2).unwrap();
        assert_eq!(mgr.total_committed(), 2);
    }

    #[test]
    fn test_read_only_skips_validation() {
        let dir = tempdir().unwrap();
        let mgr = open(dir.path());

        let reader = mgr.begin(true).unwrap();
        let writer = mgr.begin(false).unwrap();

        mgr.add_read(reader, &dn(ENTRY), SearchScope::Subtree).unwrap();
        assert!(matches!(
            mgr.add_write(reader, &dn(ENTRY), SearchScope::Object),
            Err(CoreError::ReadOnlyTxn(_))
        ));

        mgr.add_write(writer, &dn(ENTRY), SearchScope::Object).unwrap();
        mgr.commit(writer).unwrap();

        // A read-write txn with the same read set would conflict here;
        // the read-only one commits cleanly.
        mgr.commit(reader).unwrap();
        assert_eq!(mgr.total_committed(), 2);
    }

    #[test]
    fn test_commit_snapshots_strictly_increase() {
        let dir = tempdir().unwrap();
        let mgr = open(dir.path());

        let mut last = 0;
        for _ in 0..5 {
            let id = mgr.begin(false).unwrap();
            mgr.commit(id).unwrap();
            let snap = mgr.published_snapshot.load(Ordering::SeqCst);
            assert!(snap > last);
            last = snap;
        }
    }

    #[test]
    fn test_has_conflict_direct() {
        let dir = tempdir().unwrap();
        let mgr = open(dir.path());

        let first = mgr.begin(false).unwrap();
        let checked = mgr.begin(false).unwrap();
        mgr.add_write(first, &dn(ENTRY), SearchScope::Object).unwrap();
        mgr.commit(first).unwrap();

        mgr.add_write(checked, &dn(ENTRY), SearchScope::Object).unwrap();
        assert!(mgr.has_conflict(checked, first).unwrap());

        let unrelated = mgr.begin(false).unwrap();
        mgr.add_read(unrelated, &dn(ENTRY), SearchScope::Object).unwrap();
        // Peer still ACTIVE: no conflict regardless of overlap
        assert!(!mgr.has_conflict(checked, unrelated).unwrap());
    }

    #[test]
    fn test_recent_pruned_when_no_active() {
        let dir = tempdir().unwrap();
        let mgr = open(dir.path());

        let id = mgr.begin(false).unwrap();
        mgr.add_write(id, &dn(ENTRY), SearchScope::Object).unwrap();
        mgr.commit(id).unwrap();
        assert_eq!(mgr.recent_count(), 0);

        // With a concurrent ACTIVE txn the committer is retained
        let holder = mgr.begin(false).unwrap();
        let writer = mgr.begin(false).unwrap();
        mgr.add_write(writer, &dn(ENTRY), SearchScope::Object).unwrap();
        mgr.commit(writer).unwrap();
        assert_eq!(mgr.recent_count(), 1);

        mgr.commit(holder).unwrap();
        assert_eq!(mgr.recent_count(), 0);
    }

    #[test]
    fn test_recovery_restores_counters() {
        let dir = tempdir().unwrap();
        {
            let mgr = open(dir.path());
            for _ in 0..3 {
                let id = mgr.begin(false).unwrap();
                mgr.commit(id).unwrap();
            }
            let aborted = mgr.begin(false).unwrap();
            mgr.abort(aborted).unwrap();
            mgr.close().unwrap();
        }

        let mgr = open(dir.path());
        let recovery = mgr.recovery();
        assert_eq!(recovery.committed_txns, vec![1, 2, 3]);
        assert_eq!(recovery.next_txn_id, 5);

        // New ids continue past recovered ones
        let id = mgr.begin(false).unwrap();
        assert_eq!(id, 5);
    }

    #[test]
    fn test_in_flight_txn_discarded_on_recovery() {
        let dir = tempdir().unwrap();
        {
            let mgr = open(dir.path());
            let committed = mgr.begin(false).unwrap();
            mgr.commit(committed).unwrap();
            // Left ACTIVE on purpose: a crash before commit
            let _in_flight = mgr.begin(false).unwrap();
            mgr.close().unwrap();
        }

        let mgr = open(dir.path());
        assert_eq!(mgr.recovery().committed_txns, vec![1]);
        assert_eq!(mgr.active_count(), 0);
        assert_eq!(mgr.recovery().next_txn_id, 3);
    }

    #[test]
    fn test_global_lifecycle() {
        let dir = tempdir().unwrap();
        assert!(matches!(txn_manager(), Err(CoreError::NotInitialized)));

        let mgr = init(TxnConfig::new(dir.path().join("global"))).unwrap();
        assert!(matches!(
            init(TxnConfig::new(dir.path().join("other"))),
            Err(CoreError::AlreadyInitialized)
        ));
        let same = txn_manager().unwrap();
        assert_eq!(Arc::as_ptr(&mgr), Arc::as_ptr(&same));

        shutdown().unwrap();
        assert!(matches!(txn_manager(), Err(CoreError::NotInitialized)));
    }
}
