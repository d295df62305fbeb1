//! Transaction log manager façade
//!
//! The narrow surface operation handlers see: record reads and writes of
//! scoped DN regions into the calling thread's current transaction, and
//! append opaque user data to the log under that transaction.

use std::sync::Arc;

use crate::name::Dn;
use crate::txn::manager::TxnManager;
use crate::txn::op::OpKind;
use crate::txn::scoped_set::SearchScope;
use crate::wal::Lsn;
use crate::Result;

/// Handler-facing façade over [`TxnManager`].
///
/// Every call resolves the calling thread's current transaction and
/// fails with [`crate::CoreError::NoCurrentTxn`] if there is none.
#[derive(Clone)]
pub struct TxnLogManager {
    manager: Arc<TxnManager>,
}

impl TxnLogManager {
    pub fn new(manager: Arc<TxnManager>) -> Self {
        Self { manager }
    }

    /// Record that the current transaction read the region `(dn, scope)`.
    /// Idempotent.
    pub fn add_read(&self, dn: &Dn, scope: SearchScope) -> Result<()> {
        let id = self.manager.cur_txn()?;
        self.manager.add_read(id, dn, scope)
    }

    /// Record that the current transaction will change the region
    /// `(dn, scope)`. Fails with [`crate::CoreError::ReadOnlyTxn`] on a
    /// read-only transaction.
    pub fn add_write(&self, dn: &Dn, scope: SearchScope) -> Result<()> {
        let id = self.manager.cur_txn()?;
        self.manager.add_write(id, dn, scope)
    }

    /// Record an operation's whole conflict footprint at once.
    pub fn track(&self, op: &OpKind) -> Result<()> {
        let id = self.manager.cur_txn()?;
        for (dn, scope) in op.reads() {
            self.manager.add_read(id, &dn, scope)?;
        }
        for (dn, scope) in op.writes() {
            self.manager.add_write(id, &dn, scope)?;
        }
        Ok(())
    }

    /// Append an opaque user-data record tied to the current transaction.
    /// Buffered; durability follows the transaction's commit.
    pub fn log_user_data(&self, data: &[u8]) -> Result<Lsn> {
        let id = self.manager.cur_txn()?;
        self.manager.log_user_data(id, data)
    }

    /// The manager behind this façade.
    pub fn manager(&self) -> &Arc<TxnManager> {
        &self.manager
    }
}

// ============================================================================
// Tests
// ============================================================================
