//! Transaction core
//!
//! Snapshot-isolation concurrency control over a hierarchical namespace.
//!
//! Architecture:
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              TxnManager                          │
//! │  - Creates and tracks active transactions        │
//! │  - Assigns monotonic txn ids and snapshots       │
//! │  - Serializes commits, drives the log            │
//! ├──────────────────────────────────────────────────┤
//! │  Transaction                                     │
//! │  - Per-transaction scoped read/write sets        │
//! │  - Frozen once committed or aborted              │
//! ├──────────────────────────────────────────────────┤
//! │  ConflictDetector                                │
//! │  - Validates against recent committers           │
//! │  - Scope-aware overlap on the name tree          │
//! │  - First-committer-wins                          │
//! ├──────────────────────────────────────────────────┤
//! │  TxnLogManager                                   │
//! │  - Handler façade: addRead / addWrite /          │
//! │    logUserData against the current txn           │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod conflict;
pub mod log_manager;
pub mod manager;
pub mod op;
pub mod record;
pub mod scoped_set;

pub use conflict::ConflictDetector;
pub use log_manager::TxnLogManager;
pub use manager::{
    init, shutdown, txn_manager, RecoveryInfo, SnapshotId, TxnConfig, TxnId, TxnManager,
};
pub use op::OpKind;
pub use record::{Transaction, TxnState};
pub use scoped_set::{ScopedEntry, ScopedSet, SearchScope};
