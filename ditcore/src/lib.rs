//! ditcore — transactional core of a directory server
//!
//! Tracks the scoped regions of the directory information tree each
//! transaction reads and writes, decides at commit time whether
//! concurrent transactions conflict, and makes committed state durable
//! through a segmented write-ahead log.

pub mod name;
pub mod txn;
pub mod wal;

// Re-export main types
pub use name::{Dn, Rdn};
pub use txn::{
    ConflictDetector, OpKind, ScopedSet, SearchScope, TxnConfig, TxnId, TxnLogManager,
    TxnManager, TxnState,
};
pub use wal::{LogRecord, Lsn};

/// Core error type.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid DN syntax: {0}")]
    InvalidSyntax(String),

    #[error("no transaction is bound to the current caller")]
    NoCurrentTxn,

    #[error("transaction {0} is read-only")]
    ReadOnlyTxn(TxnId),

    #[error("transaction {0} conflicts with committed transaction {1}")]
    Conflict(TxnId, TxnId),

    #[error("invalid log: {0}")]
    InvalidLog(String),

    #[error("a transaction is already active for this caller")]
    NestedTxn,

    #[error("transaction {0} not found")]
    TxnNotFound(TxnId),

    #[error("transaction manager is not initialized")]
    NotInitialized,

    #[error("transaction manager is already initialized")]
    AlreadyInitialized,

    #[error("transaction manager refuses new work after a log failure")]
    NoAccept,
}

pub type Result<T> = std::result::Result<T, CoreError>;
