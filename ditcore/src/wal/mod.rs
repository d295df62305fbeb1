//! Write-ahead log
//!
//! Append-only segmented log recording transaction lifecycle and opaque
//! user data. Layout on disk:
//!
//! ```text
//! <log_folder>/
//!   LOCK         advisory lock, one writer per folder
//!   log_0.log    segments, capped at the configured file size;
//!   log_1.log    the logical stream is their concatenation
//!   ...
//! ```
//!
//! Records are framed as `[len][lsn][kind][payload][crc32]`, big-endian,
//! CRC32 (IEEE) over lsn + kind + payload. See [`record`] for the exact
//! layout and [`replay`] for the recovery rules.

pub mod log;
pub mod record;
pub mod replay;
pub mod segment;

pub use log::Wal;
pub use record::{LogRecord, Lsn};
pub use replay::{replay, ReplayedRecord};
