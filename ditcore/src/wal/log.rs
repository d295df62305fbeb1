//! Buffered write-ahead log
//!
//! [`Wal`] owns the segment directory. Appends accumulate in an in-memory
//! buffer and reach the active segment when the buffer fills, when a
//! flush is requested, on rollover, and on shutdown. Commit records go
//! through [`Wal::append_durable`], which does not return until the bytes
//! are flushed and fsynced.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info};

use crate::wal::record::{LogRecord, Lsn};
use crate::wal::replay::{self, ReplayedRecord};
use crate::wal::segment::LogSegment;
use crate::Result;

const LOCK_FILE: &str = "LOCK";

/// Append side of the segmented log.
pub struct Wal {
    dir: PathBuf,
    /// Advisory lock held for the lifetime of the instance so two
    /// managers cannot share one log folder.
    _lock: File,
    buffer: Vec<u8>,
    buffer_cap: usize,
    file_cap: u64,
    segment: LogSegment,
    next_lsn: Lsn,
}

impl Wal {
    /// Open (or create) the log in `dir`, replaying whatever is there.
    ///
    /// Returns the writer positioned after the last valid record together
    /// with the replayed records; a torn tail in the active segment has
    /// already been cut off.
    pub fn open(dir: &Path, buffer_cap: usize, file_cap: u64) -> Result<(Self, Vec<ReplayedRecord>)> {
        std::fs::create_dir_all(dir)?;
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(dir.join(LOCK_FILE))?;
        lock.try_lock_exclusive()?;

        let outcome = replay::scan(dir)?;
        let segment = match outcome.active_seq {
            Some(seq) => LogSegment::open_at(dir, seq, outcome.active_valid_len)?,
            None => LogSegment::create(dir, 0)?,
        };
        info!(
            dir = %dir.display(),
            segment = segment.seq(),
            next_lsn = outcome.next_lsn,
            records = outcome.records.len(),
            "opened write-ahead log"
        );
        Ok((
            Self {
                dir: dir.to_path_buf(),
                _lock: lock,
                buffer: Vec::with_capacity(buffer_cap),
                buffer_cap,
                file_cap,
                segment,
                next_lsn: outcome.next_lsn,
            },
            outcome.records,
        ))
    }

    /// Buffered append. Returns the record's LSN.
    pub fn append(&mut self, record: &LogRecord) -> Result<Lsn> {
        let frame = record.encode(self.next_lsn);
        let in_segment = self.segment.len() + self.buffer.len() as u64;
        if in_segment > 0 && in_segment + frame.len() as u64 > self.file_cap {
            self.roll()?;
        }
        let lsn = self.next_lsn;
        self.buffer.extend_from_slice(&frame);
        self.next_lsn += frame.len() as u64;
        if self.buffer.len() >= self.buffer_cap {
            self.flush()?;
        }
        Ok(lsn)
    }

    /// Append, flush and fsync. Used for commit records, which must be on
    /// stable storage before the commit call returns.
    pub fn append_durable(&mut self, record: &LogRecord) -> Result<Lsn> {
        let lsn = self.append(record)?;
        self.sync()?;
        Ok(lsn)
    }

    /// Write buffered bytes to the active segment.
    pub fn flush(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.segment.append(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Flush and force the active segment to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.flush()?;
        self.segment.sync()?;
        Ok(())
    }

    /// Close the current segment and continue in the next one.
    fn roll(&mut self) -> Result<()> {
        self.sync()?;
        let next_seq = self.segment.seq() + 1;
        debug!(from = self.segment.seq(), to = next_seq, "log segment rollover");
        self.segment = LogSegment::create(&self.dir, next_seq)?;
        Ok(())
    }

    /// Stream offset the next record will be placed at.
    pub fn next_lsn(&self) -> Lsn {
        self.next_lsn
    }

    /// The log directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        // Shutdown flush; errors can't go anywhere from a destructor.
        let _ = self.sync();
    }
}

// ============================================================================
// Tests
// ============================================================================
