//! Log segment files
//!
//! One `log_<seq>.log` file holds a contiguous slice of the logical log
//! stream. Segments carry no header; the stream is exactly the byte
//! concatenation of the segments in sequence order, which keeps an LSN a
//! plain stream offset.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const SEGMENT_PREFIX: &str = "log_";
const SEGMENT_SUFFIX: &str = ".log";

/// File name of the segment with the given sequence number.
pub fn segment_file_name(seq: u64) -> String {
    format!("{SEGMENT_PREFIX}{seq}{SEGMENT_SUFFIX}")
}

/// Parse a segment sequence number out of a file name, if it is one.
pub fn parse_segment_seq(name: &str) -> Option<u64> {
    name.strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?
        .parse()
        .ok()
}

/// An open log segment positioned for appending.
pub struct LogSegment {
    seq: u64,
    path: PathBuf,
    file: File,
    len: u64,
}

impl LogSegment {
    /// Create a fresh, empty segment.
    pub fn create(dir: &Path, seq: u64) -> io::Result<Self> {
        let path = dir.join(segment_file_name(seq));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self { seq, path, file, len: 0 })
    }

    /// Open an existing segment and position at `len` for appending; any
    /// bytes past `len` (a torn tail found during replay) are cut off.
    pub fn open_at(dir: &Path, seq: u64, len: u64) -> io::Result<Self> {
        let path = dir.join(segment_file_name(seq));
        let file = OpenOptions::new().write(true).open(&path)?;
        file.set_len(len)?;
        let mut segment = Self { seq, path, file, len };
        segment.file.seek(SeekFrom::Start(len))?;
        Ok(segment)
    }

    /// Append raw frame bytes.
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.len += bytes.len() as u64;
        Ok(())
    }

    /// Force appended bytes to stable storage.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Bytes written to this segment.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a whole segment for replay.
pub fn read_segment(dir: &Path, seq: u64) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    File::open(dir.join(segment_file_name(seq)))?.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Sequence numbers of all segments in the directory, sorted ascending.
pub fn list_segments(dir: &Path) -> io::Result<Vec<u64>> {
    let mut seqs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(seq) = entry.file_name().to_str().and_then(parse_segment_seq) {
            seqs.push(seq);
        }
    }
    seqs.sort_unstable();
    Ok(seqs)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_segment_names() {
        assert_eq!(segment_file_name(0), "log_0.log");
        assert_eq!(segment_file_name(17), "log_17.log");
        assert_eq!(parse_segment_seq("log_17.log"), Some(17));
        assert_eq!(parse_segment_seq("log_.log"), None);
        assert_eq!(parse_segment_seq("other.log"), None);
        assert_eq!(parse_segment_seq("log_3.tmp"), None);
    }

    #[test]
    fn test_append_and_read() {
        let dir = tempdir().unwrap();
        let mut seg = LogSegment::create(dir.path(), 0).unwrap();
        seg.append(b"hello").unwrap();
        seg.append(b" world").unwrap();
        seg.sync().unwrap();
        assert_eq!(seg.len(), 11);
        assert_eq!(read_segment(dir.path(), 0).unwrap(), b"hello world");
    }

    #[test]
    fn test_open_at_truncates_tail() {
        let dir = tempdir().unwrap();
        let mut seg = LogSegment::create(dir.path(), 2).unwrap();
        seg.append(b"valid-bytes-torn-tail").unwrap();
        seg.sync().unwrap();
        drop(seg);

        let mut seg = LogSegment::open_at(dir.path(), 2, 11).unwrap();
        seg.append(b"!").unwrap();
        seg.sync().unwrap();
        assert_eq!(read_segment(dir.path(), 2).unwrap(), b"valid-bytes!");
    }

    #[test]
    fn test_list_segments_sorted() {
        let dir = tempdir().unwrap();
        for seq in [2u64, 0, 1, 10] {
            LogSegment::create(dir.path(), seq).unwrap();
        }
        std::fs::write(dir.path().join("LOCK"), b"").unwrap();
        assert_eq!(list_segments(dir.path()).unwrap(), vec![0, 1, 2, 10]);
    }
}
