//! Log record framing
//!
//! Every record is framed as:
//!
//! ```text
//! +----------------+-----------+----------+-----------+------------+
//! | payload_len u32 | lsn u64  | kind u8  | payload   | crc32 u32  |
//! +----------------+-----------+----------+-----------+------------+
//! ```
//!
//! All integers are big-endian. The LSN is the byte offset of the
//! record's first byte within the logical log stream (the concatenation
//! of all segments in sequence order). The CRC32 (IEEE) covers the lsn,
//! the kind byte and the payload, so header corruption is caught as well.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::txn::{SnapshotId, TxnId};

/// Byte offset of a record within the logical log stream.
pub type Lsn = u64;

/// Frame bytes before the payload: length, lsn, kind.
pub const FRAME_HEADER_SIZE: usize = 4 + 8 + 1;
/// Frame bytes after the payload: crc32.
pub const FRAME_TRAILER_SIZE: usize = 4;

const KIND_BEGIN: u8 = 1;
const KIND_USER_DATA: u8 = 2;
const KIND_COMMIT: u8 = 3;
const KIND_ABORT: u8 = 4;

// ============================================================================
// Log record
// ============================================================================

/// Tagged log record. Every non-`Begin` record for a transaction is
/// preceded in stream order by that transaction's `Begin`; the trailing
/// record of any transaction that left ACTIVE is `Commit` or `Abort`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Begin {
        txn_id: TxnId,
        start_snap: SnapshotId,
    },
    UserData {
        txn_id: TxnId,
        data: Vec<u8>,
    },
    Commit {
        txn_id: TxnId,
        commit_snap: SnapshotId,
    },
    Abort {
        txn_id: TxnId,
    },
}

impl LogRecord {
    /// The transaction this record belongs to.
    pub fn txn_id(&self) -> TxnId {
        match self {
            LogRecord::Begin { txn_id, .. }
            | LogRecord::UserData { txn_id, .. }
            | LogRecord::Commit { txn_id, .. }
            | LogRecord::Abort { txn_id } => *txn_id,
        }
    }

    /// Whether this is a `Commit` or `Abort` record.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LogRecord::Commit { .. } | LogRecord::Abort { .. })
    }

    fn kind(&self) -> u8 {
        match self {
            LogRecord::Begin { .. } => KIND_BEGIN,
            LogRecord::UserData { .. } => KIND_USER_DATA,
            LogRecord::Commit { .. } => KIND_COMMIT,
            LogRecord::Abort { .. } => KIND_ABORT,
        }
    }

    fn payload(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        match self {
            LogRecord::Begin { txn_id, start_snap } => {
                buf.write_u64::<BigEndian>(*txn_id).unwrap();
                buf.write_u64::<BigEndian>(*start_snap).unwrap();
            }
            LogRecord::UserData { txn_id, data } => {
                buf.write_u64::<BigEndian>(*txn_id).unwrap();
                buf.extend_from_slice(data);
            }
            LogRecord::Commit { txn_id, commit_snap } => {
                buf.write_u64::<BigEndian>(*txn_id).unwrap();
                buf.write_u64::<BigEndian>(*commit_snap).unwrap();
            }
            LogRecord::Abort { txn_id } => {
                buf.write_u64::<BigEndian>(*txn_id).unwrap();
            }
        }
        buf
    }

    /// Size of the encoded frame in bytes.
    pub fn encoded_len(&self) -> usize {
        let payload_len = match self {
            LogRecord::Begin { .. } | LogRecord::Commit { .. } => 16,
            LogRecord::UserData { data, .. } => 8 + data.len(),
            LogRecord::Abort { .. } => 8,
        };
        FRAME_HEADER_SIZE + payload_len + FRAME_TRAILER_SIZE
    }

    /// Encode the full frame for a record placed at `lsn`.
    pub fn encode(&self, lsn: Lsn) -> Vec<u8> {
        let payload = self.payload();
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + FRAME_TRAILER_SIZE);
        frame.write_u32::<BigEndian>(payload.len() as u32).unwrap();
        frame.write_u64::<BigEndian>(lsn).unwrap();
        frame.push(self.kind());
        frame.extend_from_slice(&payload);
        let crc = crc32fast::hash(&frame[4..]);
        frame.write_u32::<BigEndian>(crc).unwrap();
        frame
    }
}

// ============================================================================
// Frame decoding
// ============================================================================

/// Why a frame could not be decoded. `Truncated` and `Crc` at the stream
/// tail are torn-write artifacts; everything else is real corruption.
#[derive(Debug)]
pub(crate) enum FrameError {
    /// The buffer ends before the frame does.
    Truncated,
    /// Stored and computed CRC32 disagree.
    Crc { stored: u32, computed: u32 },
    /// Unknown record kind byte.
    BadKind(u8),
    /// Payload too short for the record kind.
    BadPayload(u8),
}

/// Decode one frame from the front of `buf`.
///
/// Returns the record, its stored lsn and the number of bytes consumed.
pub(crate) fn decode_frame(buf: &[u8]) -> std::result::Result<(Lsn, LogRecord, usize), FrameError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Err(FrameError::Truncated);
    }
    let mut cursor = Cursor::new(buf);
    let payload_len = cursor.read_u32::<BigEndian>().unwrap() as usize;
    let total = FRAME_HEADER_SIZE + payload_len + FRAME_TRAILER_SIZE;
    if buf.len() < total {
        return Err(FrameError::Truncated);
    }
    let lsn = cursor.read_u64::<BigEndian>().unwrap();
    let kind = cursor.read_u8().unwrap();

    let crc_at = FRAME_HEADER_SIZE + payload_len;
    let computed = crc32fast::hash(&buf[4..crc_at]);
    let stored = u32::from_be_bytes(buf[crc_at..crc_at + 4].try_into().unwrap());
    if stored != computed {
        return Err(FrameError::Crc { stored, computed });
    }

    let payload = &buf[FRAME_HEADER_SIZE..crc_at];
    let record = decode_payload(kind, payload)?;
    Ok((lsn, record, total))
}

fn read_u64_field(cursor: &mut Cursor<&[u8]>, kind: u8) -> std::result::Result<u64, FrameError> {
    cursor
        .read_u64::<BigEndian>()
        .map_err(|_| FrameError::BadPayload(kind))
}

fn decode_payload(kind: u8, payload: &[u8]) -> std::result::Result<LogRecord, FrameError> {
    let mut cursor = Cursor::new(payload);
    match kind {
        KIND_BEGIN => {
            let txn_id = read_u64_field(&mut cursor, kind)?;
            let start_snap = read_u64_field(&mut cursor, kind)?;
            Ok(LogRecord::Begin { txn_id, start_snap })
        }
        KIND_USER_DATA => {
            if payload.len() < 8 {
                return Err(FrameError::BadPayload(kind));
            }
            let txn_id = read_u64_field(&mut cursor, kind)?;
            Ok(LogRecord::UserData {
                txn_id,
                data: payload[8..].to_vec(),
            })
        }
        KIND_COMMIT => {
            let txn_id = read_u64_field(&mut cursor, kind)?;
            let commit_snap = read_u64_field(&mut cursor, kind)?;
            Ok(LogRecord::Commit { txn_id, commit_snap })
        }
        KIND_ABORT => {
            let txn_id = read_u64_field(&mut cursor, kind)?;
            Ok(LogRecord::Abort { txn_id })
        }
        other => Err(FrameError::BadKind(other)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let records = [
            LogRecord::Begin { txn_id: 7, start_snap: 3 },
            LogRecord::UserData { txn_id: 7, data: b"cn=test".to_vec() },
            LogRecord::Commit { txn_id: 7, commit_snap: 4 },
            LogRecord::Abort { txn_id: 8 },
        ];
        let mut lsn = 0u64;
        for record in &records {
            let frame = record.encode(lsn);
            assert_eq!(frame.len(), record.encoded_len());
            let (decoded_lsn, decoded, consumed) = decode_frame(&frame).unwrap();
            assert_eq!(decoded_lsn, lsn);
            assert_eq!(&decoded, record);
            assert_eq!(consumed, frame.len());
            lsn += frame.len() as u64;
        }
    }

    #[test]
    fn test_big_endian_layout() {
        let frame = LogRecord::Abort { txn_id: 0x0102 }.encode(0x0304);
        // payload_len = 8
        assert_eq!(&frame[0..4], &[0, 0, 0, 8]);
        // lsn
        assert_eq!(&frame[4..12], &[0, 0, 0, 0, 0, 0, 3, 4]);
        // kind
        assert_eq!(frame[12], 4);
        // txn id payload
        assert_eq!(&frame[13..21], &[0, 0, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_truncated_frame() {
        let frame = LogRecord::Begin { txn_id: 1, start_snap: 1 }.encode(0);
        for cut in [0, 3, FRAME_HEADER_SIZE, frame.len() - 1] {
            assert!(matches!(decode_frame(&frame[..cut]), Err(FrameError::Truncated)));
        }
    }

    #[test]
    fn test_crc_mismatch() {
        let mut frame = LogRecord::Begin { txn_id: 1, start_snap: 1 }.encode(0);
        let flip = FRAME_HEADER_SIZE + 2;
        frame[flip] ^= 0xff;
        assert!(matches!(decode_frame(&frame), Err(FrameError::Crc { .. })));
    }

    #[test]
    fn test_header_corruption_detected() {
        let mut frame = LogRecord::Commit { txn_id: 1, commit_snap: 9 }.encode(100);
        // Damage the lsn field; the CRC covers it
        frame[5] ^= 0xff;
        assert!(matches!(decode_frame(&frame), Err(FrameError::Crc { .. })));
    }

    #[test]
    fn test_bad_kind() {
        let good = LogRecord::Abort { txn_id: 1 }.encode(0);
        let mut bad = good.clone();
        bad[12] = 9;
        // Re-seal the CRC so only the kind is wrong
        let crc_at = bad.len() - 4;
        let crc = crc32fast::hash(&bad[4..crc_at]);
        bad[crc_at..].copy_from_slice(&crc.to_be_bytes());
        assert!(matches!(decode_frame(&bad), Err(FrameError::BadKind(9))));
    }
}
