//! Log replay
//!
//! Walks the segment files in sequence order and decodes records
//! end-to-end. A truncated or checksum-failing record at the tail of the
//! highest segment is a torn write: replay stops there and the writer
//! later truncates the tail. The same damage anywhere else, a gap in the
//! segment numbering, an LSN that does not match the record's actual
//! stream offset, or a record sequence that violates the Begin/terminal
//! ordering invariants is corruption and refuses startup.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::wal::record::{decode_frame, FrameError, LogRecord, Lsn};
use crate::wal::segment;
use crate::{CoreError, Result};

/// One replayed record and its position in the stream.
#[derive(Debug, Clone)]
pub struct ReplayedRecord {
    pub lsn: Lsn,
    pub record: LogRecord,
}

/// Everything the writer needs to resume after the last valid record.
#[derive(Debug)]
pub(crate) struct ReplayOutcome {
    pub records: Vec<ReplayedRecord>,
    /// Stream offset one past the last valid record.
    pub next_lsn: Lsn,
    /// Highest segment present, if any.
    pub active_seq: Option<u64>,
    /// Valid byte length of the highest segment.
    pub active_valid_len: u64,
    /// Whether a torn tail was cut off.
    pub truncated: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TxnPhase {
    Open,
    Terminal,
}

/// Replay all records in `dir`, applying the validation rules above.
///
/// This is also the recovery surface for external collaborators: user
/// data logged through the transaction log manager comes back here.
pub fn replay(dir: &Path) -> Result<Vec<ReplayedRecord>> {
    Ok(scan(dir)?.records)
}

pub(crate) fn scan(dir: &Path) -> Result<ReplayOutcome> {
    let seqs = segment::list_segments(dir)?;
    if let Some(&first) = seqs.first() {
        if first != 0 {
            return Err(CoreError::InvalidLog(format!(
                "log stream does not start at segment 0 (found {first})"
            )));
        }
    }
    for pair in seqs.windows(2) {
        if pair[1] != pair[0] + 1 {
            return Err(CoreError::InvalidLog(format!(
                "gap in segment numbering between {} and {}",
                pair[0], pair[1]
            )));
        }
    }

    let mut outcome = ReplayOutcome {
        records: Vec::new(),
        next_lsn: 0,
        active_seq: seqs.last().copied(),
        active_valid_len: 0,
        truncated: false,
    };
    let mut phases: HashMap<u64, TxnPhase> = HashMap::new();
    let mut stream_offset: Lsn = 0;

    for (i, &seq) in seqs.iter().enumerate() {
        let is_last = i + 1 == seqs.len();
        let bytes = segment::read_segment(dir, seq)?;
        let mut local: usize = 0;

        while local < bytes.len() {
            match decode_frame(&bytes[local..]) {
                Ok((lsn, record, consumed)) => {
                    if lsn != stream_offset {
                        return Err(CoreError::InvalidLog(format!(
                            "record in segment {seq} carries lsn {lsn}, expected {stream_offset}"
                        )));
                    }
                    check_txn_order(&mut phases, &record, lsn)?;
                    outcome.records.push(ReplayedRecord { lsn, record });
                    local += consumed;
                    stream_offset += consumed as u64;
                }
                Err(FrameError::Truncated | FrameError::Crc { .. }) if is_last => {
                    warn!(
                        segment = seq,
                        offset = local,
                        "torn record at log tail, truncating"
                    );
                    outcome.truncated = true;
                    break;
                }
                Err(FrameError::Truncated) => {
                    return Err(CoreError::InvalidLog(format!(
                        "segment {seq} ends mid-record at offset {local}"
                    )));
                }
                Err(FrameError::Crc { stored, computed }) => {
                    return Err(CoreError::InvalidLog(format!(
                        "crc mismatch in segment {seq} at offset {local}: stored {stored:#010x}, computed {computed:#010x}"
                    )));
                }
                Err(FrameError::BadKind(kind)) => {
                    return Err(CoreError::InvalidLog(format!(
                        "unknown record kind {kind} in segment {seq} at offset {local}"
                    )));
                }
                Err(FrameError::BadPayload(kind)) => {
                    return Err(CoreError::InvalidLog(format!(
                        "short payload for record kind {kind} in segment {seq} at offset {local}"
                    )));
                }
            }
        }

        if is_last {
            outcome.active_valid_len = local as u64;
        }
        debug!(segment = seq, bytes = local, "replayed segment");
        if outcome.truncated {
            break;
        }
    }

    outcome.next_lsn = stream_offset;
    Ok(outcome)
}

fn check_txn_order(
    phases: &mut HashMap<u64, TxnPhase>,
    record: &LogRecord,
    lsn: Lsn,
) -> Result<()> {
    let txn_id = record.txn_id();
    match (phases.get(&txn_id), record) {
        (None, LogRecord::Begin { .. }) => {
            phases.insert(txn_id, TxnPhase::Open);
            Ok(())
        }
        (None, _) => Err(CoreError::InvalidLog(format!(
            "record for transaction {txn_id} at lsn {lsn} precedes its Begin"
        ))),
        (Some(TxnPhase::Open), LogRecord::Begin { .. }) => Err(CoreError::InvalidLog(format!(
            "duplicate Begin for transaction {txn_id} at lsn {lsn}"
        ))),
        (Some(TxnPhase::Open), rec) => {
            if rec.is_terminal() {
                phases.insert(txn_id, TxnPhase::Terminal);
            }
            Ok(())
        }
        (Some(TxnPhase::Terminal), _) => Err(CoreError::InvalidLog(format!(
            "record for transaction {txn_id} at lsn {lsn} follows its terminal record"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
