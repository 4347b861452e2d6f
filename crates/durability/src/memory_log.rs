//! In-memory transaction log.
//!
//! A growable buffer of framed records, written by one appender at a time
//! and read by any number of concurrent readers.
//!
//! ## Positions
//!
//! A record's log position is the offset of its length prefix. The writer
//! checkpoint is the end of the buffer, so the next record must claim that
//! position. A record that claims any other position is not written:
//!
//! - `try_append` reports the mismatch
//! - `append` rebuilds prepares with `copy_for_retry` at the checkpoint
//!
//! ## Locking
//!
//! Scans hold the read lock until they are dropped; an appender waits for
//! every open scan.

use crate::config::CodecConfig;
use crate::epoch_chain::EpochChain;
use crate::format::{
    next_log_position, read_frame_backward, read_frame_forward, write_frame, EpochRecord,
    LogRecord, LogRecordKind, PrepareRecordView, Record, RecordFamily,
};
use crate::source::RecordSource;
use parking_lot::{RwLock, RwLockReadGuard};
use tflog_core::{Error, Limits, RecordId, Result, Timestamp};
use tracing::{debug, trace, warn};

/// Result of a single append attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was written
    Written {
        /// Position the record was written at
        log_position: i64,
        /// Writer checkpoint after the record
        next_position: i64,
    },
    /// The record claims a position other than the writer checkpoint
    PositionMismatch {
        /// Position the record claims
        expected: i64,
        /// Writer checkpoint
        actual: i64,
    },
}

/// A record written by `append`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    /// The record as written, rebuilt if it was retried
    pub record: LogRecord,
    /// Writer checkpoint after the record
    pub next_position: i64,
    /// True if the record was copied to a new position
    pub retried: bool,
}

/// Framed records in memory.
#[derive(Debug)]
pub struct MemoryLog {
    config: CodecConfig,
    limits: Limits,
    buf: RwLock<Vec<u8>>,
}

impl MemoryLog {
    /// Create an empty log.
    pub fn new(config: CodecConfig) -> Result<Self> {
        Self::from_bytes(config, Vec::new())
    }

    /// Open a log over existing framed bytes.
    ///
    /// Records are not checked until they are read.
    pub fn from_bytes(config: CodecConfig, bytes: Vec<u8>) -> Result<Self> {
        config.validate()?;
        let limits = config.limits();
        debug!(family = %config.family, bytes = bytes.len(), "Opened memory log");
        Ok(MemoryLog {
            config,
            limits,
            buf: RwLock::new(bytes),
        })
    }

    /// Configuration the log was opened with
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Record family of the log
    pub fn family(&self) -> RecordFamily {
        self.config.family
    }

    /// Size of the log in bytes
    pub fn len(&self) -> usize {
        self.buf.read().len()
    }

    /// True if nothing was written yet
    pub fn is_empty(&self) -> bool {
        self.buf.read().is_empty()
    }

    /// Copy of the framed log bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.buf.read().clone()
    }

    /// Write `record` if it claims the writer checkpoint.
    pub fn try_append(&self, record: &LogRecord) -> Result<AppendOutcome> {
        let mut buf = self.buf.write();
        self.append_locked(&mut buf, record)
    }

    /// Write `record`, moving a prepare to the writer checkpoint if it
    /// claims another position.
    ///
    /// A prepare that started its own transaction moves its transaction
    /// position along with it; later prepares of a transaction keep theirs.
    /// Other records cannot be moved and fail with `InvalidArgument`.
    pub fn append(&self, record: LogRecord) -> Result<Appended> {
        let mut buf = self.buf.write();
        match self.append_locked(&mut buf, &record)? {
            AppendOutcome::Written { next_position, .. } => Ok(Appended {
                record,
                next_position,
                retried: false,
            }),
            AppendOutcome::PositionMismatch { expected, actual } => {
                let transaction_position = match record.as_prepare() {
                    Some(prepare) if prepare.transaction_position() != expected => {
                        prepare.transaction_position()
                    }
                    _ => actual,
                };
                let retry = record.copy_for_retry(actual, transaction_position, &self.limits)?;
                debug!(expected, actual, kind = %Record::kind(&retry), "Retrying append at writer checkpoint");
                match self.append_locked(&mut buf, &retry)? {
                    AppendOutcome::Written { next_position, .. } => Ok(Appended {
                        record: retry,
                        next_position,
                        retried: true,
                    }),
                    AppendOutcome::PositionMismatch { expected, actual } => {
                        Err(Error::InvalidArgument(format!(
                            "retried record claims {} at writer checkpoint {}",
                            expected, actual
                        )))
                    }
                }
            }
        }
    }

    fn append_locked(&self, buf: &mut Vec<u8>, record: &LogRecord) -> Result<AppendOutcome> {
        if record.family() != self.config.family {
            return Err(Error::InvalidArgument(format!(
                "{} record in a {} log",
                record.family(),
                self.config.family
            )));
        }

        let actual = buf.len() as i64;
        let expected = record.log_position();
        if expected != actual {
            trace!(expected, actual, "Append position mismatch");
            return Ok(AppendOutcome::PositionMismatch { expected, actual });
        }

        let bytes = record.to_bytes()?;
        self.limits.check_record_size(bytes.len(), actual)?;
        write_frame(buf, &bytes)?;
        let next_position = next_log_position(actual, bytes.len());
        trace!(log_position = actual, next_position, kind = %record.kind(), "Appended record");
        Ok(AppendOutcome::Written {
            log_position: actual,
            next_position,
        })
    }

    /// Start the next epoch at the writer checkpoint and add it to `chain`.
    pub fn write_epoch(
        &self,
        chain: &mut EpochChain,
        epoch_id: RecordId,
        leader_instance_id: Option<RecordId>,
        timestamp: Timestamp,
    ) -> Result<EpochRecord> {
        let mut buf = self.buf.write();
        let epoch_position = buf.len() as i64;
        let epoch = chain.next_epoch(epoch_position, epoch_id, leader_instance_id, timestamp)?;
        let record = self.config.family.epoch_record(&epoch)?;
        match self.append_locked(&mut buf, &record)? {
            AppendOutcome::Written { .. } => {}
            AppendOutcome::PositionMismatch { expected, actual } => {
                return Err(Error::InvalidArgument(format!(
                    "epoch record claims {} at writer checkpoint {}",
                    expected, actual
                )))
            }
        }
        chain.push(epoch)?;
        debug!(
            epoch_number = epoch.epoch_number,
            epoch_position,
            prev_epoch_position = epoch.prev_epoch_position,
            "Wrote epoch"
        );
        Ok(epoch)
    }

    /// Cut the log back to `log_position`, which must be a record boundary.
    pub fn truncate(&self, log_position: i64) -> Result<()> {
        let mut buf = self.buf.write();
        let end = usize::try_from(log_position).map_err(|_| {
            Error::InvalidArgument(format!("truncate position {} is negative", log_position))
        })?;
        if end > buf.len() {
            return Err(Error::InvalidArgument(format!(
                "truncate position {} is past the end {}",
                log_position,
                buf.len()
            )));
        }
        if end > 0 {
            read_frame_backward(&buf, end, &self.limits)?;
        }
        warn!(log_position, dropped = buf.len() - end, "Truncating log");
        buf.truncate(end);
        Ok(())
    }

    /// Decode the record at `log_position` and the position after it.
    ///
    /// Returns `None` at the writer checkpoint.
    pub fn read_next(&self, log_position: i64) -> Result<Option<(LogRecord, i64)>> {
        let buf = self.buf.read();
        let offset = self.offset(log_position, buf.len())?;
        if offset == buf.len() {
            return Ok(None);
        }
        let (record, next) = decode_forward(&buf, offset, self.config.family, &self.limits)?;
        Ok(Some((record, next)))
    }

    /// Scan records from `log_position` to the writer checkpoint.
    pub fn scan_forward(&self, log_position: i64) -> Result<ForwardScan<'_>> {
        let guard = self.buf.read();
        let offset = self.offset(log_position, guard.len())?;
        Ok(ForwardScan {
            guard,
            offset,
            family: self.config.family,
            limits: self.limits,
            failed: false,
        })
    }

    /// Scan records backwards from the record ending at `log_position`.
    pub fn scan_backward(&self, log_position: i64) -> Result<BackwardScan<'_>> {
        let guard = self.buf.read();
        let end = self.offset(log_position, guard.len())?;
        Ok(BackwardScan {
            guard,
            end,
            family: self.config.family,
            limits: self.limits,
            failed: false,
        })
    }

    /// Call `f` with a view of every prepare in the log.
    ///
    /// Only classic logs hold prepares laid out for viewing; the call fails
    /// on a unified log. Returns the number of prepares viewed.
    pub fn for_each_prepare_view<F>(&self, mut f: F) -> Result<usize>
    where
        F: FnMut(&PrepareRecordView<'_>),
    {
        if self.config.family != RecordFamily::Classic {
            return Err(Error::InvalidArgument(format!(
                "prepare views need a classic log, not {}",
                self.config.family
            )));
        }
        let buf = self.buf.read();
        let mut offset = 0;
        let mut viewed = 0;
        while offset < buf.len() {
            let frame = read_frame_forward(&buf, offset, &self.limits)?;
            if frame.record.first() == Some(&LogRecordKind::Prepare.as_byte()) {
                let view = PrepareRecordView::new(frame.record, frame.len(), &self.limits)?;
                f(&view);
                viewed += 1;
            }
            offset = frame.end;
        }
        trace!(viewed, "Prepare view scan finished");
        Ok(viewed)
    }

    fn offset(&self, log_position: i64, len: usize) -> Result<usize> {
        usize::try_from(log_position)
            .ok()
            .filter(|&offset| offset <= len)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "position {} is outside the log (0..={})",
                    log_position, len
                ))
            })
    }
}

impl RecordSource for MemoryLog {
    fn read_at(&self, log_position: i64) -> Result<LogRecord> {
        let buf = self.buf.read();
        let offset = self.offset(log_position, buf.len())?;
        decode_forward(&buf, offset, self.config.family, &self.limits).map(|(record, _)| record)
    }

    fn read_prev(&self, log_position: i64) -> Result<Option<(i64, LogRecord)>> {
        let buf = self.buf.read();
        let end = self.offset(log_position, buf.len())?;
        if end == 0 {
            return Ok(None);
        }
        decode_backward(&buf, end, self.config.family, &self.limits).map(Some)
    }

    fn writer_checkpoint(&self) -> i64 {
        self.buf.read().len() as i64
    }
}

fn decode_forward(
    buf: &[u8],
    offset: usize,
    family: RecordFamily,
    limits: &Limits,
) -> Result<(LogRecord, i64)> {
    let decoded = read_frame_forward(buf, offset, limits)
        .and_then(|frame| Ok((family.from_bytes(frame.record, limits)?, frame.end as i64)));
    if let Err(e) = &decoded {
        if e.is_corruption() {
            warn!(log_position = offset, error = %e, "Corrupt record");
        }
    }
    decoded
}

fn decode_backward(
    buf: &[u8],
    end: usize,
    family: RecordFamily,
    limits: &Limits,
) -> Result<(i64, LogRecord)> {
    let decoded = read_frame_backward(buf, end, limits)
        .and_then(|frame| Ok((frame.start as i64, family.from_bytes(frame.record, limits)?)));
    if let Err(e) = &decoded {
        if e.is_corruption() {
            warn!(end, error = %e, "Corrupt record");
        }
    }
    decoded
}

/// Records in log order. Stops after the first error.
pub struct ForwardScan<'a> {
    guard: RwLockReadGuard<'a, Vec<u8>>,
    offset: usize,
    family: RecordFamily,
    limits: Limits,
    failed: bool,
}

impl Iterator for ForwardScan<'_> {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.guard.len() {
            return None;
        }
        match decode_forward(&self.guard, self.offset, self.family, &self.limits) {
            Ok((record, next)) => {
                self.offset = next as usize;
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Records in reverse log order. Stops after the first error.
pub struct BackwardScan<'a> {
    guard: RwLockReadGuard<'a, Vec<u8>>,
    end: usize,
    family: RecordFamily,
    limits: Limits,
    failed: bool,
}

impl Iterator for BackwardScan<'_> {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.end == 0 {
            return None;
        }
        match decode_backward(&self.guard, self.end, self.family, &self.limits) {
            Ok((start, record)) => {
                self.end = start as usize;
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::unified::StreamWriteHeader;
    use crate::format::{
        CommitLogRecord, PrepareFlags, PrepareLogRecord, StreamWriteEvent, StreamWriteRecord,
    };

    fn log() -> MemoryLog {
        MemoryLog::new(CodecConfig::for_testing()).unwrap()
    }

    fn single_write(log_position: i64) -> LogRecord {
        PrepareLogRecord::single_write(log_position, "orders", "OrderPlaced", b"{}".to_vec())
            .build()
            .unwrap()
            .into()
    }

    #[test]
    fn test_append_and_read_back() {
        let log = log();
        let first = log.append(single_write(0)).unwrap();
        assert!(!first.retried);
        let second = log.append(single_write(first.next_position)).unwrap();

        assert_eq!(log.writer_checkpoint(), second.next_position);
        assert_eq!(log.read_at(0).unwrap(), first.record);
        let (record, next) = log.read_next(first.next_position).unwrap().unwrap();
        assert_eq!(record, second.record);
        assert!(log.read_next(next).unwrap().is_none());
    }

    #[test]
    fn test_try_append_reports_mismatch() {
        let log = log();
        log.append(single_write(0)).unwrap();
        let outcome = log.try_append(&single_write(0)).unwrap();
        assert_eq!(
            outcome,
            AppendOutcome::PositionMismatch {
                expected: 0,
                actual: log.writer_checkpoint()
            }
        );
    }

    #[test]
    fn test_append_retries_prepare() {
        let log = log();
        let first = log.append(single_write(0)).unwrap();
        let stale = single_write(0);
        let appended = log.append(stale.clone()).unwrap();

        assert!(appended.retried);
        let retried = appended.record.as_prepare().unwrap();
        let original = stale.as_prepare().unwrap();
        assert_eq!(retried.log_position(), first.next_position);
        assert_eq!(retried.transaction_position(), first.next_position);
        assert_eq!(retried.event_id(), original.event_id());
        assert_eq!(retried.data(), original.data());
        assert_eq!(log.read_at(first.next_position).unwrap(), appended.record);
    }

    #[test]
    fn test_retry_keeps_transaction_of_later_prepare() {
        let log = log();
        log.append(
            PrepareLogRecord::builder(0, "orders")
                .with_flags(PrepareFlags::DATA | PrepareFlags::TRANSACTION_BEGIN)
                .build()
                .unwrap()
                .into(),
        )
        .unwrap();
        let later: LogRecord = PrepareLogRecord::builder(10, "orders")
            .with_transaction_position(0)
            .with_transaction_offset(1)
            .with_flags(PrepareFlags::DATA | PrepareFlags::TRANSACTION_END)
            .build()
            .unwrap()
            .into();
        let appended = log.append(later).unwrap();
        assert!(appended.retried);
        assert_eq!(appended.record.as_prepare().unwrap().transaction_position(), 0);
    }

    #[test]
    fn test_retry_uses_log_limits() {
        let log = MemoryLog::new(CodecConfig::new().with_max_record_size(32 * 1024 * 1024)).unwrap();
        let first = log.append(single_write(0)).unwrap();
        let large: LogRecord = PrepareLogRecord::builder(0, "orders")
            .with_flags(PrepareFlags::SINGLE_WRITE | PrepareFlags::IS_COMMITTED)
            .with_data(vec![7u8; 20 * 1024 * 1024])
            .with_limits(log.config().limits())
            .build()
            .unwrap()
            .into();

        let appended = log.append(large).unwrap();
        assert!(appended.retried);
        assert_eq!(appended.record.log_position(), first.next_position);
        assert_eq!(
            appended.record.as_prepare().unwrap().data().len(),
            20 * 1024 * 1024
        );
        assert_eq!(log.read_at(first.next_position).unwrap(), appended.record);
    }

    #[test]
    fn test_stream_write_retry_follows_transaction() {
        let log = MemoryLog::new(CodecConfig::for_testing().with_family(RecordFamily::Unified)).unwrap();
        let write = |log_position: i64, transaction_position: i64, transaction_offset: i32| {
            let header = StreamWriteHeader {
                correlation_id: RecordId::new(),
                stream_number: 1024,
                event_count: 0,
                flags: PrepareFlags::DATA.bits(),
                expected_version: -2,
                transaction_position,
                transaction_offset,
            };
            let event = StreamWriteEvent {
                event_type_number: 7,
                flags: 0,
                event_id: RecordId::new(),
                data: b"x",
                metadata: b"",
            };
            LogRecord::from(
                StreamWriteRecord::new(Timestamp::now(), log_position, header, &[event]).unwrap(),
            )
        };

        let first = log.append(write(0, 0, 0)).unwrap();
        let own = log.append(write(0, 0, 0)).unwrap();
        assert!(own.retried);
        let moved = own.record.as_prepare().unwrap();
        assert_eq!(moved.log_position(), first.next_position);
        assert_eq!(moved.transaction_position(), first.next_position);

        let later = log.append(write(5, 0, 1)).unwrap();
        assert!(later.retried);
        let kept = later.record.as_prepare().unwrap();
        assert_eq!(kept.log_position(), own.next_position);
        assert_eq!(kept.transaction_position(), 0);
        assert_eq!(kept.transaction_offset(), 1);
        assert_eq!(log.read_at(own.next_position).unwrap(), later.record);
    }

    #[test]
    fn test_commit_is_not_retried() {
        let log = log();
        log.append(single_write(0)).unwrap();
        let commit = CommitLogRecord::new(0, RecordId::new(), 0, Timestamp::now(), 0).unwrap();
        assert!(matches!(
            log.append(commit.into()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_foreign_family_is_rejected() {
        let log = MemoryLog::new(CodecConfig::for_testing().with_family(RecordFamily::Unified)).unwrap();
        assert!(matches!(
            log.append(single_write(0)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(MemoryLog::new(CodecConfig::new().with_max_record_size(1)).is_err());
    }

    #[test]
    fn test_scans() {
        let log = log();
        let mut position = 0;
        for _ in 0..5 {
            position = log.append(single_write(position)).unwrap().next_position;
        }
        let forward: Vec<LogRecord> = log.scan_forward(0).unwrap().map(|r| r.unwrap()).collect();
        let mut backward: Vec<LogRecord> = log
            .scan_backward(position)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        backward.reverse();
        assert_eq!(forward.len(), 5);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_scan_stops_at_corruption() {
        let log = log();
        let next = log.append(single_write(0)).unwrap().next_position;
        log.append(single_write(next)).unwrap();
        let mut bytes = log.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let corrupt = MemoryLog::from_bytes(CodecConfig::for_testing(), bytes).unwrap();
        let results: Vec<Result<LogRecord>> = corrupt.scan_forward(0).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::MalformedLength { .. })));
    }

    #[test]
    fn test_truncate_to_boundary() {
        let log = log();
        let next = log.append(single_write(0)).unwrap().next_position;
        log.append(single_write(next)).unwrap();

        assert!(log.truncate(next + 1).is_err());
        log.truncate(next).unwrap();
        assert_eq!(log.writer_checkpoint(), next);
        assert_eq!(log.scan_forward(0).unwrap().count(), 1);
    }

    #[test]
    fn test_prepare_views() {
        let log = log();
        let next = log.append(single_write(0)).unwrap().next_position;
        log.append(
            CommitLogRecord::new(next, RecordId::new(), 0, Timestamp::now(), 0)
                .unwrap()
                .into(),
        )
        .unwrap();

        let mut streams = Vec::new();
        let viewed = log
            .for_each_prepare_view(|view| streams.push(view.event_stream_id().to_string()))
            .unwrap();
        assert_eq!(viewed, 1);
        assert_eq!(streams, vec!["orders".to_string()]);
    }

    #[test]
    fn test_write_epoch() {
        let log = log();
        let mut chain = EpochChain::new();
        let e0 = log
            .write_epoch(&mut chain, RecordId::new(), None, Timestamp::now())
            .unwrap();
        log.append(single_write(log.writer_checkpoint())).unwrap();
        let e1 = log
            .write_epoch(&mut chain, RecordId::new(), None, Timestamp::now())
            .unwrap();

        assert_eq!(e0.epoch_position, 0);
        assert_eq!(e1.prev_epoch_position, 0);
        assert_eq!(chain.len(), 2);
        assert_eq!(EpochChain::load(&log, 10).unwrap(), chain);
    }
}
