//! Prepare/commit transaction resolution.
//!
//! Writes reach the log as prepares. A prepare written with `IsCommitted`
//! belongs to an implicit transaction that is complete once its final
//! prepare (`TransactionEnd`) is in the log. Prepares without that flag
//! belong to an explicit transaction that only becomes visible when a commit
//! record naming its transaction position follows.
//!
//! ## Resolution
//!
//! 1. Prepares are grouped by transaction position
//! 2. Implicit transactions are emitted at their boundary prepare
//! 3. Explicit transactions are emitted with their commit record
//! 4. Whatever is still open at `finish` is reported as incomplete

use crate::format::{CommitLogRecord, LogRecord, PrepareFlags, Record};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// True if `record` concludes a transaction.
///
/// Stream and event type definitions never do, and neither does the record
/// that starts a unified transaction. A prepare does when it carries
/// `TransactionEnd`, whether or not it is committed. Every other record is a
/// boundary of its own.
pub fn is_transaction_boundary(record: &LogRecord) -> bool {
    match record {
        LogRecord::Stream(_) | LogRecord::EventType(_) | LogRecord::TransactionStart(_) => false,
        other => match other.as_prepare() {
            Some(prepare) => prepare.flags().has_any_of(PrepareFlags::TRANSACTION_END),
            None => true,
        },
    }
}

/// A transaction whose prepares are all known and visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTransaction {
    /// Position of the first prepare
    pub transaction_position: i64,
    /// Prepares in log order
    pub prepares: Vec<LogRecord>,
    /// Commit record, `None` for implicit transactions
    pub commit: Option<CommitLogRecord>,
}

impl ResolvedTransaction {
    /// True if the transaction was committed by its own prepares.
    pub fn is_implicit(&self) -> bool {
        self.commit.is_none()
    }

    /// Number of events written
    pub fn event_count(&self) -> usize {
        self.prepares
            .iter()
            .map(|record| match record {
                LogRecord::StreamWrite(write) => write.event_count(),
                _ => 1,
            })
            .sum()
    }
}

/// Counters collected while resolving.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolverStats {
    /// Implicit transactions emitted
    pub implicit_committed: usize,
    /// Explicit transactions emitted with their commit
    pub explicit_committed: usize,
    /// Commits whose prepares were never seen
    pub orphaned_commits: usize,
    /// Transactions still open when resolution finished
    pub incomplete: usize,
}

#[derive(Debug, Default)]
struct PendingTransaction {
    prepares: Vec<LogRecord>,
    ended: bool,
}

/// Groups prepares into transactions as records are read in log order.
#[derive(Debug, Default)]
pub struct TransactionResolver {
    pending: HashMap<i64, PendingTransaction>,
    stats: ResolverStats,
}

impl TransactionResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next record of the log.
    ///
    /// Returns the transaction this record completes, if any. Records that
    /// take no part in transactions are ignored.
    pub fn push(&mut self, record: LogRecord) -> Option<ResolvedTransaction> {
        if let LogRecord::Commit(commit) = record {
            return self.resolve_commit(commit);
        }

        let (transaction_position, flags) = match record.as_prepare() {
            Some(prepare) => (prepare.transaction_position(), prepare.flags()),
            None => return None,
        };
        let boundary = is_transaction_boundary(&record);
        trace!(
            log_position = Record::log_position(&record),
            transaction_position,
            %flags,
            "Prepare"
        );

        let pending = self.pending.entry(transaction_position).or_default();
        pending.prepares.push(record);
        pending.ended |= boundary;

        if !(boundary && flags.has_any_of(PrepareFlags::IS_COMMITTED)) {
            return None;
        }

        let pending = self.pending.remove(&transaction_position)?;
        self.stats.implicit_committed += 1;
        debug!(transaction_position, prepares = pending.prepares.len(), "Implicit transaction resolved");
        Some(ResolvedTransaction {
            transaction_position,
            prepares: pending.prepares,
            commit: None,
        })
    }

    fn resolve_commit(&mut self, commit: CommitLogRecord) -> Option<ResolvedTransaction> {
        let transaction_position = commit.transaction_position();
        let Some(pending) = self.pending.remove(&transaction_position) else {
            self.stats.orphaned_commits += 1;
            warn!(
                log_position = commit.log_position(),
                transaction_position,
                "Commit without prepares"
            );
            return None;
        };

        if !pending.ended {
            warn!(
                log_position = commit.log_position(),
                transaction_position,
                "Commit before the transaction's final prepare"
            );
        }
        self.stats.explicit_committed += 1;
        debug!(
            transaction_position,
            prepares = pending.prepares.len(),
            commit_position = commit.log_position(),
            "Explicit transaction resolved"
        );
        Some(ResolvedTransaction {
            transaction_position,
            prepares: pending.prepares,
            commit: Some(commit),
        })
    }

    /// Number of transactions still waiting for prepares or a commit
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Stop resolving and report what was seen.
    pub fn finish(mut self) -> ResolverStats {
        self.stats.incomplete = self.pending.len();
        if self.stats.incomplete > 0 {
            let mut positions: Vec<i64> = self.pending.keys().copied().collect();
            positions.sort_unstable();
            warn!(
                count = self.stats.incomplete,
                transaction_positions = ?positions,
                "Discarding incomplete transactions"
            );
        }
        self.stats
    }
}

/// Resolve every transaction in `records`.
pub fn resolve_transactions<I>(records: I) -> (Vec<ResolvedTransaction>, ResolverStats)
where
    I: IntoIterator<Item = LogRecord>,
{
    let mut resolver = TransactionResolver::new();
    let resolved = records
        .into_iter()
        .filter_map(|record| resolver.push(record))
        .collect();
    (resolved, resolver.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::unified::{
        ContentTypeHeader, EventTypeHeader, StreamHeader, StreamWriteHeader,
        TransactionEndHeader, TransactionStartHeader,
    };
    use crate::format::{
        ContentTypeRecord, EventTypeRecord, PrepareLogRecord, StreamRecord, StreamWriteEvent,
        StreamWriteRecord, SystemLogRecord, SystemRecordSerialization, SystemRecordType,
        TransactionEndRecord, TransactionStartRecord,
    };
    use tflog_core::{RecordId, Timestamp};

    fn prepare(log_position: i64, transaction_position: i64, flags: PrepareFlags) -> LogRecord {
        PrepareLogRecord::builder(log_position, "account-1")
            .with_transaction_position(transaction_position)
            .with_flags(flags)
            .with_event_type("Deposited")
            .with_data(b"{}".to_vec())
            .build()
            .unwrap()
            .into()
    }

    fn commit(log_position: i64, transaction_position: i64) -> LogRecord {
        CommitLogRecord::new(log_position, RecordId::new(), transaction_position, Timestamp::now(), 0)
            .unwrap()
            .into()
    }

    #[test]
    fn test_committed_single_write_is_boundary() {
        let record = prepare(0, 0, PrepareFlags::SINGLE_WRITE | PrepareFlags::IS_COMMITTED);
        assert!(is_transaction_boundary(&record));
    }

    #[test]
    fn test_uncommitted_begin_is_not_boundary() {
        let record = prepare(0, 0, PrepareFlags::DATA | PrepareFlags::TRANSACTION_BEGIN);
        assert!(!is_transaction_boundary(&record));
    }

    #[test]
    fn test_uncommitted_end_is_boundary() {
        let record = prepare(100, 0, PrepareFlags::DATA | PrepareFlags::TRANSACTION_END);
        assert!(is_transaction_boundary(&record));
    }

    #[test]
    fn test_stream_and_event_type_records_are_not_boundaries() {
        let stream = StreamRecord::new(
            Timestamp::now(),
            RecordId::new(),
            0,
            StreamHeader {
                partition_id: RecordId::new(),
                stream_type_id: RecordId::new(),
                reference_number: 1024,
            },
            "orders",
        )
        .unwrap();
        let event_type = EventTypeRecord::new(
            Timestamp::now(),
            RecordId::new(),
            0,
            EventTypeHeader {
                parent_event_type_id: RecordId::NIL,
                partition_id: RecordId::new(),
                reference_number: 7,
                event_type_version: 1,
            },
            "OrderPlaced",
        )
        .unwrap();

        assert!(!is_transaction_boundary(&LogRecord::Stream(stream)));
        assert!(!is_transaction_boundary(&LogRecord::EventType(event_type)));
    }

    #[test]
    fn test_unified_transaction_records() {
        let transaction_id = RecordId::new();
        let start = TransactionStartRecord::new(
            Timestamp::now(),
            transaction_id,
            0,
            TransactionStartHeader {
                status: 0,
                transaction_type: 0,
                record_count: 1,
            },
            &[],
        )
        .unwrap();
        let end = TransactionEndRecord::new(
            Timestamp::now(),
            transaction_id,
            48,
            TransactionEndHeader { record_count: 1 },
            &[],
        )
        .unwrap();
        let content_type = ContentTypeRecord::new(
            Timestamp::now(),
            RecordId::new(),
            0,
            ContentTypeHeader {
                partition_id: RecordId::new(),
                reference_number: 1,
            },
            "application/json",
        )
        .unwrap();

        assert!(!is_transaction_boundary(&LogRecord::TransactionStart(start)));
        assert!(is_transaction_boundary(&LogRecord::TransactionEnd(end)));
        assert!(is_transaction_boundary(&LogRecord::ContentType(content_type)));
    }

    #[test]
    fn test_commit_and_system_records_are_boundaries() {
        assert!(is_transaction_boundary(&commit(10, 0)));
        let system = SystemLogRecord::new(
            0,
            Timestamp::now(),
            SystemRecordType::Epoch,
            SystemRecordSerialization::Json,
            b"{}".to_vec(),
        )
        .unwrap();
        assert!(is_transaction_boundary(&LogRecord::System(system)));
    }

    #[test]
    fn test_stream_write_uses_header_flags() {
        let header = StreamWriteHeader {
            correlation_id: RecordId::new(),
            stream_number: 1024,
            event_count: 0,
            flags: (PrepareFlags::SINGLE_WRITE | PrepareFlags::IS_COMMITTED).bits(),
            expected_version: -2,
            transaction_position: 0,
            transaction_offset: 0,
        };
        let event = StreamWriteEvent {
            event_type_number: 7,
            flags: 0,
            event_id: RecordId::new(),
            data: b"a",
            metadata: b"",
        };
        let write = StreamWriteRecord::new(Timestamp::now(), 0, header, &[event, event]).unwrap();
        let (resolved, stats) = resolve_transactions(vec![LogRecord::StreamWrite(write)]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].event_count(), 2);
        assert_eq!(stats.implicit_committed, 1);
    }

    #[test]
    fn test_implicit_transaction_resolves_at_end() {
        let mut resolver = TransactionResolver::new();
        let committed = PrepareFlags::DATA | PrepareFlags::IS_COMMITTED;
        assert!(resolver
            .push(prepare(0, 0, committed | PrepareFlags::TRANSACTION_BEGIN))
            .is_none());
        assert!(resolver.push(prepare(100, 0, committed)).is_none());
        let resolved = resolver
            .push(prepare(200, 0, committed | PrepareFlags::TRANSACTION_END))
            .unwrap();

        assert!(resolved.is_implicit());
        assert_eq!(resolved.transaction_position, 0);
        assert_eq!(resolved.prepares.len(), 3);
        assert_eq!(resolver.pending_count(), 0);
    }

    #[test]
    fn test_explicit_transaction_waits_for_commit() {
        let mut resolver = TransactionResolver::new();
        assert!(resolver
            .push(prepare(0, 0, PrepareFlags::DATA | PrepareFlags::TRANSACTION_BEGIN))
            .is_none());
        // interleaved single write from another writer
        assert!(resolver
            .push(prepare(100, 100, PrepareFlags::SINGLE_WRITE | PrepareFlags::IS_COMMITTED))
            .is_some());
        assert!(resolver
            .push(prepare(200, 0, PrepareFlags::DATA | PrepareFlags::TRANSACTION_END))
            .is_none());

        let resolved = resolver.push(commit(300, 0)).unwrap();
        assert!(!resolved.is_implicit());
        assert_eq!(resolved.prepares.len(), 2);
        assert_eq!(resolved.commit.as_ref().unwrap().transaction_position(), 0);

        let stats = resolver.finish();
        assert_eq!(stats.explicit_committed, 1);
        assert_eq!(stats.implicit_committed, 1);
        assert_eq!(stats.incomplete, 0);
    }

    #[test]
    fn test_orphaned_commit_and_incomplete_transaction() {
        let (resolved, stats) = resolve_transactions(vec![
            commit(0, 5000),
            prepare(100, 100, PrepareFlags::DATA | PrepareFlags::TRANSACTION_BEGIN),
        ]);
        assert!(resolved.is_empty());
        assert_eq!(stats.orphaned_commits, 1);
        assert_eq!(stats.incomplete, 1);
    }
}
