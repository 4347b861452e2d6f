//! On-disk format of transaction log records.
//!
//! This module is the single source of truth for record byte layouts:
//!
//! - `framing`: length prefix/suffix around every record
//! - `codec`: sequential field codec of the classic family
//! - `bytes`: bounds-checked little-endian access for offset-based reads
//! - `prepare`, `commit`, `system`: classic records
//! - `unified`: unified record family
//! - `epoch`: epoch records in both families
//! - `view`: zero-copy prepare inspection
//! - `record`: the closed `LogRecord` set and family dispatch

pub mod bytes;
pub mod codec;
pub mod commit;
pub mod contract;
pub mod epoch;
pub mod framing;
pub mod kind;
pub mod prepare;
pub mod record;
pub mod system;
pub mod unified;
pub mod version;
pub mod view;

pub use commit::CommitLogRecord;
pub use contract::{EventTypeRef, PrepareRecord, StreamRef};
pub use epoch::{
    append_epoch, decode_epoch, EpochRecord, EPOCH_INFORMATION_EVENT_TYPE,
    EPOCH_INFORMATION_STREAM,
};
pub use framing::{
    frame, next_log_position, prev_log_position, read_frame_backward, read_frame_forward,
    write_frame, FramedRecord, FRAMING_OVERHEAD,
};
pub use kind::LogRecordKind;
pub use prepare::{PrepareFlags, PrepareLogRecord, PrepareRecordBuilder, STREAM_DELETED_EVENT_TYPE};
pub use record::{LogRecord, Record, RecordFamily};
pub use system::{SystemLogRecord, SystemRecordSerialization, SystemRecordType};
pub use unified::{
    ContentTypeRecord, EventTypeRecord, PartitionRecord, PartitionTypeRecord, RecordHeader,
    StreamRecord, StreamTypeRecord, StreamWriteEvent, StreamWriteRecord, TransactionEndRecord,
    TransactionStartRecord, UnifiedEpochRecord, UnifiedRecord, RECORD_HEADER_SIZE,
};
pub use version::{LOG_RECORD_V0, LOG_RECORD_V1};
pub use view::PrepareRecordView;
