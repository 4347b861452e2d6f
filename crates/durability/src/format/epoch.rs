//! Epoch records.
//!
//! An epoch marks the start of a leadership term. Each epoch points back at
//! the position of the previous one, so the epochs in a log form a chain
//! that replicas compare to find where their histories diverge.
//!
//! The classic family stores an epoch as a system record with a JSON
//! payload; the unified family stores the same fields in a fixed
//! sub-header (see [`crate::format::unified::EpochHeader`]).
//!
//! # JSON Payload
//!
//! ```text
//! {
//!   "EpochPosition": 4096,
//!   "EpochNumber": 3,
//!   "EpochId": "…",
//!   "PrevEpochPosition": 1024,
//!   "TimeStamp": "2024-05-01T10:00:00.1234567Z",
//!   "LeaderInstanceId": "…"          (optional)
//! }
//! ```

use crate::format::prepare::{PrepareFlags, PrepareLogRecord};
use crate::format::system::{SystemLogRecord, SystemRecordSerialization, SystemRecordType};
use crate::format::unified::{EpochHeader, UnifiedEpochRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tflog_core::{Error, RecordId, Result, Timestamp};

/// Stream that receives one information event per epoch
pub const EPOCH_INFORMATION_STREAM: &str = "$epoch-information";

/// Event type of epoch information events
pub const EPOCH_INFORMATION_EVENT_TYPE: &str = "$epoch-information";

/// One link of the epoch chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochRecord {
    /// Position the epoch record is written at
    pub epoch_position: i64,
    /// Epoch number, increasing by one per term
    pub epoch_number: i32,
    /// Unique identifier of the epoch
    pub epoch_id: RecordId,
    /// Position of the previous epoch, -1 for the first
    pub prev_epoch_position: i64,
    /// Time the epoch started
    pub timestamp: Timestamp,
    /// Leader that started the epoch
    pub leader_instance_id: Option<RecordId>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EpochPayload {
    epoch_position: i64,
    epoch_number: i32,
    epoch_id: RecordId,
    prev_epoch_position: i64,
    #[serde(rename = "TimeStamp")]
    time_stamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    leader_instance_id: Option<RecordId>,
}

/// Create the next link of the chain.
pub fn append_epoch(
    epoch_position: i64,
    epoch_number: i32,
    epoch_id: RecordId,
    prev_epoch_position: i64,
    leader_instance_id: Option<RecordId>,
    timestamp: Timestamp,
) -> Result<EpochRecord> {
    epoch_id.ensure_not_nil("epoch_id")?;
    if epoch_position < 0 {
        return Err(Error::InvalidArgument(format!(
            "epoch position {} is negative",
            epoch_position
        )));
    }
    if epoch_number < 0 {
        return Err(Error::InvalidArgument(format!(
            "epoch number {} is negative",
            epoch_number
        )));
    }
    if prev_epoch_position < -1 || prev_epoch_position >= epoch_position {
        return Err(Error::InvalidArgument(format!(
            "previous epoch position {} must be -1 or before {}",
            prev_epoch_position, epoch_position
        )));
    }
    Ok(EpochRecord {
        epoch_position,
        epoch_number,
        epoch_id,
        prev_epoch_position,
        timestamp,
        leader_instance_id: leader_instance_id.filter(|id| !id.is_nil()),
    })
}

/// Read an epoch from a classic system record.
pub fn decode_epoch(record: &SystemLogRecord) -> Result<EpochRecord> {
    let log_position = record.log_position();
    if record.system_record_type() != SystemRecordType::Epoch {
        return Err(Error::epoch_payload(
            log_position,
            format!("system record type {}", record.system_record_type().as_byte()),
        ));
    }
    if record.serialization() != SystemRecordSerialization::Json {
        return Err(Error::epoch_payload(
            log_position,
            format!("serialization {}", record.serialization().as_byte()),
        ));
    }

    let payload: EpochPayload = serde_json::from_slice(record.data())
        .map_err(|e| Error::epoch_payload(log_position, e.to_string()))?;
    if payload.epoch_id.is_nil() {
        return Err(Error::epoch_payload(log_position, "empty epoch id"));
    }

    Ok(EpochRecord {
        epoch_position: payload.epoch_position,
        epoch_number: payload.epoch_number,
        epoch_id: payload.epoch_id,
        prev_epoch_position: payload.prev_epoch_position,
        timestamp: Timestamp::from_datetime(payload.time_stamp),
        leader_instance_id: payload.leader_instance_id.filter(|id| !id.is_nil()),
    })
}

impl EpochRecord {
    /// True for the first epoch of a log.
    pub fn is_first(&self) -> bool {
        self.prev_epoch_position < 0
    }

    /// JSON payload of the epoch.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let time_stamp = self.timestamp.to_datetime().ok_or_else(|| {
            Error::InvalidArgument(format!("timestamp {} out of range", self.timestamp.ticks()))
        })?;
        let payload = EpochPayload {
            epoch_position: self.epoch_position,
            epoch_number: self.epoch_number,
            epoch_id: self.epoch_id,
            prev_epoch_position: self.prev_epoch_position,
            time_stamp,
            leader_instance_id: self.leader_instance_id,
        };
        serde_json::to_vec(&payload).map_err(|e| Error::InvalidArgument(e.to_string()))
    }

    /// Classic system record carrying the epoch.
    pub fn to_system_record(&self) -> Result<SystemLogRecord> {
        SystemLogRecord::new(
            self.epoch_position,
            self.timestamp,
            SystemRecordType::Epoch,
            SystemRecordSerialization::Json,
            self.to_json()?,
        )
    }

    /// Unified epoch record.
    pub fn to_unified_record(&self) -> Result<UnifiedEpochRecord> {
        UnifiedEpochRecord::new(
            self.timestamp,
            self.epoch_id,
            self.epoch_position,
            EpochHeader {
                prev_epoch_position: self.prev_epoch_position,
                epoch_number: self.epoch_number,
                leader_instance_id: self.leader_instance_id.unwrap_or(RecordId::NIL),
            },
            &[],
        )
    }

    /// Read an epoch from a unified epoch record.
    pub fn from_unified_record(record: &UnifiedEpochRecord) -> Self {
        let sub_header = record.sub_header();
        EpochRecord {
            epoch_position: record.log_position(),
            epoch_number: sub_header.epoch_number,
            epoch_id: record.record_id(),
            prev_epoch_position: sub_header.prev_epoch_position,
            timestamp: record.timestamp(),
            leader_instance_id: Some(sub_header.leader_instance_id).filter(|id| !id.is_nil()),
        }
    }

    /// Prepare that publishes the epoch to `$epoch-information`.
    ///
    /// `expected_version` is `NoStream` for the first epoch, otherwise the
    /// event number of the previous epoch's information event.
    pub fn epoch_information_prepare(
        &self,
        log_position: i64,
        expected_version: i64,
    ) -> Result<PrepareLogRecord> {
        PrepareLogRecord::builder(log_position, EPOCH_INFORMATION_STREAM)
            .with_flags(PrepareFlags::SINGLE_WRITE | PrepareFlags::IS_COMMITTED | PrepareFlags::IS_JSON)
            .with_expected_version(expected_version)
            .with_timestamp(self.timestamp)
            .with_event_type(EPOCH_INFORMATION_EVENT_TYPE)
            .with_data(self.to_json()?)
            .build()
    }
}

impl std::fmt::Display for EpochRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "E{}@{}:{} (previous epoch at {})",
            self.epoch_number, self.epoch_position, self.epoch_id, self.prev_epoch_position
        )
    }
}
