//! Integration tests for epoch chains stored in a log
//!
//! These tests verify that:
//! 1. Epochs written to a log are walked back identically in both families
//! 2. Walks honor their limit and reject records that are not epochs or
//!    that do not link strictly backward
//! 3. Validation fails at exactly the step where a follower diverged
//! 4. A follower truncated to the last matching epoch validates again

use tflog_core::{Error, RecordId, Timestamp};
use tflog_durability::format::unified::EpochHeader;
use tflog_durability::format::{UnifiedEpochRecord, EPOCH_INFORMATION_STREAM};
use tflog_durability::{
    validate_epoch_chain, CodecConfig, EpochChain, EpochRecord, LogRecord, MemoryLog,
    PrepareLogRecord, RecordFamily, RecordSource,
};

/// Helper to write `count` epochs with a user event after each
fn write_epochs(log: &MemoryLog, count: usize) -> EpochChain {
    let mut chain = EpochChain::new();
    for i in 0..count {
        log.write_epoch(&mut chain, RecordId::new(), Some(RecordId::new()), Timestamp::now())
            .unwrap();
        if log.family() == RecordFamily::Classic {
            let record: LogRecord = PrepareLogRecord::single_write(
                log.writer_checkpoint(),
                format!("user-{}", i),
                "LoggedIn",
                b"{}".to_vec(),
            )
            .build()
            .unwrap()
            .into();
            log.append(record).unwrap();
        }
    }
    chain
}

fn epoch_ids(chain: &EpochChain) -> Vec<(i32, RecordId, i64)> {
    chain
        .epochs()
        .iter()
        .map(|e| (e.epoch_number, e.epoch_id, e.epoch_position))
        .collect()
}

// ============================================================================
// Walk Tests
// ============================================================================

#[test]
fn test_epoch_walk_in_both_families() {
    for family in [RecordFamily::Classic, RecordFamily::Unified] {
        let log = MemoryLog::new(CodecConfig::for_testing().with_family(family)).unwrap();
        let written = write_epochs(&log, 4);

        let latest = EpochChain::find_latest_position(&log).unwrap().unwrap();
        assert_eq!(latest, written.last().unwrap().epoch_position);

        let loaded = EpochChain::walk_back(&log, latest, 100).unwrap();
        assert_eq!(epoch_ids(&loaded), epoch_ids(&written), "family {}", family);
        assert!(loaded.epochs()[0].is_first());
        assert!(validate_epoch_chain(loaded.epochs(), written.epochs()).is_ok());
    }
}

#[test]
fn test_walk_stops_at_limit() {
    let log = MemoryLog::new(CodecConfig::for_testing()).unwrap();
    let written = write_epochs(&log, 5);

    let loaded = EpochChain::load(&log, 2).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.epochs(), &written.epochs()[3..]);
    assert!(!loaded.epochs()[0].is_first());
}

#[test]
fn test_walk_rejects_non_epoch_record() {
    let log = MemoryLog::new(CodecConfig::for_testing()).unwrap();
    write_epochs(&log, 1);
    let (user_event_position, _) = log.read_prev(log.writer_checkpoint()).unwrap().unwrap();

    assert!(matches!(
        EpochChain::walk_back(&log, user_event_position, 10),
        Err(Error::InvalidEpochPayload { .. })
    ));
}

/// Helper to write a unified epoch whose back link is not checked
fn write_linked_epoch(log: &MemoryLog, epoch_number: i32, prev_epoch_position: i64) -> i64 {
    let position = log.writer_checkpoint();
    let record = UnifiedEpochRecord::new(
        Timestamp::now(),
        RecordId::new(),
        position,
        EpochHeader {
            prev_epoch_position,
            epoch_number,
            leader_instance_id: RecordId::new(),
        },
        &[],
    )
    .unwrap();
    log.append(LogRecord::Epoch(record)).unwrap();
    position
}

#[test]
fn test_walk_rejects_self_reference() {
    let log = MemoryLog::new(CodecConfig::for_testing().with_family(RecordFamily::Unified)).unwrap();
    let position = write_linked_epoch(&log, 0, 0);

    match EpochChain::walk_back(&log, position, usize::MAX) {
        Err(Error::InvalidEpochPayload { log_position, .. }) => assert_eq!(log_position, position),
        other => panic!("expected InvalidEpochPayload, got {:?}", other),
    }
}

#[test]
fn test_walk_rejects_forward_reference() {
    let log = MemoryLog::new(CodecConfig::for_testing().with_family(RecordFamily::Unified)).unwrap();
    // the first epoch points at the one written after it, closing a cycle
    let record_size = 72 + 8;
    let first = write_linked_epoch(&log, 0, record_size);
    let second = write_linked_epoch(&log, 1, first);
    assert_eq!(second, record_size);

    match EpochChain::walk_back(&log, second, usize::MAX) {
        Err(Error::InvalidEpochPayload { log_position, .. }) => assert_eq!(log_position, first),
        other => panic!("expected InvalidEpochPayload, got {:?}", other),
    }
}

#[test]
fn test_empty_log_has_no_epochs() {
    let log = MemoryLog::new(CodecConfig::for_testing()).unwrap();
    assert_eq!(EpochChain::find_latest_position(&log).unwrap(), None);
    assert!(EpochChain::load(&log, 10).unwrap().is_empty());
}

#[test]
fn test_epoch_information_prepare_follows_epoch() {
    let log = MemoryLog::new(CodecConfig::for_testing()).unwrap();
    let mut chain = EpochChain::new();
    let epoch = log
        .write_epoch(&mut chain, RecordId::new(), None, Timestamp::now())
        .unwrap();
    let info = epoch
        .epoch_information_prepare(log.writer_checkpoint(), -1)
        .unwrap();
    log.append(info.into()).unwrap();

    let (_, record) = log.read_prev(log.writer_checkpoint()).unwrap().unwrap();
    let LogRecord::Prepare(prepare) = record else {
        panic!("expected a prepare");
    };
    assert_eq!(prepare.event_stream_id(), EPOCH_INFORMATION_STREAM);
    let payload: serde_json::Value = serde_json::from_slice(prepare.data()).unwrap();
    assert_eq!(payload["EpochNumber"], 0);
    assert_eq!(payload["PrevEpochPosition"], -1);
    assert_eq!(EpochChain::load(&log, 10).unwrap(), chain);
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_replaced_epoch_fails_at_exact_step() {
    let leader_log = MemoryLog::new(CodecConfig::for_testing()).unwrap();
    let leader = write_epochs(&leader_log, 3);

    for replaced in 0..3 {
        let mut follower: Vec<EpochRecord> = leader.epochs().to_vec();
        follower[replaced].epoch_id = RecordId::new();

        let mismatch = validate_epoch_chain(&follower, leader.epochs()).unwrap_err();
        assert_eq!(mismatch.step, replaced);
        assert_eq!(mismatch.follower.epoch_position, leader.epochs()[replaced].epoch_position);
        assert_eq!(
            mismatch.last_matching,
            replaced.checked_sub(1).map(|i| leader.epochs()[i])
        );
    }
}

#[test]
fn test_diverged_follower_truncates_and_validates() {
    let config = CodecConfig::for_testing();
    let leader_log = MemoryLog::new(config.clone()).unwrap();
    let leader = write_epochs(&leader_log, 2);

    // follower shares the first term, then writes a term of its own
    let shared_end = leader.epochs()[1].epoch_position;
    let follower_log =
        MemoryLog::from_bytes(config, leader_log.to_bytes()[..shared_end as usize].to_vec()).unwrap();
    let mut follower = EpochChain::load(&follower_log, 10).unwrap();
    follower_log
        .write_epoch(&mut follower, RecordId::new(), None, Timestamp::now())
        .unwrap();

    let mismatch = validate_epoch_chain(follower.epochs(), leader.epochs()).unwrap_err();
    assert_eq!(mismatch.step, 1);
    let last_matching = mismatch.last_matching.unwrap();
    assert_eq!(last_matching, leader.epochs()[0]);

    follower_log.truncate(mismatch.follower.epoch_position).unwrap();
    let follower = EpochChain::load(&follower_log, 10).unwrap();
    assert!(validate_epoch_chain(follower.epochs(), leader.epochs()).is_ok());
    assert!(follower.is_correct_epoch_at(
        last_matching.epoch_position,
        last_matching.epoch_number,
        last_matching.epoch_id
    ));
}
