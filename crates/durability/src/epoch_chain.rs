//! Epoch chain maintenance and validation.
//!
//! Every leadership term writes one epoch record. Each epoch points back at
//! the position of its predecessor, so the chain can be rebuilt from the
//! newest epoch alone:
//!
//! ```text
//! E0(prev=-1) <- E1(prev=E0) <- E2(prev=E1) <- ...
//! ```
//!
//! A follower may only continue replicating from a leader if its chain is a
//! prefix of the leader's. `validate_epoch_chain` reports the first step
//! where that is not the case; truncating the diverged suffix is up to the
//! caller.

use crate::format::{append_epoch, EpochRecord, Record};
use crate::source::RecordSource;
use tflog_core::{Error, RecordId, Result, Timestamp};
use tracing::{debug, warn};

/// Epochs of a log, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpochChain {
    epochs: Vec<EpochRecord>,
}

impl EpochChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from epochs ordered oldest first, checking every link.
    pub fn from_epochs(epochs: Vec<EpochRecord>) -> Result<Self> {
        let mut chain = EpochChain::new();
        for epoch in epochs {
            chain.push(epoch)?;
        }
        Ok(chain)
    }

    /// Add the next epoch.
    ///
    /// The epoch must point back at the current last epoch and carry a
    /// higher number. The first epoch of a chain is accepted as is, since a
    /// chain read with a walk limit may start mid-log.
    pub fn push(&mut self, epoch: EpochRecord) -> Result<()> {
        if let Some(last) = self.epochs.last() {
            check_link(last, &epoch)?;
        }
        self.epochs.push(epoch);
        Ok(())
    }

    /// Create the epoch that follows the last one, ready to be written at
    /// `epoch_position`.
    pub fn next_epoch(
        &self,
        epoch_position: i64,
        epoch_id: RecordId,
        leader_instance_id: Option<RecordId>,
        timestamp: Timestamp,
    ) -> Result<EpochRecord> {
        let (epoch_number, prev_epoch_position) = match self.epochs.last() {
            Some(last) => {
                let number = last.epoch_number.checked_add(1).ok_or_else(|| {
                    Error::InvalidArgument(format!("epoch number {} overflows", last.epoch_number))
                })?;
                (number, last.epoch_position)
            }
            None => (0, -1),
        };
        append_epoch(
            epoch_position,
            epoch_number,
            epoch_id,
            prev_epoch_position,
            leader_instance_id,
            timestamp,
        )
    }

    /// Epochs, oldest first
    pub fn epochs(&self) -> &[EpochRecord] {
        &self.epochs
    }

    /// The newest epoch
    pub fn last(&self) -> Option<&EpochRecord> {
        self.epochs.last()
    }

    /// Number of the newest epoch, -1 for an empty chain
    pub fn last_epoch_number(&self) -> i32 {
        self.epochs.last().map_or(-1, |epoch| epoch.epoch_number)
    }

    /// Number of epochs held
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// True if the chain holds no epochs
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// The epoch with `epoch_number`, if held.
    pub fn get(&self, epoch_number: i32) -> Option<&EpochRecord> {
        self.epochs
            .binary_search_by_key(&epoch_number, |epoch| epoch.epoch_number)
            .ok()
            .map(|index| &self.epochs[index])
    }

    /// True if epoch `epoch_number` with `epoch_id` was written at
    /// `epoch_position`.
    pub fn is_correct_epoch_at(&self, epoch_position: i64, epoch_number: i32, epoch_id: RecordId) -> bool {
        self.get(epoch_number)
            .is_some_and(|epoch| epoch.epoch_position == epoch_position && epoch.epoch_id == epoch_id)
    }

    /// The first epoch numbered above `epoch_number`.
    pub fn epoch_after(&self, epoch_number: i32) -> Option<&EpochRecord> {
        self.epochs.iter().find(|epoch| epoch.epoch_number > epoch_number)
    }

    /// Read the chain backwards from the epoch at `latest_position`,
    /// following previous-epoch pointers for at most `max_count` epochs.
    pub fn walk_back<S>(source: &S, latest_position: i64, max_count: usize) -> Result<Self>
    where
        S: RecordSource + ?Sized,
    {
        let mut newest_first: Vec<EpochRecord> = Vec::new();
        let mut position = latest_position;

        while position >= 0 && newest_first.len() < max_count {
            let record = source.read_at(position)?;
            let epoch = record.as_epoch()?.ok_or_else(|| {
                Error::epoch_payload(
                    position,
                    format!("{} record where an epoch was expected", Record::kind(&record)),
                )
            })?;
            if epoch.epoch_position != position {
                return Err(Error::epoch_payload(
                    position,
                    format!("epoch claims position {}", epoch.epoch_position),
                ));
            }
            if epoch.prev_epoch_position >= position {
                return Err(Error::epoch_payload(
                    position,
                    format!(
                        "previous epoch position {} does not precede the epoch",
                        epoch.prev_epoch_position
                    ),
                ));
            }
            position = epoch.prev_epoch_position;
            newest_first.push(epoch);
        }

        newest_first.reverse();
        let chain = EpochChain::from_epochs(newest_first)
            .map_err(|e| Error::epoch_payload(latest_position, e.to_string()))?;
        debug!(
            latest_position,
            epochs = chain.len(),
            last_epoch_number = chain.last_epoch_number(),
            "Epoch chain loaded"
        );
        Ok(chain)
    }

    /// Position of the newest epoch record, found by scanning back from the
    /// end of the log.
    pub fn find_latest_position<S>(source: &S) -> Result<Option<i64>>
    where
        S: RecordSource + ?Sized,
    {
        let mut position = source.writer_checkpoint();
        while let Some((start, record)) = source.read_prev(position)? {
            if record.as_epoch()?.is_some() {
                return Ok(Some(start));
            }
            position = start;
        }
        Ok(None)
    }

    /// Load the newest `max_count` epochs of a log.
    pub fn load<S>(source: &S, max_count: usize) -> Result<Self>
    where
        S: RecordSource + ?Sized,
    {
        match Self::find_latest_position(source)? {
            Some(position) => Self::walk_back(source, position, max_count),
            None => Ok(EpochChain::new()),
        }
    }
}

fn check_link(prev: &EpochRecord, next: &EpochRecord) -> Result<()> {
    if next.prev_epoch_position != prev.epoch_position {
        return Err(Error::InvalidArgument(format!(
            "epoch {} points at {}, previous epoch is at {}",
            next.epoch_number, next.prev_epoch_position, prev.epoch_position
        )));
    }
    if next.epoch_number <= prev.epoch_number || next.epoch_position <= prev.epoch_position {
        return Err(Error::InvalidArgument(format!(
            "epoch {} at {} does not follow epoch {} at {}",
            next.epoch_number, next.epoch_position, prev.epoch_number, prev.epoch_position
        )));
    }
    Ok(())
}

/// First point where a follower's epochs leave the leader's history.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("epoch chain diverges at step {step}: follower has {follower}")]
pub struct EpochChainMismatch {
    /// Index of the first mismatching epoch, oldest first
    pub step: usize,
    /// Follower epoch at that step
    pub follower: EpochRecord,
    /// Leader epoch at that step, `None` if the leader's chain is shorter
    pub leader: Option<EpochRecord>,
    /// Newest epoch both chains agree on
    pub last_matching: Option<EpochRecord>,
}

/// Check that `follower` is a prefix of `leader`.
///
/// Both chains are ordered oldest first and compared by epoch number, id
/// and position at each step.
pub fn validate_epoch_chain(
    follower: &[EpochRecord],
    leader: &[EpochRecord],
) -> std::result::Result<(), EpochChainMismatch> {
    let mut last_matching = None;
    for (step, theirs) in follower.iter().enumerate() {
        let ours = leader.get(step);
        let matches = ours.is_some_and(|ours| {
            ours.epoch_number == theirs.epoch_number
                && ours.epoch_id == theirs.epoch_id
                && ours.epoch_position == theirs.epoch_position
        });
        if !matches {
            let mismatch = EpochChainMismatch {
                step,
                follower: *theirs,
                leader: ours.copied(),
                last_matching,
            };
            warn!(
                step,
                follower_epoch = theirs.epoch_number,
                follower_position = theirs.epoch_position,
                last_matching_position = last_matching.map(|e: EpochRecord| e.epoch_position),
                "Epoch chain diverged"
            );
            return Err(mismatch);
        }
        last_matching = Some(*theirs);
    }
    Ok(())
}
