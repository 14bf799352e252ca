//! Per-partition offset bookkeeping for the indexing stage.
//!
//! Kafka commits are cumulative: committing offset `n` acknowledges every
//! message below it. The tracker therefore only ever commits up to the lowest
//! offset that is still in flight or has failed, and asks for a seek back to
//! a failed offset so it is read again.

use std::collections::{BTreeSet, HashMap};

/// Default number of failed attempts before an offset is given up on.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// A `(topic, partition, offset)` triple as carried in stream messages.
pub type TopicOffset = (String, i32, i64);

#[derive(Debug)]
struct PartitionState {
    /// Offsets read but not yet acknowledged as indexed.
    outstanding: BTreeSet<i64>,
    /// Failed attempts per outstanding offset.
    attempts: HashMap<i64, u32>,
    /// Position last committed (or the first offset read when nothing was).
    committed: i64,
    /// Highest offset released so far.
    highest_released: Option<i64>,
}

impl PartitionState {
    fn starting_at(offset: i64) -> Self {
        Self {
            outstanding: BTreeSet::new(),
            attempts: HashMap::new(),
            committed: offset,
            highest_released: None,
        }
    }

    fn release(&mut self, offset: i64) {
        self.outstanding.remove(&offset);
        self.attempts.remove(&offset);
        self.highest_released = Some(self.highest_released.map_or(offset, |h| h.max(offset)));
    }

    /// The next offset that may be committed.
    fn watermark(&self) -> Option<i64> {
        match self.outstanding.first() {
            Some(lowest) => Some(*lowest),
            None => self.highest_released.map(|h| h + 1),
        }
    }
}

/// What the consumer must do after an acknowledgment.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AckDecision {
    /// Positions to commit, one per partition whose watermark advanced.
    pub commits: Vec<TopicOffset>,
    /// Positions to seek back to so failed messages are read again.
    pub seeks: Vec<TopicOffset>,
    /// Offsets that exhausted their attempts and were released unindexed.
    pub abandoned: Vec<TopicOffset>,
}

/// Tracks read, acknowledged and failed offsets for every assigned partition.
#[derive(Debug)]
pub struct OffsetTracker {
    partitions: HashMap<(String, i32), PartitionState>,
    max_attempts: u32,
}

impl Default for OffsetTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl OffsetTracker {
    /// Create a tracker that gives up on an offset after `max_attempts` failures.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            partitions: HashMap::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Record a message handed to the orchestrator (or about to be).
    pub fn track(&mut self, topic: &str, partition: i32, offset: i64) {
        self.partitions
            .entry((topic.to_string(), partition))
            .or_insert_with(|| PartitionState::starting_at(offset))
            .outstanding
            .insert(offset);
    }

    /// Apply an acknowledgment for `offsets` and decide what to commit or seek.
    pub fn acknowledge(&mut self, offsets: &[TopicOffset], success: bool) -> AckDecision {
        let mut decision = AckDecision::default();
        let mut touched: Vec<(String, i32)> = Vec::new();
        let mut rewind: HashMap<(String, i32), i64> = HashMap::new();

        for (topic, partition, offset) in offsets {
            let key = (topic.clone(), *partition);
            let Some(state) = self.partitions.get_mut(&key) else {
                continue;
            };

            if success {
                state.release(*offset);
            } else {
                let attempts = state.attempts.entry(*offset).or_insert(0);
                *attempts += 1;
                if *attempts >= self.max_attempts {
                    state.release(*offset);
                    decision.abandoned.push((topic.clone(), *partition, *offset));
                } else {
                    let lowest = rewind.entry(key.clone()).or_insert(*offset);
                    *lowest = (*lowest).min(*offset);
                }
            }

            if !touched.contains(&key) {
                touched.push(key);
            }
        }

        for key in touched {
            let Some(state) = self.partitions.get_mut(&key) else {
                continue;
            };
            if let Some(watermark) = state.watermark() {
                if watermark > state.committed {
                    state.committed = watermark;
                    decision.commits.push((key.0.clone(), key.1, watermark));
                }
            }
            if let Some(offset) = rewind.get(&key) {
                decision.seeks.push((key.0.clone(), key.1, *offset));
            }
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "index.works";

    fn offsets(range: std::ops::Range<i64>) -> Vec<TopicOffset> {
        range.map(|o| (TOPIC.to_string(), 0, o)).collect()
    }

    fn track_all(tracker: &mut OffsetTracker, range: std::ops::Range<i64>) {
        for offset in range {
            tracker.track(TOPIC, 0, offset);
        }
    }

    #[test]
    fn test_successful_batch_commits_next_offset() {
        let mut tracker = OffsetTracker::default();
        track_all(&mut tracker, 0..10);

        let decision = tracker.acknowledge(&offsets(0..10), true);

        assert_eq!(decision.commits, vec![(TOPIC.to_string(), 0, 10)]);
        assert!(decision.seeks.is_empty());
    }

    #[test]
    fn test_failed_batch_blocks_later_success() {
        let mut tracker = OffsetTracker::default();
        track_all(&mut tracker, 0..20);

        let failed = tracker.acknowledge(&offsets(0..10), false);
        assert!(failed.commits.is_empty());
        assert_eq!(failed.seeks, vec![(TOPIC.to_string(), 0, 0)]);

        let later = tracker.acknowledge(&offsets(10..20), true);
        assert!(later.commits.is_empty());
    }

    #[test]
    fn test_redelivered_batch_releases_watermark() {
        let mut tracker = OffsetTracker::default();
        track_all(&mut tracker, 0..20);
        tracker.acknowledge(&offsets(0..10), false);
        tracker.acknowledge(&offsets(10..20), true);

        // After the seek the failed messages are read and indexed again
        track_all(&mut tracker, 0..10);
        let decision = tracker.acknowledge(&offsets(0..10), true);

        assert_eq!(decision.commits, vec![(TOPIC.to_string(), 0, 20)]);
    }

    #[test]
    fn test_out_of_order_success_commits_contiguous_run() {
        let mut tracker = OffsetTracker::default();
        track_all(&mut tracker, 100..130);

        assert!(tracker.acknowledge(&offsets(110..120), true).commits.is_empty());

        let decision = tracker.acknowledge(&offsets(100..110), true);
        assert_eq!(decision.commits, vec![(TOPIC.to_string(), 0, 120)]);
    }

    #[test]
    fn test_skipped_message_does_not_pass_in_flight_batch() {
        let mut tracker = OffsetTracker::default();
        track_all(&mut tracker, 0..5);

        // An empty payload at offset 5 needs no indexing
        tracker.track(TOPIC, 0, 5);
        let decision = tracker.acknowledge(&offsets(5..6), true);
        assert!(decision.commits.is_empty());

        let decision = tracker.acknowledge(&offsets(0..5), true);
        assert_eq!(decision.commits, vec![(TOPIC.to_string(), 0, 6)]);
    }

    #[test]
    fn test_offset_abandoned_after_max_attempts() {
        let mut tracker = OffsetTracker::new(2);
        track_all(&mut tracker, 0..3);
        tracker.acknowledge(&offsets(1..3), true);

        let first = tracker.acknowledge(&offsets(0..1), false);
        assert_eq!(first.seeks, vec![(TOPIC.to_string(), 0, 0)]);
        assert!(first.abandoned.is_empty());

        tracker.track(TOPIC, 0, 0);
        let second = tracker.acknowledge(&offsets(0..1), false);
        assert_eq!(second.abandoned, vec![(TOPIC.to_string(), 0, 0)]);
        assert!(second.seeks.is_empty());
        assert_eq!(second.commits, vec![(TOPIC.to_string(), 0, 3)]);
    }

    #[test]
    fn test_partitions_are_independent() {
        let mut tracker = OffsetTracker::default();
        tracker.track(TOPIC, 0, 7);
        tracker.track(TOPIC, 1, 40);

        let ack = vec![(TOPIC.to_string(), 0, 7), (TOPIC.to_string(), 1, 40)];
        let decision = tracker.acknowledge(&ack[..1], false);
        assert_eq!(decision.seeks, vec![(TOPIC.to_string(), 0, 7)]);

        let decision = tracker.acknowledge(&ack[1..], true);
        assert_eq!(decision.commits, vec![(TOPIC.to_string(), 1, 41)]);
    }

    #[test]
    fn test_unknown_partition_ignored() {
        let mut tracker = OffsetTracker::default();
        assert_eq!(tracker.acknowledge(&offsets(0..3), true), AckDecision::default());
    }
}
