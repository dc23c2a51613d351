//! Verse scheduling: a persistent cursor over the corpus that only moves
//! forward once a reel for the allocated range has been produced.

pub mod advancer;
pub mod allocator;
pub mod corpus;
pub mod error;
pub mod lock;
pub mod store;
pub mod types;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use allocator::RangePolicy;
pub use corpus::CorpusIndex;
pub use error::{Result, SchedulerError};
pub use lock::RunLock;
pub use store::{ProgressStore, SqliteStore};
pub use types::{Allocation, HistoryEntry, Position, VerseAddress, VerseRange};

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub chapter: u16,
    pub chapter_name: Option<&'static str>,
    pub verse: u16,
    pub total_reels_generated: u64,
    pub total_verses_narrated: u64,
    pub last_updated: DateTime<Utc>,
    pub percentage_complete: f64,
    pub verses_remaining: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReciterCount {
    pub reciter_key: String,
    pub reels: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    #[serde(flatten)]
    pub status: Status,
    pub history_entries: u64,
    pub reciter_distribution: Vec<ReciterCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub range: VerseRange,
    pub verse_count: u32,
    pub position: Position,
    pub corpus_completed: bool,
}

/// Entry point for the CLI: owns the corpus index, the range policy and the store.
pub struct Scheduler<S: ProgressStore> {
    index: CorpusIndex,
    policy: RangePolicy,
    store: S,
}

impl<S: ProgressStore> Scheduler<S> {
    pub fn new(index: CorpusIndex, policy: RangePolicy, store: S) -> Self {
        Scheduler {
            index,
            policy,
            store,
        }
    }

    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    pub fn current_position(&mut self) -> Result<Position> {
        self.store.position()
    }

    pub fn status(&mut self) -> Result<Status> {
        let position = self.current_position()?;
        let current = self.index.validate(position.current)?;
        Ok(Status {
            chapter: current.chapter,
            chapter_name: corpus::chapter_name(current.chapter),
            verse: current.verse,
            total_reels_generated: position.total_reels_generated,
            total_verses_narrated: position.total_verses_narrated,
            last_updated: position.last_updated,
            percentage_complete: self.index.percentage_complete(current)?,
            verses_remaining: self.index.verses_remaining(current)?,
        })
    }

    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.store.recent_history(limit)
    }

    /// Preview of the next range; does not move the cursor.
    pub fn next_range(&mut self, verse_count: u32) -> Result<Allocation> {
        let position = self.store.position()?;
        allocator::allocate(&self.index, position.current, verse_count, &self.policy)
    }

    /// Commit a range whose reel was produced successfully.
    ///
    /// Fails with `OutOfOrderCommit` unless `range.start` is the stored
    /// position, which is what makes re-running production after a crash safe.
    pub fn record_success(
        &mut self,
        range: VerseRange,
        reciter_key: &str,
        output_reference: &str,
    ) -> Result<CommitOutcome> {
        let position = self.store.position()?;
        let commit = advancer::plan_commit(
            &self.index,
            &self.policy,
            &position,
            range,
            reciter_key,
            output_reference,
            Utc::now(),
        )?;
        let position = self.store.commit(&commit)?;
        Ok(CommitOutcome {
            range: commit.range,
            verse_count: commit.verse_count,
            position,
            corpus_completed: commit.corpus_completed,
        })
    }

    /// Administrative override; counters and history are left alone.
    pub fn jump_to(&mut self, chapter: u16, verse: u16) -> Result<Position> {
        let addr = self.index.validate(VerseAddress::new(chapter, verse))?;
        self.store.set_current(addr, Utc::now())
    }

    pub fn reset(&mut self) -> Result<Position> {
        self.jump_to(1, 1)
    }

    pub fn already_produced(&self, range: &VerseRange) -> Result<bool> {
        self.store.contains_range(range)
    }

    pub fn statistics(&mut self) -> Result<Statistics> {
        Ok(Statistics {
            status: self.status()?,
            history_entries: self.store.history_len()?,
            reciter_distribution: self
                .store
                .reciter_distribution()?
                .into_iter()
                .map(|(reciter_key, reels)| ReciterCount { reciter_key, reels })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> Scheduler<SqliteStore> {
        Scheduler::new(
            CorpusIndex::quran(),
            RangePolicy::default(),
            SqliteStore::open_in_memory().unwrap(),
        )
    }

    fn produce_next(s: &mut Scheduler<SqliteStore>, count: u32) -> CommitOutcome {
        let alloc = s.next_range(count).unwrap();
        s.record_success(alloc.range, "alafasy", "reel.mp4").unwrap()
    }

    #[test]
    fn short_chapter_scenario() {
        let mut s = scheduler();
        s.jump_to(112, 1).unwrap();

        let alloc = s.next_range(4).unwrap();
        assert_eq!(alloc.range.to_string(), "112:1-4");

        let outcome = s.record_success(alloc.range, "alafasy", "reel.mp4").unwrap();
        assert_eq!(outcome.position.current, VerseAddress::new(113, 1));
        assert_eq!(outcome.position.total_verses_narrated, 4);
        assert_eq!(outcome.position.total_reels_generated, 1);
    }

    #[test]
    fn corpus_wraps_after_final_verse() {
        let mut s = scheduler();
        s.jump_to(114, 6).unwrap();

        let alloc = s.next_range(1).unwrap();
        assert_eq!(alloc.range, VerseRange::single(VerseAddress::new(114, 6)));
        assert!(alloc.corpus_completed);

        let outcome = s.record_success(alloc.range, "alafasy", "reel.mp4").unwrap();
        assert!(outcome.corpus_completed);
        assert_eq!(outcome.position.current, VerseAddress::first());
    }

    #[test]
    fn uncommitted_allocation_is_repeatable() {
        let mut s = scheduler();
        produce_next(&mut s, 3);

        // Production "crashed": nothing was committed, so the retry sees the same range.
        let first = s.next_range(3).unwrap();
        let retry = s.next_range(3).unwrap();
        assert_eq!(first, retry);
        assert_eq!(first.range.start, s.current_position().unwrap().current);
    }

    #[test]
    fn out_of_order_commit_leaves_position() {
        let mut s = scheduler();
        let before = s.current_position().unwrap();
        let err = s
            .record_success("1:3-5".parse().unwrap(), "alafasy", "reel.mp4")
            .unwrap_err();
        assert!(matches!(err, SchedulerError::OutOfOrderCommit { .. }));
        assert_eq!(s.current_position().unwrap(), before);
        assert!(s.history(10).unwrap().is_empty());
    }

    #[test]
    fn counters_sum_over_commits() {
        let mut s = scheduler();
        let mut verses = 0u64;
        for count in [3, 4, 2, 5, 1] {
            verses += u64::from(produce_next(&mut s, count).verse_count);
        }
        let position = s.current_position().unwrap();
        assert_eq!(position.total_reels_generated, 5);
        assert_eq!(position.total_verses_narrated, verses);
    }

    #[test]
    fn jump_keeps_counters_and_history() {
        let mut s = scheduler();
        produce_next(&mut s, 3);
        let before = s.current_position().unwrap();

        let position = s.jump_to(36, 1).unwrap();
        assert_eq!(position.current, VerseAddress::new(36, 1));
        assert_eq!(position.total_reels_generated, before.total_reels_generated);
        assert_eq!(position.total_verses_narrated, before.total_verses_narrated);
        assert_eq!(s.history(10).unwrap().len(), 1);

        assert!(matches!(
            s.jump_to(36, 84),
            Err(SchedulerError::InvalidAddress { .. })
        ));
        assert_eq!(s.current_position().unwrap().current, VerseAddress::new(36, 1));
    }

    #[test]
    fn history_is_newest_first_and_stable() {
        let mut s = scheduler();
        let mut ranges = Vec::new();
        for _ in 0..5 {
            ranges.push(produce_next(&mut s, 1).range);
        }

        let recent = s.history(3).unwrap();
        let got: Vec<_> = recent.iter().map(|e| e.range).collect();
        assert_eq!(got, vec![ranges[4], ranges[3], ranges[2]]);
        assert_eq!(s.history(3).unwrap(), recent);
    }

    #[test]
    fn status_reports_progress() {
        let mut s = scheduler();
        s.jump_to(2, 1).unwrap();
        let status = s.status().unwrap();
        assert_eq!(status.chapter, 2);
        assert_eq!(status.chapter_name, Some("Al-Baqarah"));
        assert_eq!(status.verses_remaining, corpus::TOTAL_VERSES - 7);
        assert!(status.percentage_complete > 0.0);
    }

    #[test]
    fn statistics_and_duplicates() {
        let mut s = scheduler();
        let outcome = produce_next(&mut s, 7);
        assert!(s.already_produced(&outcome.range).unwrap());

        s.reset().unwrap();
        let again = s.next_range(7).unwrap();
        assert!(s.already_produced(&again.range).unwrap());

        let stats = s.statistics().unwrap();
        assert_eq!(stats.history_entries, 1);
        assert_eq!(stats.reciter_distribution.len(), 1);
        assert_eq!(stats.reciter_distribution[0].reels, 1);
    }
}
