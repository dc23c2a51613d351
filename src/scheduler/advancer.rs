use chrono::{DateTime, Utc};

use super::allocator::RangePolicy;
use super::corpus::CorpusIndex;
use super::error::{Result, SchedulerError};
use super::types::{Position, VerseAddress, VerseRange};

/// A validated, ready-to-persist advancement of the cursor.
///
/// Built only after production succeeded. The store applies it in one
/// transaction and re-checks `range.start` against the stored position there,
/// so a stale plan fails with `OutOfOrderCommit` instead of skipping verses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressCommit {
    pub range: VerseRange,
    pub next: VerseAddress,
    pub verse_count: u32,
    pub reciter_key: String,
    pub output_reference: String,
    pub committed_at: DateTime<Utc>,
    pub corpus_completed: bool,
}

impl ProgressCommit {
    pub fn check_sequence(&self, position: &Position) -> Result<()> {
        ensure_in_order(position, self.range.start)
    }

    /// The position after this commit.
    pub fn apply_to(&self, position: &Position) -> Position {
        Position {
            current: self.next,
            total_reels_generated: position.total_reels_generated + 1,
            total_verses_narrated: position.total_verses_narrated + u64::from(self.verse_count),
            last_updated: self.committed_at,
        }
    }
}

fn ensure_in_order(position: &Position, start: VerseAddress) -> Result<()> {
    if position.current != start {
        return Err(SchedulerError::OutOfOrderCommit {
            expected: position.current,
            found: start,
        });
    }
    Ok(())
}

/// Validate a produced range against the stored position.
///
/// A valid start that is not the current position is always `OutOfOrderCommit`,
/// whatever else is wrong with the request.
pub fn plan_commit(
    index: &CorpusIndex,
    policy: &RangePolicy,
    position: &Position,
    range: VerseRange,
    reciter_key: &str,
    output_reference: &str,
    now: DateTime<Utc>,
) -> Result<ProgressCommit> {
    ensure_in_order(position, index.validate(range.start)?)?;
    let verse_count = index.verse_count(&range)?;
    if !policy.allow_cross_chapter && !range.within_one_chapter() {
        return Err(SchedulerError::InvalidRequest(format!(
            "range {} spans more than one chapter",
            range
        )));
    }
    if reciter_key.trim().is_empty() {
        return Err(SchedulerError::InvalidRequest(
            "reciter key must not be empty".to_string(),
        ));
    }
    if output_reference.trim().is_empty() {
        return Err(SchedulerError::InvalidRequest(
            "output reference must not be empty".to_string(),
        ));
    }

    let commit = ProgressCommit {
        range,
        next: index.successor(range.end)?,
        verse_count,
        reciter_key: reciter_key.trim().to_string(),
        output_reference: output_reference.trim().to_string(),
        committed_at: now,
        corpus_completed: index.is_last(range.end),
    };
    Ok(commit)
}
