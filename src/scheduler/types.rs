use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::SchedulerError;

/// A chapter/verse pair. Validity against the corpus is checked by `CorpusIndex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerseAddress {
    pub chapter: u16,
    pub verse: u16,
}

impl VerseAddress {
    pub const fn new(chapter: u16, verse: u16) -> Self {
        VerseAddress { chapter, verse }
    }

    pub const fn first() -> Self {
        VerseAddress::new(1, 1)
    }
}

impl fmt::Display for VerseAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chapter, self.verse)
    }
}

fn parse_number(part: &str, input: &str) -> Result<u16, SchedulerError> {
    part.trim().parse::<u16>().map_err(|_| {
        SchedulerError::InvalidRequest(format!(
            "'{}' is not a valid verse address (expected CHAPTER:VERSE)",
            input
        ))
    })
}

impl FromStr for VerseAddress {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chapter, verse) = s.split_once(':').ok_or_else(|| {
            SchedulerError::InvalidRequest(format!(
                "'{}' is not a valid verse address (expected CHAPTER:VERSE)",
                s
            ))
        })?;
        Ok(VerseAddress::new(
            parse_number(chapter, s)?,
            parse_number(verse, s)?,
        ))
    }
}

/// Inclusive range of verses, walked forward from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerseRange {
    pub start: VerseAddress,
    pub end: VerseAddress,
}

impl VerseRange {
    pub const fn new(start: VerseAddress, end: VerseAddress) -> Self {
        VerseRange { start, end }
    }

    pub const fn single(addr: VerseAddress) -> Self {
        VerseRange::new(addr, addr)
    }

    pub fn within_one_chapter(&self) -> bool {
        self.start.chapter == self.end.chapter
    }
}

impl fmt::Display for VerseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.within_one_chapter() {
            write!(f, "{}-{}", self.start, self.end.verse)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Accepts `36:1-5` (same chapter) or `36:80-37:2`. A bare address is a one-verse range.
impl FromStr for VerseRange {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((start, end)) = s.split_once('-') else {
            return Ok(VerseRange::single(s.parse()?));
        };
        let start: VerseAddress = start.parse()?;
        let end = if end.contains(':') {
            end.parse()?
        } else {
            VerseAddress::new(start.chapter, parse_number(end, s)?)
        };
        Ok(VerseRange::new(start, end))
    }
}

/// The persisted cursor: `current` is the next verse to be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub current: VerseAddress,
    pub total_reels_generated: u64,
    pub total_verses_narrated: u64,
    pub last_updated: DateTime<Utc>,
}

impl Position {
    pub fn initial(now: DateTime<Utc>) -> Self {
        Position {
            current: VerseAddress::first(),
            total_reels_generated: 0,
            total_verses_narrated: 0,
            last_updated: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub range: VerseRange,
    pub reciter_key: String,
    pub produced_at: DateTime<Utc>,
    pub output_reference: String,
}

/// Result of allocating the next range; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub range: VerseRange,
    pub verse_count: u32,
    /// The range ends on the final verse of the corpus; the next range starts over at 1:1.
    pub corpus_completed: bool,
    /// Fewer verses than requested because the range stopped at a chapter boundary.
    pub truncated: bool,
}
