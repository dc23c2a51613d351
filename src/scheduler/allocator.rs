use serde::{Deserialize, Serialize};

use super::corpus::{CorpusIndex, Step};
use super::error::{Result, SchedulerError};
use super::types::{Allocation, VerseAddress, VerseRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangePolicy {
    /// Let one range run past the end of a chapter into the next one.
    pub allow_cross_chapter: bool,
    /// Requests above this are clamped.
    pub max_verses: Option<u32>,
}

impl Default for RangePolicy {
    fn default() -> Self {
        RangePolicy {
            allow_cross_chapter: false,
            max_verses: None,
        }
    }
}

/// Compute the next range starting at `current`. Pure: nothing is persisted.
pub fn allocate(
    index: &CorpusIndex,
    current: VerseAddress,
    requested: u32,
    policy: &RangePolicy,
) -> Result<Allocation> {
    if requested == 0 {
        return Err(SchedulerError::InvalidRequest(
            "verse count must be at least 1".to_string(),
        ));
    }
    let start = index.validate(current)?;
    let wanted = match policy.max_verses {
        Some(max) if max > 0 => requested.min(max),
        _ => requested,
    };

    let mut end = start;
    let mut taken = 1u32;
    let mut truncated = false;
    while taken < wanted {
        match index.next_address(end)? {
            Step::CorpusEnd => break,
            Step::Next(next) => {
                if next.chapter != end.chapter && !policy.allow_cross_chapter {
                    truncated = true;
                    break;
                }
                end = next;
                taken += 1;
            }
        }
    }

    Ok(Allocation {
        range: VerseRange::new(start, end),
        verse_count: taken,
        corpus_completed: index.is_last(end),
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(chapter: u16, verse: u16) -> VerseAddress {
        VerseAddress::new(chapter, verse)
    }

    #[test]
    fn exact_count_within_every_chapter() {
        let index = CorpusIndex::quran();
        let policy = RangePolicy::default();
        for chapter in 1..=index.chapter_count() {
            let len = index.length_of(chapter).unwrap();
            let start = addr(chapter, 1);
            for count in [1u32, 2, u32::from(len)] {
                if count > u32::from(len) {
                    continue;
                }
                let alloc = allocate(&index, start, count, &policy).unwrap();
                assert_eq!(alloc.range.start, start);
                assert_eq!(alloc.verse_count, count);
                assert_eq!(index.verse_count(&alloc.range).unwrap(), count);
                assert!(!alloc.truncated);
            }
        }
    }

    #[test]
    fn chapter_final_verse_gives_single_verse_range() {
        let index = CorpusIndex::quran();
        for chapter in 1..=index.chapter_count() {
            let last = addr(chapter, index.length_of(chapter).unwrap());
            for count in [1, 5] {
                let alloc = allocate(&index, last, count, &RangePolicy::default()).unwrap();
                assert_eq!(alloc.range, VerseRange::single(last), "{last}");
                assert_eq!(alloc.verse_count, 1);
                // The corpus end stops a range without truncating it
                let is_final = chapter == index.chapter_count();
                assert_eq!(alloc.truncated, count > 1 && !is_final);
                assert_eq!(alloc.corpus_completed, is_final);
            }

            let expected = if chapter == index.chapter_count() {
                Step::CorpusEnd
            } else {
                Step::Next(addr(chapter + 1, 1))
            };
            assert_eq!(index.next_address(last).unwrap(), expected, "{last}");
        }
    }

    #[test]
    fn whole_short_chapter() {
        let index = CorpusIndex::quran();
        let alloc = allocate(&index, addr(112, 1), 4, &RangePolicy::default()).unwrap();
        assert_eq!(alloc.range, VerseRange::new(addr(112, 1), addr(112, 4)));
        assert_eq!(alloc.verse_count, 4);
        assert!(!alloc.truncated);
    }

    #[test]
    fn truncates_at_chapter_boundary_by_default() {
        let index = CorpusIndex::quran();
        let alloc = allocate(&index, addr(1, 5), 5, &RangePolicy::default()).unwrap();
        assert_eq!(alloc.range, VerseRange::new(addr(1, 5), addr(1, 7)));
        assert_eq!(alloc.verse_count, 3);
        assert!(alloc.truncated);
    }

    #[test]
    fn crosses_chapters_when_allowed() {
        let index = CorpusIndex::quran();
        let policy = RangePolicy {
            allow_cross_chapter: true,
            max_verses: None,
        };
        let alloc = allocate(&index, addr(1, 5), 5, &policy).unwrap();
        assert_eq!(alloc.range, VerseRange::new(addr(1, 5), addr(2, 2)));
        assert_eq!(alloc.verse_count, 5);
        assert!(!alloc.truncated);
    }

    #[test]
    fn final_verse_flags_corpus_completion() {
        let index = CorpusIndex::quran();
        let last = addr(114, 6);
        let alloc = allocate(&index, last, 1, &RangePolicy::default()).unwrap();
        assert_eq!(alloc.range, VerseRange::single(last));
        assert!(alloc.corpus_completed);

        // A range never wraps, even when crossing is allowed.
        let policy = RangePolicy {
            allow_cross_chapter: true,
            max_verses: None,
        };
        let alloc = allocate(&index, addr(114, 4), 10, &policy).unwrap();
        assert_eq!(alloc.range, VerseRange::new(addr(114, 4), last));
        assert_eq!(alloc.verse_count, 3);
        assert!(alloc.corpus_completed);
    }

    #[test]
    fn clamps_to_policy_maximum() {
        let index = CorpusIndex::quran();
        let policy = RangePolicy {
            allow_cross_chapter: false,
            max_verses: Some(10),
        };
        let alloc = allocate(&index, addr(2, 1), 50, &policy).unwrap();
        assert_eq!(alloc.verse_count, 10);
        assert_eq!(alloc.range.end, addr(2, 10));
    }

    #[test]
    fn rejects_bad_input() {
        let index = CorpusIndex::quran();
        let policy = RangePolicy::default();
        assert!(matches!(
            allocate(&index, addr(1, 1), 0, &policy),
            Err(SchedulerError::InvalidRequest(_))
        ));
        assert!(matches!(
            allocate(&index, addr(1, 8), 1, &policy),
            Err(SchedulerError::InvalidAddress { .. })
        ));
    }
}
