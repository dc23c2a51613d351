use super::error::{Result, SchedulerError};
use super::types::{VerseAddress, VerseRange};

pub const CHAPTER_COUNT: u16 = 114;
pub const TOTAL_VERSES: u32 = 6236;

/// Verse counts per chapter, chapter 1 first.
#[rustfmt::skip]
const VERSE_COUNTS: [u16; CHAPTER_COUNT as usize] = [
    7, 286, 200, 176, 120, 165, 206, 75, 129, 109,
    123, 111, 43, 52, 99, 128, 111, 110, 98, 135,
    112, 78, 118, 64, 77, 227, 93, 88, 69, 60,
    34, 30, 73, 54, 45, 83, 182, 88, 75, 85,
    54, 53, 89, 59, 37, 35, 38, 29, 18, 45,
    60, 49, 62, 55, 78, 96, 29, 22, 24, 13,
    14, 11, 11, 18, 12, 12, 30, 52, 52, 44,
    28, 28, 20, 56, 40, 31, 50, 40, 46, 42,
    29, 19, 36, 25, 22, 17, 19, 26, 30, 20,
    15, 21, 11, 8, 8, 19, 5, 8, 8, 11,
    11, 8, 3, 9, 5, 4, 7, 3, 6, 3,
    5, 4, 5, 6,
];

#[rustfmt::skip]
const CHAPTER_NAMES: [&str; CHAPTER_COUNT as usize] = [
    "Al-Fatihah", "Al-Baqarah", "Ali 'Imran", "An-Nisa", "Al-Ma'idah",
    "Al-An'am", "Al-A'raf", "Al-Anfal", "At-Tawbah", "Yunus",
    "Hud", "Yusuf", "Ar-Ra'd", "Ibrahim", "Al-Hijr",
    "An-Nahl", "Al-Isra", "Al-Kahf", "Maryam", "Taha",
    "Al-Anbya", "Al-Hajj", "Al-Mu'minun", "An-Nur", "Al-Furqan",
    "Ash-Shu'ara", "An-Naml", "Al-Qasas", "Al-'Ankabut", "Ar-Rum",
    "Luqman", "As-Sajdah", "Al-Ahzab", "Saba", "Fatir",
    "Ya-Sin", "As-Saffat", "Sad", "Az-Zumar", "Ghafir",
    "Fussilat", "Ash-Shuraa", "Az-Zukhruf", "Ad-Dukhan", "Al-Jathiyah",
    "Al-Ahqaf", "Muhammad", "Al-Fath", "Al-Hujurat", "Qaf",
    "Adh-Dhariyat", "At-Tur", "An-Najm", "Al-Qamar", "Ar-Rahman",
    "Al-Waqi'ah", "Al-Hadid", "Al-Mujadila", "Al-Hashr", "Al-Mumtahanah",
    "As-Saf", "Al-Jumu'ah", "Al-Munafiqun", "At-Taghabun", "At-Talaq",
    "At-Tahrim", "Al-Mulk", "Al-Qalam", "Al-Haqqah", "Al-Ma'arij",
    "Nuh", "Al-Jinn", "Al-Muzzammil", "Al-Muddaththir", "Al-Qiyamah",
    "Al-Insan", "Al-Mursalat", "An-Naba", "An-Nazi'at", "'Abasa",
    "At-Takwir", "Al-Infitar", "Al-Mutaffifin", "Al-Inshiqaq", "Al-Buruj",
    "At-Tariq", "Al-A'la", "Al-Ghashiyah", "Al-Fajr", "Al-Balad",
    "Ash-Shams", "Al-Layl", "Ad-Duhaa", "Ash-Sharh", "At-Tin",
    "Al-'Alaq", "Al-Qadr", "Al-Bayyinah", "Az-Zalzalah", "Al-'Adiyat",
    "Al-Qari'ah", "At-Takathur", "Al-'Asr", "Al-Humazah", "Al-Fil",
    "Quraysh", "Al-Ma'un", "Al-Kawthar", "Al-Kafirun", "An-Nasr",
    "Al-Masad", "Al-Ikhlas", "Al-Falaq", "An-Nas",
];

/// Outcome of stepping one verse forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Next(VerseAddress),
    CorpusEnd,
}

/// Static table of chapter lengths with prefix sums for ordinal arithmetic.
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    lengths: Vec<u16>,
    // offsets[i] = number of verses before chapter i + 1
    offsets: Vec<u32>,
}

impl Default for CorpusIndex {
    fn default() -> Self {
        CorpusIndex::quran()
    }
}

impl CorpusIndex {
    pub fn quran() -> Self {
        let index = Self::build(VERSE_COUNTS.to_vec());
        debug_assert_eq!(index.total_verses(), TOTAL_VERSES);
        index
    }

    /// Build an index from chapter lengths as reported by a corpus provider.
    pub fn from_lengths(lengths: Vec<u16>) -> Result<Self> {
        if lengths.is_empty() {
            return Err(SchedulerError::InvalidRequest(
                "corpus must contain at least one chapter".to_string(),
            ));
        }
        if lengths.len() > u16::MAX as usize {
            return Err(SchedulerError::InvalidRequest(format!(
                "corpus has too many chapters ({})",
                lengths.len()
            )));
        }
        if let Some(pos) = lengths.iter().position(|&n| n == 0) {
            return Err(SchedulerError::InvalidRequest(format!(
                "chapter {} has no verses",
                pos + 1
            )));
        }
        Ok(Self::build(lengths))
    }

    fn build(lengths: Vec<u16>) -> Self {
        let mut offsets = Vec::with_capacity(lengths.len());
        let mut acc = 0u32;
        for &len in &lengths {
            offsets.push(acc);
            acc += u32::from(len);
        }
        CorpusIndex { lengths, offsets }
    }

    pub fn lengths(&self) -> &[u16] {
        &self.lengths
    }

    pub fn chapter_count(&self) -> u16 {
        self.lengths.len() as u16
    }

    pub fn total_verses(&self) -> u32 {
        self.offsets.last().copied().unwrap_or(0)
            + self.lengths.last().map(|&n| u32::from(n)).unwrap_or(0)
    }

    pub fn length_of(&self, chapter: u16) -> Result<u16> {
        if chapter == 0 || chapter > self.chapter_count() {
            return Err(SchedulerError::invalid_address(
                chapter,
                1,
                format!("chapter must be between 1 and {}", self.chapter_count()),
            ));
        }
        Ok(self.lengths[usize::from(chapter - 1)])
    }

    pub fn validate(&self, addr: VerseAddress) -> Result<VerseAddress> {
        let len = self.length_of(addr.chapter).map_err(|_| {
            SchedulerError::invalid_address(
                addr.chapter,
                addr.verse,
                format!("chapter must be between 1 and {}", self.chapter_count()),
            )
        })?;
        if addr.verse == 0 || addr.verse > len {
            return Err(SchedulerError::invalid_address(
                addr.chapter,
                addr.verse,
                format!("chapter {} has verses 1 to {}", addr.chapter, len),
            ));
        }
        Ok(addr)
    }

    pub fn next_address(&self, addr: VerseAddress) -> Result<Step> {
        let len = self.validate(addr).and_then(|a| self.length_of(a.chapter))?;
        if addr.verse < len {
            return Ok(Step::Next(VerseAddress::new(addr.chapter, addr.verse + 1)));
        }
        if addr.chapter < self.chapter_count() {
            return Ok(Step::Next(VerseAddress::new(addr.chapter + 1, 1)));
        }
        Ok(Step::CorpusEnd)
    }

    /// Like `next_address` but wraps to 1:1 after the final verse.
    pub fn successor(&self, addr: VerseAddress) -> Result<VerseAddress> {
        Ok(match self.next_address(addr)? {
            Step::Next(next) => next,
            Step::CorpusEnd => VerseAddress::first(),
        })
    }

    pub fn last_address(&self) -> VerseAddress {
        let chapter = self.chapter_count();
        VerseAddress::new(chapter, self.lengths[usize::from(chapter - 1)])
    }

    pub fn is_last(&self, addr: VerseAddress) -> bool {
        addr == self.last_address()
    }

    /// 1-based position of the verse across the whole corpus.
    pub fn ordinal(&self, addr: VerseAddress) -> Result<u32> {
        let addr = self.validate(addr)?;
        Ok(self.offsets[usize::from(addr.chapter - 1)] + u32::from(addr.verse))
    }

    /// Number of verses in a range, rejecting ranges that run backwards.
    pub fn verse_count(&self, range: &VerseRange) -> Result<u32> {
        let start = self.ordinal(range.start)?;
        let end = self.ordinal(range.end)?;
        if end < start {
            return Err(SchedulerError::InvalidRequest(format!(
                "range {} runs backwards",
                range
            )));
        }
        Ok(end - start + 1)
    }

    /// Iterate the addresses of a validated range in order.
    pub fn addresses(&self, range: &VerseRange) -> Result<Vec<VerseAddress>> {
        let count = self.verse_count(range)?;
        let mut out = Vec::with_capacity(count as usize);
        let mut addr = range.start;
        out.push(addr);
        while addr != range.end {
            match self.next_address(addr)? {
                Step::Next(next) => addr = next,
                Step::CorpusEnd => break,
            }
            out.push(addr);
        }
        Ok(out)
    }

    pub fn percentage_complete(&self, current: VerseAddress) -> Result<f64> {
        let done = self.ordinal(current)? - 1;
        let pct = f64::from(done) / f64::from(self.total_verses()) * 100.0;
        Ok((pct * 100.0).round() / 100.0)
    }

    /// Verses still ahead of the cursor, including the current one.
    pub fn verses_remaining(&self, current: VerseAddress) -> Result<u32> {
        Ok(self.total_verses() - self.ordinal(current)? + 1)
    }
}

/// Transliterated chapter name, when the chapter exists in the built-in table.
pub fn chapter_name(chapter: u16) -> Option<&'static str> {
    CHAPTER_NAMES.get(usize::from(chapter).checked_sub(1)?).copied()
}
