//! Corpus Provider: chapter lengths and verse text for a range.

mod cache;
mod http;

pub use cache::VerseCache;
pub use http::HttpCorpusProvider;

use serde::{Deserialize, Serialize};

use crate::scheduler::{CorpusIndex, SchedulerError, VerseAddress, VerseRange};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseText {
    pub address: VerseAddress,
    pub text: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("Unexpected API response for {address}: {message}")]
    ApiError {
        address: VerseAddress,
        message: String,
    },

    #[error("JSON parsing error: {0}")]
    JsonError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl ProviderError {
    /// Transport failures and server-side errors may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::NetworkError(_) => true,
            ProviderError::HttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub trait CorpusProvider {
    /// Verses per chapter, chapter 1 first.
    fn chapter_lengths(&self) -> Result<Vec<u16>, ProviderError> {
        Ok(CorpusIndex::quran().lengths().to_vec())
    }

    fn verse_text(&mut self, address: VerseAddress) -> Result<String, ProviderError>;

    fn verse_texts(
        &mut self,
        index: &CorpusIndex,
        range: &VerseRange,
    ) -> Result<Vec<VerseText>, ProviderError> {
        index
            .addresses(range)?
            .into_iter()
            .map(|address| -> Result<VerseText, ProviderError> {
                Ok(VerseText {
                    address,
                    text: self.verse_text(address)?,
                })
            })
            .collect()
    }
}
