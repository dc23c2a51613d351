use std::path::PathBuf;
use thiserror::Error;

use super::types::VerseAddress;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid address {chapter}:{verse}: {reason}")]
    InvalidAddress {
        chapter: u16,
        verse: u16,
        reason: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Out of order commit: range starts at {found} but the current position is {expected}")]
    OutOfOrderCommit {
        expected: VerseAddress,
        found: VerseAddress,
    },

    #[error("Another run holds the lock at {}", lock_path.display())]
    ConcurrentRunDetected { lock_path: PathBuf },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] rusqlite::Error),

    #[error("Stored state is corrupt: {0}")]
    CorruptState(String),

    #[error("Failed to use lock file {}: {source}", path.display())]
    LockIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SchedulerError {
    pub fn invalid_address(chapter: u16, verse: u16, reason: impl Into<String>) -> Self {
        SchedulerError::InvalidAddress {
            chapter,
            verse,
            reason: reason.into(),
        }
    }

    /// Stable identifier used as the event code in JSON output
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::InvalidAddress { .. } => "scheduler.invalid_address",
            SchedulerError::InvalidRequest(_) => "scheduler.invalid_request",
            SchedulerError::OutOfOrderCommit { .. } => "scheduler.out_of_order_commit",
            SchedulerError::ConcurrentRunDetected { .. } => "scheduler.concurrent_run",
            SchedulerError::PersistenceFailure(_) | SchedulerError::CorruptState(_) => {
                "scheduler.persistence_failure"
            }
            SchedulerError::LockIo { .. } => "scheduler.lock_io",
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
