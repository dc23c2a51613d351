//! Production Pipeline: renders and uploads a reel for an allocated range.
//! The scheduler only cares whether it succeeded and what it produced.

mod command;

pub use command::CommandPipeline;

use serde::Serialize;

use crate::corpus::VerseText;
use crate::scheduler::VerseRange;

#[derive(Debug, Clone, Serialize)]
pub struct ProductionJob {
    pub range: VerseRange,
    pub verse_count: u32,
    pub chapter_name: Option<&'static str>,
    pub reciter_key: String,
    pub verses: Vec<VerseText>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionOutput {
    /// File path or remote id of what was produced
    pub output_reference: String,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("No production command configured (set [pipeline] command in the config)")]
    NotConfigured,

    #[error("Failed to start production command: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write job file: {0}")]
    JobFile(String),

    #[error("Production command failed with {}", exit_status(.code))]
    CommandFailed { code: Option<i32> },

    #[error("Production command printed no output reference")]
    MissingOutputReference,
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

pub trait ProductionPipeline {
    fn produce(&self, job: &ProductionJob) -> Result<ProductionOutput, PipelineError>;
}
