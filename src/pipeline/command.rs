use duct::cmd;
use std::io::Write;
use std::path::PathBuf;

use super::{PipelineError, ProductionJob, ProductionOutput, ProductionPipeline};

/// Runs an external program per reel.
///
/// The job is passed through `AYAT_*` environment variables plus a JSON job
/// file. Exit status 0 and a non-empty last stdout line (the output
/// reference) mean success. Stderr is left attached to the terminal.
#[derive(Debug, Clone)]
pub struct CommandPipeline {
    program: String,
    args: Vec<String>,
    output_dir: Option<PathBuf>,
}

impl CommandPipeline {
    pub fn from_argv(argv: &[String], output_dir: Option<PathBuf>) -> Result<Self, PipelineError> {
        let (program, args) = argv.split_first().ok_or(PipelineError::NotConfigured)?;
        if program.trim().is_empty() {
            return Err(PipelineError::NotConfigured);
        }
        Ok(CommandPipeline {
            program: program.clone(),
            args: args.to_vec(),
            output_dir,
        })
    }

    pub fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ProductionPipeline for CommandPipeline {
    fn produce(&self, job: &ProductionJob) -> Result<ProductionOutput, PipelineError> {
        let mut job_file = tempfile::Builder::new()
            .prefix("ayat-job-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| PipelineError::JobFile(e.to_string()))?;
        let json =
            serde_json::to_vec_pretty(job).map_err(|e| PipelineError::JobFile(e.to_string()))?;
        job_file
            .write_all(&json)
            .and_then(|_| job_file.flush())
            .map_err(|e| PipelineError::JobFile(e.to_string()))?;

        let mut expr = cmd(&self.program, &self.args)
            .env("AYAT_CHAPTER", job.range.start.chapter.to_string())
            .env("AYAT_START_VERSE", job.range.start.verse.to_string())
            .env("AYAT_END_CHAPTER", job.range.end.chapter.to_string())
            .env("AYAT_END_VERSE", job.range.end.verse.to_string())
            .env("AYAT_VERSE_COUNT", job.verse_count.to_string())
            .env("AYAT_RECITER", &job.reciter_key)
            .env("AYAT_JOB_FILE", job_file.path());
        if let Some(dir) = &self.output_dir {
            expr = expr.env("AYAT_OUTPUT_DIR", dir);
        }

        let output = expr.stdout_capture().unchecked().run()?;
        if !output.status.success() {
            return Err(PipelineError::CommandFailed {
                code: output.status.code(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let output_reference = stdout
            .lines()
            .map(str::trim)
            .rev()
            .find(|line| !line.is_empty())
            .ok_or(PipelineError::MissingOutputReference)?;

        Ok(ProductionOutput {
            output_reference: output_reference.to_string(),
        })
    }
}
