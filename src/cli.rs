use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

use crate::ui::OutputFormat;

/// Schedule, produce and track short Quran recitation reels
#[derive(Parser, Debug)]
#[command(name = "ayat", author, version, about, long_about = None)]
pub struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Config file to use instead of ~/.config/ayat/ayat.toml
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the current position and counters
    Status,
    /// Show recently produced reels, newest first
    History(HistoryArgs),
    /// Preview the next verse range without committing it
    Next(NextArgs),
    /// Record a reel that was produced outside of `run`
    Record(RecordArgs),
    /// Move the position to a verse (counters and history are kept)
    Jump(JumpArgs),
    /// Move the position back to 1:1 (counters and history are kept)
    Reset(ResetArgs),
    /// Show statistics including reciter distribution
    Stats,
    /// Allocate the next range, produce the reel and commit on success
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Number of entries to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Args, Debug, Clone)]
pub struct NextArgs {
    /// Verses per reel (defaults to verses_per_reel from the config)
    #[arg(short = 'c', long)]
    pub count: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Produced range, e.g. 112:1-4 or 1:7-2:3
    pub range: String,

    /// Reciter used for the reel (defaults to default_reciter from the config)
    #[arg(short = 'r', long)]
    pub reciter: Option<String>,

    /// File path or remote id of the produced reel
    #[arg(short = 'o', long = "output-ref")]
    pub output_ref: String,
}

#[derive(Args, Debug, Clone)]
pub struct JumpArgs {
    /// Target verse as CHAPTER:VERSE, e.g. 36:1
    pub address: String,
}

#[derive(Args, Debug, Clone)]
pub struct ResetArgs {
    /// Confirm the reset
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Verses per reel (defaults to verses_per_reel from the config)
    #[arg(short = 'c', long)]
    pub count: Option<u32>,

    /// Number of consecutive reels to produce
    #[arg(long, default_value_t = 1)]
    pub reels: u32,

    /// Reciter key (defaults to default_reciter from the config)
    #[arg(short = 'r', long)]
    pub reciter: Option<String>,

    /// Allocate and fetch text, but neither produce nor commit
    #[arg(long)]
    pub dry_run: bool,
}
