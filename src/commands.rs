use anyhow::{Context, Result, bail};
use serde_json::json;
use std::time::Duration;

use crate::cli::{Commands, HistoryArgs, JumpArgs, NextArgs, RecordArgs, ResetArgs, RunArgs};
use crate::common::paths;
use crate::config::Config;
use crate::corpus::{CorpusProvider, HttpCorpusProvider, VerseCache};
use crate::pipeline::{CommandPipeline, ProductionJob, ProductionPipeline};
use crate::scheduler::corpus::chapter_name;
use crate::scheduler::{
    Allocation, CorpusIndex, HistoryEntry, Position, RunLock, Scheduler, SqliteStore, VerseAddress,
    VerseRange,
};
use crate::ui::prelude::*;

pub fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Status => handle_status(config),
        Commands::History(args) => handle_history(args, config),
        Commands::Next(args) => handle_next(args, config),
        Commands::Record(args) => handle_record(args, config),
        Commands::Jump(args) => handle_jump(args, config),
        Commands::Reset(args) => handle_reset(args, config),
        Commands::Stats => handle_stats(config),
        Commands::Run(args) => handle_run(args, config),
    }
}

fn open_scheduler(config: &Config, index: CorpusIndex) -> Result<Scheduler<SqliteStore>> {
    let db_path = config.database_path()?;
    emit(
        Level::Debug,
        "scheduler.open",
        &format!("Using progress database {}", db_path.display()),
        None,
    );
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("opening progress database {}", db_path.display()))?;
    Ok(Scheduler::new(index, config.range_policy(), store))
}

/// Taken by every command that mutates progress; lives next to the database.
fn acquire_run_lock(config: &Config) -> Result<RunLock> {
    let lock_path = config.database_path()?.with_extension("lock");
    let lock = RunLock::acquire(&lock_path)?;
    emit(
        Level::Debug,
        "scheduler.lock",
        &format!("Holding run lock {}", lock.path().display()),
        None,
    );
    Ok(lock)
}

fn resolve_reciter(config: &Config, reciter: Option<String>) -> String {
    let key = reciter.unwrap_or_else(|| config.default_reciter.clone());
    if !config.is_known_reciter(&key) {
        emit(
            Level::Warn,
            "reciter.unknown",
            &format!("Reciter '{}' is not listed in the config", key),
            None,
        );
    }
    key
}

fn describe_range(range: &VerseRange) -> String {
    match chapter_name(range.start.chapter) {
        Some(name) if range.within_one_chapter() => format!("{} ({})", range, name),
        _ => range.to_string(),
    }
}

fn position_summary(position: &Position) -> String {
    format!(
        "Position {} | {} reels | {} verses narrated",
        position.current, position.total_reels_generated, position.total_verses_narrated
    )
}

fn handle_status(config: &Config) -> Result<()> {
    let mut scheduler = open_scheduler(config, CorpusIndex::quran())?;
    let status = scheduler.status()?;

    if matches!(get_output_format(), OutputFormat::Json) {
        emit(
            Level::Info,
            "status",
            "Current progress",
            Some(serde_json::to_value(&status)?),
        );
        return Ok(());
    }

    print_table(
        &["Field", "Value"],
        vec![
            vec![
                "Position".to_string(),
                format!(
                    "{}:{} {}",
                    status.chapter,
                    status.verse,
                    status.chapter_name.unwrap_or_default()
                ),
            ],
            vec![
                "Progress".to_string(),
                format!("{:.2}%", status.percentage_complete),
            ],
            vec![
                "Verses remaining".to_string(),
                status.verses_remaining.to_string(),
            ],
            vec![
                "Reels generated".to_string(),
                status.total_reels_generated.to_string(),
            ],
            vec![
                "Verses narrated".to_string(),
                status.total_verses_narrated.to_string(),
            ],
            vec![
                "Last updated".to_string(),
                status.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ],
        ],
    );
    Ok(())
}

fn history_rows(entries: &[HistoryEntry]) -> Vec<Vec<String>> {
    entries
        .iter()
        .map(|entry| {
            vec![
                entry.id.to_string(),
                describe_range(&entry.range),
                entry.reciter_key.clone(),
                entry.output_reference.clone(),
                entry.produced_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect()
}

fn handle_history(args: HistoryArgs, config: &Config) -> Result<()> {
    let scheduler = open_scheduler(config, CorpusIndex::quran())?;
    let entries = scheduler.history(args.limit)?;

    if matches!(get_output_format(), OutputFormat::Json) {
        emit(
            Level::Info,
            "history",
            &format!("{} entries", entries.len()),
            Some(serde_json::to_value(&entries)?),
        );
        return Ok(());
    }

    if entries.is_empty() {
        emit(Level::Info, "history.empty", "No reels produced yet", None);
        return Ok(());
    }
    print_table(
        &["#", "Range", "Reciter", "Output", "Produced"],
        history_rows(&entries),
    );
    Ok(())
}

fn report_allocation(alloc: &Allocation) {
    emit(
        Level::Info,
        "scheduler.next",
        &format!(
            "Next range: {} ({} verses)",
            describe_range(&alloc.range),
            alloc.verse_count
        ),
        Some(json!(alloc)),
    );
    if alloc.truncated {
        emit(
            Level::Info,
            "scheduler.truncated",
            "Range stops at the end of the chapter",
            None,
        );
    }
    if alloc.corpus_completed {
        emit(
            Level::Info,
            "scheduler.corpus_end",
            "This range finishes the corpus; the next one starts again at 1:1",
            None,
        );
    }
}

fn handle_next(args: NextArgs, config: &Config) -> Result<()> {
    let mut scheduler = open_scheduler(config, CorpusIndex::quran())?;
    let alloc = scheduler.next_range(args.count.unwrap_or(config.verses_per_reel))?;
    report_allocation(&alloc);
    Ok(())
}

fn handle_record(args: RecordArgs, config: &Config) -> Result<()> {
    let range: VerseRange = args.range.parse()?;
    let reciter = resolve_reciter(config, args.reciter);

    let _lock = acquire_run_lock(config)?;
    let mut scheduler = open_scheduler(config, CorpusIndex::quran())?;
    let outcome = scheduler.record_success(range, &reciter, &args.output_ref)?;

    emit(
        Level::Success,
        "scheduler.commit",
        &format!(
            "Recorded {} | {}",
            describe_range(&outcome.range),
            position_summary(&outcome.position)
        ),
        Some(json!(outcome)),
    );
    if outcome.corpus_completed {
        emit(
            Level::Success,
            "corpus.completed",
            "Completed the entire corpus, starting again from 1:1",
            None,
        );
    }
    Ok(())
}

fn handle_jump(args: JumpArgs, config: &Config) -> Result<()> {
    let target: VerseAddress = args.address.parse()?;

    let _lock = acquire_run_lock(config)?;
    let mut scheduler = open_scheduler(config, CorpusIndex::quran())?;
    let position = scheduler.jump_to(target.chapter, target.verse)?;

    emit(
        Level::Success,
        "scheduler.jump",
        &format!("Position set to {}", position.current),
        Some(json!(position)),
    );
    Ok(())
}

fn handle_reset(args: ResetArgs, config: &Config) -> Result<()> {
    if !args.yes {
        bail!("Refusing to reset the position without --yes");
    }

    let _lock = acquire_run_lock(config)?;
    let mut scheduler = open_scheduler(config, CorpusIndex::quran())?;
    let position = scheduler.reset()?;

    emit(
        Level::Success,
        "scheduler.reset",
        &format!("Position reset to {}", position.current),
        Some(json!(position)),
    );
    Ok(())
}

fn handle_stats(config: &Config) -> Result<()> {
    let mut scheduler = open_scheduler(config, CorpusIndex::quran())?;
    let stats = scheduler.statistics()?;

    if matches!(get_output_format(), OutputFormat::Json) {
        emit(
            Level::Info,
            "stats",
            "Statistics",
            Some(serde_json::to_value(&stats)?),
        );
        return Ok(());
    }

    emit(
        Level::Info,
        "stats.summary",
        &format!(
            "{}:{} {} | {:.2}% complete | {} reels in history",
            stats.status.chapter,
            stats.status.verse,
            stats.status.chapter_name.unwrap_or_default(),
            stats.status.percentage_complete,
            stats.history_entries
        ),
        None,
    );
    separator(true);
    print_table(
        &["Reciter", "Reels"],
        stats
            .reciter_distribution
            .iter()
            .map(|r| vec![r.reciter_key.clone(), r.reels.to_string()])
            .collect(),
    );
    Ok(())
}

fn build_provider(config: &Config) -> Result<HttpCorpusProvider> {
    let cache = VerseCache::load(paths::verse_cache_path()?);
    if !cache.is_empty() {
        emit(
            Level::Debug,
            "corpus.cache",
            &format!("{} cached verses", cache.len()),
            None,
        );
    }
    let provider = HttpCorpusProvider::new(
        &config.corpus.text_api_url,
        Duration::from_secs(config.corpus.timeout_secs),
        cache,
    )?
    .with_retries(
        config.corpus.retries,
        Duration::from_millis(config.corpus.retry_delay_ms),
    );
    Ok(provider)
}

/// Produce and commit one reel. Returns `false` for a dry run.
fn produce_one(
    scheduler: &mut Scheduler<SqliteStore>,
    provider: &mut HttpCorpusProvider,
    pipeline: Option<&CommandPipeline>,
    count: u32,
    reciter: &str,
    config: &Config,
) -> Result<bool> {
    let alloc = scheduler.next_range(count)?;
    report_allocation(&alloc);

    if scheduler.already_produced(&alloc.range)? {
        emit(
            Level::Warn,
            "run.duplicate",
            &format!("{} was produced before; producing it again", alloc.range),
            None,
        );
    }

    let verses = if config.corpus.fetch_text {
        provider
            .verse_texts(scheduler.index(), &alloc.range)
            .with_context(|| format!("fetching verse text for {}", alloc.range))?
    } else {
        Vec::new()
    };

    let job = ProductionJob {
        range: alloc.range,
        verse_count: alloc.verse_count,
        chapter_name: chapter_name(alloc.range.start.chapter),
        reciter_key: reciter.to_string(),
        verses,
    };

    let Some(pipeline) = pipeline else {
        emit(
            Level::Info,
            "run.dry_run",
            &format!(
                "Dry run: would produce {} with reciter {}",
                describe_range(&job.range),
                job.reciter_key
            ),
            Some(serde_json::to_value(&job)?),
        );
        return Ok(false);
    };

    emit(
        Level::Info,
        "run.produce",
        &format!("Producing {} via {}", describe_range(&job.range), pipeline.describe()),
        None,
    );
    // Nothing is committed unless production succeeds; a retry gets the same range.
    let output = pipeline.produce(&job).with_context(|| {
        format!(
            "production failed for {}; position stays at {}",
            job.range, job.range.start
        )
    })?;

    let outcome = scheduler.record_success(alloc.range, reciter, &output.output_reference)?;
    emit(
        Level::Success,
        "run.committed",
        &format!(
            "Produced {} -> {} | {}",
            describe_range(&outcome.range),
            output.output_reference,
            position_summary(&outcome.position)
        ),
        Some(json!(outcome)),
    );
    if outcome.corpus_completed {
        emit(
            Level::Success,
            "corpus.completed",
            "Completed the entire corpus, starting again from 1:1",
            None,
        );
    }
    Ok(true)
}

fn handle_run(args: RunArgs, config: &Config) -> Result<()> {
    if args.reels == 0 {
        bail!("--reels must be at least 1");
    }
    let count = args.count.unwrap_or(config.verses_per_reel);
    let reciter = resolve_reciter(config, args.reciter);

    let pipeline = if args.dry_run {
        None
    } else {
        Some(CommandPipeline::from_argv(
            &config.pipeline.command,
            config.output_dir(),
        )?)
    };

    let _lock = acquire_run_lock(config)?;
    let mut provider = build_provider(config)?;
    let index = CorpusIndex::from_lengths(provider.chapter_lengths()?)?;
    let mut scheduler = open_scheduler(config, index)?;

    for reel in 1..=args.reels {
        if args.reels > 1 {
            emit(
                Level::Info,
                "run.batch",
                &format!("Reel {}/{}", reel, args.reels),
                None,
            );
        }
        let committed = produce_one(
            &mut scheduler,
            &mut provider,
            pipeline.as_ref(),
            count,
            &reciter,
            config,
        )
        .with_context(|| format!("reel {} of {} failed", reel, args.reels))?;
        if !committed {
            // Without a commit every further iteration would preview the same range
            break;
        }
    }
    Ok(())
}
