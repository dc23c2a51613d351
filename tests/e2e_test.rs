mod common;
mod utils;

use anyhow::Result;
use common::TestEnvironment;
use nix::fcntl::{Flock, FlockArg};
use std::fs::File;
use utils::{json_event, json_events, run_ayat_command};

#[test]
fn test_fresh_install_starts_at_first_verse() -> Result<()> {
    let env = TestEnvironment::new()?;

    let status = json_event(&env, &["status"], "status")?;
    assert_eq!(status["chapter"], 1);
    assert_eq!(status["verse"], 1);
    assert_eq!(status["chapter_name"], "Al-Fatihah");
    assert_eq!(status["total_reels_generated"], 0);
    assert_eq!(status["verses_remaining"], 6236);

    assert!(env.database_path().exists(), "database was not created");
    Ok(())
}

#[test]
fn test_run_commits_produced_reel() -> Result<()> {
    let env = TestEnvironment::new()?;

    let output = run_ayat_command(&env, &["run"])?;
    assert_eq!(output.exit_code, 0, "run failed: {}", output.stderr);

    let status = json_event(&env, &["status"], "status")?;
    assert_eq!(status["verse"], 4);
    assert_eq!(status["total_reels_generated"], 1);
    assert_eq!(status["total_verses_narrated"], 3);

    let history = json_event(&env, &["history"], "history")?;
    let entries = history.as_array().expect("history is an array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["output_reference"], "reel-1-1-3.mp4");
    assert_eq!(entries[0]["reciter_key"], "alafasy");
    Ok(())
}

#[test]
fn test_failed_production_keeps_position() -> Result<()> {
    let env = TestEnvironment::with_pipeline(&["sh", "-c", "exit 3"])?;

    let output = run_ayat_command(&env, &["run"])?;
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains("exit code 3"), "stderr: {}", output.stderr);

    let status = json_event(&env, &["status"], "status")?;
    assert_eq!(status["verse"], 1);
    assert_eq!(status["total_reels_generated"], 0);

    // The retry is offered the same range
    let next = json_event(&env, &["next"], "scheduler.next")?;
    assert_eq!(next["range"]["start"]["verse"], 1);
    assert_eq!(next["range"]["end"]["verse"], 3);
    Ok(())
}

#[test]
fn test_batch_run_truncates_at_chapter_end() -> Result<()> {
    let env = TestEnvironment::new()?;
    run_ayat_command(&env, &["jump", "1:5"])?;

    let allocations = json_events(
        &env,
        &["run", "--reels", "3", "--count", "7"],
        "scheduler.next",
    )?;
    let truncated: Vec<_> = allocations.iter().map(|a| a["truncated"].clone()).collect();
    assert_eq!(truncated, [true, false, false]);
    assert_eq!(allocations[0]["verse_count"], 3);

    let history = json_event(&env, &["history"], "history")?;
    let refs: Vec<_> = history
        .as_array()
        .expect("history is an array")
        .iter()
        .map(|entry| entry["output_reference"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(refs, ["reel-2-8-14.mp4", "reel-2-1-7.mp4", "reel-1-5-7.mp4"]);

    let status = json_event(&env, &["status"], "status")?;
    assert_eq!(status["chapter"], 2);
    assert_eq!(status["verse"], 15);
    assert_eq!(status["total_verses_narrated"], 17);
    Ok(())
}

#[test]
fn test_dry_run_commits_nothing() -> Result<()> {
    let env = TestEnvironment::with_pipeline(&["sh", "-c", "exit 1"])?;

    let job = json_event(&env, &["run", "--dry-run", "--reels", "5"], "run.dry_run")?;
    assert_eq!(job["verse_count"], 3);

    let status = json_event(&env, &["status"], "status")?;
    assert_eq!(status["verse"], 1);
    Ok(())
}

#[test]
fn test_jump_then_next_previews_short_chapter() -> Result<()> {
    let env = TestEnvironment::new()?;

    let position = json_event(&env, &["jump", "112:1"], "scheduler.jump")?;
    assert_eq!(position["current"]["chapter"], 112);

    let next = json_event(&env, &["next", "--count", "10"], "scheduler.next")?;
    assert_eq!(next["verse_count"], 4);
    assert_eq!(next["truncated"], true);

    let output = run_ayat_command(&env, &["jump", "112:5"])?;
    assert_eq!(output.exit_code, 1);
    Ok(())
}

#[test]
fn test_out_of_order_record_is_rejected() -> Result<()> {
    let env = TestEnvironment::new()?;

    let output = run_ayat_command(
        &env,
        &["--output", "json", "record", "1:3-5", "--output-ref", "late.mp4"],
    )?;
    assert_eq!(output.exit_code, 1);
    assert!(
        output.stderr.contains("scheduler.out_of_order_commit"),
        "stderr: {}",
        output.stderr
    );

    // Also when the range would break the chapter policy
    let output = run_ayat_command(
        &env,
        &["--output", "json", "record", "1:7-2:1", "--output-ref", "late.mp4"],
    )?;
    assert_eq!(output.exit_code, 1);
    assert!(
        output.stderr.contains("scheduler.out_of_order_commit"),
        "stderr: {}",
        output.stderr
    );

    let output = run_ayat_command(&env, &["record", "1:1-2", "--output-ref", "ok.mp4"])?;
    assert_eq!(output.exit_code, 0, "record failed: {}", output.stderr);

    let status = json_event(&env, &["status"], "status")?;
    assert_eq!(status["verse"], 3);
    Ok(())
}

#[test]
fn test_concurrent_run_is_detected() -> Result<()> {
    let env = TestEnvironment::new()?;

    let file = File::create(env.lock_path())?;
    let _held = Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| errno)?;

    let output = run_ayat_command(&env, &["--output", "json", "jump", "2:1"])?;
    assert_eq!(output.exit_code, 1);
    assert!(
        output.stderr.contains("scheduler.concurrent_run"),
        "stderr: {}",
        output.stderr
    );

    // Read-only commands do not take the lock
    let status = json_event(&env, &["status"], "status")?;
    assert_eq!(status["chapter"], 1);
    Ok(())
}

#[test]
fn test_reset_requires_confirmation() -> Result<()> {
    let env = TestEnvironment::new()?;
    run_ayat_command(&env, &["jump", "36:1"])?;

    let output = run_ayat_command(&env, &["reset"])?;
    assert_eq!(output.exit_code, 1);
    let status = json_event(&env, &["status"], "status")?;
    assert_eq!(status["chapter"], 36);

    let output = run_ayat_command(&env, &["reset", "--yes"])?;
    assert_eq!(output.exit_code, 0, "reset failed: {}", output.stderr);
    let status = json_event(&env, &["status"], "status")?;
    assert_eq!(status["chapter"], 1);
    Ok(())
}
