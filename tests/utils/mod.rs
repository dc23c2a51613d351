use anyhow::Result;
use serde_json::Value;
use std::process::Command;

use super::common::TestEnvironment;

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub fn run_ayat_command(env: &TestEnvironment, args: &[&str]) -> Result<CommandOutput> {
    let output = Command::new(env!("CARGO_BIN_EXE_ayat"))
        .arg("--config")
        .arg(env.config_path())
        .arg("--no-color")
        .args(args)
        .env("XDG_CONFIG_HOME", env.xdg("config"))
        .env("XDG_DATA_HOME", env.xdg("data"))
        .env("XDG_CACHE_HOME", env.xdg("cache"))
        .current_dir(env.path())
        .output()?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Run with `--output json` and return the `data` of every event with `code`, in order.
pub fn json_events(env: &TestEnvironment, args: &[&str], code: &str) -> Result<Vec<Value>> {
    let mut full = vec!["--output", "json"];
    full.extend_from_slice(args);
    let output = run_ayat_command(env, &full)?;
    assert_eq!(output.exit_code, 0, "command failed: {}", output.stderr);

    Ok(output
        .stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|event| event["code"] == code)
        .map(|event| event["data"].clone())
        .collect())
}

/// Like `json_events`, but only the first matching event.
pub fn json_event(env: &TestEnvironment, args: &[&str], code: &str) -> Result<Value> {
    json_events(env, args, code)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no '{}' event for {:?}", code, args))
}
