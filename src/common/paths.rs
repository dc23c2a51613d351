//! Centralized path management for ayat.
//! Every directory is created on first use.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the ayat config directory
pub fn ayat_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Unable to determine user config directory")?
        .join("ayat");

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating config directory at {}", config_dir.display()))?;

    Ok(config_dir)
}

/// Get the ayat data directory (progress database)
pub fn ayat_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
            home.join(".local/share")
        })
        .join("ayat");

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory at {}", data_dir.display()))?;

    Ok(data_dir)
}

/// Get the ayat cache directory (verse text cache)
pub fn ayat_cache_dir() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .context("Unable to determine user cache directory")?
        .join("ayat");

    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("creating cache directory at {}", cache_dir.display()))?;

    Ok(cache_dir)
}

pub fn config_file_path() -> Result<PathBuf> {
    Ok(ayat_config_dir()?.join("ayat.toml"))
}

pub fn default_database_path() -> Result<PathBuf> {
    Ok(ayat_data_dir()?.join("progress.db"))
}

pub fn verse_cache_path() -> Result<PathBuf> {
    Ok(ayat_cache_dir()?.join("verse_cache.json"))
}
