use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::paths;
use crate::scheduler::RangePolicy;

fn default_verses_per_reel() -> u32 {
    3
}

fn default_max_verses_per_reel() -> u32 {
    10
}

fn default_reciter() -> String {
    "alafasy".to_string()
}

fn default_reciters() -> Vec<String> {
    ["alafasy", "husary", "minshawi", "abdul_basit", "sudais"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_text_api_url() -> String {
    "https://api.alquran.cloud/v1/ayah/{chapter}:{verse}/quran-uthmani".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CorpusConfig {
    /// `{chapter}` and `{verse}` are substituted per verse
    #[serde(default = "default_text_api_url")]
    pub text_api_url: String,
    #[serde(default = "default_true")]
    pub fetch_text: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts after a network error or a 5xx response
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Delay before the first retry; doubled for each further one
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        CorpusConfig {
            text_api_url: default_text_api_url(),
            fetch_text: true,
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    /// Program and arguments of the external renderer/uploader
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_verses_per_reel")]
    pub verses_per_reel: u32,
    #[serde(default = "default_max_verses_per_reel")]
    pub max_verses_per_reel: u32,
    #[serde(default)]
    pub allow_cross_chapter: bool,
    #[serde(default = "default_reciter")]
    pub default_reciter: String,
    #[serde(default = "default_reciters")]
    pub reciters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verses_per_reel: default_verses_per_reel(),
            max_verses_per_reel: default_max_verses_per_reel(),
            allow_cross_chapter: false,
            default_reciter: default_reciter(),
            reciters: default_reciters(),
            database_path: None,
            corpus: CorpusConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

impl Config {
    /// Load the config from `path`, or from the default location.
    /// A missing file is created with the defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let cfg_path = match path {
            Some(p) => p.to_path_buf(),
            None => paths::config_file_path()?,
        };
        if !cfg_path.exists() {
            let default = Config::default();
            default.save_to(&cfg_path)?;
            return Ok(default);
        }
        let s = fs::read_to_string(&cfg_path)
            .with_context(|| format!("reading config {}", cfg_path.display()))?;
        let c: Config = toml::from_str(&s)
            .with_context(|| format!("parsing config toml {}", cfg_path.display()))?;
        c.validate()
            .with_context(|| format!("invalid config {}", cfg_path.display()))?;
        Ok(c)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("creating config directory")?;
        }
        let toml = toml::to_string_pretty(self).context("serializing config to toml")?;
        fs::write(path, toml)
            .with_context(|| format!("writing config to {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.verses_per_reel == 0 {
            bail!("verses_per_reel must be at least 1");
        }
        if self.max_verses_per_reel == 0 {
            bail!("max_verses_per_reel must be at least 1");
        }
        if self.default_reciter.trim().is_empty() {
            bail!("default_reciter must not be empty");
        }
        Ok(())
    }

    pub fn range_policy(&self) -> RangePolicy {
        RangePolicy {
            allow_cross_chapter: self.allow_cross_chapter,
            max_verses: Some(self.max_verses_per_reel),
        }
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(p) => {
                let path = expand(p);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("creating database directory {}", parent.display())
                    })?;
                }
                Ok(path)
            }
            None => paths::default_database_path(),
        }
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.pipeline.output_dir.as_deref().map(expand)
    }

    pub fn is_known_reciter(&self, key: &str) -> bool {
        self.reciters.iter().any(|r| r == key)
    }
}
