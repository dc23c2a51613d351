use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated config, data and cache directories for one test.
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    /// Environment whose production command echoes a file name built from the range.
    pub fn new() -> Result<Self> {
        Self::with_pipeline(&[
            "sh",
            "-c",
            "echo reel-$AYAT_CHAPTER-$AYAT_START_VERSE-$AYAT_END_VERSE.mp4",
        ])
    }

    pub fn with_pipeline(command: &[&str]) -> Result<Self> {
        let env = Self {
            temp_dir: tempfile::tempdir()?,
        };
        for dir in ["xdg/config", "xdg/data", "xdg/cache"] {
            fs::create_dir_all(env.path().join(dir))?;
        }
        env.write_config(command)?;
        Ok(env)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("ayat.toml")
    }

    pub fn database_path(&self) -> PathBuf {
        self.path().join("progress.db")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.database_path().with_extension("lock")
    }

    pub fn xdg(&self, kind: &str) -> PathBuf {
        self.path().join("xdg").join(kind)
    }

    fn write_config(&self, command: &[&str]) -> Result<()> {
        let command = command
            .iter()
            .map(|part| format!("{:?}", part))
            .collect::<Vec<_>>()
            .join(", ");
        let toml = format!(
            r#"verses_per_reel = 3
database_path = {:?}

[corpus]
fetch_text = false

[pipeline]
command = [{}]
"#,
            self.database_path().to_string_lossy(),
            command
        );
        fs::write(self.config_path(), toml)?;
        Ok(())
    }
}
