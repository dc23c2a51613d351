use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use super::ProviderError;
use crate::scheduler::VerseAddress;

/// JSON file of already fetched verse texts, keyed `text:<chapter>:<verse>`.
#[derive(Debug, Default)]
pub struct VerseCache {
    path: Option<PathBuf>,
    entries: HashMap<String, String>,
}

fn key(address: VerseAddress) -> String {
    format!("text:{}:{}", address.chapter, address.verse)
}

impl VerseCache {
    #[cfg(test)]
    pub fn in_memory() -> Self {
        VerseCache::default()
    }

    /// Load the cache file. A missing or unreadable file starts an empty cache.
    pub fn load(path: PathBuf) -> Self {
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        VerseCache {
            path: Some(path),
            entries,
        }
    }

    pub fn get(&self, address: VerseAddress) -> Option<&str> {
        self.entries.get(&key(address)).map(String::as_str)
    }

    pub fn insert(&mut self, address: VerseAddress, text: String) -> Result<(), ProviderError> {
        self.entries.insert(key(address), text);
        self.save()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) -> Result<(), ProviderError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| ProviderError::CacheError(e.to_string()))?;
        fs::write(path, json).map_err(|e| {
            ProviderError::CacheError(format!("writing {}: {}", path.display(), e))
        })
    }
}
