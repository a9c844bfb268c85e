//! Persistent record of tuned solutions.
//!
//! Results are saved to a JSON file keyed by device fingerprint and problem
//! key. A later run on the same device looks the problem up instead of
//! benchmarking it again.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overrides the wisdom file location.
pub const ENV_WISDOM_PATH: &str = "GBLAS_WISDOM_PATH";

#[derive(Debug, Error)]
pub enum WisdomError {
    #[error("wisdom file I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("wisdom file format: {0}")]
    Format(#[from] serde_json::Error),
}

/// The fastest solution found for one problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WisdomEntry {
    pub solution: i32,
    pub kernel: String,
    pub best_time_us: f64,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: u64,
}

/// fingerprint -> (problem key -> entry)
type Entries = BTreeMap<String, BTreeMap<String, WisdomEntry>>;

#[derive(Debug, Clone)]
pub struct WisdomDb {
    entries: Entries,
    path: PathBuf,
    dirty: bool,
}

impl WisdomDb {
    pub fn new(path: PathBuf) -> Self {
        WisdomDb {
            entries: Entries::new(),
            path,
            dirty: false,
        }
    }

    /// `$GBLAS_WISDOM_PATH`, else `$XDG_CACHE_HOME/gblas/wisdom.json`
    /// (`~/.cache` when unset).
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(ENV_WISDOM_PATH) {
            return PathBuf::from(path);
        }
        match dirs_cache() {
            Some(dir) => dir.join("gblas").join("wisdom.json"),
            None => PathBuf::from("gblas_wisdom.json"),
        }
    }

    /// Load from `path`. A missing or unreadable file yields an empty db.
    pub fn load(path: &Path) -> Self {
        let mut db = WisdomDb::new(path.to_path_buf());
        match Self::read_entries(path) {
            Ok(Some(entries)) => db.entries = entries,
            Ok(None) => {}
            Err(e) => log::warn!("ignoring wisdom file {}: {e}", path.display()),
        }
        db
    }

    pub fn load_default() -> Self {
        Self::load(&Self::default_path())
    }

    fn read_entries(path: &Path) -> Result<Option<Entries>, WisdomError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, fingerprint: &str, problem_key: &str) -> Option<&WisdomEntry> {
        self.entries.get(fingerprint).and_then(|m| m.get(problem_key))
    }

    pub fn put(&mut self, fingerprint: &str, problem_key: &str, solution: i32, kernel: &str, best_time_us: f64) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.entries.entry(fingerprint.to_string()).or_default().insert(
            problem_key.to_string(),
            WisdomEntry {
                solution,
                kernel: kernel.to_string(),
                best_time_us,
                timestamp,
            },
        );
        self.dirty = true;
    }

    pub fn remove(&mut self, fingerprint: &str, problem_key: &str) -> Option<WisdomEntry> {
        let removed = self.entries.get_mut(fingerprint)?.remove(problem_key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Write to disk if anything changed since the last load or save.
    pub fn save(&mut self) -> Result<(), WisdomError> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, content)?;
        self.dirty = false;
        Ok(())
    }

    pub fn total_entries(&self) -> usize {
        self.entries.values().map(|m| m.len()).sum()
    }

    pub fn fingerprints(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn clear_device(&mut self, fingerprint: &str) {
        if self.entries.remove(fingerprint).is_some() {
            self.dirty = true;
        }
    }

    pub fn clear_all(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }
}

fn dirs_cache() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        return Some(PathBuf::from(xdg));
    }
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".cache"));
    }
    None
}
