use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::engine::{document_size, EngineError, StorageEngine};

/// Writes `contents` next to `path` and renames it into place, so a crash
/// never leaves a half-written file behind.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);
    fs::write(&tmp_path, contents)?;
    fs::rename(tmp_path, path)
}

/// File-backed engine: every key lives in a single JSON object on disk.
///
/// The whole document is rewritten on each mutation and only committed to
/// memory once the rename succeeded.
pub struct FileEngine {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl FileEngine {
    /// Opens (or lazily creates) the document at `path`.
    ///
    /// A missing file is an empty store. A file that is not a JSON object of
    /// strings is reported as `EngineError::Corrupt` instead of being dropped.
    pub fn open(path: impl Into<PathBuf>, quota: Option<usize>) -> Result<Self, EngineError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        log::info!(
            "[Storage] Opened {} with {} key(s)",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            quota,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(entries)?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }

    /// Applies `change` to a copy of the document, persists it, then commits.
    fn mutate(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), EngineError> {
        let mut entries = self.entries.lock().map_err(|_| EngineError::Poisoned)?;
        let mut next = entries.clone();
        change(&mut next);

        if let Some(quota) = self.quota {
            let needed = document_size(next.iter());
            if needed > quota {
                return Err(EngineError::QuotaExceeded { needed, quota });
            }
        }

        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl StorageEngine for FileEngine {
    fn get_item(&self, key: &str) -> Result<Option<String>, EngineError> {
        let entries = self.entries.lock().map_err(|_| EngineError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), EngineError> {
        {
            let entries = self.entries.lock().map_err(|_| EngineError::Poisoned)?;
            if !entries.contains_key(key) {
                return Ok(());
            }
        }
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn keys(&self) -> Result<Vec<String>, EngineError> {
        let entries = self.entries.lock().map_err(|_| EngineError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }

    fn len(&self) -> Result<usize, EngineError> {
        let entries = self.entries.lock().map_err(|_| EngineError::Poisoned)?;
        Ok(entries.len())
    }

    fn clear(&self) -> Result<(), EngineError> {
        self.mutate(|entries| entries.clear())
    }

    // Probe the directory rather than the document so a probe never rewrites it.
    fn probe(&self) -> Result<(), EngineError> {
        let probe_path = self.path.with_extension("probe");
        if let Some(parent) = probe_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&probe_path, b"probe")?;
        fs::remove_file(&probe_path)?;
        Ok(())
    }
}
