use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::engine::{document_size, EngineError, StorageEngine, PROBE_KEY};

/// In-memory engine. Used as the test fake and as the fallback when the
/// storage file cannot be opened (nothing survives a restart in that case).
pub struct MemoryEngine {
    entries: RwLock<BTreeMap<String, String>>,
    available: AtomicBool,
    quota: Option<usize>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            quota: None,
        }
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::new()
        }
    }

    /// Seeds raw text under `key`, bypassing availability and quota.
    pub fn with_entry(self, key: &str, value: &str) -> Self {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// When false, every engine call fails as if the medium were gone.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), EngineError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EngineError::Unreachable("memory engine switched off".to_string()))
        }
    }
}

impl StorageEngine for MemoryEngine {
    fn get_item(&self, key: &str) -> Result<Option<String>, EngineError> {
        self.check()?;
        let entries = self.entries.read().map_err(|_| EngineError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.check()?;
        let mut entries = self.entries.write().map_err(|_| EngineError::Poisoned)?;

        // The probe key is exempt so a full store still reads as reachable.
        if let Some(quota) = self.quota.filter(|_| key != PROBE_KEY) {
            let others = document_size(entries.iter().filter(|(k, _)| k.as_str() != key));
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(EngineError::QuotaExceeded { needed, quota });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), EngineError> {
        self.check()?;
        let mut entries = self.entries.write().map_err(|_| EngineError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, EngineError> {
        self.check()?;
        let entries = self.entries.read().map_err(|_| EngineError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }

    fn len(&self) -> Result<usize, EngineError> {
        self.check()?;
        let entries = self.entries.read().map_err(|_| EngineError::Poisoned)?;
        Ok(entries.len())
    }

    fn clear(&self) -> Result<(), EngineError> {
        self.check()?;
        let mut entries = self.entries.write().map_err(|_| EngineError::Poisoned)?;
        entries.clear();
        Ok(())
    }
}
