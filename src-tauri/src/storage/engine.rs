// Raw key-value medium behind the storage adapter.
// Engines only move text around; JSON encoding and the error taxonomy live in `storage::mod`.

use thiserror::Error;

/// Key written and deleted by the default availability probe.
pub const PROBE_KEY: &str = "__storage_probe__";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage medium is unreachable: {0}")]
    Unreachable(String),
    #[error("storage quota exceeded ({needed} bytes needed, {quota} allowed)")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("storage document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

/// A synchronous text key-value store, the role browser local storage plays on the web.
pub trait StorageEngine: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, EngineError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), EngineError>;
    fn remove_item(&self, key: &str) -> Result<(), EngineError>;
    fn keys(&self) -> Result<Vec<String>, EngineError>;
    fn len(&self) -> Result<usize, EngineError>;
    fn clear(&self) -> Result<(), EngineError>;

    fn is_empty(&self) -> Result<bool, EngineError> {
        Ok(self.len()? == 0)
    }

    /// Disposable write/delete cycle. Any error means the medium is unavailable.
    fn probe(&self) -> Result<(), EngineError> {
        self.set_item(PROBE_KEY, PROBE_KEY)?;
        self.remove_item(PROBE_KEY)
    }
}

/// Serialized size of a key/value document, used for quota checks.
pub(crate) fn document_size<'a>(entries: impl Iterator<Item = (&'a String, &'a String)>) -> usize {
    entries.map(|(k, v)| k.len() + v.len()).sum()
}
