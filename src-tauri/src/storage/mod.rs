// Persistent key-value store adapter.
// Every operation probes the engine first and converts failures into a
// `StorageError` value. Nothing here panics on a storage fault.

pub mod engine;
pub mod file;
pub mod memory;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use engine::{EngineError, StorageEngine};
pub use file::FileEngine;
pub use memory::MemoryEngine;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage is not available")]
    Unavailable,
    #[error("{0}")]
    OperationFailed(String),
    #[error("key not found: {0}")]
    NotFound(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Logs the failure the same way for every operation and hands it back.
fn report(operation: &str, error: StorageError) -> StorageError {
    log::warn!("[Storage] {} failed: {}", operation, error);
    error
}

/// Encodes a value for storage. Strings are stored verbatim, anything else as JSON.
fn encode<T: Serialize + ?Sized>(value: &T) -> StorageResult<String> {
    match serde_json::to_value(value) {
        Ok(Value::String(text)) => Ok(text),
        Ok(other) => serde_json::to_string(&other)
            .map_err(|e| StorageError::OperationFailed(e.to_string())),
        Err(e) => Err(StorageError::OperationFailed(e.to_string())),
    }
}

/// Decodes stored text. Text that is not JSON comes back as a JSON string.
fn decode(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

/// Handle on the shared storage engine. Cloning is cheap; all clones see the same medium.
#[derive(Clone)]
pub struct LocalStorage {
    engine: Arc<dyn StorageEngine>,
}

impl LocalStorage {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryEngine::new()))
    }

    pub fn is_available(&self) -> bool {
        self.engine.probe().is_ok()
    }

    fn ensure_available(&self, operation: &str) -> StorageResult<()> {
        self.engine.probe().map_err(|e| {
            log::debug!("[Storage] Probe failed before {}: {}", operation, e);
            report(operation, StorageError::Unavailable)
        })
    }

    fn check_key(operation: &str, key: &str) -> StorageResult<()> {
        if key.is_empty() {
            return Err(report(
                operation,
                StorageError::OperationFailed("storage key must not be empty".to_string()),
            ));
        }
        Ok(())
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        Self::check_key("set", key)?;
        self.ensure_available("set")?;
        let text = encode(value).map_err(|e| report("set", e))?;
        self.write("set", key, &text)
    }

    pub fn set_raw(&self, key: &str, text: &str) -> StorageResult<()> {
        Self::check_key("set", key)?;
        self.ensure_available("set")?;
        self.write("set", key, text)
    }

    fn write(&self, operation: &str, key: &str, text: &str) -> StorageResult<()> {
        self.engine
            .set_item(key, text)
            .map_err(|e| report(operation, StorageError::OperationFailed(e.to_string())))
    }

    pub fn get_raw(&self, key: &str) -> StorageResult<String> {
        self.ensure_available("get")?;
        match self.engine.get_item(key) {
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(report("get", StorageError::OperationFailed(e.to_string()))),
        }
    }

    /// Reads and decodes `key`. Text that is not valid JSON is returned as-is.
    pub fn get(&self, key: &str) -> StorageResult<Value> {
        self.get_raw(key).map(decode)
    }

    /// Typed read. Falls back to treating the text as a plain string, so a
    /// title such as `2024` written verbatim still reads back as a `String`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> StorageResult<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Ok(value),
            Err(json_err) => serde_json::from_value::<T>(Value::String(raw)).map_err(|_| {
                report(
                    "get",
                    StorageError::OperationFailed(format!(
                        "value under '{}' has an unexpected shape: {}",
                        key, json_err
                    )),
                )
            }),
        }
    }

    pub fn remove(&self, key: &str) -> StorageResult<()> {
        self.ensure_available("remove")?;
        self.engine
            .remove_item(key)
            .map_err(|e| report("remove", StorageError::OperationFailed(e.to_string())))
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.ensure_available("clear")?;
        self.engine
            .clear()
            .map_err(|e| report("clear", StorageError::OperationFailed(e.to_string())))
    }

    pub fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.get_raw(key) {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn keys(&self) -> StorageResult<Vec<String>> {
        self.ensure_available("keys")?;
        self.engine
            .keys()
            .map_err(|e| report("keys", StorageError::OperationFailed(e.to_string())))
    }

    pub fn size(&self) -> StorageResult<usize> {
        self.ensure_available("size")?;
        self.engine
            .len()
            .map_err(|e| report("size", StorageError::OperationFailed(e.to_string())))
    }
}
