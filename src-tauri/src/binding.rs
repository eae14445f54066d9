// Reactive storage binding: one storage key mirrored as in-memory state.
// The value is read once by `load`, then every `set_value`/`remove_value`
// writes through synchronously before memory changes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;

use crate::storage::{LocalStorage, StorageError, StorageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
}

pub struct StoredValue<T> {
    storage: LocalStorage,
    key: String,
    default: Option<T>,
    state: LoadState,
    value: Option<T>,
    error: Option<String>,
    // The initial read could not reach storage.
    unread: bool,
    // Stored text did not decode as `T`. Plain writes are refused until
    // `overwrite` or `remove_value` replaces it.
    unreadable: bool,
    changes: watch::Sender<Option<T>>,
}

impl<T> StoredValue<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Creates the binding in the `Loading` state. Nothing is read until `load`.
    pub fn new(storage: LocalStorage, key: impl Into<String>, default: Option<T>) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            storage,
            key: key.into(),
            default,
            state: LoadState::Loading,
            value: None,
            error: None,
            unread: false,
            unreadable: false,
            changes,
        }
    }

    pub fn open(storage: LocalStorage, key: impl Into<String>, default: Option<T>) -> Self {
        let mut binding = Self::new(storage, key, default);
        binding.load();
        binding
    }

    /// Performs the one-time initial read. Later calls do nothing.
    pub fn load(&mut self) {
        if self.state == LoadState::Ready {
            return;
        }

        self.unread = false;
        self.unreadable = false;
        match self.storage.get_as::<T>(&self.key) {
            Ok(value) => {
                self.value = Some(value);
            }
            Err(StorageError::NotFound(_)) => {
                self.value = self.default.clone();
            }
            Err(StorageError::Unavailable) => {
                self.error = Some(StorageError::Unavailable.to_string());
                self.unread = true;
            }
            // Stored text that does not fit `T`. Keep it on disk, run on the default.
            Err(e @ StorageError::OperationFailed(_)) => {
                self.error = Some(e.to_string());
                self.value = self.default.clone();
                self.unreadable = true;
            }
        }

        self.state = LoadState::Ready;
        self.changes.send_replace(self.value.clone());
    }

    /// Writes `value` through to storage, then commits it in memory.
    /// Refused while the stored text could not be decoded.
    pub fn set_value(&mut self, value: T) -> StorageResult<()> {
        if self.unreadable {
            let e = StorageError::OperationFailed(format!(
                "value under '{}' could not be read and is kept until it is cleared",
                self.key
            ));
            log::warn!("[Binding] Refusing to overwrite: {}", e);
            return Err(e);
        }
        self.write(value)
    }

    /// Like `set_value`, but also replaces stored text that could not be decoded.
    pub fn overwrite(&mut self, value: T) -> StorageResult<()> {
        self.write(value)
    }

    fn write(&mut self, value: T) -> StorageResult<()> {
        match self.storage.set(&self.key, &value) {
            Ok(()) => {
                self.value = Some(value);
                self.error = None;
                self.unread = false;
                self.unreadable = false;
                self.changes.send_replace(self.value.clone());
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn remove_value(&mut self) -> StorageResult<()> {
        match self.storage.remove(&self.key) {
            Ok(()) => {
                self.value = None;
                self.error = None;
                self.unread = false;
                self.unreadable = false;
                self.changes.send_replace(None);
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// True when the error would go away once storage is reachable again.
    pub fn is_recoverable(&self) -> bool {
        self.error.is_some() && !self.unreadable
    }

    /// Called once storage is reachable again. Drops a stale error and re-reads
    /// a value the initial load could not reach. Undecodable text keeps its error.
    pub fn recover(&mut self) {
        if !self.is_recoverable() {
            return;
        }
        self.error = None;
        if self.unread {
            log::info!("[Binding] Re-reading '{}'", self.key);
            self.state = LoadState::Loading;
            self.load();
        }
    }

    /// Whether the stored text failed to decode on load.
    pub fn is_unreadable(&self) -> bool {
        self.unreadable
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Receives every committed value, starting with the current one.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.changes.subscribe()
    }
}
