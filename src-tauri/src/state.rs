// Shared application state, wired over one storage handle.
// Used by the desktop commands and testable without Tauri.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::config::AppConfig;
use crate::counters::{Counter, CounterList};
use crate::preferences::Preferences;
use crate::report::ExportGuard;
use crate::storage::{FileEngine, LocalStorage, MemoryEngine};

/// Everything the presentation layer needs to draw a frame.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub counters: Vec<Counter>,
    pub title: String,
    pub dark_mode: bool,
    pub loading: bool,
    pub storage_error: Option<String>,
    /// Stored counters exist but could not be decoded. Only "Delete all" replaces them.
    pub counters_unreadable: bool,
}

pub struct Workspace {
    pub counters: CounterList,
    pub preferences: Preferences,
    storage: LocalStorage,
}

impl Workspace {
    pub fn new(storage: LocalStorage, config: &AppConfig) -> Self {
        Self {
            counters: CounterList::new(storage.clone(), config.counter_name_prefix.clone()),
            preferences: Preferences::new(
                storage.clone(),
                config.default_title.clone(),
                config.dark_mode_default,
            ),
            storage,
        }
    }

    pub fn load(&mut self) {
        self.counters.load();
        self.preferences.load();
    }

    /// Clears errors left by an earlier outage once storage answers again.
    /// Stored values that could not be decoded keep their error.
    pub fn recover(&mut self) {
        let stale = self.counters.binding().is_recoverable() || self.preferences.is_recoverable();
        if !stale || !self.storage.is_available() {
            return;
        }
        self.counters.recover();
        self.preferences.recover();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            counters: self.counters.counters().to_vec(),
            title: self.preferences.display_title().to_string(),
            dark_mode: self.preferences.is_dark(),
            loading: self.counters.is_loading() || self.preferences.is_loading(),
            storage_error: self
                .counters
                .error()
                .or_else(|| self.preferences.error())
                .map(str::to_string),
            counters_unreadable: self.counters.binding().is_unreadable(),
        }
    }
}

pub struct AppState {
    pub workspace: Arc<Mutex<Workspace>>,
    pub exports: ExportGuard,
    pub config: AppConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    pub fn new(storage: LocalStorage, config: AppConfig, data_dir: PathBuf) -> Self {
        let mut workspace = Workspace::new(storage, &config);
        workspace.load();
        Self {
            workspace: Arc::new(Mutex::new(workspace)),
            exports: ExportGuard::new(),
            config,
            data_dir,
        }
    }

    /// Where reports go when no download directory is known.
    pub fn export_dir(&self, downloads: Option<PathBuf>) -> PathBuf {
        self.config
            .export_dir
            .clone()
            .or(downloads)
            .unwrap_or_else(|| self.data_dir.clone())
    }
}

/// Opens the file engine for `config`, falling back to memory when the file
/// cannot be used. The fallback keeps the app usable; nothing is persisted.
pub fn open_storage(config: &AppConfig, data_dir: &Path) -> LocalStorage {
    let path = config.storage_path(data_dir);
    match FileEngine::open(&path, config.storage_quota_bytes) {
        Ok(engine) => LocalStorage::new(Arc::new(engine)),
        Err(e) => {
            log::warn!(
                "[Storage] Cannot use {}: {}. Falling back to memory",
                path.display(),
                e
            );
            LocalStorage::new(Arc::new(MemoryEngine::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_of_fresh_workspace() {
        let state = AppState::new(
            LocalStorage::in_memory(),
            AppConfig::default(),
            PathBuf::from("/tmp"),
        );
        let snapshot = state.workspace.lock().unwrap().snapshot();

        assert_eq!(
            snapshot,
            Snapshot {
                counters: vec![],
                title: "Counter X".to_string(),
                dark_mode: true,
                loading: false,
                storage_error: None,
                counters_unreadable: false,
            }
        );
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let state = AppState::new(
            LocalStorage::in_memory(),
            AppConfig::default(),
            PathBuf::from("/tmp"),
        );
        let json = serde_json::to_value(state.workspace.lock().unwrap().snapshot()).unwrap();
        assert!(json.get("darkMode").is_some());
        assert!(json.get("storageError").is_some());
    }

    #[test]
    fn test_recovered_storage_clears_stale_errors() {
        let engine = Arc::new(MemoryEngine::new().with_entry("app-title", "Pushups"));
        engine.set_available(false);
        let mut ws = Workspace::new(LocalStorage::new(engine.clone()), &AppConfig::default());
        ws.load();
        assert_eq!(
            ws.snapshot().storage_error.as_deref(),
            Some("storage is not available")
        );

        engine.set_available(true);
        ws.counters.add().unwrap();
        ws.recover();

        let snapshot = ws.snapshot();
        assert_eq!(snapshot.storage_error, None);
        assert_eq!(snapshot.title, "Pushups");
        assert_eq!(snapshot.counters.len(), 1);
    }

    #[test]
    fn test_recover_while_still_unavailable_keeps_error() {
        let engine = Arc::new(MemoryEngine::new());
        engine.set_available(false);
        let mut ws = Workspace::new(LocalStorage::new(engine), &AppConfig::default());
        ws.load();

        ws.recover();
        assert!(ws.snapshot().storage_error.is_some());
    }

    #[test]
    fn test_recover_keeps_undecodable_counters_error() {
        let engine = Arc::new(MemoryEngine::new().with_entry("counters", r#"{"a":1}"#));
        let mut ws = Workspace::new(LocalStorage::new(engine), &AppConfig::default());
        ws.load();

        ws.recover();
        let snapshot = ws.snapshot();
        assert!(snapshot.counters_unreadable);
        assert!(snapshot.storage_error.unwrap().contains("unexpected shape"));
    }

    #[test]
    fn test_file_storage_survives_restart() {
        let dir = tempdir().unwrap();
        let config = AppConfig::default();

        {
            let state = AppState::new(
                open_storage(&config, dir.path()),
                config.clone(),
                dir.path().to_path_buf(),
            );
            let mut ws = state.workspace.lock().unwrap();
            let counter = ws.counters.add().unwrap();
            ws.counters.increment(&counter.id).unwrap();
            ws.preferences.commit_title("Pushups").unwrap();
            ws.preferences.toggle_theme().unwrap();
        }

        let state = AppState::new(
            open_storage(&config, dir.path()),
            config,
            dir.path().to_path_buf(),
        );
        let snapshot = state.workspace.lock().unwrap().snapshot();
        assert_eq!(snapshot.counters.len(), 1);
        assert_eq!(snapshot.counters[0].count, 1);
        assert_eq!(snapshot.title, "Pushups");
        assert!(!snapshot.dark_mode);
    }

    #[test]
    fn test_corrupt_storage_falls_back_to_memory() {
        let dir = tempdir().unwrap();
        let config = AppConfig::default();
        fs::write(config.storage_path(dir.path()), "[[[").unwrap();

        let storage = open_storage(&config, dir.path());
        storage.set("counters", &Vec::<Counter>::new()).unwrap();
        // The broken file is left alone
        assert_eq!(
            fs::read_to_string(config.storage_path(dir.path())).unwrap(),
            "[[["
        );
    }

    #[test]
    fn test_export_dir_preference() {
        let mut config = AppConfig::default();
        let state = AppState::new(
            LocalStorage::in_memory(),
            config.clone(),
            PathBuf::from("/data"),
        );
        assert_eq!(state.export_dir(None), PathBuf::from("/data"));
        assert_eq!(
            state.export_dir(Some(PathBuf::from("/home/me/Downloads"))),
            PathBuf::from("/home/me/Downloads")
        );

        config.export_dir = Some(PathBuf::from("/reports"));
        let state = AppState::new(LocalStorage::in_memory(), config, PathBuf::from("/data"));
        assert_eq!(
            state.export_dir(Some(PathBuf::from("/home/me/Downloads"))),
            PathBuf::from("/reports")
        );
    }
}
