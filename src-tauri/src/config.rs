use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::file::write_atomic;

pub const CONFIG_FILE: &str = "config.json";

/// Roughly what browsers allow a single origin in local storage.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub storage_file: String,
    pub storage_quota_bytes: Option<usize>,
    pub default_title: String,
    pub dark_mode_default: bool,
    pub counter_name_prefix: String,
    pub export_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_file: "storage.json".to_string(),
            storage_quota_bytes: Some(DEFAULT_QUOTA_BYTES),
            default_title: "Counter X".to_string(),
            dark_mode_default: true,
            counter_name_prefix: "Counter".to_string(),
            export_dir: None,
        }
    }
}

impl AppConfig {
    pub fn get_path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    pub fn load(data_dir: &Path) -> Self {
        let path = Self::get_path(data_dir);
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    log::warn!("[Config] Failed to parse config: {}, returning defaults", e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("[Config] Failed to read file: {}, returning defaults", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), String> {
        let path = Self::get_path(data_dir);
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        write_atomic(&path, json.as_bytes()).map_err(|e| e.to_string())
    }

    pub fn storage_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.storage_file)
    }
}
