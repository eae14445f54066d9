// Document title and theme flag, each bound to its own storage key.

use crate::binding::StoredValue;
use crate::storage::{LocalStorage, StorageResult};

pub const TITLE_KEY: &str = "app-title";
pub const THEME_KEY: &str = "theme-dark";

pub struct Preferences {
    title: StoredValue<String>,
    dark_mode: StoredValue<bool>,
    default_title: String,
    dark_by_default: bool,
}

impl Preferences {
    pub fn new(storage: LocalStorage, default_title: impl Into<String>, dark_by_default: bool) -> Self {
        let default_title = default_title.into();
        Self {
            title: StoredValue::new(storage.clone(), TITLE_KEY, Some(default_title.clone())),
            dark_mode: StoredValue::new(storage, THEME_KEY, Some(dark_by_default)),
            default_title,
            dark_by_default,
        }
    }

    pub fn open(storage: LocalStorage, default_title: impl Into<String>, dark_by_default: bool) -> Self {
        let mut prefs = Self::new(storage, default_title, dark_by_default);
        prefs.load();
        prefs
    }

    pub fn load(&mut self) {
        self.title.load();
        self.dark_mode.load();
    }

    pub fn is_loading(&self) -> bool {
        self.title.is_loading() || self.dark_mode.is_loading()
    }

    pub fn error(&self) -> Option<&str> {
        self.title.error().or_else(|| self.dark_mode.error())
    }

    pub fn is_recoverable(&self) -> bool {
        self.title.is_recoverable() || self.dark_mode.is_recoverable()
    }

    pub fn recover(&mut self) {
        self.title.recover();
        self.dark_mode.recover();
    }

    /// The stored title, or the configured default when none could be read.
    pub fn display_title(&self) -> &str {
        match self.title.value() {
            Some(title) if !title.is_empty() => title,
            _ => &self.default_title,
        }
    }

    /// Saves an edited title. Blank input keeps the current title and returns false.
    pub fn commit_title(&mut self, input: &str) -> StorageResult<bool> {
        let title = input.trim();
        if title.is_empty() {
            return Ok(false);
        }
        self.title.overwrite(title.to_string())?;
        Ok(true)
    }

    pub fn is_dark(&self) -> bool {
        self.dark_mode.value().copied().unwrap_or(self.dark_by_default)
    }

    pub fn toggle_theme(&mut self) -> StorageResult<bool> {
        // A single flag; an unreadable stored value is simply replaced.
        let next = !self.is_dark();
        self.dark_mode.overwrite(next)?;
        Ok(next)
    }

    pub fn title_binding(&self) -> &StoredValue<String> {
        &self.title
    }

    pub fn theme_binding(&self) -> &StoredValue<bool> {
        &self.dark_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryEngine, StorageEngine};
    use rstest::rstest;
    use std::sync::Arc;

    fn prefs_with(engine: MemoryEngine) -> (Preferences, Arc<MemoryEngine>) {
        let engine = Arc::new(engine);
        let storage = LocalStorage::new(engine.clone());
        (Preferences::open(storage, "Counter X", true), engine)
    }

    #[test]
    fn test_defaults_when_nothing_stored() {
        let (prefs, _) = prefs_with(MemoryEngine::new());
        assert_eq!(prefs.display_title(), "Counter X");
        assert!(prefs.is_dark());
        assert!(!prefs.is_loading());
    }

    #[test]
    fn test_reads_stored_values() {
        let (prefs, _) = prefs_with(
            MemoryEngine::new()
                .with_entry(TITLE_KEY, "Gym log")
                .with_entry(THEME_KEY, "false"),
        );
        assert_eq!(prefs.display_title(), "Gym log");
        assert!(!prefs.is_dark());
    }

    #[rstest]
    #[case("  Birds seen  ", true, "Birds seen")]
    #[case("\t\n", false, "Counter X")]
    fn test_commit_title(#[case] input: &str, #[case] accepted: bool, #[case] shown: &str) {
        let (mut prefs, engine) = prefs_with(MemoryEngine::new());
        assert_eq!(prefs.commit_title(input).unwrap(), accepted);
        assert_eq!(prefs.display_title(), shown);
        assert_eq!(engine.get_item(TITLE_KEY).unwrap().is_some(), accepted);
    }

    #[test]
    fn test_title_stored_as_plain_text() {
        let (mut prefs, engine) = prefs_with(MemoryEngine::new());
        prefs.commit_title("1984").unwrap();
        assert_eq!(engine.get_item(TITLE_KEY).unwrap().as_deref(), Some("1984"));

        let reopened = Preferences::open(LocalStorage::new(engine.clone()), "Counter X", true);
        assert_eq!(reopened.display_title(), "1984");
    }

    #[test]
    fn test_toggle_theme_persists() {
        let (mut prefs, engine) = prefs_with(MemoryEngine::new());
        assert!(!prefs.toggle_theme().unwrap());
        assert_eq!(engine.get_item(THEME_KEY).unwrap().as_deref(), Some("false"));
        assert!(prefs.toggle_theme().unwrap());
        assert!(prefs.is_dark());
    }

    #[test]
    fn test_recover_loads_stored_preferences() {
        let engine = Arc::new(
            MemoryEngine::new()
                .with_entry(TITLE_KEY, "Stored")
                .with_entry(THEME_KEY, "false"),
        );
        engine.set_available(false);
        let mut prefs = Preferences::open(LocalStorage::new(engine.clone()), "Counter X", true);
        assert!(prefs.is_recoverable());

        engine.set_available(true);
        prefs.recover();
        assert_eq!(prefs.error(), None);
        assert_eq!(prefs.display_title(), "Stored");
        assert!(!prefs.is_dark());
    }

    #[test]
    fn test_toggle_replaces_unreadable_theme() {
        let (mut prefs, engine) = prefs_with(MemoryEngine::new().with_entry(THEME_KEY, "maybe"));
        assert!(prefs.error().is_some());
        assert!(prefs.is_dark());

        assert!(!prefs.toggle_theme().unwrap());
        assert_eq!(prefs.error(), None);
        assert_eq!(engine.get_item(THEME_KEY).unwrap().as_deref(), Some("false"));
    }

    #[test]
    fn test_unavailable_storage_falls_back_to_defaults() {
        let engine = Arc::new(MemoryEngine::new().with_entry(TITLE_KEY, "Stored"));
        engine.set_available(false);
        let mut prefs = Preferences::open(LocalStorage::new(engine.clone()), "Counter X", true);

        assert_eq!(prefs.display_title(), "Counter X");
        assert_eq!(prefs.error(), Some("storage is not available"));
        assert!(prefs.commit_title("New").is_err());
        assert_eq!(prefs.display_title(), "Counter X");
    }
}
