/// Client-local preferences, persisted to `~/.local/share/cpdash/preferences.json`.
///
/// The store is best-effort. Availability is probed once when opening; an
/// unavailable store keeps values in memory for the life of the process and
/// never reports an error to callers.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefKey {
    ApiKey,
    ApiKeyEnabled,
    ActiveTab,
}

impl PrefKey {
    pub fn as_str(self) -> &'static str {
        match self {
            PrefKey::ApiKey => "api_key",
            PrefKey::ApiKeyEnabled => "api_key_enabled",
            PrefKey::ActiveTab => "active_tab",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available(PathBuf),
    Unavailable,
}

pub struct PreferenceStore {
    availability: Availability,
    values: BTreeMap<String, String>,
}

/// `$XDG_DATA_HOME/cpdash`, falling back to `~/.local/share/cpdash`.
pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".local/share")
        })
        .join("cpdash")
}

pub fn default_prefs_path() -> PathBuf {
    data_dir().join("preferences.json")
}

impl PreferenceStore {
    /// Probe `path` and load whatever is there. Corrupt content counts as empty.
    pub fn open(path: &Path) -> Self {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %path.display(), error = %e, "preference storage unavailable");
                return Self::unavailable();
            }
        }
        let values = match fs::read(path) {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring unreadable preferences");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "preference storage unavailable");
                return Self::unavailable();
            }
        };
        Self { availability: Availability::Available(path.to_path_buf()), values }
    }

    pub fn unavailable() -> Self {
        Self { availability: Availability::Unavailable, values: BTreeMap::new() }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.availability, Availability::Available(_))
    }

    pub fn get(&self, key: PrefKey) -> Option<&str> {
        self.values.get(key.as_str()).map(String::as_str)
    }

    pub fn get_bool(&self, key: PrefKey) -> Option<bool> {
        match self.get(key)? {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    pub fn set(&mut self, key: PrefKey, value: impl Into<String>) {
        self.values.insert(key.as_str().to_string(), value.into());
        self.flush();
    }

    pub fn set_bool(&mut self, key: PrefKey, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    fn flush(&mut self) {
        let Availability::Available(path) = &self.availability else {
            return;
        };
        let result = serde_json::to_string_pretty(&self.values)
            .map_err(std::io::Error::other)
            .and_then(|json| fs::write(path, json));
        match result {
            Ok(()) => debug!(path = %path.display(), "preferences saved"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "preference write failed; continuing in memory");
                self.availability = Availability::Unavailable;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_available_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::open(&dir.path().join("prefs.json"));
        assert!(store.is_available());
        assert_eq!(store.get(PrefKey::ActiveTab), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/prefs.json");
        {
            let mut store = PreferenceStore::open(&path);
            store.set(PrefKey::ActiveTab, "stacks");
            store.set(PrefKey::ApiKey, "k-123");
            store.set_bool(PrefKey::ApiKeyEnabled, false);
        }
        let store = PreferenceStore::open(&path);
        assert_eq!(store.get(PrefKey::ActiveTab), Some("stacks"));
        assert_eq!(store.get(PrefKey::ApiKey), Some("k-123"));
        assert_eq!(store.get_bool(PrefKey::ApiKeyEnabled), Some(false));
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{not json").unwrap();
        let store = PreferenceStore::open(&path);
        assert!(store.is_available());
        assert_eq!(store.get(PrefKey::ApiKey), None);
    }

    #[test]
    fn test_invalid_utf8_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, [0xff, 0xfe, b'{', 0x80]).unwrap();
        let mut store = PreferenceStore::open(&path);
        assert!(store.is_available());
        assert_eq!(store.get(PrefKey::ActiveTab), None);

        // Still writable: the next set replaces the corrupt file.
        store.set(PrefKey::ActiveTab, "service");
        assert_eq!(PreferenceStore::open(&path).get(PrefKey::ActiveTab), Some("service"));
    }

    #[test]
    fn test_unavailable_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let mut store = PreferenceStore::open(&blocker.join("prefs.json"));
        assert!(!store.is_available());

        // Degraded mode still answers from memory.
        store.set(PrefKey::ActiveTab, "create");
        assert_eq!(store.get(PrefKey::ActiveTab), Some("create"));
    }

    #[test]
    fn test_write_failure_degrades_silently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let mut store = PreferenceStore::open(&path);
        // A directory where the file should be makes the write fail.
        fs::create_dir(&path).unwrap();
        store.set(PrefKey::ApiKey, "k");
        assert!(!store.is_available());
        assert_eq!(store.get(PrefKey::ApiKey), Some("k"));
    }
}
