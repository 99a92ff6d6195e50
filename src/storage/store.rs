//! Key-value stores backing the persisted representation

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

use crate::constants;
use crate::error::StoreError;

/// Text entries under string keys
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Notification that an entry changed in another context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Changed key; `None` when the whole store was cleared
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Default)]
struct SharedEntries {
    entries: BTreeMap<String, String>,
    /// Pending notifications, one queue per context
    inboxes: Vec<VecDeque<StorageEvent>>,
}

/// In-process store shared by one or more contexts
///
/// A write through one context queues a [`StorageEvent`] for every other
/// context, never for the writer itself.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Rc<RefCell<SharedEntries>>,
    context: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let shared = SharedEntries {
            entries: BTreeMap::new(),
            inboxes: vec![VecDeque::new()],
        };
        Self {
            shared: Rc::new(RefCell::new(shared)),
            context: 0,
        }
    }

    /// Open another context over the same entries
    pub fn open_context(&self) -> Self {
        let mut shared = self.shared.borrow_mut();
        shared.inboxes.push(VecDeque::new());
        Self {
            shared: self.shared.clone(),
            context: shared.inboxes.len() - 1,
        }
    }

    /// Drain the notifications queued for this context
    pub fn take_events(&self) -> Vec<StorageEvent> {
        self.shared.borrow_mut().inboxes[self.context].drain(..).collect()
    }

    /// Remove every entry, notifying the other contexts
    pub fn clear(&self) {
        let mut shared = self.shared.borrow_mut();
        if shared.entries.is_empty() {
            return;
        }
        shared.entries.clear();
        self.notify_others(
            &mut shared,
            StorageEvent {
                key: None,
                old_value: None,
                new_value: None,
            },
        );
    }

    fn notify_others(&self, shared: &mut SharedEntries, event: StorageEvent) {
        for (context, inbox) in shared.inboxes.iter_mut().enumerate() {
            if context != self.context {
                inbox.push_back(event.clone());
            }
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.shared.borrow().entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut shared = self.shared.borrow_mut();
        let old_value = shared.entries.insert(key.to_string(), value.to_string());
        if old_value.as_deref() == Some(value) {
            return Ok(());
        }
        self.notify_others(
            &mut shared,
            StorageEvent {
                key: Some(key.to_string()),
                old_value,
                new_value: Some(value.to_string()),
            },
        );
        Ok(())
    }
}

/// Store persisted as a JSON object file
///
/// The file is re-read on every access so edits by other processes are seen.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location under the user config directory
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(constants::storage::APP_DIR);
        path.push(constants::storage::FILENAME);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries of the file; anything but a JSON object reads as empty
    fn load(&self) -> serde_json::Map<String, serde_json::Value> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Store file not readable, treating as empty");
                return serde_json::Map::new();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(serde_json::Value::Object(entries)) => entries,
            Ok(_) => {
                warn!(path = %self.path.display(), "Store file is not a JSON object, treating as empty");
                serde_json::Map::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Store file is malformed, treating as empty");
                serde_json::Map::new()
            }
        }
    }
}

impl KeyValueStore for FileStore {
    /// Non-string members are left to other writers and read as absent
    fn get(&self, key: &str) -> Option<String> {
        match self.load().remove(key) {
            Some(serde_json::Value::String(value)) => Some(value),
            _ => None,
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.load();
        entries.insert(key.to_string(), serde_json::Value::String(value.to_string()));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_notifies_other_contexts() {
        let first = MemoryStore::new();
        let second = first.open_context();

        first.set("theme", "dark").unwrap();
        assert_eq!(second.get("theme").as_deref(), Some("dark"));
        assert!(first.take_events().is_empty());
        assert_eq!(
            second.take_events(),
            vec![StorageEvent {
                key: Some("theme".to_string()),
                old_value: None,
                new_value: Some("dark".to_string()),
            }]
        );
        assert!(second.take_events().is_empty());
    }

    #[test]
    fn test_memory_store_unchanged_write_is_silent() {
        let first = MemoryStore::new();
        let second = first.open_context();

        first.set("theme", "dark").unwrap();
        second.take_events();
        first.set("theme", "dark").unwrap();
        assert!(second.take_events().is_empty());
    }

    #[test]
    fn test_memory_store_clear() {
        let first = MemoryStore::new();
        let second = first.open_context();
        first.set("theme", "dark").unwrap();
        second.take_events();

        second.clear();
        assert_eq!(first.get("theme"), None);
        let events = first.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, None);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");
        let store = FileStore::new(&path);

        assert_eq!(store.get("theme"), None);
        store.set("theme", "dark").unwrap();
        store.set("state", r#"{"mode":"dark"}"#).unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("theme").as_deref(), Some("dark"));
        assert_eq!(reopened.get("state").as_deref(), Some(r#"{"mode":"dark"}"#));
    }

    #[test]
    fn test_file_store_malformed_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.get("theme"), None);
        store.set("theme", "light").unwrap();
        assert_eq!(store.get("theme").as_deref(), Some("light"));
    }

    #[test]
    fn test_file_store_keeps_other_members() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, r#"{"theme":"dark","window":{"width":800},"count":3}"#).unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.get("theme").as_deref(), Some("dark"));
        assert_eq!(store.get("count"), None);

        store.set("theme-sync", r#"{"mode":"dark"}"#).unwrap();
        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["theme"], "dark");
        assert_eq!(written["window"]["width"], 800);
        assert_eq!(written["count"], 3);
        assert_eq!(store.get("theme-sync").as_deref(), Some(r#"{"mode":"dark"}"#));
    }
}
