//! Storage owner
//!
//! Owns the persisted representation: one JSON object under the primary key,
//! plus the raw mode value under a dedicated key when the mode property asks
//! for it. What is read is always validated, and what was invalid on disk is
//! rewritten so the persisted form heals itself.

mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore, StorageEvent};

use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error, info};

use crate::config::{Compiled, Observer};
use crate::events::{Event, EventBus};
use crate::state::{self, State};
use crate::validation::validate;

pub struct StorageOwner {
    store: Rc<dyn KeyValueStore>,
    compiled: Rc<Compiled>,
    bus: Rc<EventBus>,
    /// Validated snapshot; `None` until first access
    state: RefCell<Option<State>>,
}

impl StorageOwner {
    pub fn new(store: Rc<dyn KeyValueStore>, compiled: Rc<Compiled>, bus: Rc<EventBus>) -> Self {
        Self {
            store,
            compiled,
            bus,
            state: RefCell::new(None),
        }
    }

    /// Validated snapshot, loading it on first access
    pub fn read(&self) -> State {
        if let Some(state) = self.state.borrow().as_ref() {
            return state.clone();
        }
        let loaded = self.load();
        *self.state.borrow_mut() = Some(loaded.clone());
        loaded
    }

    /// Raw mode value under the dedicated key, if it is persisted
    pub fn read_mode(&self) -> Option<String> {
        let mode = self.compiled.mode.as_ref().filter(|mode| mode.store)?;
        self.store.get(&mode.storage_key)
    }

    /// Merge `values` over the current state and persist the result
    pub fn write(&self, values: &State) {
        let merged = state::merge(&self.read(), values);
        self.persist(&merged);
        *self.state.borrow_mut() = Some(merged);
    }

    /// Fold a cross-context notification back in
    ///
    /// Returns the sanitized state published as `StorageChanged`, if any.
    pub fn handle_event(&self, event: &StorageEvent) -> Option<State> {
        if !self.compiled.observes(Observer::Storage) {
            debug!("Storage observation disabled, ignoring notification");
            return None;
        }
        // `None` is a full clear, which also wipes the primary key
        if event
            .key
            .as_deref()
            .is_some_and(|key| key != self.compiled.storage_key)
        {
            debug!(key = ?event.key, "Ignoring notification for unrelated key");
            return None;
        }

        // Notifications may arrive after the entry moved on; the store holds the latest text
        let current = self.read();
        let previous = state::from_json(event.old_value.as_deref());
        let latest = self.store.get(&self.compiled.storage_key);
        if latest != event.new_value {
            debug!("Notification is stale, validating the stored entry instead");
        }
        let incoming = state::from_json(latest.as_deref());
        let validation = validate(&self.compiled.constraints, &incoming, Some(&previous));

        self.write(&validation.values);
        if validation.values == current {
            debug!("External storage edit produced no change");
            return None;
        }

        info!(state = ?validation.values, "Adopting external storage edit");
        self.bus.emit(&Event::StorageChanged(validation.values.clone()));
        Some(validation.values)
    }

    fn load(&self) -> State {
        let raw = self.store.get(&self.compiled.storage_key);
        let validation = validate(&self.compiled.constraints, &state::from_json(raw.as_deref()), None);

        if !validation.passed {
            info!(key = %self.compiled.storage_key, "Persisted state incomplete or invalid, rewriting");
        }
        self.persist(&validation.values);
        validation.values
    }

    fn persist(&self, values: &State) {
        self.store_if_changed(&self.compiled.storage_key, &state::to_json(values));

        if let Some(mode) = self.compiled.mode.as_ref().filter(|mode| mode.store)
            && let Some(value) = values.get(&mode.prop)
        {
            self.store_if_changed(&mode.storage_key, value);
        }
    }

    fn store_if_changed(&self, key: &str, value: &str) {
        if self.store.get(key).as_deref() == Some(value) {
            return;
        }
        debug!(key = %key, "Writing persisted entry");
        if let Err(e) = self.store.set(key, value) {
            error!(key = %key, error = %e, "Failed to write persisted entry");
        }
    }
}

impl std::fmt::Debug for StorageOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageOwner")
            .field("storage_key", &self.compiled.storage_key)
            .field("state", &self.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, PropConfig, Selector, Strategy, compile};
    use crate::events::EventKind;
    use crate::state::single;
    use std::cell::Cell;

    fn config() -> Config {
        Config::default()
            .with_observer(Observer::Storage)
            .with_prop(
                "mode",
                PropConfig::mode(Strategy::system("system", "light"), &[Selector::Class]).persisted(None),
            )
            .with_prop("radius", PropConfig::generic(Strategy::multi(["sm", "md", "lg"], "md")))
    }

    fn owner(store: &MemoryStore, config: &Config) -> (StorageOwner, Rc<EventBus>) {
        let bus = Rc::new(EventBus::new());
        let owner = StorageOwner::new(Rc::new(store.clone()), Rc::new(compile(config).unwrap()), bus.clone());
        (owner, bus)
    }

    fn count_events(bus: &EventBus) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        bus.subscribe(EventKind::StorageChanged, Rc::new(move |_: &State| seen.set(seen.get() + 1)));
        count
    }

    #[test]
    fn test_empty_store_initializes_to_base() {
        let store = MemoryStore::new();
        let (owner, _) = owner(&store, &config());

        let state = owner.read();
        assert_eq!(state["mode"], "system");
        assert_eq!(state["radius"], "md");
        assert_eq!(store.get("theme-sync").as_deref(), Some(r#"{"mode":"system","radius":"md"}"#));
        assert_eq!(store.get("theme").as_deref(), Some("system"));
        assert_eq!(owner.read_mode().as_deref(), Some("system"));
    }

    #[test]
    fn test_malformed_store_heals() {
        let store = MemoryStore::new();
        store.set("theme-sync", r#"{"mode":"neon","radius":"lg","extra":"x"}"#).unwrap();
        let (owner, _) = owner(&store, &config());

        let state = owner.read();
        assert_eq!(state["mode"], "system");
        assert_eq!(state["radius"], "lg");
        assert_eq!(store.get("theme-sync").as_deref(), Some(r#"{"mode":"system","radius":"lg"}"#));
    }

    #[test]
    fn test_valid_store_is_not_rewritten() {
        let store = MemoryStore::new();
        let other = store.open_context();
        other.set("theme-sync", r#"{"mode":"dark","radius":"sm"}"#).unwrap();
        other.set("theme", "dark").unwrap();
        let (owner, _) = owner(&store, &config());

        assert_eq!(owner.read()["mode"], "dark");
        assert!(other.take_events().is_empty());
    }

    #[test]
    fn test_write_read_is_idempotent() {
        let store = MemoryStore::new();
        let other = store.open_context();
        let (owner, _) = owner(&store, &config());
        owner.read();
        other.take_events();

        let before = store.get("theme-sync");
        owner.write(&owner.read());
        assert_eq!(store.get("theme-sync"), before);
        assert!(other.take_events().is_empty());
    }

    #[test]
    fn test_write_merges_and_mirrors_mode_key() {
        let store = MemoryStore::new();
        let (owner, _) = owner(&store, &config());

        owner.write(&single("mode", "dark"));
        assert_eq!(owner.read()["radius"], "md");
        assert_eq!(store.get("theme").as_deref(), Some("dark"));
        assert_eq!(store.get("theme-sync").as_deref(), Some(r#"{"mode":"dark","radius":"md"}"#));
    }

    #[test]
    fn test_mode_key_not_written_without_store_flag() {
        let store = MemoryStore::new();
        let config = Config::default().with_prop("mode", PropConfig::mode(Strategy::light_dark("light"), &[]));
        let (owner, _) = owner(&store, &config);

        owner.write(&single("mode", "dark"));
        assert_eq!(store.get("theme"), None);
        assert_eq!(owner.read_mode(), None);
    }

    #[test]
    fn test_external_edit_publishes_sanitized_state() {
        let store = MemoryStore::new();
        let other = store.open_context();
        let (owner, bus) = owner(&store, &config());
        let count = count_events(&bus);
        owner.read();

        other.set("theme-sync", r#"{"mode":"dark","radius":"md"}"#).unwrap();
        let events = store.take_events();
        let published = owner.handle_event(&events[0]);

        assert_eq!(published.unwrap()["mode"], "dark");
        assert_eq!(count.get(), 1);
        assert_eq!(owner.read()["mode"], "dark");
        assert_eq!(store.get("theme").as_deref(), Some("dark"));
    }

    #[test]
    fn test_external_invalid_edit_falls_back_to_old_value() {
        let store = MemoryStore::new();
        let other = store.open_context();
        let (owner, bus) = owner(&store, &config());
        let count = count_events(&bus);
        owner.write(&single("radius", "lg"));

        let event = StorageEvent {
            key: Some("theme-sync".to_string()),
            old_value: Some(r#"{"mode":"system","radius":"lg"}"#.to_string()),
            new_value: Some(r#"{"mode":"system","radius":"huge"}"#.to_string()),
        };
        other.set("theme-sync", event.new_value.as_deref().unwrap()).unwrap();

        assert_eq!(owner.handle_event(&event), None);
        assert_eq!(count.get(), 0);
        // The invalid text is repaired in place
        assert_eq!(store.get("theme-sync").as_deref(), Some(r#"{"mode":"system","radius":"lg"}"#));
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, key: &str, _value: &str) -> Result<(), crate::error::StoreError> {
            Err(crate::error::StoreError::Io {
                path: key.into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    #[test]
    fn test_failed_writes_keep_state() {
        let owner = StorageOwner::new(
            Rc::new(ReadOnlyStore),
            Rc::new(compile(&config()).unwrap()),
            Rc::new(EventBus::new()),
        );

        assert_eq!(owner.read()["radius"], "md");
        owner.write(&single("radius", "lg"));
        assert_eq!(owner.read()["radius"], "lg");
    }

    #[test]
    fn test_stale_notification_adopts_stored_entry() {
        let store = MemoryStore::new();
        let other = store.open_context();
        let (owner, bus) = owner(&store, &config());
        let count = count_events(&bus);
        owner.read();
        other.take_events();

        other.set("theme-sync", r#"{"mode":"system","radius":"lg"}"#).unwrap();
        other.set("theme-sync", r#"{"mode":"system","radius":"sm"}"#).unwrap();
        let events = store.take_events();
        assert_eq!(events.len(), 2);

        assert_eq!(owner.handle_event(&events[0]).unwrap()["radius"], "sm");
        assert_eq!(owner.handle_event(&events[1]), None);
        assert_eq!(count.get(), 1);
        // The newer entry is never overwritten with the stale one
        assert_eq!(store.get("theme-sync").as_deref(), Some(r#"{"mode":"system","radius":"sm"}"#));
        assert!(other.take_events().is_empty());
    }

    #[test]
    fn test_unrelated_key_is_ignored() {
        let store = MemoryStore::new();
        let (owner, bus) = owner(&store, &config());
        let count = count_events(&bus);

        let event = StorageEvent {
            key: Some("something-else".to_string()),
            old_value: None,
            new_value: Some(r#"{"mode":"dark"}"#.to_string()),
        };
        assert_eq!(owner.handle_event(&event), None);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_clear_resets_to_base() {
        let store = MemoryStore::new();
        let other = store.open_context();
        let (owner, _) = owner(&store, &config());
        owner.write(&single("mode", "dark"));

        other.clear();
        let events = store.take_events();
        let published = owner.handle_event(&events[0]).unwrap();
        assert_eq!(published["mode"], "system");
        assert_eq!(store.get("theme-sync").as_deref(), Some(r#"{"mode":"system","radius":"md"}"#));
    }

    #[test]
    fn test_notifications_ignored_when_not_observed() {
        let store = MemoryStore::new();
        let config = Config::default().with_prop("radius", PropConfig::generic(Strategy::multi(["sm", "md"], "md")));
        let (owner, _) = owner(&store, &config);

        let event = StorageEvent {
            key: Some("theme-sync".to_string()),
            old_value: None,
            new_value: Some(r#"{"radius":"sm"}"#.to_string()),
        };
        assert_eq!(owner.handle_event(&event), None);
        assert_eq!(owner.read()["radius"], "md");
    }
}
