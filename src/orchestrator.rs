//! Orchestrator: the authoritative in-memory state
//!
//! Initializes from the storage owner, pushes the result to the presentation
//! owner, and folds every observed change from either side back in through
//! a single merge step. Only a merge that changes the state writes through
//! to both owners and emits `StateChanged`.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};

use crate::config::{Appearance, Compiled, Config, compile};
use crate::error::ConfigError;
use crate::events::{Event, EventBus, EventKind, Listener};
use crate::presentation::{Mutation, PreferenceOracle, PresentationOwner, PresentationTarget};
use crate::state::{self, State};
use crate::storage::{KeyValueStore, StorageEvent, StorageOwner};
use crate::validation::validate;

/// Host-supplied collaborators
pub struct Host {
    pub store: Rc<dyn KeyValueStore>,
    pub target: Rc<dyn PresentationTarget>,
    pub oracle: Rc<dyn PreferenceOracle>,
}

struct Core {
    compiled: Rc<Compiled>,
    bus: Rc<EventBus>,
    storage: StorageOwner,
    presentation: PresentationOwner,
    state: RefCell<State>,
}

impl Core {
    fn merge(&self, incoming: &State) -> bool {
        let merged = {
            let current = self.state.borrow();
            let validation = validate(&self.compiled.constraints, incoming, Some(&*current));
            let merged = state::merge(&current, &validation.values);
            if merged == *current {
                debug!(incoming = ?incoming, "Merge produced no change");
                return false;
            }
            merged
        };

        info!(state = ?merged, "State changed");
        *self.state.borrow_mut() = merged.clone();
        self.storage.write(&merged);
        self.presentation.write(&merged);
        self.bus.emit(&Event::StateChanged(merged));
        true
    }
}

/// Handle to the synchronized state; clones share the same instance
#[derive(Clone)]
pub struct Orchestrator {
    core: Rc<Core>,
}

impl Orchestrator {
    /// Compile the configuration, load storage and apply it to the target
    pub fn new(config: &Config, host: Host) -> Result<Self, ConfigError> {
        let compiled = Rc::new(compile(config)?);
        let bus = Rc::new(EventBus::new());
        let storage = StorageOwner::new(host.store, compiled.clone(), bus.clone());
        let presentation = PresentationOwner::new(host.target, host.oracle, compiled.clone(), bus.clone());

        let initial = storage.read();
        presentation.write(&initial);
        info!(state = ?initial, "Initialized state");

        let core = Rc::new(Core {
            compiled,
            bus: bus.clone(),
            storage,
            presentation,
            state: RefCell::new(initial),
        });

        for kind in [EventKind::PresentationChanged, EventKind::StorageChanged] {
            let weak = Rc::downgrade(&core);
            bus.subscribe(
                kind,
                Rc::new(move |incoming: &State| {
                    if let Some(core) = weak.upgrade() {
                        core.merge(incoming);
                    }
                }),
            );
        }

        Ok(Self { core })
    }

    /// Current state snapshot
    pub fn state(&self) -> State {
        self.core.state.borrow().clone()
    }

    /// Set one property through the same merge path as external edits
    ///
    /// Returns true if the state changed.
    pub fn update(&self, prop: &str, value: &str) -> bool {
        self.core.merge(&state::single(prop, value))
    }

    /// Register for `StateChanged`; false if already registered
    pub fn subscribe(&self, listener: Listener) -> bool {
        self.core.bus.subscribe(EventKind::StateChanged, listener)
    }

    pub fn unsubscribe(&self, listener: &Listener) -> bool {
        self.core.bus.unsubscribe(EventKind::StateChanged, listener)
    }

    pub fn resolved_appearance(&self) -> Option<Appearance> {
        self.core.presentation.resolved_appearance()
    }

    /// Deliver a cross-context storage notification; true if it was published
    pub fn handle_storage_event(&self, event: &StorageEvent) -> bool {
        self.core.storage.handle_event(event).is_some()
    }

    /// Deliver observed target mutations; returns how many properties were adopted
    pub fn handle_mutations(&self, records: &[Mutation]) -> usize {
        self.core
            .presentation
            .handle_mutations(records)
            .map_or(0, |adopted| adopted.len())
    }

    /// The live preference changed; true if the mirrors moved
    pub fn handle_preference_change(&self) -> bool {
        self.core.presentation.refresh_preference()
    }

    pub fn storage(&self) -> &StorageOwner {
        &self.core.storage
    }

    pub fn presentation(&self) -> &PresentationOwner {
        &self.core.presentation
    }

    pub fn compiled(&self) -> &Compiled {
        &self.core.compiled
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.core.state.borrow())
            .field("storage", &self.core.storage)
            .field("presentation", &self.core.presentation)
            .finish()
    }
}
