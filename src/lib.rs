//! theme-sync keeps a small set of presentation properties (a color mode, a
//! density, ...) consistent across persisted storage, a presentation target
//! and the in-memory state applications read.
//!
//! A declarative [`Config`] compiles into validation constraints and mode
//! resolution. Edits may arrive from storage, from the presentation target
//! or programmatically; the [`Orchestrator`] validates and merges each one
//! and propagates it to the other representations.

#![forbid(unsafe_code)]

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod presentation;
pub mod state;
pub mod storage;
pub mod validation;

pub use config::{Appearance, Config, Observer, PropConfig, PropKind, Selector, Strategy};
pub use error::{ConfigError, StoreError, SyncError};
pub use events::{Event, EventBus, EventKind, Listener};
pub use orchestrator::{Host, Orchestrator};
pub use presentation::{Element, FixedPreference, Mutation, PreferenceOracle, PresentationOwner, PresentationTarget};
pub use state::State;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageEvent, StorageOwner};
pub use validation::{Validation, validate};
