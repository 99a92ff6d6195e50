//! Event bus coupling the state owners
//!
//! Synchronous, single-threaded publish/subscribe over three event kinds.
//! Listeners are held with set semantics: subscribing the same listener
//! twice delivers once. Emission iterates a snapshot of the listeners, so a
//! listener may subscribe, unsubscribe, or emit again while being called.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::trace;

use crate::state::State;

/// Kinds of events carried by the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A validated edit observed on the presentation target
    PresentationChanged,
    /// A validated edit observed in storage from another context
    StorageChanged,
    /// The authoritative in-memory state changed
    StateChanged,
}

/// Events published on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PresentationChanged(State),
    StorageChanged(State),
    StateChanged(State),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PresentationChanged(_) => EventKind::PresentationChanged,
            Event::StorageChanged(_) => EventKind::StorageChanged,
            Event::StateChanged(_) => EventKind::StateChanged,
        }
    }

    pub fn state(&self) -> &State {
        match self {
            Event::PresentationChanged(state) | Event::StorageChanged(state) | Event::StateChanged(state) => state,
        }
    }
}

/// Callback invoked with the event payload
pub type Listener = Rc<dyn Fn(&State)>;

/// Typed publish/subscribe register
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<HashMap<EventKind, Vec<Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; returns false if it was already registered
    pub fn subscribe(&self, kind: EventKind, listener: Listener) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let entry = listeners.entry(kind).or_default();
        if entry.iter().any(|existing| Rc::ptr_eq(existing, &listener)) {
            return false;
        }
        entry.push(listener);
        true
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unsubscribe(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(entry) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|existing| !Rc::ptr_eq(existing, listener));
        entry.len() != before
    }

    /// Deliver an event to every listener of its kind; returns how many were called
    pub fn emit(&self, event: &Event) -> usize {
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        trace!(kind = ?event.kind(), listeners = snapshot.len(), "Emitting event");
        for listener in &snapshot {
            listener(event.state());
        }
        snapshot.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.borrow().get(&kind).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.borrow();
        f.debug_struct("EventBus")
            .field("listeners", &listeners.iter().map(|(kind, l)| (*kind, l.len())).collect::<HashMap<_, _>>())
            .finish()
    }
}
