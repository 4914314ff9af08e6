//! Mutable state of a runtime with nested transaction support.
use crate::{
    event::{EmittedEvent, Event},
    storage::{NestedStore, Store},
};

/// Mutable block state of a runtime.
///
/// The state includes storage and emitted events. States can be nested via `open`, `commit` and
/// `rollback` methods which behave like transactions.
pub struct State {
    store: NestedStore,
    events: Vec<EmittedEvent>,
    /// Length of the event log at the time each level was opened.
    checkpoints: Vec<usize>,
}

impl State {
    /// Create a new state on top of the given root store.
    pub fn new(root: Box<dyn Store>) -> Self {
        Self {
            store: NestedStore::new(root),
            events: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Open a child state.
    pub fn open(&mut self) {
        self.store.open();
        self.checkpoints.push(self.events.len());
    }

    /// Commit the current state and return to its parent state.
    ///
    /// # Panics
    ///
    /// This method will panic when attempting to commit the root state.
    pub fn commit(&mut self) {
        self.checkpoints
            .pop()
            .expect("cannot commit on root state");
        self.store.commit();
    }

    /// Rollback the current state and return to its parent state.
    ///
    /// # Panics
    ///
    /// This method will panic when attempting to rollback the root state.
    pub fn rollback(&mut self) {
        let mark = self
            .checkpoints
            .pop()
            .expect("cannot rollback on root state");
        self.events.truncate(mark);
        self.store.rollback();
    }

    /// Number of open child states.
    pub fn level(&self) -> usize {
        self.checkpoints.len()
    }

    /// Store associated with the current state.
    pub fn store(&mut self) -> &mut dyn Store {
        &mut self.store
    }

    /// Read-only view of the store associated with the current state.
    pub fn store_ref(&self) -> &dyn Store {
        &self.store
    }

    /// Emits an event.
    pub fn emit_event<E: Event>(&mut self, event: E) {
        self.events.push(event.into_emitted());
    }

    /// Emits a raw event.
    pub fn emit_event_raw(&mut self, event: EmittedEvent) {
        self.events.push(event);
    }

    /// Events emitted so far, including those of open child states.
    pub fn events(&self) -> &[EmittedEvent] {
        &self.events
    }

    /// Takes all events emitted so far.
    pub fn take_events(&mut self) -> Vec<EmittedEvent> {
        self.checkpoints.iter_mut().for_each(|mark| *mark = 0);
        std::mem::take(&mut self.events)
    }

    /// Return the root store.
    ///
    /// # Panics
    ///
    /// This method will panic when there are open child states.
    pub fn into_store(self) -> Box<dyn Store> {
        self.store.into_root()
    }
}

/// Result of a transaction helper closure.
pub enum TransactionResult<T> {
    Commit(T),
    Rollback(T),
}

impl From<()> for TransactionResult<()> {
    fn from(_: ()) -> TransactionResult<()> {
        TransactionResult::Commit(())
    }
}

impl<R, E> From<Result<R, E>> for TransactionResult<Result<R, E>> {
    fn from(v: Result<R, E>) -> TransactionResult<Result<R, E>> {
        match v {
            Ok(_) => TransactionResult::Commit(v),
            Err(_) => TransactionResult::Rollback(v),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{event::Attribute, storage::MemoryStore};

    fn event(kind: &str) -> EmittedEvent {
        EmittedEvent::new("test", 1, kind, vec![Attribute::new("k", "v")])
    }

    #[test]
    fn test_nested_commit_and_rollback() {
        let mut state = State::new(Box::new(MemoryStore::new()));
        state.store().insert(b"root", b"1");
        state.emit_event_raw(event("root"));

        state.open();
        state.store().insert(b"committed", b"2");
        state.emit_event_raw(event("committed"));

        state.open();
        state.store().insert(b"rolled back", b"3");
        state.emit_event_raw(event("rolled back"));
        assert_eq!(state.level(), 2);
        state.rollback();

        state.commit();
        assert_eq!(state.level(), 0);

        let kinds: Vec<_> = state.events().iter().map(|ev| ev.kind.as_str()).collect();
        assert_eq!(kinds, vec!["root", "committed"]);

        let store = state.into_store();
        assert_eq!(store.get(b"committed"), Some(b"2".to_vec()));
        assert_eq!(store.get(b"rolled back"), None);
    }

    #[test]
    #[should_panic(expected = "cannot commit on root state")]
    fn test_commit_root_panics() {
        let mut state = State::new(Box::new(MemoryStore::new()));
        state.commit();
    }
}
