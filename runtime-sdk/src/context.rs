//! Execution context.
use crate::{
    event::{EmittedEvent, Event},
    logger::get_logger,
    state::{State, TransactionResult},
    storage::Store,
};

/// Block-level environment in which operations are executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment {
    /// Identifier of the chain.
    pub chain_id: String,
    /// Current block height.
    pub height: u64,
    /// Current block timestamp (seconds since UNIX epoch).
    pub time: u64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            chain_id: "testing".to_owned(),
            height: 1,
            time: 1_600_000_000,
        }
    }
}

/// Context in which a single transaction (or query) is executed.
///
/// The context owns the nested state and the transaction gas meter. It is passed explicitly to
/// every operation that needs to read or mutate state.
pub struct Context {
    env: Environment,
    state: State,

    gas_limit: u64,
    gas_used: u64,

    logger: slog::Logger,
}

impl Context {
    /// Create a new context over the given root store.
    pub fn new(env: Environment, root: Box<dyn Store>, gas_limit: u64) -> Self {
        Self {
            env,
            state: State::new(root),
            gas_limit,
            gas_used: 0,
            logger: get_logger("context"),
        }
    }

    /// Block environment.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Mutable state.
    pub fn state(&mut self) -> &mut State {
        &mut self.state
    }

    /// Store of the current state.
    pub fn runtime_state(&mut self) -> &mut dyn Store {
        self.state.store()
    }

    /// Read-only view of the store of the current state.
    pub fn runtime_state_ref(&self) -> &dyn Store {
        self.state.store_ref()
    }

    /// Emits an event.
    pub fn emit_event<E: Event>(&mut self, event: E) {
        self.state.emit_event(event)
    }

    /// Emits a raw event.
    pub fn emit_event_raw(&mut self, event: EmittedEvent) {
        self.state.emit_event_raw(event)
    }

    /// Events emitted so far.
    pub fn events(&self) -> &[EmittedEvent] {
        self.state.events()
    }

    /// Logger associated with the context.
    pub fn logger(&self) -> &slog::Logger {
        &self.logger
    }

    /// Run a closure within a state transaction.
    ///
    /// If the closure returns `TransactionResult::Commit(R)` then the child state is committed,
    /// otherwise the child state is rolled back. Gas used inside the closure stays used either
    /// way.
    pub fn with_transaction<F, R, Rs>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self) -> Rs,
        Rs: Into<TransactionResult<R>>,
    {
        self.state.open();

        match f(self).into() {
            TransactionResult::Commit(result) => {
                self.state.commit();
                result
            }
            TransactionResult::Rollback(result) => {
                self.state.rollback();
                result
            }
        }
    }

    /// Run a closure with a fresh gas meter limited to `gas_limit`.
    ///
    /// The previous meter is restored afterwards and is not charged for anything used inside the
    /// closure. This is used for queries which are not charged to any transaction.
    pub fn with_gas_limit<F, R>(&mut self, gas_limit: u64, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let saved = (self.gas_limit, self.gas_used);
        self.gas_limit = gas_limit;
        self.gas_used = 0;

        let result = f(self);

        (self.gas_limit, self.gas_used) = saved;
        result
    }

    /// Consume the context and return its root store.
    pub fn into_store(self) -> Box<dyn Store> {
        self.state.into_store()
    }

    pub(crate) fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub(crate) fn gas_used(&self) -> u64 {
        self.gas_used
    }

    pub(crate) fn set_gas_used(&mut self, gas_used: u64) {
        self.gas_used = gas_used;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_with_transaction() {
        let mut ctx = Context::new(Default::default(), Box::new(MemoryStore::new()), 1_000);

        let result: Result<(), ()> = ctx.with_transaction(|ctx| {
            ctx.runtime_state().insert(b"key", b"value");
            Err(())
        });
        assert!(result.is_err());
        assert_eq!(ctx.runtime_state().get(b"key"), None);

        let result: Result<(), ()> = ctx.with_transaction(|ctx| {
            ctx.runtime_state().insert(b"key", b"value");
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(ctx.runtime_state().get(b"key"), Some(b"value".to_vec()));
    }
}
