//! Mock context for use in tests.
use crate::{
    context::{Context, Environment},
    storage::{MemoryStore, Store},
};

/// Default transaction gas limit used by mock contexts.
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000_000;

/// Mock context factory.
pub struct Mock {
    pub env: Environment,
    pub gas_limit: u64,
}

impl Mock {
    /// Sets the transaction gas limit of contexts created by this factory.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the block height of contexts created by this factory.
    pub fn with_height(mut self, height: u64) -> Self {
        self.env.height = height;
        self
    }

    /// Create a new mock context over an empty in-memory store.
    pub fn create_ctx(&self) -> Context {
        self.create_ctx_for_store(Box::new(MemoryStore::new()))
    }

    /// Create a new mock context over the given root store.
    pub fn create_ctx_for_store(&self, store: Box<dyn Store>) -> Context {
        Context::new(self.env.clone(), store, self.gas_limit)
    }
}

impl Default for Mock {
    fn default() -> Self {
        Self {
            env: Environment::default(),
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}
