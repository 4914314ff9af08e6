//! Boundary between the keeper and the contract executor.
use wasmd_runtime_sdk::{context::Context, event::Attribute, types::address::Address};

use crate::{types, Config, Error, GasCosts, Keeper};

pub mod gas;
mod host;

/// An engine able to run contract bytecode.
///
/// The executor is opaque to the keeper: it receives validated bytecode together with a host
/// through which every interaction with chain state happens. Gas used by the contract itself is
/// charged through [`Host::use_gas`].
pub trait Executor: Send + Sync {
    /// Run the contract's `instantiate` entry point.
    fn instantiate(&self, code: &[u8], host: &mut dyn Host, msg: &[u8])
        -> Result<ExecutionOk, Error>;

    /// Run the contract's `execute` entry point.
    fn execute(&self, code: &[u8], host: &mut dyn Host, msg: &[u8]) -> Result<ExecutionOk, Error>;

    /// Run the contract's `migrate` entry point.
    fn migrate(&self, code: &[u8], host: &mut dyn Host, msg: &[u8]) -> Result<ExecutionOk, Error>;

    /// Run the contract's `query` entry point. The host is read-only.
    fn query(&self, code: &[u8], host: &mut dyn Host, msg: &[u8]) -> Result<Vec<u8>, Error>;

    /// Invoke a named exported function of the contract on behalf of another contract.
    fn call_callable_point(
        &self,
        code: &[u8],
        host: &mut dyn Host,
        name: &str,
        args: &[u8],
    ) -> Result<ExecutionOk, Error>;
}

/// Host functions available to a running contract.
///
/// Every call is gas metered before it runs.
pub trait Host {
    /// Environment of the running contract.
    fn env(&self) -> &types::ContractEnv;

    /// Whether state modifications are denied.
    fn is_read_only(&self) -> bool;

    /// Attempt to use gas, failing with out of gas when the execution limit would be exceeded.
    fn use_gas(&mut self, gas: u64) -> Result<(), Error>;

    /// Gas still available to the execution.
    fn remaining_gas(&self) -> u64;

    /// Read a value from the contract's store.
    fn storage_get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Write a value into the contract's store.
    fn storage_set(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error>;

    /// Remove a value from the contract's store.
    fn storage_remove(&mut self, key: &[u8]) -> Result<(), Error>;

    /// Convert a canonical address into its human readable form.
    fn humanize_address(&mut self, canonical: &[u8]) -> Result<String, Error>;

    /// Convert a human readable address into its canonical form.
    fn canonicalize_address(&mut self, human: &str) -> Result<Vec<u8>, Error>;

    /// Deserialize a JSON document.
    fn deserialize_json(&mut self, data: &[u8]) -> Result<serde_json::Value, Error>;

    /// Invoke the exported function `name` of another contract.
    ///
    /// The callee runs with exactly `gas_limit` gas which is reserved from this execution up front
    /// and partially refunded afterwards.
    fn call_callable_point(
        &mut self,
        contract: Address,
        name: &str,
        args: &[u8],
        read_only: bool,
        gas_limit: u64,
    ) -> Result<types::CallablePointResult, Error>;

    /// Check that a contract exports the functions described by the given JSON list of
    /// [`types::FunctionSignature`].
    fn validate_interface(&mut self, contract: Address, expected: &[u8]) -> Result<(), Error>;
}

/// Successful contract execution output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionOk {
    /// Data returned to the caller.
    pub data: Vec<u8>,
    /// Attributes of the `wasm` event.
    pub attributes: Vec<Attribute>,
    /// Custom events.
    pub events: Vec<types::ContractEvent>,
    /// Messages to dispatch after the execution returns.
    pub messages: Vec<types::ContractMessage>,
}

/// Result of an execution that contains additional metadata like gas used.
#[must_use]
pub struct ExecutionResult {
    /// Actual execution result.
    pub inner: Result<ExecutionOk, Error>,
    /// Amount of gas used by the execution.
    pub gas_used: u64,
}

impl ExecutionResult {
    /// A result of an execution that failed before running anything.
    pub(crate) fn failed(err: Error) -> Self {
        Self {
            inner: Err(err),
            gas_used: 0,
        }
    }
}

/// Execution context of a single contract call.
pub(crate) struct ExecutionContext<'a, Cfg: Config> {
    keeper: &'a Keeper<Cfg>,
    ctx: &'a mut Context,

    env: types::ContractEnv,
    /// Gas limit for this contract execution.
    gas_limit: u64,
    gas_used: u64,
    /// Whether the call is read-only and must not make any storage modifications.
    read_only: bool,
    /// Contracts taking part in the current chain of callable point invocations, excluding the
    /// running contract.
    callstack: types::CallStack,
}

impl<'a, Cfg: Config> ExecutionContext<'a, Cfg> {
    /// Create a new execution context.
    pub(crate) fn new(
        keeper: &'a Keeper<Cfg>,
        ctx: &'a mut Context,
        env: types::ContractEnv,
        gas_limit: u64,
        read_only: bool,
        callstack: types::CallStack,
    ) -> Self {
        Self {
            keeper,
            ctx,
            env,
            gas_limit,
            gas_used: 0,
            read_only,
            callstack,
        }
    }

    /// Gas used so far.
    pub(crate) fn gas_used(&self) -> u64 {
        self.gas_used
    }

    fn costs(&self) -> &'a GasCosts {
        let keeper: &'a Keeper<Cfg> = self.keeper;
        &keeper.config().gas_costs
    }
}
