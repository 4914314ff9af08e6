//! WebAssembly smart contracts module.
#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

use thiserror::Error;

use wasmd_runtime_sdk::{
    self as sdk,
    context::Context,
    logger::get_logger,
    modules,
    storage::Store,
    types::address::Address,
};

pub mod abi;
pub mod access;
mod code;
pub mod genesis;
mod keeper;
mod results;
pub mod snapshot;
mod store;
pub mod types;
mod wasm;

pub use keeper::Keeper;

/// Unique module name.
const MODULE_NAME: &str = "wasm";

/// Errors emitted by the wasm module.
#[derive(Error, Debug, sdk::Error)]
pub enum Error {
    #[error("invalid argument")]
    #[sdk_error(code = 1)]
    InvalidArgument,

    #[error("unauthorized")]
    #[sdk_error(code = 2)]
    Unauthorized,

    #[error("code {0} not found")]
    #[sdk_error(code = 3)]
    CodeNotFound(u64),

    #[error("contract {0} not found")]
    #[sdk_error(code = 4)]
    ContractNotFound(Address),

    #[error("invalid code: {0}")]
    #[sdk_error(code = 5)]
    InvalidCode(String),

    #[error("code too large (size: {0} max: {1})")]
    #[sdk_error(code = 6)]
    CodeTooLarge(u64, u64),

    #[error("invalid address")]
    #[sdk_error(code = 7)]
    InvalidAddress,

    #[error("invalid permission: {0}")]
    #[sdk_error(code = 8)]
    InvalidPermission(String),

    #[error("incompatible interface: {0}")]
    #[sdk_error(code = 9)]
    IncompatibleInterface(String),

    #[error("contract {0} is inactive")]
    #[sdk_error(code = 10)]
    ContractInactive(Address),

    #[error("reentrancy or call cycle via contract {0}")]
    #[sdk_error(code = 11)]
    ReentrancyOrCycle(Address),

    #[error("state modification in read-only call")]
    #[sdk_error(code = 12)]
    ReadOnly,

    #[error("corrupt snapshot: {0}")]
    #[sdk_error(code = 13)]
    CorruptSnapshot(String),

    #[error("execution failed: {0}")]
    #[sdk_error(code = 14)]
    ExecutionFailed(#[source] anyhow::Error),

    #[error("invalid parameters: {0}")]
    #[sdk_error(code = 15)]
    InvalidParams(String),

    #[error("invalid genesis: {0}")]
    #[sdk_error(code = 16)]
    InvalidGenesis(String),

    #[error("insufficient funds")]
    #[sdk_error(code = 17)]
    InsufficientFunds,

    #[error("call depth exceeded (depth: {0} max: {1})")]
    #[sdk_error(code = 18)]
    CallDepthExceeded(u16, u16),

    #[error("reserved attribute key: {0}")]
    #[sdk_error(code = 19)]
    ReservedAttribute(String),

    #[error("sequence {0} exhausted")]
    #[sdk_error(code = 20)]
    SequenceExhausted(String),

    #[error("core: {0}")]
    #[sdk_error(transparent)]
    Core(#[from] modules::core::Error),
}

impl From<modules::accounts::Error> for Error {
    fn from(err: modules::accounts::Error) -> Self {
        match err {
            modules::accounts::Error::InsufficientBalance => Error::InsufficientFunds,
            modules::accounts::Error::InvalidArgument => Error::InvalidArgument,
            modules::accounts::Error::Core(err) => Error::Core(err),
        }
    }
}

/// Events emitted by the wasm module.
#[derive(Debug, sdk::Event)]
pub enum Event {
    #[sdk_event(code = 1)]
    StoreCode {
        #[sdk_event(key = "code_checksum")]
        checksum: types::Checksum,
        code_id: types::CodeId,
    },

    #[sdk_event(code = 2)]
    Instantiate {
        #[sdk_event(key = "_contract_address")]
        contract: Address,
        code_id: types::CodeId,
    },

    #[sdk_event(code = 3)]
    Execute {
        #[sdk_event(key = "_contract_address")]
        contract: Address,
    },

    #[sdk_event(code = 4)]
    Migrate {
        code_id: types::CodeId,
        #[sdk_event(key = "_contract_address")]
        contract: Address,
    },

    #[sdk_event(code = 5)]
    UpdateContractAdmin {
        #[sdk_event(key = "_contract_address")]
        contract: Address,
        #[sdk_event(key = "new_admin_address")]
        new_admin: Option<Address>,
    },

    #[sdk_event(code = 6)]
    PinCode { code_id: types::CodeId },

    #[sdk_event(code = 7)]
    UnpinCode { code_id: types::CodeId },

    #[sdk_event(code = 8)]
    UpdateCodeAccessConfig {
        code_id: types::CodeId,
        #[sdk_event(key = "code_permission")]
        permission: types::AccessConfig,
    },

    #[sdk_event(code = 9)]
    DeactivateContract {
        #[sdk_event(key = "_contract_address")]
        contract: Address,
    },

    #[sdk_event(code = 10, kind = "activate_contract")]
    ReactivateContract {
        #[sdk_event(key = "_contract_address")]
        contract: Address,
    },
}

/// Event code used for events emitted by contracts themselves.
pub const CONTRACT_EVENT_CODE: u32 = 100;

/// Gas costs of host operations.
///
/// Constructed once and passed into the keeper; there is no global cost schedule.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub struct GasCosts {
    /// Multiplier applied to address conversion and JSON deserialization costs.
    pub multiplier: u64,

    // Address conversion.
    pub humanize_address: u64,
    pub canonicalize_address: u64,

    // Deserialization.
    pub json_deserialization_per_byte: u64,

    // Storage operations.
    pub storage_get_base: u64,
    pub storage_insert_base: u64,
    pub storage_remove_base: u64,
    pub storage_key_byte: u64,
    pub storage_value_byte: u64,

    // Cross-contract calls.
    pub callable_point_base: u64,
    pub message_dispatch: u64,
}

impl Default for GasCosts {
    fn default() -> Self {
        GasCosts {
            multiplier: 100,

            humanize_address: 5,
            canonicalize_address: 4,

            json_deserialization_per_byte: 1,

            storage_get_base: 20,
            storage_insert_base: 20,
            storage_remove_base: 20,
            storage_key_byte: 1,
            storage_value_byte: 1,

            callable_point_base: 100,
            message_dispatch: 100,
        }
    }
}

/// Node-local configuration of the wasm module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WasmConfig {
    /// Maximum size of uploaded bytecode in bytes.
    pub max_code_size: u64,
    /// Maximum depth of nested contract calls (dispatched messages and callable points).
    pub max_call_depth: u16,
    /// Number of unpinned code entries kept in the in-memory cache.
    pub code_cache_size: usize,
    /// Soft upper bound on the size of a snapshot chunk in bytes.
    pub snapshot_chunk_size: usize,
    /// Gas limit for smart queries.
    pub query_gas_limit: u64,
    /// Gas costs of host operations.
    pub gas_costs: GasCosts,
}

impl Default for WasmConfig {
    fn default() -> Self {
        WasmConfig {
            max_code_size: 800 * 1024, // 800 KiB
            max_call_depth: 8,
            code_cache_size: 64,
            snapshot_chunk_size: 1024 * 1024, // 1 MiB
            query_gas_limit: 3_000_000,
            gas_costs: Default::default(),
        }
    }
}

/// Parameters for the wasm module.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub struct Parameters {
    /// Who is allowed to upload code.
    pub code_upload_access: types::AccessConfig,
    /// Instantiate permission granted to code stored without an explicit permission.
    pub instantiate_default_permission: types::AccessType,
    /// Multiplier applied to instance and compile costs.
    pub gas_multiplier: u64,
    /// Cost of instantiating a contract (before the multiplier).
    pub instance_cost: u64,
    /// Cost per byte of storing code (before the multiplier).
    pub compile_cost: u64,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            code_upload_access: types::AccessConfig::Everybody,
            instantiate_default_permission: types::AccessType::Everybody,
            gas_multiplier: 100,
            instance_cost: 60,
            compile_cost: 3,
        }
    }
}

impl Parameters {
    /// Perform basic parameter validation.
    pub fn validate_basic(&self) -> Result<(), Error> {
        self.code_upload_access
            .validate()
            .map_err(|err| Error::InvalidParams(format!("code upload access: {}", err)))?;
        if self.instantiate_default_permission == types::AccessType::Unspecified {
            return Err(Error::InvalidParams(
                "unspecified instantiate default permission".to_string(),
            ));
        }
        if self.gas_multiplier == 0 {
            return Err(Error::InvalidParams("gas multiplier must be non-zero".to_string()));
        }
        if self.instance_cost == 0 {
            return Err(Error::InvalidParams("instance cost must be non-zero".to_string()));
        }
        if self.compile_cost == 0 {
            return Err(Error::InvalidParams("compile cost must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Gas charged for instantiating a contract.
    pub fn instance_gas(&self) -> u64 {
        self.instance_cost.saturating_mul(self.gas_multiplier)
    }

    /// Gas charged for storing code of the given size.
    pub fn compile_gas(&self, code_len: usize) -> u64 {
        self.compile_cost
            .saturating_mul(self.gas_multiplier)
            .saturating_mul(code_len as u64)
    }
}

/// State schema constants.
pub mod state {
    /// Sequence counters (next value to issue, u64) keyed by sequence name.
    pub const SEQUENCES: &[u8] = &[0x01];
    /// Information about uploaded code.
    pub const CODE_INFO: &[u8] = &[0x02];
    /// Uploaded code, compressed and keyed by checksum.
    pub const CODE: &[u8] = &[0x03];
    /// Information about deployed contracts.
    pub const CONTRACT_INFO: &[u8] = &[0x04];
    /// Per-contract key/value store.
    pub const CONTRACT_STATE: &[u8] = &[0x05];
    /// Index of contracts by code identifier.
    pub const CONTRACTS_BY_CODE: &[u8] = &[0x06];
    /// Set of inactive contracts.
    pub const INACTIVE_CONTRACTS: &[u8] = &[0x07];
    /// Module parameters.
    pub const PARAMS: &[u8] = &[0x08];

    /// Sequence of code identifiers.
    pub const SEQUENCE_CODE_ID: &[u8] = b"lastCodeId";
    /// Sequence of contract instances.
    pub const SEQUENCE_INSTANCE_ID: &[u8] = b"lastContractId";
}

/// Module configuration.
pub trait Config: 'static {
    /// Module that is used for moving funds along with contract calls.
    type Accounts: modules::accounts::API;
}

/// The wasm module.
///
/// Wraps a generic [`Keeper`] and implements parameter storage, genesis handling and contract
/// deactivation on top of it. All other operations are forwarded to the keeper unchanged.
pub struct Module<Cfg: Config> {
    keeper: Keeper<Cfg>,
    logger: slog::Logger,
}

impl<Cfg: Config> Module<Cfg> {
    /// Create a new module around the given keeper.
    pub fn new(keeper: Keeper<Cfg>) -> Self {
        Self {
            keeper,
            logger: get_logger("modules/wasm"),
        }
    }

    /// The wrapped keeper.
    pub fn keeper(&self) -> &Keeper<Cfg> {
        &self.keeper
    }

    /// Upload new code.
    pub fn store_code(
        &self,
        ctx: &mut Context,
        creator: Address,
        request: types::StoreCode,
    ) -> Result<types::StoreCodeResult, Error> {
        self.keeper.store_code(ctx, creator, request)
    }

    /// Instantiate a new contract from stored code.
    pub fn instantiate(
        &self,
        ctx: &mut Context,
        creator: Address,
        request: types::Instantiate,
    ) -> Result<types::InstantiateResult, Error> {
        self.keeper.instantiate(ctx, creator, request)
    }

    /// Upload code and instantiate a contract from it in a single step.
    pub fn store_code_and_instantiate(
        &self,
        ctx: &mut Context,
        creator: Address,
        request: types::StoreCodeAndInstantiate,
    ) -> Result<types::StoreCodeAndInstantiateResult, Error> {
        self.keeper.store_code_and_instantiate(ctx, creator, request)
    }

    /// Execute a contract.
    pub fn execute(
        &self,
        ctx: &mut Context,
        sender: Address,
        request: types::Execute,
    ) -> Result<Vec<u8>, Error> {
        self.keeper.execute(ctx, sender, request)
    }

    /// Migrate a contract to different code.
    pub fn migrate(
        &self,
        ctx: &mut Context,
        sender: Address,
        request: types::Migrate,
    ) -> Result<Vec<u8>, Error> {
        self.keeper.migrate(ctx, sender, request)
    }

    /// Set a new contract admin.
    pub fn update_admin(
        &self,
        ctx: &mut Context,
        sender: Address,
        contract: Address,
        new_admin: Address,
    ) -> Result<(), Error> {
        self.keeper.update_admin(ctx, sender, contract, new_admin)
    }

    /// Remove the contract admin.
    pub fn clear_admin(
        &self,
        ctx: &mut Context,
        sender: Address,
        contract: Address,
    ) -> Result<(), Error> {
        self.keeper.clear_admin(ctx, sender, contract)
    }

    /// Change who may instantiate the given code.
    pub fn update_instantiate_config(
        &self,
        ctx: &mut Context,
        sender: Address,
        code_id: types::CodeId,
        permission: types::AccessConfig,
    ) -> Result<(), Error> {
        self.keeper
            .update_instantiate_config(ctx, sender, code_id, permission)
    }

    pub fn pin_code(&self, ctx: &mut Context, code_id: types::CodeId) -> Result<(), Error> {
        self.keeper.pin_code(ctx, code_id)
    }

    pub fn unpin_code(&self, ctx: &mut Context, code_id: types::CodeId) -> Result<(), Error> {
        self.keeper.unpin_code(ctx, code_id)
    }

    /// Query a contract.
    pub fn query_smart(
        &self,
        ctx: &mut Context,
        contract: Address,
        msg: &[u8],
    ) -> Result<Vec<u8>, Error> {
        self.keeper.query_smart(ctx, contract, msg)
    }

    pub fn query_raw<S: Store>(state: S, contract: Address, key: &[u8]) -> Option<Vec<u8>> {
        Keeper::<Cfg>::query_raw(state, contract, key)
    }

    pub fn contract_info<S: Store>(state: S, contract: Address) -> Result<types::ContractInfo, Error> {
        Keeper::<Cfg>::contract_info(state, contract)
    }

    pub fn code_info<S: Store>(state: S, code_id: types::CodeId) -> Result<types::CodeInfo, Error> {
        Keeper::<Cfg>::code_info(state, code_id)
    }

    pub fn byte_code<S: Store>(&self, state: S, code_id: types::CodeId) -> Result<Vec<u8>, Error> {
        self.keeper.byte_code(state, code_id)
    }

    pub fn contracts_by_code<S: Store>(state: S, code_id: types::CodeId) -> Vec<Address> {
        Keeper::<Cfg>::contracts_by_code(state, code_id)
    }

    pub fn pinned_codes<S: Store>(state: S) -> Vec<types::CodeId> {
        Keeper::<Cfg>::pinned_codes(state)
    }

    pub fn iterate_codes<S, F>(state: S, start_after: Option<types::CodeId>, f: F)
    where
        S: Store,
        F: FnMut(types::CodeId, types::CodeInfo) -> bool,
    {
        Keeper::<Cfg>::iterate_codes(state, start_after, f)
    }

    pub fn iterate_contracts<S, F>(state: S, start_after: Option<Address>, f: F)
    where
        S: Store,
        F: FnMut(Address, types::ContractInfo) -> bool,
    {
        Keeper::<Cfg>::iterate_contracts(state, start_after, f)
    }

    /// Serialize all stored code and contracts into a chunked snapshot.
    pub fn create_snapshot<S: Store>(
        &self,
        state: S,
        height: u64,
    ) -> Result<snapshot::Snapshot, Error> {
        self.keeper.create_snapshot(state, height)
    }

    /// Start restoring a snapshot.
    pub fn restore_begin(height: u64, format: u32) -> Result<snapshot::Restorer, Error> {
        snapshot::Restorer::begin(height, format)
    }

    /// Apply a completed snapshot restore.
    pub fn restore_finish<S: Store>(
        &self,
        restorer: snapshot::Restorer,
        state: S,
    ) -> Result<(), Error> {
        self.keeper.finish_restore(restorer, state)
    }

    /// Current module parameters.
    pub fn params<S: Store>(state: S) -> Parameters {
        store::load_params(state)
    }

    /// Validate and store new module parameters.
    pub fn set_params(ctx: &mut Context, params: Parameters) -> Result<(), Error> {
        params.validate_basic()?;
        store::store_params(ctx.runtime_state(), params);
        Ok(())
    }

    /// Mark a contract as inactive. Inactive contracts reject execution and smart queries.
    pub fn deactivate_contract(&self, ctx: &mut Context, contract: Address) -> Result<(), Error> {
        ctx.with_transaction(|ctx| {
            store::load_contract_info(ctx.runtime_state(), &contract)?;
            if store::is_inactive(ctx.runtime_state(), &contract) {
                return Err(Error::ContractInactive(contract));
            }
            store::set_inactive(ctx.runtime_state(), &contract, true);

            ctx.emit_event(Event::DeactivateContract { contract });
            slog::info!(self.logger, "contract deactivated"; "contract" => contract);
            Ok(())
        })
    }

    /// Mark a previously deactivated contract as active again.
    pub fn reactivate_contract(&self, ctx: &mut Context, contract: Address) -> Result<(), Error> {
        ctx.with_transaction(|ctx| {
            store::load_contract_info(ctx.runtime_state(), &contract)?;
            if !store::is_inactive(ctx.runtime_state(), &contract) {
                return Err(Error::InvalidArgument);
            }
            store::set_inactive(ctx.runtime_state(), &contract, false);

            ctx.emit_event(Event::ReactivateContract { contract });
            slog::info!(self.logger, "contract reactivated"; "contract" => contract);
            Ok(())
        })
    }

    /// Whether the given contract is inactive.
    pub fn is_inactive_contract<S: Store>(state: S, contract: &Address) -> bool {
        store::is_inactive(state, contract)
    }

    /// Visit inactive contracts in ascending address order, starting after `start_after`.
    ///
    /// The visitor returns `true` to stop the iteration.
    pub fn iterate_inactive_contracts<S, F>(state: S, start_after: Option<Address>, f: F)
    where
        S: Store,
        F: FnMut(Address) -> bool,
    {
        store::iterate_inactive(state, start_after, f)
    }
}
