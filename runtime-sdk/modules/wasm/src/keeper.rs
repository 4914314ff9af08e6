//! Code storage and contract lifecycle.
use std::{marker::PhantomData, sync::Arc};

use wasmd_runtime_sdk::{
    context::Context,
    logger::get_logger,
    modules::{
        accounts::API as _,
        core::{self, API as _},
    },
    storage::Store,
    types::{address::Address, token},
    TransactionResult,
};

use crate::{
    abi::{ExecutionContext, ExecutionOk, ExecutionResult, Executor, Host},
    code::{self, CodeCache},
    results, state, store, types, wasm, Config, Error, Event, WasmConfig,
};

/// The generic keeper.
///
/// Owns the node-local configuration, the contract executor and the code cache. All state lives
/// in the store of the context passed to each operation.
pub struct Keeper<Cfg: Config> {
    config: WasmConfig,
    executor: Box<dyn Executor>,
    cache: CodeCache,
    logger: slog::Logger,

    _cfg: PhantomData<Cfg>,
}

impl<Cfg: Config> Keeper<Cfg> {
    /// Create a new keeper.
    pub fn new(config: WasmConfig, executor: Box<dyn Executor>) -> Self {
        Self {
            cache: CodeCache::new(config.code_cache_size),
            config,
            executor,
            logger: get_logger("modules/wasm"),
            _cfg: PhantomData,
        }
    }

    /// Node-local configuration.
    pub fn config(&self) -> &WasmConfig {
        &self.config
    }

    pub(crate) fn logger(&self) -> &slog::Logger {
        &self.logger
    }

    /// Uncompressed code with the given checksum.
    pub(crate) fn load_code<S: Store>(
        &self,
        state: S,
        checksum: &types::Checksum,
    ) -> Result<Vec<u8>, Error> {
        Ok(self.cache.load(state, checksum)?.as_ref().clone())
    }

    /// Upload new code.
    pub fn store_code(
        &self,
        ctx: &mut Context,
        creator: Address,
        request: types::StoreCode,
    ) -> Result<types::StoreCodeResult, Error> {
        ctx.with_transaction(|ctx| {
            self.store_code_inner(ctx, creator, &request.code, request.instantiate_permission)
        })
    }

    fn store_code_inner(
        &self,
        ctx: &mut Context,
        creator: Address,
        code: &[u8],
        instantiate_permission: Option<types::AccessConfig>,
    ) -> Result<types::StoreCodeResult, Error> {
        let params = store::load_params(ctx.runtime_state());
        if !params.code_upload_access.allowed(&creator) {
            return Err(Error::Unauthorized);
        }

        wasm::validate(code, self.config.max_code_size)?;
        let instantiate_permission = match instantiate_permission {
            Some(permission) => {
                permission.validate()?;
                permission
            }
            None => params.instantiate_default_permission.with_actor(creator)?,
        };

        core::Module::use_tx_gas(ctx, params.compile_gas(code.len()))?;

        let checksum = types::Checksum::digest(code);
        let code_id: types::CodeId =
            store::next_sequence(ctx.runtime_state(), state::SEQUENCE_CODE_ID)?.into();
        code::store_code(ctx.runtime_state(), &checksum, code)?;
        store::store_code_info(
            ctx.runtime_state(),
            code_id,
            types::CodeInfo {
                checksum,
                creator,
                instantiate_permission,
                pinned: false,
            },
        );

        ctx.emit_event(Event::StoreCode { checksum, code_id });
        slog::debug!(self.logger, "stored code";
            "code_id" => code_id.as_u64(),
            "checksum" => %checksum,
            "creator" => creator,
        );

        Ok(types::StoreCodeResult { code_id, checksum })
    }

    /// Instantiate a new contract from stored code.
    pub fn instantiate(
        &self,
        ctx: &mut Context,
        creator: Address,
        request: types::Instantiate,
    ) -> Result<types::InstantiateResult, Error> {
        ctx.with_transaction(|ctx| self.instantiate_inner(ctx, creator, request))
    }

    fn instantiate_inner(
        &self,
        ctx: &mut Context,
        creator: Address,
        request: types::Instantiate,
    ) -> Result<types::InstantiateResult, Error> {
        let code_info = store::load_code_info(ctx.runtime_state(), request.code_id)?;
        if !code_info.instantiate_permission.allowed(&creator) {
            return Err(Error::Unauthorized);
        }
        if request.label.is_empty() || request.label.len() > types::MAX_LABEL_SIZE {
            return Err(Error::InvalidArgument);
        }
        if request.admin == Some(Address::default()) {
            return Err(Error::InvalidAddress);
        }

        let params = store::load_params(ctx.runtime_state());
        core::Module::use_tx_gas(ctx, params.instance_gas())?;

        // Derive the address from the creator and a fresh instance sequence value.
        let instance_id =
            store::next_sequence(ctx.runtime_state(), state::SEQUENCE_INSTANCE_ID)?;
        let contract = types::ContractInfo::address_for(&creator, instance_id);
        if store::load_contract_info(ctx.runtime_state(), &contract).is_ok() {
            return Err(Error::InvalidArgument);
        }

        let info = types::ContractInfo {
            code_id: request.code_id,
            creator,
            admin: request.admin,
            label: request.label,
            created: types::CreatedAt {
                height: ctx.env().height,
                chain_id: ctx.env().chain_id.clone(),
            },
            instance_id,
        };
        store::store_contract_info(ctx.runtime_state(), &contract, info);
        store::index_contract_by_code(ctx.runtime_state(), request.code_id, &contract);

        let code = self.cache.load(ctx.runtime_state(), &code_info.checksum)?;
        self.transfer_funds(ctx, creator, contract, &request.funds)?;

        let env = contract_env(ctx, contract, creator, &request.funds);
        let result = self.run(
            ctx,
            env,
            false,
            types::CallStack::default(),
            |executor, host| executor.instantiate(&code, host, &request.msg),
        );
        let output = results::process_execution_result(ctx, result)?;

        ctx.emit_event(Event::Instantiate {
            contract,
            code_id: request.code_id,
        });
        let data = self.process_output(ctx, contract, output, 0)?;

        slog::debug!(self.logger, "instantiated contract";
            "contract" => contract,
            "code_id" => request.code_id.as_u64(),
            "creator" => creator,
        );

        Ok(types::InstantiateResult {
            address: contract,
            data,
        })
    }

    /// Upload code and instantiate a contract from it in a single step.
    pub fn store_code_and_instantiate(
        &self,
        ctx: &mut Context,
        creator: Address,
        request: types::StoreCodeAndInstantiate,
    ) -> Result<types::StoreCodeAndInstantiateResult, Error> {
        ctx.with_transaction(|ctx| {
            let stored = self.store_code_inner(
                ctx,
                creator,
                &request.code,
                request.instantiate_permission,
            )?;
            let instantiated = self.instantiate_inner(
                ctx,
                creator,
                types::Instantiate {
                    code_id: stored.code_id,
                    admin: request.admin,
                    label: request.label,
                    msg: request.msg,
                    funds: request.funds,
                },
            )?;

            Ok(types::StoreCodeAndInstantiateResult {
                code_id: stored.code_id,
                address: instantiated.address,
                data: instantiated.data,
            })
        })
    }

    /// Execute a contract.
    pub fn execute(
        &self,
        ctx: &mut Context,
        sender: Address,
        request: types::Execute,
    ) -> Result<Vec<u8>, Error> {
        ctx.with_transaction(|ctx| {
            self.execute_at_depth(
                ctx,
                sender,
                request.contract,
                &request.msg,
                &request.funds,
                0,
            )
        })
    }

    /// Execute a contract as part of a chain of dispatched messages.
    pub(crate) fn execute_at_depth(
        &self,
        ctx: &mut Context,
        sender: Address,
        contract: Address,
        msg: &[u8],
        funds: &[token::BaseUnits],
        depth: u16,
    ) -> Result<Vec<u8>, Error> {
        let (_, code) = self.load_active_contract(ctx.runtime_state(), contract)?;
        self.transfer_funds(ctx, sender, contract, funds)?;

        let env = contract_env(ctx, contract, sender, funds);
        let result = self.run(
            ctx,
            env,
            false,
            types::CallStack::default(),
            |executor, host| executor.execute(&code, host, msg),
        );
        let output = results::process_execution_result(ctx, result)?;

        ctx.emit_event(Event::Execute { contract });
        self.process_output(ctx, contract, output, depth)
    }

    /// Migrate a contract to different code.
    pub fn migrate(
        &self,
        ctx: &mut Context,
        sender: Address,
        request: types::Migrate,
    ) -> Result<Vec<u8>, Error> {
        ctx.with_transaction(|ctx| {
            let contract = request.contract;
            let mut info = store::load_contract_info(ctx.runtime_state(), &contract)?;
            if info.admin != Some(sender) {
                return Err(Error::Unauthorized);
            }

            let code_info = store::load_code_info(ctx.runtime_state(), request.code_id)?;
            if !code_info.instantiate_permission.allowed(&sender) {
                return Err(Error::Unauthorized);
            }
            let code = self.cache.load(ctx.runtime_state(), &code_info.checksum)?;

            let env = contract_env(ctx, contract, sender, &[]);
            let result = self.run(
                ctx,
                env,
                false,
                types::CallStack::default(),
                |executor, host| executor.migrate(&code, host, &request.msg),
            );
            let output = results::process_execution_result(ctx, result)?;

            // Only switch code after the new code accepted the migration.
            let old_code_id = info.code_id;
            info.code_id = request.code_id;
            store::unindex_contract_by_code(ctx.runtime_state(), old_code_id, &contract);
            store::index_contract_by_code(ctx.runtime_state(), request.code_id, &contract);
            store::store_contract_info(ctx.runtime_state(), &contract, info);

            ctx.emit_event(Event::Migrate {
                code_id: request.code_id,
                contract,
            });
            let data = self.process_output(ctx, contract, output, 0)?;

            slog::debug!(self.logger, "migrated contract";
                "contract" => contract,
                "from_code_id" => old_code_id.as_u64(),
                "to_code_id" => request.code_id.as_u64(),
            );

            Ok(data)
        })
    }

    /// Set a new contract admin.
    pub fn update_admin(
        &self,
        ctx: &mut Context,
        sender: Address,
        contract: Address,
        new_admin: Address,
    ) -> Result<(), Error> {
        if new_admin == Address::default() {
            return Err(Error::InvalidAddress);
        }
        self.set_admin(ctx, sender, contract, Some(new_admin))
    }

    /// Remove the contract admin. This is irreversible.
    pub fn clear_admin(
        &self,
        ctx: &mut Context,
        sender: Address,
        contract: Address,
    ) -> Result<(), Error> {
        self.set_admin(ctx, sender, contract, None)
    }

    fn set_admin(
        &self,
        ctx: &mut Context,
        sender: Address,
        contract: Address,
        new_admin: Option<Address>,
    ) -> Result<(), Error> {
        ctx.with_transaction(|ctx| {
            let mut info = store::load_contract_info(ctx.runtime_state(), &contract)?;
            if info.admin != Some(sender) {
                return Err(Error::Unauthorized);
            }
            info.admin = new_admin;
            store::store_contract_info(ctx.runtime_state(), &contract, info);

            ctx.emit_event(Event::UpdateContractAdmin {
                contract,
                new_admin,
            });
            slog::debug!(self.logger, "updated contract admin";
                "contract" => contract,
                "admin" => ?new_admin,
            );
            Ok(())
        })
    }

    /// Change who may instantiate the given code. Only the code creator may do this.
    pub fn update_instantiate_config(
        &self,
        ctx: &mut Context,
        sender: Address,
        code_id: types::CodeId,
        permission: types::AccessConfig,
    ) -> Result<(), Error> {
        ctx.with_transaction(|ctx| {
            let mut info = store::load_code_info(ctx.runtime_state(), code_id)?;
            if info.creator != sender {
                return Err(Error::Unauthorized);
            }
            permission.validate()?;

            info.instantiate_permission = permission.clone();
            store::store_code_info(ctx.runtime_state(), code_id, info);

            ctx.emit_event(Event::UpdateCodeAccessConfig {
                code_id,
                permission,
            });
            Ok(())
        })
    }

    /// Keep the given code warm in the cache.
    pub fn pin_code(&self, ctx: &mut Context, code_id: types::CodeId) -> Result<(), Error> {
        self.set_pinned(ctx, code_id, true)
    }

    /// Allow the given code to be evicted from the cache.
    pub fn unpin_code(&self, ctx: &mut Context, code_id: types::CodeId) -> Result<(), Error> {
        self.set_pinned(ctx, code_id, false)
    }

    fn set_pinned(
        &self,
        ctx: &mut Context,
        code_id: types::CodeId,
        pinned: bool,
    ) -> Result<(), Error> {
        ctx.with_transaction(|ctx| {
            let mut info = store::load_code_info(ctx.runtime_state(), code_id)?;
            let checksum = info.checksum;
            if pinned {
                let code = self.cache.load(ctx.runtime_state(), &checksum)?;
                self.cache.pin(checksum, code);
            } else {
                self.cache.unpin(&checksum);
            }

            info.pinned = pinned;
            store::store_code_info(ctx.runtime_state(), code_id, info);

            if pinned {
                ctx.emit_event(Event::PinCode { code_id });
            } else {
                ctx.emit_event(Event::UnpinCode { code_id });
            }
            slog::debug!(self.logger, "updated code pinning";
                "code_id" => code_id.as_u64(),
                "pinned" => pinned,
            );
            Ok(())
        })
    }

    /// Load every code marked as pinned in state into the cache.
    pub fn initialize_pinned_codes<S: Store>(&self, mut state: S) -> Result<(), Error> {
        for code_id in Self::pinned_codes(&mut state) {
            let info = store::load_code_info(&mut state, code_id)?;
            let code = self.cache.load(&mut state, &info.checksum)?;
            self.cache.pin(info.checksum, code);
        }
        Ok(())
    }

    /// Query a contract. Queries are read-only, limited by the query gas limit and never charged
    /// to the transaction.
    pub fn query_smart(
        &self,
        ctx: &mut Context,
        contract: Address,
        msg: &[u8],
    ) -> Result<Vec<u8>, Error> {
        ctx.with_gas_limit(self.config.query_gas_limit, |ctx| {
            ctx.with_transaction(|ctx| {
                let result = self.query_inner(ctx, contract, msg);
                TransactionResult::Rollback(result)
            })
        })
    }

    fn query_inner(
        &self,
        ctx: &mut Context,
        contract: Address,
        msg: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let (_, code) = self.load_active_contract(ctx.runtime_state(), contract)?;

        let env = contract_env(ctx, contract, Address::default(), &[]);
        let result = self.run(
            ctx,
            env,
            true,
            types::CallStack::default(),
            |executor, host| {
                executor.query(&code, host, msg).map(|data| ExecutionOk {
                    data,
                    ..Default::default()
                })
            },
        );
        let output = results::process_execution_result(ctx, result)?;

        Ok(output.data)
    }

    /// Read a raw value from a contract's store.
    pub fn query_raw<S: Store>(state: S, contract: Address, key: &[u8]) -> Option<Vec<u8>> {
        store::contract_store(state, contract).get(key)
    }

    /// Information about a contract.
    pub fn contract_info<S: Store>(state: S, contract: Address) -> Result<types::ContractInfo, Error> {
        store::load_contract_info(state, &contract)
    }

    /// Information about stored code.
    pub fn code_info<S: Store>(state: S, code_id: types::CodeId) -> Result<types::CodeInfo, Error> {
        store::load_code_info(state, code_id)
    }

    /// Raw bytecode of stored code.
    pub fn byte_code<S: Store>(&self, mut state: S, code_id: types::CodeId) -> Result<Vec<u8>, Error> {
        let info = store::load_code_info(&mut state, code_id)?;
        self.load_code(state, &info.checksum)
    }

    /// Addresses of contracts using the given code.
    pub fn contracts_by_code<S: Store>(state: S, code_id: types::CodeId) -> Vec<Address> {
        store::contracts_by_code(state, code_id)
    }

    /// Identifiers of all pinned codes in ascending order.
    pub fn pinned_codes<S: Store>(state: S) -> Vec<types::CodeId> {
        let mut pinned = Vec::new();
        store::iterate_code_infos(state, None, |code_id, info| {
            if info.pinned {
                pinned.push(code_id);
            }
            false
        });
        pinned
    }

    /// Visit stored code in ascending code identifier order, starting after `start_after`.
    ///
    /// The visitor returns `true` to stop the iteration.
    pub fn iterate_codes<S, F>(state: S, start_after: Option<types::CodeId>, f: F)
    where
        S: Store,
        F: FnMut(types::CodeId, types::CodeInfo) -> bool,
    {
        store::iterate_code_infos(state, start_after, f)
    }

    /// Visit contracts in ascending address order, starting after `start_after`.
    ///
    /// The visitor returns `true` to stop the iteration.
    pub fn iterate_contracts<S, F>(state: S, start_after: Option<Address>, f: F)
    where
        S: Store,
        F: FnMut(Address, types::ContractInfo) -> bool,
    {
        store::iterate_contract_infos(state, start_after, f)
    }

    /// Rejects a callable point call that would re-enter a contract already on the
    /// callstack or exceed the configured call depth.
    pub(crate) fn check_callstack(
        &self,
        callstack: &types::CallStack,
        contract: Address,
    ) -> Result<(), Error> {
        if callstack.contains(&contract) {
            return Err(Error::ReentrancyOrCycle(contract));
        }
        let max_depth = self.config.max_call_depth;
        if callstack.depth() > max_depth as usize {
            let depth = u16::try_from(callstack.depth()).unwrap_or(u16::MAX);
            return Err(Error::CallDepthExceeded(depth, max_depth));
        }
        Ok(())
    }

    /// Invoke a callable point of `contract` on behalf of the contract described by `caller`.
    ///
    /// The callee runs in its own transaction which is rolled back on failure.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn call_callable_point(
        &self,
        ctx: &mut Context,
        caller: &types::ContractEnv,
        callstack: types::CallStack,
        contract: Address,
        name: &str,
        args: &[u8],
        read_only: bool,
        gas_limit: u64,
    ) -> ExecutionResult {
        if let Err(err) = self.check_callstack(&callstack, contract) {
            return ExecutionResult::failed(err);
        }

        ctx.with_transaction(|ctx| {
            let code = match self.load_active_contract(ctx.runtime_state(), contract) {
                Ok((_, code)) => code,
                Err(err) => return TransactionResult::Rollback(ExecutionResult::failed(err)),
            };

            let env = types::ContractEnv {
                contract,
                sender: caller.contract,
                funds: vec![],
                ..caller.clone()
            };
            let mut result = self.run_with_limit(
                ctx,
                env,
                read_only,
                callstack.clone(),
                gas_limit,
                |executor, host| executor.call_callable_point(&code, host, name, args),
            );
            result.inner = result.inner.and_then(|output| {
                // Callable points return values only; they cannot dispatch messages.
                if !output.messages.is_empty() {
                    return Err(if read_only {
                        Error::ReadOnly
                    } else {
                        Error::InvalidArgument
                    });
                }
                results::process_callable_point_events(
                    ctx,
                    contract,
                    &callstack,
                    output.attributes,
                    output.events,
                )?;
                Ok(ExecutionOk {
                    data: output.data,
                    ..Default::default()
                })
            });

            if result.inner.is_ok() {
                TransactionResult::Commit(result)
            } else {
                TransactionResult::Rollback(result)
            }
        })
    }

    /// Load an active contract and its code.
    pub(crate) fn load_active_contract<S: Store>(
        &self,
        mut state: S,
        contract: Address,
    ) -> Result<(types::ContractInfo, Arc<Vec<u8>>), Error> {
        let info = store::load_contract_info(&mut state, &contract)?;
        if store::is_inactive(&mut state, &contract) {
            return Err(Error::ContractInactive(contract));
        }
        let code_info = store::load_code_info(&mut state, info.code_id)?;
        let code = self.cache.load(state, &code_info.checksum)?;
        Ok((info, code))
    }

    /// Run the executor with all remaining transaction gas available.
    fn run<F>(
        &self,
        ctx: &mut Context,
        env: types::ContractEnv,
        read_only: bool,
        callstack: types::CallStack,
        f: F,
    ) -> ExecutionResult
    where
        F: FnOnce(&dyn Executor, &mut dyn Host) -> Result<ExecutionOk, Error>,
    {
        let gas_limit = core::Module::remaining_tx_gas(ctx);
        self.run_with_limit(ctx, env, read_only, callstack, gas_limit, f)
    }

    fn run_with_limit<F>(
        &self,
        ctx: &mut Context,
        env: types::ContractEnv,
        read_only: bool,
        callstack: types::CallStack,
        gas_limit: u64,
        f: F,
    ) -> ExecutionResult
    where
        F: FnOnce(&dyn Executor, &mut dyn Host) -> Result<ExecutionOk, Error>,
    {
        let mut exec_ctx = ExecutionContext::new(self, ctx, env, gas_limit, read_only, callstack);
        let inner = f(self.executor.as_ref(), &mut exec_ctx);
        ExecutionResult {
            inner,
            gas_used: exec_ctx.gas_used(),
        }
    }

    /// Emit contract events and dispatch contract messages, returning the contract's data.
    fn process_output(
        &self,
        ctx: &mut Context,
        contract: Address,
        output: ExecutionOk,
        depth: u16,
    ) -> Result<Vec<u8>, Error> {
        results::process_events(ctx, contract, output.attributes, output.events)?;
        results::process_messages(self, ctx, contract, output.messages, depth)?;
        Ok(output.data)
    }

    fn transfer_funds(
        &self,
        ctx: &mut Context,
        from: Address,
        to: Address,
        funds: &[token::BaseUnits],
    ) -> Result<(), Error> {
        for amount in funds {
            Cfg::Accounts::transfer(ctx, from, to, amount)?;
        }
        Ok(())
    }
}

fn contract_env(
    ctx: &Context,
    contract: Address,
    sender: Address,
    funds: &[token::BaseUnits],
) -> types::ContractEnv {
    let env = ctx.env();
    types::ContractEnv {
        height: env.height,
        time: env.time,
        chain_id: env.chain_id.clone(),
        contract,
        sender,
        funds: funds.to_vec(),
    }
}
