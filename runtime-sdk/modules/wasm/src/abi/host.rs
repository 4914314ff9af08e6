//! Host functions exposed to contracts.
use wasmd_runtime_sdk::{modules::core, storage::Store, types::address::Address};

use super::{ExecutionContext, Host};
use crate::{store, types, Config, Error};

impl<'a, Cfg: Config> ExecutionContext<'a, Cfg> {
    fn ensure_writable(&self) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }
}

impl<'a, Cfg: Config> Host for ExecutionContext<'a, Cfg> {
    fn env(&self) -> &types::ContractEnv {
        &self.env
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn use_gas(&mut self, gas: u64) -> Result<(), Error> {
        let gas_used = self
            .gas_used
            .checked_add(gas)
            .ok_or(core::Error::GasOverflow)?;
        if gas_used > self.gas_limit {
            return Err(core::Error::OutOfGas(self.gas_limit, gas_used).into());
        }
        self.gas_used = gas_used;
        Ok(())
    }

    fn remaining_gas(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_used)
    }

    fn storage_get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let costs = self.costs();
        self.use_gas(costs.storage_get_cost(key.len()))?;

        let value = store::contract_store(self.ctx.runtime_state(), self.env.contract).get(key);
        if let Some(value) = &value {
            self.use_gas(costs.storage_value_cost(value.len()))?;
        }
        Ok(value)
    }

    fn storage_set(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.ensure_writable()?;
        let costs = self.costs();
        self.use_gas(costs.storage_insert_cost(key.len(), value.len()))?;

        store::contract_store(self.ctx.runtime_state(), self.env.contract).insert(key, value);
        Ok(())
    }

    fn storage_remove(&mut self, key: &[u8]) -> Result<(), Error> {
        self.ensure_writable()?;
        let costs = self.costs();
        self.use_gas(costs.storage_remove_cost(key.len()))?;

        store::contract_store(self.ctx.runtime_state(), self.env.contract).remove(key);
        Ok(())
    }

    fn humanize_address(&mut self, canonical: &[u8]) -> Result<String, Error> {
        // Charged regardless of whether the conversion succeeds.
        self.use_gas(self.costs().humanize_cost())?;

        let address = Address::from_bytes(canonical).map_err(|_| Error::InvalidAddress)?;
        Ok(address.to_bech32())
    }

    fn canonicalize_address(&mut self, human: &str) -> Result<Vec<u8>, Error> {
        self.use_gas(self.costs().canonicalize_cost())?;

        let address = Address::from_bech32(human).map_err(|_| Error::InvalidAddress)?;
        Ok(address.into_bytes().to_vec())
    }

    fn deserialize_json(&mut self, data: &[u8]) -> Result<serde_json::Value, Error> {
        self.use_gas(self.costs().json_deserialization_cost(data.len()))?;

        serde_json::from_slice(data).map_err(|_| Error::InvalidArgument)
    }

    fn call_callable_point(
        &mut self,
        contract: Address,
        name: &str,
        args: &[u8],
        read_only: bool,
        gas_limit: u64,
    ) -> Result<types::CallablePointResult, Error> {
        self.use_gas(self.costs().callable_point_base)?;

        // Cycles and depth are rejected before the callee's allowance is reserved.
        let callstack = self.callstack.push(self.env.contract);
        self.keeper.check_callstack(&callstack, contract)?;

        // Reserve the callee's whole allowance.
        self.use_gas(gas_limit)?;

        let result = self.keeper.call_callable_point(
            self.ctx,
            &self.env,
            callstack,
            contract,
            name,
            args,
            read_only || self.read_only,
            gas_limit,
        );

        // Refund whatever the callee did not use.
        let gas_used = result.gas_used.min(gas_limit);
        self.gas_used -= gas_limit - gas_used;

        let output = result.inner?;
        Ok(types::CallablePointResult {
            data: output.data,
            gas_used,
        })
    }

    fn validate_interface(&mut self, contract: Address, expected: &[u8]) -> Result<(), Error> {
        self.use_gas(self.costs().callable_point_base)?;
        self.use_gas(self.costs().json_deserialization_cost(expected.len()))?;

        let expected: Vec<types::FunctionSignature> =
            serde_json::from_slice(expected).map_err(|_| Error::InvalidArgument)?;
        let (_, code) = self
            .keeper
            .load_active_contract(self.ctx.runtime_state(), contract)?;
        crate::wasm::check_interface(&code, &expected)
    }
}
