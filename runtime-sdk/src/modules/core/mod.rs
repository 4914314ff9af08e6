//! Core definitions module: transaction gas accounting.
use thiserror::Error;

use crate::context::Context;

#[cfg(test)]
mod test;

/// Unique module name.
const MODULE_NAME: &str = "core";

/// Errors emitted by the core module.
#[derive(Error, Debug, wasmd_runtime_sdk_macros::Error)]
pub enum Error {
    #[error("out of gas (limit: {0} wanted: {1})")]
    #[sdk_error(code = 1)]
    OutOfGas(u64, u64),

    #[error("gas overflow")]
    #[sdk_error(code = 2)]
    GasOverflow,

    #[error("invalid argument: {0}")]
    #[sdk_error(code = 3)]
    InvalidArgument(#[source] anyhow::Error),
}

/// Interface that can be called from other modules.
pub trait API {
    /// Attempt to use gas. If the gas specified would cause the transaction to exceed its limit,
    /// fails with `Error::OutOfGas` and gas usage is not changed.
    fn use_tx_gas(ctx: &mut Context, gas: u64) -> Result<(), Error>;

    /// Remaining gas of the current transaction.
    fn remaining_tx_gas(ctx: &Context) -> u64;

    /// Gas used so far by the current transaction.
    fn used_tx_gas(ctx: &Context) -> u64;
}

/// Core module.
pub struct Module;

impl API for Module {
    fn use_tx_gas(ctx: &mut Context, gas: u64) -> Result<(), Error> {
        let gas_limit = ctx.gas_limit();
        let new_gas_used = {
            let sum = ctx.gas_used().checked_add(gas).ok_or(Error::GasOverflow)?;
            if sum > gas_limit {
                return Err(Error::OutOfGas(gas_limit, sum));
            }
            sum
        };

        ctx.set_gas_used(new_gas_used);

        Ok(())
    }

    fn remaining_tx_gas(ctx: &Context) -> u64 {
        ctx.gas_limit().saturating_sub(ctx.gas_used())
    }

    fn used_tx_gas(ctx: &Context) -> u64 {
        ctx.gas_used()
    }
}
