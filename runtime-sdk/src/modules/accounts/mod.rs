//! Accounts module.
use thiserror::Error;

use crate::{
    context::Context,
    modules,
    storage::{self, Store},
    types::{address::Address, token},
};

#[cfg(test)]
mod test;

/// Unique module name.
const MODULE_NAME: &str = "accounts";

/// Errors emitted by the accounts module.
#[derive(Error, Debug, wasmd_runtime_sdk_macros::Error)]
pub enum Error {
    #[error("insufficient balance")]
    #[sdk_error(code = 1)]
    InsufficientBalance,

    #[error("invalid argument")]
    #[sdk_error(code = 2)]
    InvalidArgument,

    #[error("core: {0}")]
    #[sdk_error(transparent)]
    Core(#[from] modules::core::Error),
}

/// Events emitted by the accounts module.
#[derive(Debug, wasmd_runtime_sdk_macros::Event)]
pub enum Event {
    #[sdk_event(code = 1, kind = "transfer")]
    Transfer {
        #[sdk_event(key = "sender")]
        from: Address,
        #[sdk_event(key = "recipient")]
        to: Address,
        amount: token::BaseUnits,
    },

    #[sdk_event(code = 2, kind = "mint")]
    Mint {
        #[sdk_event(key = "recipient")]
        owner: Address,
        amount: token::BaseUnits,
    },
}

/// State schema constants.
pub mod state {
    /// Map of account addresses to their balances.
    pub const BALANCES: &[u8] = &[0x01];
    /// Map of total supplies (per denomination).
    pub const TOTAL_SUPPLY: &[u8] = &[0x02];
}

/// Interface that can be called from other modules.
pub trait API {
    /// Transfer an amount from one account to the other.
    fn transfer(
        ctx: &mut Context,
        from: Address,
        to: Address,
        amount: &token::BaseUnits,
    ) -> Result<(), Error>;

    /// Mint new tokens, increasing the total supply.
    fn mint(ctx: &mut Context, to: Address, amount: &token::BaseUnits) -> Result<(), Error>;

    /// Fetch an account's balance of the given denomination.
    fn get_balance<S: Store>(state: S, address: Address, denomination: &token::Denomination)
        -> u128;

    /// Fetch the total supply of the given denomination.
    fn get_total_supply<S: Store>(state: S, denomination: &token::Denomination) -> u128;
}

/// Accounts module.
pub struct Module;

impl Module {
    /// Add given amount of tokens to the specified account's balance.
    fn add_amount<S: Store>(state: S, addr: Address, amount: &token::BaseUnits) -> Result<(), Error> {
        let store = storage::PrefixStore::new(state, &MODULE_NAME);
        let balances = storage::PrefixStore::new(store, &state::BALANCES);
        let mut account = storage::TypedStore::new(storage::PrefixStore::new(balances, &addr));
        let mut value: u128 = account.get(amount.denomination()).unwrap_or_default();

        value = value
            .checked_add(amount.amount())
            .ok_or(Error::InvalidArgument)?;
        account.insert(amount.denomination(), value);
        Ok(())
    }

    /// Subtract given amount of tokens from the specified account's balance.
    fn sub_amount<S: Store>(state: S, addr: Address, amount: &token::BaseUnits) -> Result<(), Error> {
        let store = storage::PrefixStore::new(state, &MODULE_NAME);
        let balances = storage::PrefixStore::new(store, &state::BALANCES);
        let mut account = storage::TypedStore::new(storage::PrefixStore::new(balances, &addr));
        let mut value: u128 = account.get(amount.denomination()).unwrap_or_default();

        value = value
            .checked_sub(amount.amount())
            .ok_or(Error::InsufficientBalance)?;
        account.insert(amount.denomination(), value);
        Ok(())
    }

    /// Increment the total supply for the given amount.
    fn inc_total_supply<S: Store>(state: S, amount: &token::BaseUnits) -> Result<(), Error> {
        let store = storage::PrefixStore::new(state, &MODULE_NAME);
        let mut total_supplies =
            storage::TypedStore::new(storage::PrefixStore::new(store, &state::TOTAL_SUPPLY));
        let mut total_supply: u128 = total_supplies
            .get(amount.denomination())
            .unwrap_or_default();

        total_supply = total_supply
            .checked_add(amount.amount())
            .ok_or(Error::InvalidArgument)?;
        total_supplies.insert(amount.denomination(), total_supply);
        Ok(())
    }
}

impl API for Module {
    fn transfer(
        ctx: &mut Context,
        from: Address,
        to: Address,
        amount: &token::BaseUnits,
    ) -> Result<(), Error> {
        if amount.amount() == 0 {
            return Ok(());
        }

        // Subtract from source account.
        Self::sub_amount(ctx.runtime_state(), from, amount)?;
        // Add to destination account.
        Self::add_amount(ctx.runtime_state(), to, amount)?;

        ctx.emit_event(Event::Transfer {
            from,
            to,
            amount: amount.clone(),
        });

        Ok(())
    }

    fn mint(ctx: &mut Context, to: Address, amount: &token::BaseUnits) -> Result<(), Error> {
        Self::add_amount(ctx.runtime_state(), to, amount)?;
        Self::inc_total_supply(ctx.runtime_state(), amount)?;

        ctx.emit_event(Event::Mint {
            owner: to,
            amount: amount.clone(),
        });

        Ok(())
    }

    fn get_balance<S: Store>(
        state: S,
        address: Address,
        denomination: &token::Denomination,
    ) -> u128 {
        let store = storage::PrefixStore::new(state, &MODULE_NAME);
        let balances = storage::PrefixStore::new(store, &state::BALANCES);
        let account = storage::TypedStore::new(storage::PrefixStore::new(balances, &address));

        account.get(denomination).unwrap_or_default()
    }

    fn get_total_supply<S: Store>(state: S, denomination: &token::Denomination) -> u128 {
        let store = storage::PrefixStore::new(state, &MODULE_NAME);
        let total_supplies =
            storage::TypedStore::new(storage::PrefixStore::new(store, &state::TOTAL_SUPPLY));

        total_supplies.get(denomination).unwrap_or_default()
    }
}
