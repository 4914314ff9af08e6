//! Tests for the accounts module.
use crate::{
    modules::accounts::{Module as Accounts, API as _},
    testing::{keys, mock},
    types::token::{BaseUnits, Denomination},
};

fn ulink() -> Denomination {
    Denomination::from("ulink")
}

#[test]
fn test_mint_and_transfer() {
    let mock = mock::Mock::default();
    let mut ctx = mock.create_ctx();

    Accounts::mint(&mut ctx, keys::alice::address(), &BaseUnits::new(1_000, ulink())).unwrap();
    assert_eq!(
        Accounts::get_total_supply(ctx.runtime_state(), &ulink()),
        1_000
    );

    Accounts::transfer(
        &mut ctx,
        keys::alice::address(),
        keys::bob::address(),
        &BaseUnits::new(400, ulink()),
    )
    .expect("transfer should succeed");

    assert_eq!(
        Accounts::get_balance(ctx.runtime_state(), keys::alice::address(), &ulink()),
        600
    );
    assert_eq!(
        Accounts::get_balance(ctx.runtime_state(), keys::bob::address(), &ulink()),
        400
    );

    let event = ctx.events().last().unwrap();
    assert_eq!(event.module, "accounts");
    assert_eq!(event.kind, "transfer");
    assert_eq!(event.attribute_keys(), vec!["sender", "recipient", "amount"]);
    assert_eq!(event.attribute("amount"), Some("400ulink"));
}

#[test]
fn test_transfer_insufficient_balance() {
    let mock = mock::Mock::default();
    let mut ctx = mock.create_ctx();

    Accounts::mint(&mut ctx, keys::alice::address(), &BaseUnits::new(10, ulink())).unwrap();
    let result: Result<(), _> = ctx.with_transaction(|ctx| {
        Accounts::transfer(
            ctx,
            keys::alice::address(),
            keys::bob::address(),
            &BaseUnits::new(11, ulink()),
        )
    });
    assert!(matches!(result, Err(super::Error::InsufficientBalance)));
    assert_eq!(
        Accounts::get_balance(ctx.runtime_state(), keys::alice::address(), &ulink()),
        10
    );
    assert_eq!(
        Accounts::get_balance(ctx.runtime_state(), keys::bob::address(), &ulink()),
        0
    );
}

#[test]
fn test_transfer_rolled_back_with_transaction() {
    let mock = mock::Mock::default();
    let mut ctx = mock.create_ctx();

    Accounts::mint(&mut ctx, keys::alice::address(), &BaseUnits::new(10, ulink())).unwrap();
    let events_before = ctx.events().len();

    let result: Result<(), super::Error> = ctx.with_transaction(|ctx| {
        Accounts::transfer(
            ctx,
            keys::alice::address(),
            keys::bob::address(),
            &BaseUnits::new(5, ulink()),
        )?;
        Err(super::Error::InvalidArgument)
    });
    assert!(result.is_err());
    assert_eq!(ctx.events().len(), events_before, "events should be rolled back");
    assert_eq!(
        Accounts::get_balance(ctx.runtime_state(), keys::bob::address(), &ulink()),
        0
    );
}
