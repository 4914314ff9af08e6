use crate::testing::mock;

use super::{Error, Module as Core, API as _};

#[test]
fn test_use_gas() {
    let mock = mock::Mock::default().with_gas_limit(1000);

    let mut ctx = mock.create_ctx();
    Core::use_tx_gas(&mut ctx, 100).expect("using gas under limit should succeed");
    assert_eq!(Core::remaining_tx_gas(&ctx), 900);

    let mut ctx = mock.create_ctx();
    Core::use_tx_gas(&mut ctx, 950)
        .expect("gas across separate transactions shouldn't accumulate");

    let mut ctx = mock.create_ctx();
    Core::use_tx_gas(&mut ctx, 600).unwrap();
    let err = Core::use_tx_gas(&mut ctx, 600)
        .expect_err("gas in same transaction should accumulate");
    assert!(matches!(err, Error::OutOfGas(1000, 1200)));
    assert_eq!(Core::used_tx_gas(&ctx), 600, "failed charge must not change usage");

    let mut ctx = mock.create_ctx();
    Core::use_tx_gas(&mut ctx, 1).unwrap();
    let err = Core::use_tx_gas(&mut ctx, u64::MAX).expect_err("overflow should cause error");
    assert!(matches!(err, Error::GasOverflow));
}

#[test]
fn test_gas_survives_rollback() {
    let mock = mock::Mock::default().with_gas_limit(1000);
    let mut ctx = mock.create_ctx();

    let result: Result<(), Error> = ctx.with_transaction(|ctx| {
        Core::use_tx_gas(ctx, 400)?;
        Err(Error::GasOverflow)
    });
    assert!(result.is_err());
    assert_eq!(Core::used_tx_gas(&ctx), 400);
}

#[test]
fn test_with_gas_limit() {
    let mock = mock::Mock::default().with_gas_limit(1000);
    let mut ctx = mock.create_ctx();
    Core::use_tx_gas(&mut ctx, 10).unwrap();

    let inner_used = ctx.with_gas_limit(50, |ctx| {
        assert_eq!(Core::remaining_tx_gas(ctx), 50);
        Core::use_tx_gas(ctx, 60).expect_err("inner limit should apply");
        Core::use_tx_gas(ctx, 20).unwrap();
        Core::used_tx_gas(ctx)
    });
    assert_eq!(inner_used, 20);
    assert_eq!(Core::used_tx_gas(&ctx), 10);
}
