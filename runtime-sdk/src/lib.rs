//! Runtime SDK: storage, nested state, gas metering and basic modules.
#![deny(rust_2018_idioms, unreachable_pub)]
#![forbid(unsafe_code)]

extern crate self as wasmd_runtime_sdk;

pub mod context;
pub mod error;
pub mod event;
pub mod logger;
pub mod modules;
pub mod state;
pub mod storage;
pub mod testing;
pub mod types;

pub use crate::{
    context::{Context, Environment},
    event::Event,
    state::TransactionResult,
};

// Re-export the SDK support proc-macros.
pub use wasmd_runtime_sdk_macros::*;
