//! Processing of execution results.
use wasmd_runtime_sdk::{
    context::Context,
    event::{Attribute, AttributeValue, EmittedEvent},
    modules::core::{self, API as _},
    types::address::Address,
};

use crate::{
    abi::{ExecutionOk, ExecutionResult},
    types, Config, Error, Keeper, CONTRACT_EVENT_CODE, MODULE_NAME,
};

/// Event type of attributes returned by a contract.
const WASM_EVENT_KIND: &str = "wasm";
/// Prefix of custom contract event types.
const CUSTOM_EVENT_PREFIX: &str = "wasm-";
/// Event type of attributes returned by a callable point.
const CALLABLE_POINT_EVENT_KIND: &str = "wasm-callablepoint";

const CONTRACT_ADDRESS_KEY: &str = "_contract_address";
const CALLSTACK_KEY: &str = "_callstack";

/// Process an execution result by performing gas accounting and returning the inner result.
pub(crate) fn process_execution_result(
    ctx: &mut Context,
    result: ExecutionResult,
) -> Result<ExecutionOk, Error> {
    // The following call should never fail as the execution was limited to the remaining gas.
    core::Module::use_tx_gas(ctx, result.gas_used)?;

    result.inner
}

/// Emit the `wasm` event and custom events returned by a contract.
pub(crate) fn process_events(
    ctx: &mut Context,
    contract: Address,
    attributes: Vec<Attribute>,
    events: Vec<types::ContractEvent>,
) -> Result<(), Error> {
    let prefix = vec![Attribute::new(
        CONTRACT_ADDRESS_KEY,
        contract.to_attribute_value(),
    )];
    emit_events(ctx, WASM_EVENT_KIND, CUSTOM_EVENT_PREFIX, prefix, attributes, events)
}

/// Emit the events returned by a callable point.
pub(crate) fn process_callable_point_events(
    ctx: &mut Context,
    contract: Address,
    callstack: &types::CallStack,
    attributes: Vec<Attribute>,
    events: Vec<types::ContractEvent>,
) -> Result<(), Error> {
    let prefix = vec![
        Attribute::new(CONTRACT_ADDRESS_KEY, contract.to_attribute_value()),
        Attribute::new(CALLSTACK_KEY, callstack.to_attribute_value()),
    ];
    emit_events(
        ctx,
        CALLABLE_POINT_EVENT_KIND,
        &format!("{}-", CALLABLE_POINT_EVENT_KIND),
        prefix,
        attributes,
        events,
    )
}

fn emit_events(
    ctx: &mut Context,
    kind: &str,
    custom_prefix: &str,
    prefix: Vec<Attribute>,
    attributes: Vec<Attribute>,
    events: Vec<types::ContractEvent>,
) -> Result<(), Error> {
    // Validate everything before emitting anything.
    validate_attributes(&attributes)?;
    for event in &events {
        if event.kind.trim().is_empty() {
            return Err(Error::InvalidArgument);
        }
        validate_attributes(&event.attributes)?;
    }

    if !attributes.is_empty() {
        ctx.emit_event_raw(contract_event(kind.to_string(), &prefix, attributes));
    }
    for event in events {
        ctx.emit_event_raw(contract_event(
            format!("{}{}", custom_prefix, event.kind.trim()),
            &prefix,
            event.attributes,
        ));
    }

    Ok(())
}

fn contract_event(kind: String, prefix: &[Attribute], attributes: Vec<Attribute>) -> EmittedEvent {
    EmittedEvent::new(
        MODULE_NAME,
        CONTRACT_EVENT_CODE,
        kind,
        prefix.iter().cloned().chain(attributes).collect(),
    )
}

/// Contract supplied attribute keys must be non-empty and must not use the reserved `_` prefix.
fn validate_attributes(attributes: &[Attribute]) -> Result<(), Error> {
    for attr in attributes {
        let key = attr.key.trim();
        if key.is_empty() {
            return Err(Error::InvalidArgument);
        }
        if key.starts_with('_') {
            return Err(Error::ReservedAttribute(attr.key.clone()));
        }
    }
    Ok(())
}

/// Dispatch messages emitted by a contract, with the contract as the sender.
pub(crate) fn process_messages<Cfg: Config>(
    keeper: &Keeper<Cfg>,
    ctx: &mut Context,
    sender: Address,
    messages: Vec<types::ContractMessage>,
    depth: u16,
) -> Result<(), Error> {
    if messages.is_empty() {
        return Ok(());
    }

    // Charge gas for each emitted message.
    core::Module::use_tx_gas(
        ctx,
        keeper
            .config()
            .gas_costs
            .message_dispatch_cost(messages.len()),
    )?;

    let max_depth = keeper.config().max_call_depth;
    let depth = depth.saturating_add(1);
    if depth > max_depth {
        return Err(Error::CallDepthExceeded(depth, max_depth));
    }

    for msg in messages {
        match msg {
            types::ContractMessage::Execute {
                contract,
                msg,
                funds,
            } => {
                ctx.with_transaction(|ctx| {
                    keeper.execute_at_depth(ctx, sender, contract, &msg, &funds, depth)
                })?;
            }
        }
    }

    Ok(())
}
