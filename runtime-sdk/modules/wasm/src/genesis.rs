//! Genesis state import and export.
use std::collections::BTreeSet;

use wasmd_runtime_sdk::{context::Context, storage::Store, types::address::Address};

use crate::{code, state, store, types, Config, Error, Module, Parameters};

/// Genesis state for the wasm module.
#[derive(Clone, Debug, Default, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub struct Genesis {
    pub params: Parameters,
    #[cbor(optional)]
    pub codes: Vec<GenesisCode>,
    #[cbor(optional)]
    pub contracts: Vec<GenesisContract>,
    #[cbor(optional)]
    pub sequences: Vec<GenesisSequence>,
    /// Messages executed after all other state has been imported.
    #[cbor(optional)]
    pub gen_msgs: Vec<GenesisMessage>,
    #[cbor(optional)]
    pub inactive_contract_addresses: Vec<Address>,
}

/// Stored code in genesis.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(no_default)]
pub struct GenesisCode {
    pub code_id: types::CodeId,
    pub code_info: types::CodeInfo,
    /// Raw (uncompressed) bytecode.
    pub code_bytes: Vec<u8>,
    #[cbor(optional)]
    pub pinned: bool,
}

/// A deployed contract in genesis.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(no_default)]
pub struct GenesisContract {
    pub address: Address,
    pub info: types::ContractInfo,
    #[cbor(optional)]
    pub state: Vec<types::KeyValue>,
}

/// A sequence value in genesis.
#[derive(Clone, Debug, Default, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub struct GenesisSequence {
    pub id_key: Vec<u8>,
    pub value: u64,
}

/// A message executed during genesis.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub enum GenesisMessage {
    #[cbor(rename = "store_code")]
    StoreCode {
        sender: Address,
        request: types::StoreCode,
    },

    #[cbor(rename = "instantiate")]
    Instantiate {
        sender: Address,
        request: types::Instantiate,
    },

    #[cbor(rename = "execute")]
    Execute {
        sender: Address,
        request: types::Execute,
    },
}

impl GenesisMessage {
    fn validate_basic(&self) -> Result<(), Error> {
        match self {
            GenesisMessage::StoreCode { request, .. } => {
                if request.code.is_empty() {
                    return Err(invalid("store code message without code"));
                }
                if let Some(permission) = &request.instantiate_permission {
                    permission.validate()?;
                }
            }
            GenesisMessage::Instantiate { request, .. } => {
                if request.code_id.as_u64() == 0 {
                    return Err(invalid("instantiate message with zero code id"));
                }
                if request.label.is_empty() {
                    return Err(invalid("instantiate message without label"));
                }
            }
            GenesisMessage::Execute { request, .. } => {
                if request.contract == Address::default() {
                    return Err(invalid("execute message without contract"));
                }
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> Error {
    Error::InvalidGenesis(msg.to_string())
}

impl Genesis {
    /// Perform basic validation that does not require access to state.
    pub fn validate_basic(&self) -> Result<(), Error> {
        self.params
            .validate_basic()
            .map_err(|err| Error::InvalidGenesis(format!("params: {}", err)))?;

        for code in &self.codes {
            if code.code_id.as_u64() == 0 {
                return Err(invalid("zero code id"));
            }
            if code.code_info.checksum.is_empty() {
                return Err(Error::InvalidGenesis(format!(
                    "code {}: empty checksum",
                    code.code_id
                )));
            }
            if code.code_bytes.is_empty() {
                return Err(Error::InvalidGenesis(format!(
                    "code {}: empty bytecode",
                    code.code_id
                )));
            }
            code.code_info
                .instantiate_permission
                .validate()
                .map_err(|err| Error::InvalidGenesis(format!("code {}: {}", code.code_id, err)))?;
        }

        for contract in &self.contracts {
            if contract.address == Address::default() {
                return Err(invalid("contract with empty address"));
            }
            if contract.info.code_id.as_u64() == 0 {
                return Err(Error::InvalidGenesis(format!(
                    "contract {}: zero code id",
                    contract.address
                )));
            }
            if contract.state.iter().any(|kv| kv.key.is_empty()) {
                return Err(Error::InvalidGenesis(format!(
                    "contract {}: empty state key",
                    contract.address
                )));
            }
        }

        for sequence in &self.sequences {
            if sequence.id_key.is_empty() {
                return Err(invalid("empty sequence key"));
            }
        }

        for msg in &self.gen_msgs {
            msg.validate_basic()?;
        }

        let mut seen = BTreeSet::new();
        for address in &self.inactive_contract_addresses {
            if *address == Address::default() {
                return Err(invalid("empty inactive contract address"));
            }
            if !seen.insert(address) {
                return Err(Error::InvalidGenesis(format!(
                    "duplicate inactive contract {}",
                    address
                )));
            }
        }

        Ok(())
    }
}

impl<Cfg: Config> Module<Cfg> {
    /// Initialize state from genesis.
    pub fn init_genesis(&self, ctx: &mut Context, genesis: Genesis) -> Result<(), Error> {
        genesis.validate_basic()?;
        Self::set_params(ctx, genesis.params)?;

        let mut max_code_id = 0;
        for code in genesis.codes {
            let checksum = types::Checksum::digest(&code.code_bytes);
            if checksum != code.code_info.checksum {
                return Err(Error::InvalidGenesis(format!(
                    "code {}: checksum mismatch",
                    code.code_id
                )));
            }
            code::store_code(ctx.runtime_state(), &checksum, &code.code_bytes)?;

            let mut info = code.code_info;
            info.pinned = code.pinned;
            store::store_code_info(ctx.runtime_state(), code.code_id, info);
            max_code_id = max_code_id.max(code.code_id.as_u64());
        }

        let mut max_instance_id = 0;
        for contract in genesis.contracts {
            if store::load_code_info(ctx.runtime_state(), contract.info.code_id).is_err() {
                return Err(Error::InvalidGenesis(format!(
                    "contract {}: unknown code {}",
                    contract.address, contract.info.code_id
                )));
            }

            let mut contract_store = store::contract_store(ctx.runtime_state(), contract.address);
            for kv in contract.state {
                contract_store.insert(&kv.key, &kv.value);
            }
            store::index_contract_by_code(
                ctx.runtime_state(),
                contract.info.code_id,
                &contract.address,
            );
            max_instance_id = max_instance_id.max(contract.info.instance_id);
            store::store_contract_info(ctx.runtime_state(), &contract.address, contract.info);
        }

        for sequence in genesis.sequences {
            store::set_sequence(ctx.runtime_state(), &sequence.id_key, sequence.value);
        }
        for (key, max) in [
            (state::SEQUENCE_CODE_ID, max_code_id),
            (state::SEQUENCE_INSTANCE_ID, max_instance_id),
        ] {
            let next = store::peek_sequence(ctx.runtime_state(), key);
            if next <= max {
                return Err(Error::InvalidGenesis(format!(
                    "sequence {} must be greater than {} (got: {})",
                    String::from_utf8_lossy(key),
                    max,
                    next
                )));
            }
        }

        for msg in genesis.gen_msgs {
            match msg {
                GenesisMessage::StoreCode { sender, request } => {
                    self.keeper.store_code(ctx, sender, request)?;
                }
                GenesisMessage::Instantiate { sender, request } => {
                    self.keeper.instantiate(ctx, sender, request)?;
                }
                GenesisMessage::Execute { sender, request } => {
                    self.keeper.execute(ctx, sender, request)?;
                }
            }
        }

        for address in genesis.inactive_contract_addresses {
            if store::load_contract_info(ctx.runtime_state(), &address).is_err() {
                return Err(Error::InvalidGenesis(format!(
                    "unknown inactive contract {}",
                    address
                )));
            }
            store::set_inactive(ctx.runtime_state(), &address, true);
        }

        self.keeper.initialize_pinned_codes(ctx.runtime_state())?;

        slog::info!(self.logger, "initialized genesis state"; "max_code_id" => max_code_id);
        Ok(())
    }

    /// Export the current state as genesis.
    pub fn export_genesis<S: Store>(&self, mut state: S) -> Result<Genesis, Error> {
        let mut code_infos = Vec::new();
        store::iterate_code_infos(&mut state, None, |code_id, info| {
            code_infos.push((code_id, info));
            false
        });
        let mut codes = Vec::with_capacity(code_infos.len());
        for (code_id, code_info) in code_infos {
            let code_bytes = self.keeper.load_code(&mut state, &code_info.checksum)?;
            codes.push(GenesisCode {
                code_id,
                pinned: code_info.pinned,
                code_info,
                code_bytes,
            });
        }

        let mut contracts = Vec::new();
        store::iterate_contract_infos(&mut state, None, |address, info| {
            contracts.push(GenesisContract {
                address,
                info,
                state: vec![],
            });
            false
        });
        for contract in &mut contracts {
            contract.state = store::contract_store(&mut state, contract.address)
                .iter()
                .map(|(key, value)| types::KeyValue { key, value })
                .collect();
        }

        let sequences = store::sequences(&mut state)
            .into_iter()
            .map(|(id_key, value)| GenesisSequence { id_key, value })
            .collect();

        let mut inactive_contract_addresses = Vec::new();
        store::iterate_inactive(&mut state, None, |address| {
            inactive_contract_addresses.push(address);
            false
        });

        Ok(Genesis {
            params: store::load_params(&mut state),
            codes,
            contracts,
            sequences,
            gen_msgs: vec![],
            inactive_contract_addresses,
        })
    }
}
