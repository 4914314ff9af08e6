//! Module state accessors.
use wasmd_runtime_sdk::{
    storage::{self, Store},
    types::address::Address,
};

use crate::{state, types, Error, Parameters, MODULE_NAME};

/// Per-contract key/value store.
pub(crate) type ContractStore<S> = storage::PrefixStore<
    storage::PrefixStore<storage::PrefixStore<S, &'static str>, &'static [u8]>,
    Address,
>;

fn module_store<S: Store>(state: S) -> storage::PrefixStore<S, &'static str> {
    storage::PrefixStore::new(state, MODULE_NAME)
}

fn typed<S: Store>(
    state: S,
    prefix: &'static [u8],
) -> storage::TypedStore<storage::PrefixStore<storage::PrefixStore<S, &'static str>, &'static [u8]>>
{
    storage::TypedStore::new(storage::PrefixStore::new(module_store(state), prefix))
}

/// First key strictly greater than `key` in byte order, or the empty key.
pub(crate) fn start_after_key(key: Option<&[u8]>) -> Vec<u8> {
    match key {
        Some(key) => [key, &[0x00]].concat(),
        None => Vec::new(),
    }
}

/// Allocate the next value of the given sequence.
pub(crate) fn next_sequence<S: Store>(state: S, key: &[u8]) -> Result<u64, Error> {
    let mut sequences = typed(state, state::SEQUENCES);
    let id: u64 = sequences.get(key).unwrap_or(1);
    let next = id
        .checked_add(1)
        .ok_or_else(|| Error::SequenceExhausted(String::from_utf8_lossy(key).into_owned()))?;
    sequences.insert(key, next);
    Ok(id)
}

/// Next value the given sequence will issue.
pub(crate) fn peek_sequence<S: Store>(state: S, key: &[u8]) -> u64 {
    typed(state, state::SEQUENCES).get(key).unwrap_or(1)
}

pub(crate) fn set_sequence<S: Store>(state: S, key: &[u8], value: u64) {
    typed(state, state::SEQUENCES).insert(key, value);
}

/// All stored sequences in ascending key order.
pub(crate) fn sequences<S: Store>(state: S) -> Vec<(Vec<u8>, u64)> {
    let store = storage::PrefixStore::new(module_store(state), state::SEQUENCES);
    store
        .iter()
        .map(|(key, value)| {
            let value: u64 = cbor::from_slice(&value)
                .unwrap_or_else(|e| panic!("corrupted sequence value: {:?}", e));
            (key, value)
        })
        .collect()
}

pub(crate) fn load_code_info<S: Store>(state: S, code_id: types::CodeId) -> Result<types::CodeInfo, Error> {
    typed(state, state::CODE_INFO)
        .get(code_id.to_storage_key())
        .ok_or_else(|| Error::CodeNotFound(code_id.as_u64()))
}

pub(crate) fn store_code_info<S: Store>(state: S, code_id: types::CodeId, info: types::CodeInfo) {
    typed(state, state::CODE_INFO).insert(code_id.to_storage_key(), info);
}

/// Visit code information in ascending code identifier order, starting after `start_after`.
///
/// The visitor returns `true` to stop the iteration.
pub(crate) fn iterate_code_infos<S, F>(state: S, start_after: Option<types::CodeId>, mut f: F)
where
    S: Store,
    F: FnMut(types::CodeId, types::CodeInfo) -> bool,
{
    let store = typed(state, state::CODE_INFO);
    let start = start_after_key(start_after.map(|id| id.to_storage_key()).as_ref().map(|k| &k[..]));
    for (code_id, info) in store.iter_from::<types::CodeId, types::CodeInfo>(&start) {
        if f(code_id, info) {
            break;
        }
    }
}

/// Raw (compressed) bytecode stored under the given checksum.
pub(crate) fn get_code_bytes<S: Store>(state: S, checksum: &types::Checksum) -> Option<Vec<u8>> {
    storage::PrefixStore::new(module_store(state), state::CODE).get(checksum.as_ref())
}

pub(crate) fn insert_code_bytes<S: Store>(state: S, checksum: &types::Checksum, compressed: &[u8]) {
    storage::PrefixStore::new(module_store(state), state::CODE).insert(checksum.as_ref(), compressed);
}

pub(crate) fn load_contract_info<S: Store>(
    state: S,
    contract: &Address,
) -> Result<types::ContractInfo, Error> {
    typed(state, state::CONTRACT_INFO)
        .get(contract)
        .ok_or(Error::ContractNotFound(*contract))
}

pub(crate) fn store_contract_info<S: Store>(state: S, contract: &Address, info: types::ContractInfo) {
    typed(state, state::CONTRACT_INFO).insert(contract, info);
}

/// Visit contracts in ascending address order, starting after `start_after`.
///
/// The visitor returns `true` to stop the iteration.
pub(crate) fn iterate_contract_infos<S, F>(state: S, start_after: Option<Address>, mut f: F)
where
    S: Store,
    F: FnMut(Address, types::ContractInfo) -> bool,
{
    let store = typed(state, state::CONTRACT_INFO);
    let start = start_after_key(start_after.as_ref().map(|a| a.as_ref()));
    for (address, info) in store.iter_from::<Address, types::ContractInfo>(&start) {
        if f(address, info) {
            break;
        }
    }
}

/// The private key/value store of a contract.
pub(crate) fn contract_store<S: Store>(state: S, contract: Address) -> ContractStore<S> {
    storage::PrefixStore::new(
        storage::PrefixStore::new(module_store(state), state::CONTRACT_STATE),
        contract,
    )
}

pub(crate) fn index_contract_by_code<S: Store>(state: S, code_id: types::CodeId, contract: &Address) {
    let mut store = storage::PrefixStore::new(module_store(state), state::CONTRACTS_BY_CODE);
    store.insert(&[&code_id.to_storage_key()[..], contract.as_ref()].concat(), &[]);
}

pub(crate) fn unindex_contract_by_code<S: Store>(
    state: S,
    code_id: types::CodeId,
    contract: &Address,
) {
    let mut store = storage::PrefixStore::new(module_store(state), state::CONTRACTS_BY_CODE);
    store.remove(&[&code_id.to_storage_key()[..], contract.as_ref()].concat());
}

/// Addresses of contracts currently using the given code, in ascending address order.
pub(crate) fn contracts_by_code<S: Store>(state: S, code_id: types::CodeId) -> Vec<Address> {
    let store = storage::PrefixStore::new(
        storage::PrefixStore::new(module_store(state), state::CONTRACTS_BY_CODE),
        code_id.to_storage_key(),
    );
    store
        .iter()
        .map(|(key, _)| {
            Address::from_bytes(&key)
                .unwrap_or_else(|_| panic!("corrupted contract index key: {}", hex::encode(&key)))
        })
        .collect()
}

pub(crate) fn is_inactive<S: Store>(state: S, contract: &Address) -> bool {
    storage::PrefixStore::new(module_store(state), state::INACTIVE_CONTRACTS)
        .get(contract.as_ref())
        .is_some()
}

pub(crate) fn set_inactive<S: Store>(state: S, contract: &Address, inactive: bool) {
    let mut store = storage::PrefixStore::new(module_store(state), state::INACTIVE_CONTRACTS);
    if inactive {
        store.insert(contract.as_ref(), &[]);
    } else {
        store.remove(contract.as_ref());
    }
}

/// Visit inactive contracts in ascending address order, starting after `start_after`.
pub(crate) fn iterate_inactive<S, F>(state: S, start_after: Option<Address>, mut f: F)
where
    S: Store,
    F: FnMut(Address) -> bool,
{
    let store = storage::PrefixStore::new(module_store(state), state::INACTIVE_CONTRACTS);
    let start = start_after_key(start_after.as_ref().map(|a| a.as_ref()));
    for (key, _) in store.iter_from(&start) {
        let address = Address::from_bytes(&key)
            .unwrap_or_else(|_| panic!("corrupted inactive contract key: {}", hex::encode(&key)));
        if f(address) {
            break;
        }
    }
}

pub(crate) fn load_params<S: Store>(state: S) -> Parameters {
    storage::TypedStore::new(module_store(state))
        .get(state::PARAMS)
        .unwrap_or_default()
}

pub(crate) fn store_params<S: Store>(state: S, params: Parameters) {
    storage::TypedStore::new(module_store(state)).insert(state::PARAMS, params);
}

#[cfg(test)]
mod test {
    use wasmd_runtime_sdk::{storage::MemoryStore, testing::keys};

    use super::*;

    #[test]
    fn test_sequences() {
        let mut root = MemoryStore::new();
        assert_eq!(peek_sequence(&mut root, state::SEQUENCE_CODE_ID), 1);
        assert_eq!(next_sequence(&mut root, state::SEQUENCE_CODE_ID).unwrap(), 1);
        assert_eq!(next_sequence(&mut root, state::SEQUENCE_CODE_ID).unwrap(), 2);
        assert_eq!(
            next_sequence(&mut root, state::SEQUENCE_INSTANCE_ID).unwrap(),
            1
        );
        assert_eq!(peek_sequence(&mut root, state::SEQUENCE_CODE_ID), 3);

        assert_eq!(
            sequences(&mut root),
            vec![
                (state::SEQUENCE_CODE_ID.to_vec(), 3),
                (state::SEQUENCE_INSTANCE_ID.to_vec(), 2),
            ]
        );
    }

    #[test]
    fn test_sequence_exhausted() {
        let mut root = MemoryStore::new();
        set_sequence(&mut root, state::SEQUENCE_CODE_ID, u64::MAX);
        assert!(matches!(
            next_sequence(&mut root, state::SEQUENCE_CODE_ID),
            Err(Error::SequenceExhausted(_))
        ));
        // The sequence is left untouched.
        assert_eq!(peek_sequence(&mut root, state::SEQUENCE_CODE_ID), u64::MAX);
    }

    #[test]
    fn test_contract_stores_are_isolated() {
        let mut root = MemoryStore::new();
        contract_store(&mut root, keys::alice::address()).insert(b"key", b"alice");
        contract_store(&mut root, keys::bob::address()).insert(b"key", b"bob");

        assert_eq!(
            contract_store(&mut root, keys::alice::address()).get(b"key"),
            Some(b"alice".to_vec())
        );
        assert_eq!(
            contract_store(&mut root, keys::bob::address())
                .iter()
                .collect::<Vec<_>>(),
            vec![(b"key".to_vec(), b"bob".to_vec())]
        );
    }

    #[test]
    fn test_contracts_by_code_index() {
        let mut root = MemoryStore::new();
        let code_id = types::CodeId::from(1);
        index_contract_by_code(&mut root, code_id, &keys::bob::address());
        index_contract_by_code(&mut root, code_id, &keys::alice::address());
        index_contract_by_code(&mut root, code_id.increment(), &keys::charlie::address());

        let mut expected = vec![keys::alice::address(), keys::bob::address()];
        expected.sort();
        assert_eq!(contracts_by_code(&mut root, code_id), expected);

        unindex_contract_by_code(&mut root, code_id, &keys::bob::address());
        assert_eq!(
            contracts_by_code(&mut root, code_id),
            vec![keys::alice::address()]
        );
    }

    #[test]
    fn test_start_after_key() {
        assert_eq!(start_after_key(None), Vec::<u8>::new());
        assert_eq!(start_after_key(Some(&[1, 2])), vec![1, 2, 0]);
    }
}
