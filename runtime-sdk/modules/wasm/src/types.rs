//! Wasm module types.
use std::{convert::TryFrom, fmt};

use sha2::{Digest, Sha256};

use wasmd_runtime_sdk::{
    event::{Attribute, AttributeValue},
    types::{address::Address, token},
};

pub use crate::access::{AccessConfig, AccessType};
use crate::MODULE_NAME;

/// Unique stored code identifier.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, cbor::Encode, cbor::Decode,
)]
#[cbor(transparent)]
pub struct CodeId(u64);

impl CodeId {
    /// Convert identifier to u64.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Return the next identifier in sequence.
    pub fn increment(&self) -> Self {
        CodeId(self.0 + 1)
    }

    /// Convert identifier to storage key representation.
    pub fn to_storage_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl From<u64> for CodeId {
    fn from(v: u64) -> Self {
        CodeId(v)
    }
}

impl TryFrom<&[u8]> for CodeId {
    type Error = std::array::TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(CodeId(u64::from_be_bytes(bytes.try_into()?)))
    }
}

impl fmt::Display for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AttributeValue for CodeId {
    fn to_attribute_value(&self) -> String {
        self.to_string()
    }
}

/// SHA-256 checksum of raw contract bytecode.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checksum([u8; Checksum::SIZE]);

impl Checksum {
    /// Size of a checksum in bytes.
    pub const SIZE: usize = 32;

    /// Compute the checksum of the given bytecode.
    pub fn digest(code: &[u8]) -> Self {
        Checksum(Sha256::digest(code).into())
    }

    /// Whether the checksum is all zeroes.
    pub fn is_empty(&self) -> bool {
        self.0 == [0; Self::SIZE]
    }

    /// Raw checksum bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Checksum {
    type Error = std::array::TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(Checksum(bytes.try_into()?))
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AttributeValue for Checksum {
    fn to_attribute_value(&self) -> String {
        self.to_string()
    }
}

impl cbor::Encode for Checksum {
    fn into_cbor_value(self) -> cbor::Value {
        cbor::Value::ByteString(self.0.to_vec())
    }
}

impl cbor::Decode for Checksum {
    fn try_from_cbor_value(value: cbor::Value) -> Result<Self, cbor::DecodeError> {
        match value {
            cbor::Value::ByteString(data) => {
                Self::try_from(data.as_slice()).map_err(|_| cbor::DecodeError::UnexpectedType)
            }
            _ => Err(cbor::DecodeError::UnexpectedType),
        }
    }
}

/// Stored code information.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(no_default)]
pub struct CodeInfo {
    /// Checksum of the raw bytecode.
    pub checksum: Checksum,

    /// Code uploader address.
    pub creator: Address,

    /// Who is allowed to instantiate this code.
    pub instantiate_permission: AccessConfig,

    /// Whether the code is kept in the warm cache.
    #[cbor(optional)]
    pub pinned: bool,
}

/// Block position at which a contract was created.
#[derive(Clone, Debug, Default, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub struct CreatedAt {
    /// Block height.
    pub height: u64,
    /// Chain identifier.
    pub chain_id: String,
}

/// Maximum length of a contract label in bytes.
pub const MAX_LABEL_SIZE: usize = 128;

/// Deployed contract information.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(no_default)]
pub struct ContractInfo {
    /// Identifier of code used by the contract.
    pub code_id: CodeId,

    /// Contract creator address.
    pub creator: Address,

    /// Address allowed to migrate the contract and change its admin.
    #[cbor(optional)]
    pub admin: Option<Address>,

    /// Free-text label.
    pub label: String,

    /// Block at which the contract was instantiated.
    pub created: CreatedAt,

    /// Sequence value the contract address was derived from.
    pub instance_id: u64,
}

impl ContractInfo {
    /// Derive the address of a contract created by `creator` using the given instance sequence
    /// value.
    pub fn address_for(creator: &Address, instance_id: u64) -> Address {
        Address::from_module_raw(
            MODULE_NAME,
            &[creator.as_ref(), &instance_id.to_be_bytes()].concat(),
        )
    }

    /// Address associated with the contract.
    pub fn address(&self) -> Address {
        Self::address_for(&self.creator, self.instance_id)
    }
}

/// Ordered stack of contract addresses taking part in a chain of callable point invocations,
/// starting with the outermost caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(transparent)]
pub struct CallStack(pub Vec<Address>);

impl CallStack {
    /// Whether the stack contains the given address.
    pub fn contains(&self, address: &Address) -> bool {
        self.0.contains(address)
    }

    /// Number of entries on the stack.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Return a new stack with the given address pushed on top.
    pub fn push(&self, address: Address) -> Self {
        let mut stack = self.0.clone();
        stack.push(address);
        CallStack(stack)
    }
}

impl AttributeValue for CallStack {
    fn to_attribute_value(&self) -> String {
        hex::encode(cbor::to_vec(self.clone()))
    }
}

/// Block and call environment exposed to a running contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractEnv {
    /// Current block height.
    pub height: u64,
    /// Current block time.
    pub time: u64,
    /// Chain identifier.
    pub chain_id: String,
    /// Address of the running contract.
    pub contract: Address,
    /// Address of the caller.
    pub sender: Address,
    /// Funds sent along with the call.
    pub funds: Vec<token::BaseUnits>,
}

/// An event emitted by a contract.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContractEvent {
    /// Custom event type (without the module prefix).
    pub kind: String,
    /// Event attributes.
    pub attributes: Vec<Attribute>,
}

/// A message emitted by a contract, dispatched after the contract returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractMessage {
    /// Execute another contract with the emitting contract as the sender.
    Execute {
        contract: Address,
        msg: Vec<u8>,
        funds: Vec<token::BaseUnits>,
    },
}

/// Store code request.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(no_default)]
pub struct StoreCode {
    /// Raw contract bytecode.
    pub code: Vec<u8>,

    /// Who is allowed to instantiate this code. Defaults to the instantiate default permission
    /// granted to the uploader.
    #[cbor(optional)]
    pub instantiate_permission: Option<AccessConfig>,
}

/// Store code result.
#[derive(Clone, Debug, Default, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub struct StoreCodeResult {
    /// Assigned code identifier.
    pub code_id: CodeId,
    /// Checksum of the stored code.
    pub checksum: Checksum,
}

/// Instantiate request.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(no_default)]
pub struct Instantiate {
    /// Identifier of code used by the contract.
    pub code_id: CodeId,

    /// Contract admin.
    #[cbor(optional)]
    pub admin: Option<Address>,

    /// Free-text label.
    pub label: String,

    /// Arguments to the contract's instantiation function.
    pub msg: Vec<u8>,

    /// Tokens that should be sent to the contract as part of the call.
    #[cbor(optional)]
    pub funds: Vec<token::BaseUnits>,
}

/// Instantiate result.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(no_default)]
pub struct InstantiateResult {
    /// Address of the new contract.
    pub address: Address,
    /// Data returned by the contract.
    pub data: Vec<u8>,
}

/// Store code and instantiate request.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(no_default)]
pub struct StoreCodeAndInstantiate {
    /// Raw contract bytecode.
    pub code: Vec<u8>,

    /// Who is allowed to instantiate this code.
    #[cbor(optional)]
    pub instantiate_permission: Option<AccessConfig>,

    /// Contract admin.
    #[cbor(optional)]
    pub admin: Option<Address>,

    /// Free-text label.
    pub label: String,

    /// Arguments to the contract's instantiation function.
    pub msg: Vec<u8>,

    /// Tokens that should be sent to the contract as part of the call.
    #[cbor(optional)]
    pub funds: Vec<token::BaseUnits>,
}

/// Store code and instantiate result.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(no_default)]
pub struct StoreCodeAndInstantiateResult {
    /// Assigned code identifier.
    pub code_id: CodeId,
    /// Address of the new contract.
    pub address: Address,
    /// Data returned by the contract.
    pub data: Vec<u8>,
}

/// Execute request.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(no_default)]
pub struct Execute {
    /// Contract address.
    pub contract: Address,

    /// Call arguments.
    pub msg: Vec<u8>,

    /// Tokens that should be sent to the contract as part of the call.
    #[cbor(optional)]
    pub funds: Vec<token::BaseUnits>,
}

/// Migrate request.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[cbor(no_default)]
pub struct Migrate {
    /// Contract address.
    pub contract: Address,

    /// Identifier of the code to migrate to.
    pub code_id: CodeId,

    /// Arguments to the new code's migrate function.
    pub msg: Vec<u8>,
}

/// A single entry of a contract's key/value store.
#[derive(Clone, Debug, Default, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Signature of an exported function, as used in interface validation.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FunctionSignature {
    /// Export name.
    pub name: String,
    /// Parameter value types (`i32`, `i64`, `f32`, `f64`, `v128`, `externref`, `funcref`).
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Result value types.
    #[serde(default)]
    pub results: Vec<String>,
}

/// Result of invoking a callable point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallablePointResult {
    /// Data returned by the callee.
    pub data: Vec<u8>,
    /// Gas used by the callee.
    pub gas_used: u64,
}

#[cfg(test)]
mod test {
    use wasmd_runtime_sdk::testing::keys;

    use super::*;

    #[test]
    fn test_checksum() {
        let checksum = Checksum::digest(b"hello world");
        assert_eq!(
            checksum.to_string(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert!(!checksum.is_empty());
        assert!(Checksum::default().is_empty());
    }

    #[test]
    fn test_contract_address_derivation() {
        let creator = keys::alice::address();
        let a1 = ContractInfo::address_for(&creator, 1);
        let a1_again = ContractInfo::address_for(&creator, 1);
        let a2 = ContractInfo::address_for(&creator, 2);
        let b1 = ContractInfo::address_for(&keys::bob::address(), 1);

        assert_eq!(a1, a1_again);
        assert_ne!(a1, a2);
        assert_ne!(a1, b1);
    }

    #[test]
    fn test_call_stack() {
        let stack = CallStack::default().push(keys::alice::address());
        let stack = stack.push(keys::bob::address());
        assert_eq!(stack.depth(), 2);
        assert!(stack.contains(&keys::alice::address()));
        assert!(!stack.contains(&keys::charlie::address()));

        let encoded = stack.to_attribute_value();
        let decoded: CallStack = cbor::from_slice(&hex::decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, stack);
    }

    #[test]
    fn test_code_id_storage_key() {
        let id = CodeId::from(258);
        assert_eq!(id.to_storage_key(), [0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(CodeId::try_from(&id.to_storage_key()[..]).unwrap(), id);
        assert!(CodeId::try_from(&[1u8, 2][..]).is_err());
    }
}
