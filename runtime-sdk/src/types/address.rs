//! Account address type.
use std::{convert::TryFrom, fmt};

use bech32::{self, FromBase32, ToBase32, Variant};
use digest::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::event::AttributeValue;

const ADDRESS_SIZE: usize = 20;

/// V0 address version.
pub const ADDRESS_V0_VERSION: u8 = 0;
/// V0 module address context.
pub const ADDRESS_V0_MODULE_CONTEXT: &[u8] = b"wasmd-runtime-sdk/address: module";

/// Human readable part for Bech32-encoded addresses.
pub const ADDRESS_BECH32_HRP: &str = "link";

/// Error.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("malformed address")]
    MalformedAddress,
}

/// An account address.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// Size of an address in bytes.
    pub const SIZE: usize = ADDRESS_SIZE;

    /// Creates a new address from a context, version and data.
    pub fn new(ctx: &'static [u8], version: u8, data: &[u8]) -> Self {
        let h = Sha256::new()
            .chain_update(ctx)
            .chain_update([version])
            .chain_update(data)
            .finalize();

        let mut a = [0; ADDRESS_SIZE];
        a.copy_from_slice(&h[..ADDRESS_SIZE]);

        Address(a)
    }

    /// Tries to create a new address from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if data.len() != ADDRESS_SIZE {
            return Err(Error::MalformedAddress);
        }

        let mut a = [0; ADDRESS_SIZE];
        a.copy_from_slice(data);

        Ok(Address(a))
    }

    /// Convert the address into raw bytes.
    pub fn into_bytes(self) -> [u8; ADDRESS_SIZE] {
        self.0
    }

    /// Creates a new address for a specific module and kind.
    pub fn from_module(module: &str, kind: &str) -> Self {
        Address::from_module_raw(module, kind.as_bytes())
    }

    /// Creates a new address for a specific module and raw kind.
    pub fn from_module_raw(module: &str, kind: &[u8]) -> Self {
        Address::new(
            ADDRESS_V0_MODULE_CONTEXT,
            ADDRESS_V0_VERSION,
            &[module.as_bytes(), b".", kind].concat(),
        )
    }

    /// Tries to create a new address from Bech32-encoded string.
    pub fn from_bech32(data: &str) -> Result<Self, Error> {
        let (hrp, data, variant) = bech32::decode(data).map_err(|_| Error::MalformedAddress)?;
        if hrp != ADDRESS_BECH32_HRP {
            return Err(Error::MalformedAddress);
        }
        if variant != Variant::Bech32 {
            return Err(Error::MalformedAddress);
        }
        let data: Vec<u8> = FromBase32::from_base32(&data).map_err(|_| Error::MalformedAddress)?;

        Address::from_bytes(&data)
    }

    /// Converts an address to Bech32 representation.
    pub fn to_bech32(self) -> String {
        // Encoding can only fail on an invalid human readable part, which is a constant.
        bech32::encode(ADDRESS_BECH32_HRP, self.0.to_base32(), Variant::Bech32)
            .unwrap_or_default()
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in &self.0[..] {
            write!(f, "{:02x}", i)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bech32())?;
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bech32())?;
        Ok(())
    }
}

impl AttributeValue for Address {
    fn to_attribute_value(&self) -> String {
        self.to_bech32()
    }
}

impl slog::Value for Address {
    fn serialize(
        &self,
        _record: &slog::Record<'_>,
        key: slog::Key,
        serializer: &mut dyn slog::Serializer,
    ) -> slog::Result {
        serializer.emit_str(key, &self.to_bech32())
    }
}

impl cbor::Encode for Address {
    fn into_cbor_value(self) -> cbor::Value {
        cbor::Value::ByteString(self.as_ref().to_vec())
    }
}

impl cbor::Decode for Address {
    fn try_from_cbor_value(value: cbor::Value) -> Result<Self, cbor::DecodeError> {
        match value {
            cbor::Value::ByteString(data) => {
                Self::from_bytes(&data).map_err(|_| cbor::DecodeError::UnexpectedType)
            }
            _ => Err(cbor::DecodeError::UnexpectedType),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_address_bech32_roundtrip() {
        let addr = Address::from_module("testing", "alice");
        let encoded = addr.to_bech32();
        assert!(encoded.starts_with("link1"));
        assert_eq!(Address::from_bech32(&encoded).unwrap(), addr);
    }

    #[test]
    fn test_address_from_module_is_deterministic() {
        assert_eq!(
            Address::from_module_raw("wasm", &[1, 2, 3]),
            Address::from_module_raw("wasm", &[1, 2, 3]),
        );
        assert_ne!(
            Address::from_module_raw("wasm", &[1, 2, 3]),
            Address::from_module_raw("wasm", &[1, 2, 4]),
        );
    }

    #[test]
    fn test_address_try_from_bytes() {
        let bytes_fixture = vec![42u8; ADDRESS_SIZE + 1];
        assert_eq!(
            Address::try_from(&bytes_fixture[0..ADDRESS_SIZE]).unwrap(),
            Address::from_bytes(&bytes_fixture[0..ADDRESS_SIZE]).unwrap()
        );
        assert!(matches!(
            Address::try_from(bytes_fixture.as_slice()).unwrap_err(),
            Error::MalformedAddress
        ));
    }

    #[test]
    fn test_address_from_bech32_invalid_hrp() {
        let encoded = bech32::encode("oasis", [7u8; ADDRESS_SIZE].to_base32(), Variant::Bech32)
            .unwrap();
        assert_eq!(
            Address::from_bech32(&encoded).unwrap_err(),
            Error::MalformedAddress,
        );
    }

    #[test]
    fn test_address_from_bech32_invalid_length() {
        let encoded = bech32::encode(ADDRESS_BECH32_HRP, [7u8; 32].to_base32(), Variant::Bech32)
            .unwrap();
        assert_eq!(
            Address::from_bech32(&encoded).unwrap_err(),
            Error::MalformedAddress,
        );
        assert_eq!(
            Address::from_bech32("link1invalid").unwrap_err(),
            Error::MalformedAddress,
        );
    }
}
