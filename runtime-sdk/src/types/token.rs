//! Token types.
use std::fmt;

use crate::event::AttributeValue;

/// Name/type of the token.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, cbor::Encode, cbor::Decode)]
#[cbor(transparent)]
pub struct Denomination(String);

impl Denomination {
    /// Maximum length of a denomination.
    pub const MAX_LENGTH: usize = 128;

    /// Denomination name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for Denomination {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for Denomination {
    fn from(v: &str) -> Denomination {
        Denomination(v.to_owned())
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token amount of given denomination in base units.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, cbor::Encode, cbor::Decode)]
pub struct BaseUnits {
    pub amount: u128,
    pub denomination: Denomination,
}

impl BaseUnits {
    /// Creates a new token amount of the given denomination.
    pub fn new(amount: u128, denomination: Denomination) -> Self {
        BaseUnits {
            amount,
            denomination,
        }
    }

    /// Token amount in base units.
    pub fn amount(&self) -> u128 {
        self.amount
    }

    /// Denomination of the token amount.
    pub fn denomination(&self) -> &Denomination {
        &self.denomination
    }
}

impl fmt::Display for BaseUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denomination)
    }
}

impl AttributeValue for BaseUnits {
    fn to_attribute_value(&self) -> String {
        self.to_string()
    }
}

impl AttributeValue for [BaseUnits] {
    fn to_attribute_value(&self) -> String {
        self.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl AttributeValue for Vec<BaseUnits> {
    fn to_attribute_value(&self) -> String {
        self.as_slice().to_attribute_value()
    }
}
