//! Permission model for code upload and instantiation.
use std::{collections::BTreeSet, fmt};

use wasmd_runtime_sdk::{event::AttributeValue, types::address::Address};

use crate::Error;

/// Permission kind, without any addresses attached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, cbor::Encode, cbor::Decode)]
#[repr(u8)]
pub enum AccessType {
    #[default]
    Unspecified = 0,
    Nobody = 1,
    OnlyAddress = 2,
    Everybody = 3,
    AnyOfAddresses = 4,
}

impl AccessType {
    /// Expand the access type into a full configuration granting the given actor.
    ///
    /// Used to derive the instantiate permission of uploaded code from the default permission
    /// when the uploader did not specify one.
    pub fn with_actor(self, actor: Address) -> Result<AccessConfig, Error> {
        match self {
            AccessType::Unspecified => Err(Error::InvalidPermission("unspecified access type".into())),
            AccessType::Nobody => Ok(AccessConfig::Nobody),
            AccessType::OnlyAddress => Ok(AccessConfig::OnlyAddress(actor)),
            AccessType::Everybody => Ok(AccessConfig::Everybody),
            AccessType::AnyOfAddresses => Ok(AccessConfig::AnyOfAddresses(vec![actor])),
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessType::Unspecified => "Unspecified",
            AccessType::Nobody => "Nobody",
            AccessType::OnlyAddress => "OnlyAddress",
            AccessType::Everybody => "Everybody",
            AccessType::AnyOfAddresses => "AnyOfAddresses",
        };
        f.write_str(name)
    }
}

/// A permission descriptor that specifies who is allowed to perform an action.
#[derive(Clone, Debug, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub enum AccessConfig {
    #[cbor(rename = "nobody", as_struct)]
    Nobody,

    #[cbor(rename = "everybody", as_struct)]
    Everybody,

    #[cbor(rename = "only_address")]
    OnlyAddress(Address),

    #[cbor(rename = "any_of_addresses")]
    AnyOfAddresses(Vec<Address>),
}

impl AccessConfig {
    /// Build a configuration from its flattened wire form (a discriminant plus address fields).
    ///
    /// Rejects field combinations that do not belong to the given access type.
    pub fn from_parts(
        permission: AccessType,
        address: Option<Address>,
        addresses: Vec<Address>,
    ) -> Result<Self, Error> {
        let config = match (permission, address) {
            (AccessType::Unspecified, _) => {
                return Err(Error::InvalidPermission("unspecified access type".into()))
            }
            (AccessType::Nobody | AccessType::Everybody, Some(_)) => {
                return Err(Error::InvalidPermission("address not allowed for this type".into()))
            }
            (AccessType::Nobody | AccessType::Everybody, None) if !addresses.is_empty() => {
                return Err(Error::InvalidPermission("addresses not allowed for this type".into()))
            }
            (AccessType::Nobody, None) => AccessConfig::Nobody,
            (AccessType::Everybody, None) => AccessConfig::Everybody,
            (AccessType::OnlyAddress, _) if !addresses.is_empty() => {
                return Err(Error::InvalidPermission("addresses not allowed for this type".into()))
            }
            (AccessType::OnlyAddress, address) => AccessConfig::OnlyAddress(
                address.ok_or_else(|| Error::InvalidPermission("missing address".into()))?,
            ),
            (AccessType::AnyOfAddresses, Some(_)) => {
                return Err(Error::InvalidPermission("address not allowed for this type".into()))
            }
            (AccessType::AnyOfAddresses, None) => AccessConfig::AnyOfAddresses(addresses),
        };

        config.validate()?;
        Ok(config)
    }

    /// Access type of this configuration.
    pub fn access_type(&self) -> AccessType {
        match self {
            AccessConfig::Nobody => AccessType::Nobody,
            AccessConfig::Everybody => AccessType::Everybody,
            AccessConfig::OnlyAddress(_) => AccessType::OnlyAddress,
            AccessConfig::AnyOfAddresses(_) => AccessType::AnyOfAddresses,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            AccessConfig::Nobody | AccessConfig::Everybody => Ok(()),
            AccessConfig::OnlyAddress(address) => validate_address(address),
            AccessConfig::AnyOfAddresses(addresses) => {
                if addresses.is_empty() {
                    return Err(Error::InvalidPermission("empty address list".into()));
                }

                let mut seen = BTreeSet::new();
                for address in addresses {
                    validate_address(address)?;
                    if !seen.insert(address) {
                        return Err(Error::InvalidPermission(format!(
                            "duplicate address: {}",
                            address
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    /// Whether the given actor is allowed to perform the action.
    pub fn allowed(&self, actor: &Address) -> bool {
        match self {
            // Nobody is allowed to perform the action.
            AccessConfig::Nobody => false,
            // Only the given address is allowed to perform the action.
            AccessConfig::OnlyAddress(address) => address == actor,
            // Any of the given addresses is allowed to perform the action.
            AccessConfig::AnyOfAddresses(addresses) => addresses.contains(actor),
            // Anyone is allowed to perform the action.
            AccessConfig::Everybody => true,
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        AccessConfig::Everybody
    }
}

impl AttributeValue for AccessConfig {
    fn to_attribute_value(&self) -> String {
        self.access_type().to_string()
    }
}

fn validate_address(address: &Address) -> Result<(), Error> {
    if address == &Address::default() {
        return Err(Error::InvalidPermission("empty address".into()));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use wasmd_runtime_sdk::testing::keys;

    use super::*;

    #[test]
    fn test_allowed() {
        let everyone = [
            keys::alice::address(),
            keys::bob::address(),
            keys::charlie::address(),
        ];
        for actor in &everyone {
            assert!(!AccessConfig::Nobody.allowed(actor));
            assert!(AccessConfig::Everybody.allowed(actor));
        }

        let only_alice = AccessConfig::OnlyAddress(keys::alice::address());
        assert!(only_alice.allowed(&keys::alice::address()));
        assert!(!only_alice.allowed(&keys::bob::address()));

        let any = AccessConfig::AnyOfAddresses(vec![keys::alice::address(), keys::bob::address()]);
        assert!(any.allowed(&keys::alice::address()));
        assert!(any.allowed(&keys::bob::address()));
        assert!(!any.allowed(&keys::charlie::address()));
    }

    #[test]
    fn test_validate() {
        assert!(AccessConfig::Nobody.validate().is_ok());
        assert!(AccessConfig::Everybody.validate().is_ok());
        assert!(AccessConfig::OnlyAddress(keys::alice::address())
            .validate()
            .is_ok());
        assert!(matches!(
            AccessConfig::OnlyAddress(Address::default()).validate(),
            Err(Error::InvalidPermission(_))
        ));
        assert!(matches!(
            AccessConfig::AnyOfAddresses(vec![]).validate(),
            Err(Error::InvalidPermission(_))
        ));
        assert!(matches!(
            AccessConfig::AnyOfAddresses(vec![keys::alice::address(), keys::alice::address()])
                .validate(),
            Err(Error::InvalidPermission(_))
        ));
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(
            AccessConfig::from_parts(AccessType::Everybody, None, vec![]).unwrap(),
            AccessConfig::Everybody
        );
        assert_eq!(
            AccessConfig::from_parts(AccessType::OnlyAddress, Some(keys::bob::address()), vec![])
                .unwrap(),
            AccessConfig::OnlyAddress(keys::bob::address())
        );

        // Obsolete address fields on unrestricted variants.
        assert!(
            AccessConfig::from_parts(AccessType::Everybody, Some(keys::bob::address()), vec![])
                .is_err()
        );
        assert!(
            AccessConfig::from_parts(AccessType::Nobody, None, vec![keys::bob::address()])
                .is_err()
        );
        assert!(AccessConfig::from_parts(AccessType::Unspecified, None, vec![]).is_err());
        assert!(AccessConfig::from_parts(AccessType::OnlyAddress, None, vec![]).is_err());
        assert!(AccessConfig::from_parts(
            AccessType::AnyOfAddresses,
            None,
            vec![keys::bob::address(), keys::bob::address()]
        )
        .is_err());
    }

    #[test]
    fn test_with_actor() {
        let actor = keys::dave::address();
        assert_eq!(
            AccessType::OnlyAddress.with_actor(actor).unwrap(),
            AccessConfig::OnlyAddress(actor)
        );
        assert_eq!(
            AccessType::AnyOfAddresses.with_actor(actor).unwrap(),
            AccessConfig::AnyOfAddresses(vec![actor])
        );
        assert!(AccessType::Unspecified.with_actor(actor).is_err());
    }

    #[test]
    fn test_attribute_value() {
        assert_eq!(AccessConfig::Everybody.to_attribute_value(), "Everybody");
        assert_eq!(
            AccessConfig::OnlyAddress(keys::alice::address()).to_attribute_value(),
            "OnlyAddress"
        );
    }
}
