//! Event types for runtimes.
use std::fmt;

/// A key/value attribute attached to an emitted event.
#[derive(Clone, Debug, Default, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An event as recorded in the event log of the enclosing transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub struct EmittedEvent {
    /// Name of the module that emitted the event.
    pub module: String,
    /// Module-specific event code.
    pub code: u32,
    /// Event type, e.g. `store_code`.
    pub kind: String,
    /// Ordered event attributes.
    pub attributes: Vec<Attribute>,
}

impl EmittedEvent {
    /// Create a new event.
    pub fn new<M: Into<String>, K: Into<String>>(
        module: M,
        code: u32,
        kind: K,
        attributes: Vec<Attribute>,
    ) -> Self {
        Self {
            module: module.into(),
            code,
            kind: kind.into(),
            attributes,
        }
    }

    /// Value of the first attribute with the given key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }

    /// Ordered list of attribute keys.
    pub fn attribute_keys(&self) -> Vec<&str> {
        self.attributes.iter().map(|attr| attr.key.as_str()).collect()
    }
}

/// A value that can be rendered as an event attribute value.
pub trait AttributeValue {
    /// Canonical string representation of the value.
    fn to_attribute_value(&self) -> String;
}

impl<T: AttributeValue + ?Sized> AttributeValue for &T {
    fn to_attribute_value(&self) -> String {
        T::to_attribute_value(self)
    }
}

impl<T: AttributeValue> AttributeValue for Option<T> {
    fn to_attribute_value(&self) -> String {
        self.as_ref()
            .map(AttributeValue::to_attribute_value)
            .unwrap_or_default()
    }
}

impl AttributeValue for str {
    fn to_attribute_value(&self) -> String {
        self.to_owned()
    }
}

impl AttributeValue for String {
    fn to_attribute_value(&self) -> String {
        self.clone()
    }
}

macro_rules! impl_attribute_value_display {
    ($($ty:ty),*) => {
        $(
            impl AttributeValue for $ty {
                fn to_attribute_value(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_attribute_value_display!(bool, u8, u16, u32, u64, u128);

/// An event emitted by the runtime.
///
/// This trait can be derived:
/// ```
/// # use wasmd_runtime_sdk::{self as sdk};
/// const MODULE_NAME: &str = "my-module";
///
/// #[derive(Debug, sdk::Event)]
/// enum Event {
///    #[sdk_event(code = 1, kind = "greeting")]
///    Greeting {
///        #[sdk_event(key = "_recipient")]
///        recipient: String,
///        plural: bool,
///    },
/// }
/// ```
pub trait Event {
    /// Name of the module that emitted the event.
    fn module_name() -> &'static str;

    /// Code uniquely identifying the event.
    fn code(&self) -> u32;

    /// Event type.
    fn kind(&self) -> &'static str;

    /// Ordered event attributes.
    fn attributes(&self) -> Vec<Attribute>;

    /// Converts the event into its emitted form.
    fn into_emitted(self) -> EmittedEvent
    where
        Self: Sized,
    {
        EmittedEvent {
            module: Self::module_name().to_owned(),
            code: self.code(),
            kind: self.kind().to_owned(),
            attributes: self.attributes(),
        }
    }
}

impl fmt::Display for EmittedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for attr in &self.attributes {
            write!(f, " {}={}", attr.key, attr.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_emitted_event_decode() {
        let event = EmittedEvent::new(
            "test",
            1,
            "stored",
            vec![Attribute::new("key", "value")],
        );
        let decoded: EmittedEvent = cbor::from_slice(&cbor::to_vec(event.clone())).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.to_string(), "stored key=value");
    }
}
