//! Module that contains known test accounts.

/// Define a test key.
macro_rules! test_key {
    ($doc:expr, $name:ident) => {
        #[doc=" Test account "]
        #[doc=$doc]
        #[doc="."]
        pub mod $name {
            use crate::types::address::Address;

            #[doc=" Test address "]
            #[doc=$doc]
            #[doc="."]
            pub fn address() -> Address {
                Address::from_module("testing", stringify!($name))
            }
        }
    };
}

test_key!("A", alice);
test_key!("B", bob);
test_key!("C", charlie);
test_key!("D", dave);
