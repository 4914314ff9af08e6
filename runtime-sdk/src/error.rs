//! Error types for runtimes.

/// A runtime error that gets propagated to the caller.
///
/// It extends `std::error::Error` with module name and error code so that errors can be easily
/// serialized and transferred between different nodes.
///
/// This trait can be derived:
/// ```
/// # use wasmd_runtime_sdk::{self as sdk};
/// const MODULE_NAME: &str = "my-module";
///
/// #[derive(Debug, thiserror::Error, sdk::Error)]
/// enum Error {
///    #[error("invalid argument")]
///    #[sdk_error(code = 1)]
///    InvalidArgument,
///
///    #[error("core: {0}")]
///    #[sdk_error(transparent)]
///    Core(#[from] sdk::modules::core::Error),
/// }
/// ```
pub trait Error: std::error::Error {
    /// Name of the module that emitted the error.
    fn module_name(&self) -> &str;

    /// Error code uniquely identifying the error.
    fn code(&self) -> u32;

    /// Converts the error into a failure description that can be reported to the caller.
    fn to_failure(&self) -> Failure {
        Failure {
            module: self.module_name().to_owned(),
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Description of a failed call.
#[derive(Clone, Debug, Default, PartialEq, Eq, cbor::Encode, cbor::Decode)]
pub struct Failure {
    pub module: String,
    pub code: u32,
    #[cbor(optional)]
    pub message: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_failure_decode() {
        let failure = Failure {
            module: "test".to_owned(),
            code: 1,
            message: "".to_owned(),
        };
        // An empty message is omitted from the encoding.
        let decoded: Failure = cbor::from_slice(&cbor::to_vec(failure.clone())).unwrap();
        assert_eq!(decoded, failure);
    }
}
