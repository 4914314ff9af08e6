//! Runtime types.
pub mod address;
pub mod token;
