//! Runtime modules included with the SDK.

pub mod accounts;
pub mod core;
