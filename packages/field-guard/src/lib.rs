//! Transparent column encryption and row-level data scoping for parameterized SQL.
//!
//! A host calls the [`Interceptor`] hooks around statement execution. Parameters bound to encrypted columns are
//! encrypted before the statement runs and restored afterwards, result rows are decrypted once materialized, and a
//! data scope can be spliced into the statement as extra JOIN and WHERE fragments.

pub mod cache;
pub mod cipher;
pub mod cli;
pub mod config;
pub mod decryptor;
pub mod error;
pub mod interceptor;
pub mod log;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod scope;

pub use crate::cli::Args;
pub use crate::config::FieldGuardConfig;
pub use crate::interceptor::Interceptor;
pub use crate::log::init;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
pub(crate) mod test_helpers;
