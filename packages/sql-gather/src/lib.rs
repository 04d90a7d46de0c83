//! `sql-gather` recovers, from raw parameterized SQL text, which column each positional `?` placeholder binds to.
//!
//! It works on tokens rather than a syntax tree: statements it does not fully understand still produce a usable,
//! partial [`SqlGather`].

mod analyzer;
mod boundaries;
mod keywords;
mod model;
pub mod scanner;
mod tables;
mod tokens;

#[cfg(test)]
mod test_helpers;

pub use analyzer::analyze;
pub use boundaries::*;
pub use model::*;
pub use scanner::normalize;

/// Tracing target for analysis diagnostics.
pub const MAPPER: &str = "mapper";
