//! Which columns are encrypted, and with which algorithm.

mod config;
mod manager;

pub use config::{ColumnEncryptionConfig, EncryptConfig, Identifier};
pub use manager::EncryptConfigManager;

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Names a [`Cipher`](crate::cipher::Cipher) in a [`CipherSuite`](crate::cipher::CipherSuite).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmId(String);

impl AlgorithmId {
    pub fn new(name: impl Into<String>) -> Self {
        AlgorithmId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlgorithmId {
    fn from(name: &str) -> Self {
        AlgorithmId::new(name)
    }
}

/// Answers whether `table.column` is encrypted.
///
/// Implementations decide how forgiving they are about naming. Callers try the column as written, in snake_case and
/// in camelCase (see [`column_variants`]) before concluding a column is not encrypted.
pub trait FieldRegistry: Send + Sync {
    fn algorithm_for(&self, table: &str, column: &str) -> Option<AlgorithmId>;

    fn is_encrypted(&self, table: &str, column: &str) -> bool {
        self.algorithm_for(table, column).is_some()
    }
}

/// The column as written, then its snake_case and camelCase forms, without duplicates.
pub fn column_variants(column: &str) -> Vec<String> {
    let mut variants = vec![column.to_string()];
    for variant in [column.to_case(Case::Snake), column.to_case(Case::Camel)] {
        if !variants.contains(&variant) {
            variants.push(variant);
        }
    }
    variants
}
