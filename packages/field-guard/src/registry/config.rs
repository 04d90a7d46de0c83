use super::{AlgorithmId, FieldRegistry};
use crate::error::ConfigError;
use crate::log::REGISTRY;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, str::FromStr};
use tracing::debug;

const SUPPORTED_VERSION: u32 = 1;

/// The column configuration document:
///
/// ```json
/// { "v": 1, "tables": { "users": { "email": { "algorithm": "aes-256-gcm-det" } } } }
/// ```
///
/// A column without an `algorithm` uses the default algorithm.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ColumnEncryptionConfig {
    #[serde(rename = "v")]
    pub version: u32,
    pub tables: HashMap<String, HashMap<String, Column>>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct Column {
    #[serde(default)]
    pub algorithm: Option<AlgorithmId>,
}

impl FromStr for ColumnEncryptionConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let config: ColumnEncryptionConfig = serde_json::from_str(data)?;

        if config.version != SUPPORTED_VERSION {
            return Err(ConfigError::UnsupportedEncryptConfigVersion {
                version: config.version,
            });
        }

        Ok(config)
    }
}

impl ColumnEncryptionConfig {
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(HashMap::is_empty)
    }
}

///
/// Table and column key, normalized so that `Users.phoneNumber` and `users.phone_number` are the same column.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub table: String,
    pub column: String,
}

impl Identifier {
    pub fn new(table: &str, column: &str) -> Self {
        Identifier {
            table: normalize(table),
            column: normalize(column),
        }
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

///
/// Column configuration keyed by table name and column name
///
#[derive(Clone, Debug, Default)]
pub struct EncryptConfig {
    columns: HashMap<Identifier, AlgorithmId>,
}

impl EncryptConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_from_config(
        config: ColumnEncryptionConfig,
        default_algorithm: &AlgorithmId,
    ) -> Self {
        let columns = config
            .tables
            .into_iter()
            .flat_map(|(table, columns)| {
                columns.into_iter().map(move |(column, config)| {
                    let algorithm = config
                        .algorithm
                        .unwrap_or_else(|| default_algorithm.clone());
                    (Identifier::new(&table, &column), algorithm)
                })
            })
            .collect();

        Self { columns }
    }

    pub fn load_file(path: &str, default_algorithm: &AlgorithmId) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::EncryptConfigFile {
            path: path.to_string(),
            source,
        })?;

        let config = ColumnEncryptionConfig::from_str(&data)?;
        let encrypt_config = Self::new_from_config(config, default_algorithm);

        debug!(
            target: REGISTRY,
            msg = "Loaded encrypt configuration",
            path,
            columns = encrypt_config.len()
        );

        Ok(encrypt_config)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn insert(&mut self, table: &str, column: &str, algorithm: AlgorithmId) {
        self.columns.insert(Identifier::new(table, column), algorithm);
    }

    pub fn get(&self, identifier: &Identifier) -> Option<&AlgorithmId> {
        self.columns.get(identifier)
    }
}

impl FieldRegistry for EncryptConfig {
    fn algorithm_for(&self, table: &str, column: &str) -> Option<AlgorithmId> {
        self.get(&Identifier::new(table, column)).cloned()
    }
}
