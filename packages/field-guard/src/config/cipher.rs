use super::DEFAULT_ALGORITHM;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt::{self, Debug};

/// Length in bytes of the master key.
pub const KEY_LENGTH: usize = 32;

#[derive(Clone, Debug, Deserialize)]
pub struct CipherConfig {
    /// Hex-encoded master key
    pub key: KeyMaterial,

    #[serde(default = "CipherConfig::default_algorithm")]
    pub default_algorithm: String,
}

impl CipherConfig {
    pub fn new(key: impl Into<String>) -> Self {
        CipherConfig {
            key: KeyMaterial(key.into()),
            default_algorithm: CipherConfig::default_algorithm(),
        }
    }

    pub fn default_algorithm() -> String {
        DEFAULT_ALGORITHM.to_string()
    }
}

/// Secret key material as configured.
///
/// The value never appears in `Debug` output, so configuration can be logged safely.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    pub fn decode(&self) -> Result<[u8; KEY_LENGTH], ConfigError> {
        let bytes = hex::decode(self.0.trim())?;
        let received = bytes.len();

        bytes
            .try_into()
            .map_err(|_| ConfigError::InvalidKeyLength {
                expected: KEY_LENGTH,
                received,
            })
    }
}

impl Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}
