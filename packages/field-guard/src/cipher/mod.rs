mod aes_gcm;

pub use aes_gcm::DeterministicAesGcm;

use crate::{
    config::CipherConfig,
    error::{ConfigError, DecryptError, EncryptError},
    log::CONFIG,
    registry::AlgorithmId,
};
use std::{collections::HashMap, fmt::Debug, sync::Arc};
use tracing::debug;

/// Literal prepended to every ciphertext written by field-guard.
pub const MARKER_PREFIX: &str = "ENC:";

///
/// A named encryption algorithm.
///
/// Ciphertext returned by `encrypt` is text without the marker prefix.
/// Callers add and strip the marker with [`mark`] and [`strip_marker`].
///
pub trait Cipher: Send + Sync + Debug {
    fn algorithm(&self) -> &AlgorithmId;

    fn encrypt(&self, plaintext: &str) -> Result<String, EncryptError>;

    fn decrypt(&self, ciphertext: &str) -> Result<String, DecryptError>;
}

pub fn is_marked(value: &str) -> bool {
    value.starts_with(MARKER_PREFIX)
}

pub fn mark(ciphertext: &str) -> String {
    format!("{MARKER_PREFIX}{ciphertext}")
}

pub fn strip_marker(value: &str) -> Option<&str> {
    value.strip_prefix(MARKER_PREFIX)
}

///
/// The ciphers available to an operation, keyed by algorithm.
///
#[derive(Clone, Debug)]
pub struct CipherSuite {
    ciphers: HashMap<AlgorithmId, Arc<dyn Cipher>>,
    default_algorithm: AlgorithmId,
}

impl CipherSuite {
    pub fn new(default: Arc<dyn Cipher>) -> Self {
        let default_algorithm = default.algorithm().clone();
        let mut ciphers = HashMap::new();
        ciphers.insert(default_algorithm.clone(), default);

        CipherSuite {
            ciphers,
            default_algorithm,
        }
    }

    ///
    /// Builds the built-in ciphers from the configured master key.
    ///
    /// Fails if the key is malformed or the configured default names an algorithm that is not built in.
    ///
    pub fn from_config(config: &CipherConfig) -> Result<Self, ConfigError> {
        let key = config.key.decode()?;
        let cipher = DeterministicAesGcm::new(&key)?;

        let mut suite = CipherSuite::new(Arc::new(cipher));

        let default_algorithm = AlgorithmId::new(&config.default_algorithm);
        if !suite.contains(&default_algorithm) {
            return Err(ConfigError::UnknownDefaultAlgorithm {
                algorithm: config.default_algorithm.to_owned(),
            });
        }
        suite.default_algorithm = default_algorithm;

        debug!(
            target: CONFIG,
            msg = "Cipher suite ready",
            default_algorithm = %suite.default_algorithm
        );

        Ok(suite)
    }

    /// Adds a cipher, replacing any cipher registered for the same algorithm.
    pub fn register(&mut self, cipher: Arc<dyn Cipher>) {
        self.ciphers.insert(cipher.algorithm().clone(), cipher);
    }

    pub fn get(&self, algorithm: &AlgorithmId) -> Option<&Arc<dyn Cipher>> {
        self.ciphers.get(algorithm)
    }

    pub fn contains(&self, algorithm: &AlgorithmId) -> bool {
        self.ciphers.contains_key(algorithm)
    }

    pub fn default_algorithm(&self) -> &AlgorithmId {
        &self.default_algorithm
    }

    pub fn default_cipher(&self) -> Option<&Arc<dyn Cipher>> {
        self.get(&self.default_algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ALGORITHM;
    use crate::test_helpers::TEST_KEY;

    #[derive(Debug)]
    struct Reverse(AlgorithmId);

    impl Cipher for Reverse {
        fn algorithm(&self) -> &AlgorithmId {
            &self.0
        }

        fn encrypt(&self, plaintext: &str) -> Result<String, EncryptError> {
            Ok(plaintext.chars().rev().collect())
        }

        fn decrypt(&self, ciphertext: &str) -> Result<String, DecryptError> {
            Ok(ciphertext.chars().rev().collect())
        }
    }

    #[test]
    fn marker_helpers() {
        assert_eq!(mark("abc"), "ENC:abc");
        assert!(is_marked("ENC:abc"));
        assert!(!is_marked("enc:abc"));
        assert_eq!(strip_marker("ENC:abc"), Some("abc"));
        assert_eq!(strip_marker("abc"), None);
    }

    #[test]
    fn suite_from_config() {
        let suite = CipherSuite::from_config(&CipherConfig::new(TEST_KEY)).unwrap();

        assert_eq!(suite.default_algorithm().as_str(), DEFAULT_ALGORITHM);
        assert!(suite.default_cipher().is_some());
    }

    #[test]
    fn unknown_default_algorithm_is_a_config_error() {
        let mut config = CipherConfig::new(TEST_KEY);
        config.default_algorithm = "rot13".into();

        let err = CipherSuite::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDefaultAlgorithm { .. }));
    }

    #[test]
    fn registered_ciphers_are_found_by_algorithm() {
        let mut suite = CipherSuite::from_config(&CipherConfig::new(TEST_KEY)).unwrap();
        suite.register(Arc::new(Reverse("reverse".into())));

        let cipher = suite.get(&"reverse".into()).unwrap();
        assert_eq!(cipher.encrypt("abc").unwrap(), "cba");
        assert!(suite.get(&"missing".into()).is_none());
        assert_eq!(suite.default_algorithm().as_str(), DEFAULT_ALGORITHM);
    }
}
