use super::{AlgorithmId, EncryptConfig, FieldRegistry};
use crate::{config::FieldGuardConfig, error::Error, log::REGISTRY};
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::{debug, info, warn};

///
/// Holds the current [`EncryptConfig`] and swaps in a new one on reload.
///
/// Readers never block: every lookup works against the snapshot that was current when it started.
///
#[derive(Clone, Debug)]
pub struct EncryptConfigManager {
    path: Option<String>,
    default_algorithm: AlgorithmId,
    encrypt_config: Arc<ArcSwap<EncryptConfig>>,
}

impl EncryptConfigManager {
    pub fn init(config: &FieldGuardConfig) -> Result<Self, Error> {
        let default_algorithm = AlgorithmId::new(&config.cipher.default_algorithm);
        let path = config.encrypt_config_path.clone();

        let encrypt_config = match &path {
            Some(path) => EncryptConfig::load_file(path, &default_algorithm)?,
            None => EncryptConfig::new(),
        };

        if encrypt_config.is_empty() {
            warn!(target: REGISTRY, msg = "ENCRYPT CONFIGURATION NOT LOADED");
            warn!(target: REGISTRY, msg = "No encrypted columns are configured");
            warn!(target: REGISTRY, msg = "Data is not protected with encryption");
        } else {
            info!(
                target: REGISTRY,
                msg = "Loaded encrypt configuration",
                columns = encrypt_config.len()
            );
        }

        Ok(Self::new(encrypt_config, default_algorithm, path))
    }

    pub fn new(
        encrypt_config: EncryptConfig,
        default_algorithm: AlgorithmId,
        path: Option<String>,
    ) -> Self {
        EncryptConfigManager {
            path,
            default_algorithm,
            encrypt_config: Arc::new(ArcSwap::new(Arc::new(encrypt_config))),
        }
    }

    pub fn load(&self) -> Arc<EncryptConfig> {
        self.encrypt_config.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.encrypt_config.load().is_empty()
    }

    pub fn swap(&self, encrypt_config: EncryptConfig) {
        self.encrypt_config.store(Arc::new(encrypt_config));
    }

    /// Re-reads the configuration file. On failure the current configuration stays in place.
    pub fn reload(&self) {
        let Some(path) = &self.path else {
            debug!(target: REGISTRY, msg = "No encrypt configuration path to reload from");
            return;
        };

        match EncryptConfig::load_file(path, &self.default_algorithm) {
            Ok(reloaded) => {
                debug!(
                    target: REGISTRY,
                    msg = "Reloaded encrypt configuration",
                    columns = reloaded.len()
                );
                self.swap(reloaded);
            }
            Err(err) => {
                warn!(
                    target: REGISTRY,
                    msg = "Error reloading encrypt configuration",
                    error = err.to_string()
                );
            }
        }
    }
}

impl FieldRegistry for EncryptConfigManager {
    fn algorithm_for(&self, table: &str, column: &str) -> Option<AlgorithmId> {
        self.encrypt_config.load().algorithm_for(table, column)
    }
}
