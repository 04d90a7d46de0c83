mod cipher;
mod field_guard;
mod log;

pub use cipher::{CipherConfig, KeyMaterial, KEY_LENGTH};
pub use field_guard::{CacheConfig, FieldGuardConfig, ScopeConfig};
pub use log::{LogConfig, LogFormat, LogLevel, LogOutput};

pub const FG_PREFIX: &str = "FG";
pub const DEFAULT_CONFIG_FILE_PATH: &str = "field-guard.toml";
pub const DEFAULT_ALGORITHM: &str = "aes-256-gcm-det";
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;
