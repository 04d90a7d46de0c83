use super::{
    CipherConfig, LogConfig, DEFAULT_CACHE_CAPACITY, DEFAULT_CONFIG_FILE_PATH, FG_PREFIX,
};
use crate::error::{ConfigError, Error};
use crate::Args;
use config::{Config, Environment};
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize)]
pub struct FieldGuardConfig {
    pub cipher: CipherConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Path to the JSON column configuration
    pub encrypt_config_path: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "CacheConfig::default_enabled")]
    pub enabled: bool,

    #[serde(default = "CacheConfig::default_capacity")]
    pub capacity: usize,
}

/// Static data scope applied to operations that enable scoping.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScopeConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub name: Option<String>,

    /// JOIN fragment, for example `LEFT JOIN dept d ON d.id = u.dept_id`
    #[serde(default)]
    pub join: Option<String>,

    /// WHERE fragment, without the keyword
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,

    /// Rights an operation must hold for the scope to be applied
    #[serde(default)]
    pub required_rights: Vec<String>,
}

/// Config defaults to a file called `field-guard.toml` in the current directory.
/// Supports TOML and JSON.
/// Variable names should match the struct field names.
///
/// ENV vars can be used to override file settings.
///
/// ENV vars must be prefixed with `FG_`.
///
impl FieldGuardConfig {
    pub fn default_path() -> String {
        DEFAULT_CONFIG_FILE_PATH.to_string()
    }

    pub fn load(args: &Args) -> Result<FieldGuardConfig, Error> {
        // Log a warning to user that config file is missing
        if !PathBuf::from(&args.config_file_path).exists() {
            eprintln!(
                "Configuration file was not found: {}",
                args.config_file_path
            );
            eprintln!("Loading config values from environment variables.");
        }
        let mut config = FieldGuardConfig::build(&args.config_file_path)?;

        // If log level is default, it has not been set by the user in config
        if config.log.level == LogConfig::default_log_level() {
            config.log.level = args.log_level;
        }

        // If log format is default, it has not been set by the user in config
        if config.log.format == LogConfig::default_log_format() {
            config.log.format = args.log_format;
        }

        Ok(config)
    }

    pub fn build(path: &str) -> Result<Self, Error> {
        // For parsing top-level values such as FG_ENCRYPT_CONFIG_PATH
        // and for parsing nested env values such as FG_CIPHER__KEY, FG_SCOPE__ENABLED
        let fg_env_source = Environment::with_prefix(FG_PREFIX)
            .try_parsing(true)
            .separator("__")
            .prefix_separator("_")
            .list_separator(",")
            .with_list_parse_key("scope.required_rights");

        let config: Self = Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(fg_env_source)
            .build()?
            .try_deserialize()
            .map_err(|err| match err {
                config::ConfigError::Message(ref s) => match s {
                    s if s.contains("missing field") => {
                        let mut name = extract_field_name(s).unwrap_or_else(|| "unknown".into());

                        if name == "key" {
                            name = "cipher.key".to_string();
                        }

                        ConfigError::MissingParameter { name }
                    }
                    s if s.contains("does not have variant constructor") => {
                        let (name, value) = extract_invalid_field(s);
                        ConfigError::InvalidParameter { name, value }
                    }
                    _ => err.into(),
                },
                _ => err.into(),
            })?;

        Ok(config)
    }

    pub fn scope_enabled(&self) -> bool {
        self.scope.enabled
    }
}

impl CacheConfig {
    pub fn default_enabled() -> bool {
        true
    }

    pub fn default_capacity() -> usize {
        DEFAULT_CACHE_CAPACITY
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: CacheConfig::default_enabled(),
            capacity: CacheConfig::default_capacity(),
        }
    }
}

///
/// Extracts a field name (if present) from a config::ConfigError::Message
/// This is called in `build` if a ConfigError message contains the string `missing field`
///
fn extract_field_name(input: &str) -> Option<String> {
    let re = Regex::new(r"`(\w+)`").ok()?;
    re.captures(input)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
}

///
/// Extracts a field name (if present) from a config::ConfigError::Message
/// This is called in `build` if a ConfigError message contains the string `does not have variant constructor`
///
/// Error string is `enum {name} does not have variant constructor {value}`
///
fn extract_invalid_field(input: &str) -> (String, String) {
    let words = input.split(' ').collect::<Vec<_>>();

    let default_name = "unknown".to_string();
    let default_val = "".to_string();

    if !input.starts_with("enum") {
        return (default_name, default_val);
    }

    let name = words
        .get(1)
        .map_or(default_name.to_owned(), |w| w.to_string());

    let value = words
        .last()
        .map_or(default_val.to_owned(), |w| w.to_string());

    (name, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ALGORITHM;
    use crate::test_helpers::{with_no_fg_vars, TEST_CONFIG};

    #[test]
    fn loads_test_config() {
        with_no_fg_vars(|| {
            let config = FieldGuardConfig::build(TEST_CONFIG).unwrap();

            assert_eq!(config.cipher.default_algorithm, DEFAULT_ALGORITHM);
            assert!(config.cipher.key.decode().is_ok());
            assert_eq!(
                config.encrypt_config_path.as_deref(),
                Some("tests/config/encrypt-config.json")
            );
            assert!(config.cache.enabled);
            assert_eq!(config.cache.capacity, 64);
            assert!(!config.scope_enabled());
        });
    }

    #[test]
    fn env_overrides_file() {
        with_no_fg_vars(|| {
            temp_env::with_vars(
                [
                    ("FG_SCOPE__ENABLED", Some("true")),
                    ("FG_SCOPE__WHERE", Some("tenant_id = 7")),
                    ("FG_CACHE__CAPACITY", Some("0")),
                ],
                || {
                    let config = FieldGuardConfig::build(TEST_CONFIG).unwrap();
                    assert!(config.scope_enabled());
                    assert_eq!(config.scope.where_clause.as_deref(), Some("tenant_id = 7"));
                    assert_eq!(config.cache.capacity, 0);
                },
            );
        });
    }

    #[test]
    fn required_rights_from_env_list() {
        with_no_fg_vars(|| {
            temp_env::with_vars(
                [("FG_SCOPE__REQUIRED_RIGHTS", Some("read,audit"))],
                || {
                    let config = FieldGuardConfig::build(TEST_CONFIG).unwrap();
                    assert_eq!(config.scope.required_rights, vec!["read", "audit"]);
                },
            );
        });
    }

    #[test]
    fn missing_key_is_reported_by_name() {
        with_no_fg_vars(|| {
            let config = FieldGuardConfig::build("tests/config/field-guard-no-key.toml");

            match config {
                Err(Error::Config(ConfigError::MissingParameter { name })) => {
                    assert_eq!(name, "cipher.key");
                }
                other => panic!("expected a missing parameter error, got {other:?}"),
            }
        });
    }

    #[test]
    fn key_from_env_only() {
        with_no_fg_vars(|| {
            temp_env::with_vars(
                [(
                    "FG_CIPHER__KEY",
                    Some("abababababababababababababababababababababababababababababababab"),
                )],
                || {
                    let config = FieldGuardConfig::build("tests/config/does-not-exist").unwrap();
                    assert_eq!(config.cipher.key.decode().unwrap(), [0xab; 32]);
                    assert!(config.encrypt_config_path.is_none());
                },
            );
        });
    }

    #[test]
    fn extracts_field_names_from_messages() {
        assert_eq!(
            extract_field_name("missing field `key`"),
            Some("key".to_string())
        );
        assert_eq!(
            extract_invalid_field("enum LogFormat does not have variant constructor dEbUG"),
            ("LogFormat".to_string(), "dEbUG".to_string())
        );
        assert_eq!(
            extract_invalid_field("something else"),
            ("unknown".to_string(), "".to_string())
        );
    }
}
