use crate::config::LogLevel;

// Define all log targets in one place
macro_rules! define_log_targets {
    ($(($const_name:ident, $field_name:ident, $target_str:literal)),* $(,)?) => {
        $(
            pub const $const_name: &str = $target_str;
        )*

        pub fn log_targets() -> Vec<&'static str> {
            vec![
                $(
                    $const_name,
                )*
            ]
        }

        pub fn log_level_for(config: &crate::config::LogConfig, target: &str) -> LogLevel {
            match target {
                $(
                    $const_name => config.$field_name,
                )*
                _ => config.level,
            }
        }

        // Fails to compile if LogConfig is missing a target level field
        pub const fn validate_log_config_fields() {
            use crate::config::LogConfig;

            let _config = LogConfig {
                ansi_enabled: true,
                format: crate::config::LogFormat::Pretty,
                output: crate::config::LogOutput::Stdout,
                level: LogLevel::Info,
                $(
                    $field_name: LogLevel::Info,
                )*
            };
        }

        // NOTE: LogConfig fields in config/log.rs must be kept in sync with the targets defined here.
        //
        // When adding a new target (NEWTARGET, new_target_level, "new_target"):
        // 1. Add the target to the define_log_targets! invocation below
        // 2. Add the field to LogConfig in config/log.rs:
        //    #[serde(default = "LogConfig::default_log_level")]
        //    pub new_target_level: LogLevel,
        // 3. Assign it in LogConfig::with_level
    };
}

define_log_targets!(
    (DEVELOPMENT, development_level, "development"),
    (CONFIG, config_level, "config"),
    (CONTEXT, context_level, "context"),
    (ENCRYPT, encrypt_level, "encrypt"),
    (DECRYPT, decrypt_level, "decrypt"),
    (MAPPER, mapper_level, "mapper"),
    (REGISTRY, registry_level, "registry"),
    (SCOPE, scope_level, "scope"),
);

const _: () = validate_log_config_fields();
