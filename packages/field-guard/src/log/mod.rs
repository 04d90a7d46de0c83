pub mod subscriber;
mod targets;

use crate::config::{LogConfig, LogFormat};
use std::sync::Once;
use tracing_subscriber::{
    fmt::{
        format::{DefaultFields, Format},
        writer::BoxMakeWriter,
        SubscriberBuilder,
    },
    EnvFilter,
};

// Log targets used in logs like `debug!(target: ENCRYPT, msg = "Encrypted parameter");`
pub use targets::{
    log_level_for, log_targets, CONFIG, CONTEXT, DECRYPT, DEVELOPMENT, ENCRYPT, MAPPER, REGISTRY,
    SCOPE,
};

static INIT: Once = Once::new();

type Subscriber = Box<dyn tracing::Subscriber + Send + Sync>;

/// Installs the global subscriber. Only the first call has any effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let subscriber = subscriber::builder(&config);
        let subscriber = set_format(&config, subscriber);

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Could not set the tracing subscriber: {err}");
        }
    });
}

pub fn set_format(
    config: &LogConfig,
    builder: SubscriberBuilder<DefaultFields, Format, EnvFilter, BoxMakeWriter>,
) -> Subscriber {
    match &config.format {
        LogFormat::Pretty => Box::new(builder.pretty().finish()),
        LogFormat::Structured => Box::new(builder.json().finish()),
        LogFormat::Text => Box::new(builder.finish()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use crate::test_helpers::MockMakeWriter;
    use tracing::dispatcher::set_default;
    use tracing::{debug, error, info, trace, warn};

    #[test]
    fn test_simple_log() {
        let make_writer = MockMakeWriter::default();

        let config = LogConfig::default();

        let subscriber =
            subscriber::builder(&config).with_writer(BoxMakeWriter::new(make_writer.clone()));

        let subscriber = set_format(&config, subscriber);

        let _default = set_default(&subscriber.into());

        error!("error message");

        let log_contents = make_writer.get_string();
        assert!(log_contents.contains("error message"));
    }

    #[test]
    fn test_log_levels() {
        let make_writer = MockMakeWriter::default();

        let config = LogConfig::with_level(LogLevel::Warn);

        let subscriber =
            subscriber::builder(&config).with_writer(BoxMakeWriter::new(make_writer.clone()));

        let subscriber = set_format(&config, subscriber);

        let _default = set_default(&subscriber.into());

        trace!("trace message");
        debug!("debug message");
        info!("info message");
        warn!("warn message");
        error!("error message");

        let log_contents = make_writer.get_string();
        assert!(!log_contents.contains("trace message"));
        assert!(!log_contents.contains("debug message"));
        assert!(!log_contents.contains("info message"));
        assert!(log_contents.contains("warn message"));
        assert!(log_contents.contains("error message"));
    }

    #[test]
    fn test_log_levels_with_targets() {
        let make_writer = MockMakeWriter::default();

        let config = LogConfig {
            level: LogLevel::Info,
            mapper_level: LogLevel::Debug,
            encrypt_level: LogLevel::Error,
            scope_level: LogLevel::Trace,
            ..LogConfig::with_level(LogLevel::Info)
        };

        let subscriber =
            subscriber::builder(&config).with_writer(BoxMakeWriter::new(make_writer.clone()));

        let subscriber = set_format(&config, subscriber);

        let _default = set_default(&subscriber.into());

        // with mapper level 'debug', debug should be logged but not trace
        trace!(target: MAPPER, "trace/mapper");
        debug!(target: MAPPER, "debug/mapper");
        let log_contents = make_writer.get_string();
        assert!(!log_contents.contains("trace/mapper"));
        assert!(log_contents.contains("debug/mapper"));

        // with encrypt level 'error', error should be logged but not warn
        warn!(target: ENCRYPT, "warn/encrypt");
        error!(target: ENCRYPT, "error/encrypt");
        let log_contents = make_writer.get_string();
        assert!(!log_contents.contains("warn/encrypt"));
        assert!(log_contents.contains("error/encrypt"));

        // with scope level 'trace', trace should be logged
        trace!(target: SCOPE, "trace/scope");
        let log_contents = make_writer.get_string();
        assert!(log_contents.contains("trace/scope"));

        // other targets use the base level
        debug!(target: CONTEXT, "debug/context");
        info!(target: CONTEXT, "info/context");
        let log_contents = make_writer.get_string();
        assert!(!log_contents.contains("debug/context"));
        assert!(log_contents.contains("info/context"));
    }

    #[test]
    fn test_log_format_structured() {
        let make_writer = MockMakeWriter::default();

        let mut config = LogConfig::with_level(LogLevel::Info);
        config.format = LogFormat::Structured;

        let subscriber =
            subscriber::builder(&config).with_writer(BoxMakeWriter::new(make_writer.clone()));

        let subscriber = set_format(&config, subscriber);

        let _default = set_default(&subscriber.into());

        info!(msg = "message", value = 42);

        let log_contents = make_writer.get_string();

        assert!(log_contents.contains(r#"fields":{"msg":"message","value":42}"#));
    }

    #[test]
    fn analyzer_logs_under_the_mapper_target() {
        assert_eq!(MAPPER, sql_gather::MAPPER);
    }
}
