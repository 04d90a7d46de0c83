use crate::{
    cipher::{mark, strip_marker, CipherSuite},
    config::{FieldGuardConfig, LogConfig, LogFormat, LogLevel, LogOutput, DEFAULT_CONFIG_FILE_PATH},
    error::{ConfigError, DecryptError, EncryptError, Error},
    log::{self, DEVELOPMENT, SCOPE},
    orchestrator::descriptors,
    registry::{AlgorithmId, EncryptConfigManager},
    scope::{apply_scope, StaticScope},
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sql_gather::{analyze, normalize, SqlGather};
use std::io::{self, Read, Write};
use tracing::{debug, warn};

#[derive(Clone, Debug, Parser)]
#[command(version, about, verbatim_doc_comment)]
///
/// Field Guard
///
/// Inspect how field-guard sees a statement: which column each placeholder binds to, how a data scope rewrites it,
/// and what an encrypted value looks like.
///
pub struct Args {
    /// Optional path to a field-guard configuration file.
    ///
    /// Default is "field-guard.toml".
    /// Configuration is loaded from this file, if present.
    /// Environment variables are used instead of the file or to override any values defined in the file.
    #[arg(
        short = 'p',
        long,
        default_value = DEFAULT_CONFIG_FILE_PATH,
        verbatim_doc_comment,
        global = true
    )]
    pub config_file_path: String,

    ///
    /// Optional log level.
    ///
    #[arg(short, long, value_enum, default_value_t = LogConfig::default_log_level(), env = "FG_LOG__LEVEL", global = true)]
    pub log_level: LogLevel,

    ///
    /// Optional log format. Default is "pretty" if running in a terminal session, otherwise "structured".
    ///
    #[arg(short='f', long, value_enum, default_value_t = LogConfig::default_log_format(), env = "FG_LOG__FORMAT", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Print the tables, fields and parameter mappings of a statement
    Analyze(Analyze),
    /// Splice a data scope into a statement
    Rewrite(Rewrite),
    /// Encrypt a value
    Encrypt(Encrypt),
    /// Decrypt a value
    Decrypt(Decrypt),
}

#[derive(Clone, Debug, clap::Args)]
pub struct Analyze {
    /// SQL to analyze. Read from stdin if omitted.
    pub sql: Option<String>,

    /// Also mark which placeholders bind to encrypted columns, using the configured column configuration
    #[arg(short, long)]
    pub encrypted: bool,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Rewrite {
    /// SQL to rewrite. Read from stdin if omitted.
    pub sql: Option<String>,

    /// JOIN fragment. Defaults to the configured scope.
    #[arg(long)]
    pub join: Option<String>,

    /// WHERE fragment, without the keyword. Defaults to the configured scope.
    #[arg(long = "where")]
    pub where_clause: Option<String>,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Encrypt {
    pub value: String,

    /// Algorithm to use instead of the configured default
    #[arg(short, long)]
    pub algorithm: Option<String>,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Decrypt {
    /// Ciphertext, with or without the marker prefix
    pub value: String,

    /// Algorithm to use instead of the configured default
    #[arg(short, long)]
    pub algorithm: Option<String>,
}

#[derive(Serialize)]
struct AnalyzeOutput<'a> {
    normalized: String,
    #[serde(flatten)]
    gather: &'a SqlGather,
    #[serde(skip_serializing_if = "Option::is_none")]
    encrypted: Option<Vec<Option<String>>>,
}

impl Args {
    /// Log settings for commands that run without a configuration file.
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            format: self.log_format,
            output: LogOutput::Stderr,
            ..LogConfig::with_level(self.log_level)
        }
    }
}

impl Commands {
    fn requires_config(&self) -> bool {
        match self {
            Commands::Analyze(analyze) => analyze.encrypted,
            Commands::Rewrite(rewrite) => rewrite.join.is_none() && rewrite.where_clause.is_none(),
            Commands::Encrypt(_) | Commands::Decrypt(_) => true,
        }
    }
}

///
/// Runs the command specified on the command line, writing results to stdout.
///
/// Logs go to stderr so that output can be piped.
///
pub fn run(args: &Args) -> Result<(), Error> {
    let config = if args.command.requires_config() {
        let mut config = FieldGuardConfig::load(args)?;
        config.log.output = LogOutput::Stderr;
        log::init(config.log.clone());
        Some(config)
    } else {
        log::init(args.log_config());
        None
    };

    debug!(target: DEVELOPMENT, command = ?args.command);

    let mut stdout = io::stdout().lock();

    match &args.command {
        Commands::Analyze(analyze) => analyze.run(config.as_ref(), &mut stdout),
        Commands::Rewrite(rewrite) => rewrite.run(config.as_ref(), &mut stdout),
        Commands::Encrypt(encrypt) => encrypt.run(&required(config)?, &mut stdout),
        Commands::Decrypt(decrypt) => decrypt.run(&required(config)?, &mut stdout),
    }
}

impl Analyze {
    fn run(&self, config: Option<&FieldGuardConfig>, out: &mut impl Write) -> Result<(), Error> {
        let sql = sql_or_stdin(&self.sql)?;
        let gather = analyze(&sql);

        let encrypted = match config {
            Some(config) => {
                let manager = EncryptConfigManager::init(config)?;
                let encrypted: Vec<Option<String>> = descriptors(&gather, &manager)
                    .into_iter()
                    .map(|d| d.map(|d| format!("{}.{} ({})", d.table, d.column, d.algorithm)))
                    .collect();
                Some(encrypted)
            }
            None => None,
        };

        let output = AnalyzeOutput {
            normalized: normalize(&sql),
            gather: &gather,
            encrypted,
        };
        serde_json::to_writer_pretty(&mut *out, &output).map_err(io::Error::from)?;
        writeln!(out)?;
        Ok(())
    }
}

impl Rewrite {
    fn run(&self, config: Option<&FieldGuardConfig>, out: &mut impl Write) -> Result<(), Error> {
        let sql = sql_or_stdin(&self.sql)?;

        let scope = match config {
            Some(config) if !config.scope_enabled() => {
                warn!(target: SCOPE, msg = "Data scope is disabled, statement is unchanged");
                writeln!(out, "{sql}")?;
                return Ok(());
            }
            Some(config) => StaticScope::from_config(&config.scope),
            None => StaticScope {
                join: self.join.clone(),
                where_clause: self.where_clause.clone(),
                ..Default::default()
            },
        };

        let rewritten = apply_scope(
            &sql,
            scope.join.as_deref().unwrap_or_default(),
            scope.where_clause.as_deref().unwrap_or_default(),
        )?;
        writeln!(out, "{rewritten}")?;
        Ok(())
    }
}

impl Encrypt {
    fn run(&self, config: &FieldGuardConfig, out: &mut impl Write) -> Result<(), Error> {
        let ciphers = CipherSuite::from_config(&config.cipher)?;
        let algorithm = algorithm_or_default(&self.algorithm, &ciphers);
        let cipher = ciphers
            .get(&algorithm)
            .ok_or_else(|| EncryptError::UnknownAlgorithm {
                table: String::new(),
                column: String::new(),
                algorithm: algorithm.to_string(),
            })?;

        writeln!(out, "{}", mark(&cipher.encrypt(&self.value)?))?;
        Ok(())
    }
}

impl Decrypt {
    fn run(&self, config: &FieldGuardConfig, out: &mut impl Write) -> Result<(), Error> {
        let ciphers = CipherSuite::from_config(&config.cipher)?;
        let algorithm = algorithm_or_default(&self.algorithm, &ciphers);
        let cipher = ciphers
            .get(&algorithm)
            .ok_or_else(|| DecryptError::UnknownAlgorithm {
                type_name: String::new(),
                field: String::new(),
                algorithm: algorithm.to_string(),
            })?;

        let ciphertext = strip_marker(&self.value).unwrap_or(self.value.as_str());
        writeln!(out, "{}", cipher.decrypt(ciphertext)?)?;
        Ok(())
    }
}

fn required(config: Option<FieldGuardConfig>) -> Result<FieldGuardConfig, Error> {
    config.ok_or_else(|| {
        ConfigError::MissingParameter {
            name: "cipher.key".to_string(),
        }
        .into()
    })
}

fn algorithm_or_default(algorithm: &Option<String>, ciphers: &CipherSuite) -> AlgorithmId {
    algorithm
        .as_deref()
        .map(AlgorithmId::from)
        .unwrap_or_else(|| ciphers.default_algorithm().clone())
}

fn sql_or_stdin(sql: &Option<String>) -> Result<String, Error> {
    match sql {
        Some(sql) => Ok(sql.to_owned()),
        None => {
            let mut sql = String::new();
            io::stdin().read_to_string(&mut sql)?;
            Ok(sql)
        }
    }
}
