use crate::orchestrator::Locator;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Encrypt(#[from] EncryptError),

    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Statement execution failed")]
    Execute(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing field {name} from configuration file or environment")]
    MissingParameter { name: String },

    #[error("Invalid value {value} for {name}")]
    InvalidParameter { name: String, value: String },

    #[error("Cipher key must be {expected} bytes of hex, got {received} bytes")]
    InvalidKeyLength { expected: usize, received: usize },

    #[error("Cipher key is not valid hex")]
    InvalidKeyEncoding(#[from] hex::FromHexError),

    #[error("Cipher {algorithm} could not be initialised from the configured key")]
    CipherInit { algorithm: String },

    #[error("Default algorithm {algorithm} is not a known algorithm")]
    UnknownDefaultAlgorithm { algorithm: String },

    #[error("Encrypt configuration could not be read from {path}")]
    EncryptConfigFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Encrypt configuration version {version} is not supported")]
    UnsupportedEncryptConfigVersion { version: u32 },

    #[error(transparent)]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    FileOrEnvironment(#[from] config::ConfigError),
}

#[derive(Error, Debug)]
pub enum EncryptError {
    #[error("Column {column} in table {table} names unknown algorithm {algorithm}")]
    UnknownAlgorithm {
        table: String,
        column: String,
        algorithm: String,
    },

    #[error("Value for column {column} in table {table} could not be encrypted")]
    CouldNotEncrypt { table: String, column: String },

    #[error("Plaintext could not be sealed")]
    Seal,
}

#[derive(Error, Debug)]
pub enum DecryptError {
    #[error("Field {field} of {type_name} names unknown algorithm {algorithm}")]
    UnknownAlgorithm {
        type_name: String,
        field: String,
        algorithm: String,
    },

    #[error("Field {field} of {type_name} could not be decrypted")]
    CouldNotDecrypt { type_name: String, field: String },

    #[error("Ciphertext is not valid hex")]
    Encoding(#[from] hex::FromHexError),

    #[error("Ciphertext is too short: expected at least {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },

    #[error("Ciphertext failed authentication")]
    Authentication,

    #[error("Decrypted value is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Scope could not be applied: {reason}")]
    SplicePointNotFound { reason: String },

    #[error("Scope fragment contains a placeholder: {fragment}")]
    PlaceholderInFragment { fragment: String },

    #[error("Scope was rejected: {reason}")]
    Rejected { reason: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LocatorError {
    #[error("No parameter at {locator}")]
    NotFound { locator: Locator },

    #[error("Parameter at {locator} is not an object")]
    NotAnObject { locator: Locator },

    #[error("Parameter at {locator} is read-only")]
    ReadOnly { locator: Locator },
}

impl ScopeError {
    pub(crate) fn splice(reason: impl Into<String>) -> Self {
        ScopeError::SplicePointNotFound {
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.into())
    }
}
