//! Host-side error types
//!
//! Error types for ingestion, bundle loading, configuration and sessions
//! using `thiserror`.

use std::path::PathBuf;

use myoflex_core::error::ConfigurationError;
use thiserror::Error;

/// Problems turning one input line into a sample record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    /// Line has too few fields for the configured channel count
    #[error("Line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        /// 1-based line number
        line: u64,
        /// Fields required
        expected: usize,
        /// Fields present
        found: usize,
    },

    /// A field is not a number
    #[error("Line {line}: field {field} is not numeric: {text:?}")]
    NotNumeric {
        /// 1-based line number
        line: u64,
        /// 0-based field index
        field: usize,
        /// Offending text
        text: String,
    },

    /// Numeric-looking timestamp that is negative or unparseable
    #[error("Line {line}: invalid timestamp {text:?}")]
    BadTimestamp {
        /// 1-based line number
        line: u64,
        /// Offending text
        text: String,
    },

    /// CSV reader rejected the line
    #[error("Line {line}: {message}")]
    Csv {
        /// 1-based line number
        line: u64,
        /// Reader message
        message: String,
    },

    /// Plotter record with a malformed `CHn:value` token
    #[error("Line {line}: malformed plotter token {token:?}")]
    PlotterToken {
        /// 1-based line number
        line: u64,
        /// Offending token
        token: String,
    },

    /// Ground-truth label does not fit a class id
    #[error("Line {line}: gesture id {value} out of range")]
    GestureOutOfRange {
        /// 1-based line number
        line: u64,
        /// Parsed value
        value: i64,
    },

    /// More channels than a sample can hold
    #[error("Line {line}: {count} channels exceeds sample capacity")]
    TooManyChannels {
        /// 1-based line number
        line: u64,
        /// Channels found
        count: usize,
    },
}

/// Problems loading a model bundle.
#[derive(Error, Debug)]
pub enum BundleError {
    /// Bundle file could not be read
    #[error("Failed to read bundle {path}: {source}")]
    Io {
        /// Bundle path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Bundle is not valid JSON for the expected schema
    #[error("Failed to parse bundle: {0}")]
    Parse(#[from] serde_json::Error),

    /// Bundle contents are inconsistent
    #[error("Invalid bundle: {0}")]
    Invalid(#[from] ConfigurationError),

    /// Header counts disagree with the parameters
    #[error("Bundle declares {field} = {declared}, parameters imply {actual}")]
    HeaderMismatch {
        /// Header field
        field: &'static str,
        /// Declared value
        declared: usize,
        /// Value implied by the parameter arrays
        actual: usize,
    },
}

/// Problems loading a session configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML for the expected schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values are out of range or inconsistent
    #[error("Invalid config: {0}")]
    Invalid(#[from] ConfigurationError),
}

/// Problems running a session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The pipeline could not be assembled
    #[error("Pipeline refused to start: {0}")]
    Startup(#[from] ConfigurationError),

    /// The model bundle could not be loaded
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// Reading from the source failed
    #[error("Source read failed: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port failure
    #[cfg(feature = "usb")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Result type for bundle operations
pub type BundleResult<T> = Result<T, BundleError>;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
