//! Error types for siderfreq.
//!
//! The reconciliation core never fails: malformed frequency text degrades to a
//! label, unknown labels degrade to the postmarketing code. Errors exist at the
//! edges only (configuration, reading dumps, writing outputs) plus the opt-in
//! strict label policy.

use std::path::PathBuf;

use thiserror::Error;

/// Validation errors for configuration and input values.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required configuration value is empty.
    #[error("Required field '{field}' is missing")]
    MissingField {
        /// Name of the field.
        field: String,
    },

    /// Term type other than `PT` or `LLT`.
    #[error("Unknown MedDRA term type '{value}' (expected PT or LLT)")]
    UnknownTermType {
        /// Text as given.
        value: String,
    },

    /// STITCH ID without the expected prefix or numeric body.
    #[error("Malformed STITCH identifier '{value}'")]
    MalformedStitchId {
        /// Text as found in the dump.
        value: String,
    },

    /// Label outside the known vocabulary under the strict policy.
    #[error("Unrecognized frequency label '{label}' for pair {pair}")]
    UnrecognizedLabel {
        /// Pair key, `drug|side effect`.
        pair: String,
        /// Normalized label.
        label: String,
    },
}

/// Errors raised while reading the SIDER dumps.
#[derive(Debug, Error)]
pub enum IngestError {
    /// File could not be opened or read.
    #[error("Failed to open {path}: {source}")]
    Open {
        /// File involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Tabular reader failure.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File involved.
        path: PathBuf,
        /// Underlying reader error.
        #[source]
        source: csv::Error,
    },

    /// Row narrower than the column layout.
    #[error("{path}:{line}: expected at least {expected} columns, found {actual}")]
    ShortRow {
        /// File involved.
        path: PathBuf,
        /// 1-based line number.
        line: u64,
        /// Minimum column count.
        expected: usize,
        /// Columns found.
        actual: usize,
    },

    /// Configuration file is not valid JSON for the config type.
    #[error("Failed to parse configuration {path}: {source}")]
    Config {
        /// File involved.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A field of a row failed validation.
    #[error("{path}:{line}: {source}")]
    InvalidField {
        /// File involved.
        path: PathBuf,
        /// 1-based line number.
        line: u64,
        /// What was wrong with the field.
        #[source]
        source: ValidationError,
    },
}

/// Errors raised while persisting results.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Output directory could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        /// Directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Value could not be serialized.
    #[error("Failed to serialize {name}: {source}")]
    Serialize {
        /// Output file name.
        name: String,
        /// Underlying serializer error.
        #[source]
        source: serde_json::Error,
    },

    /// Output file could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// File involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error type for siderfreq.
#[derive(Debug, Error)]
pub enum SiderError {
    /// Validation failure.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Reading input failed.
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Writing output failed.
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// Broken internal invariant.
    #[error("Internal error: {message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl SiderError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an ingest error.
    #[must_use]
    pub const fn is_ingest(&self) -> bool {
        matches!(self, Self::Ingest(_))
    }

    /// Returns true if this is an output error.
    #[must_use]
    pub const fn is_output(&self) -> bool {
        matches!(self, Self::Output(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for siderfreq operations.
pub type SiderResult<T> = Result<T, SiderError>;
