//! Error types for bike log operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The schema document could not be turned into a usable catalog.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read schema file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed schema document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("table {0:?} is declared more than once")]
    DuplicateTable(String),

    #[error("column {column:?} is declared more than once in table {table:?}")]
    DuplicateColumn { table: String, column: String },

    #[error("table {0:?} must declare `id` as its first column")]
    MissingIdColumn(String),
}

/// A precondition failed before anything was written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record must be a JSON object")]
    NotRecordShaped,

    #[error("field {0:?} does not hold a scalar value")]
    NotScalar(String),

    #[error("record has no `id` field")]
    MissingId,

    #[error("id {id:?} appears more than once in table {table:?}")]
    DuplicateId { table: String, id: String },

    #[error("table {0:?} is not declared in the schema")]
    UnknownTable(String),

    #[error("table {table:?} has no column {column:?}")]
    UnknownColumn { table: String, column: String },

    #[error("fields {found:?} do not match columns {expected:?} of table {table:?}")]
    ColumnMismatch {
        table: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("import file {} does not exist", .0.display())]
    FileMissing(PathBuf),

    #[error("import file {} is not a .csv file", .0.display())]
    WrongExtension(PathBuf),

    #[error("table {0:?} does not exist in the store")]
    TableMissing(String),

    #[error("could not read header row of {}: {reason}", .path.display())]
    UnreadableHeader { path: PathBuf, reason: String },

    #[error("header lists {0:?} more than once")]
    DuplicateHeader(String),

    #[error("header {found:?} does not match columns {expected:?} of table {table:?}")]
    HeaderMismatch {
        table: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("store is not connected")]
    NotConnected,

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("import into {table} failed: {source}")]
    Import {
        table: String,
        #[source]
        source: Box<Error>,
    },

    #[error("export of {table} failed: {source}")]
    Export {
        table: String,
        #[source]
        source: Box<Error>,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn import(table: &str, source: Error) -> Self {
        Self::Import {
            table: table.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn export(table: &str, source: Error) -> Self {
        Self::Export {
            table: table.to_string(),
            source: Box::new(source),
        }
    }

    /// The validation failure behind this error, looking through bulk
    /// transfer wrappers.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(inner) => Some(inner),
            Self::Import { source, .. } | Self::Export { source, .. } => source.validation(),
            _ => None,
        }
    }
}
