//! Schema-driven SQLite record keeping for a small fleet of bicycles.
//!
//! # Intention
//!
//! - Create the ledger, expense, charging and maintenance tables from a
//!   declarative schema document.
//! - Provide typed CRUD, substring search and whole-table CSV import/export
//!   over any declared table, with UUID identifiers generated by the store.
//!
//! # Architectural Boundaries
//!
//! - [`schema`] owns the schema document and the allow-list of identifiers.
//! - [`store`] owns the connection; every SQL statement lives there.
//! - [`validation`] holds side-effect free precondition checks.
//! - [`transfer`] owns CSV files and nothing else.
//! - No menu or presentation logic belongs here.

pub mod error;
pub mod logging;
pub mod record;
pub mod schema;
pub mod store;
pub mod transfer;
pub mod validation;
pub mod value;

pub use error::{ConfigError, Error, Result, ValidationError};
pub use record::{Record, ID_COLUMN};
pub use schema::{ColumnDefinition, DataType, Schema, SchemaCatalog, TableDefinition};
pub use store::{DbLocation, RecordStore, StoreConfig, DEFAULT_DB_FILE};
pub use transfer::{BulkTransfer, ExportOutcome};
pub use value::Value;
