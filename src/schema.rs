//! Declarative table schema and the catalog built from it.
//!
//! The schema document is JSON of the shape
//! `{"tables": [{"name": ..., "columns": [{"name": ..., "type": ...}]}]}`.
//! Every table and column name is checked against a strict identifier
//! grammar when the catalog is built, so names taken from the catalog are
//! safe to place in SQL text.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::record::ID_COLUMN;

const BUNDLED_SCHEMA: &str = include_str!("../config/database_config.json");

/// Schema definition for the SQLite database
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(ColumnDefinition {
            name: name.into(),
            data_type,
        });
        self
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table.
    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| format!("{} {}", quote_ident(&column.name), column.data_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_ident(&self.name), columns)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

/// Declared column type. Only these names may appear in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
    Numeric,
}

impl DataType {
    pub fn as_sql(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
            DataType::Numeric => "NUMERIC",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" => Ok(DataType::Integer),
            "TEXT" => Ok(DataType::Text),
            "REAL" | "FLOAT" | "DOUBLE" => Ok(DataType::Real),
            "BLOB" => Ok(DataType::Blob),
            "NUMERIC" => Ok(DataType::Numeric),
            other => Err(format!("unknown column type {other:?}")),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Double-quote an identifier for SQL text.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The validated set of tables the store is allowed to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCatalog {
    schema: Schema,
}

impl SchemaCatalog {
    /// Read and validate the schema document at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), tables = catalog.schema.tables.len(), "schema loaded");
        Ok(catalog)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let schema: Schema = serde_json::from_str(text)?;
        Self::from_schema(schema)
    }

    /// The four bike tables shipped in `config/database_config.json`.
    pub fn bike_log() -> Result<Self, ConfigError> {
        Self::from_json_str(BUNDLED_SCHEMA)
    }

    pub fn from_schema(schema: Schema) -> Result<Self, ConfigError> {
        let mut table_names = HashSet::new();
        for table in &schema.tables {
            if !is_valid_identifier(&table.name) {
                return Err(ConfigError::InvalidIdentifier(table.name.clone()));
            }
            if !table_names.insert(table.name.as_str()) {
                return Err(ConfigError::DuplicateTable(table.name.clone()));
            }
            if table.columns.first().map(|column| column.name.as_str()) != Some(ID_COLUMN) {
                return Err(ConfigError::MissingIdColumn(table.name.clone()));
            }
            let mut column_names = HashSet::new();
            for column in &table.columns {
                if !is_valid_identifier(&column.name) {
                    return Err(ConfigError::InvalidIdentifier(column.name.clone()));
                }
                if !column_names.insert(column.name.as_str()) {
                    return Err(ConfigError::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
            }
        }
        Ok(Self { schema })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.schema.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.schema.tables.iter().find(|table| table.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.schema.tables.iter().map(|table| table.name.as_str())
    }

    pub fn columns_of(&self, name: &str) -> Option<&[ColumnDefinition]> {
        self.table(name).map(|table| table.columns.as_slice())
    }
}
