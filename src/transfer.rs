//! Whole-table CSV import and export.
//!
//! Imports run inside a single SQLite transaction, so a failed import leaves
//! the table as it was. `import_replacing` drops and recreates the table in
//! the same transaction.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::{Error, Result, ValidationError};
use crate::store::RecordStore;
use crate::validation;
use crate::value::Value;

/// What an export wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    Written { rows: usize },
    NothingToExport,
}

/// Bulk import/export bound to one store.
pub struct BulkTransfer<'a> {
    store: &'a RecordStore,
}

impl<'a> BulkTransfer<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Append every row of the CSV file at `path` to `table`.
    pub fn import_from(&self, table: &str, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        self.import_appending(table, path)
            .map_err(|e| Error::import(table, e))
            .inspect(|rows| info!(table, rows, path = %path.display(), "table imported from csv"))
            .inspect_err(|e| error!(error = %e, "csv import failed"))
    }

    /// Replace the contents of `table` with the CSV file at `path`.
    ///
    /// The file is checked against the catalog's columns before anything is
    /// dropped, since the table is recreated from the catalog.
    pub fn import_replacing(&self, table: &str, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        self.import_fresh(table, path)
            .map_err(|e| Error::import(table, e))
            .inspect(|rows| info!(table, rows, path = %path.display(), "table replaced from csv"))
            .inspect_err(|e| error!(error = %e, "csv import failed"))
    }

    /// Write a header row followed by one row per record. An empty table
    /// writes no file.
    pub fn export_to(&self, table: &str, path: impl AsRef<Path>) -> Result<ExportOutcome> {
        let path = path.as_ref();
        self.write_rows(table, path)
            .map_err(|e| Error::export(table, e))
            .inspect_err(|e| error!(error = %e, "csv export failed"))
    }

    /// Write only the header row of `table`.
    pub fn export_headers_only(&self, table: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.write_header(table, path)
            .map_err(|e| Error::export(table, e))
            .inspect(|_| info!(table, path = %path.display(), "table headers exported"))
            .inspect_err(|e| error!(error = %e, "header export failed"))
    }

    /// Header-only export of every catalog table to `dir/<table>.csv`.
    pub fn export_all_headers(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for table in self.store.catalog().table_names() {
            let path = dir.join(format!("{table}.{}", validation::IMPORT_EXTENSION));
            self.export_headers_only(table, &path)?;
            written.push(path);
        }
        Ok(written)
    }

    fn import_appending(&self, table: &str, path: &Path) -> Result<usize> {
        let header = validation::check_import_file(self.store, path, table)?;
        let rows = read_rows(path)?;
        self.store.bulk_insert(table, &header, &rows)
    }

    fn import_fresh(&self, table: &str, path: &Path) -> Result<usize> {
        let definition = self
            .store
            .catalog()
            .table(table)
            .ok_or_else(|| ValidationError::UnknownTable(table.to_string()))?;
        validation::check_file(path)?;
        let header = validation::read_header(path)?;
        validation::check_header(table, &definition.column_names(), &header)?;
        let rows = read_rows(path)?;
        self.store.replace_rows(table, &header, &rows)
    }

    fn write_rows(&self, table: &str, path: &Path) -> Result<ExportOutcome> {
        let records = self.store.dump_all(table)?;
        if records.is_empty() {
            warn!(table, "no data available to export");
            return Ok(ExportOutcome::NothingToExport);
        }
        let columns = self.store.columns_of(table)?;
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&columns)?;
        for record in records.values() {
            writer.write_record(
                columns
                    .iter()
                    .map(|column| record.get(column).map(Value::to_string).unwrap_or_default()),
            )?;
        }
        writer.flush()?;
        info!(table, rows = records.len(), path = %path.display(), "table exported as csv");
        Ok(ExportOutcome::Written {
            rows: records.len(),
        })
    }

    fn write_header(&self, table: &str, path: &Path) -> Result<()> {
        if !self.store.catalog().contains(table) {
            return Err(ValidationError::UnknownTable(table.to_string()).into());
        }
        let columns = self.store.columns_of(table)?;
        if columns.is_empty() {
            return Err(ValidationError::TableMissing(table.to_string()).into());
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&columns)?;
        writer.flush()?;
        Ok(())
    }
}

/// Data rows of a CSV file, header skipped.
fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(String::from).collect());
    }
    Ok(rows)
}
