use std::collections::BTreeSet;
use std::path::PathBuf;

use indexmap::IndexMap;
use rusqlite::{params_from_iter, Connection, Params};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{Error, Result, ValidationError};
use crate::record::{Record, ID_COLUMN};
use crate::schema::{quote_ident, SchemaCatalog, TableDefinition};
use crate::validation;
use crate::value::Value;

/// Database file used when no path is configured.
pub const DEFAULT_DB_FILE: &str = "bike_log.db";

/// Where the store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

/// Record store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Location of the SQLite database
    pub location: DbLocation,
    /// Tables the store creates and is allowed to touch
    pub catalog: SchemaCatalog,
}

impl StoreConfig {
    /// Create a new config backed by the file at `db_path`
    pub fn new(db_path: impl Into<PathBuf>, catalog: SchemaCatalog) -> Self {
        Self {
            location: DbLocation::File(db_path.into()),
            catalog,
        }
    }

    /// Create a new config backed by a private in-memory database
    pub fn in_memory(catalog: SchemaCatalog) -> Self {
        Self {
            location: DbLocation::Memory,
            catalog,
        }
    }
}

/// Schema-driven access to the record tables.
///
/// Table names passed to row operations must be declared in the catalog.
/// Column names are only ever taken from the catalog or from the store's
/// own introspection, and are quoted before they reach SQL text. Every
/// value is bound as a parameter.
pub struct RecordStore {
    config: StoreConfig,
    connection: Option<Connection>,
}

impl RecordStore {
    /// Create a store that is not yet connected
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }

    /// Connect and create any missing tables.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let mut store = Self::new(config);
        store.connect()?;
        Ok(store)
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.config.catalog
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether the backing database file exists. An in-memory store exists
    /// while it is connected.
    pub fn db_exists(&self) -> bool {
        match &self.config.location {
            DbLocation::File(path) => path.exists(),
            DbLocation::Memory => self.is_connected(),
        }
    }

    /// Open the connection if it is not already open, then ensure the schema.
    pub fn connect(&mut self) -> Result<()> {
        if self.connection.is_none() {
            let connection = match &self.config.location {
                DbLocation::File(path) => {
                    info!(path = %path.display(), "opening record store");
                    Connection::open(path)
                }
                DbLocation::Memory => {
                    info!("opening in-memory record store");
                    Connection::open_in_memory()
                }
            }
            .inspect_err(|e| error!(error = %e, "failed to open record store"))?;
            self.connection = Some(connection);
        }
        self.ensure_schema()
    }

    /// Release the connection. A connection that fails to close is kept so
    /// the caller can retry.
    pub fn close(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            if let Err((connection, e)) = connection.close() {
                error!(error = %e, "failed to close record store");
                self.connection = Some(connection);
                return Err(e.into());
            }
            info!("record store closed");
        }
        Ok(())
    }

    fn conn(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(Error::NotConnected)
    }

    fn declared(&self, table: &str) -> Result<&TableDefinition> {
        self.config
            .catalog
            .table(table)
            .ok_or_else(|| ValidationError::UnknownTable(table.to_string()).into())
    }

    /// Create every catalog table that does not exist yet. Existing tables
    /// are left as they are, even when their shape differs.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        for table in self.config.catalog.tables() {
            conn.execute(&table.create_sql(), [])?;
            debug!(table = %table.name, "table ensured");
        }
        Ok(())
    }

    /// Create a single catalog table if it is absent.
    pub fn create_table(&self, table: &str) -> Result<()> {
        let definition = self.declared(table)?;
        self.conn()?.execute(&definition.create_sql(), [])?;
        info!(table, "table created");
        Ok(())
    }

    /// Insert `record` under a freshly generated id and return the id.
    ///
    /// Any `id` already present in `record` is replaced. The remaining fields
    /// must be exactly the table's declared columns.
    pub fn add(&self, table: &str, mut record: Record) -> Result<String> {
        let definition = self.declared(table)?;
        let id = Uuid::new_v4().to_string();
        record.insert(ID_COLUMN, id.clone());

        let columns = definition.column_names();
        if !validation::headers_match(&columns, record.keys()) {
            return Err(ValidationError::ColumnMismatch {
                table: table.to_string(),
                expected: columns.iter().map(|c| c.to_string()).collect(),
                found: record.keys().map(String::from).collect(),
            }
            .into());
        }

        let values = columns
            .iter()
            .map(|column| record.get(column).unwrap_or(&Value::Null));
        self.conn()?
            .execute(&insert_sql(table, &columns), params_from_iter(values))
            .inspect_err(|e| error!(table, error = %e, "failed to add record"))?;
        info!(table, id = %id, "record added");
        Ok(id)
    }

    /// Parse an untyped JSON document and [`add`](Self::add) it.
    pub fn add_json(&self, table: &str, value: serde_json::Value) -> Result<String> {
        let record = Record::from_json(value)?;
        self.add(table, record)
    }

    pub fn get(&self, table: &str, id: &str) -> Result<Option<Record>> {
        self.declared(table)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1",
            quote_ident(table),
            quote_ident(ID_COLUMN)
        );
        Ok(self.query_records(&sql, [id])?.into_iter().next())
    }

    /// Overwrite the fields present in `record` on the row with its `id`.
    /// Returns the number of rows changed, zero when no row matches.
    pub fn update(&self, table: &str, record: &Record) -> Result<usize> {
        let definition = self.declared(table)?;
        let id = record.id().ok_or(ValidationError::MissingId)?;

        let assignments: Vec<(&str, &Value)> = record
            .iter()
            .filter(|(name, _)| *name != ID_COLUMN)
            .collect();
        if let Some((column, _)) = assignments
            .iter()
            .find(|(name, _)| !definition.has_column(name))
        {
            return Err(ValidationError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            }
            .into());
        }
        if assignments.is_empty() {
            return Ok(0);
        }

        let set = assignments
            .iter()
            .enumerate()
            .map(|(idx, (name, _))| format!("{} = ?{}", quote_ident(name), idx + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(table),
            set,
            quote_ident(ID_COLUMN),
            assignments.len() + 1
        );
        let values = assignments.iter().map(|(_, value)| *value).chain([id]);
        let changed = self
            .conn()?
            .execute(&sql, params_from_iter(values))
            .inspect_err(|e| error!(table, error = %e, "failed to update record"))?;
        info!(table, id = %id, changed, "record updated");
        Ok(changed)
    }

    /// Remove the row with `id`. Returns the number of rows removed.
    pub fn delete(&self, table: &str, id: &str) -> Result<usize> {
        self.declared(table)?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(table),
            quote_ident(ID_COLUMN)
        );
        let removed = self
            .conn()?
            .execute(&sql, [id])
            .inspect_err(|e| error!(table, error = %e, "failed to delete record"))?;
        info!(table, id, removed, "record deleted");
        Ok(removed)
    }

    pub fn count(&self, table: &str) -> Result<usize> {
        self.declared(table)?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.conn()?.query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Names of the tables physically present, catalog or not.
    pub fn list_tables(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self.conn()?.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(names.collect::<rusqlite::Result<_>>()?)
    }

    /// Column names as the database reports them, which may differ from
    /// the catalog for tables created out of band.
    pub fn columns_of(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn()?
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let names = stmt.query_map([table], |row| row.get::<_, String>(0))?;
        Ok(names.collect::<rusqlite::Result<_>>()?)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.conn()?.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table],
            |row| row.get(0),
        )?)
    }

    /// Every row keyed by its id, in storage order.
    pub fn dump_all(&self, table: &str) -> Result<IndexMap<String, Record>> {
        let records = self.all_records(table)?;
        Ok(records
            .into_iter()
            .map(|record| {
                let id = record.id().map(Value::to_string).unwrap_or_default();
                (id, record)
            })
            .collect())
    }

    /// Case-sensitive literal substring search over every cell. A row is
    /// returned once for each of its cells that matches.
    pub fn search(&self, table: &str, needle: &str) -> Result<Vec<Record>> {
        let records = self.all_records(table)?;
        let mut hits = Vec::new();
        for record in &records {
            for value in record.values() {
                if value.to_string().contains(needle) {
                    hits.push(record.clone());
                }
            }
        }
        debug!(table, needle, hits = hits.len(), "search finished");
        Ok(hits)
    }

    /// The first `n` rows in storage order.
    pub fn first_n(&self, table: &str, n: usize) -> Result<Vec<Record>> {
        self.declared(table)?;
        let sql = format!("SELECT * FROM {} LIMIT ?1", quote_ident(table));
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        self.query_records(&sql, [limit])
    }

    /// Delete every row, keeping the table.
    pub fn clear(&self, table: &str) -> Result<usize> {
        self.declared(table)?;
        let sql = format!("DELETE FROM {}", quote_ident(table));
        let removed = self
            .conn()?
            .execute(&sql, [])
            .inspect_err(|e| error!(table, error = %e, "failed to clear table"))?;
        info!(table, removed, "table cleared");
        Ok(removed)
    }

    pub fn drop_table(&self, table: &str) -> Result<()> {
        self.declared(table)?;
        let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(table));
        self.conn()?
            .execute(&sql, [])
            .inspect_err(|e| error!(table, error = %e, "failed to drop table"))?;
        info!(table, "table dropped");
        Ok(())
    }

    /// Whether `fields` name exactly the columns `table` has in the store.
    pub fn headers_match<S: AsRef<str>>(&self, table: &str, fields: &[S]) -> Result<bool> {
        let columns = self.columns_of(table)?;
        Ok(validation::headers_match(&columns, fields))
    }

    /// Insert positional `rows` whose fields are named by `headers`, all in
    /// one transaction.
    pub fn bulk_insert(&self, table: &str, headers: &[String], rows: &[Vec<String>]) -> Result<usize> {
        self.load_rows(table, headers, rows, false)
    }

    /// Drop `table`, recreate it from the catalog and insert `rows`, all in
    /// one transaction. A failure leaves the previous contents in place.
    pub fn replace_rows(&self, table: &str, headers: &[String], rows: &[Vec<String>]) -> Result<usize> {
        self.load_rows(table, headers, rows, true)
    }

    fn load_rows(
        &self,
        table: &str,
        headers: &[String],
        rows: &[Vec<String>],
        replace: bool,
    ) -> Result<usize> {
        let definition = self.declared(table)?;
        if let Some(column) = headers.iter().find(|h| !definition.has_column(h)) {
            return Err(ValidationError::UnknownColumn {
                table: table.to_string(),
                column: column.clone(),
            }
            .into());
        }

        let id_index = headers
            .iter()
            .position(|h| h == ID_COLUMN)
            .ok_or(ValidationError::MissingId)?;

        let tx = self.conn()?.unchecked_transaction()?;
        if replace {
            tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)), [])?;
            tx.execute(&definition.create_sql(), [])?;
        }
        let mut inserted = 0;
        {
            let exists_sql = format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
                quote_ident(table),
                quote_ident(ID_COLUMN)
            );
            let mut exists = tx.prepare(&exists_sql)?;
            let mut stmt = tx.prepare(&insert_sql(table, headers))?;
            for row in rows {
                let id = row
                    .get(id_index)
                    .filter(|id| !id.is_empty())
                    .ok_or(ValidationError::MissingId)?;
                // Earlier rows of this file are already visible in the transaction.
                if exists.query_row([id], |r| r.get::<_, bool>(0))? {
                    return Err(ValidationError::DuplicateId {
                        table: table.to_string(),
                        id: id.clone(),
                    }
                    .into());
                }
                let values = row.iter().map(|cell| csv_cell(cell));
                inserted += stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        info!(table, inserted, replace, "rows imported");
        Ok(inserted)
    }

    fn all_records(&self, table: &str) -> Result<Vec<Record>> {
        self.declared(table)?;
        self.query_records(&format!("SELECT * FROM {}", quote_ident(table)), [])
    }

    fn query_records<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>> {
        let mut stmt = self.conn()?.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt.query_map(params, |row| {
            let mut record = Record::with_capacity(names.len());
            for (idx, name) in names.iter().enumerate() {
                record.insert(name.as_str(), row.get::<_, Value>(idx)?);
            }
            Ok(record)
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}

/// An empty CSV field stands for NULL, which is how NULL is exported.
fn csv_cell(field: &str) -> Value {
    if field.is_empty() {
        Value::Null
    } else {
        Value::Text(field.to_string())
    }
}

fn insert_sql<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let names = columns
        .iter()
        .map(|column| quote_ident(column.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names,
        placeholders
    )
}
