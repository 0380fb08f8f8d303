//! Precondition checks run before anything is written.
//!
//! The checks are side-effect free. [`file_ready_for_import`] collapses the
//! individual import checks into a single boolean and logs which one failed.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;

use tracing::error;

use crate::error::ValidationError;
use crate::store::RecordStore;

/// Extension an import file must carry, compared case-insensitively.
pub const IMPORT_EXTENSION: &str = "csv";

/// True when `value` is a JSON object and can become a record.
pub fn is_record_shaped(value: &serde_json::Value) -> bool {
    value.is_object()
}

/// True when `fields` and `columns` name the same set of columns.
pub fn headers_match<C, F>(columns: C, fields: F) -> bool
where
    C: IntoIterator,
    C::Item: AsRef<str>,
    F: IntoIterator,
    F::Item: AsRef<str>,
{
    let columns: BTreeSet<String> = columns.into_iter().map(|c| c.as_ref().to_owned()).collect();
    let fields: BTreeSet<String> = fields.into_iter().map(|f| f.as_ref().to_owned()).collect();
    columns == fields
}

/// The path names an existing regular file with the import extension.
pub fn check_file(path: &Path) -> Result<(), ValidationError> {
    if !path.is_file() {
        return Err(ValidationError::FileMissing(path.to_path_buf()));
    }
    let has_extension = path
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(IMPORT_EXTENSION));
    if !has_extension {
        return Err(ValidationError::WrongExtension(path.to_path_buf()));
    }
    Ok(())
}

/// Read the header row of a CSV file.
pub fn read_header(path: &Path) -> Result<Vec<String>, ValidationError> {
    let unreadable = |reason: String| ValidationError::UnreadableHeader {
        path: path.to_path_buf(),
        reason,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| unreadable(e.to_string()))?;
    let header = reader.headers().map_err(|e| unreadable(e.to_string()))?;
    Ok(header.iter().map(String::from).collect())
}

/// The header names each of `columns` exactly once.
pub fn check_header<C: AsRef<str>>(
    table: &str,
    columns: &[C],
    header: &[String],
) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    if let Some(field) = header.iter().find(|field| !seen.insert(field.as_str())) {
        return Err(ValidationError::DuplicateHeader(field.clone()));
    }
    if !headers_match(columns, header) {
        return Err(ValidationError::HeaderMismatch {
            table: table.to_string(),
            expected: columns.iter().map(|c| c.as_ref().to_owned()).collect(),
            found: header.to_vec(),
        });
    }
    Ok(())
}

/// Run every import precondition and return the file's header on success.
///
/// A failed precondition is a [`crate::Error::Validation`]; errors from the store
/// itself are passed through unchanged.
pub fn check_import_file(
    store: &RecordStore,
    path: &Path,
    table: &str,
) -> crate::Result<Vec<String>> {
    check_file(path)?;
    if !store.table_exists(table)? {
        return Err(ValidationError::TableMissing(table.to_string()).into());
    }
    let columns = store.columns_of(table)?;
    let header = read_header(path)?;
    check_header(table, &columns, &header)?;
    Ok(header)
}

pub fn file_ready_for_import(store: &RecordStore, path: &Path, table: &str) -> bool {
    match check_import_file(store, path, table) {
        Ok(_) => true,
        Err(e) => {
            error!(table, path = %path.display(), error = %e, "import file rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn record_shape_is_an_object() {
        assert!(is_record_shaped(&json!({ "name": "Trek" })));
        assert!(is_record_shaped(&json!({})));
        assert!(!is_record_shaped(&json!(["name", "Trek"])));
        assert!(!is_record_shaped(&json!("Trek")));
        assert!(!is_record_shaped(&json!(null)));
    }

    #[test]
    fn header_match_ignores_order() {
        let columns = ["id", "name", "price"];
        assert!(headers_match(columns, ["price", "id", "name"]));
        assert!(headers_match(columns, ["id", "name", "price"]));
        assert!(!headers_match(columns, ["id", "name"]));
        assert!(!headers_match(columns, ["id", "name", "price", "notes"]));
        assert!(!headers_match(columns, ["id", "name", "Price"]));
    }

    #[test]
    fn duplicate_header_fields_are_reported() {
        let header = vec!["id".to_string(), "name".to_string(), "id".to_string()];
        assert_eq!(
            check_header("bikes", &["id", "name"][..], &header),
            Err(ValidationError::DuplicateHeader("id".to_string()))
        );
    }

    #[test]
    fn file_checks_distinguish_failures() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        assert_eq!(
            check_file(&missing),
            Err(ValidationError::FileMissing(missing.clone()))
        );

        let text = dir.path().join("bikes.txt");
        fs::write(&text, "id,name\n").unwrap();
        assert_eq!(
            check_file(&text),
            Err(ValidationError::WrongExtension(text.clone()))
        );

        let upper = dir.path().join("bikes.CSV");
        fs::write(&upper, "id,name\n").unwrap();
        assert_eq!(check_file(&upper), Ok(()));
        assert_eq!(read_header(&upper).unwrap(), vec!["id", "name"]);
    }
}
