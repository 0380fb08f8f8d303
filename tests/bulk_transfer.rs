use std::fs;
use std::path::PathBuf;

use bike_log::validation::{check_import_file, file_ready_for_import};
use bike_log::{
    BulkTransfer, Error, ExportOutcome, Record, RecordStore, Result, SchemaCatalog, StoreConfig,
    ValidationError, Value,
};
use tempfile::TempDir;

const SCHEMA: &str = r#"{
    "tables": [
        { "name": "bikes", "columns": [
            { "name": "id", "type": "TEXT" },
            { "name": "name", "type": "TEXT" },
            { "name": "price", "type": "REAL" }
        ] },
        { "name": "expenses", "columns": [
            { "name": "id", "type": "TEXT" },
            { "name": "title", "type": "TEXT" },
            { "name": "quantity", "type": "INTEGER" }
        ] }
    ]
}"#;

fn create_test_store() -> Result<RecordStore> {
    let catalog = SchemaCatalog::from_json_str(SCHEMA).unwrap();
    RecordStore::open(StoreConfig::in_memory(catalog))
}

fn seed(store: &RecordStore) -> Result<()> {
    for (name, price) in [("Marlin 7", 1049.99), ("Talon 2", 650.0), ("Vado SL", 3899.5)] {
        store.add(
            "bikes",
            Record::new().with_field("name", name).with_field("price", price),
        )?;
    }
    Ok(())
}

fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn import_rejection(err: &Error) -> Option<&ValidationError> {
    match err {
        Error::Import { .. } => err.validation(),
        _ => None,
    }
}

#[test]
fn export_then_import_replacing_reproduces_rows() -> Result<()> {
    let store = create_test_store()?;
    seed(&store)?;
    let before = store.dump_all("bikes")?;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bikes.csv");
    let transfer = BulkTransfer::new(&store);
    assert_eq!(
        transfer.export_to("bikes", &path)?,
        ExportOutcome::Written { rows: 3 }
    );

    store.add(
        "bikes",
        Record::new().with_field("name", "Extra").with_field("price", 1.0),
    )?;
    assert_eq!(transfer.import_replacing("bikes", &path)?, 3);
    assert_eq!(store.dump_all("bikes")?, before);
    Ok(())
}

#[test]
fn export_writes_header_then_rows() -> Result<()> {
    let store = create_test_store()?;
    let id = store.add(
        "bikes",
        Record::new().with_field("name", "Marlin, 7").with_field("price", 10.5),
    )?;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bikes.csv");
    BulkTransfer::new(&store).export_to("bikes", &path)?;

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents, format!("id,name,price\n{id},\"Marlin, 7\",10.5\n"));
    Ok(())
}

#[test]
fn empty_table_exports_nothing() -> Result<()> {
    let store = create_test_store()?;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bikes.csv");
    let outcome = BulkTransfer::new(&store).export_to("bikes", &path)?;
    assert_eq!(outcome, ExportOutcome::NothingToExport);
    assert!(!path.exists());
    Ok(())
}

#[test]
fn header_only_export() -> Result<()> {
    let store = create_test_store()?;
    seed(&store)?;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bikes.csv");
    BulkTransfer::new(&store).export_headers_only("bikes", &path)?;
    assert_eq!(fs::read_to_string(&path).unwrap(), "id,name,price\n");
    Ok(())
}

#[test]
fn all_headers_are_exported_per_table() -> Result<()> {
    let store = create_test_store()?;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("templates");
    let written = BulkTransfer::new(&store).export_all_headers(&out)?;
    assert_eq!(written, vec![out.join("bikes.csv"), out.join("expenses.csv")]);
    assert_eq!(
        fs::read_to_string(out.join("expenses.csv")).unwrap(),
        "id,title,quantity\n"
    );
    Ok(())
}

#[test]
fn import_appends_rows_in_any_column_order() -> Result<()> {
    let store = create_test_store()?;
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        &dir,
        "expenses.csv",
        "quantity,id,title\n2,e-1,Brake pads\n1,e-2,Chain\n",
    );

    assert!(file_ready_for_import(&store, &path, "expenses"));
    let transfer = BulkTransfer::new(&store);
    assert_eq!(transfer.import_from("expenses", &path)?, 2);
    assert_eq!(store.count("expenses")?, 2);

    let chain = store.get("expenses", "e-2")?.unwrap();
    assert_eq!(chain.get("title"), Some(&Value::from("Chain")));
    // INTEGER affinity turns the imported text into a number.
    assert_eq!(chain.get("quantity"), Some(&Value::Integer(1)));
    Ok(())
}

#[test]
fn mismatched_header_is_rejected_without_inserting() -> Result<()> {
    let store = create_test_store()?;
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "bikes.csv", "id,name\n1,Trek\n");

    assert!(!file_ready_for_import(&store, &path, "bikes"));
    let err = BulkTransfer::new(&store)
        .import_from("bikes", &path)
        .unwrap_err();
    assert!(matches!(
        import_rejection(&err),
        Some(ValidationError::HeaderMismatch { .. })
    ));
    assert_eq!(store.count("bikes")?, 0);
    Ok(())
}

#[test]
fn import_guard_reports_each_failure() -> Result<()> {
    let store = create_test_store()?;
    let dir = tempfile::tempdir().unwrap();
    let rejection = |path: &PathBuf, table: &str| {
        check_import_file(&store, path, table)
            .unwrap_err()
            .validation()
            .cloned()
    };

    let missing = dir.path().join("missing.csv");
    assert!(matches!(
        rejection(&missing, "bikes"),
        Some(ValidationError::FileMissing(_))
    ));

    let text = write_csv(&dir, "bikes.txt", "id,name,price\n");
    assert!(matches!(
        rejection(&text, "bikes"),
        Some(ValidationError::WrongExtension(_))
    ));

    let good = write_csv(&dir, "bikes.csv", "id,name,price\n");
    assert!(matches!(
        rejection(&good, "wheels"),
        Some(ValidationError::TableMissing(_))
    ));
    assert_eq!(
        check_import_file(&store, &good, "bikes")?,
        vec!["id".to_string(), "name".to_string(), "price".to_string()]
    );
    Ok(())
}

#[test]
fn import_into_closed_store_reports_not_connected() -> Result<()> {
    let mut store = create_test_store()?;
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "bikes.csv", "id,name,price\nb-1,Trek,10\n");
    store.close()?;

    assert!(matches!(
        check_import_file(&store, &path, "bikes"),
        Err(Error::NotConnected)
    ));
    assert!(!file_ready_for_import(&store, &path, "bikes"));
    match BulkTransfer::new(&store).import_from("bikes", &path) {
        Err(Error::Import { source, .. }) => assert!(matches!(*source, Error::NotConnected)),
        other => panic!("expected an import error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn reimporting_the_same_file_is_rejected() -> Result<()> {
    let store = create_test_store()?;
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "bikes.csv", "id,name,price\nb-1,Trek,10\nb-2,Giant,20\n");
    let transfer = BulkTransfer::new(&store);

    assert_eq!(transfer.import_from("bikes", &path)?, 2);
    let err = transfer.import_from("bikes", &path).unwrap_err();
    assert!(matches!(
        import_rejection(&err),
        Some(ValidationError::DuplicateId { id, .. }) if id == "b-1"
    ));
    assert_eq!(store.count("bikes")?, 2);
    Ok(())
}

#[test]
fn repeated_ids_within_a_file_are_rejected() -> Result<()> {
    let store = create_test_store()?;
    seed(&store)?;
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "bikes.csv", "id,name,price\nb-1,Trek,10\nb-1,Giant,20\n");
    let transfer = BulkTransfer::new(&store);

    let err = transfer.import_from("bikes", &path).unwrap_err();
    assert!(matches!(
        import_rejection(&err),
        Some(ValidationError::DuplicateId { .. })
    ));
    let err = transfer.import_replacing("bikes", &path).unwrap_err();
    assert!(matches!(
        import_rejection(&err),
        Some(ValidationError::DuplicateId { .. })
    ));
    assert_eq!(store.count("bikes")?, 3);

    let blank = write_csv(&dir, "blank.csv", "id,name,price\n,Trek,10\n");
    let err = transfer.import_from("bikes", &blank).unwrap_err();
    assert!(matches!(import_rejection(&err), Some(ValidationError::MissingId)));
    assert_eq!(store.count("bikes")?, 3);
    Ok(())
}

#[test]
fn null_cells_survive_export_and_replace() -> Result<()> {
    let store = create_test_store()?;
    seed(&store)?;
    store.add(
        "bikes",
        Record::new()
            .with_field("name", "Unpriced")
            .with_field("price", Value::Null),
    )?;
    let before = store.dump_all("bikes")?;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bikes.csv");
    let transfer = BulkTransfer::new(&store);
    transfer.export_to("bikes", &path)?;
    assert_eq!(transfer.import_replacing("bikes", &path)?, 4);

    let after = store.dump_all("bikes")?;
    assert_eq!(after, before);
    assert!(after
        .values()
        .any(|record| record.get("price") == Some(&Value::Null)));
    Ok(())
}

#[test]
fn failed_replace_keeps_existing_rows() -> Result<()> {
    let store = create_test_store()?;
    seed(&store)?;
    let dir = tempfile::tempdir().unwrap();
    let transfer = BulkTransfer::new(&store);

    let wrong_header = write_csv(&dir, "bikes.csv", "id,title\n1,Trek\n");
    let err = transfer
        .import_replacing("bikes", &wrong_header)
        .unwrap_err();
    assert!(matches!(
        import_rejection(&err),
        Some(ValidationError::HeaderMismatch { .. })
    ));
    assert_eq!(store.count("bikes")?, 3);

    let ragged = write_csv(&dir, "ragged.csv", "id,name,price\n1,Trek,10\n2,Giant\n");
    let err = transfer.import_replacing("bikes", &ragged).unwrap_err();
    assert!(matches!(err, Error::Import { .. }));
    assert_eq!(store.count("bikes")?, 3);
    Ok(())
}

#[test]
fn import_replacing_recreates_a_dropped_table() -> Result<()> {
    let store = create_test_store()?;
    store.drop_table("bikes")?;
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "bikes.csv", "id,name,price\nb-1,Trek,10\n");

    assert!(!file_ready_for_import(&store, &path, "bikes"));
    assert_eq!(BulkTransfer::new(&store).import_replacing("bikes", &path)?, 1);
    assert!(store.table_exists("bikes")?);
    assert_eq!(store.count("bikes")?, 1);
    Ok(())
}

#[test]
fn undeclared_tables_cannot_be_transferred() -> Result<()> {
    let store = create_test_store()?;
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "wheels.csv", "id\n1\n");
    let transfer = BulkTransfer::new(&store);

    let err = transfer.import_replacing("wheels", &path).unwrap_err();
    assert!(matches!(
        import_rejection(&err),
        Some(ValidationError::UnknownTable(_))
    ));
    let err = transfer
        .export_headers_only("wheels", dir.path().join("out.csv"))
        .unwrap_err();
    assert!(matches!(
        err.validation(),
        Some(ValidationError::UnknownTable(_))
    ));
    Ok(())
}
