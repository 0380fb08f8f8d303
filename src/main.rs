//! bike-log command-line interface
//!
//! Runs a single record store operation and exits.
//!
//! # Usage
//!
//! ```bash
//! # List the tables in the database
//! bike-log tables
//!
//! # Add a charging session
//! bike-log add bike_charging '{"entry_date": "2024-08-04", "kwh": 0.4, ...}'
//!
//! # Replace the ledger from a spreadsheet export
//! bike-log import bike_ledger ledger.csv --replace
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use bike_log::logging::{self, LogConfig};
use bike_log::{
    BulkTransfer, ExportOutcome, Record, RecordStore, SchemaCatalog, StoreConfig, DEFAULT_DB_FILE,
};

/// Bicycle fleet record keeping
#[derive(Parser, Debug)]
#[command(name = "bike-log", version, about = "Record keeping for a small fleet of bicycles")]
struct Args {
    /// SQLite database file
    #[arg(long, default_value = DEFAULT_DB_FILE, env = "BIKE_LOG_DB")]
    db: PathBuf,

    /// Schema document; the bundled bike tables are used when omitted
    #[arg(long, env = "BIKE_LOG_SCHEMA")]
    schema: Option<PathBuf>,

    /// Log level or filter directive
    #[arg(long, default_value = "info", env = "BIKE_LOG_LEVEL")]
    log_level: String,

    /// Append log events to this file
    #[arg(long, env = "BIKE_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Do not log to the console
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tables present in the database
    Tables,
    /// List the columns of a table
    Columns { table: String },
    /// Count the rows of a table
    Count { table: String },
    /// Print one record
    Get { table: String, id: String },
    /// Add a record given as a JSON object
    Add { table: String, json: String },
    /// Update fields of a record given as a JSON object with an `id`
    Update { table: String, json: String },
    /// Delete one record
    Delete { table: String, id: String },
    /// Print every record with a cell containing the text
    Search { table: String, needle: String },
    /// Print the first rows of a table
    Head {
        table: String,
        #[arg(short, long, default_value_t = 10)]
        n: usize,
    },
    /// Delete every row of a table
    Clear { table: String },
    /// Import a CSV file into a table
    Import {
        table: String,
        file: PathBuf,
        /// Drop and recreate the table first
        #[arg(long)]
        replace: bool,
    },
    /// Export a table to a CSV file
    Export { table: String, file: PathBuf },
    /// Write the header row of a table to a CSV file
    Headers { table: String, file: PathBuf },
    /// Write header-only CSV files for every table into a directory
    AllHeaders { dir: PathBuf },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_config = LogConfig {
        level: args.log_level.clone(),
        console: !args.quiet,
        file: args.log_file.clone(),
    };
    if let Err(e) = logging::init_logging(&log_config) {
        eprintln!("failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            if needs_plain_report(&log_config) {
                eprintln!("error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Failures are only logged to the console when the console layer is on.
fn needs_plain_report(config: &LogConfig) -> bool {
    !config.console
}

fn run(args: Args) -> Result<()> {
    let catalog = match &args.schema {
        Some(path) => SchemaCatalog::load(path)?,
        None => SchemaCatalog::bike_log()?,
    };
    let mut store = RecordStore::open(StoreConfig::new(&args.db, catalog))
        .with_context(|| format!("failed to open {}", args.db.display()))?;
    info!("Database connected");

    let result = execute(&store, args.command);
    store.close()?;
    result
}

fn execute(store: &RecordStore, command: Command) -> Result<()> {
    let transfer = BulkTransfer::new(store);
    match command {
        Command::Tables => {
            for table in store.list_tables()? {
                println!("{table}");
            }
        }
        Command::Columns { table } => {
            for column in store.columns_of(&table)? {
                println!("{column}");
            }
        }
        Command::Count { table } => println!("{}", store.count(&table)?),
        Command::Get { table, id } => match store.get(&table, &id)? {
            Some(record) => print_record(&record)?,
            None => anyhow::bail!("no record {id} in {table}"),
        },
        Command::Add { table, json } => {
            let value = serde_json::from_str(&json).context("record is not valid JSON")?;
            println!("{}", store.add_json(&table, value)?);
        }
        Command::Update { table, json } => {
            let value = serde_json::from_str(&json).context("record is not valid JSON")?;
            let record = Record::from_json(value)?;
            println!("{}", store.update(&table, &record)?);
        }
        Command::Delete { table, id } => println!("{}", store.delete(&table, &id)?),
        Command::Search { table, needle } => {
            for record in store.search(&table, &needle)? {
                print_record(&record)?;
            }
        }
        Command::Head { table, n } => {
            for record in store.first_n(&table, n)? {
                print_record(&record)?;
            }
        }
        Command::Clear { table } => println!("{}", store.clear(&table)?),
        Command::Import {
            table,
            file,
            replace,
        } => {
            let rows = if replace {
                transfer.import_replacing(&table, &file)?
            } else {
                transfer.import_from(&table, &file)?
            };
            println!("{rows}");
        }
        Command::Export { table, file } => match transfer.export_to(&table, &file)? {
            ExportOutcome::Written { rows } => println!("{rows}"),
            ExportOutcome::NothingToExport => println!("0"),
        },
        Command::Headers { table, file } => transfer.export_headers_only(&table, &file)?,
        Command::AllHeaders { dir } => {
            for path in transfer.export_all_headers(&dir)? {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

fn print_record(record: &Record) -> Result<()> {
    println!("{}", serde_json::to_string(record)?);
    Ok(())
}
