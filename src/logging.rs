//! Logging bootstrap, powered by tracing-subscriber.
//!
//! The library only emits `tracing` events. Binaries call `init_logging`
//! once at startup to install a console layer and, optionally, an
//! append-mode file layer.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Deserialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base level or full filter directive, e.g. `info` or `bike_log=debug`.
    pub level: String,
    /// Write events to stderr.
    pub console: bool,
    /// Also append events to this file.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            file: None,
        }
    }
}

/// Build the `EnvFilter` from the base level, keeping SQLite internals quiet.
pub fn build_env_filter(level: &str) -> anyhow::Result<EnvFilter> {
    let filter_str = format!("{level},rusqlite=warn");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", filter_str, e))
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let console_layer = if config.console {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(build_env_filter(&config.level)?),
        )
    } else {
        None
    };

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let log_file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(log_file))
                    .with_target(true)
                    .with_filter(build_env_filter(&config.level)?)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::trace!(
        "Logging initialized: level={}, console={}, file={:?}",
        config.level,
        config.console,
        config.file
    );
    Ok(())
}
