//! CLI command implementations.

pub mod check_config;
pub mod decode_job;
pub mod plan_categories;

use shopsync_core::SyncError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// The file.
        path: PathBuf,
        /// The cause.
        #[source]
        source: std::io::Error,
    },

    /// A connector error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// JSON input or output failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Bad command-line input.
    #[error("{0}")]
    Usage(String),
}

/// Result type of the commands.
pub type CliResult<T> = Result<T, CliError>;

/// Output format of the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human readable.
    Text,
    /// Pretty JSON.
    Json,
}

impl Format {
    /// Parses `text` or `json`.
    pub fn parse(value: &str) -> CliResult<Self> {
        match value {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(CliError::Usage(format!(
                "unknown format {:?}, expected text or json",
                other
            ))),
        }
    }
}

fn read_file(path: &std::path::Path) -> CliResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}
