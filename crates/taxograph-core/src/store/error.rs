use std::path::PathBuf;
use thiserror::Error;

use crate::taxonomy::Level;

/// Errors that can occur while reading from or writing to the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot open store at {path}: {source}")]
    Connectivity {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Graph run not found: {0}")]
    RunNotFound(String),

    #[error("{level} label is empty")]
    BlankLabel { level: Level },

    #[error("Import line {line}: {level} label is empty")]
    InvalidRecord { line: u64, level: Level },

    #[error("Corrupted row in {table}: {message}")]
    Corrupted { table: &'static str, message: String },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn connectivity(path: impl Into<String>, source: rusqlite::Error) -> Self {
        StoreError::Connectivity {
            path: path.into(),
            source,
        }
    }
}
