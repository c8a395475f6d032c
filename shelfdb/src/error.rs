use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfDbError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Record not found: {selector}")]
    NotFound { selector: String },

    #[error("Record id '{id}' is ambiguous: {matches} records share it, select by index instead")]
    AmbiguousId { id: String, matches: usize },

    #[error("Storage unavailable at {}: {source}", .path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Lookup error: {0}")]
    Lookup(String),
}

impl ShelfDbError {
    /// Wrap an I/O failure together with the path it happened on.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ShelfDbError::StorageUnavailable {
            path: path.into(),
            source,
        }
    }

    /// True for failures caused by user input rather than the environment.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ShelfDbError::Validation(_)
                | ShelfDbError::NotFound { .. }
                | ShelfDbError::AmbiguousId { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ShelfDbError>;
