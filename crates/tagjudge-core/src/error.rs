//! Error types for Tagjudge

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing column `{column}` in {file}")]
    MissingColumn { file: String, column: String },

    #[error("prompt `{key}` not found at {path}")]
    PromptMissing { key: String, path: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn missing_column(file: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            file: file.into(),
            column: column.into(),
        }
    }

    pub fn prompt_missing(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self::PromptMissing {
            key: key.into(),
            path: path.into(),
        }
    }

    /// Batch-level failures indicate a structural mismatch in the inputs,
    /// not a problem with any single sample.
    pub fn is_upstream_data_error(&self) -> bool {
        matches!(self, Self::MissingColumn { .. } | Self::Csv(_))
    }
}
