use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Library error type
// ---------------------------------------------------------------------------

/// Errors raised by the data, analysis and controller layers.
///
/// Empty filter results are not represented here: they are a normal outcome
/// and are reported through [`crate::data::filter::EmptyReason`].
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("dataset '{0}' not found")]
    NotFound(String),

    #[error("{}: line {line}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: u64,
        message: String,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: missing required column '{column}'", file.display())]
    MissingColumn { file: PathBuf, column: String },

    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("dataset '{name}' is unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("not enough data: {0}")]
    InsufficientData(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;

impl DashboardError {
    pub(crate) fn parse(file: impl Into<PathBuf>, line: u64, message: impl Into<String>) -> Self {
        DashboardError::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}
