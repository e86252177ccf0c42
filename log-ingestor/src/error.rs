use std::{io, path::PathBuf};

use thiserror::Error;
use tokio::task::JoinError;

/// Why a single access-log line was rejected. Line-local; never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed line: {0}")]
    MalformedLine(&'static str),

    #[error("bad timestamp: {0:?}")]
    BadTimestamp(String),

    #[error("bad number in {field}: {value:?}")]
    BadNumber { field: &'static str, value: String },
}

impl ParseError {
    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedLine(_) => "malformed_line",
            Self::BadTimestamp(_) => "bad_timestamp",
            Self::BadNumber { .. } => "bad_number",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store worker failed: {0}")]
    Worker(#[from] JoinError),

    #[error("invalid stored row {id}: {reason}")]
    InvalidRow { id: i64, reason: String },
}

/// Failure of a whole ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("log file {} unavailable: {source}", .path.display())]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("batch write failed: {0}")]
    StoreWriteFailed(#[source] StoreError),

    #[error("run cancelled before the batch was written")]
    Cancelled,
}

impl IngestError {
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::FileUnavailable { .. } => "file_unavailable",
            Self::StoreWriteFailed(_) => "store_write_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryInputError {
    #[error("{0:?} is not a number")]
    NotANumber(String),

    #[error("{0} is outside 100..=599")]
    OutOfRange(i64),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Input(#[from] QueryInputError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
