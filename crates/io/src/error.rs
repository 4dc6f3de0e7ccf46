use std::path::PathBuf;

use thiserror::Error;

/// Failure reading or writing one physical file.
///
/// A `SourceError` fails that one source. The orchestrator records it as a
/// diagnostic and moves on to the next file.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is {size} bytes, above the {limit}-byte limit")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("{path}: unsupported file type")]
    Unsupported { path: PathBuf },

    #[error("{path}: malformed delimited text: {message}")]
    Delimited { path: PathBuf, message: String },

    #[error("{path}: cannot open workbook: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("{path}: malformed invoice document: {message}")]
    MalformedDocument { path: PathBuf, message: String },

    #[error("cannot write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

impl SourceError {
    /// Short machine-readable kind, used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::TooLarge { .. } => "too_large",
            Self::Unsupported { .. } => "unsupported",
            Self::Delimited { .. } => "delimited",
            Self::Workbook { .. } => "workbook",
            Self::MalformedDocument { .. } => "malformed_document",
            Self::Write { .. } => "write",
        }
    }
}
