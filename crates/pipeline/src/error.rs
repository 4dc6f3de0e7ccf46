use std::path::PathBuf;

use salesrecon_io::SourceError;
use thiserror::Error;

/// Batch-level failures. Everything row- or file-level is reported through
/// the batch summary instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (bad channel name, empty bucket, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid source pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("product catalog: {0}")]
    Catalog(#[source] SourceError),

    #[error("cannot start worker pool: {0}")]
    Pool(String),
}
