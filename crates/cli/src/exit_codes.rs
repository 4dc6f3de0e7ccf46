//! CLI Exit Code Registry
//!
//! Single source of truth for process exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | General error (unspecified)                              |
//! | 2    | Usage error (bad arguments, missing config file)         |
//! | 3    | Invalid configuration (parse, validation, bad pattern)   |
//! | 4    | Runtime I/O (catalog, worker pool, writing outputs)      |
//! | 5    | No readable source: every discovered source was skipped  |
//!
//! Per-source problems (unreadable file, malformed invoice, missing
//! columns) never change the exit code; they are listed in the summary.

use salesrecon_pipeline::PipelineError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure. Prefer a specific code.
#[allow(dead_code)]
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing input file.
pub const EXIT_USAGE: u8 = 2;

/// Config could not be parsed or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Reading the catalog, starting workers or writing an output failed.
pub const EXIT_RUNTIME: u8 = 4;

/// The run found nothing it could read.
pub const EXIT_NO_SOURCE: u8 = 5;

/// Map a PipelineError to its exit code.
pub fn pipeline_exit_code(err: &PipelineError) -> u8 {
    match err {
        PipelineError::ConfigRead { .. } => EXIT_USAGE,
        PipelineError::ConfigParse(_)
        | PipelineError::ConfigValidation(_)
        | PipelineError::Pattern { .. } => EXIT_INVALID_CONFIG,
        PipelineError::Catalog(_) | PipelineError::Pool(_) => EXIT_RUNTIME,
    }
}
