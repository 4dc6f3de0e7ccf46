//! `salesrecon-pipeline` — turns heterogeneous channel exports into one
//! monthly fact table.
//!
//! Discover → read (per channel adapter) → map columns → validate →
//! settle periods → backfill names → aggregate. Source-level problems
//! become diagnostics in the [`BatchSummary`]; only configuration errors
//! abort a run.

pub mod adapter;
pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod discover;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod period;
pub mod validate;

pub use adapter::{ChannelAdapter, ChannelProfile, ChannelRegistry};
pub use aggregate::{aggregate, merge, Contribution, FactKey};
pub use catalog::ProductCatalog;
pub use config::{PipelineConfig, UnresolvedPeriod};
pub use discover::{discover_sources, SourceSpec};
pub use engine::{run, run_sources, PipelineRun};
pub use error::PipelineError;
pub use evidence::{BatchSummary, ChannelSummary, DiagnosticKind, SourceDiagnostic};
pub use validate::{validate, RejectReason};
