use std::collections::BTreeMap;

use rayon::prelude::*;
use salesrecon_core::{AggregatedFact, CanonicalSalesRecord, Channel};
use salesrecon_io::{ContainerKind, ReadOptions, SourceError};

use crate::adapter::ChannelRegistry;
use crate::aggregate::{aggregate, merge};
use crate::catalog::ProductCatalog;
use crate::config::{PipelineConfig, UnresolvedPeriod};
use crate::discover::{discover_sources, resolve_path, SourceSpec};
use crate::error::PipelineError;
use crate::evidence::{BatchSummary, ChannelSummary, DiagnosticKind, SourceDiagnostic};
use crate::period::{period_from_file_name, Imputation};
use crate::validate::{validate, QuarantineMarkers, RejectReason, RowContext};

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub facts: Vec<AggregatedFact>,
    pub summary: BatchSummary,
}

/// Discover the configured sources and run the pipeline over them.
pub fn run(config: &PipelineConfig) -> Result<PipelineRun, PipelineError> {
    let registry = ChannelRegistry::from_config(config)?;
    let (sources, diagnostics) = discover_sources(config, &registry)?;
    let mut result = run_sources(config, &registry, &sources)?;
    if !diagnostics.is_empty() {
        let mut all = diagnostics;
        all.append(&mut result.summary.diagnostics);
        result.summary.diagnostics = all;
    }
    Ok(result)
}

/// Everything one source produced. Built on a worker, merged on the caller.
#[derive(Debug)]
struct SourceOutcome {
    channel: Channel,
    records: Vec<CanonicalSalesRecord>,
    stats: ChannelSummary,
    diagnostics: Vec<SourceDiagnostic>,
}

struct RunContext<'a> {
    registry: &'a ChannelRegistry,
    options: ReadOptions,
    markers: QuarantineMarkers,
}

/// Run over an explicit source list.
///
/// Sources are processed on a worker pool in path order; records keep that
/// arrival order (path, then sheet, then row) through aggregation.
pub fn run_sources(
    config: &PipelineConfig,
    registry: &ChannelRegistry,
    sources: &[SourceSpec],
) -> Result<PipelineRun, PipelineError> {
    let options = ReadOptions {
        delimiter: config.delimiter(),
        sheet_filter: None,
        max_bytes: config.max_file_bytes,
    };

    let catalog = match &config.catalog {
        Some(c) => Some(
            ProductCatalog::load(&resolve_path(&config.base_dir, &c.path), &options)
                .map_err(PipelineError::Catalog)?,
        ),
        None => None,
    };

    let mut sorted = sources.to_vec();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let ctx = RunContext {
        registry,
        options,
        markers: QuarantineMarkers::new(&config.quarantine_markers),
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.unwrap_or(0))
        .build()
        .map_err(|e| PipelineError::Pool(e.to_string()))?;
    let outcomes: Vec<SourceOutcome> =
        pool.install(|| sorted.par_iter().map(|source| process_source(source, &ctx)).collect());

    // Collect per channel, in source order.
    let mut records: BTreeMap<Channel, Vec<CanonicalSalesRecord>> = BTreeMap::new();
    let mut channels: BTreeMap<Channel, ChannelSummary> = BTreeMap::new();
    let mut diagnostics = Vec::new();
    for outcome in outcomes {
        let channel = outcome.channel;
        channels.entry(channel).or_default().absorb(&outcome.stats);
        records.entry(channel).or_default().extend(outcome.records);
        diagnostics.extend(outcome.diagnostics);
    }

    let mut partials = Vec::new();
    for (channel, mut channel_records) in records {
        let stats = channels.entry(channel).or_default();
        resolve_periods(config, channel, &mut channel_records, stats);
        if let Some(catalog) = &catalog {
            stats.names_backfilled += catalog.backfill(&mut channel_records);
        }
        let facts = aggregate(&channel_records);
        stats.facts = facts.len();
        if channel.is_known() && stats.sources_read == 0 {
            tracing::warn!(channel = %channel, "no readable source; channel contributes no facts");
        }
        partials.push(facts);
    }

    let facts = merge(&partials);
    tracing::info!(sources = sorted.len(), facts = facts.len(), "pipeline finished");

    Ok(PipelineRun {
        summary: BatchSummary {
            name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            sources: sorted.len(),
            facts: facts.len(),
            channels,
            diagnostics,
        },
        facts,
    })
}

/// Settle records still without a period: impute when the run allows it
/// and the channel has a strategy, reject otherwise.
fn resolve_periods(
    config: &PipelineConfig,
    channel: Channel,
    records: &mut Vec<CanonicalSalesRecord>,
    stats: &mut ChannelSummary,
) {
    let unresolved = records.iter().filter(|r| r.period.is_none()).count();
    if unresolved == 0 {
        return;
    }

    let imputation = match config.unresolved_period {
        UnresolvedPeriod::Impute => config
            .channel(channel)
            .and_then(|c| c.imputation.as_ref())
            .and_then(Imputation::from_config),
        UnresolvedPeriod::Reject => None,
    };

    match imputation {
        Some(imputation) => {
            let mut periods = imputation.assign(unresolved).into_iter();
            for record in records.iter_mut().filter(|r| r.period.is_none()) {
                record.period = periods.next();
            }
            stats.imputed += unresolved;
            tracing::info!(channel = %channel, records = unresolved, "periods imputed");
        }
        None => {
            records.retain(|r| r.period.is_some());
            for _ in 0..unresolved {
                stats.reject(RejectReason::UnresolvedPeriod);
            }
            stats.rows_accepted -= unresolved;
            tracing::warn!(channel = %channel, records = unresolved, "records without a period rejected");
        }
    }
}

fn process_source(source: &SourceSpec, ctx: &RunContext<'_>) -> SourceOutcome {
    let mut outcome = SourceOutcome {
        channel: source.channel,
        records: Vec::new(),
        stats: ChannelSummary::default(),
        diagnostics: Vec::new(),
    };
    let source_display = source.path.display().to_string();

    let Some(adapter) = ctx.registry.get(source.channel) else {
        tracing::warn!(source = %source_display, "cannot identify channel; source skipped");
        outcome.stats.sources_skipped += 1;
        outcome.diagnostics.push(SourceDiagnostic {
            source: source_display,
            sheet: None,
            channel: source.channel,
            kind: DiagnosticKind::UnknownChannel,
            message: "no channel matches this file name".into(),
        });
        return outcome;
    };

    let read = match adapter.read(&source.path, &ctx.options) {
        Ok(read) => read,
        Err(e) => {
            tracing::warn!(source = %source_display, channel = %source.channel, error = %e, "source skipped");
            outcome.stats.sources_skipped += 1;
            if matches!(e, SourceError::MalformedDocument { .. }) {
                outcome.stats.malformed_documents += 1;
            }
            outcome.diagnostics.push(SourceDiagnostic::from_source_error(source.channel, &e));
            return outcome;
        }
    };
    outcome.stats.sources_read += 1;

    for skipped in &read.skipped {
        outcome.diagnostics.push(SourceDiagnostic {
            source: source_display.clone(),
            sheet: Some(skipped.name.clone()),
            channel: source.channel,
            kind: DiagnosticKind::SkippedSheet,
            message: skipped.reason.clone(),
        });
    }

    let file_period = if adapter.period_from_file_name() {
        source
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(period_from_file_name)
    } else {
        None
    };

    for table in &read.tables {
        if table.headers.is_empty() && table.rows.is_empty() {
            tracing::debug!(table = %table.label(), "empty table");
            continue;
        }

        let mapping = adapter.field_aliases().map_headers(&table.headers);
        let missing = mapping.missing(adapter.required_fields());
        if !missing.is_empty() {
            let fields: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
            tracing::warn!(
                table = %table.label(),
                missing = %fields.join(", "),
                "required column not found; table skipped"
            );
            outcome.stats.tables_rejected += 1;
            outcome.diagnostics.push(SourceDiagnostic {
                source: source_display.clone(),
                sheet: table.sheet.clone(),
                channel: source.channel,
                kind: DiagnosticKind::MissingRequiredColumn,
                message: format!(
                    "missing {} (headers: {})",
                    fields.join(", "),
                    table.headers.join(" | ")
                ),
            });
            continue;
        }
        for (field, header) in mapping.iter() {
            tracing::debug!(table = %table.label(), field = %field, header = %header, "column mapped");
        }
        outcome.stats.tables_read += 1;

        let row_ctx = RowContext {
            channel: source.channel,
            mapping: &mapping,
            locale: source.locale,
            file_period,
            markers: &ctx.markers,
        };
        for row in &table.rows {
            outcome.stats.rows_read += 1;
            match validate(row, &row_ctx) {
                Ok(valid) => {
                    outcome.stats.rows_accepted += 1;
                    outcome.stats.unparsable_values += valid.unparsable;
                    outcome.records.push(valid.record);
                }
                Err(rejected) => {
                    tracing::debug!(origin = %rejected.origin, reason = %rejected.reason, "row rejected");
                    outcome.stats.reject(rejected.reason);
                }
            }
        }
    }

    let kind = ContainerKind::from_path(&source.path).map(|k| k.as_str()).unwrap_or("?");
    tracing::info!(
        source = %source_display,
        channel = %source.channel,
        kind,
        rows = outcome.stats.rows_read,
        accepted = outcome.stats.rows_accepted,
        "source processed"
    );
    outcome
}
