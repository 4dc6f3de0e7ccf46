//! Batch summary: what was read, what was dropped and why.

use std::collections::BTreeMap;

use salesrecon_core::Channel;
use salesrecon_io::SourceError;
use serde::Serialize;

use crate::validate::RejectReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    NoMatch,
    UnknownChannel,
    Unreadable,
    TooLarge,
    Unsupported,
    MalformedDocument,
    SkippedSheet,
    MissingRequiredColumn,
}

/// One source-level problem. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDiagnostic {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub channel: Channel,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl SourceDiagnostic {
    pub fn from_source_error(channel: Channel, err: &SourceError) -> Self {
        let (source, kind) = match err {
            SourceError::Read { path, .. } | SourceError::Delimited { path, .. } | SourceError::Workbook { path, .. } => {
                (path, DiagnosticKind::Unreadable)
            }
            SourceError::TooLarge { path, .. } => (path, DiagnosticKind::TooLarge),
            SourceError::Unsupported { path } => (path, DiagnosticKind::Unsupported),
            SourceError::MalformedDocument { path, .. } => (path, DiagnosticKind::MalformedDocument),
            SourceError::Write { path, .. } => (path, DiagnosticKind::Unreadable),
        };
        Self {
            source: source.display().to_string(),
            sheet: None,
            channel,
            kind,
            message: err.to_string(),
        }
    }
}

/// Counters for one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    pub sources_read: usize,
    pub sources_skipped: usize,
    pub tables_read: usize,
    /// Tables dropped because a required column could not be mapped.
    pub tables_rejected: usize,
    pub malformed_documents: usize,
    pub rows_read: usize,
    /// Rows that reached aggregation.
    pub rows_accepted: usize,
    /// Rows carrying a review marker. Not included in `rejected`.
    pub quarantined: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
    /// Numeric fields that could not be parsed and counted as zero.
    pub unparsable_values: usize,
    pub imputed: usize,
    pub names_backfilled: usize,
    pub facts: usize,
}

impl ChannelSummary {
    pub fn reject(&mut self, reason: RejectReason) {
        if reason == RejectReason::Quarantined {
            self.quarantined += 1;
        } else {
            *self.rejected.entry(reason).or_insert(0) += 1;
        }
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }

    /// Add another summary's counters into this one.
    pub fn absorb(&mut self, other: &ChannelSummary) {
        self.sources_read += other.sources_read;
        self.sources_skipped += other.sources_skipped;
        self.tables_read += other.tables_read;
        self.tables_rejected += other.tables_rejected;
        self.malformed_documents += other.malformed_documents;
        self.rows_read += other.rows_read;
        self.rows_accepted += other.rows_accepted;
        self.quarantined += other.quarantined;
        for (reason, n) in &other.rejected {
            *self.rejected.entry(*reason).or_insert(0) += n;
        }
        self.unparsable_values += other.unparsable_values;
        self.imputed += other.imputed;
        self.names_backfilled += other.names_backfilled;
        self.facts += other.facts;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub name: String,
    pub engine_version: String,
    pub run_at: String,
    pub sources: usize,
    pub facts: usize,
    pub channels: BTreeMap<Channel, ChannelSummary>,
    pub diagnostics: Vec<SourceDiagnostic>,
}

impl BatchSummary {
    /// Sum over every channel.
    pub fn totals(&self) -> ChannelSummary {
        let mut total = ChannelSummary::default();
        for summary in self.channels.values() {
            total.absorb(summary);
        }
        total
    }

    /// Sources that were opened and read, in any channel.
    pub fn readable_sources(&self) -> usize {
        self.channels.values().map(|c| c.sources_read).sum()
    }
}
