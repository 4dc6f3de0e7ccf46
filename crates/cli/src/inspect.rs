//! `salesrecon inspect` — how one source is read and which header feeds
//! each canonical field.

use std::collections::BTreeMap;
use std::path::PathBuf;

use salesrecon_core::{AliasTable, CanonicalField, Channel};
use salesrecon_io::{read_source, ReadOptions, SourceRead};
use salesrecon_pipeline::adapter::DEFAULT_REQUIRED;
use salesrecon_pipeline::{ChannelRegistry, PipelineConfig};
use serde::Serialize;

use crate::exit_codes::EXIT_RUNTIME;
use crate::CliError;

#[derive(Debug, Serialize)]
struct InspectReport {
    file: String,
    channel: Channel,
    kind: &'static str,
    tables: Vec<TableReport>,
    skipped: Vec<SkippedReport>,
}

#[derive(Debug, Serialize)]
struct TableReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    sheet: Option<String>,
    headers: Vec<String>,
    rows: usize,
    mapping: BTreeMap<CanonicalField, String>,
    missing: Vec<CanonicalField>,
}

#[derive(Debug, Serialize)]
struct SkippedReport {
    name: String,
    reason: String,
}

pub fn cmd_inspect(
    file: PathBuf,
    channel: Option<String>,
    config_path: Option<PathBuf>,
    json_output: bool,
) -> Result<(), CliError> {
    let (registry, mut options) = match &config_path {
        Some(path) => {
            let config = PipelineConfig::from_file(path).map_err(CliError::pipeline)?;
            let registry = ChannelRegistry::from_config(&config).map_err(CliError::pipeline)?;
            let options = ReadOptions {
                delimiter: config.delimiter(),
                max_bytes: config.max_file_bytes,
                ..ReadOptions::default()
            };
            (registry, options)
        }
        None => (ChannelRegistry::builtin(), ReadOptions::default()),
    };

    let channel = registry
        .resolve(&file, channel.as_deref())
        .map_err(|e| CliError::args(e.to_string()))?;
    let adapter = registry.get(channel);
    if adapter.is_none() {
        tracing::warn!(file = %file.display(), "channel not identified; using the shared alias table");
    }

    let read: SourceRead = match adapter {
        Some(adapter) => adapter.read(&file, &options),
        None => {
            options.sheet_filter = None;
            read_source(&file, &options)
        }
    }
    .map_err(|e| CliError::new(EXIT_RUNTIME, e.to_string()))?;

    let builtin = AliasTable::builtin();
    let aliases = adapter.map(|a| a.field_aliases()).unwrap_or(&builtin);
    let required = adapter.map(|a| a.required_fields()).unwrap_or(&DEFAULT_REQUIRED[..]);

    let report = InspectReport {
        file: file.display().to_string(),
        channel,
        kind: read.kind.as_str(),
        tables: read
            .tables
            .iter()
            .map(|table| {
                let mapping = aliases.map_headers(&table.headers);
                TableReport {
                    sheet: table.sheet.clone(),
                    headers: table.headers.clone(),
                    rows: table.rows.len(),
                    missing: mapping.missing(required),
                    mapping: mapping.iter().map(|(f, h)| (f, h.to_string())).collect(),
                }
            })
            .collect(),
        skipped: read
            .skipped
            .iter()
            .map(|s| SkippedReport { name: s.name.clone(), reason: s.reason.clone() })
            .collect(),
    };

    if json_output {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &InspectReport) {
    println!("{}  channel={}  kind={}", report.file, report.channel, report.kind);
    for table in &report.tables {
        match &table.sheet {
            Some(sheet) => println!("\n[{}]  {} row(s)", sheet, table.rows),
            None => println!("\n{} row(s)", table.rows),
        }
        for field in CanonicalField::ALL {
            match table.mapping.get(&field) {
                Some(header) => println!("  {:<13} <- {}", field.as_str(), header),
                None => println!("  {:<13} -", field.as_str()),
            }
        }
        if !table.missing.is_empty() {
            let names: Vec<&str> = table.missing.iter().map(|f| f.as_str()).collect();
            println!("  missing required: {}", names.join(", "));
        }
    }
    for skipped in &report.skipped {
        println!("\nskipped [{}]: {}", skipped.name, skipped.reason);
    }
}
