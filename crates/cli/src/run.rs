//! `salesrecon run` / `salesrecon validate`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use salesrecon_core::AggregatedFact;
use salesrecon_io::{write_facts, write_facts_csv, write_facts_xlsx};
use salesrecon_pipeline::{BatchSummary, PipelineConfig};

use crate::exit_codes::{EXIT_NO_SOURCE, EXIT_RUNTIME};
use crate::CliError;

fn load_config(path: &Path) -> Result<PipelineConfig, CliError> {
    PipelineConfig::from_file(path).map_err(CliError::pipeline)
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!(
        "{}: ok ({} source pattern(s), {} channel override(s), unresolved periods: {:?})",
        config.name,
        config.sources.len(),
        config.channels.len(),
        config.unresolved_period,
    );
    Ok(())
}

pub fn cmd_run(
    config_path: PathBuf,
    output: Option<PathBuf>,
    json_output: bool,
    summary_file: Option<PathBuf>,
    workers: Option<u16>,
) -> Result<(), CliError> {
    if json_output && output.is_none() {
        return Err(CliError::args("--json prints the summary on stdout, so the facts need --output")
            .with_hint("add -o facts.csv or -o facts.xlsx"));
    }

    let mut config = load_config(&config_path)?;
    if let Some(workers) = workers {
        config.workers = Some(workers as usize);
    }
    let result = salesrecon_pipeline::run(&config).map_err(CliError::pipeline)?;
    let summary = &result.summary;

    print_summary(summary);

    if summary.readable_sources() == 0 {
        return Err(CliError::new(EXIT_NO_SOURCE, "no readable source; nothing to aggregate")
            .with_hint("check the [[sources]] patterns and the diagnostics above"));
    }

    match &output {
        Some(path) => write_output(path, &result.facts)?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_facts(&mut handle, &result.facts).map_err(|e| CliError::new(EXIT_RUNTIME, e.to_string()))?;
            handle.flush().map_err(|e| CliError::new(EXIT_RUNTIME, e.to_string()))?;
        }
    }

    if json_output || summary_file.is_some() {
        let json_str = serde_json::to_string_pretty(summary)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;
        if let Some(ref path) = summary_file {
            std::fs::write(path, &json_str)
                .map_err(|e| CliError::new(EXIT_RUNTIME, format!("cannot write summary: {e}")))?;
            eprintln!("wrote {}", path.display());
        }
        if json_output {
            println!("{json_str}");
        }
    }

    Ok(())
}

fn write_output(path: &Path, facts: &[AggregatedFact]) -> Result<(), CliError> {
    let is_workbook = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    let written = if is_workbook {
        write_facts_xlsx(path, facts)
    } else {
        write_facts_csv(path, facts)
    };
    written.map_err(|e| CliError::new(EXIT_RUNTIME, e.to_string()))?;
    eprintln!("wrote {} ({} facts)", path.display(), facts.len());
    Ok(())
}

/// Human summary to stderr.
fn print_summary(summary: &BatchSummary) {
    let totals = summary.totals();
    eprintln!(
        "{}: {} source(s), {} fact(s); {} rows read, {} accepted, {} quarantined, {} rejected",
        summary.name,
        summary.sources,
        summary.facts,
        totals.rows_read,
        totals.rows_accepted,
        totals.quarantined,
        totals.total_rejected(),
    );
    for (channel, s) in &summary.channels {
        let reasons: Vec<String> = s.rejected.iter().map(|(r, n)| format!("{r}={n}")).collect();
        eprintln!(
            "  {:<14} sources {}/{}  rows {}/{}  facts {}  imputed {}{}",
            channel.as_str(),
            s.sources_read,
            s.sources_read + s.sources_skipped,
            s.rows_accepted,
            s.rows_read,
            s.facts,
            s.imputed,
            if reasons.is_empty() { String::new() } else { format!("  rejected: {}", reasons.join(", ")) },
        );
    }
    for d in &summary.diagnostics {
        match &d.sheet {
            Some(sheet) => eprintln!("  ! {}[{}]: {}", d.source, sheet, d.message),
            None => eprintln!("  ! {}: {}", d.source, d.message),
        }
    }
}
