// salesrecon - consolidate channel sales exports into a monthly fact table

mod exit_codes;
mod inspect;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "salesrecon")]
#[command(about = "Consolidate marketplace sales exports into one monthly fact table")]
#[command(version)]
struct Cli {
    /// Debug logging (column mappings, rejected rows)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline described by a TOML config
    #[command(after_help = "\
Examples:
  salesrecon run fechamento.toml -o base.xlsx
  salesrecon run fechamento.toml -o base.csv --summary resumo.json
  salesrecon run fechamento.toml -o base.csv --json | jq .channels
  salesrecon run fechamento.toml > base.csv")]
    Run {
        /// Path to the pipeline config
        config: PathBuf,

        /// Fact table destination; .xlsx writes a workbook, anything else CSV.
        /// Omit to write CSV to stdout.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Print the batch summary as JSON on stdout (requires --output)
        #[arg(long)]
        json: bool,

        /// Also write the batch summary JSON to this file
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Worker threads (overrides `workers` in the config)
        #[arg(long, short = 'j', value_parser = clap::value_parser!(u16).range(1..))]
        workers: Option<u16>,
    },

    /// Parse and validate a config without reading any source
    #[command(after_help = "\
Examples:
  salesrecon validate fechamento.toml")]
    Validate {
        /// Path to the pipeline config
        config: PathBuf,
    },

    /// Show how one source file would be read and mapped
    #[command(after_help = "\
Examples:
  salesrecon inspect dados/Vendas_ML_abr_2024.xlsx
  salesrecon inspect export.csv --channel shopee
  salesrecon inspect nota.xml --json
  salesrecon inspect dados/amz.csv --config fechamento.toml")]
    Inspect {
        /// Source file (.csv, .txt, .xlsx, .xls, .ods, .xml)
        file: PathBuf,

        /// Channel to read as (otherwise identified from the file name)
        #[arg(long)]
        channel: Option<String>,

        /// Apply channel overrides and delimiter from this config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output JSON instead of a human listing
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn pipeline(err: salesrecon_pipeline::PipelineError) -> Self {
        Self::new(exit_codes::pipeline_exit_code(&err), err.to_string())
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Log to stderr; stdout is reserved for data. `RUST_LOG` wins over the
/// default unless `--verbose` is given.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("salesrecon=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("salesrecon=info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, output, json, summary, workers } => {
            run::cmd_run(config, output, json, summary, workers)
        }
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::Inspect { file, channel, config, json } => inspect::cmd_inspect(file, channel, config, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
