// dutycheck CLI - reconcile supplier invoices against a customs checklist

mod exit_codes;
mod logging;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE, EXIT_WRITE_FAILED};
use logging::LogFormat;

#[derive(Parser)]
#[command(name = "dutycheck")]
#[command(about = "Reconcile supplier invoices against a customs checklist")]
#[command(version)]
struct Cli {
    /// Debug logging (per-field differences, fuzzy-match decisions)
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize inputs, reconcile and write every output workbook
    #[command(after_help = "\
Examples:
  dutycheck run recon.toml
  dutycheck run recon.toml --json
  dutycheck run recon.toml --tolerance 2.5 --draft revise.txt
  dutycheck run --rates rates.xlsx --checklist checklist.xlsx --invoice march.xlsx
  dutycheck run recon.toml --invoice april.xlsx --out-dir out/april")]
    Run {
        /// Path to the TOML config file (defaults apply when omitted)
        config: Option<PathBuf>,

        #[command(flatten)]
        args: recon::RunArgs,
    },

    /// Validate a config without running
    #[command(after_help = "\
Examples:
  dutycheck validate recon.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },

    /// Show how item names resolve against a rate table
    #[command(after_help = "\
Examples:
  dutycheck resolve --rates rates.xlsx \"Connector Assy\" Capacitor
  dutycheck resolve --config recon.toml --rates rates.xlsx \"Relay-PART NO\" --json")]
    Resolve {
        /// Config whose [rate_table] layout applies
        #[arg(long)]
        config: Option<PathBuf>,

        /// Rate table workbook
        #[arg(long)]
        rates: PathBuf,

        /// Item names to look up
        #[arg(required = true)]
        names: Vec<String>,

        /// Output JSON to stdout instead of a table
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

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::new(EXIT_WRITE_FAILED, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet, cli.log_format);

    let result = match cli.command {
        Commands::Run { config, args } => recon::cmd_run(config, args),
        Commands::Validate { config } => recon::cmd_validate(config),
        Commands::Resolve { config, rates, names, json } => {
            recon::cmd_resolve(config, rates, names, json)
        }
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
