mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::consolidation::ConsolidateArgs;
use commands::lease_accounting::{CalculateArgs, ContractArgs};

/// Lease amortization, escalation and journal calculations
#[derive(Parser)]
#[command(
    name = "lease-engine",
    version,
    about = "Lease amortization, escalation and journal calculations",
    long_about = "A CLI for day-accurate IFRS 16 / Ind AS 116 / ASC 842 lease accounting \
                  with decimal precision. Builds escalated rental schedules, liability and \
                  ROU asset schedules, dual-basis journals, projections and portfolio \
                  consolidations."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log pipeline stages to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate one lease over a window: summary, schedule, journals, projections
    Calculate(CalculateArgs),
    /// Consolidate a portfolio of leases
    Consolidate(ConsolidateArgs),
    /// Emit only the schedule rows for one lease
    Schedule(CalculateArgs),
    /// Expand a contract into escalated rental periods
    RentalPeriods(ContractArgs),
    /// Apply the ASC 842 finance/operating tests
    Classify(ContractArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = cli.config.as_deref();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Calculate(args) => commands::lease_accounting::run_calculate(args, config),
        Commands::Consolidate(args) => commands::consolidation::run_consolidate(args, config),
        Commands::Schedule(args) => commands::lease_accounting::run_schedule(args, config),
        Commands::RentalPeriods(args) => commands::lease_accounting::run_rental_periods(args),
        Commands::Classify(args) => commands::lease_accounting::run_classify(args),
        Commands::Version => {
            println!("lease-engine {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
