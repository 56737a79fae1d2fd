mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::portfolio::{AllocateArgs, FrontierArgs, OptimizeArgs, RiskArgs};

/// Long-only portfolio optimization and risk analytics
#[derive(Parser)]
#[command(
    name = "pfe",
    version,
    about = "Long-only portfolio optimization and risk analytics",
    long_about = "A CLI for mean-variance portfolio optimization with decimal precision. \
                  Supports max-Sharpe and min-volatility weights, parametric and historical \
                  VaR, efficient frontiers, and cent-exact allocations."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (JSON); omitted fields use defaults
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize portfolio weights (max Sharpe or min volatility)
    Optimize(OptimizeArgs),
    /// Risk assessment (VaR, volatility, drawdown) for given weights
    Risk(RiskArgs),
    /// Sample the efficient frontier
    Frontier(FrontierArgs),
    /// Split a portfolio value across fixed weights
    Allocate(AllocateArgs),
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

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = cli.config.as_deref();
    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Optimize(args) => commands::portfolio::run_optimize(args, config),
        Commands::Risk(args) => commands::portfolio::run_risk(args, config),
        Commands::Frontier(args) => commands::portfolio::run_frontier(args, config),
        Commands::Allocate(args) => commands::portfolio::run_allocate(args),
        Commands::Version => {
            println!("pfe {}", env!("CARGO_PKG_VERSION"));
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
