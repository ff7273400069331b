//! mcpm CLI entry point.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use mcpm_cli::cli::Cli;
use mcpm_cli::commands;

fn main() {
    // Load .env.local if it exists (for MCPM_RCON_PASSWORD etc.)
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().to_string()));

    fmt().with_env_filter(filter).with_target(false).init();

    let config_path = cli.config_path();

    if let Err(e) = commands::execute(cli.command, &config_path) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
