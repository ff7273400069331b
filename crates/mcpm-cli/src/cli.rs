//! Command-line interface definition using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mcpm_runtime::DEFAULT_RCON_PORT;

/// Build version string with git hash and build date.
fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const BUILD_DATE: &str = env!("BUILD_DATE");

    // Format: "0.1.0 (abc1234, 2026-01-29)"
    static VERSION_STRING: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} ({}, {})", VERSION, GIT_HASH, BUILD_DATE))
}

/// mcpm - Minecraft server process manager
#[derive(Parser, Debug)]
#[command(name = "mcpm")]
#[command(author, version = version_string(), about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to the servers config file
    #[arg(short, long, env = "MCPM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run configured servers, print their events and forward stdin as commands
    Run {
        /// Servers to run (default: all configured)
        #[arg(short, long = "server")]
        servers: Vec<String>,
    },

    /// List configured servers
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Classify log lines from a file, or stdin if omitted
    Classify {
        /// Log file to read
        file: Option<PathBuf>,

        /// Use the pattern overrides of this configured server
        #[arg(short, long)]
        server: Option<String>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Send one command over RCON and print the response
    Rcon {
        /// RCON host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// RCON port
        #[arg(short, long, default_value_t = DEFAULT_RCON_PORT)]
        port: u16,

        /// RCON password
        #[arg(long, env = "MCPM_RCON_PASSWORD", hide_env_values = true, default_value = "")]
        password: String,

        /// Timeout in seconds for connecting and for the response
        #[arg(short, long, default_value_t = 5)]
        timeout: u64,

        /// Command words
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Brief,
}

impl Cli {
    /// Returns the config file path, using default if not specified.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".mcpm"))
                .unwrap_or_else(|| PathBuf::from(".mcpm"))
                .join("servers.json")
        })
    }

    /// Returns the log level based on verbosity.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
