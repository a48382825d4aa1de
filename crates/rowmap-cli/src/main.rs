//! rowmap CLI
//!
//! Command-line interface for rowmap - reconcile a table with a schema file
//! and read or write its records.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use rowmap_core::Config;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "rowmap")]
#[command(about = "rowmap - schema-reconciling row mapper for SQLite")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Database file (overrides config and ROWMAP_DATABASE)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or extend the table described by a schema file
    Sync {
        /// Schema file (TOML)
        schema: PathBuf,
    },
    /// List every record of a table
    #[command(alias = "ls")]
    List {
        /// Schema file (TOML)
        schema: PathBuf,
    },
    /// Insert a record
    #[command(alias = "add")]
    Insert {
        /// Schema file (TOML)
        schema: PathBuf,
        /// Field assignments, e.g. name=bob age=30 (use `null` for NULL)
        fields: Vec<String>,
    },
    /// Update an existing record by identity
    Update {
        /// Schema file (TOML)
        schema: PathBuf,
        /// Identity of the record
        id: i64,
        /// Field assignments, e.g. age=31
        #[arg(required = true)]
        fields: Vec<String>,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Print the config file path
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }

    init_logging(&config, cli.verbose);
    debug!("Using database {:?}", config.database_path);

    match cli.command {
        Commands::Sync { schema } => commands::sync::sync(&config, &schema, &output),
        Commands::List { schema } => commands::record::list(&config, &schema, &output),
        Commands::Insert { schema, fields } => {
            commands::record::insert(&config, &schema, &fields, &output)
        }
        Commands::Update { schema, id, fields } => {
            commands::record::update(&config, &schema, id, &fields, &output)
        }
        Commands::Config { command } => handle_config_command(command, &config, &output),
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config: &Config,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config, output),
        Some(ConfigCommands::Path) => commands::config::path(output),
    }
}

/// Initialize logging to stderr, or to the configured log file
///
/// `RUST_LOG` wins over `-v`, which wins over the configured level.
fn init_logging(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => config.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rowmap_core={},rowmap_cli={}", level, level)));

    // Ignore errors if a subscriber is already installed
    match &config.log_file {
        Some(log_path) => {
            let log_file = match File::create(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
                    return;
                }
            };
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(log_file)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
