//! Binary entry point for csvbridge.
//!
//! This binary provides the CLI interface for translating CSV columns
//! between entity names and remote identifiers.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use csvbridge::cli::{self, Direction, TranslateOptions};
use csvbridge::observability::{self, LoggingConfig};
use csvbridge::{BridgeConfig, CancelFlag, EntityKind};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// csvbridge - Translate CSV columns between entity names and ids.
#[derive(Parser)]
#[command(name = "csvbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server base URL.
    #[arg(long, global = true)]
    server: Option<String>,

    /// Username for basic auth.
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Password for basic auth.
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// Worker threads.
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Add an id column for a name column (or the reverse with --csv-export).
    Translate {
        /// Entity kind the column refers to.
        #[arg(short, long)]
        kind: EntityKind,

        /// Header of the column to translate.
        #[arg(long)]
        column: String,

        /// Input CSV file (stdin if omitted for export).
        #[arg(long)]
        csv_file: Option<PathBuf>,

        /// Translate ids to names instead of names to ids.
        #[arg(long)]
        csv_export: bool,

        /// Write all rows even if some fail.
        #[arg(long)]
        keep_going: bool,
    },

    /// Print names generated from a template such as `web%03d`.
    Namify {
        /// Name template.
        #[arg(short, long)]
        template: String,

        /// Number of names.
        #[arg(short = 'n', long, default_value = "1")]
        count: u64,

        /// First number.
        #[arg(short, long, default_value = "1")]
        start: u64,
    },

    /// List supported entity kinds.
    Kinds,
}

/// Main entry point.
fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => apply_cli_overrides(config.with_env_overrides(), &cli),
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(Some(&config.logging), cli.verbose);
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error_kind = e.kind(), error = %e, "Command failed");
            eprintln!("Error: {e}");
            if let csvbridge::Error::RowsFailed(failures) = &e {
                for failure in failures {
                    eprintln!("  {failure}");
                }
            }
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: &BridgeConfig) -> csvbridge::Result<()> {
    match cli.command {
        Commands::Translate {
            kind,
            column,
            csv_file,
            csv_export,
            keep_going,
        } => {
            let direction = if csv_export {
                Direction::Export
            } else {
                Direction::Import
            };
            if direction == Direction::Import && csv_file.is_none() {
                return Err(csvbridge::Error::InvalidInput(
                    "--csv-file is required for import".to_string(),
                ));
            }
            let options = TranslateOptions::new(kind, column)
                .with_direction(direction)
                .with_keep_going(keep_going || config.keep_going);
            cli::cmd_translate(config, &options, csv_file.as_deref(), install_cancel_handler())
        },

        Commands::Namify {
            template,
            count,
            start,
        } => cli::cmd_namify(&template, count, start),

        Commands::Kinds => cli::cmd_kinds().map_err(|e| csvbridge::Error::OperationFailed {
            operation: "kinds".to_string(),
            cause: e.to_string(),
        }),
    }
}

/// Raises a cancel flag on Ctrl-C.
fn install_cancel_handler() -> CancelFlag {
    let flag = CancelFlag::new();
    let handler_flag = flag.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("Interrupted, stopping after the current rows");
        handler_flag.cancel();
    }) {
        tracing::warn!(error = %e, "Could not install Ctrl-C handler");
    }
    flag
}

/// Loads configuration.
fn load_config(path: Option<&Path>) -> csvbridge::Result<BridgeConfig> {
    // If a path is provided, load from that file
    if let Some(config_path) = path {
        return BridgeConfig::load_from_file(config_path);
    }

    // Environment override for config path
    if let Ok(config_path) = std::env::var("CSVBRIDGE_CONFIG_PATH") {
        if !config_path.trim().is_empty() {
            return BridgeConfig::load_from_file(Path::new(&config_path));
        }
    }

    // Otherwise, load from default location
    Ok(BridgeConfig::load_default())
}

/// Applies global flags on top of file and environment settings.
fn apply_cli_overrides(mut config: BridgeConfig, cli: &Cli) -> BridgeConfig {
    if let Some(server) = &cli.server {
        config = config.with_server(server.clone());
    }
    if let Some(username) = &cli.username {
        config.server.username = Some(username.clone());
    }
    if let Some(password) = &cli.password {
        config.server.password = Some(SecretString::from(password.clone()));
    }
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }
    config
}
