//! Basement CLI
//!
//! Command-line interface for Basement - save, fetch and query documents in
//! the local store.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use basement_core::{BasementError, Client, Config};

mod commands;
mod output;

use commands::view::ViewArgs;
use output::{Output, OutputFormat};

/// Environment variable holding the log filter (e.g. `debug`)
const LOG_ENV: &str = "BASEMENT_LOG";

#[derive(Parser)]
#[command(name = "basement")]
#[command(about = "Basement - documents and views over a key/value store")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a JSON payload under a key
    #[command(alias = "set")]
    Save {
        /// Document key
        key: String,
        /// Payload as JSON
        payload: String,
        /// Store the payload as a plain string instead of parsing it
        #[arg(long)]
        string: bool,
        /// Only insert; fail if the key exists
        #[arg(long, conflicts_with = "replace")]
        add: bool,
        /// Only update; fail if the key is missing
        #[arg(long)]
        replace: bool,
        /// Only write if the stored CAS matches (0 for no constraint)
        #[arg(long)]
        cas: Option<u64>,
        /// Expiration in seconds (or a Unix timestamp beyond 30 days)
        #[arg(long, default_value_t = 0)]
        expire: u32,
        /// Transcoder to encode with
        #[arg(short, long)]
        transcoder: Option<String>,
    },
    /// Fetch documents by key
    Get {
        /// Keys to fetch
        #[arg(required = true)]
        keys: Vec<String>,
        /// Print the stored value without decoding
        #[arg(long)]
        raw: bool,
        /// Transcoder to decode with
        #[arg(short, long)]
        transcoder: Option<String>,
    },
    /// Delete a key
    #[command(alias = "rm")]
    Delete {
        /// Document key
        key: String,
    },
    /// Query a view
    View(ViewArgs),
    /// Generate a unique document key
    Keygen {
        /// Key prefix
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Show client and cluster versions
    Version,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (host, bucket, password, user, persist, connect,
        /// transcoder, environment, data_dir)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match run(cli, &output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let hint = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<BasementError>())
                .and_then(BasementError::recovery_suggestion);
            if let Some(hint) = hint {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, output: &Output) -> Result<()> {
    let config_path = cli.config.as_deref();

    // Commands that don't need the store
    match cli.command {
        Commands::Config { command } => {
            return handle_config_command(command, config_path, output);
        }
        Commands::Keygen { prefix } => return commands::document::keygen(&prefix, output),
        _ => {}
    }

    let mut client = open_client(config_path)?;

    match cli.command {
        Commands::Save {
            key,
            payload,
            string,
            add,
            replace,
            cas,
            expire,
            transcoder,
        } => {
            let args = commands::document::SaveArgs {
                key,
                payload,
                string,
                add,
                replace,
                cas,
                expire,
                transcoder,
            };
            commands::document::save(&mut client, args, output)
        }
        Commands::Get {
            keys,
            raw,
            transcoder,
        } => commands::document::get(&client, keys, raw, transcoder, output),
        Commands::Delete { key } => commands::document::delete(&mut client, &key, output),
        Commands::View(args) => commands::view::query(&client, &args, output),
        Commands::Version => commands::version::show(&client, output),
        Commands::Config { .. } | Commands::Keygen { .. } => Ok(()), // Handled above
    }
}

/// Load the configuration and connect to the local store.
///
/// The CLI always persists the store so data survives between runs.
fn open_client(config_path: Option<&std::path::Path>) -> Result<Client> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    config.persist = true;
    config.connect = true;
    debug!("Using store snapshot {:?}", config.snapshot_path());

    Client::new(config).context("Failed to open the store")
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&std::path::Path>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(&key, &value, config_path, output)
        }
    }
}

/// Log to stderr, filtered by BASEMENT_LOG (warnings only by default)
fn init_logging() {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new("basement_core=warn,basement_cli=warn")
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
