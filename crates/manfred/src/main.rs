// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manfred - an issue-driven coding agent.
//!
//! This is the binary entry point. It loads configuration, installs the
//! tracing subscriber, and runs the administrative commands against the
//! session store.

mod session;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use manfred_config::{LoggingConfig, ManfredConfig};
use manfred_core::{ManfredError, Phase};
use manfred_storage::SqliteSessionStore;

use crate::session::ListArgs;

/// Manfred - an issue-driven coding agent.
#[derive(Parser, Debug)]
#[command(name = "manfred", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect and manage sessions.
    Session {
        #[command(subcommand)]
        action: SessionCommands,
    },
    /// Open the database, apply pending migrations, and report the schema version.
    Migrate,
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// List sessions, most recently active first.
    List {
        /// Restrict to `owner` or `owner/repo`.
        #[arg(long)]
        repo: Option<String>,
        /// Restrict to one phase.
        #[arg(long, value_parser = manfred_core::parse_phase)]
        phase: Option<Phase>,
        /// Only sessions that are not completed or failed.
        #[arg(long)]
        active: bool,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
        /// Output JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show one session.
    Show {
        id: String,
        /// Include the event history.
        #[arg(long)]
        events: bool,
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete a session and its events.
    Delete { id: String },
    /// Count sessions per phase.
    Stats {
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => manfred_config::load_and_validate_path(path),
        None => manfred_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            manfred_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging);
    let use_color = !cli.plain && std::io::stdout().is_terminal();

    let result = match cli.command {
        Some(Commands::Session { action }) => run_session(&config, action, use_color).await,
        Some(Commands::Migrate) => run_migrate(&config).await,
        Some(Commands::Config) => match manfred_config::to_toml(&config) {
            Ok(rendered) => {
                print!("{rendered}");
                Ok(())
            }
            Err(e) => Err(ManfredError::Config(e.to_string())),
        },
        None => {
            println!("manfred: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn open_store(config: &ManfredConfig) -> Result<SqliteSessionStore, ManfredError> {
    let store = SqliteSessionStore::from_config(config);
    store.initialize().await?;
    Ok(store)
}

async fn run_session(
    config: &ManfredConfig,
    action: SessionCommands,
    use_color: bool,
) -> Result<(), ManfredError> {
    let store = open_store(config).await?;
    let result = match action {
        SessionCommands::List {
            repo,
            phase,
            active,
            limit,
            offset,
            json,
        } => {
            let args = ListArgs {
                repo,
                phase,
                active,
                limit,
                offset,
            };
            session::run_list(&store, &args, json, use_color).await
        }
        SessionCommands::Show { id, events, json } => {
            session::run_show(&store, &id, events, json, use_color).await
        }
        SessionCommands::Delete { id } => session::run_delete(&store, &id).await,
        SessionCommands::Stats { json } => session::run_stats(&store, json, use_color).await,
    };
    store.close().await?;
    result
}

async fn run_migrate(config: &ManfredConfig) -> Result<(), ManfredError> {
    let store = open_store(config).await?;
    let version = store.schema_version().await?;
    println!(
        "database: {}\nschema version: {} (latest {})",
        config.database_path().display(),
        version.map_or_else(|| "none".to_string(), |v| v.to_string()),
        manfred_storage::migrations::latest_version()
    );
    store.close().await
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured
/// level; logs go to stderr so command output stays clean.
fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("manfred={},warn", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
