//! Hoard CLI
//!
//! Command-line tools for inspecting and repairing hoard local stores.
//!
//! # Commands
//!
//! - `inspect` - Display per-entity-type statistics
//! - `merge` - Reconcile a namespace with a remote snapshot file
//! - `dedupe` - Deduplicate a JSON array of records
//! - `clear` - Wipe one namespace or all local state

mod commands;

use clap::{Parser, Subcommand};
use hoard_storage::{FileStore, FileStoreConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Hoard command-line store tools.
#[derive(Parser)]
#[command(name = "hoard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Open the per-user store `<path>/users/<user>`
    #[arg(global = true, short, long)]
    user: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display per-entity-type statistics
    Inspect {
        /// Only inspect this entity type
        #[arg(short = 't', long = "type")]
        entity_type: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Reconcile a namespace with a remote snapshot file
    Merge {
        /// Entity type to merge
        #[arg(short = 't', long = "type")]
        entity_type: String,

        /// JSON file holding an array of remote records
        #[arg(short, long)]
        remote: PathBuf,

        /// Drop tombstones before merging (purges local deletions)
        #[arg(long)]
        drop_deleted: bool,

        /// Let local versions win every collision
        #[arg(long)]
        no_lww: bool,

        /// Show the result without writing it
        #[arg(short, long)]
        dry_run: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Deduplicate a JSON array of records and print it
    Dedupe {
        /// JSON file holding an array of records
        input: PathBuf,

        /// Also drop tombstones
        #[arg(long)]
        drop_deleted: bool,
    },

    /// Wipe one namespace or all local state
    Clear {
        /// Only clear this entity type
        #[arg(short = 't', long = "type")]
        entity_type: Option<String>,

        /// Actually delete (otherwise only report)
        #[arg(short, long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

fn open_store(
    path: Option<PathBuf>,
    user: Option<&str>,
    command: &str,
) -> Result<FileStore, Box<dyn std::error::Error>> {
    let path = path.ok_or_else(|| format!("Store path required for {command}"))?;
    let config = FileStoreConfig::default().create_if_missing(false);
    let store = match user {
        Some(user) => FileStore::open_for_user(&path, user, config)?,
        None => FileStore::open(&path, config)?,
    };
    Ok(store)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let user = cli.user.as_deref();
    match cli.command {
        Commands::Inspect {
            entity_type,
            format,
        } => {
            let store = open_store(cli.path, user, "inspect")?;
            commands::inspect::run(&store, entity_type.as_deref(), &format)?;
        }
        Commands::Merge {
            entity_type,
            remote,
            drop_deleted,
            no_lww,
            dry_run,
            format,
        } => {
            let store = open_store(cli.path, user, "merge")?;
            let options = commands::merge::MergeArgs {
                drop_deleted,
                no_lww,
                dry_run,
            };
            commands::merge::run(&store, &entity_type, &remote, options, &format)?;
        }
        Commands::Dedupe {
            input,
            drop_deleted,
        } => {
            commands::dedupe::run(&input, drop_deleted)?;
        }
        Commands::Clear { entity_type, yes } => {
            let store = open_store(cli.path, user, "clear")?;
            commands::clear::run(&store, entity_type.as_deref(), yes)?;
        }
        Commands::Version => {
            println!("hoard CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
