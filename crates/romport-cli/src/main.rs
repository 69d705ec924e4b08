//! Romport CLI - import files into a game library and sync it with a cloud
//! folder.

mod commands;
mod resolvers;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use romport::config::AppConfig;
use romport::ConflictChoice;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "romport")]
#[command(about = "Import and sync emulator game libraries")]
struct Args {
    /// Library data root (defaults to the platform data directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import ROMs, archives, saves and skins
    Import {
        /// Files to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only log problems, never resolve save conflicts
        #[arg(long)]
        silent: bool,

        /// Replace existing save data without asking
        #[arg(long)]
        overwrite_saves: bool,

        /// Assign unmatched or ambiguous saves to the first candidate game
        #[arg(long)]
        pick_first_match: bool,

        /// Skip background cover lookups for new games
        #[arg(long)]
        no_covers: bool,
    },

    /// Reconcile the library with a cloud folder
    Sync {
        /// Directory mirroring the cloud tree
        #[arg(long)]
        remote: PathBuf,

        /// Side that wins a conflict
        #[arg(long, value_enum, default_value_t = Prefer::Local)]
        prefer: Prefer,
    },

    /// List imported games
    Games {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List imported skins
    Skins {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Finish cover lookups for games still waiting for one
    Covers,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Prefer {
    Local,
    Remote,
}

impl From<Prefer> for ConflictChoice {
    fn from(prefer: Prefer) -> Self {
        match prefer {
            Prefer::Local => ConflictChoice::KeepLocal,
            Prefer::Remote => ConflictChoice::KeepRemote,
        }
    }
}

fn default_root() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(dirs::home_dir)
        .context("No data directory available; pass --root")?;
    Ok(base.join(AppConfig::APP_NAME))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so listings on stdout stay machine-readable.
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let root = match args.root {
        Some(root) => root,
        None => default_root()?,
    };
    info!("Library root: {}", root.display());

    match args.command {
        Command::Import {
            paths,
            silent,
            overwrite_saves,
            pick_first_match,
            no_covers,
        } => {
            let policy = resolvers::SavePolicy {
                overwrite_saves,
                pick_first_match,
            };
            commands::import(&root, paths, silent, policy, !no_covers).await
        }
        Command::Sync { remote, prefer } => commands::sync(&root, remote, prefer.into()).await,
        Command::Games { json } => commands::games(&root, json).await,
        Command::Skins { json } => commands::skins(&root, json).await,
        Command::Covers => commands::covers(&root).await,
    }
}
