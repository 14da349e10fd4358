//! # VeloIndex CLI (`velo`)
//!
//! ## Usage
//!
//! ```bash
//! velo --config ./config/velo.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `velo init` | Create the SQLite index and run schema migrations |
//! | `velo index <video>` | Sample, describe, and store one video from the input directory |
//! | `velo search "<query>"` | Top matching moments (placeholder set if the index is unavailable) |
//! | `velo serve` | Start the HTTP query server |
//!
//! When the config file does not exist, built-in defaults are used.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use veloindex::config::{self, Config};
use veloindex::{logging, migrate, pipeline, search, server};

/// VeloIndex — searchable video moments from multimodal frame descriptions.
#[derive(Parser)]
#[command(
    name = "velo",
    about = "VeloIndex — index video frames with a multimodal model and search the moments",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/velo.toml")]
    config: PathBuf,

    /// Debug-level logging (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database schema. Idempotent.
    Init,

    /// Index one video.
    ///
    /// Resolves the video name against `[input].dir`, samples one frame
    /// every `[sampling].interval_secs` seconds with ffmpeg, describes each
    /// frame, and stores one timestamped record per described frame.
    /// Frames that cannot be described are skipped and reported.
    Index {
        /// Video file name inside the input directory (e.g. `match.mp4`).
        video: String,

        /// Leave the extracted frames on disk after indexing.
        #[arg(long)]
        keep_frames: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search indexed moments.
    Search {
        /// Free-text query.
        query: String,

        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP query server on `[server].bind`.
    Serve,
}

fn load(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found; using defaults");
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Index initialized at {}", cfg.index.path.display());
        }
        Commands::Index {
            video,
            keep_frames,
            json,
        } => {
            pipeline::run_index(&cfg, &video, keep_frames, json).await?;
        }
        Commands::Search { query, json } => {
            search::run_search(&cfg, &query, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
