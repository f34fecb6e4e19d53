//! Taglens CLI - annotate images with ranked descriptive tags.
//!
//! A thin front end over `taglens-core`: tag one image, inspect or change
//! the persisted backend selection, and manage the settings file.
//!
//! # Usage
//!
//! ```bash
//! # Tag a single image
//! taglens tag photo.jpg --top-k 10 --threshold 0.2
//!
//! # Switch to the local classifier
//! taglens backend local --model ./wd14/model.onnx --labels ./wd14/selected_tags.csv
//!
//! # Route one upload group to the caption backend
//! taglens backend override real caption_heuristic
//!
//! # View configuration
//! taglens config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Taglens - annotate images with ranked descriptive tags.
#[derive(Parser, Debug)]
#[command(name = "taglens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Annotate an image with tags
    Tag(cli::tag::TagArgs),

    /// Inspect and change backend selection
    Backend(cli::backend::BackendArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match taglens_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `taglens config path`."
            );
            taglens_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Taglens v{}", taglens_core::VERSION);

    match cli.command {
        Commands::Tag(args) => cli::tag::execute(args, config).await,
        Commands::Backend(args) => cli::backend::execute(args, config),
        Commands::Config(args) => cli::config::execute(args, config),
    }
}
