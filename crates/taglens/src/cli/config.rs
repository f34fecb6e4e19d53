//! The `taglens config` command for the engine settings file.
//!
//! Settings (model locations, zero-shot model, caption service, routing
//! marker) live in `config.toml`. The backend selection lives in a separate
//! tagger record that `taglens backend` edits.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use taglens_core::Config;

use super::expand_path;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for the settings file.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective settings as TOML
    Show,

    /// List the files taglens reads and writes
    Path,

    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Target file (defaults to the platform settings location)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Parse and validate a settings file
    Check {
        /// File to check (defaults to the platform settings location)
        path: Option<PathBuf>,
    },
}

/// Execute the config command.
pub fn execute(args: ConfigArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            print!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            for (name, path) in known_paths(&config) {
                let state = if path.exists() { "" } else { "  (missing)" };
                println!("{name:<14}{}{state}", path.display());
            }
        }

        ConfigCommand::Init { force, path } => {
            let path = path.map_or_else(Config::default_path, |p| expand_path(&p));
            write_default_settings(&path, force)?;
            tracing::info!("Wrote default settings to {:?}", path);
            println!("Configuration initialized at: {}", path.display());
        }

        ConfigCommand::Check { path } => {
            let path = path.map_or_else(Config::default_path, |p| expand_path(&p));
            let checked = check_settings(&path)?;
            println!(
                "{} is valid (zero-shot model {}, caption model {})",
                path.display(),
                checked.zero_shot.model,
                checked.caption.model
            );
        }
    }

    Ok(())
}

/// Every file or directory the engine touches, labelled for display.
fn known_paths(config: &Config) -> Vec<(&'static str, PathBuf)> {
    let mut paths = vec![
        ("settings", Config::default_path()),
        ("tagger record", config.store_path()),
        ("models", config.model_dir()),
        ("taxonomy", config.taxonomy_dir()),
    ];
    if let Some(dir) = config.autoconfigure_dir() {
        paths.push(("autodetect", dir));
    }
    paths
}

/// Write the default settings to `path`, refusing to clobber an existing
/// file unless `force` is set.
fn write_default_settings(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    std::fs::write(path, Config::default().to_toml()?)
        .with_context(|| format!("Cannot write {}", path.display()))
}

fn check_settings(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        anyhow::bail!(
            "No settings file at {} (defaults are in use; create one with `taglens config init`)",
            path.display()
        );
    }
    Config::load_from(path).with_context(|| format!("{} is not a valid settings file", path.display()))
}
