//! The `taglens tag` command for annotating a single image.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use taglens_core::{BackendKind, Config, TagResult, Tagger};

use super::expand_path;

/// Arguments for the `tag` command.
#[derive(Args, Debug)]
pub struct TagArgs {
    /// Image file to annotate
    #[arg(required = true)]
    pub image: PathBuf,

    /// Maximum number of tags to return
    #[arg(short = 'k', long, default_value = "10", value_parser = parse_top_k)]
    pub top_k: usize,

    /// Minimum confidence (0.0 to 1.0)
    #[arg(short, long, default_value = "0.2", value_parser = parse_threshold)]
    pub threshold: f32,

    /// Print tag names only, at the default threshold
    #[arg(long, conflicts_with = "threshold")]
    pub primary: bool,

    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// JSON output for one annotated image.
#[derive(Serialize)]
struct TagOutput<'a> {
    image: &'a Path,
    backend: BackendKind,
    tags: &'a [TagResult],
}

/// Execute the tag command.
pub async fn execute(args: TagArgs, config: Config) -> anyhow::Result<()> {
    let image = expand_path(&args.image);
    if !image.is_file() {
        anyhow::bail!("Image not found: {}", image.display());
    }

    let tagger = Tagger::new(config);
    let backend = tagger.resolve(&image);
    tracing::debug!("Resolved backend for {:?}: {}", image, backend);

    if args.primary {
        let tags = tagger.primary_tags(&image, args.top_k).await;
        if args.json {
            println!("{}", serde_json::to_string(&tags)?);
        } else {
            println!("{}", tags.join(", "));
        }
        return Ok(());
    }

    let tags = tagger.annotate(&image, args.top_k, args.threshold).await;
    if tags.is_empty() {
        tracing::warn!("No tags produced for {}", image.display());
    }

    if args.json {
        let output = TagOutput {
            image: &image,
            backend,
            tags: &tags,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for tag in &tags {
            println!("{:>6.3}  {}", tag.confidence, tag.tag);
        }
    }

    Ok(())
}

fn parse_top_k(s: &str) -> Result<usize, String> {
    let k: usize = s.parse().map_err(|e| format!("{e}"))?;
    if k == 0 {
        return Err("top-k must be at least 1".to_string());
    }
    Ok(k)
}

fn parse_threshold(s: &str) -> Result<f32, String> {
    let t: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=1.0).contains(&t) {
        return Err("threshold must be between 0.0 and 1.0".to_string());
    }
    Ok(t)
}
