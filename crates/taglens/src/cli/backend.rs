//! The `taglens backend` command for the persisted backend selection.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use taglens_core::{BackendKind, Config, ConfigPatch, Tagger, TaggerConfig};

use super::expand_path;

/// Arguments for the `backend` command.
#[derive(Args, Debug)]
pub struct BackendArgs {
    #[command(subcommand)]
    pub command: BackendCommand,
}

/// Subcommands for backend selection.
#[derive(Subcommand, Debug)]
pub enum BackendCommand {
    /// Display the current selection
    Show {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Select the global backend
    Set {
        /// zero_shot, local_classifier or caption_heuristic
        backend: BackendKind,
    },

    /// Select the local classifier with a model and label file
    Local {
        /// ONNX model file
        #[arg(long)]
        model: PathBuf,

        /// Label file (CSV/TSV table or one label per line)
        #[arg(long)]
        labels: PathBuf,
    },

    /// Route one upload group to a backend
    Override {
        /// Group name (the path segment after the uploads marker)
        group: String,

        /// Backend for that group
        backend: BackendKind,
    },

    /// Remove a group override
    ClearOverride {
        /// Group name
        group: String,
    },

    /// Restore the default selection
    Reset,

    /// Detect a local classifier in a directory and select it
    Detect {
        /// Directory to scan (defaults to `[local].autoconfigure_dir`)
        dir: Option<PathBuf>,
    },
}

/// Execute the backend command.
pub fn execute(args: BackendArgs, config: Config) -> anyhow::Result<()> {
    let store_path = config.store_path();
    let autodetect_dir = config.autoconfigure_dir();
    let tagger = Tagger::new(config);

    match args.command {
        BackendCommand::Show { json } => {
            let record = tagger.config();
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
                println!("Stored at: {}", store_path.display());
            }
        }

        BackendCommand::Set { backend } => {
            let record = tagger.configure(ConfigPatch::backend(backend));
            if backend == BackendKind::LocalClassifier && record.local_model_paths().is_none() {
                eprintln!(
                    "Warning: local classifier model/labels are not configured or missing; \
                     images will use {} until they are set with `taglens backend local`.",
                    BackendKind::ZeroShot
                );
            }
            print_record(&record);
        }

        BackendCommand::Local { model, labels } => {
            let model = expand_path(&model);
            let labels = expand_path(&labels);
            for path in [&model, &labels] {
                if !path.is_file() {
                    anyhow::bail!("File not found: {}", path.display());
                }
            }
            let record = tagger.configure(ConfigPatch::local_classifier(model, labels));
            print_record(&record);
        }

        BackendCommand::Override { group, backend } => {
            let mut overrides = tagger.config().group_overrides;
            remove_group(&mut overrides, &group);
            overrides.insert(group.to_lowercase(), backend);
            let record = tagger.configure(ConfigPatch::default().with_group_overrides(overrides));
            print_record(&record);
        }

        BackendCommand::ClearOverride { group } => {
            let mut overrides = tagger.config().group_overrides;
            if !remove_group(&mut overrides, &group) {
                anyhow::bail!("No override for group '{group}'");
            }
            let record = tagger.configure(ConfigPatch::default().with_group_overrides(overrides));
            print_record(&record);
        }

        BackendCommand::Reset => {
            let record = tagger.reset_config();
            print_record(&record);
        }

        BackendCommand::Detect { dir } => {
            let Some(dir) = dir.map(|d| expand_path(&d)).or(autodetect_dir) else {
                anyhow::bail!("No directory given and [local].autoconfigure_dir is not set");
            };
            match tagger.autoconfigure_local(&dir) {
                Some(paths) => {
                    println!("Model:  {}", paths.model.display());
                    println!("Labels: {}", paths.labels.display());
                }
                None => println!(
                    "Nothing changed (no model/label pair in {}, or the current selection does not allow it)",
                    dir.display()
                ),
            }
        }
    }

    Ok(())
}

/// Remove every override whose name matches `group` case-insensitively.
fn remove_group(overrides: &mut BTreeMap<String, BackendKind>, group: &str) -> bool {
    let before = overrides.len();
    overrides.retain(|name, _| !name.eq_ignore_ascii_case(group));
    overrides.len() != before
}

fn print_record(record: &TaggerConfig) {
    println!("Backend: {}", record.backend);
    if let Some(model) = &record.model_path {
        println!("Model:   {}", model.display());
    }
    if let Some(labels) = &record.labels_path {
        println!("Labels:  {}", labels.display());
    }
    if !record.group_overrides.is_empty() {
        println!("Group overrides:");
        for (group, backend) in &record.group_overrides {
            println!("  {group} -> {backend}");
        }
    }
}
