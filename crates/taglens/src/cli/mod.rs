//! CLI command implementations.

pub mod backend;
pub mod config;
pub mod tag;

use std::path::PathBuf;

/// Expand `~` in a user-supplied path.
pub(crate) fn expand_path(path: &std::path::Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
