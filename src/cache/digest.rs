//! Digest of template build inputs
//!
//! A template is identified by the modules installed into it, whether demo
//! data was loaded, and the exact source files of those modules. Same
//! inputs = same digest = same template.

use crate::cache::naming::Digest;
use crate::error::{StencilError, StencilResult};
use crate::pattern::Wildcard;
use sha2::{Digest as _, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File name globs excluded from the digest by default
pub const DEFAULT_EXCLUDES: &[&str] = &["*.pyc", "*.pyo"];

/// Find a module's directory: the first addons path containing it wins
pub fn resolve_module(addons_paths: &[PathBuf], module: &str) -> Option<PathBuf> {
    addons_paths
        .iter()
        .map(|root| root.join(module))
        .find(|candidate| candidate.is_dir())
}

/// Compute the digest of a module set
///
/// Modules are deduplicated and hashed in name order, each followed by
/// its files in walk order (sorted by file name), each file contributing its
/// relative path and contents.
pub fn addons_digest(
    addons_paths: &[PathBuf],
    modules: &[String],
    with_demo: bool,
    exclude: &[String],
) -> StencilResult<Digest> {
    let excludes: Vec<Wildcard> = exclude.iter().map(|p| Wildcard::glob(p)).collect();
    let modules: BTreeSet<&str> = modules
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(format!("!demo={}!", u8::from(with_demo)).as_bytes());

    for module in modules {
        let module_dir =
            resolve_module(addons_paths, module).ok_or_else(|| StencilError::ModuleNotFound {
                module: module.to_string(),
            })?;
        debug!("Hashing module {} at {}", module, module_dir.display());

        hasher.update(module.as_bytes());
        hash_tree(&mut hasher, &module_dir, &excludes)?;
    }

    Digest::from_hash(&hasher.finalize())
}

fn hash_tree(hasher: &mut Sha256, root: &Path, excludes: &[Wildcard]) -> StencilResult<()> {
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| StencilError::Walk {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if excludes.iter().any(|pattern| pattern.matches(&file_name)) {
            continue;
        }

        let relative = relative_path(root, entry.path());
        let contents = fs::read(entry.path())
            .map_err(|e| StencilError::io(format!("reading {}", entry.path().display()), e))?;

        hasher.update(relative.as_bytes());
        hasher.update(&contents);
    }
    Ok(())
}

/// Relative path with `/` separators, independent of the platform
fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
