//! Recursive discovery and pairing of data files under two root directories

use crate::error::{PqcompareError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A data file present under both roots at the same relative path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub relative_path: PathBuf,
    pub before: PathBuf,
    pub after: PathBuf,
}

/// Relative paths found under only one of the two roots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnmatchedFiles {
    pub only_in_before: Vec<PathBuf>,
    pub only_in_after: Vec<PathBuf>,
}

impl UnmatchedFiles {
    pub fn is_empty(&self) -> bool {
        self.only_in_before.is_empty() && self.only_in_after.is_empty()
    }
}

/// Pair every data file under `before_root` with the file at the same
/// relative path under `after_root`, sorted by relative path
pub fn pair_files(before_root: &Path, after_root: &Path, extensions: &[String]) -> Result<Vec<FilePair>> {
    check_root(before_root)?;
    check_root(after_root)?;

    let pairs: Vec<FilePair> = data_files(before_root, extensions)?
        .into_iter()
        .filter_map(|relative_path| {
            let after = after_root.join(&relative_path);
            after.is_file().then(|| FilePair {
                before: before_root.join(&relative_path),
                after,
                relative_path,
            })
        })
        .collect();

    log::debug!(
        "Paired {} files between {} and {}",
        pairs.len(),
        before_root.display(),
        after_root.display()
    );
    Ok(pairs)
}

/// Data files that exist under only one of the roots
pub fn find_unmatched_files(before_root: &Path, after_root: &Path, extensions: &[String]) -> Result<UnmatchedFiles> {
    check_root(before_root)?;
    check_root(after_root)?;

    let before = data_files(before_root, extensions)?;
    let after = data_files(after_root, extensions)?;

    Ok(UnmatchedFiles {
        only_in_before: before.difference(&after).cloned().collect(),
        only_in_after: after.difference(&before).cloned().collect(),
    })
}

fn check_root(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(PqcompareError::invalid_input(format!(
            "Directory does not exist: {}",
            root.display()
        )))
    }
}

/// Relative paths of all files under `root` with a matching extension
fn data_files(root: &Path, extensions: &[String]) -> Result<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.insert(relative.to_path_buf());
        }
    }
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| {
            extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
}
