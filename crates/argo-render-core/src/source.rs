//! Source discovery
//!
//! A source is a directory holding at least one `.yaml` file. The tree is
//! walked once in file name order; the first YAML file found in a directory
//! records that directory and the rest of it is skipped. Directories visited
//! before that file (earlier siblings in file name order) may already have
//! been recorded, so descendants of another source are pruned afterwards:
//! sources never nest.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

/// Extension that qualifies a directory as a source
pub const SOURCE_EXTENSION: &str = "yaml";

/// A directory rendered as one unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    path: PathBuf,
}

impl Source {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Directory of the source
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the source directory
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Format a source was rendered as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Helm,
    Kustomize,
    PlainManifests,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Helm => "helm",
            Self::Kustomize => "kustomize",
            Self::PlainManifests => "manifests",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scan `root` for top-level sources, sorted by path
///
/// A tree without YAML files yields no sources. Only an unreadable root is
/// an error; unreadable entries below it are skipped with a warning.
pub fn scan(root: &Path) -> Result<Vec<Source>> {
    info!(root = %root.display(), "Scanning for sources");

    std::fs::read_dir(root).map_err(|source| CoreError::ReadDir {
        path: root.to_path_buf(),
        source,
    })?;

    let mut candidates = BTreeSet::new();

    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry while scanning for sources");
                continue;
            }
        };

        if !has_source_extension(entry.path()) {
            continue;
        }

        if let Some(dir) = entry.path().parent() {
            info!(file = %entry.path().display(), "Located a potential source path");
            candidates.insert(dir.to_path_buf());
        }

        // One YAML file is enough: skip the rest of this directory
        walker.skip_current_dir();
    }

    Ok(prune(candidates))
}

fn has_source_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// Drop nested candidates and sort the rest by path bytes
fn prune(candidates: BTreeSet<PathBuf>) -> Vec<Source> {
    let mut roots: Vec<&PathBuf> = Vec::with_capacity(candidates.len());

    for candidate in &candidates {
        let ancestor = candidates
            .iter()
            .find(|other| *other != candidate && candidate.starts_with(other));

        match ancestor {
            Some(root) => info!(
                root = %root.display(),
                nested = %candidate.display(),
                "Pruning nested source"
            ),
            None => roots.push(candidate),
        }
    }

    roots.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    roots.into_iter().map(|p| Source::new(p.clone())).collect()
}
