//! Access gate — confined resolution of target names
//!
//! A target name from a request is joined onto the fixed serving root and
//! canonicalized; anything that does not land strictly inside the root is
//! rejected. Missing paths and escape attempts collapse into the same
//! `NotFound` so a caller cannot probe the filesystem layout, and existence
//! is re-checked here at request time rather than trusted from config load.

use std::path::{Path, PathBuf};

/// What kind of content a resolved target points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Directory,
}

/// A target name resolved to a real path inside the serving root.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub path: PathBuf,
    pub kind: TargetKind,
}

/// Resolution failure. Deliberately a single variant: the caller must not
/// learn whether the name was missing, unreadable, or escaping the root.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("target not found")]
    NotFound,
}

/// Resolve `target` against `root`, confined to `root`.
pub fn resolve(root: &Path, target: &str) -> Result<ResolvedTarget, AccessError> {
    let root = root.canonicalize().map_err(|_| AccessError::NotFound)?;

    // canonicalize() fails on missing paths and resolves symlinks and "..",
    // so a successful result is a real path we can test for containment.
    let path = root
        .join(target)
        .canonicalize()
        .map_err(|_| AccessError::NotFound)?;

    if !path.starts_with(&root) {
        log::warn!("rejected target escaping serving root: {target:?}");
        return Err(AccessError::NotFound);
    }

    let metadata = path.metadata().map_err(|_| AccessError::NotFound)?;
    let kind = if metadata.is_dir() {
        TargetKind::Directory
    } else if metadata.is_file() {
        TargetKind::File
    } else {
        return Err(AccessError::NotFound);
    };

    Ok(ResolvedTarget { path, kind })
}
