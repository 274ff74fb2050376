//! Content packager — resolved target to byte stream
//!
//! File targets are read raw. Directory targets are packed into a deflated
//! ZIP holding every regular file under the target, named by its path
//! relative to the target root. Entries are sorted lexicographically and
//! written with a fixed timestamp so an unchanged directory packages to
//! byte-identical output on every request.

use super::access::{ResolvedTarget, TargetKind};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Packaging failures. These are internal server errors, never surfaced as
/// gating rejections.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("failed to read content: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to build archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("entry path is not valid UTF-8: {0}")]
    NonUtf8Entry(String),
}

/// Turn a resolved target into the plaintext payload to be sealed.
pub fn package(target: &ResolvedTarget) -> Result<Vec<u8>, PackageError> {
    match target.kind {
        TargetKind::File => Ok(fs::read(&target.path)?),
        TargetKind::Directory => zip_directory(&target.path),
    }
}

/// Pack every regular file under `dir` into an in-memory ZIP archive.
fn zip_directory(dir: &Path) -> Result<Vec<u8>, PackageError> {
    // Filesystem enumeration order is not stable; collect and sort by the
    // relative entry name so repeated packaging is reproducible.
    let mut entries: Vec<(String, std::path::PathBuf)> = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .expect("walked path is under its root");
        let name = relative
            .to_str()
            .ok_or_else(|| PackageError::NonUtf8Entry(relative.display().to_string()))?
            .to_string();
        entries.push((name, entry.path().to_path_buf()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, path) in &entries {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(&fs::read(path)?)?;
    }
    let cursor = writer.finish()?;

    log::debug!(
        "packaged directory {} ({} file(s), {} bytes)",
        dir.display(),
        entries.len(),
        cursor.get_ref().len()
    );
    Ok(cursor.into_inner())
}
