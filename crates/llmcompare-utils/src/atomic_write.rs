//! Atomic file writes for datasets, workflow state and reports
//!
//! Content is written to a temporary file in the target directory, fsynced,
//! then renamed over the destination. Readers therefore see either the old
//! file or the new one, never a partial write. When the rename crosses a
//! filesystem boundary the write falls back to copy, fsync, replace.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Result of an atomic write operation
#[derive(Debug, Clone, Default)]
pub struct AtomicWriteResult {
    /// Whether the cross-filesystem fallback was used
    pub used_cross_filesystem_fallback: bool,
    /// Warnings generated during the write
    pub warnings: Vec<String>,
}

/// Outcome of [`create_file_atomic`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The destination already existed and was left untouched
    AlreadyExists,
}

/// Atomically write `content` to `path`, replacing any existing file.
///
/// Line endings are normalized to LF and missing parent directories are created.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<AtomicWriteResult> {
    let mut result = AtomicWriteResult::default();
    let temp_file = stage(path, content)?;
    let temp_path = temp_file.path().to_path_buf();

    match temp_file.persist(path.as_std_path()) {
        Ok(_) => {}
        Err(e) if is_cross_filesystem_error(&e.error) => {
            result.used_cross_filesystem_fallback = true;
            result
                .warnings
                .push("Used cross-filesystem fallback (copy, fsync, replace)".to_string());
            cross_filesystem_copy_from_path(&temp_path, path)?;
        }
        Err(e) => {
            return Err(e.error).with_context(|| format!("Failed to atomically write file: {path}"));
        }
    }

    Ok(result)
}

/// Atomically create `path` with `content` only if it does not exist yet.
///
/// Two writers racing for the same name never overwrite each other: exactly one
/// gets [`CreateOutcome::Created`].
pub fn create_file_atomic(path: &Utf8Path, content: &str) -> Result<CreateOutcome> {
    let temp_file = stage(path, content)?;
    match temp_file.persist_noclobber(path.as_std_path()) {
        Ok(_) => Ok(CreateOutcome::Created),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(CreateOutcome::AlreadyExists),
        Err(e) => Err(e.error).with_context(|| format!("Failed to atomically create file: {path}")),
    }
}

/// Write content into a synced temp file next to `path`
fn stage(path: &Utf8Path, content: &str) -> Result<NamedTempFile> {
    let normalized_content = normalize_line_endings(content);

    let temp_dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(temp_dir)
        .with_context(|| format!("Failed to create parent directory: {temp_dir}"))?;

    let mut temp_file = NamedTempFile::new_in(temp_dir)
        .with_context(|| format!("Failed to create temporary file in: {temp_dir}"))?;
    temp_file
        .write_all(normalized_content.as_bytes())
        .context("Failed to write content to temporary file")?;
    temp_file
        .as_file()
        .sync_all()
        .context("Failed to fsync temporary file")?;

    Ok(temp_file)
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(unix)]
fn is_cross_filesystem_error(err: &std::io::Error) -> bool {
    // EXDEV on Linux and macOS
    err.raw_os_error() == Some(18)
}

#[cfg(not(unix))]
fn is_cross_filesystem_error(_err: &std::io::Error) -> bool {
    false
}

fn cross_filesystem_copy_from_path(temp_path: &Path, target: &Utf8Path) -> Result<()> {
    let content =
        fs::read(temp_path).context("Failed to read temporary file for cross-filesystem copy")?;

    let target_dir = target.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut target_temp = NamedTempFile::new_in(target_dir)
        .with_context(|| format!("Failed to create temp file in target directory: {target_dir}"))?;
    target_temp
        .write_all(&content)
        .context("Failed to write content during cross-filesystem copy")?;
    target_temp
        .as_file()
        .sync_all()
        .context("Failed to fsync during cross-filesystem copy")?;
    target_temp
        .persist(target.as_std_path())
        .map_err(|e| anyhow::anyhow!(e.error))
        .context("Failed to persist during cross-filesystem copy")?;

    let _ = fs::remove_file(temp_path);
    Ok(())
}
