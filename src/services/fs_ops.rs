//! Filesystem helpers shared by extraction and repack.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use walkdir::WalkDir;

/// Convert a directory entry path to UTF-8, skipping (with a debug log) paths that aren't.
pub fn utf8_entry(path: std::path::PathBuf) -> Option<Utf8PathBuf> {
    match Utf8PathBuf::from_path_buf(path) {
        Ok(p) => Some(p),
        Err(p) => {
            tracing::debug!("Skipping non UTF-8 path: {}", p.display());
            None
        }
    }
}

/// Remove `dir` if present and recreate it empty.
pub fn reset_dir(dir: &Utf8Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to clear directory: {}", dir))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {}", dir))
}

/// Copy the contents of `src` into `dest`, recursively. Existing files are overwritten.
///
/// Returns the number of files copied.
pub fn copy_tree(src: &Utf8Path, dest: &Utf8Path) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk directory: {}", src))?;
        let Some(path) = utf8_entry(entry.path().to_path_buf()) else {
            continue;
        };
        let relative = path
            .strip_prefix(src)
            .with_context(|| format!("{} is not under {}", path, src))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target))?;
        } else if entry.file_type().is_file() {
            copy_file(&path, &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Copy one file, creating the destination's parent directories.
pub fn copy_file(src: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent))?;
    }
    fs::copy(src, dest).with_context(|| format!("Failed to copy {} to {}", src, dest))?;
    Ok(())
}

/// True when the directory exists and contains at least one entry.
pub fn has_entries(dir: &Utf8Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Byte-for-byte comparison of two files, streamed in chunks.
pub fn files_identical(a: &Utf8Path, b: &Utf8Path) -> Result<bool> {
    let meta_a = fs::metadata(a).with_context(|| format!("Failed to stat {}", a))?;
    let meta_b = fs::metadata(b).with_context(|| format!("Failed to stat {}", b))?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut reader_a =
        BufReader::new(File::open(a).with_context(|| format!("Failed to open {}", a))?);
    let mut reader_b =
        BufReader::new(File::open(b).with_context(|| format!("Failed to open {}", b))?);
    let mut buf_a = vec![0u8; 64 * 1024];
    let mut buf_b = vec![0u8; 64 * 1024];

    loop {
        let read = reader_a
            .read(&mut buf_a)
            .with_context(|| format!("Failed to read {}", a))?;
        if read == 0 {
            return Ok(true);
        }
        reader_b
            .read_exact(&mut buf_b[..read])
            .with_context(|| format!("Failed to read {}", b))?;
        if buf_a[..read] != buf_b[..read] {
            return Ok(false);
        }
    }
}
