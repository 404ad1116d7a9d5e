//! Atomic artifact writes.

use crate::build::WriteError;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Write `contents` to `path` through a uniquely named sibling temp file
/// and a rename.
///
/// Readers see either the previous file or the complete new one, and
/// concurrent writers to the same path never share a temp file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), WriteError> {
    let wrap = |source| WriteError { path: path.to_path_buf(), source };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(wrap)?;

    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(wrap)?;

    temp.write_all(contents).map_err(wrap)?;
    temp.as_file().sync_all().map_err(wrap)?;
    // A failed persist drops the temp file with the error.
    temp.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}
