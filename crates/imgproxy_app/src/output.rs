use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::AppError;

/// Atomically write `content` to `path` by writing a temp file in the same
/// directory and renaming it over the target.
pub fn write_atomically(path: &Path, content: &str) -> Result<(), AppError> {
    if path.file_name().is_none() {
        return Err(AppError::OutputPath(path.to_path_buf()));
    }
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;

    tmp.persist(path).map_err(|e| AppError::Io(e.error))?;
    Ok(())
}
