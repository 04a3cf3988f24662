//! File I/O with errors that name the file and the operation.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

fn io_error(err: std::io::Error, operation: &str, path: &Path) -> Error {
    Error::internal_io(
        err.to_string(),
        Some(format!("{} {}", operation, path.display())),
    )
}

pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| io_error(e, operation, path))
}

/// Sibling path used while writing, hidden and unique to this process.
fn staging_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy();
    Some(path.with_file_name(format!(".{}.{}.tmp", name, std::process::id())))
}

/// Replace a file's content in one rename, so an interrupted write never
/// leaves a truncated manifest behind.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let staging = staging_path(path).ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    fs::write(&staging, content).map_err(|e| io_error(e, operation, &staging))?;

    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(io_error(e, operation, path));
    }
    Ok(())
}
