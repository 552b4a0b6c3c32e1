//! JSON document persistence: reads, atomic writes and backup-preserving replaces.

use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Read and parse a json document.
pub fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|err| Error::persistence(path, err))?;
    serde_json::from_str(&content).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a value as pretty json through a temp file and rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');
    write_bytes_atomic(path, &data).map_err(|err| Error::persistence(path, err))
}

pub fn write_bytes_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = parent_dir(path);
    if let Some(parent) = parent {
        create_dir_all(parent)?;
    }

    let tmp_path = sibling_path(path, "tmp")?;
    {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }

    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err);
    }
    if let Some(parent) = parent {
        sync_dir(parent)?;
    }

    Ok(())
}

/// Move an existing file aside to `<name>.<random hex>.bak`.
///
/// Returns the backup path, or `None` when nothing existed at `path`.
pub fn backup_existing(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    let suffix = format!("{}.bak", uuid::Uuid::new_v4().simple());
    let backup = sibling_path(path, &suffix).map_err(|err| Error::persistence(path, err))?;
    std::fs::rename(path, &backup).map_err(|err| Error::persistence(path, err))?;
    tracing::info!(
        event = "backup_created",
        path = %path.display(),
        backup = %backup.display()
    );
    Ok(Some(backup))
}

/// Back up any existing file at `path`, then write `value` in its place.
pub fn replace_with_backup<T: Serialize>(path: &Path, value: &T) -> Result<Option<PathBuf>> {
    let backup = backup_existing(path)?;
    write_json_atomic(path, value)?;
    Ok(backup)
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

fn sibling_path(path: &Path, suffix: &str) -> io::Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid path for write: {}", path.display()),
        )
    })?;
    let name = format!("{}.{suffix}", file_name.to_string_lossy());
    Ok(path.with_file_name(name))
}

fn sync_dir(path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(path)?;
    dir.sync_all()
}
