//! Filesystem helpers for database files.
//!
//! These never touch an open connection; close connections before deleting or
//! replacing their files.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

/// Suffixes of the engine's companion files next to a database.
const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// `true` when a database file exists at `path`.
pub async fn exists(path: impl AsRef<Path>) -> bool {
    fs::try_exists(path.as_ref()).await.unwrap_or(false)
}

/// Delete a database file and its journal/WAL companions.
///
/// Returns `false` when there was no database to delete.
///
/// # Errors
/// Any I/O error other than a missing companion file.
pub async fn delete_database(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    }
    for suffix in SIDECAR_SUFFIXES {
        match fs::remove_file(sidecar(path, suffix)).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
    }
    debug!(path = %path.display(), "database deleted");
    Ok(true)
}

/// Copy a bundled database `asset` to `destination`, creating its directory.
///
/// Returns the number of bytes copied.
///
/// # Errors
/// Fails when the asset cannot be read or the destination cannot be written.
pub async fn copy_database(asset: impl AsRef<Path>, destination: impl AsRef<Path>) -> io::Result<u64> {
    let (asset, destination) = (asset.as_ref(), destination.as_ref());
    if let Some(dir) = destination.parent().filter(|dir| !dir.as_os_str().is_empty())
        && let Err(err) = fs::create_dir_all(dir).await
    {
        warn!(dir = %dir.display(), error = %err, "could not create database directory");
    }
    let copied = fs::copy(asset, destination).await?;
    debug!(from = %asset.display(), to = %destination.display(), bytes = copied, "database copied");
    Ok(copied)
}
