//! Durable file writes and the cross-process commit lock.
//!
//! Files are never truncated in place: content goes to a temp file in the
//! same directory, is fsynced, then renamed over the target. A crash at any
//! point leaves either the old or the new file, plus possibly a stale temp
//! file that [`remove_stale_temp_files`] cleans up on the next open.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::PersistError;

/// Write `bytes` to `path` atomically.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let tmp = temp_path(path);

    let result = write_and_rename(&tmp, path, bytes);
    if let Err(source) = result {
        let _ = fs::remove_file(&tmp);
        return Err(PersistError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(tmp, path)?;
    if let Some(dir) = path.parent() {
        sync_dir(dir)?;
    }
    Ok(())
}

/// `dir/.name.tmp` for `dir/name`.
fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Delete temp files left behind by an interrupted write.
///
/// Returns how many were removed. Unreadable directories count as empty.
pub(crate) fn remove_stale_temp_files(dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir.filter_map(|entry| entry.ok()),
        Err(_) => return 0,
    };

    let mut removed = 0;
    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        if !(name.starts_with('.') && name.ends_with(".tmp")) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                tracing::warn!(path = %entry.path().display(), "Removed stale temp file");
                removed += 1;
            }
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Failed to remove stale temp file");
            }
        }
    }
    removed
}

/// Exclusive advisory lock on the store's lock file, held for one commit.
///
/// Released on drop.
pub(crate) struct CommitLock {
    file: File,
}

impl CommitLock {
    /// Block until the lock is held.
    pub(crate) fn acquire(path: &Path) -> Result<Self, PersistError> {
        let lock_err = |source| PersistError::Lock {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;
        Ok(Self { file })
    }
}

impl Drop for CommitLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
