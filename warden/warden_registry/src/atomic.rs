//! Crash-safe file replacement.
//!
//! Artifacts are written to a temporary sibling, synced, then renamed over
//! the target. A reader opening the target sees either the previous or the
//! new content, never a partial write. Temporary names start with `.` so
//! directory scans skip them.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use uuid::Uuid;

/// Bytes a temporary name adds to the file it replaces.
pub const TEMPORARY_OVERHEAD: usize = ".".len() + ".tmp-".len() + 36;

/// The name of a fresh temporary sibling of `file_name`.
pub fn temporary_name(file_name: &str) -> String {
    format!(".{}.tmp-{}", file_name, Uuid::new_v4())
}

/// Atomically replace `dir/file_name` with `data`.
pub fn write_atomic(dir: &Path, file_name: &str, data: &[u8]) -> io::Result<()> {
    let temp_path = dir.join(temporary_name(file_name));
    let target = dir.join(file_name);

    let written = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, &target)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    sync_dir(dir)
}

/// Remove `path`; a missing file is not an error.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether `file_name` is a leftover of an interrupted write.
pub fn is_temporary(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.contains(".tmp-")
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
