//! In-place atomic rewrite of a single file.
//!
//! 1. Write the new content to `<path>.pokeme.tmp` next to the original.
//! 2. Copy the original's permissions onto the temp file.
//! 3. Rename over the original (atomic on POSIX).
//!
//! The temp file is removed on any failure after it was created.

use std::path::{Path, PathBuf};

use crate::error::{io_err, CloneError};

pub(crate) const TMP_SUFFIX: &str = ".pokeme.tmp";

pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), CloneError> {
    atomic_write_with_tmp(path, content, &tmp_path(path))
}

/// `<path>.pokeme.tmp`, built on the raw OS string so any file name works.
fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(TMP_SUFFIX);
    PathBuf::from(tmp)
}

fn atomic_write_with_tmp(path: &Path, content: &[u8], tmp: &Path) -> Result<(), CloneError> {
    let permissions = match std::fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(io_err(path, e)),
    };

    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Some(permissions) = permissions {
        if let Err(e) = std::fs::set_permissions(tmp, permissions) {
            let _ = std::fs::remove_file(tmp);
            return Err(io_err(tmp, e));
        }
    }

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
