//! Best-effort secure deletion.

use crate::crypto::{CHUNK_SIZE, secure_random};
use crate::error::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Overwrites the file's current contents with random bytes, then unlinks it.
///
/// This only defeats a naive re-read of the same blocks. Journaling,
/// copy-on-write filesystems, SSD wear leveling and snapshots may all keep
/// older copies of the data that this cannot reach.
///
/// Symbolic links and other non-regular files are refused and left
/// untouched, along with whatever they point to.
///
/// # Errors
///
/// Returns [`Error::Erase`] with the offending path; nothing is retried.
pub fn secure_delete(path: &Path) -> Result<()> {
    ensure_regular_file(path)
        .and_then(|()| overwrite(path))
        .and_then(|()| fs::remove_file(path))
        .map_err(|source| Error::Erase {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(path = %path.display(), "securely removed");
    Ok(())
}

fn ensure_regular_file(path: &Path) -> io::Result<()> {
    let file_type = fs::symlink_metadata(path)?.file_type();
    if file_type.is_file() {
        Ok(())
    } else if file_type.is_symlink() {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "refusing to erase through a symbolic link",
        ))
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ))
    }
}

fn overwrite(path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }

    file.seek(SeekFrom::Start(0))?;
    let mut block = vec![0u8; CHUNK_SIZE];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(block.len() as u64) as usize;
        secure_random(&mut block[..n]).map_err(io::Error::other)?;
        file.write_all(&block[..n])?;
        remaining -= n as u64;
    }

    file.sync_all()
}
