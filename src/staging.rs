//! Staged output files.
//!
//! Output is written next to its destination under a random temporary name
//! and only published once complete, so a failed or interrupted operation
//! never leaves a partial artifact at the destination path.

use crate::crypto::secure_random;
use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A temporary file that becomes `target` on [`StagedFile::commit`].
///
/// Dropping an uncommitted `StagedFile` removes the temporary.
pub struct StagedFile {
    target: PathBuf,
    tmp_path: PathBuf,
    file: Option<File>,
}

impl StagedFile {
    /// Creates the temporary file in the same directory as `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutputExists`] if `target` is already present.
    pub fn create(target: &Path) -> Result<Self> {
        if target.exists() {
            return Err(Error::OutputExists(target.to_path_buf()));
        }

        let tmp_path = random_tmp_path(target)?;

        // securely create temp file (fail if exists)
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;

        Ok(Self {
            target: target.to_path_buf(),
            tmp_path,
            file: Some(file),
        })
    }

    /// Syncs the temporary and publishes it under the target name.
    ///
    /// Publishing never replaces an existing file: if something appeared at
    /// the target in the meantime, this fails with [`Error::OutputExists`].
    pub fn commit(mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?; //fsync file
        }

        publish_no_clobber(&self.tmp_path, &self.target)?;
        let _ = fs::remove_file(&self.tmp_path);

        sync_parent_dir(&self.target)?;
        Ok(())
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("staged file already committed"))
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.file.take();
        if self.tmp_path.exists() {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// fsync directory
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => File::open(parent)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

const TMP_MARKER: &str = ".tmp.";
const TMP_SUFFIX_LEN: usize = 16;

/// Returns `true` for names produced by [`random_tmp_path`].
///
/// Such files are leftovers of an interrupted run, never real inputs.
pub(crate) fn is_staging_name(file_name: &str) -> bool {
    match file_name.rsplit_once(TMP_MARKER) {
        Some((stem, suffix)) => {
            !stem.is_empty()
                && suffix.len() == TMP_SUFFIX_LEN
                && suffix.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        }
        None => false,
    }
}

/// Generates a unique temporary file path in the same directory.
///
/// Format: `filename.tmp.<randomhex>`
fn random_tmp_path(target: &Path) -> Result<PathBuf> {
    let mut buf = [0u8; TMP_SUFFIX_LEN / 2]; // 64 bit entropy
    secure_random(&mut buf)?;

    let rand_string = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();

    let file_name = target
        .file_name()
        .ok_or_else(|| Error::Format(format!("not a file path: {}", target.display())))?
        .to_string_lossy();

    let tmp_name = format!("{file_name}{TMP_MARKER}{rand_string}");

    Ok(target.with_file_name(tmp_name))
}

/// Makes `tmp` visible as `target` without ever replacing an existing file.
///
/// Hard links fail atomically if the target exists. Filesystems without hard
/// link support fall back to an existence check followed by a rename.
fn publish_no_clobber(tmp: &Path, target: &Path) -> Result<()> {
    match fs::hard_link(tmp, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(Error::OutputExists(target.to_path_buf()))
        }
        Err(_) => {
            if target.exists() {
                return Err(Error::OutputExists(target.to_path_buf()));
            }
            fs::rename(tmp, target)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn commit_publishes_data_and_removes_tmp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let mut staged = StagedFile::create(&path).unwrap();
        staged.write_all(b"hello world").unwrap();
        staged.commit().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"hello world");
        assert_eq!(dir_entries(dir.path()), vec!["out.bin".to_string()]);
    }

    #[test]
    fn drop_without_commit_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");

        {
            let mut staged = StagedFile::create(&path).unwrap();
            staged.write_all(b"partial").unwrap();
        }

        assert!(!path.exists());
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[test]
    fn create_fails_if_target_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        fs::write(&path, b"keep me").unwrap();

        let err = StagedFile::create(&path).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::OutputExists);
        assert_eq!(fs::read(&path).unwrap(), b"keep me");
    }

    #[test]
    fn commit_never_replaces_late_arrival() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let mut staged = StagedFile::create(&path).unwrap();
        staged.write_all(b"new").unwrap();
        fs::write(&path, b"raced").unwrap();

        let err = staged.commit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutputExists);
        assert_eq!(fs::read(&path).unwrap(), b"raced");
        assert_eq!(dir_entries(dir.path()), vec!["out.bin".to_string()]);
    }

    #[test]
    fn tmp_names_are_unique_and_siblings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        let a = random_tmp_path(&path).unwrap();
        let b = random_tmp_path(&path).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.parent(), path.parent());
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("store.db.tmp."));
    }

    #[test]
    fn staging_names_are_recognized() {
        let dir = tempdir().unwrap();
        let tmp = random_tmp_path(&dir.path().join("notes.txt.enc")).unwrap();
        assert!(is_staging_name(&tmp.file_name().unwrap().to_string_lossy()));

        assert!(is_staging_name("notes.txt.tmp.0123456789abcdef"));
        assert!(!is_staging_name("notes.txt"));
        assert!(!is_staging_name("notes.tmp.txt"));
        assert!(!is_staging_name("notes.txt.tmp.0123"));
        assert!(!is_staging_name("notes.txt.tmp.0123456789ABCDEF"));
        assert!(!is_staging_name(".tmp.0123456789abcdef"));
    }
}
