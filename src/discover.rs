//! Directory walking and candidate selection.

use crate::codec::is_encrypted_name;
use crate::staging::is_staging_name;
use std::fs::{self, ReadDir};
use std::io;
use std::path::{Path, PathBuf};

/// Log and state files of the host toolkit that are never encrypted.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["sniper-config.log", "sniper-config.json"];

/// Which kind of file a walk should select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every regular file that is not a container and not excluded.
    Encrypt,
    /// Only files carrying the container suffix.
    Decrypt,
}

/// File name suffixes skipped in [`Mode::Encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusions {
    suffixes: Vec<String>,
}

impl Default for Exclusions {
    fn default() -> Self {
        Self {
            suffixes: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Exclusions {
    /// An empty list.
    pub fn none() -> Self {
        Self {
            suffixes: Vec::new(),
        }
    }

    pub fn with(mut self, suffix: impl Into<String>) -> Self {
        self.suffixes.push(suffix.into());
        self
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.suffixes.iter().any(|s| file_name.ends_with(s.as_str()))
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }
}

impl<S: Into<String>> Extend<S> for Exclusions {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.suffixes.extend(iter.into_iter().map(Into::into));
    }
}

/// A lazy walk over a directory tree.
///
/// Symbolic links are not followed. Unreadable directories are yielded as
/// errors and the walk continues with their siblings.
pub struct Discovery {
    mode: Mode,
    exclusions: Exclusions,
    pending_root: Option<PathBuf>,
    stack: Vec<ReadDir>,
}

/// Starts walking `root`. Nothing is read until the first `next()`.
pub fn discover(root: &Path, mode: Mode, exclusions: Exclusions) -> Discovery {
    Discovery {
        mode,
        exclusions,
        pending_root: Some(root.to_path_buf()),
        stack: Vec::new(),
    }
}

/// Walks `root` to completion and sorts the selected paths.
///
/// Walk errors are returned alongside the paths rather than aborting.
pub fn discover_sorted(
    root: &Path,
    mode: Mode,
    exclusions: Exclusions,
) -> (Vec<PathBuf>, Vec<io::Error>) {
    let mut paths = Vec::new();
    let mut errors = Vec::new();
    for item in discover(root, mode, exclusions) {
        match item {
            Ok(path) => paths.push(path),
            Err(e) => errors.push(e),
        }
    }
    paths.sort();
    (paths, errors)
}

impl Discovery {
    fn selects(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy();
        if is_staging_name(&name) {
            return false;
        }
        match self.mode {
            Mode::Decrypt => is_encrypted_name(path),
            Mode::Encrypt => !is_encrypted_name(path) && !self.exclusions.matches(&name),
        }
    }

    fn open_dir(&mut self, dir: &Path) -> io::Result<()> {
        let reader = fs::read_dir(dir)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", dir.display())))?;
        self.stack.push(reader);
        Ok(())
    }
}

impl Iterator for Discovery {
    type Item = io::Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(root) = self.pending_root.take() {
            if let Err(e) = self.open_dir(&root) {
                return Some(Err(e));
            }
        }

        loop {
            let next = self.stack.last_mut()?.next();
            let entry = match next {
                None => {
                    self.stack.pop();
                    continue;
                }
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(entry)) => entry,
            };

            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(e) => return Some(Err(e)),
            };
            let path = entry.path();

            if file_type.is_dir() {
                if let Err(e) = self.open_dir(&path) {
                    return Some(Err(e));
                }
            } else if file_type.is_file() && self.selects(&path) {
                return Some(Ok(path));
            }
        }
    }
}
