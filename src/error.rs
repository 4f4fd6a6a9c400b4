//! Error types for the encryption engine.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the encryption engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("output already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("invalid file format: {0}")]
    Format(String),

    #[error("incorrect password or corrupted file")]
    Authentication,

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("could not securely remove {}: {source}", path.display())]
    Erase {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("OS random generator unavailable")]
    Random,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], stable across messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OutputExists,
    Format,
    Authentication,
    Derivation,
    Io,
    Erase,
    Random,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OutputExists(_) => ErrorKind::OutputExists,
            Error::Format(_) => ErrorKind::Format,
            Error::Authentication => ErrorKind::Authentication,
            Error::Derivation(_) => ErrorKind::Derivation,
            Error::Io(_) => ErrorKind::Io,
            Error::Erase { .. } => ErrorKind::Erase,
            Error::Random => ErrorKind::Random,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::OutputExists => "output-exists",
            ErrorKind::Format => "format",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Derivation => "derivation",
            ErrorKind::Io => "io",
            ErrorKind::Erase => "erase",
            ErrorKind::Random => "random",
        };
        f.write_str(name)
    }
}
