//! Password-based streaming file encryption.
//!
//! Files are sealed chunk by chunk with ChaCha20-Poly1305 under a key
//! derived with Argon2id from the password and a fresh per-file salt, so
//! inputs of any size are processed in bounded memory. Directory trees are
//! handled by [`Engine::run_batch`], which isolates per-file failures.

pub mod batch;
pub mod codec;
pub mod crypto;
pub mod discover;
pub mod erase;
mod error;
pub mod settings;
mod staging;

pub use crate::batch::{
    BatchOptions, BatchReport, CancelToken, Engine, FileOutcome, NullReporter, Operation,
    Reporter, Status,
};
pub use crate::codec::{
    ENCRYPTED_EXTENSION, decrypt_file, decrypt_file_with, decrypt_stream, decrypted_path,
    encrypt_file, encrypt_file_with, encrypt_stream, encrypted_path,
};
pub use crate::crypto::{DerivedKey, KdfParams, derive_key};
pub use crate::discover::{Discovery, Exclusions, Mode, discover, discover_sorted};
pub use crate::erase::secure_delete;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::settings::Settings;
