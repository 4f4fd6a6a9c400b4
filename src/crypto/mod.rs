//! Cryptographic primitives for the file container.
//!
//! Provides key derivation, per-chunk sealing, and container header handling.

pub mod aead;
pub mod header;
pub mod kdf;

pub use aead::{ChunkCipher, generate_nonce, generate_salt, secure_random};
pub use header::{Header, MAGIC};
pub use kdf::{DerivedKey, KdfParams, derive_key, derive_key_with};

/// Length of the salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of the base nonce (12 bytes for ChaCha20-Poly1305).
pub const NONCE_LEN: usize = 12;
/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the Poly1305 authentication tag.
pub const TAG_LEN: usize = 16;
/// Length of the magic bytes (11 bytes "SNIPER_ENC2").
pub const MAGIC_LEN: usize = 11;
/// Plaintext bytes per chunk; only the final chunk may be shorter.
pub const CHUNK_SIZE: usize = 64 * 1024;
/// Sealed bytes per full chunk.
pub const SEALED_CHUNK_SIZE: usize = CHUNK_SIZE + TAG_LEN;
