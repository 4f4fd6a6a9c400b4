//! Streaming encryption and decryption of files.
//!
//! Container layout:
//! ```text
//! MAGIC (11) | SALT (16) | NONCE (12) | CHUNK_0 | CHUNK_1 | ... | CHUNK_N
//! ```
//! Every chunk is at most `CHUNK_SIZE` plaintext bytes sealed with a 16 byte
//! tag. Only the final chunk may be short, and every container holds at
//! least one chunk.

use crate::crypto::{
    CHUNK_SIZE, ChunkCipher, Header, KdfParams, SEALED_CHUNK_SIZE, TAG_LEN, derive_key_with,
    generate_nonce, generate_salt,
};
use crate::error::{Error, Result};
use crate::staging::StagedFile;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// File name suffix of encrypted containers, without the dot.
pub const ENCRYPTED_EXTENSION: &str = "enc";

/// `name.ext` -> `name.ext.enc`
pub fn encrypted_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ENCRYPTED_EXTENSION);
    PathBuf::from(name)
}

/// `name.ext.enc` -> `name.ext`
///
/// # Errors
///
/// Returns [`Error::Format`] if the path does not carry the container suffix.
pub fn decrypted_path(path: &Path) -> Result<PathBuf> {
    let has_suffix = path
        .extension()
        .is_some_and(|ext| ext == ENCRYPTED_EXTENSION);
    let stem = path.file_stem().filter(|s| !s.is_empty());

    match stem {
        Some(stem) if has_suffix => Ok(path.with_file_name(stem)),
        _ => Err(Error::Format(format!(
            "expected a .{ENCRYPTED_EXTENSION} file: {}",
            path.display()
        ))),
    }
}

/// Returns `true` if `path` carries the container suffix.
pub fn is_encrypted_name(path: &Path) -> bool {
    decrypted_path(path).is_ok()
}

/// Encrypts `path` into `path.enc`, returning the output path.
///
/// The input is never modified. On failure no output file is left behind.
pub fn encrypt_file(path: &Path, password: &str) -> Result<PathBuf> {
    encrypt_file_with(path, password, KdfParams::default())
}

/// [`encrypt_file`] with explicit key derivation parameters.
pub fn encrypt_file_with(path: &Path, password: &str, kdf: KdfParams) -> Result<PathBuf> {
    let out_path = encrypted_path(path);
    if out_path.exists() {
        return Err(Error::OutputExists(out_path));
    }

    let input = File::open(path)?;
    let mut output = StagedFile::create(&out_path)?;

    encrypt_stream_with(input, &mut output, password, kdf)?;
    output.commit()?;

    info!(input = %path.display(), output = %out_path.display(), "encrypted file");
    Ok(out_path)
}

/// Decrypts `path.enc` into `path`, returning the output path.
///
/// The input is never modified. On failure no output file is left behind,
/// including after a chunk fails authentication midway.
pub fn decrypt_file(path: &Path, password: &str) -> Result<PathBuf> {
    decrypt_file_with(path, password, KdfParams::default())
}

/// [`decrypt_file`] with explicit key derivation parameters, which must be
/// the ones the container was sealed with.
pub fn decrypt_file_with(path: &Path, password: &str, kdf: KdfParams) -> Result<PathBuf> {
    let out_path = decrypted_path(path)?;
    if out_path.exists() {
        return Err(Error::OutputExists(out_path));
    }

    let input = File::open(path)?;
    let mut output = StagedFile::create(&out_path)?;

    decrypt_stream_with(input, &mut output, password, kdf)?;
    output.commit()?;

    info!(input = %path.display(), output = %out_path.display(), "decrypted file");
    Ok(out_path)
}

/// Encrypts everything readable from `reader` into `writer`.
pub fn encrypt_stream<R: Read, W: Write>(reader: R, writer: W, password: &str) -> Result<()> {
    encrypt_stream_with(reader, writer, password, KdfParams::default())
}

pub fn encrypt_stream_with<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    password: &str,
    kdf: KdfParams,
) -> Result<()> {
    let header = Header::new(generate_salt()?, generate_nonce()?);
    let key = derive_key_with(password, header.salt(), kdf)?;
    let cipher = ChunkCipher::new(&key, *header.nonce());
    drop(key);

    writer.write_all(&header.to_bytes())?;

    let mut current = Zeroizing::new(Vec::with_capacity(SEALED_CHUNK_SIZE));
    let mut next = Zeroizing::new(Vec::with_capacity(SEALED_CHUNK_SIZE));
    read_chunk(&mut reader, &mut current, CHUNK_SIZE)?;

    let mut index: u64 = 0;
    loop {
        // a full chunk is only final if nothing follows it
        if current.len() == CHUNK_SIZE {
            read_chunk(&mut reader, &mut next, CHUNK_SIZE)?;
        } else {
            next.clear();
        }
        let last = next.is_empty();

        cipher.seal(index, last, &mut current)?;
        writer.write_all(&current)?;

        if last {
            break;
        }
        std::mem::swap(&mut current, &mut next);
        index += 1;
    }

    writer.flush()?;
    debug!(chunks = index + 1, "sealed container");
    Ok(())
}

/// Decrypts a container read from `reader` into `writer`.
///
/// The header is validated before any key material is derived.
pub fn decrypt_stream<R: Read, W: Write>(reader: R, writer: W, password: &str) -> Result<()> {
    decrypt_stream_with(reader, writer, password, KdfParams::default())
}

pub fn decrypt_stream_with<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    password: &str,
    kdf: KdfParams,
) -> Result<()> {
    let mut head = Vec::with_capacity(Header::LEN);
    read_chunk(&mut reader, &mut head, Header::LEN)?;
    let header = Header::from_bytes(&head)?;

    let key = derive_key_with(password, header.salt(), kdf)?;
    let cipher = ChunkCipher::new(&key, *header.nonce());
    drop(key);

    let mut current = Zeroizing::new(Vec::with_capacity(SEALED_CHUNK_SIZE));
    let mut next = Zeroizing::new(Vec::with_capacity(SEALED_CHUNK_SIZE));
    read_chunk(&mut reader, &mut current, SEALED_CHUNK_SIZE)?;

    let mut index: u64 = 0;
    loop {
        if current.len() < TAG_LEN {
            // missing or cut-off final chunk
            return Err(Error::Authentication);
        }
        if current.len() == SEALED_CHUNK_SIZE {
            read_chunk(&mut reader, &mut next, SEALED_CHUNK_SIZE)?;
        } else {
            next.clear();
        }
        let last = next.is_empty();

        cipher.open(index, last, &mut current)?;
        writer.write_all(&current)?;

        if last {
            break;
        }
        std::mem::swap(&mut current, &mut next);
        index += 1;
    }

    writer.flush()?;
    debug!(chunks = index + 1, "opened container");
    Ok(())
}

/// Reads up to `len` bytes, stopping early only at end of input.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut Vec<u8>, len: usize) -> io::Result<()> {
    buf.clear();
    reader.by_ref().take(len as u64).read_to_end(buf)?;
    Ok(())
}
