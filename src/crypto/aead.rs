use super::{NONCE_LEN, SALT_LEN};
use crate::crypto::DerivedKey;
use crate::error::{Error, Result};
use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{AeadInPlace, KeyInit},
};
use getrandom::fill;
use std::io;

/// Fill buffer with cryptographically secure random bytes
pub fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| Error::Random)
}

/// Generate salt
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Generate base nonce
pub fn generate_nonce() -> Result<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    secure_random(&mut nonce)?;
    Ok(nonce)
}

/// Seals and opens the chunks of one file.
///
/// Each chunk gets its own nonce: the big-endian chunk index is XORed into
/// bytes 3..11 of the base nonce and the last byte is flipped for the final
/// chunk. Reordered, dropped, or appended chunks therefore fail to open.
pub struct ChunkCipher {
    cipher: ChaCha20Poly1305,
    base_nonce: [u8; NONCE_LEN],
}

impl ChunkCipher {
    pub fn new(key: &DerivedKey, base_nonce: [u8; NONCE_LEN]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key.as_bytes())),
            base_nonce,
        }
    }

    fn chunk_nonce(&self, index: u64, last: bool) -> [u8; NONCE_LEN] {
        let mut nonce = self.base_nonce;
        for (n, c) in nonce[3..11].iter_mut().zip(index.to_be_bytes()) {
            *n ^= c;
        }
        if last {
            nonce[NONCE_LEN - 1] ^= 0x01;
        }
        nonce
    }

    /// Encrypt `buf` in place, appending the tag.
    pub fn seal(&self, index: u64, last: bool, buf: &mut Vec<u8>) -> Result<()> {
        let nonce = self.chunk_nonce(index, last);
        self.cipher
            .encrypt_in_place(Nonce::from_slice(&nonce), b"", buf)
            .map_err(|_| encryption_failed())
    }

    /// Verify and decrypt `buf` in place, stripping the tag.
    pub fn open(&self, index: u64, last: bool, buf: &mut Vec<u8>) -> Result<()> {
        let nonce = self.chunk_nonce(index, last);
        self.cipher
            .decrypt_in_place(Nonce::from_slice(&nonce), b"", buf)
            .map_err(|_| Error::Authentication)
    }
}

fn encryption_failed() -> Error {
    Error::Io(io::Error::other("chunk encryption failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KdfParams, TAG_LEN, derive_key_with};

    fn cipher() -> ChunkCipher {
        let kdf = KdfParams::new(1024, 1, 1);
        let key = derive_key_with("pw", &[9u8; SALT_LEN], kdf).unwrap();
        ChunkCipher::new(&key, [5u8; NONCE_LEN])
    }

    #[test]
    fn chunk_nonces_are_distinct() {
        let c = cipher();
        let a = c.chunk_nonce(0, false);
        let b = c.chunk_nonce(1, false);
        let a_last = c.chunk_nonce(0, true);

        assert_ne!(a, b);
        assert_ne!(a, a_last);
        assert_eq!(c.chunk_nonce(0, false), [5u8; NONCE_LEN]);
    }

    #[test]
    fn seal_open_roundtrip() {
        let c = cipher();
        let mut buf = b"secret data".to_vec();

        c.seal(4, true, &mut buf).unwrap();
        assert_eq!(buf.len(), 11 + TAG_LEN);

        c.open(4, true, &mut buf).unwrap();
        assert_eq!(buf, b"secret data");
    }

    #[test]
    fn wrong_index_or_final_flag_fails() {
        let c = cipher();
        let mut sealed = b"secret data".to_vec();
        c.seal(0, false, &mut sealed).unwrap();

        let mut buf = sealed.clone();
        assert!(matches!(c.open(1, false, &mut buf), Err(Error::Authentication)));

        let mut buf = sealed.clone();
        assert!(matches!(c.open(0, true, &mut buf), Err(Error::Authentication)));
    }

    #[test]
    fn tampered_chunk_fails() {
        let c = cipher();
        let mut buf = b"secret data".to_vec();
        c.seal(0, true, &mut buf).unwrap();
        buf[2] ^= 0xFF;

        assert!(matches!(c.open(0, true, &mut buf), Err(Error::Authentication)));
    }

    #[test]
    fn encryption_failure_is_not_a_format_error() {
        let err = encryption_failed();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
        assert!(err.to_string().contains("chunk encryption failed"));
    }

    #[test]
    fn random_values_differ() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
        assert_ne!(generate_nonce().unwrap(), generate_nonce().unwrap());
    }
}
