use crate::crypto::{MAGIC_LEN, NONCE_LEN, SALT_LEN};
use crate::error::{Error, Result};

pub const MAGIC: &[u8; MAGIC_LEN] = b"SNIPER_ENC2";

/// Container header: `MAGIC (11) | SALT (16) | NONCE (12)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
}

impl Header {
    pub const LEN: usize = MAGIC_LEN + SALT_LEN + NONCE_LEN;

    pub fn new(salt: [u8; SALT_LEN], nonce: [u8; NONCE_LEN]) -> Self {
        Self { salt, nonce }
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut buf = [0u8; Self::LEN];
        buf[..MAGIC_LEN].copy_from_slice(MAGIC);
        buf[MAGIC_LEN..MAGIC_LEN + SALT_LEN].copy_from_slice(&self.salt);
        buf[MAGIC_LEN + SALT_LEN..].copy_from_slice(&self.nonce);
        buf
    }

    /// Returns `true` if `data` starts with the container magic.
    pub fn has_magic(data: &[u8]) -> bool {
        data.len() >= MAGIC_LEN && &data[..MAGIC_LEN] == MAGIC
    }

    /// Parses the header from the first bytes of a container.
    ///
    /// Only the magic is checked here; salt and nonce are opaque.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if !Self::has_magic(data) {
            return Err(Error::Format("not a sniper-crypt encrypted file".into()));
        }
        if data.len() < Self::LEN {
            return Err(Error::Format("truncated header".into()));
        }

        let mut offset = MAGIC_LEN;

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&data[offset..offset + SALT_LEN]);
        offset += SALT_LEN;

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[offset..offset + NONCE_LEN]);

        Ok(Header { salt, nonce })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn header_roundtrip() {
        let header = Header::new([1u8; SALT_LEN], [2u8; NONCE_LEN]);

        let bytes = header.to_bytes();
        let parsed = Header::from_bytes(&bytes).unwrap();

        assert_eq!(bytes.len(), 39);
        assert_eq!(&bytes[..MAGIC_LEN], b"SNIPER_ENC2");
        assert_eq!(parsed, header);
    }

    #[test]
    fn header_invalid_magic_fails() {
        let mut data = [0u8; Header::LEN];
        data[..MAGIC_LEN].copy_from_slice(b"NOT_A_MAGIC");

        let err = Header::from_bytes(&data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn header_shorter_than_magic_fails() {
        let err = Header::from_bytes(b"SNIP").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn header_truncated_after_magic_fails() {
        let bytes = Header::new([1u8; SALT_LEN], [2u8; NONCE_LEN]).to_bytes();

        let err = Header::from_bytes(&bytes[..Header::LEN - 1]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }
}
