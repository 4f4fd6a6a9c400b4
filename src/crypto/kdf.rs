use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::KEY_LEN;
use crate::error::{Error, Result};

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    mem_cost_kib: u32,
    time_cost: u32,
    parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            // memory cost
            mem_cost_kib: 64 * 1024, // 64 MiB
            // number of passes
            time_cost: 3,
            // lanes
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Parameters are checked by [`KdfParams::validate`] when used.
    pub const fn new(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            mem_cost_kib,
            time_cost,
            parallelism,
        }
    }

    pub fn mem_cost_kib(&self) -> u32 {
        self.mem_cost_kib
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_cost < 1 {
            return Err(Error::Derivation("argon2 time cost must be >= 1".into()));
        }
        if self.parallelism < 1 {
            return Err(Error::Derivation("argon2 parallelism must be >= 1".into()));
        }
        if self.mem_cost_kib < 8 * self.parallelism {
            return Err(Error::Derivation(
                "argon2 memory cost must be at least 8 * parallelism".into(),
            ));
        }
        Ok(())
    }
}

/// A 256-bit file key. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Derive a file key from a password and salt with the fixed cost parameters.
pub fn derive_key(password: &str, salt: &[u8]) -> Result<DerivedKey> {
    derive_key_with(password, salt, KdfParams::default())
}

/// Derive a file key with explicit Argon2id parameters.
pub fn derive_key_with(password: &str, salt: &[u8], kdf: KdfParams) -> Result<DerivedKey> {
    kdf.validate()?;

    let params = Params::new(
        kdf.mem_cost_kib,
        kdf.time_cost,
        kdf.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| Error::Derivation(format!("failed to construct Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = DerivedKey([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key.0)
        .map_err(|e| Error::Derivation(format!("argon2 key derivation failed: {e}")))?;

    Ok(key)
}
