// Strongbox — Password hashing
//
// One-way Argon2id hashing of identity passwords. Hashes are stored as PHC
// strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`) so each record
// carries its own parameters and salt; verification never needs the
// hasher's current configuration.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use super::EnclaveError;

// Argon2id parameters: m=65536 (64 MiB), t=3 (3 iterations), p=4 (4 lanes)
pub const ARGON2_M_COST: u32 = 65536;
pub const ARGON2_T_COST: u32 = 3;
pub const ARGON2_P_COST: u32 = 4;

/// Length of the random per-password salt in bytes.
const SALT_LEN: usize = 16;

/// Abstraction over one-way password hashing.
pub trait SecretHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing string.
    fn hash(&self, plaintext: &str) -> Result<String, EnclaveError>;

    /// Check a plaintext password against a stored hash.
    /// Returns `Ok(false)` on mismatch; errors only on a malformed hash.
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, EnclaveError>;
}

/// Argon2id implementation of [`SecretHasher`].
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, EnclaveError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| EnclaveError::Hashing(format!("invalid Argon2 params: {}", e)))?;
        Ok(Self { params })
    }

    /// Minimal-cost hasher so tests don't spend seconds per hash.
    #[cfg(test)]
    pub fn fast() -> Self {
        Self {
            params: Params::new(8, 1, 1, None).unwrap(),
        }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, EnclaveError> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| EnclaveError::Hashing(format!("salt encoding failed: {}", e)))?;

        let hash = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| EnclaveError::Hashing(format!("Argon2id hash failed: {}", e)))?;

        Ok(hash.to_string())
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, EnclaveError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| EnclaveError::Hashing(format!("stored hash is malformed: {}", e)))?;

        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(EnclaveError::Hashing(format!("Argon2id verify failed: {}", e))),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
