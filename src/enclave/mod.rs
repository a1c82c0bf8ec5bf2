// Strongbox — Enclave Module
//
// Cryptographic primitives consumed by the stores and the token service:
// one-way password hashing (Argon2id), token signing (HMAC-SHA256) and the
// provider of the signing secret (configured, or kept in the OS keyring).

mod error;
mod password;
mod provider;
mod signer;

pub use error::EnclaveError;
pub use password::{Argon2Hasher, SecretHasher, ARGON2_M_COST, ARGON2_P_COST, ARGON2_T_COST};
pub use provider::{KeyringProvider, SigningSecretProvider, StaticSecret};
pub use signer::{TokenSigner, MIN_SECRET_LEN};

#[cfg(test)]
pub use provider::mock::MockSecretProvider;
