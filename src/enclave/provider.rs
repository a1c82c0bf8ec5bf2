// Strongbox — Signing secret provider
//
// Supplies the symmetric secret that signs session tokens. When the
// operator configures a secret it is used as-is; otherwise a random secret is
// generated once and kept in the platform keyring, so tokens survive restarts
// without the secret ever being written to a config file.

use rand::RngCore;
use zeroize::Zeroizing;

use super::signer::MIN_SECRET_LEN;
use super::EnclaveError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Service name used to identify Strongbox entries in the platform keyring.
const KEYRING_SERVICE: &str = "strongbox";

/// Username for the keyring entry (identifies the signing secret).
const KEYRING_USER: &str = "token-signing-secret";

/// Length of a generated signing secret in bytes (256-bit entropy).
const GENERATED_SECRET_LEN: usize = 32;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over where the token signing secret lives.
pub trait SigningSecretProvider {
    /// Return the signing secret, creating it on first use where supported.
    fn get_or_create_signing_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError>;
}

/// Generate a cryptographically secure random secret.
fn generate_secret() -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(vec![0u8; GENERATED_SECRET_LEN]);
    rand::rng().fill_bytes(&mut secret);
    secret
}

// ─── Platform keyring ────────────────────────────────────────────────────────

/// Keeps the signing secret in the OS keyring via the `keyring` crate:
///   - Linux: kernel keyutils
///   - macOS: Security.framework Keychain
///   - Windows: Windows Credential Manager
pub struct KeyringProvider {
    service: String,
    user: String,
}

impl KeyringProvider {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
            user: KEYRING_USER.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, EnclaveError> {
        keyring::Entry::new(&self.service, &self.user)
            .map_err(|e| EnclaveError::Keyring(format!("failed to create keyring entry: {}", e)))
    }
}

impl Default for KeyringProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningSecretProvider for KeyringProvider {
    fn get_or_create_signing_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        let entry = self.entry()?;

        match entry.get_secret() {
            Ok(secret) => {
                tracing::debug!("Retrieved signing secret from keyring");
                Ok(Zeroizing::new(secret))
            }
            Err(keyring::Error::NoEntry) => {
                tracing::info!("No signing secret found — generating new one");
                let secret = generate_secret();
                entry.set_secret(&secret).map_err(|e| {
                    EnclaveError::Keyring(format!("failed to store signing secret: {}", e))
                })?;
                tracing::info!("Signing secret stored in platform keyring");
                Ok(secret)
            }
            Err(e) => Err(EnclaveError::Keyring(format!(
                "failed to retrieve signing secret: {}",
                e
            ))),
        }
    }
}

// ─── Configured secret ───────────────────────────────────────────────────────

/// A secret supplied by the operator (config file or environment).
pub struct StaticSecret {
    secret: Zeroizing<Vec<u8>>,
}

impl StaticSecret {
    pub fn new(secret: &[u8]) -> Result<Self, EnclaveError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(EnclaveError::WeakSecret(secret.len(), MIN_SECRET_LEN));
        }
        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
        })
    }
}

impl SigningSecretProvider for StaticSecret {
    fn get_or_create_signing_secret(&self) -> Result<Zeroizing<Vec<u8>>, EnclaveError> {
        Ok(self.secret.clone())
    }
}

// ─── In-Memory Mock for Testing ──────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────
