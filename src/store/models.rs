// Strongbox — Identity data models
//
// SECURITY: The `password_hash` field is intentionally private. It is never
// included in Debug output, log messages, or serialized responses; only the
// store reads it back for verification. Outward-facing code works with
// `IdentitySummary`, which has no hash at all.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::StoreError;

/// Identity names are 3–32 characters.
pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 32;

/// Passwords are 8–64 characters.
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 64;

/// A registered identity, as held by the credential store.
#[derive(Clone)]
pub struct Identity {
    pub name: String,
    pub is_admin: bool,
    /// One-way hash of the password — NEVER printed, logged, or serialized outward
    password_hash: String,
}

impl Identity {
    pub(crate) fn new(name: String, is_admin: bool, password_hash: String) -> Self {
        Self {
            name,
            is_admin,
            password_hash,
        }
    }

    /// The stored password hash, for verification only.
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// The non-sensitive projection of this identity.
    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            name: self.name.clone(),
            admin: self.is_admin,
        }
    }
}

/// Custom Debug implementation that NEVER reveals the hash.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("is_admin", &self.is_admin)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// The outward view of an identity, used for listings and login responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub name: String,
    pub admin: bool,
}

/// The record persisted under `usr/<name>`.
#[derive(Serialize, Deserialize)]
pub(crate) struct IdentityRecord {
    pub name: String,
    pub admin: bool,
    pub password: String,
}

impl From<IdentityRecord> for Identity {
    fn from(record: IdentityRecord) -> Self {
        Identity::new(record.name, record.admin, record.password)
    }
}

impl From<&Identity> for IdentityRecord {
    fn from(identity: &Identity) -> Self {
        IdentityRecord {
            name: identity.name.clone(),
            admin: identity.is_admin,
            password: identity.password_hash.clone(),
        }
    }
}

/// Input struct for creating a new identity.
pub struct NewIdentity {
    pub name: String,
    pub is_admin: bool,
    pub password: Zeroizing<String>,
}

impl NewIdentity {
    pub fn new(name: impl Into<String>, password: impl Into<String>, is_admin: bool) -> Self {
        Self {
            name: name.into(),
            is_admin,
            password: Zeroizing::new(password.into()),
        }
    }
}

/// Partial update; omitted fields keep their stored value.
#[derive(Default)]
pub struct IdentityUpdate {
    pub password: Option<Zeroizing<String>>,
    pub is_admin: Option<bool>,
}

impl IdentityUpdate {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(Zeroizing::new(password.into())),
            is_admin: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.is_admin.is_none()
    }
}

pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(StoreError::ValidationFailed(format!(
            "name must be {}-{} characters",
            NAME_MIN_LEN, NAME_MAX_LEN
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), StoreError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(StoreError::ValidationFailed(format!(
            "password must be {}-{} characters",
            PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
        )));
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
