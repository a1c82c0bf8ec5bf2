// Strongbox — Service facade
//
// `Vault` owns one open database and composes the credential store, data
// store, token service and authentication gate into the operations clients
// call. Every operation that acts on behalf of a caller takes the caller's
// bearer token and resolves it through the gate first.

use serde::Serialize;

use crate::auth::{AuthError, AuthGate, TokenPair, TokenService};
use crate::config::Settings;
use crate::error::{Result, StrongboxError};
use crate::store::{
    compact_json, CredentialStore, DataStore, Database, Identity, IdentitySummary,
    IdentityUpdate, KvCredentialStore, KvDataStore, Namespace, NewIdentity, StoreError,
};

/// Result of a successful login or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: IdentitySummary,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub identities: usize,
    pub data_items: usize,
    pub revocations: usize,
}

pub struct Vault<'s> {
    settings: &'s Settings,
    db: Database,
}

impl<'s> Vault<'s> {
    /// Open the database named in `settings`.
    pub fn open(settings: &'s Settings) -> Result<Self> {
        if let Some(parent) = settings.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::open(&settings.db_path)?;
        Ok(Self { settings, db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn credentials(&self) -> KvCredentialStore<'_> {
        KvCredentialStore::new(&self.db, &self.settings.hasher)
    }

    fn data(&self) -> KvDataStore<'_> {
        KvDataStore::new(&self.db, &self.settings.data_limits)
    }

    fn tokens(&self) -> TokenService<'_> {
        TokenService::new(
            &self.db,
            &self.settings.signer,
            self.settings.access_ttl,
            self.settings.refresh_ttl,
        )
    }

    fn with_gate<T>(
        &self,
        f: impl FnOnce(&AuthGate<'_>) -> std::result::Result<T, AuthError>,
    ) -> Result<T> {
        let credentials = self.credentials();
        let tokens = self.tokens();
        let gate = AuthGate::new(&credentials, &tokens);
        Ok(f(&gate)?)
    }

    fn resolve(&self, token: &str) -> Result<Identity> {
        self.with_gate(|gate| gate.resolve(token))
    }

    fn resolve_admin(&self, token: &str) -> Result<Identity> {
        self.with_gate(|gate| gate.resolve_admin(token))
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if !self.settings.name_pattern.is_match(name) {
            return Err(StoreError::ValidationFailed(format!(
                "name must match {}",
                self.settings.name_pattern.as_str()
            ))
            .into());
        }
        Ok(())
    }

    // ─── Public ──────────────────────────────────────────────────────────────

    pub fn health(&self) -> Result<Health> {
        let mut health = Health {
            status: "ok",
            identities: 0,
            data_items: 0,
            revocations: 0,
        };
        for (namespace, count) in self.db.stats()? {
            match namespace {
                Namespace::Identity => health.identities = count,
                Namespace::Data => health.data_items = count,
                Namespace::Revocation => health.revocations = count,
            }
        }
        Ok(health)
    }

    /// Self-service registration of a non-admin identity.
    pub fn register(&self, name: &str, password: &str) -> Result<IdentitySummary> {
        if !self.settings.may_register(name) {
            tracing::warn!(name = %name, "Registration refused");
            return Err(StrongboxError::Forbidden(
                "registration is not open for this name".to_string(),
            ));
        }
        self.check_name(name)?;
        Ok(self
            .credentials()
            .create(NewIdentity::new(name, password, false))?)
    }

    pub fn login(&self, name: &str, password: &str) -> Result<Session> {
        let (identity, tokens) = self.with_gate(|gate| gate.login(name, password))?;
        Ok(Session {
            user: identity.summary(),
            tokens,
        })
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let (identity, tokens) = self.with_gate(|gate| gate.refresh(refresh_token))?;
        Ok(Session {
            user: identity.summary(),
            tokens,
        })
    }

    pub fn logout(&self, refresh_token: &str) -> Result<()> {
        self.with_gate(|gate| gate.logout(refresh_token))
    }

    /// Change the caller's own password. The current password is required
    /// even though the caller already holds a valid token.
    pub fn update_account(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let caller = self.resolve(token)?;
        let credentials = self.credentials();
        credentials.authenticate(&caller.name, current_password)?;
        credentials.update(&caller.name, IdentityUpdate::password(new_password))?;
        Ok(())
    }

    // ─── Admin ───────────────────────────────────────────────────────────────

    /// Every identity except the calling admin.
    pub fn list_users(&self, token: &str) -> Result<Vec<IdentitySummary>> {
        let caller = self.resolve_admin(token)?;
        Ok(self.credentials().list(Some(&caller.name))?)
    }

    pub fn create_user(
        &self,
        token: &str,
        name: &str,
        password: &str,
        admin: bool,
    ) -> Result<IdentitySummary> {
        let caller = self.resolve_admin(token)?;
        self.check_name(name)?;
        let summary = self
            .credentials()
            .create(NewIdentity::new(name, password, admin))?;
        tracing::info!(by = %caller.name, name = %name, "Admin created identity");
        Ok(summary)
    }

    pub fn update_user(&self, token: &str, name: &str, update: IdentityUpdate) -> Result<()> {
        let caller = self.resolve_admin(token)?;
        if caller.name == name {
            return Err(StrongboxError::Forbidden(
                "you cannot update yourself".to_string(),
            ));
        }
        if update.is_empty() {
            return Err(StoreError::ValidationFailed(
                "update must contain admin or password".to_string(),
            )
            .into());
        }
        self.credentials().update(name, update)?;
        Ok(())
    }

    /// Delete an identity together with all of its data.
    pub fn delete_user(&self, token: &str, name: &str) -> Result<usize> {
        let caller = self.resolve_admin(token)?;
        let removed = self.credentials().delete(name)?;
        tracing::info!(by = %caller.name, name = %name, "Admin deleted identity");
        Ok(removed)
    }

    // ─── Data ────────────────────────────────────────────────────────────────

    pub fn get_data(&self, token: &str, key: &str) -> Result<Vec<u8>> {
        let caller = self.resolve(token)?;
        Ok(self.data().get(&caller.name, key)?)
    }

    pub fn get_all_data(&self, token: &str) -> Result<Vec<u8>> {
        let caller = self.resolve(token)?;
        Ok(self.data().get_all(&caller.name)?)
    }

    /// Store a JSON body. Bodies over the size limit are refused before
    /// parsing. Whitespace outside strings is then dropped; the remaining
    /// bytes are stored as sent.
    pub fn set_data(
        &self,
        token: &str,
        key: &str,
        body: &[u8],
        declared_len: Option<usize>,
    ) -> Result<()> {
        let caller = self.resolve(token)?;
        let max = self.settings.data_limits.max_value_bytes;
        if declared_len.unwrap_or(0).max(body.len()) > max {
            return Err(StoreError::PayloadTooLarge(max).into());
        }
        let compact = compact_json(body)?;
        self.data().set(&caller.name, key, &compact, declared_len)?;
        Ok(())
    }

    pub fn delete_data(&self, token: &str, key: &str) -> Result<bool> {
        let caller = self.resolve(token)?;
        Ok(self.data().delete(&caller.name, key)?)
    }

    // ─── Maintenance ─────────────────────────────────────────────────────────

    /// Create each configured initial user that does not exist yet.
    /// Returns how many were created.
    pub fn seed_initial_users(&self) -> Result<usize> {
        let credentials = self.credentials();
        let mut created = 0;
        for user in &self.settings.initial_users {
            if credentials.get(&user.name)?.is_some() {
                continue;
            }
            match credentials.create(NewIdentity::new(
                user.name.as_str(),
                user.password.as_str(),
                user.admin,
            )) {
                Ok(_) => created += 1,
                Err(StoreError::AlreadyExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        if created > 0 {
            tracing::info!(created, "Seeded initial users");
        }
        Ok(created)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
