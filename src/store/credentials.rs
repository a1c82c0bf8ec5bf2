// Strongbox — Credential Store
//
// CRUD over identity records stored under `usr/<name>`. Each logical
// operation runs in exactly one engine transaction. Key design decisions:
// creation is a single conditional put, so two concurrent creates of the
// same name cannot both succeed; deletion removes the identity and its whole
// data namespace atomically.

use super::db::Database;
use super::keyspace::{self, Namespace};
use super::models::{
    validate_name, validate_password, Identity, IdentityRecord, IdentitySummary, IdentityUpdate,
    NewIdentity,
};
use super::StoreError;
use crate::enclave::SecretHasher;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over identity storage operations.
pub trait CredentialStore {
    /// Create a new identity. Fails with `AlreadyExists` if the name is taken.
    fn create(&self, identity: NewIdentity) -> Result<IdentitySummary, StoreError>;

    /// Get an identity by name. Absence is `Ok(None)`, never an error.
    fn get(&self, name: &str) -> Result<Option<Identity>, StoreError>;

    /// Apply a partial update. Fails with `NotFound` if the identity is absent.
    fn update(&self, name: &str, update: IdentityUpdate) -> Result<(), StoreError>;

    /// Check a name/password pair. Fails with `Unauthorized` on any mismatch.
    fn authenticate(&self, name: &str, password: &str) -> Result<Identity, StoreError>;

    /// Delete an identity and every data item it owns.
    /// Returns the number of data items removed.
    fn delete(&self, name: &str) -> Result<usize, StoreError>;

    /// List identities (no hashes), optionally skipping one name.
    fn list(&self, excluding: Option<&str>) -> Result<Vec<IdentitySummary>, StoreError>;
}

// ─── KV Implementation ───────────────────────────────────────────────────────

pub struct KvCredentialStore<'a> {
    db: &'a Database,
    hasher: &'a dyn SecretHasher,
}

impl<'a> KvCredentialStore<'a> {
    pub fn new(db: &'a Database, hasher: &'a dyn SecretHasher) -> Self {
        Self { db, hasher }
    }

    fn decode(bytes: &[u8]) -> Result<Identity, StoreError> {
        let record: IdentityRecord = serde_json::from_slice(bytes)?;
        Ok(record.into())
    }

    fn encode(identity: &Identity) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(&IdentityRecord::from(identity))?)
    }
}

impl<'a> CredentialStore for KvCredentialStore<'a> {
    fn create(&self, new: NewIdentity) -> Result<IdentitySummary, StoreError> {
        validate_name(&new.name)?;
        validate_password(&new.password)?;
        let key = keyspace::identity_key(&new.name)?;

        // Hash before taking the write lock; Argon2 is deliberately slow.
        let hash = self.hasher.hash(&new.password)?;
        let identity = Identity::new(new.name, new.is_admin, hash);
        let value = Self::encode(&identity)?;

        let txn = self.db.write()?;
        if !txn.insert_if_absent(&key, &value, None)? {
            return Err(StoreError::AlreadyExists(identity.name));
        }
        txn.commit()?;

        tracing::info!(
            name = %identity.name,
            admin = identity.is_admin,
            "Identity created"
        );

        Ok(identity.summary())
    }

    fn get(&self, name: &str) -> Result<Option<Identity>, StoreError> {
        // A name the codec rejects cannot have been stored.
        let Ok(key) = keyspace::identity_key(name) else {
            return Ok(None);
        };

        let txn = self.db.read()?;
        match txn.get(&key)? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn update(&self, name: &str, update: IdentityUpdate) -> Result<(), StoreError> {
        let key = keyspace::identity_key(name)?;

        let new_hash = match &update.password {
            Some(password) => {
                validate_password(password)?;
                Some(self.hasher.hash(password)?)
            }
            None => None,
        };

        let txn = self.db.write()?;
        let current = match txn.get(&key)? {
            Some(bytes) => Self::decode(&bytes)?,
            None => return Err(StoreError::NotFound(name.to_string())),
        };

        let updated = Identity::new(
            current.name.clone(),
            update.is_admin.unwrap_or(current.is_admin),
            new_hash.unwrap_or_else(|| current.password_hash().to_string()),
        );
        txn.put(&key, &Self::encode(&updated)?)?;
        txn.commit()?;

        tracing::info!(
            name = %name,
            password_changed = update.password.is_some(),
            admin = updated.is_admin,
            "Identity updated"
        );

        Ok(())
    }

    fn authenticate(&self, name: &str, password: &str) -> Result<Identity, StoreError> {
        let identity = self.get(name)?.ok_or(StoreError::Unauthorized)?;

        if !self.hasher.verify(password, identity.password_hash())? {
            tracing::debug!(name = %name, "Password mismatch");
            return Err(StoreError::Unauthorized);
        }

        Ok(identity)
    }

    fn delete(&self, name: &str) -> Result<usize, StoreError> {
        let key = keyspace::identity_key(name)?;
        let data = keyspace::data_prefix(name)?;

        let txn = self.db.write()?;
        if !txn.delete(&key)? {
            // Dropping the transaction rolls back; nothing was removed.
            return Err(StoreError::NotFound(name.to_string()));
        }
        let removed = txn.delete_prefix(&data)?;
        txn.commit()?;

        tracing::info!(name = %name, data_items = removed, "Identity deleted");

        Ok(removed)
    }

    fn list(&self, excluding: Option<&str>) -> Result<Vec<IdentitySummary>, StoreError> {
        let txn = self.db.read()?;
        let entries = txn.scan(&Namespace::Identity.prefix())?;

        let mut summaries = Vec::with_capacity(entries.len());
        for (_, bytes) in entries {
            let identity = Self::decode(&bytes)?;
            if Some(identity.name.as_str()) == excluding {
                continue;
            }
            summaries.push(identity.summary());
        }

        Ok(summaries)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::Argon2Hasher;

    fn setup() -> (Database, Argon2Hasher) {
        (Database::open_in_memory().unwrap(), Argon2Hasher::fast())
    }

    #[test]
    fn test_create_then_get_returns_same_name_and_role() {
        let (db, hasher) = setup();
        let store = KvCredentialStore::new(&db, &hasher);

        store
            .create(NewIdentity::new("foo", "hgEiPCZP", true))
            .unwrap();

        let identity = store.get("foo").unwrap().expect("Identity should exist");
        assert_eq!(identity.name, "foo");
        assert!(identity.is_admin);
        assert_ne!(identity.password_hash(), "hgEiPCZP");
    }

    #[test]
    fn test_create_same_name_twice_fails() {
        let (db, hasher) = setup();
        let store = KvCredentialStore::new(&db, &hasher);

        store.create(NewIdentity::new("foo", "password1", false)).unwrap();
        let err = store
            .create(NewIdentity::new("foo", "password2", true))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(ref n) if n == "foo"));

        // The first record is untouched
        let identity = store.get("foo").unwrap().unwrap();
        assert!(!identity.is_admin);
        assert!(store.authenticate("foo", "password1").is_ok());
    }

    #[test]
    fn test_concurrent_create_of_one_name_has_one_winner() {
        use std::sync::{Arc, Barrier};

        const RACERS: usize = 8;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strongbox.db");
        drop(Database::open(&path).unwrap());

        let barrier = Arc::new(Barrier::new(RACERS));
        let handles: Vec<_> = (0..RACERS)
            .map(|i| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let db = Database::open(&path).unwrap();
                    let hasher = Argon2Hasher::fast();
                    let store = KvCredentialStore::new(&db, &hasher);
                    barrier.wait();
                    store.create(NewIdentity::new("racer", format!("password{}", i), false))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::AlreadyExists(_))))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(duplicates, RACERS - 1);

        let db = Database::open(&path).unwrap();
        let hasher = Argon2Hasher::fast();
        let store = KvCredentialStore::new(&db, &hasher);
        assert_eq!(store.list(None).unwrap().len(), 1);
    }

    #[test]
    fn test_create_validates_name_and_password() {
        let (db, hasher) = setup();
        let store = KvCredentialStore::new(&db, &hasher);

        for (name, password) in [("ab", "password1"), ("a/bc", "password1"), ("foo", "short")] {
            let err = store
                .create(NewIdentity::new(name, password, false))
                .unwrap_err();
            assert!(
                matches!(err, StoreError::ValidationFailed(_)),
                "{}/{} should fail validation",
                name,
                password
            );
        }
        assert!(store.list(None).unwrap().is_empty());
    }

    #[test]
    fn test_get_nonexistent_returns_none() {
        let (db, hasher) = setup();
        let store = KvCredentialStore::new(&db, &hasher);
        assert!(store.get("nobody").unwrap().is_none());
        assert!(store.get("bad/name").unwrap().is_none());
    }

    #[test]
    fn test_authenticate() {
        let (db, hasher) = setup();
        let store = KvCredentialStore::new(&db, &hasher);
        store.create(NewIdentity::new("foo", "hgEiPCZP", false)).unwrap();

        assert_eq!(store.authenticate("foo", "hgEiPCZP").unwrap().name, "foo");
        assert!(matches!(
            store.authenticate("foo", "wrongpass"),
            Err(StoreError::Unauthorized)
        ));
        assert!(matches!(
            store.authenticate("nobody", "hgEiPCZP"),
            Err(StoreError::Unauthorized)
        ));
    }

    #[test]
    fn test_password_change_invalidates_old_password() {
        let (db, hasher) = setup();
        let store = KvCredentialStore::new(&db, &hasher);
        store.create(NewIdentity::new("foo", "oldpassword", false)).unwrap();

        store
            .update("foo", IdentityUpdate::password("newpassword"))
            .unwrap();

        assert!(store.authenticate("foo", "oldpassword").is_err());
        assert!(store.authenticate("foo", "newpassword").is_ok());
    }

    #[test]
    fn test_partial_update_keeps_omitted_fields() {
        let (db, hasher) = setup();
        let store = KvCredentialStore::new(&db, &hasher);
        store.create(NewIdentity::new("foo", "password1", false)).unwrap();

        store
            .update(
                "foo",
                IdentityUpdate {
                    password: None,
                    is_admin: Some(true),
                },
            )
            .unwrap();

        let identity = store.get("foo").unwrap().unwrap();
        assert!(identity.is_admin);
        assert!(store.authenticate("foo", "password1").is_ok());
    }

    #[test]
    fn test_update_nonexistent_fails() {
        let (db, hasher) = setup();
        let store = KvCredentialStore::new(&db, &hasher);
        let err = store
            .update("nobody", IdentityUpdate::password("password1"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_delete_cascades_to_data_items() {
        let (db, hasher) = setup();
        let store = KvCredentialStore::new(&db, &hasher);
        store.create(NewIdentity::new("foo", "password1", false)).unwrap();
        store.create(NewIdentity::new("foobar", "password1", false)).unwrap();

        let txn = db.write().unwrap();
        txn.put(&keyspace::data_key("foo", "a").unwrap(), b"1").unwrap();
        txn.put(&keyspace::data_key("foo", "b").unwrap(), b"2").unwrap();
        txn.put(&keyspace::data_key("foobar", "a").unwrap(), b"3").unwrap();
        txn.commit().unwrap();

        assert_eq!(store.delete("foo").unwrap(), 2);
        assert!(store.get("foo").unwrap().is_none());

        let txn = db.read().unwrap();
        assert_eq!(txn.count(&keyspace::data_prefix("foo").unwrap()).unwrap(), 0);
        assert_eq!(txn.count(&keyspace::data_prefix("foobar").unwrap()).unwrap(), 1);
    }

    #[test]
    fn test_delete_nonexistent_fails_and_removes_nothing() {
        let (db, hasher) = setup();
        let store = KvCredentialStore::new(&db, &hasher);

        // Orphaned data under a name with no identity record
        let txn = db.write().unwrap();
        txn.put(&keyspace::data_key("ghost", "a").unwrap(), b"1").unwrap();
        txn.commit().unwrap();

        assert!(matches!(store.delete("ghost"), Err(StoreError::NotFound(_))));
        let txn = db.read().unwrap();
        assert_eq!(txn.count(&keyspace::data_prefix("ghost").unwrap()).unwrap(), 1);
    }

    #[test]
    fn test_list_excludes_caller_and_hides_hashes() {
        let (db, hasher) = setup();
        let store = KvCredentialStore::new(&db, &hasher);
        for (name, admin) in [("foo", true), ("bar", false), ("baz", false)] {
            store.create(NewIdentity::new(name, "password1", admin)).unwrap();
        }

        let all = store.list(None).unwrap();
        let names: Vec<_> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["bar", "baz", "foo"]);

        let others = store.list(Some("foo")).unwrap();
        assert_eq!(
            others,
            vec![
                IdentitySummary {
                    name: "bar".to_string(),
                    admin: false
                },
                IdentitySummary {
                    name: "baz".to_string(),
                    admin: false
                },
            ]
        );

        let json = serde_json::to_string(&all).unwrap();
        assert!(!json.contains("argon2"), "Listing must never contain hashes");
    }
}
