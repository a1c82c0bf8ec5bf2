// Strongbox — Namespaced data store
//
// Per-identity JSON blobs stored under `dta/<owner>/<key>`. Values are kept
// as the exact bytes the caller sent; nothing is parsed or re-encoded on the
// way in or out, so number formatting such as `1e5` survives a round trip.
//
// The key quota has no counter field: the owner's range is counted inside
// the same write transaction as the put.

use regex::Regex;

use super::db::{Database, KvTxn};
use super::keyspace;
use super::StoreError;

/// Limits applied to every `set`.
#[derive(Debug, Clone)]
pub struct DataLimits {
    /// Allowed item keys.
    pub key_pattern: Regex,
    /// Maximum stored value size in bytes.
    pub max_value_bytes: usize,
    /// Maximum number of distinct keys per identity.
    pub max_keys: usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

pub trait DataStore {
    /// Fetch one item. A key outside the allowed pattern is reported as
    /// `NotFound`, the same as an absent one.
    fn get(&self, owner: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Every item of `owner` merged into a single JSON object.
    fn get_all(&self, owner: &str) -> Result<Vec<u8>, StoreError>;

    /// Number of items `owner` would hold after writing `candidate`.
    fn count(&self, owner: &str, candidate: &str) -> Result<usize, StoreError>;

    /// Store `raw` verbatim. `declared_len` is the length the caller announced
    /// for the body, if any; the larger of it and the actual length is checked.
    fn set(
        &self,
        owner: &str,
        key: &str,
        raw: &[u8],
        declared_len: Option<usize>,
    ) -> Result<(), StoreError>;

    /// Remove one item. Returns whether anything was removed.
    fn delete(&self, owner: &str, key: &str) -> Result<bool, StoreError>;
}

// ─── KV Implementation ───────────────────────────────────────────────────────

pub struct KvDataStore<'a> {
    db: &'a Database,
    limits: &'a DataLimits,
}

impl<'a> KvDataStore<'a> {
    pub fn new(db: &'a Database, limits: &'a DataLimits) -> Self {
        Self { db, limits }
    }

    fn check_key(&self, key: &str) -> Result<(), StoreError> {
        if !self.limits.key_pattern.is_match(key) {
            return Err(StoreError::ValidationFailed(format!(
                "key must match {}",
                self.limits.key_pattern.as_str()
            )));
        }
        Ok(())
    }

    fn count_in(txn: &KvTxn<'_>, owner: &str, candidate: &str) -> Result<usize, StoreError> {
        let existing = txn.count(&keyspace::data_prefix(owner)?)?;
        let candidate_present = txn.contains(&keyspace::data_key(owner, candidate)?)?;
        Ok(if candidate_present { existing } else { existing + 1 })
    }
}

impl<'a> DataStore for KvDataStore<'a> {
    fn get(&self, owner: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        if self.check_key(key).is_err() {
            return Err(StoreError::NotFound(key.to_string()));
        }

        let txn = self.db.read()?;
        txn.get(&keyspace::data_key(owner, key)?)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn get_all(&self, owner: &str) -> Result<Vec<u8>, StoreError> {
        let prefix = keyspace::data_prefix(owner)?;
        let txn = self.db.read()?;
        let items = txn.scan(&prefix)?;

        let mut out = Vec::with_capacity(items.iter().map(|(k, v)| k.len() + v.len() + 4).sum());
        out.push(b'{');
        let mut first = true;
        for (raw_key, value) in &items {
            let Some(name) = prefix.strip(raw_key) else {
                continue;
            };
            if !first {
                out.push(b',');
            }
            first = false;
            serde_json::to_writer(&mut out, &String::from_utf8_lossy(name))?;
            out.push(b':');
            out.extend_from_slice(value);
        }
        out.push(b'}');

        Ok(out)
    }

    fn count(&self, owner: &str, candidate: &str) -> Result<usize, StoreError> {
        let txn = self.db.read()?;
        Self::count_in(&txn, owner, candidate)
    }

    fn set(
        &self,
        owner: &str,
        key: &str,
        raw: &[u8],
        declared_len: Option<usize>,
    ) -> Result<(), StoreError> {
        self.check_key(key)?;
        let item_key = keyspace::data_key(owner, key)?;

        let txn = self.db.write()?;
        if Self::count_in(&txn, owner, key)? > self.limits.max_keys {
            return Err(StoreError::QuotaExceeded(self.limits.max_keys));
        }

        let size = declared_len.map_or(raw.len(), |declared| declared.max(raw.len()));
        if size > self.limits.max_value_bytes {
            return Err(StoreError::PayloadTooLarge(self.limits.max_value_bytes));
        }

        txn.put(&item_key, raw)?;
        txn.commit()?;

        tracing::debug!(owner = %owner, key = %key, bytes = raw.len(), "Data item stored");
        Ok(())
    }

    fn delete(&self, owner: &str, key: &str) -> Result<bool, StoreError> {
        // Keys the codec refuses were never stored.
        let Ok(item_key) = keyspace::data_key(owner, key) else {
            return Ok(false);
        };

        let txn = self.db.write()?;
        let removed = txn.delete(&item_key)?;
        txn.commit()?;

        if removed {
            tracing::debug!(owner = %owner, key = %key, "Data item deleted");
        }
        Ok(removed)
    }
}

// ─── JSON compaction ─────────────────────────────────────────────────────────

/// Validate `raw` as JSON and drop insignificant whitespace.
///
/// Only whitespace outside string literals is removed; number and string
/// text is copied byte for byte.
pub fn compact_json(raw: &[u8]) -> Result<Vec<u8>, StoreError> {
    serde_json::from_slice::<serde::de::IgnoredAny>(raw)
        .map_err(|e| StoreError::ValidationFailed(format!("invalid JSON body: {}", e)))?;

    let mut out = Vec::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;

    for &byte in raw {
        if in_string {
            out.push(byte);
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b' ' | b'\t' | b'\n' | b'\r' => {}
            b'"' => {
                in_string = true;
                out.push(byte);
            }
            _ => out.push(byte),
        }
    }

    Ok(out)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_keys: usize) -> DataLimits {
        DataLimits {
            key_pattern: Regex::new(r"^[a-zA-Z0-9_-]{1,32}$").unwrap(),
            max_value_bytes: 64,
            max_keys,
        }
    }

    #[test]
    fn test_set_then_get_returns_exact_bytes() {
        let db = Database::open_in_memory().unwrap();
        let limits = limits(10);
        let store = KvDataStore::new(&db, &limits);

        store.set("foo", "bar", br#"{"hello":1e5}"#, None).unwrap();
        assert_eq!(store.get("foo", "bar").unwrap(), br#"{"hello":1e5}"#);
    }

    #[test]
    fn test_get_missing_or_invalid_key_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let limits = limits(10);
        let store = KvDataStore::new(&db, &limits);

        assert!(matches!(store.get("foo", "bar"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.get("foo", "b/r"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.get("foo", "bär"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_set_rejects_invalid_key() {
        let db = Database::open_in_memory().unwrap();
        let limits = limits(10);
        let store = KvDataStore::new(&db, &limits);

        let long = "k".repeat(33);
        for key in ["", "a b", "a/b", long.as_str()] {
            assert!(
                matches!(store.set("foo", key, b"1", None), Err(StoreError::ValidationFailed(_))),
                "{:?} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_quota_counts_distinct_keys_only() {
        let db = Database::open_in_memory().unwrap();
        let limits = limits(3);
        let store = KvDataStore::new(&db, &limits);

        for key in ["a", "b", "c"] {
            store.set("foo", key, b"1", None).unwrap();
        }

        // A fourth distinct key trips the quota
        assert!(matches!(
            store.set("foo", "d", b"1", None),
            Err(StoreError::QuotaExceeded(3))
        ));

        // Overwriting an already-counted key never does
        store.set("foo", "c", b"2", None).unwrap();
        assert_eq!(store.get("foo", "c").unwrap(), b"2");

        // Freeing a slot lets the fourth key in
        assert!(store.delete("foo", "a").unwrap());
        store.set("foo", "d", b"1", None).unwrap();
        assert_eq!(store.count("foo", "d").unwrap(), 3);
    }

    #[test]
    fn test_quota_is_per_owner() {
        let db = Database::open_in_memory().unwrap();
        let limits = limits(1);
        let store = KvDataStore::new(&db, &limits);

        store.set("foo", "a", b"1", None).unwrap();
        store.set("bar", "a", b"1", None).unwrap();
        assert!(store.set("foo", "b", b"1", None).is_err());
    }

    #[test]
    fn test_count_adds_one_for_absent_candidate() {
        let db = Database::open_in_memory().unwrap();
        let limits = limits(10);
        let store = KvDataStore::new(&db, &limits);

        assert_eq!(store.count("foo", "a").unwrap(), 1);
        store.set("foo", "a", b"1", None).unwrap();
        assert_eq!(store.count("foo", "a").unwrap(), 1);
        assert_eq!(store.count("foo", "b").unwrap(), 2);
    }

    #[test]
    fn test_value_size_limit() {
        let db = Database::open_in_memory().unwrap();
        let limits = limits(10);
        let store = KvDataStore::new(&db, &limits);

        let big = vec![b'1'; 65];
        assert!(matches!(
            store.set("foo", "a", &big, None),
            Err(StoreError::PayloadTooLarge(64))
        ));

        // A declared length above the limit is refused even for a small body
        assert!(matches!(
            store.set("foo", "a", b"1", Some(1000)),
            Err(StoreError::PayloadTooLarge(64))
        ));

        store.set("foo", "a", &vec![b'1'; 64], Some(64)).unwrap();
    }

    #[test]
    fn test_get_all_merges_items() {
        let db = Database::open_in_memory().unwrap();
        let limits = limits(10);
        let store = KvDataStore::new(&db, &limits);

        assert_eq!(store.get_all("foo").unwrap(), b"{}");

        store.set("foo", "bar", br#"{"hello":"world!"}"#, None).unwrap();
        store.set("foo", "baz", b"[1,2]", None).unwrap();
        store.set("foobar", "x", b"true", None).unwrap();

        let all = store.get_all("foo").unwrap();
        assert_eq!(all, br#"{"bar":{"hello":"world!"},"baz":[1,2]}"#);

        let parsed: serde_json::Value = serde_json::from_slice(&all).unwrap();
        assert_eq!(parsed["baz"][1], 2);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let limits = limits(10);
        let store = KvDataStore::new(&db, &limits);

        store.set("foo", "bar", b"1", None).unwrap();
        assert!(store.delete("foo", "bar").unwrap());
        assert!(!store.delete("foo", "bar").unwrap());
        assert!(!store.delete("foo", "a/b").unwrap());
        assert_eq!(store.get_all("foo").unwrap(), b"{}");
    }

    #[test]
    fn test_compact_json_preserves_number_text() {
        let compact = compact_json(b"{ \"hello\" :\n  1e5 }").unwrap();
        assert_eq!(compact, br#"{"hello":1e5}"#);
    }

    #[test]
    fn test_compact_json_keeps_whitespace_inside_strings() {
        let compact = compact_json(br#"{ "a b" : "c \" d" , "e": [ 1 , 2 ] }"#).unwrap();
        assert_eq!(compact, br#"{"a b":"c \" d","e":[1,2]}"#);
    }

    #[test]
    fn test_compact_json_rejects_invalid_json() {
        assert!(matches!(
            compact_json(b"{not json"),
            Err(StoreError::ValidationFailed(_))
        ));
    }
}
