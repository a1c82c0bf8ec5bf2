// Strongbox — Embedded KV engine
//
// An ordered, transactional key-value engine on top of SQLite. All records
// live in one `WITHOUT ROWID` table keyed by BLOB, so primary-key order is
// lexicographic byte order and prefix scans are index range scans.
//
// Entries may carry an `expires_at` (unix seconds). An expired entry is
// invisible to every read and may be overwritten by a conditional insert;
// `purge_expired()` reaps them physically.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use super::keyspace::{KeyPrefix, Namespace};
use super::StoreError;

/// How long a writer waits for the engine's write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Wrapper around the SQLite connection backing the key-value engine.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // WAL: read transactions see a snapshot and never block the writer.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, path = %path.display(), "Database opened");

        let db = Self { conn };
        db.run_migrations()?;
        db.purge_expired()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing only).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a read transaction (consistent snapshot, never blocks writers).
    pub fn read(&self) -> Result<KvTxn<'_>, StoreError> {
        KvTxn::begin(&self.conn, TransactionBehavior::Deferred)
    }

    /// Begin a write transaction. The engine admits one active writer at a
    /// time; others wait up to `BUSY_TIMEOUT`.
    pub fn write(&self) -> Result<KvTxn<'_>, StoreError> {
        KvTxn::begin(&self.conn, TransactionBehavior::Immediate)
    }

    /// Physically remove every entry whose expiry has passed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![Utc::now().timestamp()],
        )?;
        if removed > 0 {
            tracing::debug!(removed, "Purged expired entries");
        }
        Ok(removed)
    }

    /// Count live records per namespace, classifying every live key. Keys
    /// outside the known regions are reported separately.
    pub fn stats(&self) -> Result<Vec<(Namespace, usize)>, StoreError> {
        let txn = self.read()?;
        let mut counts: Vec<(Namespace, usize)> =
            Namespace::ALL.into_iter().map(|ns| (ns, 0)).collect();
        let mut unknown = 0usize;

        for key in txn.keys()? {
            let Some(ns) = Namespace::of(&key) else {
                unknown += 1;
                continue;
            };
            for (slot, n) in counts.iter_mut() {
                if *slot == ns {
                    *n += 1;
                }
            }
        }
        if unknown > 0 {
            tracing::warn!(unknown, "Keys outside every namespace");
        }
        Ok(counts)
    }

    /// Run schema migrations to create or update tables.
    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key         BLOB PRIMARY KEY,
                value       BLOB NOT NULL,
                expires_at  INTEGER
            ) WITHOUT ROWID;

            CREATE INDEX IF NOT EXISTS idx_kv_expires_at
                ON kv(expires_at) WHERE expires_at IS NOT NULL;
            ",
        )?;

        tracing::debug!("Database migrations completed successfully");
        Ok(())
    }
}

// ─── Transactions ────────────────────────────────────────────────────────────

/// A single engine transaction.
///
/// Dropping a `KvTxn` without calling [`KvTxn::commit`] rolls it back, so an
/// early return through `?` always releases the transaction.
pub struct KvTxn<'c> {
    tx: Transaction<'c>,
    /// Clock reading taken at `begin`; decides which entries are expired.
    now: i64,
}

impl<'c> KvTxn<'c> {
    fn begin(conn: &'c Connection, behavior: TransactionBehavior) -> Result<Self, StoreError> {
        let tx = Transaction::new_unchecked(conn, behavior)?;
        Ok(Self {
            tx,
            now: Utc::now().timestamp(),
        })
    }

    /// Fetch a live value.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self
            .tx
            .query_row(
                "SELECT value FROM kv
                 WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                params![key, self.now],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert or overwrite a non-expiring value.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.upsert(key, value, None)
    }

    /// Insert or overwrite a value that disappears at `expires_at`.
    pub fn put_expiring(
        &self,
        key: &[u8],
        value: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.upsert(key, value, Some(expires_at.timestamp()))
    }

    fn upsert(&self, key: &[u8], value: &[u8], expires_at: Option<i64>) -> Result<(), StoreError> {
        self.tx.execute(
            "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, expires_at],
        )?;
        Ok(())
    }

    /// Conditional put: write only if no live entry exists under `key`.
    /// Returns `false` (and writes nothing) when one does.
    pub fn insert_if_absent(
        &self,
        key: &[u8],
        value: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        // An expired entry counts as absent.
        self.tx.execute(
            "DELETE FROM kv WHERE key = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
            params![key, self.now],
        )?;

        let inserted = self.tx.execute(
            "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO NOTHING",
            params![key, value, expires_at.map(|t| t.timestamp())],
        )?;
        Ok(inserted == 1)
    }

    /// Remove a key. Returns true if it existed.
    pub fn delete(&self, key: &[u8]) -> Result<bool, StoreError> {
        let affected = self
            .tx
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }

    /// All live entries under `prefix`, in key order.
    pub fn scan(&self, prefix: &KeyPrefix) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut stmt = self.tx.prepare(
            "SELECT key, value FROM kv
             WHERE key >= ?1 AND key < ?2 AND (expires_at IS NULL OR expires_at > ?3)
             ORDER BY key ASC",
        )?;

        let rows = stmt.query_map(params![prefix.start(), prefix.end(), self.now], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Every live key in the engine, in key order.
    pub fn keys(&self) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut stmt = self.tx.prepare(
            "SELECT key FROM kv
             WHERE expires_at IS NULL OR expires_at > ?1
             ORDER BY key ASC",
        )?;
        let rows = stmt.query_map(params![self.now], |row| row.get(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    /// Number of live entries under `prefix`.
    pub fn count(&self, prefix: &KeyPrefix) -> Result<usize, StoreError> {
        let count: i64 = self.tx.query_row(
            "SELECT count(*) FROM kv
             WHERE key >= ?1 AND key < ?2 AND (expires_at IS NULL OR expires_at > ?3)",
            params![prefix.start(), prefix.end(), self.now],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Remove every entry under `prefix`. Returns the number removed.
    pub fn delete_prefix(&self, prefix: &KeyPrefix) -> Result<usize, StoreError> {
        let removed = self.tx.execute(
            "DELETE FROM kv WHERE key >= ?1 AND key < ?2",
            params![prefix.start(), prefix.end()],
        )?;
        Ok(removed)
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
