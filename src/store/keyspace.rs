// Strongbox — Key-space codec
//
// Partitions the flat, ordered engine key-space into three disjoint regions:
//
//   usr/<name>           identity records
//   dta/<owner>/<key>    data items, grouped by owner
//   exp/<token-id>       revocation markers (expiring entries)
//
// Every raw segment is checked for the separator before it is encoded, so a
// name or key can never reach across a prefix boundary.

use super::StoreError;

/// Separator between key segments. Never valid inside a segment.
pub const SEPARATOR: u8 = b'/';

/// The three logical regions of the key-space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Identity,
    Data,
    Revocation,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Identity, Namespace::Data, Namespace::Revocation];

    fn tag(self) -> &'static [u8] {
        match self {
            Namespace::Identity => b"usr",
            Namespace::Data => b"dta",
            Namespace::Revocation => b"exp",
        }
    }

    /// Human-readable label, used in diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            Namespace::Identity => "identities",
            Namespace::Data => "data items",
            Namespace::Revocation => "revocation markers",
        }
    }

    /// Prefix covering every record of this namespace.
    pub fn prefix(self) -> KeyPrefix {
        let mut bytes = self.tag().to_vec();
        bytes.push(SEPARATOR);
        KeyPrefix(bytes)
    }

    /// Classify a raw engine key; `None` for keys outside every region.
    pub fn of(key: &[u8]) -> Option<Namespace> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.prefix().contains(key))
    }
}

/// A key prefix, usable as the half-open range `[start, end)` in a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix(Vec<u8>);

impl KeyPrefix {
    /// Inclusive lower bound of the range.
    pub fn start(&self) -> &[u8] {
        &self.0
    }

    /// Exclusive upper bound: the prefix with its last byte incremented.
    pub fn end(&self) -> Vec<u8> {
        let mut end = self.0.clone();
        // Every prefix built in this module ends in SEPARATOR (< 0xFF).
        if let Some(last) = end.last_mut() {
            *last = last.saturating_add(1);
        }
        end
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.0)
    }

    /// Strip the prefix from a scanned key, yielding the remaining segment.
    pub fn strip<'k>(&self, key: &'k [u8]) -> Option<&'k [u8]> {
        key.strip_prefix(self.0.as_slice())
    }
}

fn segment(kind: &str, raw: &str) -> Result<(), StoreError> {
    if raw.is_empty() {
        return Err(StoreError::ValidationFailed(format!("{} must not be empty", kind)));
    }
    if raw.as_bytes().contains(&SEPARATOR) {
        return Err(StoreError::ValidationFailed(format!(
            "{} must not contain '{}'",
            kind, SEPARATOR as char
        )));
    }
    Ok(())
}

fn join(ns: Namespace, parts: &[&str]) -> Vec<u8> {
    let mut key = ns.prefix().0;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(SEPARATOR);
        }
        key.extend_from_slice(part.as_bytes());
    }
    key
}

/// `usr/<name>`
pub fn identity_key(name: &str) -> Result<Vec<u8>, StoreError> {
    segment("name", name)?;
    Ok(join(Namespace::Identity, &[name]))
}

/// `dta/<owner>/<key>`
pub fn data_key(owner: &str, key: &str) -> Result<Vec<u8>, StoreError> {
    segment("owner", owner)?;
    segment("key", key)?;
    Ok(join(Namespace::Data, &[owner, key]))
}

/// `dta/<owner>/` — covers exactly one owner's items.
pub fn data_prefix(owner: &str) -> Result<KeyPrefix, StoreError> {
    segment("owner", owner)?;
    let mut bytes = join(Namespace::Data, &[owner]);
    bytes.push(SEPARATOR);
    Ok(KeyPrefix(bytes))
}

/// `exp/<token-id>`
pub fn revocation_key(token_id: &str) -> Result<Vec<u8>, StoreError> {
    segment("token id", token_id)?;
    Ok(join(Namespace::Revocation, &[token_id]))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
