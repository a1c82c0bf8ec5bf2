// Strongbox — Store Module
//
// Identity records and per-identity data items on top of an embedded,
// ordered, transactional key-value engine. Every logical operation opens
// exactly one engine transaction.

mod credentials;
mod data;
mod db;
mod error;
pub mod keyspace;
mod models;

pub use credentials::{CredentialStore, KvCredentialStore};
pub use data::{compact_json, DataLimits, DataStore, KvDataStore};
pub use db::{Database, KvTxn};
pub use error::StoreError;
pub use keyspace::Namespace;
pub use models::{
    validate_name, validate_password, Identity, IdentitySummary, IdentityUpdate, NewIdentity,
};
