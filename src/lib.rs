// Strongbox — Library root
//
// Re-exports the auth, store, enclave, config, vault, CLI and gateway modules.

pub mod auth;
pub mod cli;
pub mod config;
pub mod enclave;
pub mod error;
pub mod gateway;
pub mod store;
pub mod vault;

pub use error::{ErrorKind, Result, StrongboxError};
