// Strongbox — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, serve, stats, purge, user {add, list, remove, update}.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::execute;

/// Strongbox — multi-tenant credential store and per-user JSON data vault.
#[derive(Parser, Debug)]
#[command(name = "strongbox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (default: <config dir>/strongbox/config.toml).
    #[arg(long, global = true, env = "STRONGBOX_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database, resolve the signing secret and seed initial users.
    Init,

    /// Start the JSON-RPC server on a Unix domain socket.
    Serve {
        /// Socket path (overrides the configured one).
        #[arg(long)]
        socket: Option<PathBuf>,
    },

    /// Show record counts per namespace.
    Stats,

    /// Physically remove expired revocation markers.
    Purge,

    /// Manage identities directly, without a session.
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Add an identity. A trailing `!` on the name makes it an admin.
    Add {
        /// Name of the identity, e.g. "alice" or "root!".
        name: String,

        /// Initial password.
        /// For production use, prefer interactive entry to avoid shell history exposure.
        password: String,
    },

    /// List all identities.
    List,

    /// Remove an identity and all of its data.
    Remove {
        name: String,
    },

    /// Change an identity's password or role.
    Update {
        name: String,

        /// New password.
        #[arg(long)]
        password: Option<String>,

        /// Grant (true) or revoke (false) admin rights.
        #[arg(long)]
        admin: Option<bool>,
    },
}
