// Strongbox — CLI Command Handlers
//
// Each function handles one CLI subcommand. Configuration is loaded once,
// compiled into `Settings`, and passed down; the `serve` command hands it to
// the UDS server.

use std::sync::Arc;

use crate::config::{parse_admin_marker, Config, Settings};
use crate::error::StrongboxError;
use crate::gateway::UdsServer;
use crate::store::{CredentialStore, IdentityUpdate, NewIdentity, StoreError};
use crate::vault::Vault;

use super::{Cli, Commands, UserCommand};

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<(), StrongboxError> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::Serve { socket } => {
            let mut config = config;
            if let Some(socket) = socket {
                config.storage.socket_path = socket;
            }
            cmd_serve(&config).await
        }
        Commands::Stats => cmd_stats(&config),
        Commands::Purge => cmd_purge(&config),
        Commands::User(command) => cmd_user(&config, command),
    }
}

// ─── Init ────────────────────────────────────────────────────────────────────

fn cmd_init(config: &Config) -> Result<(), StrongboxError> {
    let settings = Settings::from_config(config)?;
    let vault = Vault::open(&settings)?;
    let seeded = vault.seed_initial_users()?;

    println!("✓ Strongbox initialized successfully");
    println!("  Database: {}", settings.db_path.display());
    if config.tokens.signing_secret.is_none() {
        println!("  Signing secret stored in platform keyring");
    }
    if seeded > 0 {
        println!("  Created {} initial user(s)", seeded);
    }
    println!();
    println!("Next: add an admin with `strongbox user add <name>! <password>`");

    Ok(())
}

// ─── Serve ───────────────────────────────────────────────────────────────────

async fn cmd_serve(config: &Config) -> Result<(), StrongboxError> {
    let settings = Settings::from_config(config)?;

    {
        let vault = Vault::open(&settings)?;
        vault.seed_initial_users()?;
        let health = vault.health()?;
        tracing::info!(
            identities = health.identities,
            data_items = health.data_items,
            revocations = health.revocations,
            db = %settings.db_path.display(),
            "Database ready"
        );
    }

    println!(
        "Starting Strongbox UDS server at {}...",
        settings.socket_path.display()
    );
    UdsServer::new(Arc::new(settings)).run().await
}

// ─── Stats / Purge ───────────────────────────────────────────────────────────

fn cmd_stats(config: &Config) -> Result<(), StrongboxError> {
    let settings = Settings::from_config(config)?;
    let vault = open_existing(&settings)?;

    println!("Database: {}\n", settings.db_path.display());
    for (namespace, count) in vault.database().stats()? {
        println!("  {:12} {}", namespace.label(), count);
    }

    Ok(())
}

fn cmd_purge(config: &Config) -> Result<(), StrongboxError> {
    let settings = Settings::from_config(config)?;
    let vault = open_existing(&settings)?;

    let removed = vault.database().purge_expired()?;
    println!("✓ Purged {} expired entr{}", removed, if removed == 1 { "y" } else { "ies" });

    Ok(())
}

// ─── User ────────────────────────────────────────────────────────────────────

fn cmd_user(config: &Config, command: UserCommand) -> Result<(), StrongboxError> {
    let settings = Settings::from_config(config)?;
    let vault = Vault::open(&settings)?;
    let credentials = vault.credentials();

    match command {
        UserCommand::Add { name, password } => {
            let (name, admin) = parse_admin_marker(&name);
            if !settings.name_pattern.is_match(name) {
                return Err(StoreError::ValidationFailed(format!(
                    "name must match {}",
                    settings.name_pattern.as_str()
                ))
                .into());
            }
            match credentials.create(NewIdentity::new(name, password, admin)) {
                Ok(summary) => {
                    let role = if summary.admin { "admin" } else { "user" };
                    println!("✓ Added {} '{}'", role, summary.name);
                }
                Err(StoreError::AlreadyExists(_)) => println!("User already exists"),
                Err(e) => return Err(e.into()),
            }
        }
        UserCommand::List => {
            let users = credentials.list(None)?;
            if users.is_empty() {
                println!("No users yet.");
                println!("Add one with: strongbox user add <name> <password>");
                return Ok(());
            }
            println!("Users ({}):\n", users.len());
            for user in &users {
                println!("  {:32} │ admin: {}", user.name, user.admin);
            }
        }
        UserCommand::Remove { name } => match credentials.delete(&name) {
            Ok(removed) => println!("✓ Removed '{}' and {} data item(s)", name, removed),
            Err(StoreError::NotFound(_)) => println!("User not found: {}", name),
            Err(e) => return Err(e.into()),
        },
        UserCommand::Update {
            name,
            password,
            admin,
        } => {
            let update = IdentityUpdate {
                password: password.map(zeroize::Zeroizing::new),
                is_admin: admin,
            };
            if update.is_empty() {
                println!("Nothing to update; pass --password and/or --admin");
                return Ok(());
            }
            match credentials.update(&name, update) {
                Ok(()) => println!("✓ Updated '{}'", name),
                Err(StoreError::NotFound(_)) => println!("User not found: {}", name),
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Open the database, refusing to create one that does not exist yet.
fn open_existing(settings: &Settings) -> Result<Vault<'_>, StrongboxError> {
    if !settings.db_path.exists() {
        return Err(StrongboxError::Other(format!(
            "Database not found at {}. Run `strongbox init` first.",
            settings.db_path.display()
        )));
    }
    Vault::open(settings)
}
