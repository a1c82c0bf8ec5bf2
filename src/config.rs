// Strongbox — Configuration
//
// `Config` is the serde form read from an optional TOML file and overlaid
// with `STRONGBOX_*` environment variables. It is validated and compiled once
// at startup into `Settings`, which holds ready-to-use values (compiled
// regexes, durations, the hasher and the token signer) and is handed by
// reference to everything that needs it. There is no global configuration.

use std::path::{Path, PathBuf};

use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enclave::{
    Argon2Hasher, KeyringProvider, SigningSecretProvider, StaticSecret, TokenSigner,
};
use crate::error::StrongboxError;
use crate::store::DataLimits;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: String, message: String },

    #[error("Environment variable '{var}': {message}")]
    Env { var: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ─── Environment ─────────────────────────────────────────────────────────────

pub const ENV_DB_PATH: &str = "STRONGBOX_DB_PATH";
pub const ENV_SOCKET: &str = "STRONGBOX_SOCKET";
pub const ENV_SIGNING_SECRET: &str = "STRONGBOX_SIGNING_SECRET";
pub const ENV_INITIAL_USERS: &str = "STRONGBOX_INITIAL_USERS";

/// Upper bound for either token TTL: ten years, in minutes.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

// ─── File form ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub tokens: TokenConfig,
    pub data: DataConfig,
    pub accounts: AccountConfig,
    pub hashing: HashingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub socket_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    /// When unset, a secret is generated once and kept in the OS keyring.
    pub signing_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub key_pattern: String,
    pub value_max_bytes: usize,
    pub keys_per_user: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub name_pattern: String,
    pub registration_open: bool,
    /// When non-empty, only these names may self-register.
    pub allowed_users: Vec<String>,
    /// `name:password` entries created at startup; a `!` after the name
    /// marks an admin.
    pub initial_users: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

fn data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("strongbox")
}

impl Default for StorageConfig {
    fn default() -> Self {
        // `$XDG_RUNTIME_DIR/strongbox/strongbox.sock`, else under /tmp
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"));
        Self {
            db_path: data_dir().join("strongbox.db"),
            socket_path: runtime_dir.join("strongbox").join("strongbox.sock"),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl_minutes: 15,
            refresh_ttl_minutes: 60 * 24 * 7,
            signing_secret: None,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            key_pattern: r"^[a-zA-Z0-9_-]{1,32}$".to_string(),
            value_max_bytes: 256_000,
            keys_per_user: 50,
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            name_pattern: r"^[a-zA-Z0-9_-]{3,32}$".to_string(),
            registration_open: true,
            allowed_users: Vec::new(),
            initial_users: Vec::new(),
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            m_cost: crate::enclave::ARGON2_M_COST,
            t_cost: crate::enclave::ARGON2_T_COST,
            p_cost: crate::enclave::ARGON2_P_COST,
        }
    }
}

impl Config {
    /// Default config file: `<config dir>/strongbox/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join("strongbox").join("config.toml"))
    }

    /// Load from `path` (or the default location if it exists), then apply
    /// the process environment and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Overlay values from the environment; `lookup` returns a variable's
    /// value if set.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        // An empty variable counts as unset.
        let get = |var: &str| lookup(var).filter(|value| !value.is_empty());

        if let Some(path) = get(ENV_DB_PATH) {
            self.storage.db_path = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_SOCKET) {
            self.storage.socket_path = PathBuf::from(path);
        }
        if let Some(secret) = get(ENV_SIGNING_SECRET) {
            self.tokens.signing_secret = Some(secret);
        }
        if let Some(list) = get(ENV_INITIAL_USERS) {
            let users: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect();
            for entry in &users {
                InitialUser::parse(entry).map_err(|e| ConfigError::Env {
                    var: ENV_INITIAL_USERS.to_string(),
                    message: e.to_string(),
                })?;
            }
            self.accounts.initial_users = users;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, minutes) in [
            ("tokens.access_ttl_minutes", self.tokens.access_ttl_minutes),
            ("tokens.refresh_ttl_minutes", self.tokens.refresh_ttl_minutes),
        ] {
            if minutes <= 0 {
                return Err(ConfigError::invalid(field, "must be positive"));
            }
            if minutes > MAX_TTL_MINUTES {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be at most {} minutes", MAX_TTL_MINUTES),
                ));
            }
        }
        if self.tokens.refresh_ttl_minutes < self.tokens.access_ttl_minutes {
            return Err(ConfigError::invalid(
                "tokens.refresh_ttl_minutes",
                "must not be shorter than the access token TTL",
            ));
        }
        if self.data.value_max_bytes == 0 {
            return Err(ConfigError::invalid("data.value_max_bytes", "must be positive"));
        }
        if self.data.keys_per_user == 0 {
            return Err(ConfigError::invalid("data.keys_per_user", "must be positive"));
        }
        compile_pattern("data.key_pattern", &self.data.key_pattern)?;
        compile_pattern("accounts.name_pattern", &self.accounts.name_pattern)?;
        for entry in &self.accounts.initial_users {
            InitialUser::parse(entry)?;
        }
        Ok(())
    }
}

fn compile_pattern(field: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::invalid(field, e.to_string()))
}

// ─── Initial users ───────────────────────────────────────────────────────────

/// A user to create at startup if it does not exist yet.
#[derive(Clone, PartialEq, Eq)]
pub struct InitialUser {
    pub name: String,
    pub password: String,
    pub admin: bool,
}

impl InitialUser {
    /// Parse `name:password` or `name!:password` (admin).
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let Some((name, password)) = entry.split_once(':') else {
            return Err(ConfigError::invalid(
                "accounts.initial_users",
                "entries must look like name:password",
            ));
        };
        let (name, admin) = parse_admin_marker(name);
        if name.is_empty() || password.is_empty() {
            return Err(ConfigError::invalid(
                "accounts.initial_users",
                "name and password must not be empty",
            ));
        }
        Ok(Self {
            name: name.to_string(),
            password: password.to_string(),
            admin,
        })
    }
}

/// Strip a trailing `!` admin marker from a user name.
pub fn parse_admin_marker(name: &str) -> (&str, bool) {
    match name.strip_suffix('!') {
        Some(stripped) => (stripped, true),
        None => (name, false),
    }
}

impl std::fmt::Debug for InitialUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitialUser")
            .field("name", &self.name)
            .field("password", &"[REDACTED]")
            .field("admin", &self.admin)
            .finish()
    }
}

// ─── Compiled settings ───────────────────────────────────────────────────────

/// Validated, ready-to-use configuration.
pub struct Settings {
    pub db_path: PathBuf,
    pub socket_path: PathBuf,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub data_limits: DataLimits,
    pub name_pattern: Regex,
    pub registration_open: bool,
    pub allowed_users: Vec<String>,
    pub initial_users: Vec<InitialUser>,
    pub hasher: Argon2Hasher,
    pub signer: TokenSigner,
}

impl Settings {
    /// Compile `config`, resolving the signing secret from the config or,
    /// failing that, from the OS keyring.
    pub fn from_config(config: &Config) -> Result<Self, StrongboxError> {
        match &config.tokens.signing_secret {
            Some(secret) => Self::compile(config, &StaticSecret::new(secret.as_bytes())?),
            None => Self::compile(config, &KeyringProvider::new()),
        }
    }

    pub fn compile(
        config: &Config,
        secrets: &dyn SigningSecretProvider,
    ) -> Result<Self, StrongboxError> {
        config.validate()?;

        let data_limits = DataLimits {
            key_pattern: compile_pattern("data.key_pattern", &config.data.key_pattern)?,
            max_value_bytes: config.data.value_max_bytes,
            max_keys: config.data.keys_per_user,
        };
        let initial_users = config
            .accounts
            .initial_users
            .iter()
            .map(|entry| InitialUser::parse(entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            db_path: config.storage.db_path.clone(),
            socket_path: config.storage.socket_path.clone(),
            access_ttl: Duration::minutes(config.tokens.access_ttl_minutes),
            refresh_ttl: Duration::minutes(config.tokens.refresh_ttl_minutes),
            data_limits,
            name_pattern: compile_pattern("accounts.name_pattern", &config.accounts.name_pattern)?,
            registration_open: config.accounts.registration_open,
            allowed_users: config.accounts.allowed_users.clone(),
            initial_users,
            hasher: Argon2Hasher::new(
                config.hashing.m_cost,
                config.hashing.t_cost,
                config.hashing.p_cost,
            )?,
            signer: TokenSigner::new(secrets.get_or_create_signing_secret()?)?,
        })
    }

    /// Whether `name` may self-register.
    pub fn may_register(&self, name: &str) -> bool {
        if self.allowed_users.is_empty() {
            self.registration_open
        } else {
            self.allowed_users.iter().any(|allowed| allowed == name)
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::enclave::MockSecretProvider;

    /// Settings over a database at `db_path`, with cheap hashing.
    pub(crate) fn test_settings(db_path: &Path) -> Settings {
        let mut config = Config::default();
        config.storage.db_path = db_path.to_path_buf();
        config.data.keys_per_user = 3;
        config.data.value_max_bytes = 1024;
        let mut settings = Settings::compile(&config, &MockSecretProvider::new()).unwrap();
        settings.hasher = Argon2Hasher::fast();
        settings
    }

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.data.keys_per_user, 50);
        assert_eq!(config.data.value_max_bytes, 256_000);
    }

    #[test]
    fn test_parse_toml_with_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [data]
            keys_per_user = 3

            [accounts]
            allowed_users = ["foo"]
            "#,
        )
        .unwrap();
        assert_eq!(config.data.keys_per_user, 3);
        assert_eq!(config.data.value_max_bytes, 256_000);
        assert_eq!(config.accounts.allowed_users, vec!["foo"]);
        assert_eq!(config.tokens.access_ttl_minutes, 15);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tokens]\naccess_ttl_minutes = 5\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.tokens.access_ttl_minutes, 5);

        std::fs::write(&path, "[tokens\n").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(|var| match var {
                ENV_DB_PATH => Some("/var/lib/strongbox.db".to_string()),
                ENV_INITIAL_USERS => Some("root!:password1, guest:password2".to_string()),
                ENV_SOCKET => Some(String::new()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.storage.db_path, PathBuf::from("/var/lib/strongbox.db"));
        assert_eq!(config.accounts.initial_users, vec!["root!:password1", "guest:password2"]);
        assert_ne!(config.storage.socket_path, PathBuf::new());
    }

    #[test]
    fn test_env_rejects_malformed_initial_users() {
        let mut config = Config::default();
        let result = config.apply_env(|var| {
            (var == ENV_INITIAL_USERS).then(|| "nopassword".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Env { .. })));
    }

    #[test]
    fn test_initial_user_parsing() {
        let admin = InitialUser::parse("root!:hgEiPCZP").unwrap();
        assert_eq!(admin.name, "root");
        assert!(admin.admin);
        assert_eq!(admin.password, "hgEiPCZP");

        let user = InitialUser::parse("foo:pass:word").unwrap();
        assert_eq!(user.name, "foo");
        assert!(!user.admin);
        assert_eq!(user.password, "pass:word");

        assert!(InitialUser::parse(":password").is_err());
        assert!(!format!("{:?}", admin).contains("hgEiPCZP"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.data.key_pattern = "([".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tokens.refresh_ttl_minutes = 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.keys_per_user = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_token_ttls() {
        let mut config = Config::default();
        config.tokens.refresh_ttl_minutes = 200_000_000_000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "tokens.refresh_ttl_minutes"
        ));

        let mut config = Config::default();
        config.tokens.access_ttl_minutes = i64::MAX;
        config.tokens.refresh_ttl_minutes = i64::MAX;
        assert!(config.validate().is_err());
        assert!(Settings::compile(&config, &MockSecretProvider::new()).is_err());

        let mut config = Config::default();
        config.tokens.refresh_ttl_minutes = MAX_TTL_MINUTES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_registration_rules() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(&dir.path().join("db"));
        assert!(settings.may_register("anyone"));

        settings.allowed_users = vec!["foo".to_string()];
        assert!(settings.may_register("foo"));
        assert!(!settings.may_register("bar"));

        settings.registration_open = false;
        assert!(settings.may_register("foo"), "a non-empty allow-list decides alone");

        settings.allowed_users.clear();
        assert!(!settings.may_register("foo"));
    }

    #[test]
    fn test_compile_builds_limits_and_durations() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir.path().join("db"));
        assert_eq!(settings.data_limits.max_keys, 3);
        assert_eq!(settings.access_ttl, Duration::minutes(15));
        assert!(settings.data_limits.key_pattern.is_match("bar"));
        assert!(!settings.data_limits.key_pattern.is_match("b/r"));
    }
}
