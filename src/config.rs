use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::ChoiceLists;
use crate::models::Role;
use crate::storage::BackendKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub storage: StorageConfig,

    pub choices: ChoiceLists,

    pub auth: AuthConfig,

    pub security: SecurityConfig,

    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// `pretty` or `json`
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` or `CSV`, case-insensitive. Unset selects SQLite.
    pub backend: Option<String>,

    /// Refuse to start on an unrecognized `backend` instead of falling back
    /// to SQLite.
    pub strict_backend: bool,

    pub csv_path: String,

    pub database_path: String,

    pub max_db_connections: u32,

    pub min_db_connections: u32,

    /// How long a flat-file mutation waits for the file lock.
    pub lock_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: None,
            strict_backend: true,
            csv_path: "data/ai_usage_log.csv".to_string(),
            database_path: "sqlite:data/ai_usage_log.db".to_string(),
            max_db_connections: 5,
            min_db_connections: 1,
            lock_timeout_ms: 5_000,
        }
    }
}

/// Where user records come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    /// The `[[auth.users]]` entries in this file.
    #[default]
    Config,
    /// The `users` table of the SQLite database at `storage.database_path`.
    Database,
}

/// A user provisioned through the config file.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserSeed {
    pub username: String,

    #[serde(default)]
    pub display_name: Option<String>,

    /// Argon2 PHC string, never plaintext.
    pub password_hash: String,

    pub role: Role,
}

impl fmt::Debug for UserSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSeed")
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for session tokens.
    pub token_secret: String,

    /// Deployment-scoped audience bound into every token.
    pub audience: String,

    pub issuer: String,

    pub token_ttl_hours: u64,

    pub cookie_name: String,

    /// Require at least a viewer token for read-only endpoints.
    pub read_requires_viewer: bool,

    /// Editors may only modify entries they submitted; admins may modify any.
    pub owner_only_edits: bool,

    pub credential_source: CredentialSource,

    pub users: Vec<UserSeed>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            audience: "localhost".to_string(),
            issuer: "AI Usage Log".to_string(),
            token_ttl_hours: 24,
            cookie_name: "usagelog_session".to_string(),
            read_requires_viewer: false,
            owner_only_edits: true,
            credential_source: CredentialSource::Config,
            users: Vec::new(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"<redacted>")
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("cookie_name", &self.cookie_name)
            .field("read_requires_viewer", &self.read_requires_viewer)
            .field("owner_only_edits", &self.owner_only_edits)
            .field("credential_source", &self.credential_source)
            .field("users", &self.users)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 19_456,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on the session cookie.
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8501,
            cors_allowed_origins: vec![
                "http://localhost:8501".to_string(),
                "http://127.0.0.1:8501".to_string(),
            ],
            secure_cookies: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("usagelog").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".usagelog").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.token_secret.trim().is_empty() {
            anyhow::bail!("auth.token_secret must be set");
        }

        if self.auth.token_ttl_hours == 0 {
            anyhow::bail!("auth.token_ttl_hours must be > 0");
        }

        if self.auth.audience.trim().is_empty() {
            anyhow::bail!("auth.audience must not be empty");
        }

        BackendKind::resolve(self.storage.backend.as_deref(), self.storage.strict_backend)?;

        let mut seen = std::collections::HashSet::new();
        for user in &self.auth.users {
            if !seen.insert(user.username.as_str()) {
                anyhow::bail!("duplicate user '{}' in auth.users", user.username);
            }
        }

        Ok(())
    }
}
