//! Configuration management
//!
//! Configuration is loaded once at startup from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. The resulting
//! `Config` is validated and then shared read-only for the process lifetime.

use serde::{Deserialize, Serialize};

/// Signing key used when none is configured. Only suitable for development.
pub const DEVELOPMENT_SIGNING_KEY: &str = "TestForFastHTTPWithJWT";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token and cookie configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Upper bound on pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a request may wait for a pooled connection.
    /// `None` keeps the driver default.
    #[serde(default)]
    pub acquire_timeout_seconds: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_seconds: None,
        }
    }
}

fn default_database_url() -> String {
    "data/sessiongate.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Token issuance configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign tokens
    #[serde(default = "default_signing_key")]
    pub signing_key: String,
    /// Lifetime of an issued token
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
    /// Name of the cookie carrying the token
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: default_signing_key(),
            token_ttl_seconds: default_token_ttl_seconds(),
            cookie_name: default_cookie_name(),
        }
    }
}

// Keeps the signing key out of startup logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_key", &"<redacted>")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

impl AuthConfig {
    /// Whether the built-in development key is still in use
    pub fn uses_development_key(&self) -> bool {
        self.signing_key == DEVELOPMENT_SIGNING_KEY
    }
}

fn default_signing_key() -> String {
    DEVELOPMENT_SIGNING_KEY.to_string()
}

fn default_token_ttl_seconds() -> u64 {
    24 * 60 * 60
}

fn default_cookie_name() -> String {
    "access_token".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file, apply environment overrides and validate
    ///
    /// Environment variables follow the pattern:
    /// - SESSIONGATE_SERVER_HOST
    /// - SESSIONGATE_SERVER_PORT
    /// - SESSIONGATE_SERVER_CORS_ORIGIN
    /// - SESSIONGATE_DATABASE_DRIVER
    /// - SESSIONGATE_DATABASE_URL
    /// - SESSIONGATE_DATABASE_MAX_CONNECTIONS
    /// - SESSIONGATE_DATABASE_ACQUIRE_TIMEOUT_SECONDS
    /// - SESSIONGATE_AUTH_SIGNING_KEY
    /// - SESSIONGATE_AUTH_TOKEN_TTL_SECONDS
    /// - SESSIONGATE_AUTH_COOKIE_NAME
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.signing_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.signing_key must not be empty".to_string(),
            ));
        }
        if self.auth.token_ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "auth.token_ttl_seconds must be greater than zero".to_string(),
            ));
        }
        let cookie = &self.auth.cookie_name;
        if cookie.is_empty()
            || cookie
                .chars()
                .any(|c| c == ';' || c == '=' || c == ',' || c.is_whitespace() || c.is_control())
        {
            return Err(ConfigError::ValidationError(format!(
                "auth.cookie_name '{}' is not a valid cookie name",
                cookie
            )));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("SESSIONGATE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SESSIONGATE_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("SESSIONGATE_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("SESSIONGATE_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("SESSIONGATE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(max) = std::env::var("SESSIONGATE_DATABASE_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse::<u32>() {
                self.database.max_connections = max;
            }
        }
        if let Ok(timeout) = std::env::var("SESSIONGATE_DATABASE_ACQUIRE_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.database.acquire_timeout_seconds = Some(timeout);
            }
        }

        // Auth configuration
        if let Ok(key) = std::env::var("SESSIONGATE_AUTH_SIGNING_KEY") {
            self.auth.signing_key = key;
        }
        if let Ok(ttl) = std::env::var("SESSIONGATE_AUTH_TOKEN_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.auth.token_ttl_seconds = ttl;
            }
        }
        if let Ok(name) = std::env::var("SESSIONGATE_AUTH_COOKIE_NAME") {
            self.auth.cookie_name = name;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
