// ABOUTME: Environment configuration for the authorization server process
// ABOUTME: Parses ports, issuer, token lifetimes, key material, storage URLs, and the security policy
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Environment-based configuration, built once at startup

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use oauth_labs_core::constants::{defaults, jose};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::security::SecurityPolicy;
use crate::crypto::EncryptionKey;
use crate::keys::KeyManager;

/// Strongly typed log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational
    #[default]
    Info,
    /// Debugging
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Convert to `tracing::Level`
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development; missing keys are generated
    #[default]
    Development,
    /// Production; every key must be configured
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Database file
        path: PathBuf,
    },
    /// In-process maps; nothing survives a restart
    Memory,
}

impl DatabaseUrl {
    /// Parse a `DATABASE_URL` value.
    ///
    /// `memory` selects the in-process store; `sqlite::memory:` is an
    /// in-memory `SQLite` database and keeps the `SQLite` backend.
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        if s == "memory" {
            return Self::Memory;
        }
        let path = s.strip_prefix("sqlite:").unwrap_or(s);
        Self::SQLite {
            path: PathBuf::from(path),
        }
    }

    /// Convert to an `sqlx` connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "memory".to_owned(),
        }
    }

    /// Check if this is the in-process store
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/oauth.db"),
        }
    }
}

impl std::fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Where the RSA signing key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningKeySource {
    /// PEM passed inline through the environment
    Inline(String),
    /// PEM file on disk
    File(PathBuf),
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
}

/// Process-wide configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Deployment environment
    pub environment: Environment,
    /// Log level
    pub log_level: LogLevel,
    /// HTTP listener
    pub http: HttpConfig,
    /// `iss` of issued tokens and the metadata issuer
    pub issuer: String,
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// Authorization code lifetime
    pub authorization_code_ttl: Duration,
    /// RSA signing key; generated in development when absent
    pub signing_key: Option<SigningKeySource>,
    /// `kid` of the signing key
    pub key_id: String,
    /// AES-256-GCM key for stored tokens
    pub encryption_key: EncryptionKey,
    /// Pre-shared `x-register-key`; registration is disabled when unset
    pub registration_key: Option<String>,
    /// Client ids that may be registered
    pub allowed_clients: Vec<String>,
    /// Scopes the server offers
    pub scopes_supported: Vec<String>,
    /// Client, consent, user and token storage
    pub storage: DatabaseUrl,
    /// Optional Redis for authorization codes
    pub redis_url: Option<String>,
    /// Login page for unauthenticated authorize requests
    pub login_url: String,
    /// Consent page for authorize requests lacking consent
    pub consent_url: String,
    /// Trusted header carrying the authenticated user id
    pub user_header: String,
    /// Protocol check toggles
    pub security: SecurityPolicy,
}

impl ServerConfig {
    /// Configuration with defaults for everything but the issuer and token key
    #[must_use]
    pub fn new(issuer: &str, encryption_key: EncryptionKey) -> Self {
        Self {
            environment: Environment::Development,
            log_level: LogLevel::Info,
            http: HttpConfig {
                host: "127.0.0.1".to_owned(),
                port: 8080,
            },
            issuer: issuer.trim_end_matches('/').to_owned(),
            access_token_ttl: Duration::from_secs(defaults::ACCESS_TOKEN_TTL_SECS),
            authorization_code_ttl: Duration::from_secs(defaults::AUTHORIZATION_CODE_TTL_SECS),
            signing_key: None,
            key_id: jose::DEFAULT_KEY_ID.to_owned(),
            encryption_key,
            registration_key: None,
            allowed_clients: Vec::new(),
            scopes_supported: defaults::SCOPES_SUPPORTED
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            storage: DatabaseUrl::Memory,
            redis_url: None,
            login_url: "/login".to_owned(),
            consent_url: "/consent".to_owned(),
            user_header: "x-authenticated-user".to_owned(),
            security: SecurityPolicy::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or a production key is missing
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let environment = Environment::from_str_or_default(&env_var_or("ENVIRONMENT", "development"));

        let encryption_key = match env::var("TOKEN_ENCRYPTION_KEY") {
            Ok(hex) => EncryptionKey::from_hex(&hex).context("Invalid TOKEN_ENCRYPTION_KEY")?,
            Err(_) if environment.is_production() => {
                bail!("TOKEN_ENCRYPTION_KEY is required in production")
            }
            Err(_) => {
                warn!("TOKEN_ENCRYPTION_KEY not set; generated an ephemeral key");
                EncryptionKey::generate()
            }
        };

        let port = env_var_or("HTTP_PORT", "8080");
        let host = env_var_or("HOST", "127.0.0.1");
        let issuer = env::var("OAUTH_ISSUER").unwrap_or_else(|_| format!("http://{host}:{port}"));

        let signing_key = env::var("SIGNING_KEY")
            .ok()
            .map(SigningKeySource::Inline)
            .or_else(|| {
                env::var("SIGNING_KEY_PATH")
                    .ok()
                    .map(|p| SigningKeySource::File(PathBuf::from(p)))
            });

        let mut config = Self::new(&issuer, encryption_key);
        config.environment = environment;
        config.log_level = LogLevel::from_str_or_default(&env_var_or("LOG_LEVEL", "info"));
        config.http = HttpConfig {
            host,
            port: port.parse().context("Invalid HTTP_PORT value")?,
        };
        config.access_token_ttl = Duration::from_secs(
            env_var_or(
                "ACCESS_TOKEN_TTL_SECS",
                &defaults::ACCESS_TOKEN_TTL_SECS.to_string(),
            )
            .parse()
            .context("Invalid ACCESS_TOKEN_TTL_SECS value")?,
        );
        config.authorization_code_ttl = Duration::from_secs(
            env_var_or(
                "AUTHORIZATION_CODE_TTL_SECS",
                &defaults::AUTHORIZATION_CODE_TTL_SECS.to_string(),
            )
            .parse()
            .context("Invalid AUTHORIZATION_CODE_TTL_SECS value")?,
        );
        config.signing_key = signing_key;
        config.key_id = env_var_or("KEY_ID", jose::DEFAULT_KEY_ID);
        config.registration_key = env::var("REGISTRATION_KEY").ok().filter(|k| !k.is_empty());
        config.allowed_clients = parse_list(&env_var_or("ALLOWED_CLIENTS", ""));
        if let Ok(scopes) = env::var("SCOPES_SUPPORTED") {
            config.scopes_supported = parse_list(&scopes);
        }
        config.storage = DatabaseUrl::parse_url(&env_var_or("DATABASE_URL", "memory"));
        config.redis_url = env::var("REDIS_URL").ok().filter(|u| !u.is_empty());
        config.login_url = env_var_or("LOGIN_URL", "/login");
        config.consent_url = env_var_or("CONSENT_URL", "/consent");
        config.user_header = env_var_or("USER_HEADER", "x-authenticated-user").to_lowercase();
        config.security = SecurityPolicy::from_env().context("Invalid security policy")?;

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error on inconsistent settings
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.issuer).is_err() {
            bail!("OAUTH_ISSUER must be an absolute URL, got {:?}", self.issuer);
        }
        if self.access_token_ttl.is_zero() || self.authorization_code_ttl.is_zero() {
            bail!("token and code lifetimes must be positive");
        }
        if self.scopes_supported.is_empty() {
            bail!("SCOPES_SUPPORTED must name at least one scope");
        }
        if self.environment.is_production() && self.signing_key.is_none() {
            bail!("SIGNING_KEY or SIGNING_KEY_PATH is required in production");
        }
        if self.registration_key.is_some() && self.allowed_clients.is_empty() {
            warn!("REGISTRATION_KEY is set but ALLOWED_CLIENTS is empty; every registration will fail");
        }
        for weakened in self.security.weakened_checks() {
            warn!(setting = weakened, "Weakened security setting in effect");
        }
        Ok(())
    }

    /// Load or generate the RSA keypair.
    ///
    /// A malformed key is fatal: the server refuses to start.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be read or parsed
    pub fn key_manager(&self) -> Result<KeyManager> {
        match &self.signing_key {
            Some(SigningKeySource::Inline(pem)) => {
                KeyManager::from_pem(&self.key_id, pem).context("Invalid SIGNING_KEY")
            }
            Some(SigningKeySource::File(path)) => {
                let pem = fs::read_to_string(path).with_context(|| {
                    format!("Failed to read signing key from {}", path.display())
                })?;
                KeyManager::from_pem(&self.key_id, &pem)
                    .with_context(|| format!("Invalid signing key in {}", path.display()))
            }
            None if self.environment.is_production() => {
                bail!("SIGNING_KEY or SIGNING_KEY_PATH is required in production")
            }
            None => KeyManager::generate(&self.key_id, defaults::RSA_KEY_BITS)
                .context("Failed to generate signing key"),
        }
    }

    /// Configuration summary for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "OAuth Labs Server Configuration:\n\
             - Environment: {}\n\
             - Listen: {}:{}\n\
             - Issuer: {}\n\
             - Storage: {}\n\
             - Authorization codes: {}\n\
             - Registration: {}\n\
             - Scopes: {}",
            self.environment,
            self.http.host,
            self.http.port,
            self.issuer,
            if self.storage.is_memory() {
                "in-memory"
            } else {
                "SQLite"
            },
            if self.redis_url.is_some() {
                "Redis"
            } else {
                "primary storage"
            },
            if self.registration_key.is_some() {
                "Enabled"
            } else {
                "Disabled"
            },
            self.scopes_supported.join(" "),
        )
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
