//! Application configuration
//!
//! Centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub billing: BillingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Allowed CORS origins, comma separated
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_cors_origins() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret shared with the identity provider
    pub jwt_secret: String,

    /// Lifetime of tokens minted locally, in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: i64,
}

fn default_jwt_expiration() -> i64 {
    3600
}

/// Billing-specific configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    /// File reference prefix used when a regime has no override
    #[serde(default = "default_file_reference_prefix")]
    pub file_reference_prefix: String,

    /// Per-regime file reference prefixes, keyed by regime slug
    #[serde(default)]
    pub regime_file_prefixes: HashMap<String, String>,

    /// Maximum number of deletion and rebilling tasks running at once
    #[serde(default = "default_background_task_limit")]
    pub background_task_limit: usize,
}

fn default_file_reference_prefix() -> String {
    "nal".to_string()
}

fn default_background_task_limit() -> usize {
    4
}

impl BillingConfig {
    /// File reference prefix for a regime slug
    pub fn file_prefix_for(&self, regime_slug: &str) -> &str {
        self.regime_file_prefixes
            .get(regime_slug)
            .map(String::as_str)
            .unwrap_or(&self.file_reference_prefix)
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            file_reference_prefix: default_file_reference_prefix(),
            regime_file_prefixes: HashMap::new(),
            background_task_limit: default_background_task_limit(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 10)?
            .set_default("auth.jwt_expiration_secs", 3600)?
            .set_default("billing.file_reference_prefix", "nal")?
            .set_default("billing.background_task_limit", 4)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("CHARGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("CHARGE").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
