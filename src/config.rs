//! Configuration management for Finbot
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{FinbotError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Main configuration structure for Finbot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Hosted model used for extraction, transcription and OCR
    #[serde(default)]
    pub model: ModelConfig,

    /// Expense ledger database connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Webhook server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Conversation store settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Confirmation formatting
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Hosted model configuration
///
/// One model identifier is reused for chat extraction, audio transcription
/// and image OCR.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier (e.g. `gemini-2.5-flash`)
    #[serde(default = "default_model")]
    pub model: String,

    /// API credential; prefer `FINBOT_API_KEY` or `GOOGLE_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL (overridable for tests and proxies)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// HTTP client timeout for a single model call
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            api_base: default_api_base(),
            timeout_seconds: default_model_timeout(),
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// PostgreSQL connection parameters for the expense ledger
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Database port
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database name
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Database user
    #[serde(default = "default_db_user")]
    pub user: String,

    /// Database password; prefer `DB_PASSWORD`
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Target table, optionally schema-qualified (`schema."Table"`)
    #[serde(default = "default_db_table")]
    pub table: String,
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "finanzas".to_string()
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_table() -> String {
    r#"bot_finanzas."Data""#.to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: None,
            table: default_db_table(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("table", &self.table)
            .finish()
    }
}

/// Webhook server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Listening port
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// How long a webhook call waits for the pipeline before answering
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum accepted request body (base64 media included)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8001
}

fn default_request_timeout() -> u64 {
    300
}

fn default_max_body_bytes() -> usize {
    20 * 1024 * 1024 // 20 MiB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Conversation store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// JSON file holding every sender's transcript
    #[serde(default = "default_memory_path")]
    pub path: PathBuf,
}

fn default_memory_path() -> PathBuf {
    PathBuf::from("memories.json")
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: default_memory_path(),
        }
    }
}

/// Ledger presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Currency symbol echoed in confirmations (amounts carry no currency)
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_currency_symbol() -> String {
    "S/".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
        }
    }
}

/// Matches `table`, `"Table"`, `schema.table` or `schema."Table"`
fn table_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let ident = r#"(?:[A-Za-z_][A-Za-z0-9_]*|"[A-Za-z_][A-Za-z0-9_ ]*")"#;
        Regex::new(&format!(r"^{ident}(?:\.{ident})?$")).expect("valid table name regex")
    })
}

/// Check that a configured table name is a plain (optionally schema-qualified,
/// optionally quoted) SQL identifier
///
/// # Examples
///
/// ```
/// use finbot::config::is_valid_table_name;
///
/// assert!(is_valid_table_name(r#"bot_finanzas."Data""#));
/// assert!(is_valid_table_name("expenses"));
/// assert!(!is_valid_table_name("expenses; DROP TABLE x"));
/// ```
pub fn is_valid_table_name(name: &str) -> bool {
    table_name_regex().is_match(name)
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FinbotError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| FinbotError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        // Model overrides
        if let Ok(model) = std::env::var("FINBOT_MODEL") {
            self.model.model = model;
        }

        // FINBOT_API_KEY wins over the generic Google variable
        if let Ok(key) = std::env::var("FINBOT_API_KEY").or_else(|_| std::env::var("GOOGLE_API_KEY"))
        {
            self.model.api_key = Some(key);
        }

        if let Ok(api_base) = std::env::var("FINBOT_API_BASE") {
            self.model.api_base = api_base;
        }

        if let Ok(timeout) = std::env::var("FINBOT_MODEL_TIMEOUT") {
            if let Ok(value) = timeout.parse() {
                self.model.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid FINBOT_MODEL_TIMEOUT: {}", timeout);
            }
        }

        // Database overrides use the plain DB_* names of the deployment
        if let Ok(host) = std::env::var("DB_HOST") {
            self.database.host = host;
        }

        if let Ok(port) = std::env::var("DB_PORT") {
            match port.parse::<u16>() {
                Ok(v) => self.database.port = v,
                Err(_) => tracing::warn!("Invalid value for DB_PORT: {}", port),
            }
        }

        if let Ok(name) = std::env::var("DB_NAME") {
            self.database.name = name;
        }

        if let Ok(user) = std::env::var("DB_USER") {
            self.database.user = user;
        }

        if let Ok(password) = std::env::var("DB_PASSWORD") {
            self.database.password = Some(password);
        }

        if let Ok(table) = std::env::var("FINBOT_DB_TABLE") {
            self.database.table = table;
        }

        // Server overrides
        if let Ok(host) = std::env::var("FINBOT_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("FINBOT_PORT").or_else(|_| std::env::var("PORT")) {
            match port.parse::<u16>() {
                Ok(v) => {
                    self.server.port = v;
                    tracing::debug!(port = v, "Env override: server port");
                }
                Err(_) => tracing::warn!("Invalid server port in environment: {}", port),
            }
        }

        if let Ok(path) = std::env::var("FINBOT_MEMORY_PATH") {
            self.memory.path = PathBuf::from(path);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let crate::cli::Commands::Serve { port: Some(port) } = cli.command {
            self.server.port = port;
        }
    }

    /// Validate the configuration
    ///
    /// Checks values that would otherwise surface as confusing runtime
    /// failures. The API key is not required here so that offline commands
    /// such as `history` work without credentials; `serve` checks it.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.model.model.trim().is_empty() {
            return Err(FinbotError::Config("model.model cannot be empty".to_string()).into());
        }

        if self.model.timeout_seconds == 0 {
            return Err(FinbotError::Config(
                "model.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.port == 0 {
            return Err(
                FinbotError::Config("server.port must be greater than 0".to_string()).into(),
            );
        }

        if self.server.request_timeout_secs == 0 {
            return Err(FinbotError::Config(
                "server.request_timeout_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.max_body_bytes == 0 {
            return Err(FinbotError::Config(
                "server.max_body_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if !is_valid_table_name(&self.database.table) {
            return Err(FinbotError::Config(format!(
                "database.table is not a valid table name: {}",
                self.database.table
            ))
            .into());
        }

        if self.memory.path.as_os_str().is_empty() {
            return Err(FinbotError::Config("memory.path cannot be empty".to_string()).into());
        }

        Ok(())
    }

    /// Return the model API key or a configuration error naming the variables
    /// that can supply it
    pub fn require_api_key(&self) -> Result<&str> {
        match self.model.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(FinbotError::Config(
                "model API key missing; set FINBOT_API_KEY or GOOGLE_API_KEY".to_string(),
            )
            .into()),
        }
    }
}
