use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::{env, time::Duration};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub forms: FormsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long a request may wait for validation and the dedup check.
    pub admission_timeout_ms: u64,
}

impl ServerConfig {
    pub fn admission_timeout(&self) -> Duration {
        Duration::from_millis(self.admission_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_contact_address")]
    pub contact_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: default_from_address(),
            contact_address: default_contact_address(),
        }
    }
}

impl From<EmailConfig> for formgate_notification::EmailConfig {
    fn from(config: EmailConfig) -> Self {
        Self {
            smtp_host: config.smtp_host,
            smtp_port: config.smtp_port,
            smtp_username: config.smtp_username,
            smtp_password: config.smtp_password,
            from_address: config.from_address,
            contact_address: config.contact_address,
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    1025
}

fn default_from_address() -> String {
    "noreply@formgate.localhost".to_string()
}

fn default_contact_address() -> String {
    "contact@formgate.localhost".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl From<&DispatchConfig> for formgate_intake::RetryPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> u32 {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdempotencyConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Age after which a claimed key with no dispatch record is taken over.
    #[serde(default = "default_orphan_after_secs")]
    pub orphan_after_secs: u64,
    /// Six-field cron expression (with seconds) for the expired key sweep.
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            retention_secs: default_retention_secs(),
            orphan_after_secs: default_orphan_after_secs(),
            sweep_cron: default_sweep_cron(),
        }
    }
}

impl From<&IdempotencyConfig> for formgate_intake::GuardConfig {
    fn from(config: &IdempotencyConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            retention: Duration::from_secs(config.retention_secs),
            orphan_after: Duration::from_secs(config.orphan_after_secs),
        }
    }
}

fn default_window_secs() -> u64 {
    300
}

fn default_retention_secs() -> u64 {
    86_400
}

fn default_orphan_after_secs() -> u64 {
    60
}

fn default_sweep_cron() -> String {
    "0 */15 * * * *".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FormsConfig {
    #[serde(default = "default_quote_required_fields")]
    pub quote_required_fields: Vec<String>,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            quote_required_fields: default_quote_required_fields(),
        }
    }
}

fn default_quote_required_fields() -> Vec<String> {
    formgate_intake::DEFAULT_QUOTE_FIELDS
        .iter()
        .map(|field| field.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file and environment variables
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (FORMGATE__DATABASE__URL, etc.)
    /// 2. Config file specified by path
    /// 3. Hardcoded defaults
    pub fn load(config_path: Option<String>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        builder = builder
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.admission_timeout_ms", 5000)?
            .set_default("database.url", "sqlite:formgate.db")?
            .set_default("database.max_connections", 5)?;

        let config_file_path = config_path
            .or_else(|| env::var("CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/default.toml".to_string());

        // The file is optional
        if std::path::Path::new(&config_file_path).exists() {
            builder = builder.add_source(File::with_name(&config_file_path));
        }

        builder = builder.add_source(
            Environment::with_prefix("FORMGATE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("forms.quote_required_fields")
                .try_parsing(true),
        );

        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections < 1 {
            return Err("Database max_connections must be at least 1".to_string());
        }
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }
        if self.server.admission_timeout_ms == 0 {
            return Err("Server admission_timeout_ms must be greater than 0".to_string());
        }
        if self.dispatch.max_attempts < 1 {
            return Err("Dispatch max_attempts must be at least 1".to_string());
        }
        if self.idempotency.window_secs == 0 {
            return Err("Idempotency window_secs must be greater than 0".to_string());
        }
        if self.idempotency.retention_secs < self.idempotency.window_secs {
            return Err("Idempotency retention_secs must cover window_secs".to_string());
        }
        if self.idempotency.orphan_after_secs.saturating_mul(1000) < self.server.admission_timeout_ms
        {
            return Err("Idempotency orphan_after_secs must cover admission_timeout_ms".to_string());
        }
        if self.forms.quote_required_fields.is_empty() {
            return Err("Quote required fields must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                admission_timeout_ms: 5000,
            },
            database: DatabaseConfig {
                url: "sqlite:test.db".to_string(),
                max_connections: 5,
            },
            email: EmailConfig::default(),
            dispatch: DispatchConfig::default(),
            idempotency: IdempotencyConfig::default(),
            forms: FormsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_validation_zero_port() {
        let mut config = config();
        config.server.port = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_admission_timeout() {
        let mut config = config();
        config.server.admission_timeout_ms = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_orphan_age_shorter_than_admission_timeout() {
        let mut config = config();
        config.idempotency.orphan_after_secs = 2;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_connections() {
        let mut config = config();
        config.database.max_connections = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_attempts() {
        let mut config = config();
        config.dispatch.max_attempts = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_retention_shorter_than_window() {
        let mut config = config();
        config.idempotency.retention_secs = 60;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_empty_quote_fields() {
        let mut config = config();
        config.forms.quote_required_fields.clear();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_match_retry_policy() {
        let policy = formgate_intake::RetryPolicy::from(&DispatchConfig::default());

        assert_eq!(policy, formgate_intake::RetryPolicy::default());
    }
}
