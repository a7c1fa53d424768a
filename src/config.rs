use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; SaleMonitor/1.0)";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub user_agent: String,
    pub request_timeout: u64, // seconds
    pub max_retries: u32,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub products_csv: String,
    pub state_file: String,
    pub history_db: String,
    /// 0 keeps history forever.
    pub history_retention_days: u32,
    pub lock_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            products_csv: "data/products.csv".to_string(),
            state_file: "data/state.json".to_string(),
            history_db: "data/history.db".to_string(),
            history_retention_days: 0,
            lock_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub interval_minutes: u64,
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationsConfig {
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_server: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub use_starttls: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: None,
            smtp_port: 587,
            username: None,
            password: None,
            from_address: None,
            to_address: None,
            use_starttls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// When set, logs are also written to daily-rotated files here.
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with built-in defaults
            .add_source(Config::try_from(&AppConfig::default())?)
            // Optional config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "SALE_MONITOR__"
            .add_source(
                Environment::with_prefix("SALE_MONITOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_legacy_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Fill unset email settings from the plain `SMTP_*` variables older
    /// deployments export.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let email = &mut self.notifications.email;

        if let Some(flag) = lookup("ENABLE_EMAIL_NOTIFICATIONS") {
            email.enabled = matches!(flag.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "y");
        }
        if email.smtp_server.is_none() {
            email.smtp_server = lookup("SMTP_SERVER");
        }
        if let Some(port) = lookup("SMTP_PORT").and_then(|p| p.trim().parse().ok()) {
            email.smtp_port = port;
        }
        if email.username.is_none() {
            email.username = lookup("SMTP_USERNAME");
        }
        if email.password.is_none() {
            email.password = lookup("SMTP_PASSWORD");
        }
        if email.from_address.is_none() {
            email.from_address = lookup("FROM_EMAIL").or_else(|| email.username.clone());
        }
        if email.to_address.is_none() {
            email.to_address = lookup("RECIPIENT_EMAIL").or_else(|| email.username.clone());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate scraper configuration
        if self.scraper.max_retries == 0 {
            return Err(ConfigError::Message("Scraper max_retries must be greater than 0".into()));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.scraper.user_agent.trim().is_empty() {
            return Err(ConfigError::Message("Scraper user_agent must not be empty".into()));
        }

        // Validate storage configuration
        if self.storage.lock_timeout_secs == 0 {
            return Err(ConfigError::Message("Storage lock_timeout_secs must be greater than 0".into()));
        }

        // Validate scheduler configuration
        if self.scheduler.interval_minutes == 0 {
            return Err(ConfigError::Message("Scheduler interval_minutes must be greater than 0".into()));
        }

        // Validate server configuration
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        // Validate metrics configuration
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        // Validate email configuration
        let email = &self.notifications.email;
        if email.enabled {
            let missing: Vec<&str> = [
                ("smtp_server", email.smtp_server.is_none()),
                ("username", email.username.is_none()),
                ("password", email.password.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();

            if !missing.is_empty() {
                return Err(ConfigError::Message(format!(
                    "Email notifications enabled but missing: {}",
                    missing.join(", ")
                )));
            }

            if email.smtp_port == 0 {
                return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
            }
        }

        Ok(())
    }
}
