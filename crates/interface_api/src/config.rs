//! API configuration

use serde::Deserialize;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Base URL of the external CMS REST API
    pub cms_base_url: String,
    /// CMS Basic-Auth username
    pub cms_username: String,
    /// CMS Basic-Auth password
    pub cms_password: String,
    /// Upper bound on a single CMS push, in seconds
    pub push_timeout_secs: u64,
    /// Delay before a failed push becomes due again, in seconds
    pub retry_delay_secs: u64,
    /// Attempts after which a queue entry is marked dead
    pub max_sync_attempts: u32,
    /// Interval between re-drive passes, in seconds
    pub redrive_interval_secs: u64,
    /// Log level
    pub log_level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/lexdir".to_string(),
            cms_base_url: String::new(),
            cms_username: String::new(),
            cms_password: String::new(),
            push_timeout_secs: 10,
            retry_delay_secs: 300,
            max_sync_attempts: 5,
            redrive_interval_secs: 60,
            log_level: "info".to_string(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sync-engine tunables derived from this configuration
    pub fn sync_config(&self) -> domain_sync::SyncConfig {
        domain_sync::SyncConfig {
            push_timeout: std::time::Duration::from_secs(self.push_timeout_secs),
            retry_delay: std::time::Duration::from_secs(self.retry_delay_secs),
            max_attempts: self.max_sync_attempts,
            ..Default::default()
        }
    }
}
