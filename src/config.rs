use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::collab::CollabSettings;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated
    pub cors_origins: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_service_name")]
    pub cloud_service_name: String,

    /// JWT secret key. When absent the API and the socket are unauthenticated.
    pub cloud_auth_jwt_secret: Option<String>,

    /// Database URL for the operation store
    pub db_url: Option<String>,

    /// Age after which a section lock may be taken over by another user
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Number of operations kept in the in-memory log
    #[serde(default = "default_op_log_capacity")]
    pub op_log_capacity: usize,

    #[serde(default = "default_mention_retention_days")]
    pub mention_retention_days: u32,

    #[serde(default = "default_mention_sweep_interval_secs")]
    pub mention_sweep_interval_secs: u64,

    /// Buffer of the collaboration event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("✅ Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "dev" || env == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "prod" || env == "production"
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn mention_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.mention_sweep_interval_secs.max(1))
    }

    /// Settings handed to the collaboration service
    pub fn collab_settings(&self) -> CollabSettings {
        CollabSettings {
            lock_ttl: self.lock_ttl(),
            op_log_capacity: self.op_log_capacity,
            event_channel_capacity: self.event_channel_capacity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            cloud_service_name: default_service_name(),
            cloud_auth_jwt_secret: None,
            db_url: None,
            lock_ttl_secs: default_lock_ttl_secs(),
            op_log_capacity: default_op_log_capacity(),
            mention_retention_days: default_mention_retention_days(),
            mention_sweep_interval_secs: default_mention_sweep_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvError(#[from] envy::Error),
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "brd-collab".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_lock_ttl_secs() -> u64 {
    30
}

fn default_op_log_capacity() -> usize {
    10_000
}

fn default_mention_retention_days() -> u32 {
    30
}

fn default_mention_sweep_interval_secs() -> u64 {
    60 * 60
}

fn default_event_channel_capacity() -> usize {
    1024
}
