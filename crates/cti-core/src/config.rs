//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration is layered from `config/default.toml`, `config/{RUN_MODE}.toml` and
//! environment variables prefixed with `CTI__`.
//!
//! The `pbx` section carries the static tables (extensions, trunks, queues) that the
//! bootstrap sequence enumerates; the PBX itself is only asked about runtime state.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use tracing::debug;
use validator::Validate;

use crate::error::AppError;
use crate::privacy::Privacy;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub ami: AmiConfig,
    #[serde(default)]
    #[validate(nested)]
    pub pbx: PbxConfig,
    #[serde(default)]
    pub privacy: Privacy,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    #[validate(length(min = 1))]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    #[validate(range(min = 1))]
    pub workers: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8182
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Asterisk manager interface connection
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AmiConfig {
    /// PBX hostname or IP
    #[validate(length(min = 1))]
    pub host: String,

    /// Manager port
    #[serde(default = "default_ami_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Manager user
    #[validate(length(min = 1))]
    pub username: String,

    /// Manager secret
    pub secret: String,

    /// Delay between reconnection attempts in seconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Delay before the single bootstrap retry, in milliseconds
    #[serde(default = "default_bootstrap_retry_delay")]
    pub bootstrap_retry_delay_ms: u64,

    /// Upper bound for a correlated command; 0 waits forever
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_ami_port() -> u16 {
    5038
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_bootstrap_retry_delay() -> u64 {
    3000
}

fn default_command_timeout() -> u64 {
    30
}

impl AmiConfig {
    /// `host:port` of the manager interface
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Static PBX tables
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct PbxConfig {
    #[serde(default)]
    #[validate(nested)]
    pub extensions: Vec<ExtensionConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub trunks: Vec<TrunkConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub queues: Vec<QueueConfig>,

    /// Substring identifying the Local channels used to route calls into queues
    #[serde(default = "default_relay_marker")]
    pub queue_relay_marker: String,

    /// Remote sites whose users can join local conferences
    #[serde(default)]
    pub remote_sites: Vec<RemoteSiteConfig>,

    /// Dialplan context used for extension state lookups
    #[serde(default = "default_hint_context")]
    pub hint_context: String,
}

impl Default for PbxConfig {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            trunks: Vec::new(),
            queues: Vec::new(),
            queue_relay_marker: default_relay_marker(),
            remote_sites: Vec::new(),
            hint_context: default_hint_context(),
        }
    }
}

fn default_relay_marker() -> String {
    "@from-queue".to_string()
}

fn default_hint_context() -> String {
    "ext-local".to_string()
}

/// A configured extension
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ExtensionConfig {
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Channel technology (pjsip, iax, ...)
    #[serde(default = "default_tech")]
    pub tech: String,
}

/// A configured trunk
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct TrunkConfig {
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_tech")]
    pub tech: String,
    #[serde(default)]
    pub max_channels: u32,
}

fn default_tech() -> String {
    "pjsip".to_string()
}

/// A configured queue and its dynamic member list
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct QueueConfig {
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dynamic_members: Vec<String>,
}

/// A remote site prefix
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteSiteConfig {
    pub prefix: String,
    pub name: String,
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8182)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("ami.port", 5038)?
            .set_default("ami.reconnect_delay_secs", 5)?
            .set_default("ami.bootstrap_retry_delay_ms", 3000)?
            .set_default("ami.command_timeout_secs", 30)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with CTI_ prefix
            .add_source(
                Environment::with_prefix("CTI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.check()?;
        debug!(run_mode = %run_mode, "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, AppError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("CTI").separator("__"))
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    /// Field validation plus cross-table consistency
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        self.validate_model()
    }

    /// Ids must be unique, and an extension cannot also be a trunk
    pub fn validate_model(&self) -> Result<(), AppError> {
        let mut seen = HashSet::new();
        for id in self
            .pbx
            .extensions
            .iter()
            .map(|e| &e.id)
            .chain(self.pbx.trunks.iter().map(|t| &t.id))
        {
            if !seen.insert(id.as_str()) {
                return Err(AppError::Config(format!("duplicated endpoint id: {}", id)));
            }
        }

        let mut queues = HashSet::new();
        for queue in &self.pbx.queues {
            if !queues.insert(queue.id.as_str()) {
                return Err(AppError::Config(format!("duplicated queue id: {}", queue.id)));
            }
        }
        Ok(())
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl PbxConfig {
    pub fn queue(&self, id: &str) -> Option<&QueueConfig> {
        self.queues.iter().find(|q| q.id == id)
    }

    pub fn is_extension(&self, id: &str) -> bool {
        self.extensions.iter().any(|e| e.id == id)
    }

    pub fn is_trunk(&self, id: &str) -> bool {
        self.trunks.iter().any(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                workers: 2,
            },
            ami: AmiConfig {
                host: "127.0.0.1".to_string(),
                port: 5038,
                username: "proxycti".to_string(),
                secret: "secret".to_string(),
                reconnect_delay_secs: 5,
                bootstrap_retry_delay_ms: 3000,
                command_timeout_secs: 30,
            },
            pbx: PbxConfig {
                extensions: vec![ExtensionConfig {
                    id: "214".to_string(),
                    name: "Alice".to_string(),
                    tech: "pjsip".to_string(),
                }],
                trunks: vec![TrunkConfig {
                    id: "provider".to_string(),
                    name: "Provider".to_string(),
                    tech: "pjsip".to_string(),
                    max_channels: 4,
                }],
                queues: vec![QueueConfig {
                    id: "401".to_string(),
                    name: "Support".to_string(),
                    dynamic_members: vec!["214".to_string()],
                }],
                queue_relay_marker: default_relay_marker(),
                remote_sites: vec![],
                hint_context: default_hint_context(),
            },
            privacy: Privacy::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = sample();
        assert!(config.check().is_ok());
        assert_eq!(config.server_addr(), "0.0.0.0:8182");
        assert_eq!(config.ami.addr(), "127.0.0.1:5038");
        assert!(config.pbx.is_extension("214"));
        assert!(config.pbx.is_trunk("provider"));
        assert_eq!(config.pbx.queue("401").map(|q| q.name.as_str()), Some("Support"));
    }

    #[test]
    fn test_duplicated_endpoint_rejected() {
        let mut config = sample();
        config.pbx.trunks[0].id = "214".to_string();
        assert!(matches!(config.validate_model(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_empty_ami_user_rejected() {
        let mut config = sample();
        config.ami.username.clear();
        assert!(config.check().is_err());
    }
}
