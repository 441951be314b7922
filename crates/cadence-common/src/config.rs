//! Configuration for Cadence

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Send gateway configuration
    pub gateway: GatewayConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            bind_address: default_bind_address(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// Send gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Endpoint URL messages are POSTed to
    pub url: String,

    /// Per-send wall-clock timeout in seconds
    #[serde(default = "default_send_timeout")]
    pub timeout_secs: u64,
}

fn default_send_timeout() -> u64 {
    30
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between dispatcher scans (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Wall-clock budget of a single dispatcher invocation (seconds)
    #[serde(default = "default_budget")]
    pub budget_secs: u64,

    /// IANA timezone in which policy HH:MM fields are interpreted
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Claims older than this are swept back to waiting (seconds)
    #[serde(default = "default_stale_claim")]
    pub stale_claim_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            budget_secs: default_budget(),
            timezone: default_timezone(),
            stale_claim_secs: default_stale_claim(),
        }
    }
}

fn default_poll_interval() -> u64 {
    60
}

fn default_budget() -> u64 {
    55
}

fn default_timezone() -> String {
    "America/Sao_Paulo".to_string()
}

fn default_stale_claim() -> u64 {
    600
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API port
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Enable Swagger UI
    #[serde(default = "default_enable_swagger")]
    pub enable_swagger: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            enable_swagger: default_enable_swagger(),
        }
    }
}

fn default_api_port() -> u16 {
    8080
}

fn default_enable_swagger() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/cadence/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let scheduler = SchedulerConfig::default();
        assert_eq!(scheduler.poll_interval_secs, 60);
        assert_eq!(scheduler.budget_secs, 55);
        assert_eq!(scheduler.timezone, "America/Sao_Paulo");

        let api = ApiConfig::default();
        assert_eq!(api.port, 8080);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
hostname = "campaigns.example.com"

[database]
url = "postgres://localhost/cadence"

[gateway]
url = "https://gateway.example.com/send"
timeout_secs = 10

[scheduler]
poll_interval_secs = 30
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.hostname, "campaigns.example.com");
        assert_eq!(config.database.url, "postgres://localhost/cadence");
        assert_eq!(config.gateway.timeout_secs, 10);
        assert_eq!(config.scheduler.poll_interval_secs, 30);
        assert_eq!(config.scheduler.budget_secs, 55);
    }
}
