// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Tokio worker threads (CPU cores if not set)
    #[serde(default)]
    pub workers: Option<usize>,
    /// Listen backlog queue size
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_backlog() -> i32 {
    128
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            backlog: default_backlog(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Minimum level written (error, warn, info, debug)
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_access_log_format() -> String {
    "combined".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            access_log: true,
            access_log_format: default_access_log_format(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    #[serde(default = "default_true")]
    pub keep_alive: bool,
    /// Upper bound for one connection, in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// How long a request may stay unanswered, in seconds
    #[serde(default = "default_response_timeout")]
    pub response_timeout: u64,
    #[serde(default)]
    pub max_connections: Option<u64>,
}

const fn default_connection_timeout() -> u64 {
    30
}

const fn default_response_timeout() -> u64 {
    10
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive: true,
            connection_timeout: default_connection_timeout(),
            response_timeout: default_response_timeout(),
            max_connections: None,
        }
    }
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default)]
    pub enable_cors: bool,
    /// Pretty-print JSON bodies
    #[serde(default)]
    pub pretty_json: bool,
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

fn default_server_name() -> String {
    "handle-res/0.1".to_string()
}

fn default_health_path() -> String {
    "/healthz".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            enable_cors: false,
            pretty_json: false,
            health_path: default_health_path(),
        }
    }
}
