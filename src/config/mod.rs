//! Configuration management for repo-guard
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::security::IpRange;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Protected repository configuration
    #[serde(default)]
    pub security: SecurityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix REPO_GUARD_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("REPO_GUARD_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("REPO_GUARD_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }
        if let Ok(trust) = std::env::var("REPO_GUARD_SERVER_TRUST_PROXY_HEADERS") {
            config.server.trust_proxy_headers =
                parse_bool("REPO_GUARD_SERVER_TRUST_PROXY_HEADERS", &trust)?;
        }
        if let Ok(proxies) = std::env::var("REPO_GUARD_SERVER_TRUSTED_PROXIES") {
            config.server.trusted_proxies = proxies;
        }

        if let Ok(repos) = std::env::var("REPO_GUARD_SECURITY_PROTECTED_REPOS") {
            config.security.protected_repos = repos;
        }
        if let Ok(ranges) = std::env::var("REPO_GUARD_SECURITY_PROTECTED_REPO_WHITE_LISTED_IP_RANGES")
        {
            config.security.protected_repo_white_listed_ip_ranges = ranges;
        }

        if let Ok(level) = std::env::var("REPO_GUARD_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("REPO_GUARD_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Take the remote identity from `X-Remote-Host` / `X-Forwarded-For`
    /// instead of the socket peer address
    #[serde(default)]
    pub trust_proxy_headers: bool,

    /// Comma-delimited IP ranges of the proxies whose headers are believed
    #[serde(default)]
    pub trusted_proxies: String,
}

impl ServerConfig {
    /// Peers allowed to announce the remote identity in proxy headers
    ///
    /// Empty when proxy headers are not trusted. Trusting headers without
    /// naming any proxy is a configuration error.
    pub fn trusted_proxy_ranges(&self) -> Result<Vec<IpRange>, ConfigError> {
        if !self.trust_proxy_headers {
            return Ok(Vec::new());
        }
        let ranges = IpRange::parse_list(&self.trusted_proxies, "trusted_proxies")?;
        if ranges.is_empty() {
            return Err(ConfigError::InvalidValue(
                "trust_proxy_headers requires at least one trusted_proxies entry".to_string(),
            ));
        }
        Ok(ranges)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            trust_proxy_headers: false,
            trusted_proxies: String::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Protected repository configuration
///
/// Both values are comma-delimited lists, kept as raw strings so that the
/// same text can come from YAML, the environment, or a command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SecurityConfig {
    /// Repositories that require whitelist or hostname verification
    #[serde(default)]
    pub protected_repos: String,

    /// IP ranges allowed to read protected repositories
    #[serde(default)]
    pub protected_repo_white_listed_ip_ranges: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or pretty)
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
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Split a comma-delimited configuration list.
///
/// All whitespace is removed and empty entries are dropped, so
/// `" a , ,b "` yields `["a", "b"]`.
pub fn comma_delimited_list(value: &str) -> Vec<String> {
    repo_name(value)
        .split(',')
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize a repository name the way configuration lists do
///
/// All whitespace is removed, so `" my repo "` yields `"myrepo"`.
pub fn repo_name(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Parse(format!("Invalid boolean for {}: {}", key, value)))
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
