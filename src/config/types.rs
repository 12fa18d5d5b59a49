// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub assets: AssetsConfig,
    pub inference: InferenceConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (e.g. "info", "edge_dispatch=debug")
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Emit structured JSON instead of human-readable lines
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files (stdout only if not set)
    #[serde(default)]
    pub log_dir: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
    /// Seconds to wait for in-flight connections after a shutdown signal
    pub shutdown_grace_period: u64,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

/// What the asset store answers when no file matches
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NotFoundHandling {
    /// Plain 404
    #[default]
    None,
    /// Nearest `404.html`, served with status 404
    #[serde(rename = "404-page")]
    NotFoundPage,
    /// Root index file, served with status 200
    SinglePageApplication,
}

/// Static asset store configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssetsConfig {
    pub directory: String,
    pub index_files: Vec<String>,
    #[serde(default)]
    pub not_found_handling: NotFoundHandling,
}

/// Request shape expected by the inference backend
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ApiStyle {
    /// `POST {endpoint}/run/{model}`, payload as body
    #[default]
    WorkersAi,
    /// `POST {endpoint}/chat/completions`, model injected into the payload
    #[serde(rename = "openai")]
    OpenAi,
}

impl fmt::Display for ApiStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkersAi => f.write_str("workers-ai"),
            Self::OpenAi => f.write_str("openai"),
        }
    }
}

/// Inference backend configuration
#[derive(Deserialize, Clone)]
pub struct InferenceConfig {
    pub endpoint: String,
    /// Model identifier passed on every chat call
    pub model: String,
    #[serde(default)]
    pub api_style: ApiStyle,
    /// Bearer token for the backend, usually supplied via environment
    #[serde(default)]
    pub api_token: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_style", &self.api_style)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}
