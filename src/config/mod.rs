// Configuration module entry point
// Layered configuration (file, environment, defaults) and shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{
    ApiStyle, AssetsConfig, Config, HttpConfig, InferenceConfig, LoggingConfig,
    NotFoundHandling, PerformanceConfig, ServerConfig,
};

/// Default config file (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Environment prefix, e.g. `EDGE_SERVER__PORT=9000`
const ENV_PREFIX: &str = "EDGE";

impl Config {
    /// Load configuration from the given file path (extension optional)
    ///
    /// A missing file is not an error; environment variables and defaults fill in.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("logging.json", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 90)?
            .set_default("performance.shutdown_grace_period", 10)?
            .set_default("http.server_name", "edge-dispatch")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("assets.directory", "public")?
            .set_default("assets.index_files", vec!["index.html", "index.htm"])?
            .set_default("assets.not_found_handling", "none")?
            .set_default("inference.endpoint", "http://127.0.0.1:8787/ai")?
            .set_default("inference.model", "@cf/meta/llama-3.1-8b-instruct")?
            .set_default("inference.api_style", "workers-ai")?
            .set_default("inference.timeout_secs", 60)?
            .set_default("inference.connect_timeout_secs", 10)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let cfg = Config::load_from("/nonexistent/edge-dispatch-config").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.http.max_body_size, 1_048_576);
        assert_eq!(cfg.assets.index_files, vec!["index.html", "index.htm"]);
        assert_eq!(cfg.assets.not_found_handling, NotFoundHandling::None);
        assert_eq!(cfg.inference.api_style, ApiStyle::WorkersAi);
        assert!(cfg.inference.api_token.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[assets]
directory = "site"
not_found_handling = "single-page-application"

[inference]
endpoint = "https://api.example.com/v1"
model = "gpt-4o-mini"
api_style = "openai"
api_token = "sk-test"
"#
        )
        .unwrap();

        let cfg = Config::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.assets.directory, "site");
        assert_eq!(
            cfg.assets.not_found_handling,
            NotFoundHandling::SinglePageApplication
        );
        assert_eq!(cfg.inference.api_style, ApiStyle::OpenAi);
        assert_eq!(cfg.inference.model, "gpt-4o-mini");
        assert_eq!(cfg.inference.timeout_secs, 60);
    }

    #[test]
    fn test_api_token_is_redacted_in_debug() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[inference]\napi_token = \"super-secret\"").unwrap();

        let cfg = Config::load_from(file.path().to_str().unwrap()).unwrap();
        let debug = format!("{:?}", cfg.inference);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_socket_addr() {
        let cfg = Config::load_from("/nonexistent/edge-dispatch-config").unwrap();
        assert_eq!(cfg.get_socket_addr().unwrap().to_string(), "127.0.0.1:8080");
    }
}
