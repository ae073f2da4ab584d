//! Configuration System
//!
//! Loads the server configuration from a TOML file, then applies
//! `FEDSEARCH_*` environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::search::Options;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Search paths must stay inside this directory when set
    #[serde(default)]
    pub home: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8765
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            home: None,
        }
    }
}

impl ApiConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Backend served by the HTTP server
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Registered backend name: fake, peer, mux or a custom one
    #[serde(default = "default_backend")]
    pub name: String,

    /// Passed verbatim to the backend factory
    #[serde(default)]
    pub options: Options,
}

fn default_backend() -> String {
    crate::fake::NAME.to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: default_backend(),
            options: Options::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    /// Filter directive used when `RUST_LOG` is not set
    pub fn filter(&self) -> String {
        format!("fedsearch={},tower_http={}", self.level, self.level)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from the first default location that exists, else from the environment
    pub fn load_default() -> Self {
        for path in default_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_with_env(&path) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    return config;
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("FEDSEARCH_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("FEDSEARCH_API_PORT") {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid FEDSEARCH_API_PORT"),
            }
        }
        if let Some(home) = lookup("FEDSEARCH_API_HOME") {
            self.api.home = Some(PathBuf::from(home));
        }
        if let Some(name) = lookup("FEDSEARCH_BACKEND") {
            self.backend.name = name;
        }
        if let Some(level) = lookup("FEDSEARCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("FEDSEARCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("fedsearch").join("config.toml"));
    }
    paths.push(PathBuf::from("/etc/fedsearch/config.toml"));
    paths.push(PathBuf::from("./fedsearch.toml"));
    paths
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Fedsearch Configuration
#
# Environment variables override these settings:
# - FEDSEARCH_API_HOST
# - FEDSEARCH_API_PORT
# - FEDSEARCH_API_HOME
# - FEDSEARCH_BACKEND
# - FEDSEARCH_LOG_LEVEL
# - FEDSEARCH_LOG_FORMAT

[api]
# HTTP server host
host = "0.0.0.0"

# HTTP server port
port = 8765

# Allowed CORS origins (empty allows any origin)
cors_origins = []

# Reject searches whose files escape this directory
# home = "/data/home"

[backend]
# Backend serving the queries: fake, peer or mux
name = "fake"

[backend.options]
# Options passed to the backend, e.g. for "fake":
records = 100
errors = 0

# For "peer":
# server-url = "http://localhost:8765"
# auth-token = ""
# local-only = false
# skip-stat = false
# index-host = ""
# format = "msgpack"

# For "mux", one entry per child:
# index-host = "front"
# [[backend.options.backends]]
# name = "peer"
# options = { server-url = "http://node-1:8765", index-host = "node-1" }

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.port, 8765);
        assert_eq!(config.api.addr(), "0.0.0.0:8765");
        assert_eq!(config.backend.name, "fake");
        assert!(config.backend.options.is_empty());
        assert!(!config.logging.is_json());
        assert_eq!(config.logging.filter(), "fedsearch=info,tower_http=info");
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.api.port, 8765);
        assert_eq!(config.backend.name, "fake");
        assert_eq!(config.backend.options["records"], 100);

        let backend = crate::search::registry::create(&config.backend.name, &config.backend.options)
            .unwrap();
        assert_eq!(backend.to_string(), "fake{records:100, errors:0}");
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[api]
port = 9000

[backend]
name = "mux"
[backend.options]
index-host = "front"
backends = [{{ name = "fake", options = {{ records = 3 }} }}]

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.backend.name, "mux");
        assert_eq!(config.backend.options["backends"][0]["options"]["records"], 3);
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[api\nport = ").unwrap();
        let err = Config::load(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("Failed to parse config file"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("FEDSEARCH_API_HOST", "127.0.0.1"),
            ("FEDSEARCH_API_PORT", "9100"),
            ("FEDSEARCH_API_HOME", "/data/home"),
            ("FEDSEARCH_BACKEND", "peer"),
            ("FEDSEARCH_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api.addr(), "127.0.0.1:9100");
        assert_eq!(config.api.home, Some(PathBuf::from("/data/home")));
        assert_eq!(config.backend.name, "peer");
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.is_json());

        let mut config = Config::default();
        config.apply_overrides(|k| (k == "FEDSEARCH_API_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.api.port, 8765);
    }
}
