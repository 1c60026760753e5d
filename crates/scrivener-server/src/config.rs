//! Configuration file parsing for the server.
//!
//! Loads the bind address, database location, collaborator endpoints and
//! pipeline settings from TOML, then applies environment overrides.

use scrivener_pipeline::PipelineConfig;
use scrivener_web::FetcherConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// Field present but out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// SQLite database holding sessions and artifacts
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Ollama endpoint used for reasoning
    #[serde(default = "default_ollama_endpoint")]
    pub ollama_endpoint: String,

    /// Model name passed to Ollama
    #[serde(default = "default_model")]
    pub model: String,

    /// Tavily API key; usually supplied through `TAVILY_API_KEY`
    #[serde(default)]
    pub tavily_api_key: Option<String>,

    /// Page fetcher settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Pipeline settings and research defaults
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    8080
}

fn default_database_path() -> PathBuf {
    PathBuf::from("scrivener.db")
}

fn default_ollama_endpoint() -> String {
    scrivener_llm::ollama::DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    "llama3.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            database_path: default_database_path(),
            ollama_endpoint: default_ollama_endpoint(),
            model: default_model(),
            tavily_api_key: None,
            fetcher: FetcherConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(contents)?;
        config.pipeline.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Apply `SCRIVENER_DB`, `OLLAMA_HOST`, `SCRIVENER_MODEL` and
    /// `TAVILY_API_KEY` when they are set
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        let set = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        if let Some(db) = set("SCRIVENER_DB") {
            self.database_path = PathBuf::from(db);
        }
        if let Some(host) = set("OLLAMA_HOST") {
            self.ollama_endpoint = host;
        }
        if let Some(model) = set("SCRIVENER_MODEL") {
            self.model = model;
        }
        if let Some(key) = set("TAVILY_API_KEY") {
            self.tavily_api_key = Some(key);
        }
        self
    }

    /// The Tavily key, which the server cannot run without
    pub fn require_tavily_key(&self) -> Result<&str, ConfigError> {
        self.tavily_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField("tavily_api_key (or TAVILY_API_KEY)".to_string()))
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.database_path, PathBuf::from("scrivener.db"));
        assert_eq!(config.pipeline.max_active_sessions, 4);
        assert!(config.require_tavily_key().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            bind_address = "0.0.0.0"
            bind_port = 9000
            database_path = "/var/lib/scrivener/sessions.db"
            model = "mistral"

            [pipeline]
            max_active_sessions = 2

            [pipeline.research]
            max_iterations = 2
            style = "academic"
        "#;

        let config = ServerConfig::from_toml(toml).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.model, "mistral");
        assert_eq!(config.ollama_endpoint, "http://localhost:11434");
        assert_eq!(config.pipeline.max_active_sessions, 2);
        assert_eq!(config.pipeline.research.max_iterations, 2);
        assert_eq!(config.fetcher.timeout_secs, 10);
    }

    #[test]
    fn test_invalid_pipeline_rejected() {
        let toml = r#"
            [pipeline.research]
            max_iterations = 9
        "#;
        assert!(matches!(
            ServerConfig::from_toml(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SCRIVENER_DB", "/tmp/other.db"),
            ("OLLAMA_HOST", "http://gpu-box:11434"),
            ("TAVILY_API_KEY", "tvly-test"),
            ("SCRIVENER_MODEL", "  "),
        ]);
        let config = ServerConfig::default()
            .with_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.ollama_endpoint, "http://gpu-box:11434");
        assert_eq!(config.model, "llama3.1");
        assert_eq!(config.require_tavily_key().unwrap(), "tvly-test");
    }
}
