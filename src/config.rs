//! Service configuration
//!
//! Loaded once at startup from a YAML file, then adjusted by a handful of
//! environment overrides.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_VAR: &str = "SWITCHBOARD_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tool_servers: Vec<ToolServerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    /// Operator-supplied base system prompt; the built-in default is used when absent
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub logs: LogConfig,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Replay stored session turns ahead of each new request
    #[serde(default)]
    pub replay_history: bool,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logs: LogConfig::default(),
            database_path: default_database_path(),
            replay_history: false,
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One configured tool server
#[derive(Debug, Clone, Deserialize)]
pub struct ToolServerConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: TransportConfig,
}

/// Transport selection, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Long-lived event stream plus a POST endpoint announced by the server
    Sse {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// Each message is an HTTP POST; replies come back as JSON or an event stream
    StreamableHttp {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// Child process speaking newline-delimited JSON on stdin/stdout
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
}

impl TransportConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::Sse { .. } => "sse",
            TransportConfig::StreamableHttp { .. } => "streamable_http",
            TransportConfig::Stdio { .. } => "stdio",
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_turns() -> usize {
    5
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_path() -> String {
    "history.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tool_timeout() -> u64 {
    60
}

impl Config {
    /// Load from the path in `SWITCHBOARD_CONFIG` (default `config.yaml`) and
    /// apply environment overrides.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file without applying overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("SWITCHBOARD_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = lookup("SWITCHBOARD_DB_PATH") {
            self.server.database_path = path;
        }
        let has_key = self.llm.api_key.as_deref().is_some_and(|k| !k.is_empty());
        if let Some(key) = lookup("SWITCHBOARD_API_KEY") {
            self.llm.api_key = Some(key);
        } else if !has_key {
            if let Some(key) = lookup("OPENAI_API_KEY") {
                self.llm.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must not be empty".to_string()));
        }
        if self.llm.max_turns == 0 {
            return Err(ConfigError::Invalid("llm.max_turns must be at least 1".to_string()));
        }
        for server in &self.tool_servers {
            if server.name.trim().is_empty() {
                return Err(ConfigError::Invalid("tool server name must not be empty".to_string()));
            }
            match &server.transport {
                TransportConfig::Stdio { command, .. } if command.trim().is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "tool server {} needs a command",
                        server.name
                    )));
                }
                TransportConfig::Sse { url, .. } | TransportConfig::StreamableHttp { url, .. }
                    if url.trim().is_empty() =>
                {
                    return Err(ConfigError::Invalid(format!(
                        "tool server {} needs a url",
                        server.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const FULL: &str = r#"
llm:
  base_url: http://localhost:11434/v1
  api_key: secret
  model: gpt-4o-mini
  system_prompt: You answer questions about the weather.
  max_turns: 3
server:
  port: 9000
  logs:
    level: debug
tool_servers:
  - name: files
    type: stdio
    command: file-server
    args: ["--root", "/tmp"]
    env:
      LOG: "1"
  - name: weather
    type: streamable_http
    url: http://localhost:8001/mcp
    headers:
      Authorization: Bearer abc
  - name: calendar
    type: sse
    url: http://localhost:8002/sse
"#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_yaml(FULL).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_turns, 3);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.logs.level, "debug");
        assert_eq!(config.tool_servers.len(), 3);

        match &config.tool_servers[0].transport {
            TransportConfig::Stdio { command, args, env } => {
                assert_eq!(command, "file-server");
                assert_eq!(args, &["--root", "/tmp"]);
                assert_eq!(env.get("LOG").map(String::as_str), Some("1"));
            }
            other => panic!("Expected stdio, got {other:?}"),
        }
        match &config.tool_servers[1].transport {
            TransportConfig::StreamableHttp { url, headers } => {
                assert_eq!(url, "http://localhost:8001/mcp");
                assert_eq!(headers.len(), 1);
            }
            other => panic!("Expected streamable_http, got {other:?}"),
        }
        assert_eq!(config.tool_servers[2].transport.kind(), "sse");
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml("llm:\n  model: m\n").unwrap();
        assert_eq!(config.llm.max_turns, 5);
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert!(config.llm.system_prompt.is_none());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.database_path, "history.db");
        assert!(!config.server.replay_history);
        assert!(config.tool_servers.is_empty());
    }

    #[test]
    fn test_unknown_transport_rejected() {
        let raw = "llm:\n  model: m\ntool_servers:\n  - name: x\n    type: carrier_pigeon\n";
        assert!(matches!(Config::from_yaml(raw), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_zero_turns_and_missing_command() {
        let mut config = Config::from_yaml("llm:\n  model: m\n  max_turns: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.llm.max_turns = 2;
        config.tool_servers.push(ToolServerConfig {
            name: "broken".to_string(),
            transport: TransportConfig::Stdio {
                command: "  ".to_string(),
                args: vec![],
                env: HashMap::new(),
            },
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::from_yaml("llm:\n  model: m\n").unwrap();
        config.apply_overrides(|key| match key {
            "SWITCHBOARD_PORT" => Some("7000".to_string()),
            "SWITCHBOARD_DB_PATH" => Some(":memory:".to_string()),
            "OPENAI_API_KEY" => Some("from-openai".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.database_path, ":memory:");
        assert_eq!(config.llm.api_key.as_deref(), Some("from-openai"));
    }

    #[test]
    fn test_configured_key_wins_over_openai_env() {
        let mut config = Config::from_yaml("llm:\n  model: m\n  api_key: file-key\n").unwrap();
        config.apply_overrides(|key| (key == "OPENAI_API_KEY").then(|| "env-key".to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = Config::load(temp.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, FULL).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.tool_servers[0].name, "files");
    }
}
