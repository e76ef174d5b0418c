use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config failed: {0}")]
    Read(String),
    #[error("parse config failed: {0}")]
    Parse(String),
    #[error("schema load failed: {0}")]
    SchemaLoad(String),
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),
    #[error("unsupported config: {0}")]
    UnsupportedConfig(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: Server,
    #[serde(default)]
    pub session: Session,
    pub knowledge: Knowledge,
    pub directory: Directory,
    pub geocoder: Geocoder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub listen_addr: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Knowledge {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryCache {
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directory {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    pub cache: DirectoryCache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geocoder {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_session_cookie() -> String {
    "postbot_session".to_string()
}

fn default_idle_timeout_ms() -> u64 {
    30 * 60 * 1000
}

fn default_cache_ttl_ms() -> u64 {
    60 * 60 * 1000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

pub fn load_and_validate(path: &str) -> Result<Config, ConfigError> {
    let config_text =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&config_text).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let instance = serde_json::to_value(value).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_against_schema(&instance)?;

    let cfg: Config =
        serde_json::from_value(instance).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_runtime_support(&cfg)?;
    Ok(cfg)
}

fn validate_against_schema(instance: &serde_json::Value) -> Result<(), ConfigError> {
    let schema_path = [
        std::path::PathBuf::from("config/config.schema.json"),
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .join("config/config.schema.json"),
    ]
    .into_iter()
    .find(|p| p.exists())
    .ok_or_else(|| {
        ConfigError::SchemaLoad(
            "config schema not found at config/config.schema.json or workspace config path"
                .to_string(),
        )
    })?;

    let schema_text =
        std::fs::read_to_string(schema_path).map_err(|e| ConfigError::SchemaLoad(e.to_string()))?;
    let schema: serde_json::Value =
        serde_json::from_str(&schema_text).map_err(|e| ConfigError::SchemaLoad(e.to_string()))?;

    let validator =
        jsonschema::validator_for(&schema).map_err(|e| ConfigError::SchemaLoad(e.to_string()))?;
    if let Err(first) = validator.validate(instance) {
        return Err(ConfigError::SchemaValidation(first.to_string()));
    }
    Ok(())
}

pub fn validate_runtime_support(cfg: &Config) -> Result<(), ConfigError> {
    let cookie = cfg.server.session_cookie.as_str();
    if cookie.is_empty()
        || cookie
            .chars()
            .any(|c| c == ';' || c == '=' || c == ',' || c.is_whitespace())
    {
        return Err(ConfigError::UnsupportedConfig(format!(
            "server.session_cookie={cookie:?} is not a valid cookie name"
        )));
    }
    if cfg.session.idle_timeout_ms == 0 {
        return Err(ConfigError::UnsupportedConfig(
            "session.idle_timeout_ms must be >= 1".to_string(),
        ));
    }
    if cfg.knowledge.path.trim().is_empty() {
        return Err(ConfigError::UnsupportedConfig(
            "knowledge.path is required".to_string(),
        ));
    }
    check_base_url("directory.base_url", &cfg.directory.base_url)?;
    check_base_url("geocoder.base_url", &cfg.geocoder.base_url)?;
    if cfg.directory.timeout_ms == 0 {
        return Err(ConfigError::UnsupportedConfig(
            "directory.timeout_ms must be >= 1".to_string(),
        ));
    }
    if cfg.geocoder.timeout_ms == 0 {
        return Err(ConfigError::UnsupportedConfig(
            "geocoder.timeout_ms must be >= 1".to_string(),
        ));
    }
    if cfg.directory.cache.enabled {
        if cfg.directory.cache.ttl_ms == 0 {
            return Err(ConfigError::UnsupportedConfig(
                "directory.cache.ttl_ms must be >= 1 when the cache is enabled".to_string(),
            ));
        }
        if cfg.directory.cache.max_entries == 0 {
            return Err(ConfigError::UnsupportedConfig(
                "directory.cache.max_entries must be >= 1 when the cache is enabled".to_string(),
            ));
        }
    }
    Ok(())
}

fn check_base_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedConfig(format!(
            "{field}={value} is not supported; expected an http(s) URL"
        )))
    }
}
