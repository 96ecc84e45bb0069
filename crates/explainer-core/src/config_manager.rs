use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Environment variable holding the backend base address.
pub const ENV_BASE_URL: &str = "OLLAMA_BASE_URL";
/// Environment variable holding the model identifier.
pub const ENV_MODEL: &str = "CODELLAMA_MODEL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("{}", missing_settings_message(.missing))]
    MissingSettings { missing: Vec<&'static str> },
}

fn missing_settings_message(missing: &[&'static str]) -> String {
    format!(
        "Environment variables not set ({}). Please create a .env file with:\n\
         {}='http://localhost:11434'\n\
         {}='codellama:7b'",
        missing.join(", "),
        ENV_BASE_URL,
        ENV_MODEL
    )
}

/// Main configuration for the explainer service
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExplainerConfig {
    /// Generative backend connection and sampling settings
    #[serde(default)]
    pub llm: LLMConfig,

    /// Two-stage pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Generative backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Backend base address, without the `/v1` suffix (e.g. "http://localhost:11434")
    #[serde(default)]
    pub base_url: Option<String>,

    /// Model identifier (e.g. "codellama:7b")
    #[serde(default)]
    pub model: Option<String>,

    /// API key sent as a bearer token. Ollama ignores it but OpenAI-compatible
    /// clients expect one to be present.
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Sampling temperature; kept low for focused output
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Fixed seed so identical inputs reproduce identical completions
    #[serde(default = "default_cache_seed")]
    pub cache_seed: u64,

    /// Upper bound on a single backend round trip
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            api_key: default_api_key(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            cache_seed: default_cache_seed(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Chat exchange settings shared by both pipeline stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum request/response pairs per exchange
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Case-insensitive phrase that closes an exchange early
    #[serde(default = "default_termination_phrase")]
    pub termination_phrase: String,

    /// Message sent back to the role when it has not terminated
    #[serde(default = "default_auto_reply")]
    pub auto_reply: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            termination_phrase: default_termination_phrase(),
            auto_reply: default_auto_reply(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding `index.html` and other static assets
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
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

/// Presence of the two required settings, as reported by the health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigStatus {
    pub ollama_url: bool,
    pub model_name: bool,
}

impl ConfigStatus {
    pub fn is_complete(&self) -> bool {
        self.ollama_url && self.model_name
    }
}

/// Backend settings with both required values resolved
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub cache_seed: u64,
    pub timeout_secs: u64,
}

// Default value functions
fn default_api_key() -> String {
    "sk-xxx".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> usize {
    2048
}
fn default_cache_seed() -> u64 {
    42
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_turns() -> usize {
    2
}
fn default_termination_phrase() -> String {
    "thank you".to_string()
}
fn default_auto_reply() -> String {
    "Thank you for the explanation.".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Configuration manager
pub struct ConfigManager {
    config: ExplainerConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.code-explainer.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Same as [`ConfigManager::load`], reading an explicit config file when given
    pub fn load_from(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (config, config_path) = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                (Self::read_toml_file(path)?, Some(path.to_path_buf()))
            }
            None => Self::load_config_file()?,
        };

        let config = Self::apply_env_overrides(config);
        Self::from_parts(config, config_path)
    }

    /// Log where configuration came from and whether the backend settings
    /// are present. Missing settings are reported at `error`.
    pub fn log_status(&self) {
        if let Some(ref path) = self.config_path {
            info!(path = %path.display(), "Config file loaded");
        } else {
            info!("No config file, using defaults");
        }

        let status = self.status();
        if status.is_complete() {
            info!(
                base_url = ?self.config.llm.base_url,
                model = ?self.config.llm.model,
                "Backend settings present"
            );
        } else {
            error!("Required environment variables are not set!");
            error!(
                "{}: {}",
                ENV_BASE_URL,
                if status.ollama_url { "set" } else { "not set" }
            );
            error!(
                "{}: {}",
                ENV_MODEL,
                if status.model_name { "set" } else { "not set" }
            );
            error!("Please create a .env file in the project root with these variables.");
        }
    }

    /// Build a manager from an already assembled configuration
    pub fn from_config(config: ExplainerConfig) -> Result<Self, ConfigError> {
        Self::from_parts(config, None)
    }

    fn from_parts(
        config: ExplainerConfig,
        config_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            } else {
                info!("Loaded .env file from current directory");
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".code-explainer.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .code-explainer.env: {}", e);
                } else {
                    info!("Loaded .code-explainer.env from home directory");
                }
            }
        }
    }

    /// Find and load config file
    /// Search order:
    /// 1. ./.code-explainer.toml (current directory)
    /// 2. ~/.code-explainer/config.toml (user config)
    /// 3. Use defaults
    fn load_config_file() -> Result<(ExplainerConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".code-explainer.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".code-explainer").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((ExplainerConfig::default(), None))
    }

    /// Read TOML config file
    fn read_toml_file(path: &Path) -> Result<ExplainerConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(config: ExplainerConfig) -> ExplainerConfig {
        Self::apply_overrides_with(config, |key| std::env::var(key).ok())
    }

    fn apply_overrides_with<F>(mut config: ExplainerConfig, lookup: F) -> ExplainerConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            config.llm.base_url = Some(url);
        }
        if let Some(model) = lookup(ENV_MODEL) {
            config.llm.model = Some(model);
        }
        if let Some(timeout) = lookup("EXPLAINER_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.llm.timeout_secs = secs;
            }
        }
        if let Some(temp) = lookup("EXPLAINER_TEMPERATURE") {
            if let Ok(t) = temp.parse() {
                config.llm.temperature = t;
            }
        }
        if let Some(max_turns) = lookup("EXPLAINER_MAX_TURNS") {
            if let Ok(n) = max_turns.parse() {
                config.pipeline.max_turns = n;
            }
        }

        if let Some(host) = lookup("EXPLAINER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("EXPLAINER_PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }
        if let Some(dir) = lookup("EXPLAINER_STATIC_DIR") {
            config.server.static_dir = PathBuf::from(dir);
        }

        // Logging
        if let Some(level) = lookup("RUST_LOG") {
            config.logging.level = level;
        }
        if let Some(format) = lookup("EXPLAINER_LOG_FORMAT") {
            config.logging.format = format;
        }

        config
    }

    /// Validate configuration. The two required backend settings are not
    /// checked here; their absence is reported per request instead.
    fn validate_config(config: &ExplainerConfig) -> Result<(), ConfigError> {
        // RUST_LOG may carry a full filter directive; only a bare level is checked
        let level = config.logging.level.as_str();
        if !level.contains('=') && !level.contains(',') {
            match level {
                "trace" | "debug" | "info" | "warn" | "error" => {}
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        other
                    )))
                }
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        if !(0.0..=2.0).contains(&config.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid temperature: {}. Must be between 0.0 and 2.0",
                config.llm.temperature
            )));
        }

        if config.llm.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens must be greater than zero".to_string(),
            ));
        }

        if config.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        if config.pipeline.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "max_turns must be at least 1".to_string(),
            ));
        }

        // A blank phrase matches every reply and would end each exchange after one turn
        if config.pipeline.termination_phrase.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "termination_phrase must not be blank".to_string(),
            ));
        }

        if config.pipeline.auto_reply.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auto_reply must not be blank".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Report which of the required settings are present. Never touches the backend.
    pub fn status(&self) -> ConfigStatus {
        ConfigStatus {
            ollama_url: non_blank(self.config.llm.base_url.as_deref()).is_some(),
            model_name: non_blank(self.config.llm.model.as_deref()).is_some(),
        }
    }

    /// Resolve the backend settings, failing with the names of any missing variables
    pub fn backend_settings(&self) -> Result<BackendSettings, ConfigError> {
        let llm = &self.config.llm;
        let base_url = non_blank(llm.base_url.as_deref());
        let model = non_blank(llm.model.as_deref());

        match (base_url, model) {
            (Some(base_url), Some(model)) => Ok(BackendSettings {
                base_url: base_url.trim_end_matches('/').to_string(),
                model: model.to_string(),
                api_key: llm.api_key.clone(),
                temperature: llm.temperature,
                max_tokens: llm.max_tokens,
                cache_seed: llm.cache_seed,
                timeout_secs: llm.timeout_secs,
            }),
            (base_url, model) => {
                let mut missing = Vec::new();
                if base_url.is_none() {
                    missing.push(ENV_BASE_URL);
                }
                if model.is_none() {
                    missing.push(ENV_MODEL);
                }
                Err(ConfigError::MissingSettings { missing })
            }
        }
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = ExplainerConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn configured() -> ExplainerConfig {
        let mut config = ExplainerConfig::default();
        config.llm.base_url = Some("http://localhost:11434/".to_string());
        config.llm.model = Some("codellama:7b".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = ExplainerConfig::default();
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.llm.cache_seed, 42);
        assert_eq!(config.pipeline.max_turns, 2);
        assert_eq!(config.pipeline.termination_phrase, "thank you");
        assert!(config.llm.base_url.is_none());
    }

    #[test]
    fn test_config_validation() {
        let config = ExplainerConfig::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        let mut bad = config.clone();
        bad.logging.format = "xml".to_string();
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut bad = config.clone();
        bad.pipeline.max_turns = 0;
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut bad = config.clone();
        bad.llm.timeout_secs = 0;
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut bad = config;
        bad.llm.temperature = 3.5;
        assert!(ConfigManager::validate_config(&bad).is_err());
    }

    #[test]
    fn test_zero_timeout_from_env_is_rejected() {
        let config = ConfigManager::apply_overrides_with(configured(), |key| {
            (key == "EXPLAINER_REQUEST_TIMEOUT_SECS").then(|| "0".to_string())
        });
        assert_eq!(config.llm.timeout_secs, 0);
        assert!(matches!(
            ConfigManager::from_config(config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_blank_termination_phrase_is_rejected() {
        for phrase in ["", "   "] {
            let mut config = configured();
            config.pipeline.termination_phrase = phrase.to_string();
            let err = ConfigManager::validate_config(&config).unwrap_err();
            assert!(err.to_string().contains("termination_phrase"));
        }
    }

    #[test]
    fn test_blank_auto_reply_is_rejected() {
        let mut config = configured();
        config.pipeline.auto_reply = "\n".to_string();
        let err = ConfigManager::validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("auto_reply"));
    }

    #[test]
    fn test_filter_directive_passes_validation() {
        let mut config = ExplainerConfig::default();
        config.logging.level = "explainer_api=debug,tower_http=info".to_string();
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_status_reports_missing_settings() {
        let manager = ConfigManager::from_config(ExplainerConfig::default()).unwrap();
        let status = manager.status();
        assert!(!status.ollama_url);
        assert!(!status.model_name);
        assert!(!status.is_complete());

        let manager = ConfigManager::from_config(configured()).unwrap();
        assert!(manager.status().is_complete());
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let mut config = configured();
        config.llm.model = Some("   ".to_string());
        let manager = ConfigManager::from_config(config).unwrap();
        assert!(!manager.status().model_name);

        match manager.backend_settings() {
            Err(ConfigError::MissingSettings { missing }) => {
                assert_eq!(missing, vec![ENV_MODEL]);
            }
            other => panic!("expected missing settings, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_settings_message_names_variables() {
        let manager = ConfigManager::from_config(ExplainerConfig::default()).unwrap();
        let err = manager.backend_settings().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("OLLAMA_BASE_URL"));
        assert!(message.contains("CODELLAMA_MODEL"));
        assert!(message.contains(".env"));
    }

    #[test]
    fn test_backend_settings_trim_trailing_slash() {
        let manager = ConfigManager::from_config(configured()).unwrap();
        let settings = manager.backend_settings().unwrap();
        assert_eq!(settings.base_url, "http://localhost:11434");
        assert_eq!(settings.model, "codellama:7b");
        assert_eq!(settings.cache_seed, 42);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("OLLAMA_BASE_URL", "http://ollama:11434"),
            ("CODELLAMA_MODEL", "codellama:13b"),
            ("EXPLAINER_PORT", "9100"),
            ("EXPLAINER_REQUEST_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ConfigManager::apply_overrides_with(ExplainerConfig::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.llm.base_url.as_deref(), Some("http://ollama:11434"));
        assert_eq!(config.llm.model.as_deref(), Some("codellama:13b"));
        assert_eq!(config.server.port, 9100);
        // Unparseable numbers keep the previous value
        assert_eq!(config.llm.timeout_secs, 120);
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        ConfigManager::create_default_config(&path).unwrap();

        let loaded = ConfigManager::read_toml_file(&path).unwrap();
        assert_eq!(loaded.pipeline.auto_reply, "Thank you for the explanation.");
        assert_eq!(loaded.server.port, 8000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ExplainerConfig = toml::from_str(
            r#"
            [llm]
            base_url = "http://localhost:11434"
            model = "codellama:7b"

            [pipeline]
            max_turns = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.max_turns, 1);
        assert_eq!(config.pipeline.termination_phrase, "thank you");
        assert_eq!(config.llm.max_tokens, 2048);
    }

    #[test]
    fn test_explicit_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let result = ConfigManager::load_from(Some(&path));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
