use serde::Deserialize;
use std::{collections::HashMap, env};

use crate::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub search: SearchProviderConfig,
    pub completion: CompletionProviderConfig,
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            search: SearchProviderConfig::from_env()?,
            completion: CompletionProviderConfig::from_env()?,
        })
    }

    /// Both upstream credentials are required process-wide; a missing one is a
    /// startup failure rather than a per-request error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                name: "TAVILY_API_KEY".to_string(),
            });
        }
        if self.completion.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                name: "OPENROUTER_API_KEY".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("could not parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingCredential {
            name: name.to_string(),
        })
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl ServerConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| default_host()),
            port: parse_var("SERVER_PORT", default_port())?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging Configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl LoggingConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut modules = HashMap::new();

        // Load module-specific log levels
        if let Ok(level) = env::var("LOG_MODULE_API") {
            modules.insert("api".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_SERVICES") {
            modules.insert("services".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_INFERENCE_PROVIDERS") {
            modules.insert("inference_providers".to_string(), level);
        }

        Ok(Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| default_level()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| default_format()),
            modules,
        })
    }

    /// Filter directive string for `tracing_subscriber::EnvFilter`
    pub fn filter_directive(&self) -> String {
        let mut filter = self.level.clone();
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();
        for (module, level) in modules {
            filter.push_str(&format!(",{module}={level}"));
        }
        filter
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut modules = HashMap::new();
        modules.insert("api".to_string(), "debug".to_string());
        modules.insert("services".to_string(), "debug".to_string());

        Self {
            level: default_level(),
            format: default_format(),
            modules,
        }
    }
}

/// Web search provider (Tavily-compatible API)
#[derive(Debug, Clone, Deserialize)]
pub struct SearchProviderConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,
}

fn default_search_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_search_timeout() -> u64 {
    60
}

impl SearchProviderConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env::var("TAVILY_BASE_URL").unwrap_or_else(|_| default_search_base_url()),
            api_key: required_var("TAVILY_API_KEY")?,
            timeout_seconds: parse_var("TAVILY_TIMEOUT_SECONDS", default_search_timeout())?,
        })
    }
}

/// Chat completion provider (OpenAI-compatible API, OpenRouter by default)
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionProviderConfig {
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_completion_timeout")]
    pub timeout_seconds: u64,
}

fn default_completion_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "deepseek/deepseek-r1:free".to_string()
}

fn default_max_tokens() -> i64 {
    4000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_completion_timeout() -> u64 {
    300
}

impl CompletionProviderConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| default_completion_base_url()),
            api_key: required_var("OPENROUTER_API_KEY")?,
            model: env::var("COMPLETION_MODEL").unwrap_or_else(|_| default_model()),
            max_tokens: parse_var("COMPLETION_MAX_TOKENS", default_max_tokens())?,
            temperature: parse_var("COMPLETION_TEMPERATURE", default_temperature())?,
            timeout_seconds: parse_var("COMPLETION_TIMEOUT_SECONDS", default_completion_timeout())?,
        })
    }
}
