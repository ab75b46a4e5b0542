//! TOML configuration for the gateway binary.
//!
//! Every field has a default, so an empty file (or no file) yields a gateway
//! on `127.0.0.1:10101` fronting Anthropic with the key in `ANTHROPIC_API_KEY`.
//!
//! ```rust
//! use sluice::config::{ApprovalMode, SluiceConfig};
//!
//! let config = SluiceConfig::from_toml_str(
//!     r#"
//!     max_tool_rounds = 4
//!
//!     [server]
//!     port = 9000
//!
//!     [tools]
//!     approval = "queue"
//!     "#,
//! )
//! .expect("config should parse");
//!
//! assert_eq!(config.server.port, 9000);
//! assert_eq!(config.server.host, "127.0.0.1");
//! assert_eq!(config.tools.approval, ApprovalMode::Queue);
//! assert_eq!(config.providers.len(), 1);
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sprovider::ProviderId;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 10101;
pub const DEFAULT_PORT_SEARCH_ATTEMPTS: u16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    Io,
    Parse,
    Invalid,
    MissingCredential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

impl ConfigError {
    pub fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Io, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Parse, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Invalid, message)
    }

    pub fn missing_credential(message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::MissingCredential, message)
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub port_search_attempts: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            port_search_attempts: DEFAULT_PORT_SEARCH_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Advertised by `GET /models` and routed to this provider.
    #[serde(default)]
    pub models: Vec<String>,
    /// Extra model-name prefixes routed to this provider.
    #[serde(default)]
    pub model_prefixes: Vec<String>,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub tool_call_deltas: bool,
    /// Anthropic only.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key_env: None,
            base_url: None,
            models: Vec::new(),
            model_prefixes: Vec::new(),
            default: false,
            tool_call_deltas: false,
            max_tokens: None,
        }
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.kind.default_api_key_env())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    #[serde(alias = "openai_compatible")]
    Openai,
    #[serde(alias = "google")]
    Gemini,
}

impl ProviderKind {
    pub fn provider_id(self) -> ProviderId {
        match self {
            Self::Anthropic => ProviderId::Anthropic,
            Self::Openai => ProviderId::OpenAi,
            Self::Gemini => ProviderId::Gemini,
        }
    }

    pub fn default_api_key_env(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Openai => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    fn default_prefix(self) -> &'static str {
        match self {
            Self::Anthropic => "claude",
            Self::Openai => "gpt",
            Self::Gemini => "gemini",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Every tool use runs without asking.
    #[default]
    Auto,
    /// Approval-requiring tool uses wait for `POST /approvals/{id}`.
    Queue,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub builtin: bool,
    /// Root the file tools are confined to; without it only the clock is registered.
    pub workspace_root: Option<PathBuf>,
    pub approval: ApprovalMode,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            workspace_root: None,
            approval: ApprovalMode::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SluiceConfig {
    pub server: ServerConfig,
    pub providers: Vec<ProviderConfig>,
    pub tools: ToolsConfig,
    /// One JSONL file per thread under this directory; in-memory when unset.
    pub history_dir: Option<PathBuf>,
    pub system_prompt: Option<String>,
    pub max_tool_rounds: usize,
    pub metrics: bool,
}

impl Default for SluiceConfig {
    fn default() -> Self {
        let mut anthropic = ProviderConfig::new(ProviderKind::Anthropic);
        anthropic.default = true;

        Self {
            server: ServerConfig::default(),
            providers: vec![anthropic],
            tools: ToolsConfig::default(),
            history_dir: None,
            system_prompt: None,
            max_tool_rounds: schat::DEFAULT_MAX_TOOL_ROUNDS,
            metrics: false,
        }
    }
}

impl SluiceConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|err| ConfigError::parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ConfigError::io(format!("failed to read '{}': {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::invalid("at least one provider must be configured"));
        }
        if self.max_tool_rounds == 0 {
            return Err(ConfigError::invalid("max_tool_rounds must be at least 1"));
        }

        for (position, provider) in self.providers.iter().enumerate() {
            let duplicate = self.providers[..position]
                .iter()
                .any(|earlier| earlier.kind == provider.kind);
            if duplicate {
                return Err(ConfigError::invalid(format!(
                    "provider '{}' is configured more than once",
                    provider.kind.provider_id()
                )));
            }
        }

        let defaults = self.providers.iter().filter(|p| p.default).count();
        if defaults > 1 {
            return Err(ConfigError::invalid("only one provider may be the default"));
        }
        Ok(())
    }

    /// The explicit default, else the first configured provider.
    pub fn default_provider(&self) -> Option<&ProviderConfig> {
        self.providers
            .iter()
            .find(|provider| provider.default)
            .or_else(|| self.providers.first())
    }

    /// Model-name prefixes routed to `provider`.
    pub fn routes_for(provider: &ProviderConfig) -> Vec<String> {
        let mut routes = vec![provider.kind.default_prefix().to_string()];
        routes.extend(provider.model_prefixes.iter().cloned());
        routes.extend(provider.models.iter().cloned());
        routes.dedup();
        routes
    }
}
