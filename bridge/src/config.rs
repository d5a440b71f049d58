//! Configuration loading
//!
//! Two files, both discovered by walking up from the working directory:
//! - `.mcp.json`: the server table (`mcpServers`)
//! - `.atelier.toml`: provider and conversation settings

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::{BridgeError, BridgeResult};
use crate::llm::ProviderKind;
use crate::mcp::TransportSpec;

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/atelier/
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("atelier").join(filename);
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

// ============================================================================
// Server table (.mcp.json)
// ============================================================================

/// MCP server table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpConfig {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

/// One server entry as written in `.mcp.json`
#[derive(Debug, Clone, Deserialize)]
pub struct McpServerConfig {
    /// Transport kind: stdio, http, sse, streamable-http, websocket
    #[serde(rename = "type", alias = "transport", default = "default_transport")]
    pub transport: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_transport() -> String {
    "stdio".to_string()
}

fn default_enabled() -> bool {
    true
}

impl McpServerConfig {
    /// Stdio server entry
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            transport: default_transport(),
            command: command.into(),
            args,
            env: HashMap::new(),
            url: None,
            enabled: true,
        }
    }

    /// Network server entry (`http`, `sse`, `streamable-http`, `websocket`)
    pub fn network(transport: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            transport: transport.into(),
            command: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            url: Some(url.into()),
            enabled: true,
        }
    }

    /// Validate the entry and turn it into a transport spec
    ///
    /// Nothing is contacted here; an invalid entry is rejected before any
    /// connection attempt.
    pub fn resolve(&self) -> BridgeResult<TransportSpec> {
        match self.transport.to_ascii_lowercase().as_str() {
            "stdio" => {
                if self.command.trim().is_empty() {
                    return Err(BridgeError::configuration(
                        "stdio transport requires a non-empty command",
                    ));
                }
                let env = self
                    .env
                    .iter()
                    .map(|(key, value)| {
                        let expanded = shellexpand::env(value)
                            .map(|v| v.into_owned())
                            .unwrap_or_else(|_| value.clone());
                        (key.clone(), expanded)
                    })
                    .collect();
                Ok(TransportSpec::Stdio {
                    command: self.command.clone(),
                    args: self.args.clone(),
                    env,
                })
            }
            "http" | "sse" | "streamable-http" => Ok(TransportSpec::Http {
                url: self.require_url()?,
            }),
            "websocket" | "ws" => Ok(TransportSpec::WebSocket {
                url: self.require_url()?,
            }),
            other => Err(BridgeError::configuration(format!(
                "unsupported transport type '{}'",
                other
            ))),
        }
    }

    fn require_url(&self) -> BridgeResult<String> {
        let raw = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                BridgeError::configuration(format!("{} transport requires a url", self.transport))
            })?;
        url::Url::parse(raw)
            .map_err(|e| BridgeError::configuration(format!("invalid url '{}': {}", raw, e)))?;
        Ok(raw.to_string())
    }
}

impl McpConfig {
    /// Load the server table from `.mcp.json`, or `None` when absent
    pub fn load() -> Result<Option<Self>> {
        if let Some(config_path) = find_config_file(".mcp.json") {
            tracing::debug!("Loading MCP config from: {}", config_path.display());
            return Self::load_from_path(&config_path).map(Some);
        }

        tracing::debug!("No .mcp.json found");
        Ok(None)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: McpConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Enabled servers only
    pub fn enabled_servers(&self) -> BTreeMap<String, McpServerConfig> {
        self.mcp_servers
            .iter()
            .filter(|(_, cfg)| cfg.enabled)
            .map(|(name, cfg)| (name.clone(), cfg.clone()))
            .collect()
    }
}

// ============================================================================
// Settings (.atelier.toml)
// ============================================================================

/// Top-level settings file
#[derive(Debug, Default, Deserialize)]
pub struct AtelierConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentSectionConfig,
}

/// Provider section
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model id; provider default when absent
    pub model: Option<String>,
    /// API base URL; provider default when absent
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Conversation section
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSectionConfig {
    pub system_prompt: Option<String>,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_max_steps() -> usize {
    crate::agent::MAX_STEPS
}

fn default_tool_timeout_secs() -> u64 {
    crate::agent::DEFAULT_TOOL_TIMEOUT.as_secs()
}

fn default_startup_timeout_secs() -> u64 {
    crate::mcp::DEFAULT_STARTUP_TIMEOUT.as_secs()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            api_key_env: None,
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmConfig {
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }

    pub fn api_key_env(&self) -> String {
        self.api_key_env
            .clone()
            .unwrap_or_else(|| self.provider.default_api_key_env().to_string())
    }

    /// Read the API key from the environment
    ///
    /// Missing or blank keys are a configuration error, raised here rather
    /// than on the first request.
    pub fn api_key(&self) -> BridgeResult<String> {
        let var = self.api_key_env();
        match std::env::var(&var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(BridgeError::configuration(format!(
                "missing API key: set {} for the {} provider",
                var, self.provider
            ))),
        }
    }
}

impl Default for AgentSectionConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_steps: default_max_steps(),
            tool_timeout_secs: default_tool_timeout_secs(),
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}

impl AgentSectionConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

impl AtelierConfig {
    /// Load `.atelier.toml`, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(".atelier.toml") {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No .atelier.toml found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: AtelierConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }
}
