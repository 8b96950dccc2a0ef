use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ai::gemini::{DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_URL};
use crate::ai::langflow::{default_tweaks, DEFAULT_LANGFLOW_URL};
use crate::ai::proxy::DEFAULT_PROXY_URL;
use crate::ai::{GeminiClient, LangflowClient, ProxyClient};
use crate::provider::Provider;
use crate::transport::Transport;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub provider: Option<String>,
    pub langflow_url: Option<String>,
    pub flow_id: Option<String>,
    pub graph_id: Option<String>,
    pub astra_token: Option<String>,
    pub proxy_url: Option<String>,
    pub gemini_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub theme: Option<String>,
    pub tweaks: Option<Map<String, Value>>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::Langflow.as_str().to_string()),
            ..Self::default()
        }
    }

    /// Load the config file at `path`, with defaults when it is absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Update a single setting in the file at `path`, leaving env-derived values out of it.
    /// A file that fails to parse is left untouched and the error returned.
    pub fn update_file(path: &Path, update: impl FnOnce(&mut Config)) -> Result<()> {
        let mut config = Self::load_from(path)?;
        update(&mut config);
        config.save_to(path)
    }

    pub fn save_provider(path: &Path, provider: Provider) -> Result<()> {
        Self::update_file(path, |config| {
            config.provider = Some(provider.as_str().to_string())
        })
    }

    pub fn save_theme(path: &Path, theme: &str) -> Result<()> {
        Self::update_file(path, |config| config.theme = Some(theme.to_string()))
    }

    /// Non-empty environment values replace file values
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = env("LANGFLOW_URL") {
            self.langflow_url = Some(v);
        }
        if let Some(v) = env("FLOW_ID") {
            self.flow_id = Some(v);
        }
        if let Some(v) = env("GRAPH_ID") {
            self.graph_id = Some(v);
        }
        if let Some(v) = env("ASTRA_TOKEN") {
            self.astra_token = Some(v);
        }
        if let Some(v) = env("FLOWCHAT_PROXY_URL") {
            self.proxy_url = Some(v);
        }
        if let Some(v) = env("GEMINI_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = env("GEMINI_MODEL") {
            self.gemini_model = Some(v);
        }
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or(Provider::Langflow)
    }

    /// Returns the source of the credential for a provider: "env", "config", or None
    pub fn key_source(&self, provider: Provider) -> Option<&'static str> {
        let configured = match provider {
            Provider::Langflow | Provider::Proxy => self.astra_token.is_some(),
            Provider::Gemini => self.gemini_api_key.is_some(),
        };

        if std::env::var(provider.key_env()).is_ok_and(|v| !v.trim().is_empty()) {
            Some("env")
        } else if configured {
            Some("config")
        } else {
            None
        }
    }

    /// Build the transport for `provider`; missing settings surface through
    /// `Transport::check_config`
    pub fn transport(&self, provider: Provider) -> Arc<dyn Transport> {
        let token = self.astra_token.as_deref().unwrap_or_default();
        match provider {
            Provider::Langflow => Arc::new(
                LangflowClient::new(
                    self.langflow_url.as_deref().unwrap_or(DEFAULT_LANGFLOW_URL),
                    self.flow_id.as_deref().unwrap_or_default(),
                    self.graph_id.as_deref().unwrap_or_default(),
                    token,
                )
                .with_tweaks(self.tweaks.clone().unwrap_or_else(default_tweaks)),
            ),
            Provider::Proxy => Arc::new(ProxyClient::new(
                self.proxy_url.as_deref().unwrap_or(DEFAULT_PROXY_URL),
                token,
            )),
            Provider::Gemini => Arc::new(GeminiClient::new(
                self.gemini_url.as_deref().unwrap_or(DEFAULT_GEMINI_URL),
                self.gemini_model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL),
                self.gemini_api_key.as_deref().unwrap_or_default(),
            )),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("flowchat").join("config.json"))
    }
}
