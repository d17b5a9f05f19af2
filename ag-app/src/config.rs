//! `ag` configuration loader.

use ag_llm::{
    DEFAULT_MAX_TOKENS, HfApiConfig, HfApiModel, Model, PortkeyConfig, PortkeyModel, RouterConfig,
    RouterModel,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub keys: KeysConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    HfApi,
    #[default]
    Router,
    Portkey,
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "hf_api" => Ok(Self::HfApi),
            "router" => Ok(Self::Router),
            "portkey" => Ok(Self::Portkey),
            other => Err(anyhow::anyhow!(
                "unknown backend {other:?}; expected one of: hf_api, router, portkey"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub backend: Backend,
    /// Backend default when unset.
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Applies to completions and tool calls alike. Unset, completions use
    /// [`DEFAULT_MAX_TOKENS`] and tool calls the adapter's own default.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Extra request body fields, e.g. `temperature`.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysConfig {
    pub hf_token: Option<String>,
    pub api_key: Option<String>,
    pub portkey_virtual_key: Option<String>,
    /// Portkey routing config id or inline object.
    pub portkey_config: Option<Value>,
}

impl AgConfig {
    /// Reads `path`, or the default location when `None`. Only an explicitly
    /// requested file has to exist.
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(default_config_path);

        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::parse(&contents, &path)?,
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        cfg.apply_env_overrides(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn parse(contents: &str, path: &Path) -> anyhow::Result<Self> {
        toml::from_str(contents).map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))
    }

    fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AG_MODEL") {
            if !v.trim().is_empty() {
                self.model.model_id = Some(v);
            }
        }
        if let Some(v) = lookup("AG_BACKEND") {
            if !v.trim().is_empty() {
                self.model.backend = v.parse()?;
            }
        }
        if let Some(v) = lookup("AG_API_KEY") {
            if !v.trim().is_empty() {
                self.keys.api_key = Some(v);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.model.max_tokens == Some(0) {
            return Err(anyhow::anyhow!("model.max_tokens must be > 0"));
        }
        if self.model.timeout_secs == Some(0) {
            return Err(anyhow::anyhow!("model.timeout_secs must be > 0"));
        }
        if let Some(id) = &self.model.model_id {
            if id.trim().is_empty() {
                return Err(anyhow::anyhow!("model.model_id must not be blank"));
            }
        }
        Ok(())
    }

    pub fn completion_max_tokens(&self) -> u32 {
        self.model.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn build_model(&self) -> Box<dyn Model> {
        let m = &self.model;
        let timeout = m.timeout_secs.map(Duration::from_secs);
        match m.backend {
            Backend::HfApi => Box::new(HfApiModel::new(HfApiConfig {
                model_id: m.model_id.clone(),
                token: self.keys.hf_token.clone().or_else(|| self.keys.api_key.clone()),
                api_base: m.api_base.clone(),
                timeout,
            })),
            Backend::Router => Box::new(RouterModel::new(RouterConfig {
                model_id: m.model_id.clone(),
                api_base: m.api_base.clone(),
                api_key: self.keys.api_key.clone(),
                timeout,
                extra: m.extra.clone(),
            })),
            Backend::Portkey => Box::new(PortkeyModel::new(PortkeyConfig {
                model_id: m.model_id.clone(),
                api_base: m.api_base.clone(),
                api_key: self.keys.api_key.clone(),
                virtual_key: self.keys.portkey_virtual_key.clone(),
                config: self.keys.portkey_config.clone(),
                timeout,
                extra: m.extra.clone(),
            })),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".ag").join("config.toml")
}
