use crate::anthropic::{ANTHROPIC_API_BASE, AnthropicClient, AnthropicRequest};
use crate::credentials;
use crate::error::Result;
use crate::http::build_http_client;
use crate::message::{Message, clean_message_list};
use crate::model::{
    DEFAULT_MAX_TOKENS, Model, first_tool_call, random_call_id, reported_usage, strict_arguments,
};
use crate::openai::{OpenAiChatRequest, OpenAiCompatClient};
use crate::role::{RoleConversions, tool_role_conversions};
use crate::schema::{ToolDescriptor, json_schema};
use crate::tool::Tool;
use crate::types::{Completion, Grammar, TokenUsage, ToolCall};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

pub const ROUTER_DEFAULT_MODEL: &str = "anthropic/claude-3-5-sonnet-20240620";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
    Groq,
    Mistral,
    TogetherAi,
    Ollama,
}

impl Provider {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "anthropic" => Some(Self::Anthropic),
            "openai" => Some(Self::OpenAI),
            "groq" => Some(Self::Groq),
            "mistral" => Some(Self::Mistral),
            "together_ai" => Some(Self::TogetherAi),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
            Self::Groq => "groq",
            Self::Mistral => "mistral",
            Self::TogetherAi => "together_ai",
            Self::Ollama => "ollama",
        }
    }

    pub fn default_api_base(self) -> &'static str {
        match self {
            Self::Anthropic => ANTHROPIC_API_BASE,
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Mistral => "https://api.mistral.ai/v1",
            Self::TogetherAi => "https://api.together.xyz/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }

    /// Variable holding the provider key; `None` for keyless providers.
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::Mistral => Some("MISTRAL_API_KEY"),
            Self::TogetherAi => Some("TOGETHERAI_API_KEY"),
            Self::Ollama => None,
        }
    }
}

/// Splits a `provider/model` id. Bare `claude-*` ids go to Anthropic and any
/// other unprefixed id to OpenAI, unchanged.
pub fn detect_provider(model_id: &str) -> (Provider, &str) {
    if let Some((prefix, rest)) = model_id.split_once('/') {
        if let Some(p) = Provider::from_prefix(prefix) {
            return (p, rest);
        }
    }
    if model_id.to_ascii_lowercase().starts_with("claude-") {
        return (Provider::Anthropic, model_id);
    }
    (Provider::OpenAI, model_id)
}

#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    pub model_id: Option<String>,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
    /// Merged into every request body (`temperature`, `top_p`, ...).
    pub extra: Map<String, Value>,
}

/// Multi-provider completion router keyed by `provider/model` ids.
pub struct RouterModel {
    model_id: String,
    provider: Provider,
    provider_model: String,
    api_base: String,
    api_key: Option<String>,
    extra: Map<String, Value>,
    http: reqwest::Client,
    role_conversions: RoleConversions,
    usage: TokenUsage,
}

impl RouterModel {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(config: RouterConfig) -> Self {
        let model_id = config
            .model_id
            .unwrap_or_else(|| ROUTER_DEFAULT_MODEL.to_string());
        let (provider, provider_model) = detect_provider(&model_id);
        let provider_model = provider_model.to_string();
        let api_key = match provider.api_key_env() {
            Some(env_var) => credentials::resolve(config.api_key, env_var),
            None => config.api_key,
        };
        let api_base = config
            .api_base
            .unwrap_or_else(|| provider.default_api_base().to_string());
        tracing::debug!(provider = provider.name(), model = %provider_model, "router model");

        Self {
            model_id,
            provider,
            provider_model,
            api_base,
            api_key,
            extra: config.extra,
            http: build_http_client(config.timeout),
            role_conversions: tool_role_conversions(),
            usage: TokenUsage::default(),
        }
    }

    pub fn with_role_conversions(mut self, conversions: RoleConversions) -> Self {
        self.role_conversions = conversions;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn provider_model(&self) -> &str {
        &self.provider_model
    }

    fn key(&self) -> Result<Option<&str>> {
        match self.provider.api_key_env() {
            Some(env_var) => {
                credentials::require(self.api_key.as_deref(), self.provider.name(), env_var)
                    .map(Some)
            }
            None => Ok(self.api_key.as_deref()),
        }
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        stop_sequences: &[String],
        grammar: Option<&Grammar>,
        max_tokens: u32,
        tools: Vec<ToolDescriptor>,
    ) -> Result<Completion> {
        let key = self.key()?;
        match self.provider {
            Provider::Anthropic => {
                if grammar.is_some() {
                    tracing::debug!("anthropic has no grammar support; ignoring grammar");
                }
                let mut req = AnthropicRequest::new(
                    &self.provider_model,
                    &messages,
                    stop_sequences,
                    max_tokens,
                );
                if !tools.is_empty() {
                    req = req.with_required_tool(&tools);
                }
                req.extra = self.extra.clone();
                AnthropicClient::new(self.http.clone(), &self.api_base, key.unwrap_or_default())
                    .complete(&req)
                    .await
            }
            _ => {
                let mut req = OpenAiChatRequest::new(&self.provider_model, messages, stop_sequences);
                req.max_tokens = Some(max_tokens);
                req.response_format = grammar.cloned();
                if !tools.is_empty() {
                    req = req.with_tools(tools, "required");
                }
                req.extra = self.extra.clone();
                let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
                OpenAiCompatClient::new(self.http.clone(), &url, self.provider.name())
                    .bearer(key)
                    .complete(&req)
                    .await
            }
        }
    }
}

#[async_trait]
impl Model for RouterModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn token_counts(&self) -> TokenUsage {
        self.usage
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %self.model_id))]
    async fn generate(
        &mut self,
        messages: &[Message],
        stop_sequences: &[String],
        grammar: Option<&Grammar>,
        max_tokens: u32,
    ) -> Result<String> {
        let messages = clean_message_list(messages, &self.role_conversions);
        tracing::debug!(messages = messages.len(), "normalized messages");
        let completion = self
            .complete(messages, stop_sequences, grammar, max_tokens, Vec::new())
            .await?;
        self.usage = reported_usage(completion.usage)?;
        Ok(completion.content)
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %self.model_id))]
    async fn get_tool_call(
        &mut self,
        messages: &[Message],
        tools: &[&dyn Tool],
        stop_sequences: &[String],
        max_tokens: Option<u32>,
    ) -> Result<ToolCall> {
        let messages = clean_message_list(messages, &self.role_conversions);
        let descriptors = tools.iter().map(|t| json_schema(*t)).collect();
        let completion = self
            .complete(
                messages,
                stop_sequences,
                None,
                max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                descriptors,
            )
            .await?;
        self.usage = reported_usage(completion.usage)?;
        let call = first_tool_call(completion)?;
        Ok(ToolCall {
            name: call.name,
            arguments: strict_arguments(call.arguments)?,
            id: call.id.unwrap_or_else(random_call_id),
        })
    }
}
