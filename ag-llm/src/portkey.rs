use crate::credentials;
use crate::error::Result;
use crate::http::build_http_client;
use crate::message::{Message, clean_message_list};
use crate::model::{
    Model, first_tool_call, random_call_id, reported_usage, structured_arguments,
};
use crate::openai::{OpenAiChatRequest, OpenAiCompatClient};
use crate::role::{RoleConversions, tool_role_conversions};
use crate::schema::json_schema;
use crate::tool::Tool;
use crate::types::{Completion, Grammar, TokenUsage, ToolCall};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

pub const PORTKEY_DEFAULT_MODEL: &str = "gpt-4o";
const PORTKEY_API_BASE: &str = "https://api.portkey.ai/v1";
const PORTKEY_API_KEY_ENV: &str = "PORTKEY_API_KEY";
const PORTKEY_VIRTUAL_KEY_ENV: &str = "PORTKEY_VIRTUAL_KEY";

#[derive(Debug, Clone, Default)]
pub struct PortkeyConfig {
    pub model_id: Option<String>,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    /// Provider credential stored in the gateway vault.
    pub virtual_key: Option<String>,
    /// Gateway routing config: a saved config id or an inline JSON object.
    pub config: Option<Value>,
    pub timeout: Option<Duration>,
    pub extra: Map<String, Value>,
}

/// Portkey AI gateway, which proxies OpenAI-style requests to the configured
/// provider.
pub struct PortkeyModel {
    model_id: String,
    url: String,
    api_key: Option<String>,
    virtual_key: Option<String>,
    config: Option<String>,
    extra: Map<String, Value>,
    http: reqwest::Client,
    role_conversions: RoleConversions,
    usage: TokenUsage,
}

impl PortkeyModel {
    pub fn new(config: PortkeyConfig) -> Self {
        let api_base = config
            .api_base
            .unwrap_or_else(|| PORTKEY_API_BASE.to_string());
        Self {
            model_id: config
                .model_id
                .unwrap_or_else(|| PORTKEY_DEFAULT_MODEL.to_string()),
            url: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key: credentials::resolve(config.api_key, PORTKEY_API_KEY_ENV),
            virtual_key: credentials::resolve(config.virtual_key, PORTKEY_VIRTUAL_KEY_ENV),
            config: config.config.map(|c| match c {
                Value::String(id) => id,
                other => other.to_string(),
            }),
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

    async fn complete(&self, mut req: OpenAiChatRequest) -> Result<Completion> {
        let api_key = credentials::require(self.api_key.as_deref(), "portkey", PORTKEY_API_KEY_ENV)?;
        req.extra = self.extra.clone();
        OpenAiCompatClient::new(self.http.clone(), &self.url, "portkey")
            .header("x-portkey-api-key", Some(api_key))
            .header("x-portkey-virtual-key", self.virtual_key.as_deref())
            .header("x-portkey-config", self.config.as_deref())
            .complete(&req)
            .await
    }
}

#[async_trait]
impl Model for PortkeyModel {
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
        let mut req = OpenAiChatRequest::new(&self.model_id, messages, stop_sequences);
        req.max_tokens = Some(max_tokens);
        req.response_format = grammar.cloned();

        let completion = self.complete(req).await?;
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
        let mut req = OpenAiChatRequest::new(&self.model_id, messages, stop_sequences)
            .with_tools(descriptors, "auto");
        req.max_tokens = max_tokens;

        let completion = self.complete(req).await?;
        self.usage = reported_usage(completion.usage)?;
        let call = first_tool_call(completion)?;
        Ok(ToolCall {
            name: call.name,
            arguments: structured_arguments(call.arguments),
            id: call.id.unwrap_or_else(random_call_id),
        })
    }
}
