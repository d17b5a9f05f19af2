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
use crate::types::{Grammar, TokenUsage, ToolCall};
use async_trait::async_trait;
use std::time::Duration;

pub const HF_DEFAULT_MODEL: &str = "Qwen/Qwen2.5-Coder-32B-Instruct";
pub const HF_DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const HF_INFERENCE_BASE: &str = "https://api-inference.huggingface.co/models";
const HF_TOKEN_ENV: &str = "HF_TOKEN";

#[derive(Debug, Clone, Default)]
pub struct HfApiConfig {
    /// Hub model id, or the URL of a dedicated inference endpoint.
    pub model_id: Option<String>,
    pub token: Option<String>,
    /// Overrides the serverless inference base URL.
    pub api_base: Option<String>,
    /// `None` uses [`HF_DEFAULT_TIMEOUT`].
    pub timeout: Option<Duration>,
}

/// Hugging Face Inference API, serverless or dedicated endpoint.
///
/// The token comes from the config, then `HF_TOKEN`, then the file written by
/// `huggingface-cli login`. Without any token requests are sent anonymously.
pub struct HfApiModel {
    model_id: String,
    url: String,
    token: Option<String>,
    http: reqwest::Client,
    role_conversions: RoleConversions,
    usage: TokenUsage,
}

impl HfApiModel {
    pub fn new(config: HfApiConfig) -> Self {
        let token = credentials::resolve(config.token, HF_TOKEN_ENV).or_else(|| {
            credentials::hf_token_path(|k| std::env::var(k).ok())
                .and_then(|p| credentials::read_token_file(&p))
        });
        Self::with_token(config.model_id, token, config.api_base, config.timeout)
    }

    fn with_token(
        model_id: Option<String>,
        token: Option<String>,
        api_base: Option<String>,
        timeout: Option<Duration>,
    ) -> Self {
        let model_id = model_id.unwrap_or_else(|| HF_DEFAULT_MODEL.to_string());
        let url = chat_completions_url(&model_id, api_base.as_deref());
        Self {
            model_id,
            url,
            token,
            http: build_http_client(Some(timeout.unwrap_or(HF_DEFAULT_TIMEOUT))),
            role_conversions: tool_role_conversions(),
            usage: TokenUsage::default(),
        }
    }

    /// Replaces the table applied to message roles before every request.
    pub fn with_role_conversions(mut self, conversions: RoleConversions) -> Self {
        self.role_conversions = conversions;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn client(&self) -> OpenAiCompatClient {
        OpenAiCompatClient::new(self.http.clone(), &self.url, "hf_api").bearer(self.token.as_deref())
    }
}

fn chat_completions_url(model_id: &str, api_base: Option<&str>) -> String {
    if model_id.starts_with("http://") || model_id.starts_with("https://") {
        return format!("{}/v1/chat/completions", model_id.trim_end_matches('/'));
    }
    let base = api_base.unwrap_or(HF_INFERENCE_BASE).trim_end_matches('/');
    format!("{base}/{model_id}/v1/chat/completions")
}

#[async_trait]
impl Model for HfApiModel {
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

        let mut req = OpenAiChatRequest::new(&self.model_id, messages, stop_sequences);
        req.max_tokens = Some(max_tokens);
        req.response_format = grammar.cloned();

        let completion = self.client().complete(&req).await?;
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

        let completion = self.client().complete(&req).await?;
        self.usage = reported_usage(completion.usage)?;
        let call = first_tool_call(completion)?;
        Ok(ToolCall {
            name: call.name,
            arguments: structured_arguments(call.arguments),
            id: call.id.unwrap_or_else(random_call_id),
        })
    }
}
