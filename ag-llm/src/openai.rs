//! OpenAI-compatible chat-completions codec.
//!
//! Shared by the hosted inference API, the gateway and every router provider
//! that speaks this protocol.

use crate::error::{LlmError, Result};
use crate::http::post_json;
use crate::message::Message;
use crate::schema::ToolDescriptor;
use crate::types::{Completion, Grammar, RawToolCall, Usage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone)]
pub(crate) struct OpenAiCompatClient {
    http: reqwest::Client,
    url: String,
    backend: &'static str,
    bearer: Option<String>,
    headers: Vec<(&'static str, String)>,
}

impl OpenAiCompatClient {
    pub fn new(http: reqwest::Client, url: &str, backend: &'static str) -> Self {
        Self {
            http,
            url: url.to_string(),
            backend,
            bearer: None,
            headers: Vec::new(),
        }
    }

    pub fn bearer(mut self, token: Option<&str>) -> Self {
        self.bearer = token.map(str::to_string);
        self
    }

    pub fn header(mut self, name: &'static str, value: Option<&str>) -> Self {
        if let Some(v) = value {
            self.headers.push((name, v.to_string()));
        }
        self
    }

    #[tracing::instrument(level = "info", skip_all, fields(backend = self.backend, model = %req.model))]
    pub async fn complete(&self, req: &OpenAiChatRequest) -> Result<Completion> {
        let mut builder = self.http.post(&self.url);
        if let Some(token) = self.bearer.as_deref() {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }

        let parsed: OpenAiChatResponse = post_json(self.backend, builder, req).await?;
        parsed.try_into()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Grammar>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OpenAiChatRequest {
    pub fn new(model: &str, messages: Vec<Message>, stop_sequences: &[String]) -> Self {
        Self {
            model: model.to_string(),
            messages,
            stop: stop_sequences.to_vec(),
            max_tokens: None,
            response_format: None,
            tools: Vec::new(),
            tool_choice: None,
            extra: Map::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>, tool_choice: &str) -> Self {
        self.tools = tools;
        self.tool_choice = Some(tool_choice.to_string());
        self
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiChoiceToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceToolCall {
    #[serde(default)]
    id: Option<String>,
    function: OpenAiChoiceToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceToolCallFunction {
    name: String,
    /// A JSON string on OpenAI; some servers send an object.
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl TryFrom<OpenAiChatResponse> for Completion {
    type Error = LlmError;

    fn try_from(v: OpenAiChatResponse) -> Result<Self> {
        let choice = v
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseFormat("response missing choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| RawToolCall {
                id: tc.id.filter(|id| !id.is_empty()),
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: v.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
        })
    }
}
