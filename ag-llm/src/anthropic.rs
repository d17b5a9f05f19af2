use crate::error::Result;
use crate::http::post_json;
use crate::message::{MERGE_SEPARATOR, Message};
use crate::role::Role;
use crate::schema::ToolDescriptor;
use crate::types::{Completion, RawToolCall, Usage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub(crate) const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub(crate) struct AnthropicClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, api_base: &str, api_key: &str) -> Self {
        Self {
            http,
            url: format!("{}/messages", api_base.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %req.model))]
    pub async fn complete(&self, req: &AnthropicRequest) -> Result<Completion> {
        let builder = self
            .http
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);

        let parsed: AnthropicResponse = post_json("anthropic", builder, req).await?;
        Ok(parsed.into())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub system: String,
    pub messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AnthropicTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnthropicRequest {
    /// System messages move to the top-level `system` field; tool roles left
    /// by a custom conversion table are sent as assistant/user turns. Adjacent
    /// turns of one role are merged again afterwards.
    pub fn new(model: &str, messages: &[Message], stop_sequences: &[String], max_tokens: u32) -> Self {
        let mut system = String::new();
        let mut out_messages: Vec<AnthropicMessage> = Vec::new();

        for m in messages {
            let role = match m.role {
                Role::System => {
                    if !system.is_empty() {
                        system.push('\n');
                    }
                    system.push_str(m.content.trim());
                    continue;
                }
                Role::User | Role::ToolResponse => "user",
                Role::Assistant | Role::ToolCall => "assistant",
            };
            // Hoisting system messages or folding tool roles can leave two
            // same-role turns adjacent.
            if let Some(last) = out_messages.last_mut() {
                if last.role == role {
                    if let Some(AnthropicContentBlock::Text { text }) = last.content.last_mut() {
                        text.push_str(MERGE_SEPARATOR);
                        text.push_str(&m.content);
                        continue;
                    }
                }
            }
            out_messages.push(AnthropicMessage {
                role: role.to_string(),
                content: vec![AnthropicContentBlock::Text {
                    text: m.content.clone(),
                }],
            });
        }

        Self {
            model: model.to_string(),
            max_tokens,
            system,
            messages: out_messages,
            stop_sequences: stop_sequences.to_vec(),
            tools: Vec::new(),
            tool_choice: None,
            extra: Map::new(),
        }
    }

    /// Offers `tools` and forces the model to call one of them.
    pub fn with_required_tool(mut self, tools: &[ToolDescriptor]) -> Self {
        self.tools = tools.iter().map(to_anthropic_tool).collect();
        self.tool_choice = Some(serde_json::json!({ "type": "any" }));
        self
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

fn to_anthropic_tool(t: &ToolDescriptor) -> AnthropicTool {
    AnthropicTool {
        name: t.function.name.clone(),
        description: t.function.description.clone(),
        input_schema: t.function.parameters.to_value(),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl From<AnthropicResponse> for Completion {
    fn from(v: AnthropicResponse) -> Self {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in v.content {
            match block {
                AnthropicContentBlock::Text { text } => content.push_str(&text),
                AnthropicContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(RawToolCall {
                        id: Some(id),
                        name,
                        arguments: input,
                    });
                }
                AnthropicContentBlock::Other => {}
            }
        }

        Completion {
            content,
            tool_calls,
            usage: v.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
        }
    }
}
