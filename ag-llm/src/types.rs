use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token counts of the most recent call on an adapter.
///
/// Both fields stay `None` until the first call completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_token_count: Option<u32>,
    pub output_token_count: Option<u32>,
}

impl From<Usage> for TokenUsage {
    fn from(u: Usage) -> Self {
        Self {
            input_token_count: Some(u.prompt_tokens),
            output_token_count: Some(u.completion_tokens),
        }
    }
}

/// Usage as reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The single tool call extracted from a backend response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    /// Parsed arguments. A backend that returned a non-JSON string yields
    /// `Value::String` and leaves parsing to the caller.
    pub arguments: Value,
    pub id: String,
}

/// Constrained-decoding request, sent as the backend's `response_format`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}

impl Grammar {
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            kind: "regex".to_string(),
            value: Value::String(pattern.into()),
        }
    }

    pub fn json(schema: Value) -> Self {
        Self {
            kind: "json".to_string(),
            value: schema,
        }
    }

    /// Thought followed by a single JSON action block.
    pub fn json_agent() -> Self {
        Self::regex(
            r#"Thought: .+?\nAction:\n\{\n\s{4}"action":\s"[^"\n]+",\n\s{4}"action_input":\s"[^"\n]+"\n\}\n<end_action>"#,
        )
    }

    /// Thought followed by a single fenced Python code block.
    pub fn code_agent() -> Self {
        Self::regex(r"Thought: .+?\nCode:\n```(?:py|python)?\n(?:.|\s)+?\n```<end_action>")
    }
}

/// Backend-neutral result of one completion request.
#[derive(Debug, Clone, Default)]
pub(crate) struct Completion {
    pub content: String,
    pub tool_calls: Vec<RawToolCall>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
}
