use crate::error::{LlmError, Result};
use serde_json::Value;

const TOOL_NAME_KEYS: [&str; 5] = ["action", "tool_name", "tool", "name", "function"];
const TOOL_ARGUMENTS_KEYS: [&str; 5] = [
    "action_input",
    "tool_arguments",
    "tool_args",
    "parameters",
    "arguments",
];

/// Extracts the JSON object spanning the first `{` to the last `}` of `text`.
pub fn parse_json_blob(text: &str) -> Result<Value> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(LlmError::ToolCallParse(format!("no json object in: {text}")));
    };
    if end < start {
        return Err(LlmError::ToolCallParse(format!("no json object in: {text}")));
    }
    serde_json::from_str(&text[start..=end])
        .map_err(|e| LlmError::ToolCallParse(format!("invalid json ({e}) in: {text}")))
}

/// Reads a tool call a model wrote out as JSON text, fenced or not.
///
/// Returns the tool name and its arguments, if any argument key was present.
pub fn parse_json_tool_call(text: &str) -> Result<(String, Option<Value>)> {
    let text = text.replace("```json", "").replace("```", "");
    let blob = parse_json_blob(&text)?;
    let Some(obj) = blob.as_object() else {
        return Err(LlmError::ToolCallParse(format!("not a json object: {blob}")));
    };

    let name = TOOL_NAME_KEYS
        .iter()
        .rev()
        .find_map(|k| obj.get(*k))
        .ok_or_else(|| LlmError::ToolCallParse(format!("no tool name key found in: {blob}")))?;
    let name = match name {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let arguments = TOOL_ARGUMENTS_KEYS
        .iter()
        .rev()
        .find_map(|k| obj.get(*k))
        .cloned();
    Ok((name, arguments))
}
