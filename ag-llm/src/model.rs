use crate::error::{LlmError, Result};
use crate::message::Message;
use crate::stop::remove_stop_sequences;
use crate::tool::Tool;
use crate::types::{Completion, Grammar, RawToolCall, TokenUsage, ToolCall, Usage};
use async_trait::async_trait;
use serde_json::Value;

/// Default generation budget of [`Model::generate`] and [`Model::call`].
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

const CALL_ID_DIGITS: usize = 5;

/// Uniform interface over model backends.
///
/// Adapters normalize messages with their role conversion table before every
/// request and record the reported token usage, overwriting the previous call's.
#[async_trait]
pub trait Model: Send {
    fn model_id(&self) -> &str;

    fn token_counts(&self) -> TokenUsage;

    /// Raw completion; stop sequences the backend echoed are not removed.
    async fn generate(
        &mut self,
        messages: &[Message],
        stop_sequences: &[String],
        grammar: Option<&Grammar>,
        max_tokens: u32,
    ) -> Result<String>;

    /// Asks the backend for exactly one call to one of `tools`.
    async fn get_tool_call(
        &mut self,
        messages: &[Message],
        tools: &[&dyn Tool],
        stop_sequences: &[String],
        max_tokens: Option<u32>,
    ) -> Result<ToolCall>;

    /// [`Model::generate`] followed by one pass of stop-sequence trimming.
    async fn call(
        &mut self,
        messages: &[Message],
        stop_sequences: &[String],
        grammar: Option<&Grammar>,
        max_tokens: u32,
    ) -> Result<String> {
        let text = self
            .generate(messages, stop_sequences, grammar, max_tokens)
            .await?;
        Ok(remove_stop_sequences(&text, stop_sequences))
    }
}

/// Random fixed-width numeric id correlating a tool call with its response.
pub(crate) fn random_call_id() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 10u128.pow(CALL_ID_DIGITS as u32);
    format!("{n:0width$}", width = CALL_ID_DIGITS)
}

/// Parses string arguments when they hold JSON; anything else passes through.
pub(crate) fn structured_arguments(raw: Value) -> Value {
    match raw {
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(v) => v,
            Err(_) => Value::String(s),
        },
        other => other,
    }
}

/// Parses arguments that must be JSON.
pub(crate) fn strict_arguments(raw: Value) -> Result<Value> {
    match raw {
        Value::String(s) => serde_json::from_str(&s)
            .map_err(|e| LlmError::ToolCallParse(format!("arguments are not json ({e}): {s}"))),
        other => Ok(other),
    }
}

/// Counts of a completion. A backend response without usage is malformed.
pub(crate) fn reported_usage(usage: Option<Usage>) -> Result<TokenUsage> {
    usage
        .map(TokenUsage::from)
        .ok_or_else(|| LlmError::ResponseFormat("response missing usage".to_string()))
}

/// First tool call of a completion; backends may return several.
pub(crate) fn first_tool_call(completion: Completion) -> Result<RawToolCall> {
    completion
        .tool_calls
        .into_iter()
        .next()
        .ok_or(LlmError::MissingToolCall)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolSpec;
    use serde_json::json;

    struct EchoModel {
        reply: String,
        usage: TokenUsage,
    }

    #[async_trait]
    impl Model for EchoModel {
        fn model_id(&self) -> &str {
            "echo"
        }

        fn token_counts(&self) -> TokenUsage {
            self.usage
        }

        async fn generate(
            &mut self,
            messages: &[Message],
            _stop_sequences: &[String],
            _grammar: Option<&Grammar>,
            _max_tokens: u32,
        ) -> Result<String> {
            self.usage = TokenUsage {
                input_token_count: Some(messages.len() as u32),
                output_token_count: Some(1),
            };
            Ok(self.reply.clone())
        }

        async fn get_tool_call(
            &mut self,
            _messages: &[Message],
            tools: &[&dyn Tool],
            _stop_sequences: &[String],
            _max_tokens: Option<u32>,
        ) -> Result<ToolCall> {
            let tool = tools.first().ok_or(LlmError::MissingToolCall)?;
            Ok(ToolCall {
                name: tool.spec().name,
                arguments: json!({}),
                id: random_call_id(),
            })
        }
    }

    #[tokio::test]
    async fn call_trims_exactly_once() {
        let mut model = EchoModel {
            reply: "answer<end>STOP".to_string(),
            usage: TokenUsage::default(),
        };
        assert_eq!(model.token_counts(), TokenUsage::default());

        let stops = vec!["STOP".to_string(), "<end>".to_string()];
        let raw = model
            .generate(&[Message::user("q")], &stops, None, DEFAULT_MAX_TOKENS)
            .await
            .unwrap();
        assert_eq!(raw, "answer<end>STOP");

        let out = model
            .call(&[Message::user("q")], &stops, None, DEFAULT_MAX_TOKENS)
            .await
            .unwrap();
        assert_eq!(out, "answer");
        assert_eq!(model.token_counts().input_token_count, Some(1));
    }

    #[tokio::test]
    async fn trait_objects_dispatch_tool_calls() {
        let mut model: Box<dyn Model> = Box::new(EchoModel {
            reply: String::new(),
            usage: TokenUsage::default(),
        });
        let tool = ToolSpec {
            name: "final_answer".to_string(),
            description: "answer".to_string(),
            inputs: Default::default(),
        };
        let tools: Vec<&dyn Tool> = vec![&tool];
        let call = model
            .get_tool_call(&[Message::user("q")], &tools, &[], None)
            .await
            .unwrap();
        assert_eq!(call.name, "final_answer");
    }

    #[test]
    fn completion_without_usage_is_malformed() {
        let usage = reported_usage(Some(Usage {
            prompt_tokens: 7,
            completion_tokens: 2,
        }))
        .unwrap();
        assert_eq!(usage.input_token_count, Some(7));
        assert!(matches!(
            reported_usage(None),
            Err(LlmError::ResponseFormat(_))
        ));
    }

    #[test]
    fn call_ids_are_five_digits() {
        for _ in 0..50 {
            let id = random_call_id();
            assert_eq!(id.len(), 5);
            assert!(id.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn argument_parsing_modes() {
        assert_eq!(
            structured_arguments(json!("{\"a\": 1}")),
            json!({ "a": 1 })
        );
        assert_eq!(structured_arguments(json!("plain")), json!("plain"));
        assert_eq!(structured_arguments(json!({ "b": 2 })), json!({ "b": 2 }));

        assert_eq!(strict_arguments(json!("{\"a\": 1}")).unwrap(), json!({ "a": 1 }));
        assert!(matches!(
            strict_arguments(json!("not json")),
            Err(LlmError::ToolCallParse(_))
        ));
    }

    #[test]
    fn empty_tool_call_list_is_an_error() {
        let err = first_tool_call(Completion::default()).unwrap_err();
        assert!(matches!(err, LlmError::MissingToolCall));
    }
}
