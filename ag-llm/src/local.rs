//! Locally loaded model behind a tokenizer/generation engine seam.
//!
//! Weights, tokenizer and sampling belong to the engine; this adapter only
//! prepares prompts, counts tokens and interprets the output.

use crate::error::Result;
use crate::message::{Message, clean_message_list};
use crate::model::{Model, random_call_id};
use crate::parsing::parse_json_tool_call;
use crate::role::{RoleConversions, tool_role_conversions};
use crate::schema::{ToolDescriptor, json_schema};
use crate::stop::{StopOnStrings, remove_stop_sequences};
use crate::tool::Tool;
use crate::types::{Grammar, TokenUsage, ToolCall};
use async_trait::async_trait;
use serde_json::Value;

pub const LOCAL_DEFAULT_MODEL: &str = "HuggingFaceTB/SmolLM2-1.7B-Instruct";
const LOCAL_TOOL_CALL_MAX_TOKENS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(usize),
}

pub trait LocalEngine: Send {
    /// Renders and tokenizes the conversation with the model's chat template.
    fn apply_chat_template(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDescriptor]>,
        add_generation_prompt: bool,
    ) -> Result<Vec<u32>>;

    /// Returns only the newly generated tokens. When `stopping` is given the
    /// engine feeds it each decoded token and stops once it fires.
    fn generate(
        &mut self,
        prompt: &[u32],
        max_new_tokens: u32,
        stopping: Option<&mut StopOnStrings>,
    ) -> Result<Vec<u32>>;

    fn decode(&self, tokens: &[u32]) -> Result<String>;
}

pub trait EngineLoader {
    type Engine: LocalEngine;

    fn default_device(&self) -> Device {
        Device::Cpu
    }

    fn load(&self, model_id: &str, device: Device) -> Result<Self::Engine>;
}

pub struct LocalModel<E> {
    model_id: String,
    device: Device,
    engine: E,
    role_conversions: RoleConversions,
    usage: TokenUsage,
}

impl<E: LocalEngine> LocalModel<E> {
    /// Loads `model_id`, falling back to [`LOCAL_DEFAULT_MODEL`] when it fails.
    pub fn load<L>(loader: &L, model_id: Option<&str>, device: Option<Device>) -> Result<Self>
    where
        L: EngineLoader<Engine = E>,
    {
        let model_id = match model_id {
            Some(id) => id,
            None => {
                tracing::warn!(
                    model = LOCAL_DEFAULT_MODEL,
                    "model_id not provided, using the default model"
                );
                LOCAL_DEFAULT_MODEL
            }
        };
        let device = device.unwrap_or_else(|| loader.default_device());
        tracing::info!(?device, "using device");

        match loader.load(model_id, device) {
            Ok(engine) => Ok(Self::from_engine(model_id, device, engine)),
            Err(e) if model_id != LOCAL_DEFAULT_MODEL => {
                tracing::warn!(
                    model = model_id,
                    error = %e,
                    fallback = LOCAL_DEFAULT_MODEL,
                    "failed to load model; loading the default model instead"
                );
                let engine = loader.load(LOCAL_DEFAULT_MODEL, device)?;
                Ok(Self::from_engine(LOCAL_DEFAULT_MODEL, device, engine))
            }
            Err(e) => Err(e),
        }
    }

    pub fn from_engine(model_id: &str, device: Device, engine: E) -> Self {
        Self {
            model_id: model_id.to_string(),
            device,
            engine,
            role_conversions: tool_role_conversions(),
            usage: TokenUsage::default(),
        }
    }

    /// An empty table sends tool roles to the chat template unchanged.
    pub fn with_role_conversions(mut self, conversions: RoleConversions) -> Self {
        self.role_conversions = conversions;
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    fn run(
        &mut self,
        messages: &[Message],
        tools: Option<&[ToolDescriptor]>,
        stop_sequences: &[String],
        max_tokens: u32,
    ) -> Result<String> {
        let messages = clean_message_list(messages, &self.role_conversions);
        let prompt = self.engine.apply_chat_template(&messages, tools, true)?;

        let mut stopping = (!stop_sequences.is_empty()).then(|| StopOnStrings::new(stop_sequences));
        let generated = self
            .engine
            .generate(&prompt, max_tokens, stopping.as_mut())?;
        let text = self.engine.decode(&generated)?;

        self.usage = TokenUsage {
            input_token_count: Some(token_count(prompt.len())),
            output_token_count: Some(token_count(generated.len())),
        };
        Ok(text)
    }
}

/// Saturates instead of wrapping on absurdly long sequences.
fn token_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

#[async_trait]
impl<E: LocalEngine> Model for LocalModel<E> {
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
        if grammar.is_some() {
            tracing::debug!("local engine has no grammar support; ignoring grammar");
        }
        self.run(messages, None, stop_sequences, max_tokens)
    }

    #[tracing::instrument(level = "info", skip_all, fields(model = %self.model_id))]
    async fn get_tool_call(
        &mut self,
        messages: &[Message],
        tools: &[&dyn Tool],
        stop_sequences: &[String],
        max_tokens: Option<u32>,
    ) -> Result<ToolCall> {
        let descriptors: Vec<ToolDescriptor> = tools.iter().map(|t| json_schema(*t)).collect();
        let text = self.run(
            messages,
            Some(descriptors.as_slice()),
            stop_sequences,
            max_tokens.unwrap_or(LOCAL_TOOL_CALL_MAX_TOKENS),
        )?;
        let text = remove_stop_sequences(&text, stop_sequences);

        let (name, arguments) = parse_json_tool_call(&text)?;
        Ok(ToolCall {
            name,
            arguments: arguments.unwrap_or(Value::Null),
            id: random_call_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::role::Role;
    use crate::tool::{ToolInput, ToolInputs, ToolSpec};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// One token per character; the "model" replays a scripted reply.
    struct CharEngine {
        reply: String,
        last_prompt: String,
        saw_tools: usize,
    }

    impl CharEngine {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                last_prompt: String::new(),
                saw_tools: 0,
            }
        }
    }

    impl LocalEngine for CharEngine {
        fn apply_chat_template(
            &self,
            messages: &[Message],
            tools: Option<&[ToolDescriptor]>,
            add_generation_prompt: bool,
        ) -> Result<Vec<u32>> {
            let mut prompt: String = messages
                .iter()
                .map(|m| format!("<{}>{}", m.role, m.content))
                .collect();
            if let Some(tools) = tools {
                prompt.push_str(&format!("<tools:{}>", tools.len()));
            }
            if add_generation_prompt {
                prompt.push_str("<assistant>");
            }
            Ok(prompt.chars().map(|c| c as u32).collect())
        }

        fn generate(
            &mut self,
            prompt: &[u32],
            max_new_tokens: u32,
            mut stopping: Option<&mut StopOnStrings>,
        ) -> Result<Vec<u32>> {
            self.last_prompt = self.decode(prompt)?;
            self.saw_tools = self.last_prompt.matches("<tools:").count();
            let mut out = Vec::new();
            for c in self.reply.chars().take(max_new_tokens as usize) {
                out.push(c as u32);
                if let Some(s) = stopping.as_deref_mut() {
                    if s.push(&c.to_string()) {
                        break;
                    }
                }
            }
            Ok(out)
        }

        fn decode(&self, tokens: &[u32]) -> Result<String> {
            tokens
                .iter()
                .map(|t| char::from_u32(*t).ok_or_else(|| LlmError::Engine(format!("bad token {t}"))))
                .collect()
        }
    }

    struct Loader {
        available: HashSet<&'static str>,
        attempts: RefCell<Vec<String>>,
    }

    impl EngineLoader for Loader {
        type Engine = CharEngine;

        fn load(&self, model_id: &str, _device: Device) -> Result<CharEngine> {
            self.attempts.borrow_mut().push(model_id.to_string());
            if self.available.contains(model_id) {
                Ok(CharEngine::new("ok"))
            } else {
                Err(LlmError::Engine(format!("{model_id} not found")))
            }
        }
    }

    #[tokio::test]
    async fn generate_counts_tokens_and_stops_early() {
        let mut model =
            LocalModel::from_engine("tiny", Device::Cpu, CharEngine::new("Answer: 4<end>ignored"));
        let messages = vec![
            Message::user("2+2?"),
            Message::new(Role::ToolResponse, "calc says 4"),
        ];
        let stops = vec!["<end>".to_string()];

        let raw = model.generate(&messages, &stops, None, 100).await.unwrap();
        assert_eq!(raw, "Answer: 4<end>");
        assert_eq!(
            model.engine.last_prompt,
            "<user>2+2?\n=======\ncalc says 4<assistant>"
        );
        let usage = model.token_counts();
        assert_eq!(usage.input_token_count, Some(model.engine.last_prompt.chars().count() as u32));
        assert_eq!(usage.output_token_count, Some(14));

        let trimmed = model.call(&messages, &stops, None, 100).await.unwrap();
        assert_eq!(trimmed, "Answer: 4");
    }

    #[tokio::test]
    async fn empty_role_table_reaches_the_chat_template() {
        let mut model = LocalModel::from_engine("tiny", Device::Cpu, CharEngine::new("x"))
            .with_role_conversions(RoleConversions::new());
        model
            .generate(
                &[Message::user("q"), Message::new(Role::ToolCall, "c")],
                &[],
                None,
                5,
            )
            .await
            .unwrap();
        assert_eq!(model.engine.last_prompt, "<user>q<tool-call>c<assistant>");
    }

    #[tokio::test]
    async fn max_tokens_bounds_generation() {
        let mut model = LocalModel::from_engine("tiny", Device::Cpu, CharEngine::new("abcdef"));
        let out = model
            .generate(&[Message::user("go")], &[], None, 3)
            .await
            .unwrap();
        assert_eq!(out, "abc");
        assert_eq!(model.token_counts().output_token_count, Some(3));
    }

    #[tokio::test]
    async fn tool_call_is_parsed_from_text() {
        let reply = "{\"name\": \"get_weather\", \"arguments\": {\"city\": \"Lima\"}}<end>";
        let mut model = LocalModel::from_engine("tiny", Device::Cpu, CharEngine::new(reply));
        let tool = ToolSpec {
            name: "get_weather".to_string(),
            description: "weather".to_string(),
            inputs: ToolInputs::new().with("city", ToolInput::new("string", "city")),
        };
        let tools: Vec<&dyn Tool> = vec![&tool];
        let call = model
            .get_tool_call(&[Message::user("weather in Lima")], &tools, &["<end>".to_string()], None)
            .await
            .unwrap();
        assert_eq!(call.name, "get_weather");
        assert_eq!(call.arguments, json!({ "city": "Lima" }));
        assert_eq!(call.id.len(), 5);
        assert_eq!(model.engine.saw_tools, 1);
    }

    #[tokio::test]
    async fn unparseable_tool_call_is_an_error() {
        let mut model =
            LocalModel::from_engine("tiny", Device::Cpu, CharEngine::new("I cannot call tools"));
        let err = model
            .get_tool_call(&[Message::user("q")], &[], &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ToolCallParse(_)));
    }

    #[test]
    fn token_counts_saturate() {
        assert_eq!(token_count(14), 14);
        assert_eq!(token_count(usize::MAX), u32::MAX);
    }

    #[test]
    fn load_falls_back_to_default_model() {
        let loader = Loader {
            available: HashSet::from([LOCAL_DEFAULT_MODEL]),
            attempts: RefCell::new(Vec::new()),
        };
        let model = LocalModel::load(&loader, Some("missing/model"), None).unwrap();
        assert_eq!(model.model_id(), LOCAL_DEFAULT_MODEL);
        assert_eq!(model.device(), Device::Cpu);
        assert_eq!(
            *loader.attempts.borrow(),
            vec!["missing/model".to_string(), LOCAL_DEFAULT_MODEL.to_string()]
        );
    }

    #[test]
    fn load_reports_default_model_failure() {
        let loader = Loader {
            available: HashSet::new(),
            attempts: RefCell::new(Vec::new()),
        };
        let err = LocalModel::load(&loader, None, Some(Device::Cuda(0))).err().unwrap();
        assert!(matches!(err, LlmError::Engine(_)));
        assert_eq!(loader.attempts.borrow().len(), 1);
    }
}
