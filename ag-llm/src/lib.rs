//! Uniform model adapters for agent frameworks.
//!
//! Normalizes conversations, builds tool schemas, trims stop sequences and
//! speaks each backend's completion and tool-calling protocol.

mod anthropic;
mod credentials;
mod error;
mod hf_api;
mod http;
mod local;
mod message;
mod model;
mod openai;
mod parsing;
mod portkey;
mod role;
mod router;
mod schema;
mod stop;
mod tool;
mod types;

#[cfg(test)]
mod test_support;

pub use error::{LlmError, Result};
pub use hf_api::{HF_DEFAULT_MODEL, HF_DEFAULT_TIMEOUT, HfApiConfig, HfApiModel};
pub use local::{Device, EngineLoader, LOCAL_DEFAULT_MODEL, LocalEngine, LocalModel};
pub use message::{MERGE_SEPARATOR, Message, clean_message_list, parse_messages};
pub use model::{DEFAULT_MAX_TOKENS, Model};
pub use parsing::{parse_json_blob, parse_json_tool_call};
pub use portkey::{PORTKEY_DEFAULT_MODEL, PortkeyConfig, PortkeyModel};
pub use role::{Role, RoleConversions, tool_role_conversions};
pub use router::{Provider, ROUTER_DEFAULT_MODEL, RouterConfig, RouterModel, detect_provider};
pub use schema::{FunctionDescriptor, ParametersSchema, ToolDescriptor, json_schema};
pub use stop::{StopOnStrings, remove_stop_sequences};
pub use tool::{Tool, ToolInput, ToolInputs, ToolSpec};
pub use types::{Grammar, TokenUsage, ToolCall, Usage};
