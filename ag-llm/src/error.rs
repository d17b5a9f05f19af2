use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("incorrect role {role:?}, only {allowed:?} are supported")]
    InvalidRole {
        role: String,
        allowed: Vec<&'static str>,
    },

    #[error("backend returned no tool call")]
    MissingToolCall,

    #[error("{backend} requires credentials: pass an api key or set {env_var}")]
    MissingCredentials {
        backend: &'static str,
        env_var: &'static str,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("{backend} status={status} body={body}")]
    Status {
        backend: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),

    #[error("tool call parse error: {0}")]
    ToolCallParse(String),

    #[error("local engine error: {0}")]
    Engine(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}
