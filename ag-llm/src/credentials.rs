use crate::error::{LlmError, Result};
use std::path::{Path, PathBuf};

/// Explicit value first, then the environment variable. Blank values count as
/// absent.
pub(crate) fn resolve(explicit: Option<String>, env_var: &str) -> Option<String> {
    resolve_with(explicit, env_var, |k| std::env::var(k).ok())
}

pub(crate) fn resolve_with<F>(explicit: Option<String>, env_var: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    non_blank(explicit).or_else(|| non_blank(lookup(env_var)))
}

/// Fails when a backend that needs a key has none.
pub(crate) fn require<'a>(
    key: Option<&'a str>,
    backend: &'static str,
    env_var: &'static str,
) -> Result<&'a str> {
    key.ok_or(LlmError::MissingCredentials { backend, env_var })
}

/// Location of the token saved by `huggingface-cli login`.
pub(crate) fn hf_token_path<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(p) = non_blank(lookup("HF_TOKEN_PATH")) {
        return Some(PathBuf::from(p));
    }
    if let Some(home) = non_blank(lookup("HF_HOME")) {
        return Some(PathBuf::from(home).join("token"));
    }
    non_blank(lookup("HOME"))
        .map(|home| PathBuf::from(home).join(".cache").join("huggingface").join("token"))
}

pub(crate) fn read_token_file(path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    non_blank(Some(raw.trim().to_string()))
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}
