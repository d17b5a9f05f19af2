use crate::error::{LlmError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub(crate) fn build_http_client(timeout: Option<Duration>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(%e, "reqwest client build failed; falling back to default client");
        reqwest::Client::new()
    })
}

/// Sends `body` and decodes a successful JSON response.
pub(crate) async fn post_json<B, R>(
    backend: &'static str,
    request: reqwest::RequestBuilder,
    body: &B,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request.json(body).send().await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(LlmError::Status {
            backend,
            status: status.as_u16(),
            body: text,
        });
    }

    serde_json::from_str(&text).map_err(|e| {
        LlmError::ResponseFormat(format!("{backend} response json error={e} body={text}"))
    })
}
