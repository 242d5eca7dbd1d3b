//! Request helpers shared by the host adapters.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shipwright_plugin::{PluginError, PluginResult, RemoteError};

/// Builds the HTTP client used by every adapter. `timeout` bounds both the
/// connection and each whole request.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub(crate) fn client(timeout: Duration) -> PluginResult<Client> {
    Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(|e| PluginError::Config(format!("failed to build HTTP client: {e}")))
}

/// Sends `request`, turning transport failures and non-2xx statuses into
/// [`RemoteError`].
pub(crate) async fn send(request: RequestBuilder) -> Result<Response, RemoteError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            RemoteError::transport(format!("request timed out: {e}"))
        } else {
            RemoteError::transport(e.to_string())
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::http(
        status.as_u16(),
        error_message(&body, status.canonical_reason().unwrap_or("request failed")),
    ))
}

/// Sends `request` and decodes a JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RemoteError> {
    send(request)
        .await?
        .json()
        .await
        .map_err(|e| RemoteError::transport(format!("invalid response body: {e}")))
}

/// Extracts the error message from a GitHub or GitLab error body.
fn error_message(body: &str, fallback: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback.to_string();
    };
    ["message", "error"]
        .iter()
        .find_map(|key| match value.get(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Appends `segments` to the path of `base`, percent-encoding each one
/// (`acme/rocket` becomes `acme%2Frocket`).
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = Url::parse(base)
        .map_err(|e| RemoteError::transport(format!("invalid API URL `{base}`: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| RemoteError::transport(format!("API URL `{base}` cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
