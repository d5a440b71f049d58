//! JSON POST shared by the provider adapters

use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::ProviderError;

/// POST `body` to `url` and decode the JSON reply
///
/// Non-2xx responses become [`ProviderError::Status`] carrying the body text.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    headers: HeaderMap,
    body: &Value,
) -> Result<Value, ProviderError> {
    tracing::debug!("POST {} ({} request)", url, provider);

    let response = client
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|e| ProviderError::Request {
            provider: provider.to_string(),
            message: e.to_string(),
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("{} API error {}: {}", provider, status, body);
        return Err(ProviderError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let raw_body = response.text().await.map_err(|e| ProviderError::Request {
        provider: provider.to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&raw_body).map_err(|e| ProviderError::Decode {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn decode_error(provider: &str, message: impl Into<String>) -> ProviderError {
    ProviderError::Decode {
        provider: provider.to_string(),
        message: message.into(),
    }
}
