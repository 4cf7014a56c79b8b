use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::provider::ProviderError;

/// Shared HTTP plumbing: send one JSON POST, map failures onto [`ProviderError`].
#[derive(Clone)]
pub(crate) struct Transport {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl Transport {
    pub(crate) fn new(client: reqwest::Client, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout_secs,
        }
    }

    pub(crate) fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("content-type", "application/json")
    }

    /// Send a prepared request and decode a successful body as `T`.
    /// Non-2xx answers become [`ProviderError::Api`] carrying the raw body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        provider: &str,
        builder: reqwest::RequestBuilder,
        body: &serde_json::Value,
    ) -> Result<T, ProviderError> {
        debug!(provider, "sending completion request");
        let resp = builder
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(provider, status = status.as_u16(), body = %text, "provider API error");
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let text = resp.text().await.map_err(|e| self.classify(e))?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(provider, error = %e, "unexpected provider response shape");
            ProviderError::Parse(format!("{e}: {text}"))
        })
    }

    fn classify(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            ProviderError::Http(err)
        }
    }
}

/// Reject blank completions so the user never gets an empty reply.
pub(crate) fn non_empty(provider: &str, text: String) -> Result<String, ProviderError> {
    if text.trim().is_empty() {
        Err(ProviderError::Parse(format!("{provider} returned an empty completion")))
    } else {
        Ok(text)
    }
}
