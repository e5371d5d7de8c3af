//! HTTP client for the classification/summary proxy.
//!
//! The proxy takes `{text, task}` with a shared secret in `x-proxy-secret`
//! and answers `{data}` where `data` is the raw model output.

use crate::config::ProxyConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Header carrying the shared proxy secret
pub const SECRET_HEADER: &str = "x-proxy-secret";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("proxy request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("proxy returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("proxy response missing data")]
    MissingData,
}

/// Which model the proxy should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyTask {
    Emotion,
    Summary,
}

#[derive(Debug, Serialize)]
struct ProxyRequest<'a> {
    text: &'a str,
    task: ProxyTask,
}

#[derive(Debug, Deserialize)]
struct ProxyReply {
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SummaryItem {
    summary_text: Option<String>,
}

pub struct ProxyClient {
    client: reqwest::Client,
    endpoint: String,
    secret: Option<String>,
}

impl ProxyClient {
    pub fn new(endpoint: &str, secret: Option<String>, timeout: Duration) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            secret,
        })
    }

    /// Client for the configured endpoint; `None` when no endpoint is set
    pub fn from_config(config: &ProxyConfig) -> Result<Option<Self>, ProxyError> {
        match config.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => Ok(Some(Self::new(
                endpoint,
                config.secret.clone(),
                Duration::from_secs(config.timeout_secs),
            )?)),
            _ => Ok(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a task and return the model output
    pub async fn call(&self, task: ProxyTask, text: &str) -> Result<serde_json::Value, ProxyError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&ProxyRequest { text, task });
        if let Some(secret) = &self.secret {
            request = request.header(SECRET_HEADER, secret);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ProxyReply = response.json().await?;
        debug!("Proxy {:?} call succeeded", task);
        reply.data.ok_or(ProxyError::MissingData)
    }

    /// Emotion model output, `[[{label, score}, ...]]`
    pub async fn emotion(&self, text: &str) -> Result<serde_json::Value, ProxyError> {
        self.call(ProxyTask::Emotion, text).await
    }

    /// Summary text, if the model produced any
    pub async fn summary(&self, text: &str) -> Result<Option<String>, ProxyError> {
        let data = self.call(ProxyTask::Summary, text).await?;
        Ok(parse_summary_output(&data))
    }
}

/// Pull `summary_text` out of `[{summary_text}]`
pub fn parse_summary_output(data: &serde_json::Value) -> Option<String> {
    let items: Vec<SummaryItem> = Vec::<SummaryItem>::deserialize(data).ok()?;
    items
        .into_iter()
        .next()
        .and_then(|item| item.summary_text)
        .filter(|s| !s.trim().is_empty())
}
