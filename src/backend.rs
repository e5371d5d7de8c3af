//! The classification/summary collaborator behind the message channel.

use crate::classifier::{classify_rules, parse_model_output};
use crate::config::ClassifierConfig;
use crate::proxy::ProxyClient;
use crate::settings::MoodMethod;
use crate::types::{ClassificationResponse, Request, Response, SummaryResponse};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Answers classification and summary requests.
///
/// Infallible by signature: failures become the empty result before they
/// leave the implementation.
#[async_trait]
pub trait MoodBackend: Send + Sync {
    async fn classify(&self, text: &str, method: MoodMethod) -> ClassificationResponse;

    async fn summarise(&self, text: &str) -> SummaryResponse;

    /// Dispatch on request kind
    async fn handle(&self, request: &Request) -> Response {
        match request {
            Request::ClassifyMood { text, method } => {
                Response::Classification(self.classify(text, *method).await)
            }
            Request::SummariseText { text } => Response::Summary(self.summarise(text).await),
        }
    }
}

/// Rules in-process; model calls and summaries through the proxy when one
/// is configured
pub struct LocalBackend {
    thresholds: ClassifierConfig,
    proxy: Option<ProxyClient>,
}

impl LocalBackend {
    pub fn new(thresholds: ClassifierConfig, proxy: Option<ProxyClient>) -> Self {
        Self { thresholds, proxy }
    }

    /// Rules only, no proxy
    pub fn rules_only() -> Self {
        Self::new(ClassifierConfig::default(), None)
    }

    pub fn has_proxy(&self) -> bool {
        self.proxy.is_some()
    }
}

#[async_trait]
impl MoodBackend for LocalBackend {
    async fn classify(&self, text: &str, method: MoodMethod) -> ClassificationResponse {
        let proxy = match (method, &self.proxy) {
            (MoodMethod::Ml, Some(proxy)) => proxy,
            (MoodMethod::Ml, None) => {
                debug!("No proxy configured, classifying with rules");
                return classify_rules(text, self.thresholds.rules_min_score);
            }
            (MoodMethod::Rules, _) => {
                return classify_rules(text, self.thresholds.rules_min_score);
            }
        };

        match proxy.emotion(text).await {
            Ok(data) => parse_model_output(&data, self.thresholds.ml_min_score),
            Err(e) => {
                warn!("Emotion classification failed: {}", e);
                ClassificationResponse::empty()
            }
        }
    }

    async fn summarise(&self, text: &str) -> SummaryResponse {
        let proxy = match &self.proxy {
            Some(proxy) => proxy,
            None => {
                debug!("No proxy configured, summaries unavailable");
                return SummaryResponse::empty();
            }
        };

        match proxy.summary(text).await {
            Ok(summary) => SummaryResponse { summary },
            Err(e) => {
                warn!("Summarisation failed: {}", e);
                SummaryResponse::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_rules_classification() {
        let backend = LocalBackend::rules_only();
        let result = backend.classify("I sad, I cry", MoodMethod::Rules).await;
        assert_eq!(result.emotion.as_deref(), Some("sadness"));
    }

    #[tokio::test]
    async fn test_ml_without_proxy_falls_back_to_rules() {
        let backend = LocalBackend::rules_only();
        let result = backend.classify("furious revenge", MoodMethod::Ml).await;
        assert_eq!(result.emotion.as_deref(), Some("anger"));
    }

    #[tokio::test]
    async fn test_summary_without_proxy_is_empty() {
        let backend = LocalBackend::rules_only();
        let reply = backend.handle(&Request::summarise("A playlist")).await;
        assert_eq!(reply, Response::Summary(SummaryResponse::empty()));
    }

    #[tokio::test]
    async fn test_proxy_failure_is_normalized() {
        let proxy = ProxyClient::new(
            "http://127.0.0.1:9/api/hf-proxy",
            None,
            Duration::from_secs(2),
        )
        .unwrap();
        let backend = LocalBackend::new(ClassifierConfig::default(), Some(proxy));

        let result = backend.classify("sad", MoodMethod::Ml).await;
        assert_eq!(result, ClassificationResponse::empty());
        let summary = backend.summarise("text").await;
        assert_eq!(summary, SummaryResponse::empty());
    }
}
