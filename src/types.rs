//! Message types exchanged with the settings popup and the
//! classification/summary collaborator.

use crate::settings::{MoodMethod, PartialSettings};
use serde::{Deserialize, Serialize};

/// Request sent to the collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "CLASSIFY_MOOD")]
    ClassifyMood { text: String, method: MoodMethod },

    #[serde(rename = "SUMMARISE_TEXT")]
    SummariseText { text: String },
}

impl Request {
    pub fn classify(text: &str, method: MoodMethod) -> Self {
        Request::ClassifyMood {
            text: text.to_string(),
            method,
        }
    }

    pub fn summarise(text: &str) -> Self {
        Request::SummariseText {
            text: text.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Request::ClassifyMood { .. } => "CLASSIFY_MOOD",
            Request::SummariseText { .. } => "SUMMARISE_TEXT",
        }
    }

    /// The "no usable result" reply for this request
    pub fn empty_response(&self) -> Response {
        match self {
            Request::ClassifyMood { .. } => {
                Response::Classification(ClassificationResponse::empty())
            }
            Request::SummariseText { .. } => Response::Summary(SummaryResponse::empty()),
        }
    }
}

/// `{emotion: string|null, score?: number}`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationResponse {
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ClassificationResponse {
    pub fn label(emotion: &str, score: f64) -> Self {
        Self {
            emotion: Some(emotion.to_string()),
            score: Some(score),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The label, if present and non-blank
    pub fn usable_emotion(&self) -> Option<&str> {
        self.emotion
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

/// `{summary: string|null}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub summary: Option<String>,
}

impl SummaryResponse {
    pub fn text(summary: &str) -> Self {
        Self {
            summary: Some(summary.to_string()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The summary, if present and non-blank
    pub fn usable_summary(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Reply from the collaborator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Classification(ClassificationResponse),
    Summary(SummaryResponse),
}

impl Response {
    /// Parse a raw reply for `request`. Anything malformed is the empty result.
    pub fn parse_for(request: &Request, raw: &[u8]) -> Response {
        match request {
            Request::ClassifyMood { .. } => Response::Classification(
                serde_json::from_slice(raw).unwrap_or_default(),
            ),
            Request::SummariseText { .. } => {
                Response::Summary(serde_json::from_slice(raw).unwrap_or_default())
            }
        }
    }

    /// Classification payload; any other reply kind counts as no result
    pub fn into_classification(self) -> ClassificationResponse {
        match self {
            Response::Classification(r) => r,
            Response::Summary(_) => ClassificationResponse::empty(),
        }
    }

    /// Summary payload; any other reply kind counts as no result
    pub fn into_summary(self) -> SummaryResponse {
        match self {
            Response::Summary(r) => r,
            Response::Classification(_) => SummaryResponse::empty(),
        }
    }
}

/// Message pushed to the page by the settings popup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentMessage {
    #[serde(rename = "APPLY_SETTINGS")]
    ApplySettings { payload: PartialSettings },
}
