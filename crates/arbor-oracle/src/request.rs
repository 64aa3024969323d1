//! Request and response shapes of the oracle contract

use crate::error::OracleError;
use crate::prompt::render_prompt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One candidate as presented for top-level classification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateView {
    pub index: usize,
    pub title: String,
    pub preview: String,
}

/// A summarized child, as context for its section's summary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionDigest {
    pub caption: String,
    pub summary: String,
}

/// What the oracle is asked to do, with its structured payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum OracleTask {
    /// Which candidates are siblings at the topmost level
    ClassifyTopLevel { candidates: Vec<CandidateView> },
    /// Key points and caption of a single paragraph
    SummarizeParagraph {
        title: String,
        content: String,
        context: Option<String>,
    },
    /// Key points and caption of a section from its children's summaries
    SummarizeSection {
        title: String,
        children: Vec<SectionDigest>,
        context: Option<String>,
    },
    /// A one-sentence title for an untitled paragraph
    TitleParagraph { content: String },
}

impl OracleTask {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClassifyTopLevel { .. } => "classify_top_level",
            Self::SummarizeParagraph { .. } => "summarize_paragraph",
            Self::SummarizeSection { .. } => "summarize_section",
            Self::TitleParagraph { .. } => "title_paragraph",
        }
    }
}

/// A single oracle call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleRequest {
    pub task: OracleTask,
    pub prompt: String,
    /// Route to the more capable (and slower) model
    pub high_quality: bool,
}

impl OracleRequest {
    /// Build a request, rendering its prompt from the task
    #[must_use]
    pub fn new(task: OracleTask, high_quality: bool) -> Self {
        let prompt = render_prompt(&task);
        Self {
            task,
            prompt,
            high_quality,
        }
    }
}

/// `{"top_headers": [int]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopLevelResponse {
    pub top_headers: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointEntry {
    pub point: String,
    #[serde(default)]
    pub evidence: Option<String>,
}

/// `{"points": [{"point", "evidence"?}], "keypoint"?: string}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsResponse {
    pub points: Vec<PointEntry>,
    #[serde(default)]
    pub keypoint: String,
}

/// `{"title": string}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleResponse {
    pub title: String,
}

/// Decode a completion into a typed response
///
/// Missing or mistyped keys are format errors.
pub(crate) fn parse_response<T: DeserializeOwned>(
    task: &str,
    value: serde_json::Value,
) -> Result<T, OracleError> {
    serde_json::from_value(value).map_err(|e| OracleError::Format(format!("{task}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_serializes_with_tag() {
        let task = OracleTask::TitleParagraph {
            content: "x".into(),
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["task"], "title_paragraph");
    }

    #[test]
    fn request_renders_prompt() {
        let request = OracleRequest::new(
            OracleTask::ClassifyTopLevel {
                candidates: vec![CandidateView {
                    index: 0,
                    title: "Introduction".into(),
                    preview: "We study".into(),
                }],
            },
            false,
        );
        assert!(request.prompt.contains("Introduction"));
        assert!(!request.high_quality);
    }

    #[test]
    fn points_response_defaults_keypoint_and_evidence() {
        let parsed: PointsResponse =
            parse_response("t", json!({"points": [{"point": "a"}]})).unwrap();
        assert_eq!(parsed.keypoint, "");
        assert_eq!(parsed.points[0].evidence, None);
    }

    #[test]
    fn missing_key_is_format_error() {
        let err = parse_response::<TopLevelResponse>("classify", json!({"headers": [1]}))
            .unwrap_err();
        assert!(matches!(err, OracleError::Format(msg) if msg.starts_with("classify")));
    }
}
