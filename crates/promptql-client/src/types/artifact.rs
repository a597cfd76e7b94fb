use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Artifact payload as returned by the data endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub thread_id: String,
    pub artifact_id: String,
    pub content_type: Option<String>,
    /// Body length in bytes
    pub size: usize,
    /// Parsed JSON when the body is JSON, otherwise the raw text
    pub data: Value,
}

impl Artifact {
    pub fn from_body(
        thread_id: impl Into<String>,
        artifact_id: impl Into<String>,
        content_type: Option<String>,
        body: &str,
    ) -> Self {
        let data = serde_json::from_str::<Value>(body)
            .unwrap_or_else(|_| Value::String(body.to_string()));

        Self {
            thread_id: thread_id.into(),
            artifact_id: artifact_id.into(),
            content_type,
            size: body.len(),
            data,
        }
    }

    pub fn is_json(&self) -> bool {
        !matches!(self.data, Value::String(_))
    }
}
