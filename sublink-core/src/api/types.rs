//! Types for subtitle server API requests and responses

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::alignment::Alignment;

/// Identifier of a content item (a linked subtitle pair on the server)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ContentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for ContentId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Response for the subtitles endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AlignmentPageResponse {
    pub alignments: Vec<Alignment>,
    pub pagination: Pagination,
}

/// Pagination block of the subtitles endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    pub total_alignments: u64,
}

/// Server-side progress record for one (user, content) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Content the record belongs to (`sub_link_id` on the wire)
    #[serde(default, alias = "sub_link_id", deserialize_with = "de_content_id")]
    pub content_id: Option<ContentId>,

    /// Last committed alignment index
    #[serde(rename = "current_alignment_index")]
    pub current_index: u64,

    /// Number of alignments in the content
    #[serde(rename = "total_alignments", default)]
    pub total_count: u64,

    /// Highest index ever reached
    #[serde(default)]
    pub total_alignments_completed: Option<u64>,

    /// Accumulated study time in minutes
    #[serde(rename = "session_duration_minutes", default)]
    pub session_duration: u64,

    /// Server timestamp of the last access, as sent
    #[serde(default)]
    pub last_accessed: Option<String>,
}

impl ProgressRecord {
    /// Completion in percent, derived from the current index
    pub fn completion_percentage(&self) -> f64 {
        completion_percentage(self.current_index, self.total_count)
    }
}

/// `current / total * 100`, clamped to `[0, 100]`. Zero for an empty sequence.
pub fn completion_percentage(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = current as f64 / total as f64 * 100.0;
    (pct.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

/// Response wrapper for progress endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressResponse {
    pub progress: ProgressRecord,
}

/// Response for the recent-progress endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RecentProgressResponse {
    pub recent_progress: Vec<ProgressRecord>,
    #[serde(default)]
    pub count: usize,
}

/// A position write produced by navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub current_alignment_index: u64,
    pub session_duration_minutes: u64,
    /// Local production order. Never sent to the server.
    pub sequence: u64,
}

/// Request body for the progress update endpoint
#[derive(Debug, Clone, Serialize)]
pub struct UpdateProgressRequest {
    pub current_alignment_index: u64,
    pub session_duration_minutes: u64,
}

impl From<&ProgressUpdate> for UpdateProgressRequest {
    fn from(update: &ProgressUpdate) -> Self {
        Self {
            current_alignment_index: update.current_alignment_index,
            session_duration_minutes: update.session_duration_minutes,
        }
    }
}

fn de_content_id<'de, D>(deserializer: D) -> Result<Option<ContentId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Num(u64),
        Text(String),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Num(n) => ContentId::from(n),
        RawId::Text(s) => ContentId::from(s),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_percentage_clamps() {
        assert_eq!(completion_percentage(0, 0), 0.0);
        assert_eq!(completion_percentage(25, 100), 25.0);
        assert_eq!(completion_percentage(150, 100), 100.0);
        assert_eq!(completion_percentage(1, 3), 33.33);
    }

    #[test]
    fn test_progress_record_from_server_json() {
        let json = r#"{
            "id": 7,
            "user_id": 1,
            "sub_link_id": 42,
            "current_alignment_index": 12,
            "total_alignments_completed": 20,
            "session_duration_minutes": 35,
            "last_accessed": "2025-01-02T10:00:00",
            "completion_percentage": 12.0,
            "total_alignments": 100
        }"#;

        let record: ProgressRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.content_id, Some(ContentId::from(42)));
        assert_eq!(record.current_index, 12);
        assert_eq!(record.total_count, 100);
        assert_eq!(record.total_alignments_completed, Some(20));
        assert_eq!(record.session_duration, 35);
        assert_eq!(record.completion_percentage(), 12.0);
    }

    #[test]
    fn test_request_body_omits_sequence() {
        let update = ProgressUpdate {
            current_alignment_index: 9,
            session_duration_minutes: 2,
            sequence: 41,
        };
        let value = serde_json::to_value(UpdateProgressRequest::from(&update)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "current_alignment_index": 9, "session_duration_minutes": 2 })
        );
    }
}
