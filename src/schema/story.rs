/// Generated stories: one rendered template for one child.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::personalization::PersonalizationSnapshot;
use crate::store::Document;

/// Field stamped by the store when a story is committed.
pub const GENERATED_AT_FIELD: &str = "generatedAt";

/// Field the deletion sweep filters on.
pub const CHILD_ID_FIELD: &str = "childId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    Ready,
}

/// Document id of the story for a (child, template) pair. Regenerating
/// always lands on the same document.
pub fn story_key(child_id: &str, template_id: &str) -> String {
    format!("{}-{}", child_id, template_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedStory {
    pub child_id: String,
    pub story_template_id: String,
    pub generated_content: String,
    /// Written as `null` when absent so a merge-write clears a stale value.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    /// Assigned by the store at commit time; `None` until written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    pub personalization_snapshot: PersonalizationSnapshot,
    pub status: StoryStatus,
}

impl GeneratedStory {
    pub fn key(&self) -> String {
        story_key(&self.child_id, &self.story_template_id)
    }

    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(self)?)
    }

    pub fn from_document(document: &Document) -> Result<GeneratedStory, serde_json::Error> {
        serde_json::from_value(Value::Object(document.clone()))
    }
}
