/// Story templates, read from the templates collection.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::DocumentSnapshot;

/// A story template. `raw_content` holds the placeholder tags; any fields
/// this crate does not interpret are carried in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryTemplate {
    /// Document id. Not part of the stored fields.
    #[serde(skip)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    pub raw_content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoryTemplate {
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Result<StoryTemplate, serde_json::Error> {
        let mut template: StoryTemplate =
            serde_json::from_value(Value::Object(snapshot.data.clone()))?;
        template.id = snapshot.id.clone();
        Ok(template)
    }
}
