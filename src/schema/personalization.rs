use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lenient, lenient_strings};

/// Pronoun forms used to resolve the `[PRONOUN_*]` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pronouns {
    pub subjective: String,
    pub objective: String,
    pub possessive: String,
    pub reflexive: String,
}

impl Default for Pronouns {
    /// they/them/their/themselves
    fn default() -> Self {
        Self {
            subjective: "they".to_string(),
            objective: "them".to_string(),
            possessive: "their".to_string(),
            reflexive: "themselves".to_string(),
        }
    }
}

/// Cultural background of a child. Unknown keys are kept in `extra` so the
/// denormalized copy stored with each story matches the profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Culture {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub holidays: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub customs: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named family member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Family of a child: parents and pets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Family {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub mother: Option<FamilyMember>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub father: Option<FamilyMember>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub pets: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The canonical, fully-defaulted view of a child profile used for one
/// regeneration pass. Every top-level field is always populated and
/// `interests` is never empty.
///
/// A copy is stored inside each generated story so the rendered text can be
/// traced back to the profile state that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalizationSnapshot {
    pub name: String,
    pub pronouns: Pronouns,
    pub interests: Vec<String>,
    pub culture: Culture,
    pub family: Family,
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient_strings(deserializer)?.unwrap_or_default())
}
