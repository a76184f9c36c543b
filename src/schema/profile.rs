/// Child profile records, as written by upstream users of the store.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{lenient, lenient_strings};
use super::personalization::{Culture, Family};
use crate::store::Document;

/// Profile fields that feed personalization. A change to any other field
/// never triggers regeneration.
pub const PERSONALIZATION_FIELDS: [&str; 5] = ["name", "pronouns", "interests", "culture", "family"];

/// Pronoun forms as supplied on a profile. Any form may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PronounForms {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub subjective: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub possessive: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub reflexive: Option<String>,
}

/// A raw child profile. Every field is optional and a field holding the
/// wrong JSON type reads as absent, so parsing never fails on an object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildProfile {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub pronouns: Option<PronounForms>,
    #[serde(default, deserialize_with = "lenient_strings", skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub culture: Option<Culture>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub family: Option<Family>,
}

impl ChildProfile {
    /// Read a profile out of a stored document. Unrelated fields are ignored.
    pub fn from_document(document: &Document) -> ChildProfile {
        ChildProfile::deserialize(Value::Object(document.clone())).unwrap_or_default()
    }
}

/// True when any personalization field differs between two versions of a
/// profile document. Comparison is by value: key order inside nested objects
/// does not matter and `1` equals `1.0`.
pub fn personalization_changed(before: &Document, after: &Document) -> bool {
    PERSONALIZATION_FIELDS
        .iter()
        .any(|field| !same_value(before.get(*field), after.get(*field)))
}

fn same_value(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => same_json(a, b),
        _ => false,
    }
}

fn same_json(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_json(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len() && xs.iter().all(|(k, x)| same_value(Some(x), ys.get(k)))
        }
        _ => a == b,
    }
}
