/// Builds the fully-defaulted personalization snapshot from a raw profile.
use crate::schema::personalization::{PersonalizationSnapshot, Pronouns};
use crate::schema::profile::{ChildProfile, PronounForms};

/// Name used when a profile has none.
pub const UNKNOWN_CHILD_NAME: &str = "[Unknown Child]";

/// Interests used when a profile lists none.
pub const DEFAULT_INTERESTS: [&str; 3] = ["adventure", "discovery", "friendship"];

/// Build the snapshot for one regeneration pass. Each field is defaulted on
/// its own; empty strings and empty lists count as absent.
pub fn build_personalization(profile: &ChildProfile) -> PersonalizationSnapshot {
    PersonalizationSnapshot {
        name: profile
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_CHILD_NAME)
            .to_string(),
        pronouns: profile
            .pronouns
            .as_ref()
            .map(resolve_pronouns)
            .unwrap_or_default(),
        interests: match profile.interests.as_deref() {
            Some(interests) if !interests.is_empty() => interests.to_vec(),
            _ => DEFAULT_INTERESTS.iter().map(|s| s.to_string()).collect(),
        },
        culture: profile.culture.clone().unwrap_or_default(),
        family: profile.family.clone().unwrap_or_default(),
    }
}

/// Supplied forms win; missing ones come from they/them.
fn resolve_pronouns(forms: &PronounForms) -> Pronouns {
    let defaults = Pronouns::default();
    let pick = |form: &Option<String>, fallback: String| {
        form.clone().filter(|f| !f.is_empty()).unwrap_or(fallback)
    };
    Pronouns {
        subjective: pick(&forms.subjective, defaults.subjective),
        objective: pick(&forms.objective, defaults.objective),
        possessive: pick(&forms.possessive, defaults.possessive),
        reflexive: pick(&forms.reflexive, defaults.reflexive),
    }
}
