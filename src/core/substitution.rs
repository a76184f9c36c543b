/// Placeholder substitution: renders a story template for one child.
///
/// Templates carry fixed bracketed tags such as `[CHILD_NAME]`. Each tag is
/// replaced literally by a value from the personalization snapshot, or by a
/// fallback when the nested value is missing. Unknown tags are left alone.
use crate::schema::personalization::PersonalizationSnapshot;
use crate::schema::template::StoryTemplate;

/// A recognised placeholder tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    ChildName,
    PronounSubjective,
    PronounObjective,
    PronounPossessive,
    PronounReflexive,
    Holiday,
    CultureCustom,
    Region,
    MotherName,
    FatherName,
    PetName1,
    PetName2,
    Interest1,
    Interest2,
    Interest3,
}

impl Token {
    /// Tags with a single source value, substituted first.
    pub const FIXED: [Token; 12] = [
        Token::ChildName,
        Token::PronounSubjective,
        Token::PronounObjective,
        Token::PronounPossessive,
        Token::PronounReflexive,
        Token::Holiday,
        Token::CultureCustom,
        Token::Region,
        Token::MotherName,
        Token::FatherName,
        Token::PetName1,
        Token::PetName2,
    ];

    /// Numbered interest tags, substituted after the fixed set.
    pub const INTERESTS: [Token; 3] = [Token::Interest1, Token::Interest2, Token::Interest3];

    /// Every token in substitution order.
    pub fn all() -> impl Iterator<Item = Token> {
        Self::FIXED.into_iter().chain(Self::INTERESTS)
    }

    /// Tag name without brackets, e.g. `CHILD_NAME`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChildName => "CHILD_NAME",
            Self::PronounSubjective => "PRONOUN_SUBJECTIVE",
            Self::PronounObjective => "PRONOUN_OBJECTIVE",
            Self::PronounPossessive => "PRONOUN_POSSESSIVE",
            Self::PronounReflexive => "PRONOUN_REFLEXIVE",
            Self::Holiday => "HOLIDAY",
            Self::CultureCustom => "CULTURE_CUSTOM",
            Self::Region => "REGION",
            Self::MotherName => "MOTHER_NAME",
            Self::FatherName => "FATHER_NAME",
            Self::PetName1 => "PET_NAME_1",
            Self::PetName2 => "PET_NAME_2",
            Self::Interest1 => "INTEREST_1",
            Self::Interest2 => "INTEREST_2",
            Self::Interest3 => "INTEREST_3",
        }
    }

    /// The literal text matched in templates, e.g. `[CHILD_NAME]`.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ChildName => "[CHILD_NAME]",
            Self::PronounSubjective => "[PRONOUN_SUBJECTIVE]",
            Self::PronounObjective => "[PRONOUN_OBJECTIVE]",
            Self::PronounPossessive => "[PRONOUN_POSSESSIVE]",
            Self::PronounReflexive => "[PRONOUN_REFLEXIVE]",
            Self::Holiday => "[HOLIDAY]",
            Self::CultureCustom => "[CULTURE_CUSTOM]",
            Self::Region => "[REGION]",
            Self::MotherName => "[MOTHER_NAME]",
            Self::FatherName => "[FATHER_NAME]",
            Self::PetName1 => "[PET_NAME_1]",
            Self::PetName2 => "[PET_NAME_2]",
            Self::Interest1 => "[INTEREST_1]",
            Self::Interest2 => "[INTEREST_2]",
            Self::Interest3 => "[INTEREST_3]",
        }
    }

    pub fn from_name(name: &str) -> Option<Token> {
        Self::all().find(|token| token.name() == name)
    }

    /// Value substituted for this token.
    pub fn resolve<'a>(&self, snapshot: &'a PersonalizationSnapshot) -> &'a str {
        let culture = &snapshot.culture;
        let family = &snapshot.family;
        match self {
            Self::ChildName => snapshot.name.as_str(),
            Self::PronounSubjective => snapshot.pronouns.subjective.as_str(),
            Self::PronounObjective => snapshot.pronouns.objective.as_str(),
            Self::PronounPossessive => snapshot.pronouns.possessive.as_str(),
            Self::PronounReflexive => snapshot.pronouns.reflexive.as_str(),
            Self::Holiday => present(culture.holidays.first()).unwrap_or("a special holiday"),
            Self::CultureCustom => present(culture.customs.first()).unwrap_or("a local tradition"),
            Self::Region => present(culture.region.as_ref()).unwrap_or("their region"),
            Self::MotherName => {
                present(family.mother.as_ref().and_then(|m| m.name.as_ref())).unwrap_or("Mom")
            }
            Self::FatherName => {
                present(family.father.as_ref().and_then(|f| f.name.as_ref())).unwrap_or("Dad")
            }
            Self::PetName1 => present(family.pets.first()).unwrap_or("Buddy"),
            Self::PetName2 => present(family.pets.get(1)).unwrap_or("Snowball"),
            Self::Interest1 => interest(snapshot, 0),
            Self::Interest2 => interest(snapshot, 1),
            Self::Interest3 => interest(snapshot, 2),
        }
    }
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// Interest at `index`, or the first interest when there is none there.
fn interest(snapshot: &PersonalizationSnapshot, index: usize) -> &str {
    present(snapshot.interests.get(index))
        .or_else(|| snapshot.interests.first().map(String::as_str))
        .unwrap_or("")
}

/// Render a template for one child.
pub fn personalize(template: &StoryTemplate, snapshot: &PersonalizationSnapshot) -> String {
    personalize_text(&template.raw_content, snapshot)
}

/// Replace every occurrence of every recognised tag in `raw`. The fixed
/// tags go first, then the numbered interests.
pub fn personalize_text(raw: &str, snapshot: &PersonalizationSnapshot) -> String {
    let mut content = raw.to_string();
    for token in Token::all() {
        let tag = token.tag();
        if content.contains(tag) {
            content = content.replace(tag, token.resolve(snapshot));
        }
    }
    content
}

/// A bracketed tag found in template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Tag name without brackets.
    pub name: String,
    /// Byte offset of the opening bracket.
    pub offset: usize,
    /// `None` when the tag is not one this engine substitutes.
    pub token: Option<Token>,
}

/// Find every `[NAME]` tag whose name is made of ASCII letters, digits and
/// underscores. Names of any case are reported so callers can flag
/// near-misses such as `[child_name]`.
pub fn scan_placeholders(text: &str) -> Vec<Placeholder> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'[' {
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
            end += 1;
        }

        if end > start && end < bytes.len() && bytes[end] == b']' {
            let name = &text[start..end];
            found.push(Placeholder {
                name: name.to_string(),
                offset: i,
                token: Token::from_name(name),
            });
            i = end + 1;
        } else {
            // Resume at the next byte so "[[CHILD_NAME]" still finds the tag.
            i = start;
        }
    }

    found
}
