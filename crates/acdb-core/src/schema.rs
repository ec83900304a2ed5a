//! Closed field enumeration for character entries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Every field a character entry may carry. Anything else makes an entry invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterField {
    SourceUrls,
    WorkUrl,
    WorkType,
    WorkName,
    CharacterName,
    CharacterDescription,
    AiQualification,
    AiQualificationExplanation,
    BenevolenceRating,
    BenevolenceRatingExplanation,
    AlignmentRating,
    AlignmentRatingExplanation,
    PublicationYear,
    CharacterType,
    NeedsResearch,
}

/// How a required field is judged when checking completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceRule {
    /// Must be a list; an empty list still counts.
    AnyList,
    /// Must be a string; an empty string still counts.
    AnyString,
    /// Must be non-null and, when a string, non-blank after trimming.
    NonBlank,
}

impl CharacterField {
    pub const REQUIRED: [CharacterField; 12] = [
        CharacterField::SourceUrls,
        CharacterField::WorkUrl,
        CharacterField::WorkType,
        CharacterField::WorkName,
        CharacterField::CharacterName,
        CharacterField::CharacterDescription,
        CharacterField::AiQualification,
        CharacterField::AiQualificationExplanation,
        CharacterField::BenevolenceRating,
        CharacterField::BenevolenceRatingExplanation,
        CharacterField::AlignmentRating,
        CharacterField::AlignmentRatingExplanation,
    ];

    pub const OPTIONAL: [CharacterField; 3] = [
        CharacterField::PublicationYear,
        CharacterField::CharacterType,
        CharacterField::NeedsResearch,
    ];

    pub const ALL: [CharacterField; 15] = [
        CharacterField::SourceUrls,
        CharacterField::WorkUrl,
        CharacterField::WorkType,
        CharacterField::WorkName,
        CharacterField::CharacterName,
        CharacterField::CharacterDescription,
        CharacterField::AiQualification,
        CharacterField::AiQualificationExplanation,
        CharacterField::BenevolenceRating,
        CharacterField::BenevolenceRatingExplanation,
        CharacterField::AlignmentRating,
        CharacterField::AlignmentRatingExplanation,
        CharacterField::PublicationYear,
        CharacterField::CharacterType,
        CharacterField::NeedsResearch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceUrls => "source_urls",
            Self::WorkUrl => "work_url",
            Self::WorkType => "work_type",
            Self::WorkName => "work_name",
            Self::CharacterName => "character_name",
            Self::CharacterDescription => "character_description",
            Self::AiQualification => "ai_qualification",
            Self::AiQualificationExplanation => "ai_qualification_explanation",
            Self::BenevolenceRating => "benevolence_rating",
            Self::BenevolenceRatingExplanation => "benevolence_rating_explanation",
            Self::AlignmentRating => "alignment_rating",
            Self::AlignmentRatingExplanation => "alignment_rating_explanation",
            Self::PublicationYear => "publication_year",
            Self::CharacterType => "character_type",
            Self::NeedsResearch => "needs_research",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }

    pub fn presence_rule(self) -> PresenceRule {
        match self {
            Self::SourceUrls => PresenceRule::AnyList,
            Self::WorkUrl => PresenceRule::AnyString,
            _ => PresenceRule::NonBlank,
        }
    }

    /// Value written for a required field that an entry lacks entirely.
    pub fn placeholder(self) -> JsonValue {
        match self {
            Self::SourceUrls => JsonValue::Array(Vec::new()),
            _ => JsonValue::String(String::new()),
        }
    }

    /// Free-text fields where the longer of two values is assumed to carry more detail.
    pub fn is_prose(self) -> bool {
        let name = self.as_str();
        name.contains("description") || name.contains("explanation")
    }
}

impl fmt::Display for CharacterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown character field `{0}`")]
pub struct UnknownField(pub String);

impl FromStr for CharacterField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_name() {
        for field in CharacterField::ALL {
            assert_eq!(CharacterField::from_name(field.as_str()), Some(field));
        }
        assert_eq!(CharacterField::from_name("year"), None);
        assert!("film".parse::<CharacterField>().is_err());
    }

    #[test]
    fn required_and_optional_partition_the_schema() {
        let required = CharacterField::ALL.iter().filter(|f| f.is_required()).count();
        assert_eq!(required, CharacterField::REQUIRED.len());
        assert_eq!(
            CharacterField::REQUIRED.len() + CharacterField::OPTIONAL.len(),
            CharacterField::ALL.len()
        );
        assert!(CharacterField::OPTIONAL.iter().all(|f| !f.is_required()));
    }

    #[test]
    fn relaxed_rules_only_for_urls() {
        assert_eq!(CharacterField::SourceUrls.presence_rule(), PresenceRule::AnyList);
        assert_eq!(CharacterField::WorkUrl.presence_rule(), PresenceRule::AnyString);
        assert_eq!(CharacterField::WorkName.presence_rule(), PresenceRule::NonBlank);
        assert_eq!(CharacterField::SourceUrls.placeholder(), serde_json::json!([]));
        assert_eq!(CharacterField::AlignmentRating.placeholder(), serde_json::json!(""));
    }

    #[test]
    fn prose_fields_are_descriptions_and_explanations() {
        assert!(CharacterField::CharacterDescription.is_prose());
        assert!(CharacterField::AlignmentRatingExplanation.is_prose());
        assert!(!CharacterField::CharacterName.is_prose());
        assert!(!CharacterField::WorkUrl.is_prose());
    }
}
