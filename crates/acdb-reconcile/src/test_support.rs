use acdb_core::{CharacterEntry, CharacterField, RawEntry};
use serde_json::{json, Value as JsonValue};

pub fn raw(value: JsonValue) -> RawEntry {
    serde_json::from_value(value).expect("raw entry")
}

pub fn complete_entry() -> CharacterEntry {
    CharacterEntry::new()
        .with(CharacterField::SourceUrls, json!(["https://example.org/hal"]))
        .with(CharacterField::WorkUrl, "https://example.org/2001")
        .with(CharacterField::WorkType, "Movie")
        .with(CharacterField::WorkName, "2001: A Space Odyssey")
        .with(CharacterField::CharacterName, "HAL 9000")
        .with(CharacterField::CharacterDescription, "Ship computer.")
        .with(CharacterField::AiQualification, "Yes")
        .with(CharacterField::AiQualificationExplanation, "A sentient computer.")
        .with(CharacterField::BenevolenceRating, "Malevolent")
        .with(CharacterField::BenevolenceRatingExplanation, "Kills the crew.")
        .with(CharacterField::AlignmentRating, "Misaligned")
        .with(CharacterField::AlignmentRatingExplanation, "Conflicting orders.")
}

/// A complete entry for `character_name` in `work_name`.
pub fn character(character_name: &str, work_name: &str, work_type: &str) -> CharacterEntry {
    complete_entry()
        .with(CharacterField::CharacterName, character_name)
        .with(CharacterField::WorkName, work_name)
        .with(CharacterField::WorkType, work_type)
}
