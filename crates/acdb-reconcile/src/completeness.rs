//! Required-field completeness with per-field emptiness rules.

use acdb_core::{CharacterEntry, CharacterField, PresenceRule};
use serde_json::Value as JsonValue;

fn satisfies(rule: PresenceRule, value: Option<&JsonValue>) -> bool {
    match (rule, value) {
        (_, None) | (_, Some(JsonValue::Null)) => false,
        (PresenceRule::AnyList, Some(value)) => value.is_array(),
        (PresenceRule::AnyString, Some(value)) => value.is_string(),
        (PresenceRule::NonBlank, Some(JsonValue::String(s))) => !s.trim().is_empty(),
        (PresenceRule::NonBlank, Some(_)) => true,
    }
}

/// Required fields that fail their presence rule, in schema order.
pub fn missing_required(entry: &CharacterEntry) -> Vec<CharacterField> {
    CharacterField::REQUIRED
        .into_iter()
        .filter(|field| !satisfies(field.presence_rule(), entry.get(*field)))
        .collect()
}

pub fn is_complete(entry: &CharacterEntry) -> bool {
    CharacterField::REQUIRED
        .into_iter()
        .all(|field| satisfies(field.presence_rule(), entry.get(field)))
}

pub fn partition_by_completeness(
    entries: Vec<CharacterEntry>,
) -> (Vec<CharacterEntry>, Vec<CharacterEntry>) {
    entries.into_iter().partition(is_complete)
}
