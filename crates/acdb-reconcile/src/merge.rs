//! The two merge policies: densest-value group merge for same-fact groups, and the pairwise
//! "better field" merge used when resolving flagged duplicates.

use acdb_core::{is_empty_value, is_truthy, CharacterEntry, CharacterField};
use serde_json::Value as JsonValue;

/// Starts from the first member and fills each field with the first non-empty value found
/// in member order. Members are expected to agree wherever both hold a value.
pub fn merge_group(members: &[&CharacterEntry]) -> CharacterEntry {
    let Some((first, _)) = members.split_first() else {
        return CharacterEntry::new();
    };
    let mut merged = (*first).clone();
    for field in CharacterField::ALL {
        let densest = members
            .iter()
            .filter_map(|entry| entry.get(field))
            .find(|value| !is_empty_value(value));
        if let Some(value) = densest {
            merged.set(field, value.clone());
        }
    }
    merged
}

/// Pairwise duplicate merge. A present value beats an absent one; between two strings the
/// longer wins, measured raw for prose fields and trimmed otherwise, with ties going to
/// `first`. `source_urls` becomes the union of both lists.
pub fn merge_pair(first: &CharacterEntry, second: &CharacterEntry) -> CharacterEntry {
    let mut merged = CharacterEntry::new();
    for field in CharacterField::ALL {
        let a = first.get(field);
        let b = second.get(field);
        if a.is_none() && b.is_none() {
            continue;
        }
        let value = if field == CharacterField::SourceUrls {
            union_urls(a, b)
        } else {
            pick_better(field, a, b).clone()
        };
        merged.set(field, value);
    }
    merged
}

/// Left fold of [`merge_pair`] in slice order. The "longer wins" rule is order sensitive, so
/// callers pass members in load order.
pub fn fold_duplicates(members: &[CharacterEntry]) -> Option<CharacterEntry> {
    let (first, rest) = members.split_first()?;
    Some(rest.iter().fold(first.clone(), |acc, next| merge_pair(&acc, next)))
}

fn truthy(value: Option<&JsonValue>) -> bool {
    value.map(is_truthy).unwrap_or(false)
}

fn pick_better<'a>(
    field: CharacterField,
    a: Option<&'a JsonValue>,
    b: Option<&'a JsonValue>,
) -> &'a JsonValue {
    match (a, b) {
        (Some(a), Some(b)) if truthy(Some(a)) && truthy(Some(b)) => {
            let first_wins = match (a.as_str(), b.as_str()) {
                (Some(x), Some(y)) if field.is_prose() => x.chars().count() >= y.chars().count(),
                (Some(x), Some(y)) => x.trim().chars().count() >= y.trim().chars().count(),
                _ => true,
            };
            if first_wins {
                a
            } else {
                b
            }
        }
        (Some(a), _) if truthy(Some(a)) => a,
        (_, Some(b)) if truthy(Some(b)) => b,
        (_, Some(b)) => b,
        (Some(a), None) => a,
        (None, None) => &JsonValue::Null,
    }
}

fn union_urls(a: Option<&JsonValue>, b: Option<&JsonValue>) -> JsonValue {
    match (a, b) {
        (Some(JsonValue::Array(x)), Some(JsonValue::Array(y))) if !x.is_empty() && !y.is_empty() => {
            let mut urls: Vec<JsonValue> = Vec::with_capacity(x.len() + y.len());
            for url in x.iter().chain(y) {
                if !urls.contains(url) {
                    urls.push(url.clone());
                }
            }
            JsonValue::Array(urls)
        }
        _ => [a, b]
            .into_iter()
            .flatten()
            .find(|value| is_truthy(value))
            .cloned()
            .unwrap_or_else(|| JsonValue::Array(Vec::new())),
    }
}
