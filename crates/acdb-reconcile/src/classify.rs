//! Conflict classification inside an identity group.

use std::collections::{BTreeSet, HashSet};

use acdb_core::{is_empty_value, CharacterEntry, CharacterField};
use serde_json::Value as JsonValue;

/// Distinct work types and publication years seen across a group, as JSON text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkSpread {
    pub work_types: BTreeSet<String>,
    pub years: BTreeSet<String>,
}

impl WorkSpread {
    pub fn of(members: &[&CharacterEntry]) -> Self {
        let mut spread = Self::default();
        for entry in members {
            let work_type = entry
                .get(CharacterField::WorkType)
                .cloned()
                .unwrap_or_else(|| JsonValue::String(String::new()));
            spread.work_types.insert(work_type.to_string());
            if let Some(year) = entry.publication_year() {
                spread.years.insert(year.to_string());
            }
        }
        spread
    }

    /// More than one work type or more than one known year.
    pub fn spans_multiple_works(&self) -> bool {
        self.work_types.len() > 1 || self.years.len() > 1
    }
}

/// Whether one identity key covers several distinct works, e.g. a manga and its anime.
pub fn is_multi_work(members: &[&CharacterEntry]) -> bool {
    WorkSpread::of(members).spans_multiple_works()
}

/// Same facts modulo missing data: wherever both sides hold a non-empty value for a field,
/// the values are equal.
pub fn same_fact_set(a: &CharacterEntry, b: &CharacterEntry) -> bool {
    if a == b {
        return true;
    }
    let fields = a
        .fields()
        .chain(b.fields())
        .map(|(field, _)| field)
        .collect::<HashSet<_>>();
    fields.into_iter().all(|field| match (a.get(field), b.get(field)) {
        (Some(x), Some(y)) if !is_empty_value(x) && !is_empty_value(y) => x == y,
        _ => true,
    })
}

/// Every member agrees with the first one.
pub fn all_same_facts(members: &[&CharacterEntry]) -> bool {
    match members.split_first() {
        Some((first, rest)) => rest.iter().all(|other| same_fact_set(first, other)),
        None => true,
    }
}
