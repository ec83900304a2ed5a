//! Grouping, lookup and ordering keys.

use serde::{Deserialize, Serialize};

/// `(character_name, work_name)`, trimmed and case-sensitive. Used for conflict and
/// duplicate analysis.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    pub character_name: String,
    pub work_name: String,
}

impl IdentityKey {
    pub fn new(character_name: &str, work_name: &str) -> Self {
        Self {
            character_name: character_name.trim().to_string(),
            work_name: work_name.trim().to_string(),
        }
    }
}

/// `(work_type, work_name, character_name)`, trimmed. Used for exact lookups between the
/// canonical file and the incomplete bucket; not interchangeable with [`IdentityKey`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CatalogKey {
    pub work_type: String,
    pub work_name: String,
    pub character_name: String,
}

impl CatalogKey {
    pub fn new(work_type: &str, work_name: &str, character_name: &str) -> Self {
        Self {
            work_type: work_type.trim().to_string(),
            work_name: work_name.trim().to_string(),
            character_name: character_name.trim().to_string(),
        }
    }
}

/// Lowercased `(work_type, work_name, character_name)`; output files are ordered by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey(String, String, String);

impl SortKey {
    pub fn new(work_type: &str, work_name: &str, character_name: &str) -> Self {
        Self(
            work_type.to_lowercase(),
            work_name.to_lowercase(),
            character_name.to_lowercase(),
        )
    }
}

/// Anything that can be placed in canonical output order.
pub trait SortKeyed {
    fn sort_key(&self) -> SortKey;
}

impl SortKeyed for crate::CharacterEntry {
    fn sort_key(&self) -> SortKey {
        crate::CharacterEntry::sort_key(self)
    }
}

impl SortKeyed for crate::RawEntry {
    fn sort_key(&self) -> SortKey {
        crate::RawEntry::sort_key(self)
    }
}

/// Stable ascending sort by [`SortKey`]; entries with equal keys keep their input order.
pub fn sort_canonical<T: SortKeyed>(items: &mut [T]) {
    items.sort_by_cached_key(SortKeyed::sort_key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CharacterEntry, CharacterField};

    fn entry(work_type: &str, work_name: &str, character_name: &str) -> CharacterEntry {
        CharacterEntry::new()
            .with(CharacterField::WorkType, work_type)
            .with(CharacterField::WorkName, work_name)
            .with(CharacterField::CharacterName, character_name)
    }

    #[test]
    fn work_type_dominates_ordering() {
        let mut items = vec![entry("Movie", "Ace", "Bob"), entry("Book", "Zed", "Ann")];
        sort_canonical(&mut items);
        assert_eq!(items[0].text(CharacterField::WorkType), "Book");

        let mut items = vec![entry("book", "Zed", "Ann"), entry("Anime", "Ace", "Bob")];
        sort_canonical(&mut items);
        assert_eq!(items[0].text(CharacterField::WorkName), "Ace");
    }

    #[test]
    fn ordering_ignores_case_and_is_stable() {
        let mut items = vec![
            entry("Movie", "alien", "MOTHER").with(CharacterField::CharacterType, "first"),
            entry("movie", "Alien", "Ash"),
            entry("MOVIE", "ALIEN", "mother").with(CharacterField::CharacterType, "second"),
        ];
        sort_canonical(&mut items);
        assert_eq!(items[0].text(CharacterField::CharacterName), "Ash");
        assert_eq!(items[1].text(CharacterField::CharacterType), "first");
        assert_eq!(items[2].text(CharacterField::CharacterType), "second");
    }

    #[test]
    fn missing_sort_fields_sort_first() {
        let mut items = vec![entry("Book", "Dune", "Erasmus"), CharacterEntry::new()];
        sort_canonical(&mut items);
        assert!(items[0].is_empty());
    }
}
