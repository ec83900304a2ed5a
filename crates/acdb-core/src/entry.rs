//! Raw and typed character entries.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::key::{CatalogKey, IdentityKey, SortKey};
use crate::schema::CharacterField;

/// `null`, a whitespace-only string, or an empty list.
pub fn is_empty_value(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Looser presence test used when picking between two duplicate values: `false`, zero,
/// `""`, `[]`, `{}` and `null` count as absent, a whitespace-only string does not.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(true),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(map) => !map.is_empty(),
    }
}

fn text_of(value: Option<&JsonValue>) -> &str {
    value.and_then(JsonValue::as_str).unwrap_or_default()
}

/// A character entry exactly as it was loaded: any keys, any JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEntry(Map<String, JsonValue>);

impl RawEntry {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, JsonValue> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) -> Option<JsonValue> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn text(&self, key: &str) -> &str {
        text_of(self.0.get(key))
    }

    /// Keys that are not part of the character schema, in key order.
    pub fn unexpected_fields(&self) -> Vec<String> {
        self.0
            .keys()
            .filter(|key| CharacterField::from_name(key).is_none())
            .cloned()
            .collect()
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey::new(
            self.text(CharacterField::WorkType.as_str()),
            self.text(CharacterField::WorkName.as_str()),
            self.text(CharacterField::CharacterName.as_str()),
        )
    }
}

impl From<Map<String, JsonValue>> for RawEntry {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

/// A raw entry that carries keys outside the schema. The entry is handed back unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("entry has unexpected fields: {}", .unexpected.join(", "))]
pub struct SchemaViolation {
    pub unexpected: Vec<String>,
    pub entry: RawEntry,
}

/// Schema-valid character entry. Absent fields have no slot at all, which keeps them
/// apart from an explicit `null` and from an empty string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterEntry {
    values: BTreeMap<CharacterField, JsonValue>,
}

impl CharacterEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: CharacterField) -> Option<&JsonValue> {
        self.values.get(&field)
    }

    pub fn set(&mut self, field: CharacterField, value: JsonValue) -> Option<JsonValue> {
        self.values.insert(field, value)
    }

    pub fn with(mut self, field: CharacterField, value: impl Into<JsonValue>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn remove(&mut self, field: CharacterField) -> Option<JsonValue> {
        self.values.remove(&field)
    }

    pub fn contains(&self, field: CharacterField) -> bool {
        self.values.contains_key(&field)
    }

    /// String value of a field, or `""` when it is absent or not a string.
    pub fn text(&self, field: CharacterField) -> &str {
        text_of(self.values.get(&field))
    }

    /// Fields present on this entry, in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (CharacterField, &JsonValue)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_blank(&self, field: CharacterField) -> bool {
        self.values.get(&field).map(is_empty_value).unwrap_or(true)
    }

    /// Non-empty publication year. The legacy `year` key only reaches a typed entry after it
    /// has been renamed to `publication_year`.
    pub fn publication_year(&self) -> Option<&JsonValue> {
        self.values
            .get(&CharacterField::PublicationYear)
            .filter(|v| is_truthy(v))
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(
            self.text(CharacterField::CharacterName),
            self.text(CharacterField::WorkName),
        )
    }

    pub fn catalog_key(&self) -> CatalogKey {
        CatalogKey::new(
            self.text(CharacterField::WorkType),
            self.text(CharacterField::WorkName),
            self.text(CharacterField::CharacterName),
        )
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey::new(
            self.text(CharacterField::WorkType),
            self.text(CharacterField::WorkName),
            self.text(CharacterField::CharacterName),
        )
    }

    /// Inserts the placeholder for every required field this entry lacks. Fields that are
    /// present, even as `null`, are left alone.
    pub fn fill_required_placeholders(&mut self) {
        for field in CharacterField::REQUIRED {
            self.values.entry(field).or_insert_with(|| field.placeholder());
        }
    }

    pub fn to_raw(&self) -> RawEntry {
        let map = self
            .values
            .iter()
            .map(|(field, value)| (field.as_str().to_string(), value.clone()))
            .collect::<Map<_, _>>();
        RawEntry(map)
    }
}

impl TryFrom<RawEntry> for CharacterEntry {
    type Error = SchemaViolation;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let unexpected = raw.unexpected_fields();
        if !unexpected.is_empty() {
            return Err(SchemaViolation {
                unexpected,
                entry: raw,
            });
        }
        let values = raw
            .into_map()
            .into_iter()
            .filter_map(|(key, value)| CharacterField::from_name(&key).map(|field| (field, value)))
            .collect();
        Ok(Self { values })
    }
}

impl Serialize for CharacterEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in &self.values {
            map.serialize_entry(field.as_str(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CharacterEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEntry::deserialize(deserializer)?;
        CharacterEntry::try_from(raw).map_err(D::Error::custom)
    }
}
