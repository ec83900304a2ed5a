//! Schema conformance: an entry is valid only if every key belongs to the character schema.

use acdb_core::{CharacterEntry, RawEntry, SchemaViolation};

/// Keys of `entry` outside required ∪ optional.
pub fn unexpected_fields(entry: &RawEntry) -> Vec<String> {
    entry.unexpected_fields()
}

pub fn validate(entry: RawEntry) -> Result<CharacterEntry, SchemaViolation> {
    CharacterEntry::try_from(entry)
}

/// Splits entries into schema-valid records and violations, keeping input order in both.
pub fn partition_by_schema(entries: Vec<RawEntry>) -> (Vec<CharacterEntry>, Vec<SchemaViolation>) {
    let mut valid = Vec::with_capacity(entries.len());
    let mut invalid = Vec::new();
    for entry in entries {
        match validate(entry) {
            Ok(entry) => valid.push(entry),
            Err(violation) => invalid.push(violation),
        }
    }
    (valid, invalid)
}
