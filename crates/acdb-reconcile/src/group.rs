//! Identity grouping over an arena of entries.

use std::collections::HashMap;

use acdb_core::{CharacterEntry, IdentityKey};

/// Entries sharing one [`IdentityKey`], as indices into the arena, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub key: IdentityKey,
    pub members: Vec<usize>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.members.len() == 1
    }

    pub fn entries<'a>(&self, arena: &'a [CharacterEntry]) -> Vec<&'a CharacterEntry> {
        self.members.iter().map(|&idx| &arena[idx]).collect()
    }
}

/// Groups the selected arena slots by identity key. Groups come out in the order their
/// first member was seen.
pub fn group_by_identity(
    arena: &[CharacterEntry],
    selection: impl IntoIterator<Item = usize>,
) -> Vec<Group> {
    let mut slots: HashMap<IdentityKey, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    for idx in selection {
        let key = arena[idx].identity_key();
        match slots.get(&key) {
            Some(&slot) => groups[slot].members.push(idx),
            None => {
                slots.insert(key.clone(), groups.len());
                groups.push(Group {
                    key,
                    members: vec![idx],
                });
            }
        }
    }
    groups
}
