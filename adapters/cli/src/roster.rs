//! In-memory character directory seeded from configuration.

use std::collections::BTreeMap;

use tabletop_core::{CharacterDirectory, CharacterSheet, EntityId};

#[derive(Clone, Debug, Default)]
pub(crate) struct CharacterRoster {
    sheets: BTreeMap<EntityId, CharacterSheet>,
}

impl CharacterRoster {
    /// Builds a roster; later sheets replace earlier ones with the same id.
    pub(crate) fn new(sheets: impl IntoIterator<Item = CharacterSheet>) -> Self {
        Self {
            sheets: sheets
                .into_iter()
                .map(|sheet| (sheet.id.clone(), sheet))
                .collect(),
        }
    }
}

impl CharacterDirectory for CharacterRoster {
    fn character_by_id(&self, id: &EntityId) -> Option<CharacterSheet> {
        self.sheets.get(id).cloned()
    }
}
