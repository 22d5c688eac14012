//! Display state of every entity currently known to the board.

use std::collections::BTreeMap;

use tabletop_core::{Entity, EntityId, GridCell, HitPoints};

/// Mapping from entity identifiers to their last reported state.
///
/// The registry never touches the occupancy grid; callers pair every mutation
/// with the matching grid update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityRegistry {
    entries: BTreeMap<EntityId, Entity>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the entity, replacing any previous record with the same id.
    pub fn upsert(&mut self, entity: Entity) {
        let _ = self.entries.insert(entity.id.clone(), entity);
    }

    /// Removes the entity, returning its last state when it was present.
    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        self.entries.remove(id)
    }

    /// Looks up the entity with the provided identifier.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entries.get(id)
    }

    /// Reports whether the entity is known.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entries.contains_key(id)
    }

    /// Updates the anchor cell of a known entity. Returns `false` when unknown.
    pub fn set_position(&mut self, id: &EntityId, cell: GridCell) -> bool {
        match self.entries.get_mut(id) {
            Some(entity) => {
                entity.position = cell;
                true
            }
            None => false,
        }
    }

    /// Updates hit points and armor class of a known entity. Returns `false` when unknown.
    pub fn update_stats(&mut self, id: &EntityId, hit_points: HitPoints, armor_class: i32) -> bool {
        match self.entries.get_mut(id) {
            Some(entity) => {
                entity.hit_points = hit_points;
                entity.armor_class = armor_class;
                true
            }
            None => false,
        }
    }

    /// Replaces every record with the provided entities. Later duplicates win.
    pub fn replace_all<I>(&mut self, entities: I)
    where
        I: IntoIterator<Item = Entity>,
    {
        self.entries.clear();
        for entity in entities {
            self.upsert(entity);
        }
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates over the entities ordered by identifier.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entries.values()
    }

    /// Number of known entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no entity is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
