//! In-process session service used for offline play and end-to-end tests.

use std::collections::{BTreeMap, VecDeque};

use tabletop_board::OccupancyGrid;
use tabletop_core::{
    ChannelError, ConfigError, Entity, EntityId, EntitySpec, Envelope, GridCell, Inbound, Intent,
    MapMeta, Role,
};
use tracing::{debug, info};

use crate::Channel;

/// Session service that arbitrates intents locally and answers with sequenced events.
///
/// The authority keeps its own occupancy grid, so it applies the same
/// single-occupancy rules the remote service would.
#[derive(Debug)]
pub struct LocalAuthority {
    code: String,
    map: MapMeta,
    role: Role,
    self_entity: Option<EntityId>,
    participant: String,
    grid: OccupancyGrid,
    entities: BTreeMap<EntityId, Entity>,
    outbox: VecDeque<Envelope>,
    next_sequence: u64,
    next_entity: u64,
}

impl LocalAuthority {
    /// Creates an authority for the campaign seeded with the provided entities.
    ///
    /// Unusable entities are dropped the same way a full resync drops them
    /// on the client.
    pub fn new(
        code: impl Into<String>,
        map: MapMeta,
        role: Role,
        seed: Vec<Entity>,
    ) -> Result<Self, ConfigError> {
        let mut grid = OccupancyGrid::for_map(&map)?;
        let seed: Vec<Entity> = seed
            .into_iter()
            .filter(|entity| entity.defect().is_none())
            .collect();
        let report = grid.rebuild(seed.iter().map(|entity| (&entity.id, entity.position)));
        if report.skipped() > 0 {
            debug!(skipped = report.skipped(), "authority dropped unusable seed entities");
        }
        let entities = seed
            .into_iter()
            .filter(|entity| grid.occupant(entity.position) == Some(&entity.id))
            .map(|entity| (entity.id.clone(), entity))
            .collect();

        Ok(Self {
            code: code.into(),
            map,
            role,
            self_entity: None,
            participant: "you".to_owned(),
            grid,
            entities,
            outbox: VecDeque::new(),
            next_sequence: 1,
            next_entity: 1,
        })
    }

    /// Sets the entity reported as controlled by the joining participant.
    #[must_use]
    pub fn with_self_entity(mut self, entity: EntityId) -> Self {
        self.self_entity = Some(entity);
        self
    }

    /// Sets the name attached to chat lines sent by the participant.
    #[must_use]
    pub fn with_participant(mut self, name: impl Into<String>) -> Self {
        self.participant = name.into();
        self
    }

    /// Removes an entity and broadcasts the removal.
    pub fn remove_entity(&mut self, id: &EntityId) -> bool {
        let Some(removed) = self.entities.remove(id) else {
            return false;
        };
        self.grid.vacate(removed.position);
        self.broadcast(Inbound::EntityRemoved { entity: removed.id });
        true
    }

    /// Broadcasts the current entity set without being asked.
    pub fn broadcast_snapshot(&mut self) {
        let entities = self.entities.values().cloned().collect();
        self.broadcast(Inbound::EntitiesSynced { entities });
    }

    /// Entities currently known to the authority, ordered by identifier.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    fn handle(&mut self, intent: Intent) {
        match intent {
            Intent::JoinSession { code } => {
                if self.reject_foreign_code(&code) {
                    return;
                }
                info!(code = %self.code, "participant joined local session");
                self.broadcast(Inbound::SessionResourcesReady {
                    map: self.map.clone(),
                    role: self.role,
                    self_entity: self.self_entity.clone(),
                });
            }
            Intent::RequestEntityList { code } => {
                if self.reject_foreign_code(&code) {
                    return;
                }
                let entities = self.entities.values().cloned().collect();
                self.broadcast(Inbound::EntityListResult { entities });
            }
            Intent::RequestMove { entity, target } => self.move_entity(entity, target),
            Intent::RequestSpawn { code, spec } => {
                if self.reject_foreign_code(&code) {
                    return;
                }
                self.spawn(spec);
            }
            Intent::SendChat { code, text } => {
                if self.reject_foreign_code(&code) {
                    return;
                }
                self.broadcast(Inbound::ChatMessage {
                    sender: self.participant.clone(),
                    text,
                });
            }
        }
    }

    fn move_entity(&mut self, id: EntityId, target: GridCell) {
        let Some(entity) = self.entities.get_mut(&id) else {
            self.notify(format!("cannot move unknown entity {id}"));
            return;
        };
        if let Err(error) = self.grid.move_entity(&id, entity.position, target) {
            self.notify(format!("move of {id} rejected: {error}"));
            return;
        }
        entity.position = target;
        self.broadcast(Inbound::EntityMoved {
            entity: id,
            to: target,
        });
    }

    fn spawn(&mut self, spec: EntitySpec) {
        let Some(cell) = self.first_free_cell() else {
            self.notify("no free cell left for a new entity".to_owned());
            return;
        };
        let id = self.fresh_entity_id();
        if let Err(error) = self.grid.place(&id, cell) {
            self.notify(format!("spawn rejected: {error}"));
            return;
        }

        let entity = Entity {
            id: id.clone(),
            kind: spec.kind,
            display_name: spec.display_name,
            hit_points: spec.hit_points,
            armor_class: spec.armor_class,
            footprint: spec.footprint,
            position: cell,
            asset_ref: spec.asset_ref,
        };
        let _ = self.entities.insert(id, entity.clone());
        self.broadcast(Inbound::EntitySpawned { entity });
    }

    fn fresh_entity_id(&mut self) -> EntityId {
        loop {
            let id = EntityId::new(format!("entity-{}", self.next_entity));
            self.next_entity += 1;
            if !self.entities.contains_key(&id) {
                return id;
            }
        }
    }

    fn first_free_cell(&self) -> Option<GridCell> {
        let (columns, rows) = self.grid.dimensions();
        let columns = i32::try_from(columns).ok()?;
        let rows = i32::try_from(rows).ok()?;
        (0..rows)
            .flat_map(|row| (0..columns).map(move |column| GridCell::new(column, row)))
            .find(|cell| !self.grid.is_occupied(*cell))
    }

    fn reject_foreign_code(&mut self, code: &str) -> bool {
        if code == self.code {
            return false;
        }
        self.notify(format!("unknown campaign code {code}"));
        true
    }

    fn notify(&mut self, detail: String) {
        debug!(%detail, "local authority rejected intent");
        self.broadcast(Inbound::ErrorNotice { detail });
    }

    fn broadcast(&mut self, event: Inbound) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.outbox.push_back(Envelope::sequenced(sequence, event));
    }
}

impl Channel for LocalAuthority {
    fn send(&mut self, intent: Intent) -> Result<(), ChannelError> {
        self.handle(intent);
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Envelope>, ChannelError> {
        Ok(self.outbox.pop_front())
    }
}
