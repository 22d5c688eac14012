#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Session-scoped board state for the tabletop client.
//!
//! The board is the local mirror of the authoritative session. It owns the
//! occupancy grid and the entity registry and only changes through [`apply`],
//! which consumes one inbound event at a time and reports what changed.

mod grid;
mod registry;

use std::collections::VecDeque;

use tabletop_core::{
    Change, ChatLine, ConflictReason, Entity, EntityId, Inbound, MapMeta, Notice, Role, SyncError,
};
use tracing::{debug, warn};

pub use grid::{OccupancyGrid, RebuildReport};
pub use registry::EntityRegistry;

/// Maximum number of chat lines retained by the board.
pub const CHAT_CAPACITY: usize = 200;

/// Maximum number of notices retained by the board.
pub const NOTICE_CAPACITY: usize = 16;

/// Local mirror of a single campaign session.
#[derive(Debug, Default)]
pub struct Board {
    session: Option<Session>,
    registry: EntityRegistry,
    chat: VecDeque<ChatLine>,
    notices: VecDeque<Notice>,
}

impl Board {
    /// Creates a board that is waiting for session resources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
struct Session {
    map: MapMeta,
    role: Role,
    self_entity: Option<EntityId>,
    grid: OccupancyGrid,
}

/// Applies an authoritative event to the board.
///
/// The call either completes the whole mutation or leaves the board untouched
/// and returns the reason. Conflicts are recoverable by requesting a full
/// entity list; configuration errors are fatal for the session.
pub fn apply(board: &mut Board, event: Inbound, out: &mut Vec<Change>) -> Result<(), SyncError> {
    let name = event.name();
    let outcome = match event {
        Inbound::SessionResourcesReady {
            map,
            role,
            self_entity,
        } => start_session(board, map, role, self_entity, out),
        Inbound::EntityListResult { entities } | Inbound::EntitiesSynced { entities } => {
            resync(board, name, entities, out)
        }
        Inbound::EntityMoved { entity, to } => {
            let session = session_mut(&mut board.session, name)?;
            let Some(from) = board.registry.get(&entity).map(|known| known.position) else {
                return Err(conflict(name, ConflictReason::UnknownEntity { entity }));
            };
            session
                .grid
                .move_entity(&entity, from, to)
                .map_err(|error| conflict(name, error.into()))?;
            let _ = board.registry.set_position(&entity, to);
            if from != to {
                out.push(Change::EntityMoved { entity, from, to });
            }
            Ok(())
        }
        Inbound::EntitySpawned { entity } => {
            let session = session_mut(&mut board.session, name)?;
            if board.registry.contains(&entity.id) {
                debug!(entity = %entity.id, "ignoring spawn of an entity that is already known");
                return Ok(());
            }
            session
                .grid
                .place(&entity.id, entity.position)
                .map_err(|error| conflict(name, error.into()))?;
            out.push(Change::EntityPlaced {
                entity: entity.id.clone(),
                cell: entity.position,
            });
            board.registry.upsert(entity);
            Ok(())
        }
        Inbound::EntityRemoved { entity } => {
            let Some(removed) = board.registry.remove(&entity) else {
                debug!(entity = %entity, "ignoring removal of an unknown entity");
                return Ok(());
            };
            if let Some(session) = board.session.as_mut() {
                if session.grid.occupant(removed.position) == Some(&removed.id) {
                    session.grid.vacate(removed.position);
                }
            }
            out.push(Change::EntityRemoved {
                entity: removed.id,
                cell: removed.position,
            });
            Ok(())
        }
        Inbound::EntityStatsUpdated {
            entity,
            hit_points,
            armor_class,
        } => {
            if board
                .registry
                .update_stats(&entity, hit_points, armor_class)
            {
                out.push(Change::StatsChanged { entity });
            } else {
                debug!(entity = %entity, "ignoring stats for an unknown entity");
            }
            Ok(())
        }
        Inbound::ChatMessage { sender, text } => {
            push_bounded(&mut board.chat, ChatLine { sender, text }, CHAT_CAPACITY);
            out.push(Change::ChatReceived);
            Ok(())
        }
        Inbound::ErrorNotice { detail } => {
            push_bounded(&mut board.notices, Notice { detail }, NOTICE_CAPACITY);
            out.push(Change::NoticeRaised);
            Ok(())
        }
    };

    debug_assert!(query::is_consistent(board));
    outcome
}

fn start_session(
    board: &mut Board,
    map: MapMeta,
    role: Role,
    self_entity: Option<EntityId>,
    out: &mut Vec<Change>,
) -> Result<(), SyncError> {
    let grid = OccupancyGrid::for_map(&map)?;
    let (columns, rows) = grid.dimensions();
    board.registry.clear();
    board.session = Some(Session {
        map,
        role,
        self_entity,
        grid,
    });
    out.push(Change::SessionReady {
        columns,
        rows,
        role,
    });
    Ok(())
}

fn resync(
    board: &mut Board,
    name: &'static str,
    entities: Vec<Entity>,
    out: &mut Vec<Change>,
) -> Result<(), SyncError> {
    let session = session_mut(&mut board.session, name)?;
    let (entities, unusable): (Vec<_>, Vec<_>) = entities
        .into_iter()
        .partition(|entity| entity.defect().is_none());
    for entity in &unusable {
        if let Some(defect) = entity.defect() {
            warn!(entity = %entity.id, %defect, "skipping unusable record from full list");
        }
    }
    let report = session
        .grid
        .rebuild(entities.iter().map(|entity| (&entity.id, entity.position)));
    for (entity, error) in &report.rejected {
        warn!(entity = %entity, %error, "skipping entity from full list");
    }
    if report.superseded > 0 {
        debug!(
            superseded = report.superseded,
            "full list repeated entity identifiers"
        );
    }

    let grid = &session.grid;
    board.registry.replace_all(
        entities
            .into_iter()
            .filter(|entity| grid.occupant(entity.position) == Some(&entity.id)),
    );
    out.push(Change::Resynced {
        retained: board.registry.len(),
        skipped: report.skipped() + unusable.len(),
    });
    Ok(())
}

fn session_mut<'a>(
    session: &'a mut Option<Session>,
    name: &'static str,
) -> Result<&'a mut Session, SyncError> {
    session
        .as_mut()
        .ok_or_else(|| conflict(name, ConflictReason::NoSession))
}

fn conflict(event: &'static str, reason: ConflictReason) -> SyncError {
    SyncError::Conflict { event, reason }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    if buffer.len() == capacity {
        let _ = buffer.pop_front();
    }
    buffer.push_back(item);
}

/// Query functions that provide read-only access to the board.
pub mod query {
    use tabletop_core::{ChatLine, Entity, EntityId, GridCell, MapMeta, Notice, Role};

    use super::{Board, OccupancyGrid};

    /// Reports whether session resources were applied and the grid exists.
    #[must_use]
    pub fn session_ready(board: &Board) -> bool {
        board.session.is_some()
    }

    /// Metadata of the loaded map section.
    #[must_use]
    pub fn map(board: &Board) -> Option<&MapMeta> {
        board.session.as_ref().map(|session| &session.map)
    }

    /// Role granted to this participant.
    #[must_use]
    pub fn role(board: &Board) -> Option<Role> {
        board.session.as_ref().map(|session| session.role)
    }

    /// Entity controlled by this participant, if any.
    #[must_use]
    pub fn self_entity(board: &Board) -> Option<&EntityId> {
        board
            .session
            .as_ref()
            .and_then(|session| session.self_entity.as_ref())
    }

    /// Number of columns and rows of the grid.
    #[must_use]
    pub fn grid_dimensions(board: &Board) -> Option<(u32, u32)> {
        board
            .session
            .as_ref()
            .map(|session| session.grid.dimensions())
    }

    /// Reports whether the cell lies on the grid. Always `false` before a map is loaded.
    #[must_use]
    pub fn is_valid_cell(board: &Board, cell: GridCell) -> bool {
        board
            .session
            .as_ref()
            .is_some_and(|session| session.grid.is_valid_cell(cell))
    }

    /// Reports whether the cell cannot accept an entity. Always `true` before a map is loaded.
    #[must_use]
    pub fn is_occupied(board: &Board, cell: GridCell) -> bool {
        board
            .session
            .as_ref()
            .map_or(true, |session| session.grid.is_occupied(cell))
    }

    /// Looks up an entity by identifier.
    #[must_use]
    pub fn entity<'a>(board: &'a Board, id: &EntityId) -> Option<&'a Entity> {
        board.registry.get(id)
    }

    /// Entity anchored at the provided cell, if any.
    #[must_use]
    pub fn entity_at(board: &Board, cell: GridCell) -> Option<&Entity> {
        let session = board.session.as_ref()?;
        let id = session.grid.occupant(cell)?;
        board.registry.get(id)
    }

    /// Iterates over every entity ordered by identifier.
    pub fn entities(board: &Board) -> impl Iterator<Item = &Entity> {
        board.registry.iter()
    }

    /// Exposes a read-only view of the occupancy grid once a map is loaded.
    #[must_use]
    pub fn occupancy_view(board: &Board) -> Option<OccupancyView<'_>> {
        board
            .session
            .as_ref()
            .map(|session| OccupancyView {
                grid: &session.grid,
            })
    }

    /// Chat lines in arrival order, oldest first.
    pub fn chat_log(board: &Board) -> impl Iterator<Item = &ChatLine> {
        board.chat.iter()
    }

    /// Notices in arrival order, oldest first.
    pub fn notices(board: &Board) -> impl Iterator<Item = &Notice> {
        board.notices.iter()
    }

    /// Verifies that grid and registry describe the same placements.
    #[must_use]
    pub fn is_consistent(board: &Board) -> bool {
        let Some(session) = board.session.as_ref() else {
            return board.registry.is_empty();
        };

        let registry_matches = board
            .registry
            .iter()
            .all(|entity| session.grid.occupant(entity.position) == Some(&entity.id));
        let held = session.grid.occupied_cells().count();
        registry_matches && held == board.registry.len()
    }

    /// Read-only view into the dense occupancy grid.
    #[derive(Clone, Copy, Debug)]
    pub struct OccupancyView<'a> {
        grid: &'a OccupancyGrid,
    }

    impl<'a> OccupancyView<'a> {
        /// Returns the entity anchored at the provided cell, if any.
        #[must_use]
        pub fn occupant(&self, cell: GridCell) -> Option<&'a EntityId> {
            self.grid.occupant(cell)
        }

        /// Reports whether the cell is on the grid and unoccupied.
        #[must_use]
        pub fn is_free(&self, cell: GridCell) -> bool {
            !self.grid.is_occupied(cell)
        }

        /// Iterates over every held cell in row-major order.
        pub fn iter(&self) -> impl Iterator<Item = (GridCell, &'a EntityId)> + 'a {
            self.grid.occupied_cells()
        }

        /// Number of columns and rows of the grid.
        #[must_use]
        pub fn dimensions(&self) -> (u32, u32) {
            self.grid.dimensions()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_core::{EntityKind, Footprint, GridCell, HitPoints};

    fn map() -> MapMeta {
        MapMeta {
            width_px: 320,
            height_px: 192,
            tile_size_px: 64,
            section_offset_x: 0,
            section_offset_y: 0,
            map_image_url: "maps/crypt.png".to_owned(),
        }
    }

    fn entity(id: &str, column: i32, row: i32) -> Entity {
        Entity {
            id: EntityId::new(id),
            kind: EntityKind::Player,
            display_name: id.to_owned(),
            hit_points: HitPoints::new(10, 10),
            armor_class: 12,
            footprint: Footprint::SINGLE,
            position: GridCell::new(column, row),
            asset_ref: String::new(),
        }
    }

    fn ready_board() -> Board {
        let mut board = Board::new();
        let mut changes = Vec::new();
        apply(
            &mut board,
            Inbound::SessionResourcesReady {
                map: map(),
                role: Role::GameMaster,
                self_entity: None,
            },
            &mut changes,
        )
        .expect("session starts");
        board
    }

    #[test]
    fn events_before_session_are_conflicts() {
        let mut board = Board::new();
        let mut changes = Vec::new();
        let error = apply(
            &mut board,
            Inbound::EntitySpawned {
                entity: entity("a", 0, 0),
            },
            &mut changes,
        )
        .expect_err("no grid yet");

        assert_eq!(
            error,
            SyncError::Conflict {
                event: "entity_spawned",
                reason: ConflictReason::NoSession,
            }
        );
        assert!(changes.is_empty());
        assert!(query::entities(&board).next().is_none());
    }

    #[test]
    fn invalid_map_is_fatal_and_leaves_board_untouched() {
        let mut board = Board::new();
        let mut changes = Vec::new();
        let mut broken = map();
        broken.tile_size_px = 0;

        let error = apply(
            &mut board,
            Inbound::SessionResourcesReady {
                map: broken,
                role: Role::Player,
                self_entity: None,
            },
            &mut changes,
        )
        .expect_err("zero tile size");

        assert!(!error.is_recoverable());
        assert!(!query::session_ready(&board));
    }

    #[test]
    fn session_reports_dimensions_and_role() {
        let board = ready_board();
        assert_eq!(query::grid_dimensions(&board), Some((5, 3)));
        assert_eq!(query::role(&board), Some(Role::GameMaster));
        assert!(query::is_valid_cell(&board, GridCell::new(4, 2)));
        assert!(!query::is_valid_cell(&board, GridCell::new(5, 2)));
    }

    #[test]
    fn duplicate_spawn_is_ignored() {
        let mut board = ready_board();
        let mut changes = Vec::new();
        apply(
            &mut board,
            Inbound::EntitySpawned {
                entity: entity("a", 0, 0),
            },
            &mut changes,
        )
        .expect("spawn");
        apply(
            &mut board,
            Inbound::EntitySpawned {
                entity: entity("a", 3, 1),
            },
            &mut changes,
        )
        .expect("duplicate spawn is ignored");

        assert_eq!(changes.len(), 1);
        assert_eq!(
            query::entity(&board, &EntityId::new("a")).map(|found| found.position),
            Some(GridCell::new(0, 0))
        );
        assert!(!query::is_occupied(&board, GridCell::new(3, 1)));
    }

    #[test]
    fn chat_log_is_bounded() {
        let mut board = Board::new();
        let mut changes = Vec::new();
        for index in 0..(CHAT_CAPACITY + 5) {
            apply(
                &mut board,
                Inbound::ChatMessage {
                    sender: "dm".to_owned(),
                    text: format!("line {index}"),
                },
                &mut changes,
            )
            .expect("chat never fails");
        }

        let lines: Vec<&ChatLine> = query::chat_log(&board).collect();
        assert_eq!(lines.len(), CHAT_CAPACITY);
        assert_eq!(lines[0].text, "line 5");
    }

    #[test]
    fn repeated_removal_is_ignored() {
        let mut board = ready_board();
        let mut changes = Vec::new();
        apply(
            &mut board,
            Inbound::EntitySpawned {
                entity: entity("a", 1, 1),
            },
            &mut changes,
        )
        .expect("spawn");
        apply(
            &mut board,
            Inbound::EntityRemoved {
                entity: EntityId::new("a"),
            },
            &mut changes,
        )
        .expect("remove");
        apply(
            &mut board,
            Inbound::EntityRemoved {
                entity: EntityId::new("a"),
            },
            &mut changes,
        )
        .expect("second removal is ignored");

        assert!(!query::is_occupied(&board, GridCell::new(1, 1)));
        assert!(query::is_consistent(&board));
        assert_eq!(
            changes.last(),
            Some(&Change::EntityRemoved {
                entity: EntityId::new("a"),
                cell: GridCell::new(1, 1),
            })
        );
    }
}
