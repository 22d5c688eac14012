#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure selection system that turns game master picks into move intents.

use tabletop_core::{Change, EntityId, GridCell, Intent, Role};
use tracing::debug;

/// Pointer action distilled from adapter input for a single frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionInput {
    /// The pointer picked the token of the provided entity.
    Pick(EntityId),
    /// The pointer hit empty space outside the map canvas.
    Background,
    /// The pointer hit the map canvas at the provided cell.
    Canvas(GridCell),
}

/// Current state of the selection state machine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    /// Nothing is selected.
    #[default]
    Idle,
    /// The entity is waiting for a destination cell.
    Armed(EntityId),
}

/// Selection system translating picks and canvas clicks into move intents.
#[derive(Clone, Debug, Default)]
pub struct SelectionController {
    role: Option<Role>,
    selection: Selection,
}

impl SelectionController {
    /// Creates a controller that waits for the session role.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            role: None,
            selection: Selection::Idle,
        }
    }

    /// Current selection state.
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Entity waiting for a destination, if any.
    #[must_use]
    pub fn armed(&self) -> Option<&EntityId> {
        match &self.selection {
            Selection::Armed(entity) => Some(entity),
            Selection::Idle => None,
        }
    }

    /// Consumes board changes and adapter input to emit move intents.
    ///
    /// `is_free` should mirror `query::is_valid_cell && !query::is_occupied`
    /// and `is_known` should mirror `query::entity(..).is_some()`.
    pub fn handle<F, K>(
        &mut self,
        changes: &[Change],
        input: Option<SelectionInput>,
        mut is_free: F,
        mut is_known: K,
        out: &mut Vec<Intent>,
    ) where
        F: FnMut(GridCell) -> bool,
        K: FnMut(&EntityId) -> bool,
    {
        for change in changes {
            match change {
                Change::SessionReady { role, .. } => {
                    self.role = Some(*role);
                    self.selection = Selection::Idle;
                }
                Change::EntityRemoved { entity, .. } if self.armed() == Some(entity) => {
                    debug!(%entity, "armed entity left the board");
                    self.selection = Selection::Idle;
                }
                Change::Resynced { .. } => {
                    if let Some(entity) = self.armed() {
                        if !is_known(entity) {
                            debug!(%entity, "armed entity missing after resync");
                            self.selection = Selection::Idle;
                        }
                    }
                }
                _ => {}
            }
        }

        if self.role != Some(Role::GameMaster) {
            return;
        }

        let Some(input) = input else {
            return;
        };

        match input {
            SelectionInput::Pick(entity) => {
                self.selection = Selection::Armed(entity);
            }
            SelectionInput::Background => {
                self.selection = Selection::Idle;
            }
            SelectionInput::Canvas(target) => {
                let Selection::Armed(entity) = &self.selection else {
                    return;
                };
                if !is_free(target) {
                    debug!(%entity, %target, "selection target is unavailable");
                    return;
                }
                out.push(Intent::RequestMove {
                    entity: entity.clone(),
                    target,
                });
                self.selection = Selection::Idle;
            }
        }
    }
}
