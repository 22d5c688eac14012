//! Dense occupancy grid enforcing single occupancy per anchor cell.

use std::collections::HashMap;

use tabletop_core::{ConfigError, EntityId, GridCell, GridError, MapMeta};

/// Outcome of re-deriving occupancy from an authoritative entity list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Number of entities that now hold a cell.
    pub placed: usize,
    /// Records dropped because a later record reused the same identifier.
    pub superseded: usize,
    /// Records skipped because their cell was invalid or already taken.
    pub rejected: Vec<(EntityId, GridError)>,
}

impl RebuildReport {
    /// Number of records that could not be placed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.rejected.len()
    }
}

/// Row-major matrix mapping every cell to at most one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyGrid {
    columns: u32,
    rows: u32,
    cells: Vec<Option<EntityId>>,
}

impl OccupancyGrid {
    /// Allocates an empty grid. Both dimensions must be positive.
    pub fn new(columns: i32, rows: i32) -> Result<Self, ConfigError> {
        if columns <= 0 || rows <= 0 {
            return Err(ConfigError::NonPositiveDimensions {
                columns: i64::from(columns),
                rows: i64::from(rows),
            });
        }

        let columns = columns.unsigned_abs();
        let rows = rows.unsigned_abs();
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).map_err(|_| {
            ConfigError::NonPositiveDimensions {
                columns: i64::from(columns),
                rows: i64::from(rows),
            }
        })?;

        Ok(Self {
            columns,
            rows,
            cells: vec![None; capacity],
        })
    }

    /// Allocates an empty grid sized for the provided map section.
    pub fn for_map(map: &MapMeta) -> Result<Self, ConfigError> {
        let (columns, rows) = map.grid_dimensions()?;
        match (i32::try_from(columns), i32::try_from(rows)) {
            (Ok(columns), Ok(rows)) => Self::new(columns, rows),
            _ => Err(ConfigError::NonPositiveDimensions {
                columns: i64::from(columns),
                rows: i64::from(rows),
            }),
        }
    }

    /// Reports whether the cell lies inside the grid bounds.
    #[must_use]
    pub fn is_valid_cell(&self, cell: GridCell) -> bool {
        self.index(cell).is_some()
    }

    /// Reports whether the cell is unavailable. Out-of-bounds cells count as occupied.
    #[must_use]
    pub fn is_occupied(&self, cell: GridCell) -> bool {
        self.index(cell)
            .map_or(true, |index| self.cells[index].is_some())
    }

    /// Returns the entity holding the cell, if any.
    #[must_use]
    pub fn occupant(&self, cell: GridCell) -> Option<&EntityId> {
        self.index(cell)
            .and_then(|index| self.cells.get(index))
            .and_then(Option::as_ref)
    }

    /// Marks the cell as held by the entity.
    ///
    /// Placing an entity on the cell it already holds succeeds without change.
    pub fn place(&mut self, entity: &EntityId, cell: GridCell) -> Result<(), GridError> {
        let index = self.index(cell).ok_or(GridError::InvalidCell { cell })?;
        if let Some(occupant) = self.cells[index].as_ref().filter(|held| *held != entity) {
            return Err(GridError::Occupied {
                cell,
                occupant: occupant.clone(),
            });
        }

        self.cells[index] = Some(entity.clone());
        Ok(())
    }

    /// Clears an in-bounds cell. Empty or out-of-bounds cells are left untouched.
    pub fn vacate(&mut self, cell: GridCell) {
        if let Some(index) = self.index(cell) {
            self.cells[index] = None;
        }
    }

    /// Moves an entity between two cells, leaving the grid unchanged on failure.
    ///
    /// Moving onto the cell the entity already holds is a no-op.
    pub fn move_entity(
        &mut self,
        entity: &EntityId,
        from: GridCell,
        to: GridCell,
    ) -> Result<(), GridError> {
        if from == to {
            return match self.occupant(to) {
                Some(occupant) if occupant != entity => Err(GridError::Occupied {
                    cell: to,
                    occupant: occupant.clone(),
                }),
                _ if self.is_valid_cell(to) => Ok(()),
                _ => Err(GridError::InvalidCell { cell: to }),
            };
        }

        let source = self.index(from);
        let previous = match source {
            Some(index) if self.cells[index].as_ref() == Some(entity) => self.cells[index].take(),
            _ => None,
        };

        match self.place(entity, to) {
            Ok(()) => Ok(()),
            Err(error) => {
                if let (Some(index), Some(previous)) = (source, previous) {
                    self.cells[index] = Some(previous);
                }
                Err(error)
            }
        }
    }

    /// Clears the grid and re-derives occupancy from an authoritative list.
    ///
    /// When an identifier appears more than once the last record wins. Records
    /// whose cell is invalid or already claimed are skipped and reported.
    pub fn rebuild<'a, I>(&mut self, entries: I) -> RebuildReport
    where
        I: IntoIterator<Item = (&'a EntityId, GridCell)>,
    {
        let entries: Vec<(&EntityId, GridCell)> = entries.into_iter().collect();
        let mut last_seen: HashMap<&EntityId, usize> = HashMap::with_capacity(entries.len());
        for (position, (entity, _)) in entries.iter().enumerate() {
            let _ = last_seen.insert(*entity, position);
        }

        self.cells.fill(None);
        let mut report = RebuildReport::default();
        for (position, (entity, cell)) in entries.iter().enumerate() {
            if last_seen.get(entity) != Some(&position) {
                report.superseded += 1;
                continue;
            }

            match self.place(entity, *cell) {
                Ok(()) => report.placed += 1,
                Err(error) => report.rejected.push(((*entity).clone(), error)),
            }
        }

        report
    }

    /// Iterates over every held cell together with its occupant in row-major order.
    pub fn occupied_cells(&self) -> impl Iterator<Item = (GridCell, &EntityId)> + '_ {
        let columns = self.columns as usize;
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(index, slot)| {
                let entity = slot.as_ref()?;
                let column = i32::try_from(index % columns).ok()?;
                let row = i32::try_from(index / columns).ok()?;
                Some((GridCell::new(column, row), entity))
            })
    }

    /// Raw row-major cell storage.
    #[must_use]
    pub fn cells(&self) -> &[Option<EntityId>] {
        &self.cells
    }

    /// Number of columns and rows in the grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    fn index(&self, cell: GridCell) -> Option<usize> {
        let column = u32::try_from(cell.column()).ok()?;
        let row = u32::try_from(cell.row()).ok()?;
        if column < self.columns && row < self.rows {
            let row = usize::try_from(row).ok()?;
            let column = usize::try_from(column).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}
