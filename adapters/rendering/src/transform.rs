//! Conversions between screen, world and grid coordinates.
//!
//! Screen space is measured in window pixels, world space in map pixels of
//! the loaded section. A [`ViewState`] maps one onto the other:
//! `screen = world * scale + pan`.

use glam::Vec2;
use tabletop_core::GridCell;

use crate::{ViewLimits, ViewState};

/// Converts a screen position into world coordinates.
#[must_use]
pub fn screen_to_world(screen: Vec2, view: ViewState) -> Vec2 {
    (screen - view.pan) / view.scale
}

/// Converts a world position into screen coordinates.
#[must_use]
pub fn world_to_screen(world: Vec2, view: ViewState) -> Vec2 {
    world * view.scale + view.pan
}

/// Returns the cell containing the world position. The result is not clamped.
#[must_use]
pub fn world_to_grid_cell(world: Vec2, tile_size: f32) -> GridCell {
    let cell = (world / tile_size).floor();
    GridCell::new(cell.x as i32, cell.y as i32)
}

/// Returns the world position of the centre of the cell.
#[must_use]
pub fn grid_cell_to_world_center(cell: GridCell, tile_size: f32) -> Vec2 {
    grid_cell_to_world_origin(cell, tile_size) + Vec2::splat(tile_size / 2.0)
}

/// Returns the world position of the top-left corner of the cell.
#[must_use]
pub fn grid_cell_to_world_origin(cell: GridCell, tile_size: f32) -> Vec2 {
    Vec2::new(cell.column() as f32, cell.row() as f32) * tile_size
}

/// Scales the view by `factor` while keeping the world point under `anchor` in place.
///
/// The resulting scale is clamped into `limits`; the pan is derived from the
/// clamped scale so the anchor invariant holds even at the limits.
#[must_use]
pub fn zoom_at_point(view: ViewState, factor: f32, anchor: Vec2, limits: ViewLimits) -> ViewState {
    let world = screen_to_world(anchor, view);
    let scale = limits.clamp(view.scale * factor);
    ViewState {
        scale,
        pan: anchor - world * scale,
    }
}
