//! Pan, zoom and grid overlay state of the map viewport.

use glam::Vec2;
use tabletop_core::GridCell;

use crate::{
    transform::{screen_to_world, world_to_grid_cell, world_to_screen, zoom_at_point},
    GridLine, MapLayer, MapQuad, Rect, RenderFrame, RenderingError, ViewLimits, ViewState,
};

/// Scale factor applied when the wheel scrolls down.
pub const ZOOM_OUT_FACTOR: f32 = 0.9;

/// Scale factor applied when the wheel scrolls up.
pub const ZOOM_IN_FACTOR: f32 = 1.1;

/// Element that received a pointer press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerTarget {
    /// Empty viewport area or the map canvas itself.
    Background,
    /// A token drawn on top of the map.
    Token,
    /// An interface panel drawn over the viewport.
    Interface,
}

/// Owns the view transform and reacts to pointer, wheel and keyboard input.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewportController {
    view: ViewState,
    limits: ViewLimits,
    viewport_size: Vec2,
    map_size: Vec2,
    show_grid: bool,
    pan_start: Option<Vec2>,
}

impl ViewportController {
    /// Creates a controller for a viewport of the given size showing a map of the given size.
    #[must_use]
    pub fn new(viewport_size: Vec2, map_size: Vec2, limits: ViewLimits) -> Self {
        let mut controller = Self {
            view: ViewState::IDENTITY,
            limits,
            viewport_size,
            map_size,
            show_grid: true,
            pan_start: None,
        };
        controller.center_if_smaller_than_viewport();
        controller
    }

    /// Current view transform.
    #[must_use]
    pub const fn view(&self) -> ViewState {
        self.view
    }

    /// Zoom limits applied to wheel input.
    #[must_use]
    pub const fn limits(&self) -> ViewLimits {
        self.limits
    }

    /// Reports whether the grid overlay is drawn.
    #[must_use]
    pub const fn grid_overlay(&self) -> bool {
        self.show_grid
    }

    /// Reports whether a pan gesture is in progress.
    #[must_use]
    pub const fn is_panning(&self) -> bool {
        self.pan_start.is_some()
    }

    /// Records a new viewport size, for example after the window was resized.
    pub fn set_viewport_size(&mut self, viewport_size: Vec2) {
        self.viewport_size = viewport_size;
    }

    /// Records the size of a newly loaded map section and recentres it.
    pub fn set_map_size(&mut self, map_size: Vec2) {
        self.map_size = map_size;
        self.reset_view();
    }

    /// Starts a pan when the press landed on the background.
    pub fn pointer_down(&mut self, position: Vec2, target: PointerTarget) {
        if target != PointerTarget::Background {
            return;
        }
        self.pan_start = Some(position - self.view.pan);
    }

    /// Follows the pointer while a pan is in progress.
    pub fn pointer_move(&mut self, position: Vec2) {
        if let Some(start) = self.pan_start {
            self.view.pan = position - start;
        }
    }

    /// Ends the current pan gesture.
    pub fn pointer_up(&mut self) {
        self.pan_start = None;
    }

    /// Zooms around `anchor`. Positive deltas zoom out, negative deltas zoom in.
    pub fn wheel(&mut self, delta_y: f32, anchor: Vec2) {
        let factor = if delta_y > 0.0 {
            ZOOM_OUT_FACTOR
        } else if delta_y < 0.0 {
            ZOOM_IN_FACTOR
        } else {
            return;
        };
        self.view = zoom_at_point(self.view, factor, anchor, self.limits);
    }

    /// Shows or hides the grid overlay.
    pub fn toggle_grid_overlay(&mut self) {
        self.show_grid = !self.show_grid;
    }

    /// Restores unit scale and zero pan, then centres the map.
    pub fn reset_view(&mut self) {
        self.view = ViewState::IDENTITY;
        self.pan_start = None;
        self.center_if_smaller_than_viewport();
    }

    /// Centres each axis on which the scaled map is smaller than the viewport.
    pub fn center_if_smaller_than_viewport(&mut self) {
        let scaled = self.map_size * self.view.scale;
        if scaled.x < self.viewport_size.x {
            self.view.pan.x = (self.viewport_size.x - scaled.x) / 2.0;
        }
        if scaled.y < self.viewport_size.y {
            self.view.pan.y = (self.viewport_size.y - scaled.y) / 2.0;
        }
    }

    /// Resolves the cell under a screen position. The cell may lie off the map.
    #[must_use]
    pub fn resolve_cell(&self, screen: Vec2, tile_size: f32) -> GridCell {
        world_to_grid_cell(screen_to_world(screen, self.view), tile_size)
    }

    /// Reports whether a screen position lies over the map section.
    #[must_use]
    pub fn is_over_map(&self, screen: Vec2) -> bool {
        let world = screen_to_world(screen, self.view);
        world.x >= 0.0 && world.y >= 0.0 && world.x < self.map_size.x && world.y < self.map_size.y
    }

    /// Builds the frame for the map layer under the current view.
    ///
    /// The frame depends only on the layer, the view and the overlay flag, so
    /// repeated calls with the same inputs produce identical frames.
    pub fn render(&self, layer: &MapLayer) -> Result<RenderFrame, RenderingError> {
        if !(layer.tile_size > 0.0) {
            return Err(RenderingError::InvalidTileSize {
                tile_size: layer.tile_size,
            });
        }

        let size = layer.section_size;
        let map = MapQuad {
            image: layer.image.clone(),
            source: Rect::new(layer.section_offset, size),
            destination: Rect::new(world_to_screen(Vec2::ZERO, self.view), size * self.view.scale),
        };

        let mut grid_lines = Vec::new();
        if self.show_grid {
            let tile = layer.tile_size;
            for column in 0..=(size.x / tile).floor() as u32 {
                let x = column as f32 * tile;
                grid_lines.push(self.screen_line(Vec2::new(x, 0.0), Vec2::new(x, size.y)));
            }
            for row in 0..=(size.y / tile).floor() as u32 {
                let y = row as f32 * tile;
                grid_lines.push(self.screen_line(Vec2::new(0.0, y), Vec2::new(size.x, y)));
            }
        }

        Ok(RenderFrame {
            view: self.view,
            map,
            grid_lines,
        })
    }

    fn screen_line(&self, from: Vec2, to: Vec2) -> GridLine {
        GridLine {
            from: world_to_screen(from, self.view),
            to: world_to_screen(to, self.view),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> MapLayer {
        MapLayer {
            image: "maps/crypt.png".to_owned(),
            section_offset: Vec2::new(128.0, 64.0),
            section_size: Vec2::new(320.0, 192.0),
            tile_size: 64.0,
        }
    }

    fn controller() -> ViewportController {
        ViewportController::new(
            Vec2::new(800.0, 600.0),
            Vec2::new(320.0, 192.0),
            ViewLimits::default(),
        )
    }

    #[test]
    fn small_map_starts_centred() {
        let controller = controller();
        assert_eq!(controller.view().pan, Vec2::new(240.0, 204.0));
        assert_eq!(controller.view().scale, 1.0);
    }

    #[test]
    fn large_map_axis_is_left_alone() {
        let controller = ViewportController::new(
            Vec2::new(800.0, 600.0),
            Vec2::new(1600.0, 400.0),
            ViewLimits::default(),
        );
        assert_eq!(controller.view().pan, Vec2::new(0.0, 100.0));
    }

    #[test]
    fn background_drag_pans_and_release_stops() {
        let mut controller = controller();
        let start_pan = controller.view().pan;

        controller.pointer_down(Vec2::new(100.0, 100.0), PointerTarget::Background);
        controller.pointer_move(Vec2::new(130.0, 80.0));
        assert_eq!(controller.view().pan, start_pan + Vec2::new(30.0, -20.0));

        controller.pointer_up();
        controller.pointer_move(Vec2::new(500.0, 500.0));
        assert_eq!(controller.view().pan, start_pan + Vec2::new(30.0, -20.0));
    }

    #[test]
    fn token_press_does_not_pan() {
        let mut controller = controller();
        let start_pan = controller.view().pan;

        controller.pointer_down(Vec2::new(100.0, 100.0), PointerTarget::Token);
        controller.pointer_move(Vec2::new(300.0, 300.0));

        assert!(!controller.is_panning());
        assert_eq!(controller.view().pan, start_pan);
    }

    #[test]
    fn wheel_direction_selects_factor_and_zero_is_ignored() {
        let mut controller = controller();
        let anchor = Vec2::new(400.0, 300.0);

        controller.wheel(120.0, anchor);
        assert!((controller.view().scale - 0.9).abs() < 1e-6);

        controller.wheel(-120.0, anchor);
        assert!((controller.view().scale - 0.99).abs() < 1e-6);

        let before = controller.view();
        controller.wheel(0.0, anchor);
        assert_eq!(controller.view(), before);
    }

    #[test]
    fn wheel_keeps_point_under_cursor() {
        let mut controller = controller();
        let anchor = Vec2::new(333.0, 250.0);
        let before = screen_to_world(anchor, controller.view());

        for _ in 0..30 {
            controller.wheel(-1.0, anchor);
        }
        let after = screen_to_world(anchor, controller.view());

        assert_eq!(controller.view().scale, 3.0);
        assert!((after - before).length() < 1e-2);
    }

    #[test]
    fn reset_restores_unit_scale_and_recentres() {
        let expected = controller().view();
        let mut controller = controller();
        controller.wheel(-1.0, Vec2::new(10.0, 10.0));
        controller.pointer_down(Vec2::ZERO, PointerTarget::Background);
        controller.pointer_move(Vec2::new(-500.0, 40.0));

        controller.reset_view();

        assert_eq!(controller.view(), expected);
        assert!(!controller.is_panning());
    }

    #[test]
    fn resolve_cell_accounts_for_pan_and_scale() {
        let mut controller = controller();
        controller.pointer_down(Vec2::ZERO, PointerTarget::Background);
        controller.pointer_move(-controller.view().pan);
        controller.pointer_up();
        assert_eq!(controller.view().pan, Vec2::ZERO);

        assert_eq!(
            controller.resolve_cell(Vec2::new(130.0, 70.0), 64.0),
            GridCell::new(2, 1)
        );
        assert_eq!(
            controller.resolve_cell(Vec2::new(-1.0, 5.0), 64.0),
            GridCell::new(-1, 0)
        );
    }

    #[test]
    fn render_is_idempotent_and_follows_overlay_flag() {
        let mut controller = controller();
        let first = controller.render(&layer()).expect("valid layer");
        let second = controller.render(&layer()).expect("valid layer");
        assert_eq!(first, second);
        assert_eq!(first.grid_lines.len(), 6 + 4);
        assert_eq!(first.map.source, Rect::new(Vec2::new(128.0, 64.0), Vec2::new(320.0, 192.0)));

        controller.toggle_grid_overlay();
        let hidden = controller.render(&layer()).expect("valid layer");
        assert!(hidden.grid_lines.is_empty());
        assert_eq!(hidden.map, first.map);
    }

    #[test]
    fn grid_lines_are_placed_by_index_not_accumulated() {
        let controller = controller();
        let mut layer = layer();
        layer.section_size = Vec2::new(1.0, 0.5);
        layer.tile_size = 0.1;

        let frame = controller.render(&layer).expect("valid layer");

        assert_eq!(frame.grid_lines.len(), 11 + 6);
        assert_eq!(
            frame.grid_lines[10].from,
            world_to_screen(Vec2::new(1.0, 0.0), controller.view())
        );
    }

    #[test]
    fn render_rejects_zero_tile_size() {
        let mut layer = layer();
        layer.tile_size = 0.0;

        assert_eq!(
            controller().render(&layer),
            Err(RenderingError::InvalidTileSize { tile_size: 0.0 })
        );
    }
}
