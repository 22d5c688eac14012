#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for the tabletop board.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, so the crate is pulled in without its default `audio` feature.
//!
//! The backend only draws what the scene describes and reports raw input back
//! to the caller. Token and map images are resolved against a local asset root
//! and loaded lazily; anything that cannot be loaded is drawn as a plain shape.

mod textures;

use std::path::PathBuf;

use anyhow::Result;
use glam::Vec2;
use macroquad::{
    color::{Color as MacroquadColor, BLACK, WHITE},
    input::{
        is_key_pressed, is_mouse_button_pressed, is_mouse_button_released, mouse_position,
        mouse_wheel, KeyCode, MouseButton,
    },
    math::{Rect as MacroquadRect, Vec2 as MacroquadVec2},
    shapes::{draw_line, draw_rectangle, draw_rectangle_lines},
    text::draw_text,
    texture::{draw_texture_ex, DrawTextureParams},
};
use tabletop_core::EntityKind;
use tabletop_rendering::{
    Color, FrameInput, Presentation, Rect, RenderFrame, RenderingBackend, Scene, TokenPreview,
    TokenSprite,
};
use tracing::{debug, info};

pub use textures::resolve_asset_path;

use self::textures::TextureCache;

const GRID_LINE_THICKNESS: f32 = 1.0;
const LABEL_FONT_SIZE: f32 = 16.0;
const PANEL_FONT_SIZE: f32 = 18.0;
const PANEL_WIDTH: f32 = 220.0;
const PANEL_MARGIN: f32 = 12.0;

/// Snapshot of edge-triggered keyboard shortcuts observed during a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct KeyboardShortcuts {
    /// `Q` closes the window.
    quit_requested: bool,
    /// `Escape` cancels the armed selection.
    cancel: bool,
    /// `G` toggles the grid overlay.
    toggle_grid: bool,
    /// `R` restores the default view.
    reset_view: bool,
}

impl KeyboardShortcuts {
    fn poll() -> Self {
        Self {
            quit_requested: is_key_pressed(KeyCode::Q),
            cancel: is_key_pressed(KeyCode::Escape),
            toggle_grid: is_key_pressed(KeyCode::G),
            reset_view: is_key_pressed(KeyCode::R),
        }
    }
}

/// Pointer state sampled from macroquad during a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct PointerObservations {
    position: Vec2,
    primary_pressed: bool,
    primary_released: bool,
    /// Vertical wheel movement as reported by macroquad; positive scrolls up.
    wheel_y: f32,
}

impl PointerObservations {
    fn poll() -> Self {
        let (x, y) = mouse_position();
        let (_, wheel_y) = mouse_wheel();
        Self {
            position: Vec2::new(x, y),
            primary_pressed: is_mouse_button_pressed(MouseButton::Left),
            primary_released: is_mouse_button_released(MouseButton::Left),
            wheel_y,
        }
    }
}

/// Rendering backend implemented on top of macroquad.
#[derive(Debug)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
    asset_root: PathBuf,
}

impl Default for MacroquadBackend {
    fn default() -> Self {
        Self {
            swap_interval: None,
            asset_root: PathBuf::from("."),
        }
    }
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to request a specific swap interval from the platform.
    #[must_use]
    pub fn with_swap_interval(mut self, swap_interval: Option<i32>) -> Self {
        self.swap_interval = swap_interval;
        self
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(self, enabled: bool) -> Self {
        let swap_interval = if enabled { Some(1) } else { Some(0) };
        self.with_swap_interval(swap_interval)
    }

    /// Directory that map and token locators are resolved against.
    #[must_use]
    pub fn with_asset_root(mut self, asset_root: impl Into<PathBuf>) -> Self {
        self.asset_root = asset_root.into();
        self
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(FrameInput, &mut Scene) + 'static,
    {
        let Self {
            swap_interval,
            asset_root,
        } = self;

        let Presentation {
            window_title,
            clear_color,
            window_size,
            scene,
        } = presentation;

        let mut config = macroquad::window::Conf {
            window_title,
            window_width: window_size.x.round() as i32,
            window_height: window_size.y.round() as i32,
            window_resizable: true,
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        info!(asset_root = %asset_root.display(), "opening board window");

        macroquad::Window::from_config(config, async move {
            let mut scene = scene;
            let mut textures = TextureCache::new(asset_root);
            let background = to_macroquad_color(clear_color);

            loop {
                let keyboard = KeyboardShortcuts::poll();
                if keyboard.quit_requested {
                    debug!("quit requested");
                    break;
                }

                let viewport_size = Vec2::new(
                    macroquad::window::screen_width(),
                    macroquad::window::screen_height(),
                );
                let frame_input = gather_frame_input_from_observations(
                    PointerObservations::poll(),
                    keyboard,
                    viewport_size,
                );
                update_scene(frame_input, &mut scene);

                macroquad::window::clear_background(background);
                if let Some(frame) = &scene.frame {
                    draw_map(frame, &mut textures);
                    draw_grid(frame);
                }
                if let Some(hovered) = scene.hovered_cell {
                    draw_hovered_cell(hovered);
                }
                for token in &scene.tokens {
                    draw_token(token, &mut textures);
                }
                if let Some(preview) = &scene.preview {
                    draw_preview_panel(preview, viewport_size);
                }
                draw_status_lines(&scene.status, viewport_size);

                macroquad::window::next_frame().await;
            }
        });

        Ok(())
    }
}

fn gather_frame_input_from_observations(
    pointer: PointerObservations,
    keyboard: KeyboardShortcuts,
    viewport_size: Vec2,
) -> FrameInput {
    FrameInput {
        pointer: pointer.position,
        primary_pressed: pointer.primary_pressed,
        primary_released: pointer.primary_released,
        cancel: keyboard.cancel,
        wheel_delta: -pointer.wheel_y,
        toggle_grid: keyboard.toggle_grid,
        reset_view: keyboard.reset_view,
        viewport_size,
    }
}

fn draw_map(frame: &RenderFrame, textures: &mut TextureCache) {
    let destination = frame.map.destination;
    match textures.get(&frame.map.image) {
        Some(texture) => {
            let source = frame.map.source;
            draw_texture_ex(
                texture,
                destination.origin.x,
                destination.origin.y,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(to_macroquad_vec(destination.size)),
                    source: Some(MacroquadRect::new(
                        source.origin.x,
                        source.origin.y,
                        source.size.x,
                        source.size.y,
                    )),
                    ..DrawTextureParams::default()
                },
            );
        }
        None => fill_rect(destination, MacroquadColor::new(0.16, 0.16, 0.18, 1.0)),
    }
}

fn draw_grid(frame: &RenderFrame) {
    let color = MacroquadColor::new(0.0, 0.0, 0.0, 0.35);
    for line in &frame.grid_lines {
        draw_line(
            line.from.x,
            line.from.y,
            line.to.x,
            line.to.y,
            GRID_LINE_THICKNESS,
            color,
        );
    }
}

fn draw_hovered_cell(bounds: Rect) {
    fill_rect(bounds, MacroquadColor::new(1.0, 1.0, 1.0, 0.12));
    outline_rect(bounds, 2.0, MacroquadColor::new(1.0, 1.0, 1.0, 0.6));
}

fn draw_token(token: &TokenSprite, textures: &mut TextureCache) {
    let bounds = token.bounds;
    if bounds.size.x <= f32::EPSILON || bounds.size.y <= f32::EPSILON {
        return;
    }

    let texture = if token.image.is_empty() {
        None
    } else {
        textures.get(&token.image)
    };
    match texture {
        Some(texture) => draw_texture_ex(
            texture,
            bounds.origin.x,
            bounds.origin.y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(to_macroquad_vec(bounds.size)),
                ..DrawTextureParams::default()
            },
        ),
        None => {
            let inset = bounds.size * 0.1;
            fill_rect(
                Rect::new(bounds.origin + inset, bounds.size - inset * 2.0),
                kind_color(token.kind),
            );
        }
    }

    if token.selected {
        outline_rect(bounds, 3.0, MacroquadColor::new(1.0, 0.85, 0.2, 1.0));
    }

    let bar_height = (bounds.size.y * 0.08).max(3.0);
    let bar_top = bounds.origin.y + bounds.size.y - bar_height;
    draw_rectangle(bounds.origin.x, bar_top, bounds.size.x, bar_height, BLACK);
    let fill = bounds.size.x * token.health.clamp(0.0, 1.0);
    if fill > f32::EPSILON {
        draw_rectangle(
            bounds.origin.x,
            bar_top,
            fill,
            bar_height,
            health_color(token.health),
        );
    }

    let _ = draw_text(
        &token.label,
        bounds.origin.x,
        bounds.origin.y + bounds.size.y + LABEL_FONT_SIZE,
        LABEL_FONT_SIZE,
        WHITE,
    );
}

fn draw_preview_panel(preview: &TokenPreview, viewport_size: Vec2) {
    let lines = preview_lines(preview);
    let height = PANEL_MARGIN * 2.0 + lines.len() as f32 * PANEL_FONT_SIZE;
    let origin = Vec2::new(viewport_size.x - PANEL_WIDTH - PANEL_MARGIN, PANEL_MARGIN);
    let panel = Rect::new(origin, Vec2::new(PANEL_WIDTH, height));

    fill_rect(panel, MacroquadColor::new(0.08, 0.08, 0.1, 0.85));
    outline_rect(panel, 1.0, MacroquadColor::new(1.0, 1.0, 1.0, 0.4));
    for (index, line) in lines.iter().enumerate() {
        let _ = draw_text(
            line,
            origin.x + PANEL_MARGIN,
            origin.y + PANEL_MARGIN + (index as f32 + 1.0) * PANEL_FONT_SIZE,
            PANEL_FONT_SIZE,
            WHITE,
        );
    }
}

fn preview_lines(preview: &TokenPreview) -> Vec<String> {
    let mut lines = vec![preview.name.clone()];
    if let Some(level) = preview.level {
        lines.push(format!("Level {level}"));
    }
    lines.push(format!(
        "HP {}/{}",
        preview.hit_points.current, preview.hit_points.max
    ));
    lines.push(format!("AC {}", preview.armor_class));
    lines
}

fn draw_status_lines(status: &[String], viewport_size: Vec2) {
    let mut baseline = viewport_size.y - PANEL_MARGIN;
    for line in status.iter().rev() {
        let _ = draw_text(line, PANEL_MARGIN, baseline, LABEL_FONT_SIZE, WHITE);
        baseline -= LABEL_FONT_SIZE + 2.0;
        if baseline < LABEL_FONT_SIZE {
            break;
        }
    }
}

fn fill_rect(rect: Rect, color: MacroquadColor) {
    draw_rectangle(rect.origin.x, rect.origin.y, rect.size.x, rect.size.y, color);
}

fn outline_rect(rect: Rect, thickness: f32, color: MacroquadColor) {
    draw_rectangle_lines(
        rect.origin.x,
        rect.origin.y,
        rect.size.x,
        rect.size.y,
        thickness,
        color,
    );
}

fn kind_color(kind: EntityKind) -> MacroquadColor {
    match kind {
        EntityKind::Player => MacroquadColor::new(0.22, 0.48, 0.85, 1.0),
        EntityKind::Enemy => MacroquadColor::new(0.78, 0.2, 0.2, 1.0),
    }
}

fn health_color(ratio: f32) -> MacroquadColor {
    let ratio = ratio.clamp(0.0, 1.0);
    MacroquadColor::new(1.0 - ratio, 0.2 + 0.6 * ratio, 0.1, 1.0)
}

fn to_macroquad_vec(vector: Vec2) -> MacroquadVec2 {
    MacroquadVec2::new(vector.x, vector.y)
}

fn to_macroquad_color(color: Color) -> MacroquadColor {
    MacroquadColor::new(color.red, color.green, color.blue, color.alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_core::HitPoints;

    #[test]
    fn wheel_up_reports_negative_delta() {
        let input = gather_frame_input_from_observations(
            PointerObservations {
                position: Vec2::new(40.0, 30.0),
                wheel_y: 1.0,
                ..PointerObservations::default()
            },
            KeyboardShortcuts::default(),
            Vec2::new(800.0, 600.0),
        );

        assert_eq!(input.wheel_delta, -1.0);
        assert_eq!(input.pointer, Vec2::new(40.0, 30.0));
        assert_eq!(input.viewport_size, Vec2::new(800.0, 600.0));
    }

    #[test]
    fn keyboard_shortcuts_map_onto_frame_input() {
        let input = gather_frame_input_from_observations(
            PointerObservations {
                primary_pressed: true,
                ..PointerObservations::default()
            },
            KeyboardShortcuts {
                quit_requested: false,
                cancel: true,
                toggle_grid: true,
                reset_view: false,
            },
            Vec2::ZERO,
        );

        assert!(input.primary_pressed);
        assert!(!input.primary_released);
        assert!(input.cancel);
        assert!(input.toggle_grid);
        assert!(!input.reset_view);
        assert_eq!(input.wheel_delta, 0.0);
    }

    #[test]
    fn preview_lines_include_level_only_for_sheets() {
        let mut preview = TokenPreview {
            name: "Mialee".to_owned(),
            level: Some(4),
            hit_points: HitPoints::new(11, 18),
            armor_class: 13,
            portrait: String::new(),
        };
        assert_eq!(
            preview_lines(&preview),
            vec!["Mialee", "Level 4", "HP 11/18", "AC 13"]
        );

        preview.level = None;
        assert_eq!(preview_lines(&preview), vec!["Mialee", "HP 11/18", "AC 13"]);
    }

    #[test]
    fn health_colour_shifts_from_green_to_red() {
        let healthy = health_color(1.0);
        let dying = health_color(0.0);
        assert!(healthy.g > healthy.r);
        assert!(dying.r > dying.g);
    }
}
