#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for tabletop board adapters.
//!
//! Everything in this crate is a pure description: the viewport controller
//! turns input into a [`ViewState`], frames and scenes are rebuilt from board
//! queries every frame, and a [`RenderingBackend`] draws whatever it is given.

pub mod transform;
pub mod viewport;

use anyhow::Result as AnyResult;
use glam::Vec2;
use tabletop_core::{CharacterDirectory, Entity, EntityId, EntityKind, GridCell, HitPoints};
use thiserror::Error;

pub use viewport::{PointerTarget, ViewportController};

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Returns the same color with a different alpha channel.
    #[must_use]
    pub const fn with_alpha(self, alpha: f32) -> Self {
        Self { alpha, ..self }
    }
}

/// Scale and translation mapping world coordinates onto the screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    /// Uniform scale factor.
    pub scale: f32,
    /// Screen position of the world origin.
    pub pan: Vec2,
}

impl ViewState {
    /// Unit scale without translation.
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        pan: Vec2::ZERO,
    };
}

impl Default for ViewState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Inclusive zoom limits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewLimits {
    /// Smallest allowed scale.
    pub min_scale: f32,
    /// Largest allowed scale.
    pub max_scale: f32,
}

impl ViewLimits {
    /// Default smallest scale.
    pub const DEFAULT_MIN_SCALE: f32 = 0.5;

    /// Default largest scale.
    pub const DEFAULT_MAX_SCALE: f32 = 3.0;

    /// Creates zoom limits. The minimum must be positive and not exceed the maximum.
    pub fn new(min_scale: f32, max_scale: f32) -> Result<Self, RenderingError> {
        if !(min_scale > 0.0) || !(min_scale <= max_scale) {
            return Err(RenderingError::InvalidZoomLimits {
                min_scale,
                max_scale,
            });
        }
        Ok(Self {
            min_scale,
            max_scale,
        })
    }

    /// Clamps a scale into the limits.
    #[must_use]
    pub fn clamp(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}

impl Default for ViewLimits {
    fn default() -> Self {
        Self {
            min_scale: Self::DEFAULT_MIN_SCALE,
            max_scale: Self::DEFAULT_MAX_SCALE,
        }
    }
}

/// Axis-aligned rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    /// Top-left corner.
    pub origin: Vec2,
    /// Width and height.
    pub size: Vec2,
}

impl Rect {
    /// Creates a rectangle from its top-left corner and size.
    #[must_use]
    pub const fn new(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    /// Reports whether the point lies inside the rectangle.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        let end = self.origin + self.size;
        point.x >= self.origin.x && point.y >= self.origin.y && point.x < end.x && point.y < end.y
    }
}

/// Map section that should be drawn under the tokens.
#[derive(Clone, Debug, PartialEq)]
pub struct MapLayer {
    /// Locator of the source image.
    pub image: String,
    /// Top-left corner of the section inside the source image.
    pub section_offset: Vec2,
    /// Size of the section in pixels.
    pub section_size: Vec2,
    /// Side length of a tile in pixels.
    pub tile_size: f32,
}

/// Image quad copying the map section onto the screen.
#[derive(Clone, Debug, PartialEq)]
pub struct MapQuad {
    /// Locator of the source image.
    pub image: String,
    /// Region of the source image to copy.
    pub source: Rect,
    /// Screen region the section covers.
    pub destination: Rect,
}

/// Grid overlay line in screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLine {
    /// Start point.
    pub from: Vec2,
    /// End point.
    pub to: Vec2,
}

/// Map and grid overlay for a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderFrame {
    /// View used to build the frame.
    pub view: ViewState,
    /// Map section quad.
    pub map: MapQuad,
    /// Grid overlay lines; empty when the overlay is hidden.
    pub grid_lines: Vec<GridLine>,
}

/// Token drawn on the board.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenSprite {
    /// Entity represented by the token.
    pub entity: EntityId,
    /// Category of the token.
    pub kind: EntityKind,
    /// Label drawn below the token.
    pub label: String,
    /// Locator of the token image.
    pub image: String,
    /// Screen region covered by the token footprint.
    pub bounds: Rect,
    /// Remaining hit points as a fraction of the maximum.
    pub health: f32,
    /// Whether the token is armed for a move.
    pub selected: bool,
}

/// Builds token sprites for the provided entities under the current view.
pub fn token_sprites<'a, I>(
    entities: I,
    tile_size: f32,
    view: ViewState,
    selected: Option<&EntityId>,
) -> Vec<TokenSprite>
where
    I: IntoIterator<Item = &'a Entity>,
{
    entities
        .into_iter()
        .map(|entity| {
            let origin = transform::grid_cell_to_world_origin(entity.position, tile_size);
            let footprint = Vec2::new(
                entity.footprint.width() as f32,
                entity.footprint.height() as f32,
            );
            TokenSprite {
                entity: entity.id.clone(),
                kind: entity.kind,
                label: entity.display_name.clone(),
                image: entity.asset_ref.clone(),
                bounds: Rect::new(
                    transform::world_to_screen(origin, view),
                    footprint * tile_size * view.scale,
                ),
                health: entity.hit_points.ratio(),
                selected: selected == Some(&entity.id),
            }
        })
        .collect()
}

/// Summary shown when the pointer hovers a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPreview {
    /// Name shown in the preview header.
    pub name: String,
    /// Character level, when a sheet is available.
    pub level: Option<u32>,
    /// Current and maximum hit points.
    pub hit_points: HitPoints,
    /// Armor class.
    pub armor_class: i32,
    /// Portrait locator, falling back to the token image.
    pub portrait: String,
}

impl TokenPreview {
    /// Describes an entity, enriching player tokens with their character sheet.
    #[must_use]
    pub fn describe(entity: &Entity, directory: &dyn CharacterDirectory) -> Self {
        let sheet = match entity.kind {
            EntityKind::Player => directory.character_by_id(&entity.id),
            EntityKind::Enemy => None,
        };

        match sheet {
            Some(sheet) => Self {
                name: sheet.name,
                level: Some(sheet.level),
                hit_points: entity.hit_points,
                armor_class: entity.armor_class,
                portrait: sheet
                    .portrait_url
                    .unwrap_or_else(|| entity.asset_ref.clone()),
            },
            None => Self {
                name: entity.display_name.clone(),
                level: None,
                hit_points: entity.hit_points,
                armor_class: entity.armor_class,
                portrait: entity.asset_ref.clone(),
            },
        }
    }
}

/// Everything a backend draws for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// Map section and grid overlay.
    pub frame: Option<RenderFrame>,
    /// Tokens in identifier order.
    pub tokens: Vec<TokenSprite>,
    /// Screen region of the hovered cell, if it lies on the map.
    pub hovered_cell: Option<Rect>,
    /// Preview of the hovered token.
    pub preview: Option<TokenPreview>,
    /// Status lines, most recent last.
    pub status: Vec<String>,
}

impl Scene {
    /// Scene shown before any map has been loaded.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            frame: None,
            tokens: Vec::new(),
            hovered_cell: None,
            preview: None,
            status: Vec::new(),
        }
    }

    /// Token whose bounds contain the screen position, topmost first.
    #[must_use]
    pub fn token_at(&self, screen: Vec2) -> Option<&TokenSprite> {
        self.tokens
            .iter()
            .rev()
            .find(|token| token.bounds.contains(screen))
    }
}

/// Returns the screen rectangle of a cell.
#[must_use]
pub fn cell_bounds(cell: GridCell, tile_size: f32, view: ViewState) -> Rect {
    let origin = transform::grid_cell_to_world_origin(cell, tile_size);
    Rect::new(
        transform::world_to_screen(origin, view),
        Vec2::splat(tile_size * view.scale),
    )
}

/// Input snapshot gathered by adapters before updating the scene.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct FrameInput {
    /// Pointer position in screen coordinates.
    pub pointer: Vec2,
    /// Whether the primary button was pressed on this frame.
    pub primary_pressed: bool,
    /// Whether the primary button was released on this frame.
    pub primary_released: bool,
    /// Whether the cancel key was pressed on this frame.
    pub cancel: bool,
    /// Vertical wheel movement; positive values scroll down.
    pub wheel_delta: f32,
    /// Whether the grid overlay toggle was pressed on this frame.
    pub toggle_grid: bool,
    /// Whether the view reset key was pressed on this frame.
    pub reset_view: bool,
    /// Current size of the drawable area.
    pub viewport_size: Vec2,
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Initial window size.
    pub window_size: Vec2,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(window_title: T, clear_color: Color, window_size: Vec2, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            clear_color,
            window_size,
            scene,
        }
    }
}

/// Rendering backend capable of presenting board scenes.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives per-frame input captured
    /// by the adapter and rebuilds the scene before it is drawn.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(FrameInput, &mut Scene) + 'static;
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum RenderingError {
    /// Tiles must have a positive side length.
    #[error("tile size must be positive (received {tile_size})")]
    InvalidTileSize {
        /// Provided tile size.
        tile_size: f32,
    },
    /// Zoom limits must be positive and ordered.
    #[error("zoom limits must satisfy 0 < min <= max (received {min_scale}..={max_scale})")]
    InvalidZoomLimits {
        /// Provided minimum scale.
        min_scale: f32,
        /// Provided maximum scale.
        max_scale: f32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_core::{CharacterSheet, Footprint};

    struct Sheets(Vec<CharacterSheet>);

    impl CharacterDirectory for Sheets {
        fn character_by_id(&self, id: &EntityId) -> Option<CharacterSheet> {
            self.0.iter().find(|sheet| &sheet.id == id).cloned()
        }
    }

    fn entity(id: &str, kind: EntityKind, column: i32, row: i32) -> Entity {
        Entity {
            id: EntityId::new(id),
            kind,
            display_name: format!("token {id}"),
            hit_points: HitPoints::new(6, 12),
            armor_class: 14,
            footprint: Footprint::SINGLE,
            position: GridCell::new(column, row),
            asset_ref: format!("assets/{id}.png"),
        }
    }

    #[test]
    fn zoom_limits_reject_unordered_or_non_positive_bounds() {
        assert!(ViewLimits::new(0.5, 3.0).is_ok());
        assert!(ViewLimits::new(0.0, 3.0).is_err());
        assert!(ViewLimits::new(2.0, 1.0).is_err());
        assert!(ViewLimits::new(f32::NAN, 1.0).is_err());
    }

    #[test]
    fn token_bounds_follow_view_and_footprint() {
        let mut ogre = entity("ogre", EntityKind::Enemy, 2, 1);
        ogre.footprint = Footprint::new(2, 2);
        let view = ViewState {
            scale: 2.0,
            pan: Vec2::new(10.0, 20.0),
        };

        let sprites = token_sprites([&ogre], 32.0, view, Some(&EntityId::new("ogre")));

        assert_eq!(sprites.len(), 1);
        assert_eq!(
            sprites[0].bounds,
            Rect::new(Vec2::new(138.0, 84.0), Vec2::new(128.0, 128.0))
        );
        assert!(sprites[0].selected);
        assert!((sprites[0].health - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn token_lookup_prefers_topmost_sprite() {
        let entities = [
            entity("a", EntityKind::Enemy, 0, 0),
            entity("b", EntityKind::Enemy, 1, 0),
        ];
        let mut scene = Scene::empty();
        scene.tokens = token_sprites(&entities, 50.0, ViewState::IDENTITY, None);

        assert_eq!(
            scene.token_at(Vec2::new(75.0, 10.0)).map(|token| token.entity.as_str()),
            Some("b")
        );
        assert!(scene.token_at(Vec2::new(175.0, 10.0)).is_none());
    }

    #[test]
    fn preview_uses_character_sheet_for_players() {
        let directory = Sheets(vec![CharacterSheet {
            id: EntityId::new("hero"),
            name: "Tordek".to_owned(),
            level: 3,
            hit_points: HitPoints::new(28, 28),
            portrait_url: None,
        }]);

        let hero = TokenPreview::describe(&entity("hero", EntityKind::Player, 0, 0), &directory);
        assert_eq!(hero.name, "Tordek");
        assert_eq!(hero.level, Some(3));
        assert_eq!(hero.portrait, "assets/hero.png");

        let goblin = TokenPreview::describe(&entity("hero", EntityKind::Enemy, 0, 0), &directory);
        assert_eq!(goblin.name, "token hero");
        assert_eq!(goblin.level, None);
    }

    #[test]
    fn cell_bounds_match_token_bounds() {
        let view = ViewState {
            scale: 1.5,
            pan: Vec2::new(-30.0, 5.0),
        };
        let token = entity("a", EntityKind::Enemy, 3, 2);
        let sprites = token_sprites([&token], 40.0, view, None);

        assert_eq!(cell_bounds(GridCell::new(3, 2), 40.0, view), sprites[0].bounds);
    }
}
