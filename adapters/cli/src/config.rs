//! `tabletop.toml` client configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use glam::Vec2;
use serde::Deserialize;
use tabletop_core::{CharacterSheet, Entity, EntityId, MapMeta, Role};
use tabletop_rendering::ViewLimits;

/// File looked up in the working directory when no `--config` is given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "tabletop.toml";

/// Complete client configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ClientConfig {
    pub(crate) session: SessionConfig,
    pub(crate) view: ViewConfig,
    pub(crate) map: MapConfig,
    pub(crate) logging: LoggingConfig,
    /// Seed for the in-memory character directory.
    pub(crate) characters: Vec<CharacterSheet>,
    /// Tokens placed on the board when playing against the local authority.
    pub(crate) entities: Vec<Entity>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SessionConfig {
    pub(crate) code: String,
    pub(crate) role: Role,
    /// Address of a line-delimited JSON session service. Local play when absent.
    pub(crate) connect: Option<String>,
    /// Chat sender name used by the local authority.
    pub(crate) participant: String,
    pub(crate) self_entity: Option<EntityId>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            code: "local".to_owned(),
            role: Role::GameMaster,
            connect: None,
            participant: "you".to_owned(),
            self_entity: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ViewConfig {
    pub(crate) min_zoom: f32,
    pub(crate) max_zoom: f32,
    pub(crate) window_width: f32,
    pub(crate) window_height: f32,
    pub(crate) vsync: bool,
}

impl ViewConfig {
    pub(crate) fn limits(&self) -> Result<ViewLimits> {
        ViewLimits::new(self.min_zoom, self.max_zoom).context("invalid [view] zoom limits")
    }

    pub(crate) fn window_size(&self) -> Vec2 {
        Vec2::new(self.window_width, self.window_height)
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_zoom: ViewLimits::DEFAULT_MIN_SCALE,
            max_zoom: ViewLimits::DEFAULT_MAX_SCALE,
            window_width: 1280.0,
            window_height: 800.0,
            vsync: true,
        }
    }
}

/// Map section used for local play, plus the directory images are loaded from.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct MapConfig {
    pub(crate) image: String,
    pub(crate) width_px: u32,
    pub(crate) height_px: u32,
    pub(crate) tile_size_px: u32,
    pub(crate) section_offset_x: u32,
    pub(crate) section_offset_y: u32,
    pub(crate) asset_root: PathBuf,
}

impl MapConfig {
    pub(crate) fn meta(&self) -> MapMeta {
        MapMeta {
            width_px: self.width_px,
            height_px: self.height_px,
            tile_size_px: self.tile_size_px,
            section_offset_x: self.section_offset_x,
            section_offset_y: self.section_offset_y,
            map_image_url: self.image.clone(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            image: "maps/default.png".to_owned(),
            width_px: 1024,
            height_px: 768,
            tile_size_px: 64,
            section_offset_x: 0,
            section_offset_y: 0,
            asset_root: PathBuf::from("assets"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub(crate) filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

impl ClientConfig {
    /// Loads the configuration from `path`, or from [`DEFAULT_CONFIG_FILE`]
    /// when it exists, or falls back to defaults.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub(crate) fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        let _ = config.view.limits()?;
        let _ = config
            .map
            .meta()
            .grid_dimensions()
            .context("invalid [map] dimensions")?;
        Ok(config)
    }
}
