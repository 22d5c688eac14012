use std::{
    collections::HashMap,
    fs,
    path::{Component, Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use macroquad::texture::Texture2D;
use tracing::warn;

/// Resolves an asset locator against the asset root.
///
/// Remote locators and paths escaping the root are rejected.
pub fn resolve_asset_path(root: &Path, locator: &str) -> Result<PathBuf> {
    let locator = locator.trim();
    if locator.is_empty() {
        bail!("asset locator is empty");
    }
    if locator.contains("://") {
        bail!("remote asset `{locator}` cannot be loaded from disk");
    }

    let relative = Path::new(locator.trim_start_matches('/'));
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
    {
        bail!("asset `{locator}` escapes the asset root");
    }

    Ok(root.join(relative))
}

/// Lazily loaded textures keyed by asset locator.
///
/// Failed loads are remembered so a missing file is reported once and then
/// drawn with the fallback shape.
#[derive(Debug)]
pub(crate) struct TextureCache {
    root: PathBuf,
    textures: HashMap<String, Option<Texture2D>>,
}

impl TextureCache {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self {
            root,
            textures: HashMap::new(),
        }
    }

    pub(crate) fn get(&mut self, locator: &str) -> Option<Texture2D> {
        self.get_with_loader(locator, load_from_disk)
    }

    fn get_with_loader(
        &mut self,
        locator: &str,
        mut loader: impl FnMut(&Path) -> Result<Texture2D>,
    ) -> Option<Texture2D> {
        if let Some(cached) = self.textures.get(locator) {
            return *cached;
        }

        let loaded = resolve_asset_path(&self.root, locator)
            .and_then(|path| loader(&path))
            .map_err(|error| warn!(locator, error = %format!("{error:#}"), "texture unavailable"))
            .ok();
        let _ = self.textures.insert(locator.to_owned(), loaded);
        loaded
    }
}

fn load_from_disk(path: &Path) -> Result<Texture2D> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read asset at {}", path.display()))?;
    Ok(Texture2D::from_file_with_format(&bytes, None))
}
