use std::path::{Path, PathBuf};

use tabletop_rendering_macroquad::resolve_asset_path;

#[test]
fn relative_locators_resolve_under_the_root() {
    let root = Path::new("/srv/tabletop/assets");

    assert_eq!(
        resolve_asset_path(root, "maps/crypt.png").expect("relative path"),
        PathBuf::from("/srv/tabletop/assets/maps/crypt.png")
    );
    assert_eq!(
        resolve_asset_path(root, "/tokens/orc.png").expect("rooted locator"),
        PathBuf::from("/srv/tabletop/assets/tokens/orc.png")
    );
    assert_eq!(
        resolve_asset_path(root, "  ./tokens/elf.png ").expect("trimmed locator"),
        PathBuf::from("/srv/tabletop/assets/tokens/elf.png")
    );
}

#[test]
fn remote_and_escaping_locators_are_rejected() {
    let root = Path::new("assets");

    assert!(resolve_asset_path(root, "").is_err());
    assert!(resolve_asset_path(root, "   ").is_err());
    assert!(resolve_asset_path(root, "https://cdn.example.org/maps/crypt.png").is_err());
    assert!(resolve_asset_path(root, "../secrets.toml").is_err());
    assert!(resolve_asset_path(root, "tokens/../../etc/passwd").is_err());
}
