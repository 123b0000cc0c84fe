//! Per-page snapshot store.
//!
//! A snapshot is the full-resolution composite of a page's background and its
//! annotations, captured when the user flips away from an annotated page.
//! Snapshots can be exported as `page-<n>.png` files and pre-seeded from a
//! configured directory at startup.

pub mod composite;

pub use composite::{compose, ComposeError};

use bevy::prelude::*;
use image::RgbaImage;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{AppConfig, ConfigLoaded, SetLastExportDirRequest};
use crate::paths;

/// Errors raised while exporting snapshots to disk
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not create export directory {dir}: {message}")]
    CreateDir { dir: PathBuf, message: String },

    #[error("failed to write snapshot for page {page}: {message}")]
    Write { page: u16, message: String },
}

/// Snapshots keyed by 1-based page number, at most one per page
#[derive(Resource, Default)]
pub struct PageSnapshots {
    pages: BTreeMap<u16, RgbaImage>,
}

impl PageSnapshots {
    pub fn insert(&mut self, page: u16, image: RgbaImage) {
        self.pages.insert(page, image);
    }

    pub fn get(&self, page: u16) -> Option<&RgbaImage> {
        self.pages.get(&page)
    }

    pub fn contains(&self, page: u16) -> bool {
        self.pages.contains_key(&page)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u16, &RgbaImage)> {
        self.pages.iter()
    }

    /// Drop every stored snapshot, used when a new document replaces the
    /// current one
    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

/// Flatten gate: only a surface with at least one annotation replaces the
/// stored snapshot. Returns whether a new snapshot was stored.
pub fn flatten_into(
    store: &mut PageSnapshots,
    page: u16,
    annotation_count: usize,
    compose: impl FnOnce() -> Result<RgbaImage, ComposeError>,
) -> Result<bool, ComposeError> {
    if annotation_count == 0 {
        return Ok(false);
    }
    let image = compose()?;
    store.insert(page, image);
    Ok(true)
}

/// Write every stored snapshot as `page-<n>.png` into `dir`
pub fn export_to_dir(store: &PageSnapshots, dir: &Path) -> Result<usize, ExportError> {
    std::fs::create_dir_all(dir).map_err(|e| ExportError::CreateDir {
        dir: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    for (page, image) in store.iter() {
        let path = dir.join(format!("page-{}.png", page));
        image.save(&path).map_err(|e| ExportError::Write {
            page: *page,
            message: e.to_string(),
        })?;
    }
    Ok(store.len())
}

/// Parse a seed file name of the form `page-<n>.png`
pub fn seed_page_number(file_name: &str) -> Option<u16> {
    file_name
        .strip_prefix("page-")?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

/// Font used when flattening text notes, discovered under the assets
/// directory at startup
#[derive(Resource, Default)]
pub struct FontStore {
    pub font: Option<fontdue::Font>,
}

/// Export failure shown to the user in a dialog
#[derive(Resource, Default)]
pub struct ExportErrorState {
    pub message: Option<String>,
}

/// Message to export all snapshots into a user-chosen directory
#[derive(Message)]
pub struct ExportSnapshotsRequest;

fn load_font(mut store: ResMut<FontStore>) {
    let dir = paths::fonts_dir();
    let Ok(entries) = std::fs::read_dir(&dir) else {
        warn!(
            "No fonts directory at {:?}; flattened notes will show boxes only",
            dir
        );
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_font = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"));
        if !is_font {
            continue;
        }
        match std::fs::read(&path) {
            Ok(bytes) => match fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default()) {
                Ok(font) => {
                    info!("Loaded note font from {:?}", path);
                    store.font = Some(font);
                    return;
                }
                Err(e) => warn!("Could not parse font {:?}: {}", path, e),
            },
            Err(e) => warn!("Could not read font {:?}: {}", path, e),
        }
    }

    warn!(
        "No usable font under {:?}; flattened notes will show boxes only",
        dir
    );
}

/// Pre-populate the store from `page-<n>.png` files in the configured
/// seed directory
fn seed_snapshots(config: Res<AppConfig>, mut store: ResMut<PageSnapshots>) {
    let Some(ref dir) = config.data.snapshot_seed_dir else {
        return;
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not read snapshot seed directory {:?}: {}", dir, e);
            return;
        }
    };

    let mut loaded = 0;
    for entry in entries.flatten() {
        let Some(name) = entry.file_name().to_str().map(String::from) else {
            continue;
        };
        let Some(page) = seed_page_number(&name) else {
            continue;
        };
        match image::open(entry.path()) {
            Ok(image) => {
                store.insert(page, image.to_rgba8());
                loaded += 1;
            }
            Err(e) => warn!("Skipping seed snapshot {:?}: {}", entry.path(), e),
        }
    }

    if loaded > 0 {
        info!("Seeded {} snapshots from {:?}", loaded, dir);
    }
}

/// Pick a folder and write every snapshot into it
fn handle_export(
    mut requests: MessageReader<ExportSnapshotsRequest>,
    store: Res<PageSnapshots>,
    config: Res<AppConfig>,
    mut remember_dir: MessageWriter<SetLastExportDirRequest>,
    mut error_state: ResMut<ExportErrorState>,
) {
    for _ in requests.read() {
        if store.is_empty() {
            info!("No snapshots to export");
            continue;
        }

        let mut dialog = rfd::FileDialog::new().set_title("Export snapshots");
        if let Some(ref dir) = config.data.last_export_dir {
            dialog = dialog.set_directory(dir);
        }
        let Some(dir) = dialog.pick_folder() else {
            continue;
        };

        match export_to_dir(&store, &dir) {
            Ok(count) => {
                info!("Exported {} snapshots to {:?}", count, dir);
                remember_dir.write(SetLastExportDirRequest { path: dir });
            }
            Err(e) => {
                error!("Snapshot export failed: {}", e);
                error_state.message = Some(e.to_string());
            }
        }
    }
}

pub struct SnapshotPlugin;

impl Plugin for SnapshotPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PageSnapshots>()
            .init_resource::<FontStore>()
            .init_resource::<ExportErrorState>()
            .add_message::<ExportSnapshotsRequest>()
            .add_systems(Startup, (load_font, seed_snapshots.after(ConfigLoaded)))
            .add_systems(
                Update,
                handle_export.run_if(on_message::<ExportSnapshotsRequest>),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel_image(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(2, 2, image::Rgba([value, value, value, 255]))
    }

    #[test]
    fn test_store_insert_and_get() {
        let mut store = PageSnapshots::default();
        assert!(store.is_empty());
        assert!(store.get(1).is_none());

        store.insert(1, pixel_image(10));
        assert!(store.contains(1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).map(|i| i.get_pixel(0, 0).0[0]), Some(10));
    }

    #[test]
    fn test_store_holds_one_snapshot_per_page() {
        let mut store = PageSnapshots::default();
        store.insert(2, pixel_image(1));
        store.insert(2, pixel_image(9));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(2).map(|i| i.get_pixel(0, 0).0[0]), Some(9));
    }

    #[test]
    fn test_flatten_skips_empty_surface() {
        let mut store = PageSnapshots::default();
        store.insert(3, pixel_image(42));

        let mut composed = false;
        let stored = flatten_into(&mut store, 3, 0, || {
            composed = true;
            Ok(pixel_image(0))
        })
        .expect("flatten succeeds");

        // Existing snapshot untouched, composition never ran
        assert!(!stored);
        assert!(!composed);
        assert_eq!(store.get(3).map(|i| i.get_pixel(0, 0).0[0]), Some(42));
    }

    #[test]
    fn test_flatten_stores_with_annotations() {
        let mut store = PageSnapshots::default();
        let stored =
            flatten_into(&mut store, 1, 2, || Ok(pixel_image(7))).expect("flatten succeeds");
        assert!(stored);
        assert_eq!(store.get(1).map(|i| i.get_pixel(0, 0).0[0]), Some(7));
    }

    #[test]
    fn test_three_page_annotation_walk() {
        // Annotate pages 1 and 3, leave page 2 untouched, flip through all
        let mut store = PageSnapshots::default();

        flatten_into(&mut store, 1, 1, || Ok(pixel_image(1))).expect("flatten succeeds");
        flatten_into(&mut store, 2, 0, || Ok(pixel_image(2))).expect("flatten succeeds");
        flatten_into(&mut store, 3, 4, || Ok(pixel_image(3))).expect("flatten succeeds");

        assert!(store.contains(1));
        assert!(!store.contains(2));
        assert!(store.contains(3));

        // Returning to page 1 finds its composite ready to use as background
        assert_eq!(store.get(1).map(|i| i.get_pixel(0, 0).0[0]), Some(1));
    }

    #[test]
    fn test_clear_empties_store() {
        let mut store = PageSnapshots::default();
        store.insert(1, pixel_image(1));
        store.insert(2, pixel_image(2));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_seed_page_number_parsing() {
        assert_eq!(seed_page_number("page-1.png"), Some(1));
        assert_eq!(seed_page_number("page-12.png"), Some(12));
        assert_eq!(seed_page_number("page-.png"), None);
        assert_eq!(seed_page_number("page-3.jpg"), None);
        assert_eq!(seed_page_number("cover.png"), None);
    }

    #[test]
    fn test_export_round_trip() {
        let dir = std::env::temp_dir().join(format!("inkleaf-export-test-{}", std::process::id()));
        let mut store = PageSnapshots::default();
        store.insert(1, pixel_image(5));
        store.insert(4, pixel_image(6));

        let count = export_to_dir(&store, &dir).expect("export succeeds");
        assert_eq!(count, 2);
        assert!(dir.join("page-1.png").exists());
        assert!(dir.join("page-4.png").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_export_error_display() {
        let err = ExportError::Write {
            page: 3,
            message: "disk full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to write snapshot for page 3: disk full"
        );
    }
}
