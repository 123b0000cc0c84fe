//! Document lifecycle: open, page flips and background delivery.
//!
//! Opening fetches the document bytes off the main thread, parses them with
//! pdfium and activates page 1. Flipping flattens the outgoing page into the
//! snapshot store, clears the annotation surface and swaps the background.
//! Every rendered page travels as a `PageRendered` message tagged with its
//! page number so stale results can be dropped at the apply step.

pub mod loader;

pub use loader::{DocumentSource, LoadError, LoadedDocument, PageRangeError};

use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use bevy::tasks::{AsyncComputeTaskPool, Task};
use bevy::window::PrimaryWindow;
use futures_lite::future;
use image::RgbaImage;

use crate::config::{AppConfig, ConfigLoaded};
use crate::constants::{PAGE_RENDER_SCALE, SNAPSHOT_MULTIPLIER, SURFACE_MARGIN, SURFACE_VERTICAL_RESERVE};
use crate::editor::history::AnnotationMarker;
use crate::editor::params::AnnotationQueries;
use crate::editor::viewport::ViewportState;
use crate::snapshot::{compose, flatten_into, FontStore, PageSnapshots};
use loader::{fetch_bytes, validate_page};

/// Current page, page count and drawing-mode toggle
#[derive(Resource, Default)]
pub struct ViewerState {
    /// 1-based, 0 until a document is loaded
    pub current_page: u16,
    pub total_pages: u16,
    pub drawing_mode: bool,
}

impl ViewerState {
    pub fn has_document(&self) -> bool {
        self.total_pages > 0
    }
}

/// Annotation surface dimensions in world units.
///
/// Sized once per document from the window and the first page's aspect
/// ratio; later pages reuse it and only swap the background image.
#[derive(Resource, Default)]
pub struct Surface {
    pub size: Vec2,
}

/// The most recently applied page background, kept for flattening
#[derive(Resource, Default)]
pub struct CurrentBackground {
    pub image: Option<RgbaImage>,
}

/// Load progress and the latest failure, shown in the file menu dialogs
#[derive(Resource, Default)]
pub struct DocumentLoadState {
    pub loading: bool,
    pub error: Option<String>,
}

/// Marker for the single background sprite entity
#[derive(Component)]
pub struct BackgroundSprite;

/// Message to open a document from a path or URL
#[derive(Message)]
pub struct OpenDocumentRequest {
    pub locator: String,
}

/// Message to navigate to another page
#[derive(Message)]
pub struct FlipPageRequest {
    pub page: u16,
}

/// A page background ready to be applied to the surface
#[derive(Message)]
pub struct PageRendered {
    pub page_number: u16,
    pub image: RgbaImage,
}

/// In-flight byte fetch for a document being opened
#[derive(Component)]
pub struct DocumentFetchTask(Task<Result<Vec<u8>, LoadError>>);

/// Fit a surface of the page's aspect ratio into the window, leaving a
/// horizontal margin and vertical room for the toolbar and navigation bar
pub fn surface_size_for(window: Vec2, page_points: Vec2) -> Vec2 {
    let aspect = page_points.y.max(1.0) / page_points.x.max(1.0);
    let mut width = (window.x - 2.0 * SURFACE_MARGIN).max(1.0);
    let mut height = width * aspect;

    let max_height = (window.y - SURFACE_VERTICAL_RESERVE).max(1.0);
    if height > max_height {
        height = max_height;
        width = height / aspect;
    }
    Vec2::new(width, height)
}

fn to_bevy_image(image: &RgbaImage) -> Image {
    Image::new(
        Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        image.as_raw().clone(),
        TextureFormat::Rgba8UnormSrgb,
        default(),
    )
}

/// Queue the configured document once config is available
fn open_configured_document(
    config: Res<AppConfig>,
    mut requests: MessageWriter<OpenDocumentRequest>,
) {
    let Some(ref locator) = config.data.document_locator else {
        info!("No document configured; use File > Open to load one");
        return;
    };
    requests.write(OpenDocumentRequest {
        locator: locator.clone(),
    });
}

/// Spawn a byte-fetch task for each open request
fn handle_open_request(
    mut commands: Commands,
    mut requests: MessageReader<OpenDocumentRequest>,
    mut load_state: ResMut<DocumentLoadState>,
) {
    for request in requests.read() {
        let source = DocumentSource::parse(&request.locator);
        info!("Opening document from {}", source.describe());

        load_state.loading = true;
        load_state.error = None;

        let task_pool = AsyncComputeTaskPool::get();
        let task = task_pool.spawn(async move { fetch_bytes(&source) });
        commands.spawn(DocumentFetchTask(task));
    }
}

/// Set up viewer state and pick the first background for a parsed document
fn activate_document(
    document: &LoadedDocument,
    snapshots: &PageSnapshots,
    viewer: &mut ViewerState,
    surface: &mut Surface,
    viewport: &mut ViewportState,
    window: Vec2,
) -> Result<RgbaImage, LoadError> {
    let page_points = document.page_size(1)?;
    let background = match snapshots.get(1) {
        Some(image) => image.clone(),
        None => document.rasterize(1, PAGE_RENDER_SCALE)?,
    };

    viewer.current_page = 1;
    viewer.total_pages = document.page_count();
    viewer.drawing_mode = false;
    surface.size = surface_size_for(window, page_points);
    viewport.reset();
    Ok(background)
}

/// Poll fetch tasks; on completion parse the bytes and activate page 1
fn poll_fetch_tasks(
    mut commands: Commands,
    mut tasks: Query<(Entity, &mut DocumentFetchTask)>,
    existing: Option<Res<LoadedDocument>>,
    mut load_state: ResMut<DocumentLoadState>,
    mut viewer: ResMut<ViewerState>,
    mut surface: ResMut<Surface>,
    mut viewport: ResMut<ViewportState>,
    mut snapshots: ResMut<PageSnapshots>,
    annotations: Query<Entity, With<AnnotationMarker>>,
    window_query: Query<&Window, With<PrimaryWindow>>,
    mut rendered: MessageWriter<PageRendered>,
) {
    for (entity, mut task) in tasks.iter_mut() {
        let Some(result) = future::block_on(future::poll_once(&mut task.0)) else {
            continue;
        };
        commands.entity(entity).despawn();
        load_state.loading = false;

        let document = match result.and_then(LoadedDocument::from_bytes) {
            Ok(document) => document,
            Err(e) => {
                error!("Document load failed: {}", e);
                load_state.error = Some(e.to_string());
                continue;
            }
        };

        // Replacing a document invalidates its snapshots and annotations;
        // the initial load keeps seeded snapshots.
        if existing.is_some() {
            snapshots.clear();
            for annotation in annotations.iter() {
                commands.entity(annotation).despawn();
            }
        }

        let window = window_query
            .single()
            .map(|w| Vec2::new(w.width(), w.height()))
            .unwrap_or(Vec2::new(
                crate::constants::DEFAULT_WINDOW_WIDTH,
                crate::constants::DEFAULT_WINDOW_HEIGHT,
            ));

        match activate_document(
            &document,
            &snapshots,
            &mut viewer,
            &mut surface,
            &mut viewport,
            window,
        ) {
            Ok(background) => {
                info!("Document loaded with {} pages", document.page_count());
                rendered.write(PageRendered {
                    page_number: 1,
                    image: background,
                });
                commands.insert_resource(document);
            }
            Err(e) => {
                error!("Could not activate document: {}", e);
                load_state.error = Some(e.to_string());
            }
        }
    }
}

/// Flatten the outgoing page, clear the surface and move to the target.
///
/// The target background is obtained before anything is mutated so a
/// rasterization failure leaves the current page fully intact.
fn handle_flip_page(
    mut commands: Commands,
    mut requests: MessageReader<FlipPageRequest>,
    document: Option<Res<LoadedDocument>>,
    mut viewer: ResMut<ViewerState>,
    mut viewport: ResMut<ViewportState>,
    mut snapshots: ResMut<PageSnapshots>,
    current: Res<CurrentBackground>,
    surface: Res<Surface>,
    font_store: Res<FontStore>,
    annotations: AnnotationQueries,
    markers: Query<Entity, With<AnnotationMarker>>,
    mut rendered: MessageWriter<PageRendered>,
    mut load_state: ResMut<DocumentLoadState>,
) {
    let Some(document) = document else {
        return;
    };

    for request in requests.read() {
        if request.page == viewer.current_page {
            continue;
        }
        if let Err(e) = validate_page(request.page, viewer.total_pages) {
            warn!("Ignoring flip request: {}", e);
            continue;
        }

        let background = match snapshots.get(request.page) {
            Some(image) => image.clone(),
            None => match document.rasterize(request.page, PAGE_RENDER_SCALE) {
                Ok(image) => image,
                Err(e) => {
                    error!("Could not render page {}: {}", request.page, e);
                    load_state.error = Some(e.to_string());
                    continue;
                }
            },
        };

        // Capture happens at identity so the snapshot covers the full page
        viewport.reset();

        if let Some(ref page_background) = current.image {
            let strokes: Vec<_> = annotations.strokes.iter().map(|(_, s)| s).collect();
            let notes: Vec<_> = annotations
                .notes
                .iter()
                .map(|(_, transform, note)| (transform.translation.truncate(), note))
                .collect();

            let flattened = flatten_into(
                &mut snapshots,
                viewer.current_page,
                strokes.len() + notes.len(),
                || {
                    compose(
                        page_background,
                        surface.size,
                        SNAPSHOT_MULTIPLIER,
                        &strokes,
                        &notes,
                        font_store.font.as_ref(),
                    )
                },
            );
            match flattened {
                Ok(true) => debug!("Flattened page {} into snapshot store", viewer.current_page),
                Ok(false) => {}
                Err(e) => {
                    // Annotations stay on the surface rather than being lost
                    error!("Could not flatten page {}: {}", viewer.current_page, e);
                    load_state.error = Some(e.to_string());
                    continue;
                }
            }
        }

        for entity in markers.iter() {
            commands.entity(entity).despawn();
        }

        debug!("Flipping {} -> {}", viewer.current_page, request.page);
        viewer.current_page = request.page;
        rendered.write(PageRendered {
            page_number: request.page,
            image: background,
        });
    }
}

/// Apply a rendered background unless the viewer has moved on
fn apply_page_rendered(
    mut commands: Commands,
    mut rendered: MessageReader<PageRendered>,
    viewer: Res<ViewerState>,
    surface: Res<Surface>,
    mut current: ResMut<CurrentBackground>,
    mut images: ResMut<Assets<Image>>,
    mut background_sprite: Query<&mut Sprite, With<BackgroundSprite>>,
) {
    for message in rendered.read() {
        if message.page_number != viewer.current_page {
            debug!(
                "Dropping stale render for page {} (now on {})",
                message.page_number, viewer.current_page
            );
            continue;
        }

        let handle = images.add(to_bevy_image(&message.image));
        if let Ok(mut sprite) = background_sprite.single_mut() {
            sprite.image = handle;
            sprite.custom_size = Some(surface.size);
        } else {
            commands.spawn((
                Sprite {
                    image: handle,
                    custom_size: Some(surface.size),
                    ..default()
                },
                Transform::from_translation(Vec3::ZERO),
                BackgroundSprite,
            ));
        }
        current.image = Some(message.image.clone());
    }
}

pub struct DocumentPlugin;

impl Plugin for DocumentPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ViewerState>()
            .init_resource::<Surface>()
            .init_resource::<CurrentBackground>()
            .init_resource::<DocumentLoadState>()
            .add_message::<OpenDocumentRequest>()
            .add_message::<FlipPageRequest>()
            .add_message::<PageRendered>()
            .add_systems(Startup, open_configured_document.after(ConfigLoaded))
            // Renders from a flip must be applied in the same frame
            .add_systems(
                Update,
                (
                    handle_open_request.run_if(on_message::<OpenDocumentRequest>),
                    poll_fetch_tasks,
                    handle_flip_page.run_if(on_message::<FlipPageRequest>),
                    apply_page_rendered.run_if(on_message::<PageRendered>),
                )
                    .chain(),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_fills_width_for_wide_pages() {
        let size = surface_size_for(Vec2::new(1280.0, 860.0), Vec2::new(800.0, 400.0));
        assert_eq!(size, Vec2::new(1200.0, 600.0));
    }

    #[test]
    fn test_surface_clamped_by_height_for_tall_pages() {
        // A portrait page at full width would overflow the usable height
        let size = surface_size_for(Vec2::new(1280.0, 860.0), Vec2::new(600.0, 800.0));
        assert_eq!(size, Vec2::new(555.0, 740.0));
    }

    #[test]
    fn test_surface_keeps_page_aspect() {
        let page = Vec2::new(612.0, 792.0);
        let size = surface_size_for(Vec2::new(1280.0, 860.0), page);
        let aspect = size.y / size.x;
        assert!((aspect - page.y / page.x).abs() < 1e-4);
    }

    #[test]
    fn test_surface_never_degenerates() {
        let size = surface_size_for(Vec2::ZERO, Vec2::ZERO);
        assert!(size.x >= 1.0);
        assert!(size.y >= 1.0);
    }

    #[test]
    fn test_viewer_state_has_document() {
        let mut viewer = ViewerState::default();
        assert!(!viewer.has_document());
        viewer.total_pages = 3;
        assert!(viewer.has_document());
    }
}
