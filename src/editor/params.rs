//! Common SystemParam bundles to reduce parameter counts in editor systems.
//!
//! Flattening and selection both need the same set of queries (camera plus
//! every annotation kind), so those are bundled here instead of repeating
//! five parameters per system.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;

use super::draw::StrokePath;
use super::history::AnnotationMarker;
use super::text::TextNote;
use super::viewport::SurfaceCamera;

/// Bundled camera and window queries for cursor-to-surface calculations
#[derive(SystemParam)]
pub struct CameraParams<'w, 's> {
    pub window: Query<'w, 's, &'static Window, With<PrimaryWindow>>,
    pub camera: Query<'w, 's, (&'static Camera, &'static GlobalTransform), With<SurfaceCamera>>,
}

impl CameraParams<'_, '_> {
    /// Get the surface position of the cursor, if available
    pub fn cursor_surface_pos(&self) -> Option<Vec2> {
        let window = self.window.single().ok()?;
        let (camera, transform) = self.camera.single().ok()?;
        let cursor_pos = window.cursor_position()?;
        camera.viewport_to_world_2d(transform, cursor_pos).ok()
    }
}

/// Read-only access to every annotation on the surface
#[derive(SystemParam)]
pub struct AnnotationQueries<'w, 's> {
    pub strokes: Query<'w, 's, (Entity, &'static StrokePath), With<AnnotationMarker>>,
    pub notes:
        Query<'w, 's, (Entity, &'static Transform, &'static TextNote), With<AnnotationMarker>>,
}

impl AnnotationQueries<'_, '_> {
    /// Total annotation count, the gate for flattening
    pub fn count(&self) -> usize {
        self.strokes.iter().count() + self.notes.iter().count()
    }
}

/// Check if the cursor is over egui UI
pub fn is_cursor_over_ui(contexts: &mut EguiContexts) -> bool {
    contexts
        .ctx_mut()
        .map(|ctx| ctx.is_pointer_over_area())
        .unwrap_or(false)
}
