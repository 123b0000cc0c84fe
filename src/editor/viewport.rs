//! Pan and zoom state for the annotation surface.
//!
//! The transform is kept in a plain resource so gesture handling stays pure
//! and testable; a camera system mirrors the state into the 2D projection.
//! Displayed position of a surface point `s` is `s * zoom + offset`, both in
//! window-centered coordinates (origin at the window center, Y up).

use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::input::touch::Touches;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::document::{Surface, ViewerState};

#[derive(Component)]
pub struct SurfaceCamera;

/// Pan gesture phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanPhase {
    #[default]
    Idle,
    Panning,
}

/// Set while an object is selected so dragging it never pans the surface
#[derive(Resource, Default)]
pub struct PausePanning(pub bool);

/// Viewport transform plus in-flight gesture bookkeeping
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct ViewportState {
    /// Zoom factor, never below 1
    pub zoom: f32,
    /// Displacement of the surface center from the window center, in
    /// displayed pixels
    pub offset: Vec2,
    pub pan_phase: PanPhase,
    pan_anchor: Option<Vec2>,
    /// True while a two-finger gesture is in flight
    pub pinching: bool,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset: Vec2::ZERO,
            pan_phase: PanPhase::Idle,
            pan_anchor: None,
            pinching: false,
        }
    }
}

/// Damp a raw pinch ratio so a fast gesture zooms gently.
///
/// Growing gestures contribute a tenth of their fractional part, shrinking
/// gestures a tenth of their distance from 1.
pub fn damped_ratio(ratio: f32) -> f32 {
    if ratio > 1.0 {
        1.0 + (ratio % 1.0) / 10.0
    } else if ratio < 1.0 {
        1.0 - (1.0 - ratio) / 10.0
    } else {
        1.0
    }
}

impl ViewportState {
    /// Back to identity: zoom 1, no offset, no gesture in flight
    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.offset = Vec2::ZERO;
        self.pan_phase = PanPhase::Idle;
        self.pan_anchor = None;
    }

    /// Largest offset magnitude per axis that still keeps the zoomed content
    /// covering the window: half the overflow beyond the surface bounds.
    fn max_offset(&self, surface_size: Vec2) -> Vec2 {
        (surface_size * (self.zoom - 1.0) / 2.0).max(Vec2::ZERO)
    }

    fn clamp_offset(&mut self, surface_size: Vec2) {
        let max = self.max_offset(surface_size);
        self.offset = self.offset.clamp(-max, max);
    }

    /// Scale by `factor` keeping the surface point under `point` (displayed
    /// coordinates) fixed. A result below zoom 1 resets the whole transform
    /// to identity instead.
    pub fn zoom_to_point(&mut self, point: Vec2, factor: f32, surface_size: Vec2) {
        let next = self.zoom * factor;
        if next < 1.0 {
            self.reset();
            return;
        }
        self.offset = point - (point - self.offset) * factor;
        self.zoom = next;
        self.clamp_offset(surface_size);
    }

    /// First drag sample: capture the anchor and enter `Panning`
    pub fn begin_pan(&mut self, point: Vec2) {
        self.pan_phase = PanPhase::Panning;
        self.pan_anchor = Some(point);
    }

    /// Subsequent drag sample: apply the clamped delta from the anchor
    pub fn pan_to(&mut self, point: Vec2, surface_size: Vec2) {
        let Some(anchor) = self.pan_anchor else {
            return;
        };
        self.offset += point - anchor;
        self.clamp_offset(surface_size);
        self.pan_anchor = Some(point);
    }

    /// Gesture ended or a disqualifier became true
    pub fn end_pan(&mut self) {
        self.pan_phase = PanPhase::Idle;
        self.pan_anchor = None;
    }
}

/// Convert a window cursor position (top-left origin, Y down) to
/// window-centered coordinates (Y up)
fn centered(cursor: Vec2, window_size: Vec2) -> Vec2 {
    Vec2::new(cursor.x - window_size.x / 2.0, window_size.y / 2.0 - cursor.y)
}

pub fn spawn_camera(mut commands: Commands) {
    commands.spawn((
        Camera2d,
        SurfaceCamera,
        Transform::from_translation(Vec3::new(0.0, 0.0, 1000.0)),
    ));
}

/// Two-finger pinch: damped relative scale applied about the gesture midpoint
pub fn pinch_zoom(
    touches: Res<Touches>,
    window: Query<&Window, With<PrimaryWindow>>,
    mut viewport: ResMut<ViewportState>,
    surface: Res<Surface>,
) {
    let active: Vec<_> = touches.iter().collect();
    if active.len() < 2 {
        if viewport.pinching {
            viewport.pinching = false;
        }
        return;
    }

    viewport.pinching = true;
    viewport.end_pan();

    let (a, b) = (active[0], active[1]);
    let dist_now = (a.position() - b.position()).length();
    let dist_prev = (a.previous_position() - b.previous_position()).length();
    if dist_prev <= f32::EPSILON || (dist_now - dist_prev).abs() <= f32::EPSILON {
        return;
    }

    let Ok(window) = window.single() else {
        return;
    };
    let window_size = Vec2::new(window.width(), window.height());
    let midpoint = centered((a.position() + b.position()) / 2.0, window_size);

    let factor = damped_ratio(dist_now / dist_prev);
    viewport.zoom_to_point(midpoint, factor, surface.size);
}

/// Desktop stand-in for pinch: ctrl+wheel produces scale ratios about the
/// cursor
pub fn wheel_zoom(
    keys: Res<ButtonInput<KeyCode>>,
    mut scroll_events: MessageReader<MouseWheel>,
    window: Query<&Window, With<PrimaryWindow>>,
    mut viewport: ResMut<ViewportState>,
    surface: Res<Surface>,
) {
    if !keys.pressed(KeyCode::ControlLeft) && !keys.pressed(KeyCode::ControlRight) {
        scroll_events.clear();
        return;
    }

    let Ok(window) = window.single() else {
        return;
    };
    let window_size = Vec2::new(window.width(), window.height());
    let point = window
        .cursor_position()
        .map(|c| centered(c, window_size))
        .unwrap_or(Vec2::ZERO);

    for event in scroll_events.read() {
        let amount = match event.unit {
            MouseScrollUnit::Line => event.y * 0.1,
            MouseScrollUnit::Pixel => event.y * 0.001,
        };
        let factor = damped_ratio(1.0 + amount);
        viewport.zoom_to_point(point, factor, surface.size);
    }
}

/// Left-drag pan. Disqualified while drawing, while an object is selected
/// and while a pinch is in flight.
pub fn pan_drag(
    mouse_button: Res<ButtonInput<MouseButton>>,
    window: Query<&Window, With<PrimaryWindow>>,
    viewer: Res<ViewerState>,
    pause: Res<PausePanning>,
    mut viewport: ResMut<ViewportState>,
    surface: Res<Surface>,
) {
    let disqualified = viewer.drawing_mode
        || pause.0
        || viewport.pinching
        || !mouse_button.pressed(MouseButton::Left);

    if disqualified {
        if viewport.pan_phase == PanPhase::Panning {
            viewport.end_pan();
        }
        return;
    }

    let Ok(window) = window.single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    let window_size = Vec2::new(window.width(), window.height());
    let point = centered(cursor, window_size);

    match viewport.pan_phase {
        PanPhase::Idle => viewport.begin_pan(point),
        PanPhase::Panning => viewport.pan_to(point, surface.size),
    }
}

/// Mirror the viewport transform into the camera: the projection shrinks by
/// the zoom factor and the camera moves opposite the offset.
pub fn apply_viewport(
    viewport: Res<ViewportState>,
    mut camera_query: Query<(&mut Transform, &mut Projection), With<SurfaceCamera>>,
) {
    if !viewport.is_changed() {
        return;
    }

    let Ok((mut transform, mut projection)) = camera_query.single_mut() else {
        return;
    };

    if let Projection::Orthographic(ref mut ortho) = *projection {
        ortho.scale = 1.0 / viewport.zoom;
    }
    transform.translation.x = -viewport.offset.x / viewport.zoom;
    transform.translation.y = -viewport.offset.y / viewport.zoom;
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURFACE: Vec2 = Vec2::new(800.0, 600.0);

    #[test]
    fn test_damped_ratio_scale_up() {
        assert!((damped_ratio(1.25) - 1.025).abs() < 1e-6);
        // Only the fractional part contributes
        assert!((damped_ratio(2.3) - 1.03).abs() < 1e-5);
    }

    #[test]
    fn test_damped_ratio_scale_down() {
        assert!((damped_ratio(0.8) - 0.98).abs() < 1e-6);
        assert!((damped_ratio(0.5) - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_damped_ratio_unity() {
        assert_eq!(damped_ratio(1.0), 1.0);
    }

    #[test]
    fn test_zoom_to_point_keeps_point_fixed() {
        let mut vp = ViewportState::default();
        let p = Vec2::new(100.0, 50.0);

        // Surface point displayed at p before the zoom
        let s = (p - vp.offset) / vp.zoom;
        vp.zoom_to_point(p, 1.2, SURFACE);

        let displayed = s * vp.zoom + vp.offset;
        assert!((displayed - p).length() < 1e-4);
        assert!((vp.zoom - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_below_one_snaps_to_identity() {
        let mut vp = ViewportState {
            zoom: 1.05,
            offset: Vec2::new(10.0, -5.0),
            ..Default::default()
        };
        vp.zoom_to_point(Vec2::new(40.0, 40.0), 0.9, SURFACE);
        assert_eq!(vp.zoom, 1.0);
        assert_eq!(vp.offset, Vec2::ZERO);
    }

    #[test]
    fn test_pan_clamped_to_half_overflow() {
        let mut vp = ViewportState {
            zoom: 2.0,
            ..Default::default()
        };
        vp.begin_pan(Vec2::ZERO);
        vp.pan_to(Vec2::new(10_000.0, -10_000.0), SURFACE);

        // Half the overflow: 800 * (2 - 1) / 2 = 400, 600 * 1 / 2 = 300
        assert_eq!(vp.offset, Vec2::new(400.0, -300.0));
    }

    #[test]
    fn test_identity_zoom_cannot_pan() {
        let mut vp = ViewportState::default();
        vp.begin_pan(Vec2::ZERO);
        vp.pan_to(Vec2::new(50.0, 50.0), SURFACE);
        assert_eq!(vp.offset, Vec2::ZERO);
    }

    #[test]
    fn test_pan_phase_transitions() {
        let mut vp = ViewportState {
            zoom: 1.5,
            ..Default::default()
        };
        assert_eq!(vp.pan_phase, PanPhase::Idle);

        vp.begin_pan(Vec2::new(5.0, 5.0));
        assert_eq!(vp.pan_phase, PanPhase::Panning);

        vp.pan_to(Vec2::new(15.0, 5.0), SURFACE);
        assert_eq!(vp.offset, Vec2::new(10.0, 0.0));

        vp.end_pan();
        assert_eq!(vp.pan_phase, PanPhase::Idle);

        // A sample without an anchor is ignored
        vp.pan_to(Vec2::new(100.0, 100.0), SURFACE);
        assert_eq!(vp.offset, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut vp = ViewportState {
            zoom: 3.0,
            offset: Vec2::new(120.0, -80.0),
            pan_phase: PanPhase::Panning,
            pan_anchor: Some(Vec2::ZERO),
            pinching: false,
        };
        vp.reset();
        assert_eq!(vp.zoom, 1.0);
        assert_eq!(vp.offset, Vec2::ZERO);
        assert_eq!(vp.pan_phase, PanPhase::Idle);
    }

    #[test]
    fn test_zoomed_offset_clamped_after_zoom_out() {
        let mut vp = ViewportState {
            zoom: 2.0,
            offset: Vec2::new(400.0, 300.0),
            ..Default::default()
        };
        // Zoom out at the center; the old offset now exceeds the allowance
        vp.zoom_to_point(Vec2::ZERO, 0.6, SURFACE);
        assert!(vp.zoom >= 1.0);
        let max = SURFACE * (vp.zoom - 1.0) / 2.0;
        assert!(vp.offset.x <= max.x && vp.offset.y <= max.y);
    }
}
