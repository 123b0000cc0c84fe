//! Freehand ink strokes.
//!
//! While drawing mode is on, a left drag over the surface captures a polyline
//! in surface coordinates. Strokes are plain components rendered with gizmos;
//! they are never selectable.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;

use super::history::{AnnotationMarker, AnnotationSequence};
use super::params::is_cursor_over_ui;
use super::viewport::SurfaceCamera;
use crate::constants::MIN_STROKE_POINT_SPACING;
use crate::document::ViewerState;

/// A completed freehand stroke in surface coordinates
#[derive(Component, Debug, Clone)]
pub struct StrokePath {
    pub points: Vec<Vec2>,
    pub color: Color,
    pub stroke_width: f32,
}

/// The active freehand brush. Changes apply to strokes drawn afterwards,
/// never to strokes already on the surface.
#[derive(Resource)]
pub struct BrushSettings {
    pub color: Color,
    pub width: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            color: Color::srgb(0.85, 0.1, 0.1),
            width: 3.0,
        }
    }
}

#[derive(Resource, Default)]
pub struct DrawState {
    pub is_drawing: bool,
    pub current_points: Vec<Vec2>,
}

/// Append a sample point, skipping points closer than the minimum spacing
/// to the previous one
pub fn append_stroke_point(points: &mut Vec<Vec2>, point: Vec2) {
    match points.last() {
        Some(last) if point.distance(*last) <= MIN_STROKE_POINT_SPACING => {}
        _ => points.push(point),
    }
}

#[derive(SystemParam)]
pub(crate) struct DrawResources<'w> {
    mouse_button: Res<'w, ButtonInput<MouseButton>>,
    viewer: Res<'w, ViewerState>,
    draw_state: ResMut<'w, DrawState>,
    brush: Res<'w, BrushSettings>,
    sequence: ResMut<'w, AnnotationSequence>,
}

pub fn handle_draw(
    mut commands: Commands,
    mut res: DrawResources,
    window_query: Query<&Window, With<PrimaryWindow>>,
    camera_query: Query<(&Camera, &GlobalTransform), With<SurfaceCamera>>,
    mut contexts: EguiContexts,
) {
    if !res.viewer.drawing_mode {
        // Drawing mode switched off mid-stroke, finalize what we have
        if res.draw_state.is_drawing && res.draw_state.current_points.len() >= 2 {
            spawn_stroke(
                &mut commands,
                &res.draw_state,
                &res.brush,
                &mut res.sequence,
            );
        }
        res.draw_state.is_drawing = false;
        res.draw_state.current_points.clear();
        return;
    }

    if is_cursor_over_ui(&mut contexts) {
        return;
    }

    let Ok(window) = window_query.single() else {
        return;
    };

    let Ok((camera, camera_transform)) = camera_query.single() else {
        return;
    };

    let Some(cursor_pos) = window.cursor_position() else {
        return;
    };

    let Ok(surface_pos) = camera.viewport_to_world_2d(camera_transform, cursor_pos) else {
        return;
    };

    if res.mouse_button.just_pressed(MouseButton::Left) {
        res.draw_state.is_drawing = true;
        res.draw_state.current_points.clear();
        res.draw_state.current_points.push(surface_pos);
    } else if res.mouse_button.pressed(MouseButton::Left) && res.draw_state.is_drawing {
        append_stroke_point(&mut res.draw_state.current_points, surface_pos);
    } else if res.mouse_button.just_released(MouseButton::Left) && res.draw_state.is_drawing {
        res.draw_state.is_drawing = false;
        if res.draw_state.current_points.len() >= 2 {
            spawn_stroke(
                &mut commands,
                &res.draw_state,
                &res.brush,
                &mut res.sequence,
            );
        }
        res.draw_state.current_points.clear();
    }
}

fn spawn_stroke(
    commands: &mut Commands,
    draw_state: &DrawState,
    brush: &BrushSettings,
    sequence: &mut AnnotationSequence,
) {
    commands.spawn((
        Transform::from_translation(Vec3::new(0.0, 0.0, 1.0)),
        StrokePath {
            points: draw_state.current_points.clone(),
            color: brush.color,
            stroke_width: brush.width,
        },
        AnnotationMarker,
        sequence.next(),
    ));
    debug!(
        "Finished stroke with {} points",
        draw_state.current_points.len()
    );
}

pub fn render_strokes(mut gizmos: Gizmos, strokes: Query<&StrokePath>) {
    for stroke in strokes.iter() {
        if stroke.points.len() < 2 {
            continue;
        }
        for window in stroke.points.windows(2) {
            gizmos.line_2d(window[0], window[1], stroke.color);
        }
    }
}

pub fn render_draw_preview(
    mut gizmos: Gizmos,
    draw_state: Res<DrawState>,
    brush: Res<BrushSettings>,
) {
    if !draw_state.is_drawing || draw_state.current_points.len() < 2 {
        return;
    }

    for window in draw_state.current_points.windows(2) {
        gizmos.line_2d(window[0], window[1], brush.color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_skips_close_points() {
        let mut points = vec![Vec2::ZERO];
        append_stroke_point(&mut points, Vec2::new(1.0, 0.0));
        assert_eq!(points.len(), 1);

        append_stroke_point(&mut points, Vec2::new(3.0, 0.0));
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_append_to_empty_always_pushes() {
        let mut points = Vec::new();
        append_stroke_point(&mut points, Vec2::new(0.5, 0.5));
        assert_eq!(points, vec![Vec2::new(0.5, 0.5)]);
    }

    #[test]
    fn test_spacing_measured_from_last_kept_point() {
        let mut points = vec![Vec2::ZERO];
        // Two sub-threshold samples, then one that clears it
        append_stroke_point(&mut points, Vec2::new(1.5, 0.0));
        append_stroke_point(&mut points, Vec2::new(1.9, 0.0));
        append_stroke_point(&mut points, Vec2::new(2.5, 0.0));
        assert_eq!(points, vec![Vec2::ZERO, Vec2::new(2.5, 0.0)]);
    }

    #[test]
    fn test_brush_defaults() {
        let brush = BrushSettings::default();
        assert_eq!(brush.width, 3.0);
    }

    #[test]
    fn test_new_brush_not_retroactive() {
        let old = StrokePath {
            points: vec![Vec2::ZERO, Vec2::ONE],
            color: Color::srgb(0.85, 0.1, 0.1),
            stroke_width: 3.0,
        };
        let mut brush = BrushSettings::default();
        brush.color = Color::srgb(0.0, 0.0, 1.0);
        brush.width = 8.0;

        // The finished stroke keeps the settings it was drawn with
        assert_eq!(old.stroke_width, 3.0);
        assert_eq!(old.color, Color::srgb(0.85, 0.1, 0.1));
    }
}
