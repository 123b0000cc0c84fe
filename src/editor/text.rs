//! Text notes on the annotation surface.
//!
//! A note is armed from the toolbar with its content; the next pointer-up
//! over the surface places it and disarms. Arming also switches drawing mode
//! off so the placement click cannot leave a stray stroke. Placed notes can
//! be selected and dragged; while one is selected, panning is paused.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::{egui, EguiContexts};

use super::history::{AnnotationMarker, AnnotationSequence};
use super::params::is_cursor_over_ui;
use super::viewport::{PausePanning, SurfaceCamera};
use crate::document::ViewerState;

/// A placed text note in surface coordinates
#[derive(Component, Debug, Clone)]
pub struct TextNote {
    pub content: String,
    pub font_size: f32,
    pub color: Color,
    /// Fill behind the text, translucent yellow by default
    pub background: Color,
}

impl TextNote {
    pub fn new(content: String) -> Self {
        Self {
            content,
            font_size: 24.0,
            color: Color::BLACK,
            background: Color::srgba(1.0, 1.0, 0.0, 0.5),
        }
    }
}

/// Marker for the currently selected note
#[derive(Component)]
pub struct Selected;

/// One-shot insertion state. `arm` loads the content, `take_pending` hands
/// it out exactly once.
#[derive(Resource, Default)]
pub struct TextArmState {
    pending: Option<String>,
}

impl TextArmState {
    pub fn arm(&mut self, content: String) {
        self.pending = Some(content);
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn take_pending(&mut self) -> Option<String> {
        self.pending.take()
    }

    pub fn disarm(&mut self) {
        self.pending = None;
    }
}

/// Drag bookkeeping for a selected note
#[derive(Resource, Default)]
pub struct NoteDragState {
    pub dragging: Option<Entity>,
    pub grab_offset: Vec2,
}

/// Approximate half extent of a note's background box
pub fn note_half_size(content: &str, font_size: f32) -> Vec2 {
    let width = (content.chars().count() as f32 * font_size * 0.5).max(40.0);
    let height = font_size.max(20.0);
    Vec2::new(width / 2.0, height / 2.0)
}

/// Hit test a surface point against a note centered at `pos`
pub fn point_in_note(point: Vec2, pos: Vec2, note: &TextNote) -> bool {
    let half = note_half_size(&note.content, note.font_size);
    (point.x - pos.x).abs() < half.x && (point.y - pos.y).abs() < half.y
}

fn cursor_on_surface(
    window_query: &Query<&Window, With<PrimaryWindow>>,
    camera_query: &Query<(&Camera, &GlobalTransform), With<SurfaceCamera>>,
    contexts: &mut EguiContexts,
) -> Option<Vec2> {
    if is_cursor_over_ui(contexts) {
        return None;
    }
    let window = window_query.single().ok()?;
    let (camera, camera_transform) = camera_query.single().ok()?;
    let cursor_pos = window.cursor_position()?;
    camera
        .viewport_to_world_2d(camera_transform, cursor_pos)
        .ok()
}

/// Pointer-up while armed places the note and detaches the listener
pub fn place_armed_text(
    mut commands: Commands,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut arm_state: ResMut<TextArmState>,
    mut sequence: ResMut<AnnotationSequence>,
    window_query: Query<&Window, With<PrimaryWindow>>,
    camera_query: Query<(&Camera, &GlobalTransform), With<SurfaceCamera>>,
    mut contexts: EguiContexts,
) {
    if !arm_state.is_armed() || !mouse_button.just_released(MouseButton::Left) {
        return;
    }

    let Some(surface_pos) = cursor_on_surface(&window_query, &camera_query, &mut contexts) else {
        return;
    };

    let Some(content) = arm_state.take_pending() else {
        return;
    };

    commands.spawn((
        Transform::from_translation(surface_pos.extend(2.0)),
        TextNote::new(content),
        AnnotationMarker,
        sequence.next(),
    ));
    debug!("Placed text note at {:?}", surface_pos);
}

/// Click selects the topmost note under the cursor, click elsewhere clears
/// the selection. Disabled while drawing or while an insert is armed.
pub fn select_note(
    mut commands: Commands,
    mouse_button: Res<ButtonInput<MouseButton>>,
    viewer: Res<ViewerState>,
    arm_state: Res<TextArmState>,
    mut drag_state: ResMut<NoteDragState>,
    window_query: Query<&Window, With<PrimaryWindow>>,
    camera_query: Query<(&Camera, &GlobalTransform), With<SurfaceCamera>>,
    mut contexts: EguiContexts,
    notes: Query<(Entity, &Transform, &TextNote)>,
    selected: Query<Entity, With<Selected>>,
) {
    if viewer.drawing_mode || arm_state.is_armed() {
        return;
    }

    if !mouse_button.just_pressed(MouseButton::Left) {
        return;
    }

    let Some(surface_pos) = cursor_on_surface(&window_query, &camera_query, &mut contexts) else {
        return;
    };

    let hit = notes
        .iter()
        .find(|(_, transform, note)| {
            point_in_note(surface_pos, transform.translation.truncate(), note)
        })
        .map(|(entity, transform, _)| (entity, transform.translation.truncate()));

    for entity in selected.iter() {
        commands.entity(entity).remove::<Selected>();
    }

    if let Some((entity, pos)) = hit {
        commands.entity(entity).insert(Selected);
        drag_state.dragging = Some(entity);
        drag_state.grab_offset = pos - surface_pos;
    } else {
        drag_state.dragging = None;
    }
}

/// Drag the selected note while the button is held
pub fn drag_selected_note(
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut drag_state: ResMut<NoteDragState>,
    window_query: Query<&Window, With<PrimaryWindow>>,
    camera_query: Query<(&Camera, &GlobalTransform), With<SurfaceCamera>>,
    mut contexts: EguiContexts,
    mut transforms: Query<&mut Transform, With<TextNote>>,
) {
    let Some(entity) = drag_state.dragging else {
        return;
    };

    if !mouse_button.pressed(MouseButton::Left) {
        drag_state.dragging = None;
        return;
    }

    let Some(surface_pos) = cursor_on_surface(&window_query, &camera_query, &mut contexts) else {
        return;
    };

    if let Ok(mut transform) = transforms.get_mut(entity) {
        let target = surface_pos + drag_state.grab_offset;
        transform.translation.x = target.x;
        transform.translation.y = target.y;
    }
}

/// Panning pauses whenever a note is selected
pub fn sync_pause_panning(selected: Query<(), With<Selected>>, mut pause: ResMut<PausePanning>) {
    let any_selected = !selected.is_empty();
    if pause.0 != any_selected {
        pause.0 = any_selected;
    }
}

/// Draw a highlight box around the selected note
pub fn render_selection_highlight(
    mut gizmos: Gizmos,
    selected: Query<(&Transform, &TextNote), With<Selected>>,
) {
    for (transform, note) in selected.iter() {
        let half = note_half_size(&note.content, note.font_size);
        gizmos.rect_2d(
            Isometry2d::from_translation(transform.translation.truncate()),
            half * 2.0,
            Color::srgb(0.2, 0.5, 1.0),
        );
    }
}

fn to_egui_color(color: Color, opaque: bool) -> egui::Color32 {
    let srgba = color.to_srgba();
    egui::Color32::from_rgba_unmultiplied(
        (srgba.red * 255.0) as u8,
        (srgba.green * 255.0) as u8,
        (srgba.blue * 255.0) as u8,
        if opaque { 255 } else { (srgba.alpha * 255.0) as u8 },
    )
}

/// Render notes as egui labels over their background boxes
pub fn render_text_notes(
    mut contexts: EguiContexts,
    camera_query: Query<(&Camera, &GlobalTransform), With<SurfaceCamera>>,
    notes: Query<(Entity, &Transform, &TextNote)>,
) -> Result {
    let ctx = contexts.ctx_mut()?;

    let Ok((camera, camera_transform)) = camera_query.single() else {
        return Ok(());
    };

    for (entity, transform, note) in notes.iter() {
        if note.content.is_empty() {
            continue;
        }

        let surface_pos = transform.translation.truncate();
        let Ok(screen_pos) = camera.world_to_viewport(camera_transform, surface_pos.extend(0.0))
        else {
            continue;
        };

        egui::Area::new(egui::Id::new(("text_note", entity)))
            .fixed_pos(egui::pos2(screen_pos.x, screen_pos.y))
            .pivot(egui::Align2::CENTER_CENTER)
            .interactable(false)
            .show(ctx, |ui| {
                egui::Frame::NONE
                    .fill(to_egui_color(note.background, false))
                    .show(ui, |ui| {
                        ui.label(
                            egui::RichText::new(&note.content)
                                .color(to_egui_color(note.color, true))
                                .size(note.font_size),
                        );
                    });
            });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_pending_is_one_shot() {
        let mut state = TextArmState::default();
        state.arm("hello".to_string());
        assert!(state.is_armed());

        assert_eq!(state.take_pending().as_deref(), Some("hello"));
        assert!(!state.is_armed());
        assert_eq!(state.take_pending(), None);
    }

    #[test]
    fn test_rearm_replaces_content() {
        let mut state = TextArmState::default();
        state.arm("first".to_string());
        state.arm("second".to_string());
        assert_eq!(state.take_pending().as_deref(), Some("second"));
    }

    #[test]
    fn test_disarm_drops_content() {
        let mut state = TextArmState::default();
        state.arm("note".to_string());
        state.disarm();
        assert_eq!(state.take_pending(), None);
    }

    #[test]
    fn test_note_half_size_minimums() {
        let half = note_half_size("", 10.0);
        assert_eq!(half, Vec2::new(20.0, 10.0));
    }

    #[test]
    fn test_point_in_note_bounds() {
        let note = TextNote::new("abcd".to_string());
        let pos = Vec2::new(100.0, 100.0);

        assert!(point_in_note(pos, pos, &note));
        assert!(point_in_note(Vec2::new(110.0, 105.0), pos, &note));
        assert!(!point_in_note(Vec2::new(100.0, 200.0), pos, &note));
    }

    #[test]
    fn test_note_defaults() {
        let note = TextNote::new("n".to_string());
        assert_eq!(note.font_size, 24.0);
        assert_eq!(note.background, Color::srgba(1.0, 1.0, 0.0, 0.5));
    }
}
