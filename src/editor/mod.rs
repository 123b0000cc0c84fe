pub mod conditions;
pub mod draw;
pub mod history;
pub mod params;
pub mod text;
pub mod viewport;

pub use draw::{BrushSettings, StrokePath};
pub use history::{AnnotationMarker, ClearAllRequest, UndoRequest};
pub use text::{TextArmState, TextNote};
pub use viewport::{SurfaceCamera, ViewportState};

use bevy::prelude::*;
use bevy_egui::EguiPrimaryContextPass;

use conditions::{editing_allowed, no_dialog_open};

pub struct EditorPlugin;

impl Plugin for EditorPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<viewport::ViewportState>()
            .init_resource::<viewport::PausePanning>()
            .init_resource::<draw::DrawState>()
            .init_resource::<draw::BrushSettings>()
            .init_resource::<history::AnnotationSequence>()
            .init_resource::<text::TextArmState>()
            .init_resource::<text::NoteDragState>()
            .add_message::<history::UndoRequest>()
            .add_message::<history::ClearAllRequest>()
            .add_systems(Startup, viewport::spawn_camera)
            // Selection must settle before pan gating looks at it
            .add_systems(
                Update,
                (
                    (
                        text::place_armed_text,
                        text::select_note,
                        text::drag_selected_note,
                    )
                        .chain()
                        .run_if(editing_allowed)
                        .run_if(no_dialog_open),
                    text::sync_pause_panning,
                    (
                        viewport::pinch_zoom,
                        viewport::wheel_zoom,
                        viewport::pan_drag,
                    )
                        .run_if(no_dialog_open),
                    viewport::apply_viewport,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    draw::handle_draw
                        .run_if(editing_allowed)
                        .run_if(no_dialog_open),
                    draw::render_strokes,
                    draw::render_draw_preview,
                    text::render_selection_highlight,
                ),
            )
            .add_systems(
                Update,
                (
                    history::undo_shortcut
                        .run_if(editing_allowed)
                        .run_if(no_dialog_open),
                    history::handle_undo.run_if(on_message::<history::UndoRequest>),
                    history::handle_clear_all.run_if(on_message::<history::ClearAllRequest>),
                ),
            )
            .add_systems(EguiPrimaryContextPass, text::render_text_notes);
    }
}
