pub mod file_menu;
pub mod toolbar;

use bevy::prelude::*;
use bevy_egui::EguiPrimaryContextPass;

use crate::config::ConfigResetNotification;
use crate::document::DocumentLoadState;
use crate::snapshot::ExportErrorState;

/// Resource that tracks whether any modal dialog is currently open.
/// Editor input handlers should check this to avoid processing input
/// when the user is interacting with a dialog.
#[derive(Resource, Default)]
pub struct DialogState {
    /// True when any modal dialog is open that should block editor input
    pub any_modal_open: bool,
}

/// System to aggregate all dialog open states into a single resource.
/// Runs in First schedule before input handlers.
fn update_dialog_state(
    file_menu: Res<file_menu::FileMenuState>,
    load_state: Res<DocumentLoadState>,
    export_error: Res<ExportErrorState>,
    config_reset: Res<ConfigResetNotification>,
    mut dialog_state: ResMut<DialogState>,
) {
    dialog_state.any_modal_open = file_menu.show_open_dialog
        || load_state.loading
        || load_state.error.is_some()
        || export_error.message.is_some()
        || config_reset.show;
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DialogState>()
            .init_resource::<file_menu::FileMenuState>()
            .init_resource::<toolbar::ToolbarState>()
            // Panels must render before dialogs so the dialogs center over
            // the remaining space
            .add_systems(
                EguiPrimaryContextPass,
                (toolbar::toolbar_ui, toolbar::nav_bar_ui).chain(),
            )
            .add_systems(
                EguiPrimaryContextPass,
                (
                    file_menu::open_document_ui,
                    file_menu::load_error_dialog_ui,
                    file_menu::export_error_dialog_ui,
                    file_menu::config_reset_notification_ui,
                )
                    .after(toolbar::nav_bar_ui),
            )
            // Update dialog state at the start of each frame
            .add_systems(First, update_dialog_state);
    }
}
