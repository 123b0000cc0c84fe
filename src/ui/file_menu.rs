use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};

use crate::config::{AppConfig, ConfigResetNotification, SetDocumentLocatorRequest};
use crate::document::{DocumentLoadState, OpenDocumentRequest};
use crate::snapshot::ExportErrorState;

#[derive(Resource, Default)]
pub struct FileMenuState {
    pub show_open_dialog: bool,
    pub locator_input: String,
}

/// Renders the open-document dialog: a path or URL entry with a file browser
pub fn open_document_ui(
    mut contexts: EguiContexts,
    mut menu_state: ResMut<FileMenuState>,
    mut open_events: MessageWriter<OpenDocumentRequest>,
    mut locator_events: MessageWriter<SetDocumentLocatorRequest>,
) -> Result {
    if !menu_state.show_open_dialog {
        return Ok(());
    }

    egui::Window::new("Open Document")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(contexts.ctx_mut()?, |ui| {
            ui.horizontal(|ui| {
                ui.label("Path or URL:");
                ui.add(
                    egui::TextEdit::singleline(&mut menu_state.locator_input)
                        .desired_width(280.0),
                );
                if ui.button("Browse...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("PDF Files", &["pdf"])
                        .set_title("Open Document")
                        .pick_file()
                    {
                        menu_state.locator_input = path.to_string_lossy().into_owned();
                    }
                }
            });
            ui.horizontal(|ui| {
                let locator = menu_state.locator_input.trim().to_string();
                if ui
                    .add_enabled(!locator.is_empty(), egui::Button::new("Open"))
                    .clicked()
                {
                    open_events.write(OpenDocumentRequest {
                        locator: locator.clone(),
                    });
                    locator_events.write(SetDocumentLocatorRequest { locator });
                    menu_state.show_open_dialog = false;
                }
                if ui.button("Cancel").clicked() {
                    menu_state.show_open_dialog = false;
                }
            });
        });

    Ok(())
}

/// Renders the load error dialog with a retry for the configured document
pub fn load_error_dialog_ui(
    mut contexts: EguiContexts,
    mut load_state: ResMut<DocumentLoadState>,
    config: Res<AppConfig>,
    mut open_events: MessageWriter<OpenDocumentRequest>,
) -> Result {
    let Some(error) = load_state.error.clone() else {
        return Ok(());
    };

    egui::Window::new("Load Error")
        .collapsible(false)
        .resizable(true)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(contexts.ctx_mut()?, |ui| {
            egui::ScrollArea::vertical().max_height(200.0).show(ui, |ui| {
                ui.colored_label(egui::Color32::RED, &error);
            });
            ui.horizontal(|ui| {
                if ui.button("OK").clicked() {
                    load_state.error = None;
                }
                if let Some(ref locator) = config.data.document_locator {
                    if ui.button("Retry").clicked() {
                        open_events.write(OpenDocumentRequest {
                            locator: locator.clone(),
                        });
                        load_state.error = None;
                    }
                }
            });
        });

    Ok(())
}

/// Renders the export error dialog
pub fn export_error_dialog_ui(
    mut contexts: EguiContexts,
    mut error_state: ResMut<ExportErrorState>,
) -> Result {
    let Some(error) = error_state.message.clone() else {
        return Ok(());
    };

    egui::Window::new("Export Error")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(contexts.ctx_mut()?, |ui| {
            ui.colored_label(egui::Color32::RED, &error);
            if ui.button("OK").clicked() {
                error_state.message = None;
            }
        });

    Ok(())
}

/// Renders the notification shown when a corrupted config was reset
pub fn config_reset_notification_ui(
    mut contexts: EguiContexts,
    mut notification: ResMut<ConfigResetNotification>,
) -> Result {
    if !notification.show {
        return Ok(());
    }

    egui::Window::new("Settings Reset")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(contexts.ctx_mut()?, |ui| {
            ui.label("The settings file could not be read and was reset to defaults.");
            if let Some(ref reason) = notification.reason {
                ui.add_space(5.0);
                ui.label(egui::RichText::new(reason).weak());
            }
            ui.add_space(10.0);
            if ui.button("OK").clicked() {
                notification.show = false;
            }
        });

    Ok(())
}
