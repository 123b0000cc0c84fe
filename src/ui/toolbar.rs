use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};

use super::file_menu::FileMenuState;
use crate::config::AppConfig;
use crate::document::{DocumentLoadState, FlipPageRequest, ViewerState};
use crate::editor::{BrushSettings, ClearAllRequest, TextArmState, UndoRequest};
use crate::snapshot::ExportSnapshotsRequest;

/// Text entry buffer for the note tool
#[derive(Resource, Default)]
pub struct ToolbarState {
    pub note_text: String,
}

/// Main toolbar with drawing controls, hidden entirely in read-only mode
pub fn toolbar_ui(
    mut contexts: EguiContexts,
    config: Res<AppConfig>,
    mut viewer: ResMut<ViewerState>,
    mut brush: ResMut<BrushSettings>,
    mut arm_state: ResMut<TextArmState>,
    mut toolbar_state: ResMut<ToolbarState>,
    mut undo_events: MessageWriter<UndoRequest>,
    mut clear_events: MessageWriter<ClearAllRequest>,
) -> Result {
    if config.data.read_only {
        return Ok(());
    }

    egui::TopBottomPanel::top("main_toolbar")
        .frame(
            egui::Frame::side_top_panel(&contexts.ctx_mut()?.style())
                .inner_margin(egui::Margin::symmetric(12, 8)),
        )
        .show(contexts.ctx_mut()?, |ui| {
            ui.add_enabled_ui(viewer.has_document(), |ui| {
                ui.horizontal(|ui| {
                    ui.spacing_mut().item_spacing.x = 4.0;

                    let draw_button = egui::Button::new(
                        egui::RichText::new("Draw").size(14.0).strong(),
                    )
                    .min_size(egui::vec2(0.0, 28.0))
                    .selected(viewer.drawing_mode);

                    let response = ui.add(draw_button);
                    if response.clicked() {
                        viewer.drawing_mode = !viewer.drawing_mode;
                        if viewer.drawing_mode {
                            arm_state.disarm();
                        }
                    }
                    response.on_hover_text("Toggle freehand drawing");

                    ui.add_space(8.0);
                    ui.separator();
                    ui.add_space(8.0);

                    ui.label("Color:");
                    color_swatches(ui, &mut brush);

                    ui.add_space(8.0);
                    ui.label("Width:");
                    ui.add(
                        egui::DragValue::new(&mut brush.width)
                            .range(1.0..=20.0)
                            .speed(0.5)
                            .suffix(" px"),
                    );

                    ui.add_space(8.0);
                    ui.separator();
                    ui.add_space(8.0);

                    ui.add(
                        egui::TextEdit::singleline(&mut toolbar_state.note_text)
                            .hint_text("Note text")
                            .desired_width(160.0),
                    );

                    let can_arm = !toolbar_state.note_text.trim().is_empty();
                    if ui
                        .add_enabled(can_arm, egui::Button::new("Add Text"))
                        .clicked()
                    {
                        // Arming switches drawing off so the placement click
                        // cannot leave a stray stroke
                        arm_state.arm(toolbar_state.note_text.trim().to_string());
                        viewer.drawing_mode = false;
                        toolbar_state.note_text.clear();
                    }
                    if arm_state.is_armed() {
                        ui.label(
                            egui::RichText::new("click the page to place")
                                .color(egui::Color32::GRAY)
                                .size(11.0),
                        );
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Clear").clicked() {
                            clear_events.write(ClearAllRequest);
                        }
                        if ui.button("Undo").clicked() {
                            undo_events.write(UndoRequest);
                        }
                    });
                });
            });
        });
    Ok(())
}

fn color_swatches(ui: &mut egui::Ui, brush: &mut BrushSettings) {
    let colors = [
        (Color::srgb(0.85, 0.1, 0.1), "Red", egui::Color32::from_rgb(217, 26, 26)),
        (Color::srgb(0.0, 0.0, 1.0), "Blue", egui::Color32::BLUE),
        (
            Color::srgb(0.0, 0.8, 0.0),
            "Green",
            egui::Color32::from_rgb(0, 200, 0),
        ),
        (
            Color::srgb(1.0, 1.0, 0.0),
            "Yellow",
            egui::Color32::YELLOW,
        ),
        (Color::srgb(0.0, 0.0, 0.0), "Black", egui::Color32::BLACK),
        (
            Color::srgb(1.0, 0.5, 0.0),
            "Orange",
            egui::Color32::from_rgb(255, 128, 0),
        ),
    ];

    for (color, name, egui_color) in colors {
        let current = brush.color.to_srgba();
        let srgba = color.to_srgba();
        let is_selected = (current.red - srgba.red).abs() < 0.01
            && (current.green - srgba.green).abs() < 0.01
            && (current.blue - srgba.blue).abs() < 0.01;

        let button = egui::Button::new("")
            .fill(egui_color)
            .min_size(egui::vec2(18.0, 18.0))
            .stroke(if is_selected {
                egui::Stroke::new(2.0, egui::Color32::WHITE)
            } else {
                egui::Stroke::new(1.0, egui::Color32::DARK_GRAY)
            });

        let response = ui.add(button);
        if response.clicked() {
            brush.color = color;
        }
        response.on_hover_text(name);
    }
}

/// Bottom navigation bar, always visible: page flips, open and export
pub fn nav_bar_ui(
    mut contexts: EguiContexts,
    viewer: Res<ViewerState>,
    load_state: Res<DocumentLoadState>,
    mut menu_state: ResMut<FileMenuState>,
    mut flip_events: MessageWriter<FlipPageRequest>,
    mut export_events: MessageWriter<ExportSnapshotsRequest>,
) -> Result {
    egui::TopBottomPanel::bottom("page_nav")
        .frame(
            egui::Frame::side_top_panel(&contexts.ctx_mut()?.style())
                .inner_margin(egui::Margin::symmetric(12, 8)),
        )
        .show(contexts.ctx_mut()?, |ui| {
            ui.horizontal(|ui| {
                ui.spacing_mut().item_spacing.x = 6.0;

                let at_first = viewer.current_page <= 1;
                let at_last = viewer.current_page >= viewer.total_pages;

                if ui
                    .add_enabled(!at_first, egui::Button::new("< Prev"))
                    .clicked()
                {
                    flip_events.write(FlipPageRequest {
                        page: viewer.current_page - 1,
                    });
                }

                if viewer.has_document() {
                    ui.label(format!("{}/{}", viewer.current_page, viewer.total_pages));
                } else {
                    ui.label("-/-");
                }

                if ui
                    .add_enabled(viewer.has_document() && !at_last, egui::Button::new("Next >"))
                    .clicked()
                {
                    flip_events.write(FlipPageRequest {
                        page: viewer.current_page + 1,
                    });
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Export PNGs...").clicked() {
                        export_events.write(ExportSnapshotsRequest);
                    }
                    if ui.button("Open...").clicked() {
                        menu_state.show_open_dialog = true;
                    }
                    if load_state.loading {
                        ui.spinner();
                        ui.label("Loading...");
                    }
                });
            });
        });
    Ok(())
}
