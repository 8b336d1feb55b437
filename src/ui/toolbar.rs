// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Toolbar: region creation, editor mode, and the apply/skip decision.

use cardcrop::EditorMode;

/// What the toolbar needs to know to enable its buttons.
pub struct ToolbarState {
    pub mode: EditorMode,
    pub has_session: bool,
    pub can_add: bool,
    pub can_retry: bool,
}

/// Button pressed this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarAction {
    None,
    AddFrame,
    AddElement,
    SetMode(EditorMode),
    Apply,
    Skip,
    Retry,
}

/// Display the toolbar.
pub fn show(ui: &mut egui::Ui, state: &ToolbarState) -> ToolbarAction {
    let mut action = ToolbarAction::None;

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        ui.label("Mode:");
        for (mode, label) in [
            (EditorMode::SingleFrame, "Single frame"),
            (EditorMode::MultiRegion, "Multi-region"),
        ] {
            if ui.selectable_label(state.mode == mode, label).clicked() && state.mode != mode {
                action = ToolbarAction::SetMode(mode);
            }
        }

        ui.separator();

        let multi = state.mode == EditorMode::MultiRegion;
        let can_add = state.has_session && state.can_add && multi;
        if ui.add_enabled(can_add, egui::Button::new("▭ Add Frame")).clicked() {
            action = ToolbarAction::AddFrame;
        }
        if ui.add_enabled(can_add, egui::Button::new("◆ Add Element")).clicked() {
            action = ToolbarAction::AddElement;
        }

        ui.separator();

        if ui
            .add_enabled(state.has_session, egui::Button::new("✔ Apply Crop"))
            .clicked()
        {
            action = ToolbarAction::Apply;
        }
        if ui
            .add_enabled(state.has_session, egui::Button::new("Skip"))
            .clicked()
        {
            action = ToolbarAction::Skip;
        }

        if state.can_retry {
            ui.separator();
            if ui.button("⟳ Retry").clicked() {
                action = ToolbarAction::Retry;
            }
        }

        ui.separator();

        let hint = if !state.has_session {
            "Open an image to start cropping"
        } else if multi {
            "Drag regions to move, handles to resize, the knob to rotate"
        } else {
            "Position the card frame, then apply"
        };
        ui.label(egui::RichText::new(hint).italics().weak());
    });

    action
}
