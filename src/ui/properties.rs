// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Region list panel.
//!
//! Lists every region with its visibility toggle, shows the selected
//! region's geometry, and offers delete and rotation reset.

use cardcrop::engine::store::MAX_REGIONS;
use cardcrop::models::region::RegionId;
use cardcrop::CropSession;

/// Result of properties panel interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertiesAction {
    None,
    Select(RegionId),
    SetVisible(RegionId, bool),
    Delete(RegionId),
    ResetRotation(RegionId),
}

/// Display the panel.
pub fn show(ui: &mut egui::Ui, session: Option<&CropSession>) -> PropertiesAction {
    let mut action = PropertiesAction::None;

    ui.heading("Regions");
    ui.separator();

    let Some(session) = session else {
        ui.label(egui::RichText::new("No image loaded").weak());
        return action;
    };

    let selected = session.selected().id.clone();

    egui::ScrollArea::vertical().show(ui, |ui| {
        for region in session.regions() {
            ui.horizontal(|ui| {
                let mut visible = region.visible;
                if ui.checkbox(&mut visible, "").changed() {
                    action = PropertiesAction::SetVisible(region.id.clone(), visible);
                }
                if ui
                    .selectable_label(region.id == selected, region.label())
                    .clicked()
                {
                    action = PropertiesAction::Select(region.id.clone());
                }
                if !region.is_main() && ui.small_button("🗑").clicked() {
                    action = PropertiesAction::Delete(region.id.clone());
                }
            });
        }
    });

    ui.separator();

    let region = session.selected();
    let g = &region.geometry;
    egui::Grid::new("selected_geometry")
        .num_columns(2)
        .show(ui, |ui| {
            ui.label("Position");
            ui.label(format!("{:.1}, {:.1}", g.left, g.top));
            ui.end_row();
            ui.label("Size");
            ui.label(format!("{:.1} x {:.1}", g.width, g.height));
            ui.end_row();
            ui.label("Rotation");
            ui.label(format!("{:.1}°", g.rotation));
            ui.end_row();
        });

    if ui
        .add_enabled(g.rotation != 0.0, egui::Button::new("Reset Rotation"))
        .clicked()
    {
        action = PropertiesAction::ResetRotation(region.id.clone());
    }

    ui.add_space(8.0);
    ui.label(
        egui::RichText::new(format!("{} / {} regions", session.regions().len(), MAX_REGIONS)).weak(),
    );

    action
}
