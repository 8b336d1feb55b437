// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Main application state and egui App implementation.
//!
//! The app owns at most one [`CropSession`]. Images are acquired on a
//! background thread; progress and the finished asset come back over a
//! channel and are picked up at the start of each frame.

use crate::ui::{canvas, properties, toolbar};
use cardcrop::engine::session::CropOutcome;
use cardcrop::io::acquire::AcquireProgress;
use cardcrop::io::serialization;
use cardcrop::{
    CropError, CropSession, EditorConfig, EditorMode, ImageAcquirer, ImageAsset, LocalFetcher,
    RegionId, RegionKind, SystemClock,
};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver};

/// Canvas pixels moved per arrow key press (Shift multiplies by ten).
const NUDGE_STEP: f64 = 1.0;

/// Messages from the acquisition thread.
enum LoaderMessage {
    Progress(AcquireProgress),
    Done(ImageAsset),
}

/// Main application state.
pub struct CropApp {
    config: EditorConfig,

    /// Open editor, once the image is loaded and the canvas measured
    session: Option<CropSession>,

    /// Loaded asset waiting for the first canvas measurement
    pending_asset: Option<ImageAsset>,

    /// Image texture for display
    texture: Option<egui::TextureHandle>,

    /// URL of the last requested image, for retry
    source_url: Option<String>,

    /// Receiver for background acquisition
    loader: Option<Receiver<LoaderMessage>>,

    /// Loading state message
    loading_message: Option<String>,

    /// Last acquisition failed in a way worth retrying
    retryable: bool,

    /// Pointer drag in progress on the canvas
    drag: Option<canvas::Drag>,

    /// Status bar message
    notice: Option<String>,
}

impl Default for CropApp {
    fn default() -> Self {
        Self::new()
    }
}

impl CropApp {
    pub fn new() -> Self {
        Self {
            config: EditorConfig::default(),
            session: None,
            pending_asset: None,
            texture: None,
            source_url: None,
            loader: None,
            loading_message: None,
            retryable: false,
            drag: None,
            notice: None,
        }
    }

    /// Start acquiring an image on a background thread.
    pub fn open_image(&mut self, url: String) {
        let (sender, receiver) = channel();
        self.loader = Some(receiver);
        self.loading_message = Some("Loading image...".to_string());
        self.session = None;
        self.pending_asset = None;
        self.texture = None;
        self.drag = None;
        self.retryable = false;
        self.notice = None;
        self.source_url = Some(url.clone());

        let policy = self.config.acquire.clone();
        std::thread::spawn(move || {
            let acquirer = ImageAcquirer::new(LocalFetcher, SystemClock, policy);
            let progress = sender.clone();
            let asset = acquirer.acquire(&url, |p| {
                let _ = progress.send(LoaderMessage::Progress(p.clone()));
            });
            let _ = sender.send(LoaderMessage::Done(asset));
        });
    }

    /// Replace the settings from a YAML or JSON file.
    pub fn load_settings(&mut self, path: &Path) {
        match serialization::load_settings(path) {
            Ok(config) => {
                log::info!("Loaded settings from {}", path.display());
                self.config = config;
                self.restart_session();
                self.notice = Some(format!("Loaded settings from {}", path.display()));
            }
            Err(e) => {
                log::error!("Failed to load settings: {:#}", e);
                self.notice = Some(format!("{:#}", e));
            }
        }
    }

    fn save_settings(&mut self, path: &Path) {
        match serialization::save_settings(&self.config, path) {
            Ok(()) => {
                log::info!("Saved settings to {}", path.display());
                self.notice = Some(format!("Saved settings to {}", path.display()));
            }
            Err(e) => {
                log::error!("Failed to save settings: {:#}", e);
                self.notice = Some(format!("{:#}", e));
            }
        }
    }

    /// Rebuild the session with the current settings, keeping the image.
    fn restart_session(&mut self) {
        if let Some(session) = self.session.take() {
            self.pending_asset = Some(session.asset().clone());
        }
        self.drag = None;
    }

    fn set_mode(&mut self, mode: EditorMode) {
        self.config.mode = mode;
        self.restart_session();
        log::info!("Switched to {:?} mode", mode);
    }

    fn report(&mut self, err: CropError) {
        log::warn!("{}", err);
        self.notice = Some(err.notice());
    }

    /// Run a fallible session operation and surface its error.
    fn with_session(&mut self, f: impl FnOnce(&mut CropSession) -> cardcrop::Result<()>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(err) = f(session) {
            self.report(err);
        }
    }

    fn poll_loader(&mut self, ctx: &egui::Context) {
        let Some(receiver) = self.loader.as_ref() else {
            return;
        };
        let mut finished = None;
        while let Ok(message) = receiver.try_recv() {
            match message {
                LoaderMessage::Progress(AcquireProgress::Attempting { attempt, url }) => {
                    log::debug!("Attempt {} for {}", attempt + 1, url);
                    self.loading_message = Some(format!("Loading image (attempt {})...", attempt + 1));
                }
                LoaderMessage::Progress(AcquireProgress::Retrying { retry, wait, reason }) => {
                    self.loading_message = Some(format!(
                        "Image not ready ({}), retry {} in {:.0}s...",
                        reason,
                        retry,
                        wait.as_secs_f64()
                    ));
                }
                LoaderMessage::Done(asset) => finished = Some(asset),
            }
        }
        let Some(asset) = finished else {
            return;
        };
        self.loader = None;
        self.loading_message = None;

        if let Some(err) = asset.error() {
            self.retryable = err.is_retryable();
            self.report(err.clone());
            return;
        }
        if let Some(pixels) = asset.pixels() {
            let size = [pixels.width() as usize, pixels.height() as usize];
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_raw());
            self.texture =
                Some(ctx.load_texture("crop_image", color_image, egui::TextureOptions::LINEAR));
            log::info!(
                "Image loaded successfully after {} retries",
                asset.retries
            );
        }
        self.pending_asset = Some(asset);
    }

    fn apply(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let outcome = match session.apply() {
            Ok(outcome) => outcome,
            Err(err) => return self.report(err),
        };
        let CropOutcome::Applied { region_id, image, .. } = outcome else {
            return;
        };
        let extension = self.config.export_settings().format.extension();
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Image", &[extension])
            .set_file_name(format!("{}.{}", region_id, extension))
            .save_file()
        else {
            return;
        };
        match std::fs::write(&path, &image.bytes) {
            Ok(()) => {
                log::info!("Saved crop to {}", path.display());
                self.notice = Some(format!(
                    "Saved {}x{} crop to {}",
                    image.width,
                    image.height,
                    path.display()
                ));
            }
            Err(e) => {
                log::error!("Failed to save crop: {}", e);
                self.notice = Some(format!("Failed to save crop: {}", e));
            }
        }
    }

    /// Save every visible region into a folder, one file per region.
    fn export_all(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let exported = match session.export_visible() {
            Ok(exported) => exported,
            Err(err) => return self.report(err),
        };
        let Some(dir) = rfd::FileDialog::new().pick_folder() else {
            return;
        };
        let extension = self.config.export_settings().format.extension();
        let mut saved = 0;
        for (id, image) in &exported {
            let path = dir.join(format!("{}.{}", id, extension));
            match std::fs::write(&path, &image.bytes) {
                Ok(()) => saved += 1,
                Err(e) => log::error!("Failed to save {}: {}", path.display(), e),
            }
        }
        log::info!("Exported {} of {} regions to {}", saved, exported.len(), dir.display());
        self.notice = Some(format!("Exported {} regions to {}", saved, dir.display()));
    }

    fn skip(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let CropOutcome::Skipped { source_url } = session.skip() {
            log::info!("Skipped cropping, keeping {}", source_url);
            self.notice = Some(format!("Kept original image {}", source_url));
        }
        self.texture = None;
        self.drag = None;
    }

    fn add_region(&mut self, kind: RegionKind) {
        self.with_session(|s| s.add_region(kind).map(|id| log::info!("Added region {}", id)));
    }

    fn delete_region(&mut self, id: &RegionId) {
        self.with_session(|s| s.delete_region(id));
    }

    fn delete_selected(&mut self) {
        if let Some(id) = self.session.as_ref().map(|s| s.selected().id.clone()) {
            self.delete_region(&id);
        }
    }

    fn reset_rotation(&mut self) {
        self.with_session(|s| {
            let id = s.selected().id.clone();
            s.reset_rotation(&id)
        });
    }

    fn undo(&mut self) {
        self.drag = None;
        if let Some(session) = self.session.as_mut() {
            session.undo();
        }
    }

    fn redo(&mut self) {
        self.drag = None;
        if let Some(session) = self.session.as_mut() {
            session.redo();
        }
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.drag = None;
            if let Some(session) = self.session.as_mut() {
                session.cancel_gesture();
            }
        }

        // Only process if no text field is focused
        if ctx.wants_keyboard_input() {
            return;
        }

        if ctx.input(|i| i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace)) {
            self.delete_selected();
        }

        // Handle undo (Ctrl+Z)
        if ctx.input(|i| i.modifiers.command && i.key_pressed(egui::Key::Z) && !i.modifiers.shift) {
            self.undo();
        }

        // Handle redo (Ctrl+Shift+Z or Ctrl+Y)
        if ctx.input(|i| {
            (i.modifiers.command && i.modifiers.shift && i.key_pressed(egui::Key::Z))
                || (i.modifiers.command && i.key_pressed(egui::Key::Y))
        }) {
            self.redo();
        }

        let (dx, dy, fast) = ctx.input(|i| {
            let mut dx = 0.0;
            let mut dy = 0.0;
            if i.key_pressed(egui::Key::ArrowLeft) {
                dx -= 1.0;
            }
            if i.key_pressed(egui::Key::ArrowRight) {
                dx += 1.0;
            }
            if i.key_pressed(egui::Key::ArrowUp) {
                dy -= 1.0;
            }
            if i.key_pressed(egui::Key::ArrowDown) {
                dy += 1.0;
            }
            (dx, dy, i.modifiers.shift)
        });
        if (dx != 0.0 || dy != 0.0) && self.drag.is_none() {
            let step = if fast { NUDGE_STEP * 10.0 } else { NUDGE_STEP };
            self.with_session(|s| {
                let id = s.selected().id.clone();
                s.nudge(&id, dx * step, dy * step)
            });
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open Image...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("Images", &["jpg", "jpeg", "png", "bmp", "gif", "webp"])
                        .pick_file()
                    {
                        self.open_image(path.to_string_lossy().to_string());
                    }
                    ui.close_menu();
                }
                let multi = self.config.mode == EditorMode::MultiRegion;
                if ui
                    .add_enabled(self.session.is_some() && multi, egui::Button::new("Export Visible Regions..."))
                    .clicked()
                {
                    self.export_all();
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("Load Settings...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("Settings", &["yaml", "yml", "json"])
                        .pick_file()
                    {
                        self.load_settings(&path);
                    }
                    ui.close_menu();
                }
                if ui.button("Save Settings...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("YAML", &["yaml", "yml"])
                        .add_filter("JSON", &["json"])
                        .set_file_name("cardcrop.yaml")
                        .save_file()
                    {
                        self.save_settings(&path);
                    }
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("Quit").clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });

            ui.menu_button("Edit", |ui| {
                let can_undo = self.session.as_ref().is_some_and(|s| s.can_undo());
                if ui.add_enabled(can_undo, egui::Button::new("Undo (Ctrl+Z)")).clicked() {
                    self.undo();
                    ui.close_menu();
                }
                let can_redo = self.session.as_ref().is_some_and(|s| s.can_redo());
                if ui.add_enabled(can_redo, egui::Button::new("Redo (Ctrl+Shift+Z)")).clicked() {
                    self.redo();
                    ui.close_menu();
                }

                ui.separator();

                let can_delete = self.session.as_ref().is_some_and(|s| !s.selected().is_main());
                if ui.add_enabled(can_delete, egui::Button::new("Delete Selected")).clicked() {
                    self.delete_selected();
                    ui.close_menu();
                }
                let rotated = self
                    .session
                    .as_ref()
                    .is_some_and(|s| s.selected().geometry.rotation != 0.0);
                if ui.add_enabled(rotated, egui::Button::new("Reset Rotation")).clicked() {
                    self.reset_rotation();
                    ui.close_menu();
                }
            });

            ui.menu_button("View", |ui| {
                let mut grid = self.config.grid_visible;
                if ui.checkbox(&mut grid, "Show Grid").changed() {
                    self.config.grid_visible = grid;
                    if let Some(session) = self.session.as_mut() {
                        session.set_grid_visible(grid);
                    }
                    ui.close_menu();
                }
                let mut compact = self.config.compact;
                if ui.checkbox(&mut compact, "Compact Layout").changed() {
                    self.config.compact = compact;
                    self.restart_session();
                    ui.close_menu();
                }
            });
        });
    }
}

impl eframe::App for CropApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_loader(ctx);

        // Request repaint if still loading (to update spinner)
        if self.loading_message.is_some() {
            ctx.request_repaint();
        }

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| self.menu_bar(ctx, ui));

        let toolbar_state = toolbar::ToolbarState {
            mode: self.config.mode,
            has_session: self.session.is_some(),
            can_add: self.session.as_ref().is_some_and(|s| !s.is_full()),
            can_retry: self.retryable && self.loader.is_none() && self.source_url.is_some(),
        };
        let toolbar_action = egui::TopBottomPanel::top("toolbar")
            .show(ctx, |ui| toolbar::show(ui, &toolbar_state))
            .inner;
        match toolbar_action {
            toolbar::ToolbarAction::AddFrame => self.add_region(RegionKind::Frame),
            toolbar::ToolbarAction::AddElement => self.add_region(RegionKind::Element),
            toolbar::ToolbarAction::SetMode(mode) => self.set_mode(mode),
            toolbar::ToolbarAction::Apply => self.apply(),
            toolbar::ToolbarAction::Skip => self.skip(),
            toolbar::ToolbarAction::Retry => {
                if let Some(url) = self.source_url.clone() {
                    self.open_image(url);
                }
            }
            toolbar::ToolbarAction::None => {}
        }

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| match (&self.loading_message, &self.notice) {
                (Some(message), _) => {
                    ui.spinner();
                    ui.label(message);
                }
                (None, Some(notice)) => {
                    ui.label(notice);
                }
                (None, None) if self.session.is_some() => {
                    ui.label("Ready");
                }
                (None, None) => {
                    ui.label("No image loaded");
                }
            });
        });

        let properties_action = egui::SidePanel::right("properties")
            .default_width(250.0)
            .show(ctx, |ui| properties::show(ui, self.session.as_ref()))
            .inner;
        match properties_action {
            properties::PropertiesAction::Select(id) => self.with_session(|s| s.select(&id)),
            properties::PropertiesAction::SetVisible(id, visible) => {
                self.with_session(|s| s.set_visible(&id, visible))
            }
            properties::PropertiesAction::Delete(id) => self.delete_region(&id),
            properties::PropertiesAction::ResetRotation(id) => {
                self.with_session(|s| s.reset_rotation(&id))
            }
            properties::PropertiesAction::None => {}
        }

        self.handle_keyboard(ctx);

        let canvas_action = egui::CentralPanel::default()
            .show(ctx, |ui| {
                if let Some(ref message) = self.loading_message {
                    ui.centered_and_justified(|ui| {
                        ui.vertical_centered(|ui| {
                            ui.add_space(20.0);
                            ui.spinner();
                            ui.add_space(10.0);
                            ui.label(
                                egui::RichText::new(message)
                                    .size(16.0)
                                    .color(egui::Color32::from_gray(200)),
                            );
                        });
                    });
                    return canvas::CanvasAction::None;
                }

                let size = ui.available_size();
                let (width, height) = (size.x as f64, size.y as f64);
                if let Some(asset) = self.pending_asset.take() {
                    match CropSession::new(asset, width, height, self.config.clone()) {
                        Ok(session) => self.session = Some(session),
                        Err(err) => self.report(err),
                    }
                }

                match self.session.as_mut() {
                    Some(session) => {
                        session.resize_canvas(width, height);
                        canvas::show(ui, session, self.texture.as_ref(), &mut self.drag)
                    }
                    None => {
                        ui.centered_and_justified(|ui| {
                            ui.label(
                                egui::RichText::new("File → Open Image...")
                                    .weak()
                                    .color(egui::Color32::from_gray(130)),
                            );
                        });
                        canvas::CanvasAction::None
                    }
                }
            })
            .inner;

        match canvas_action {
            canvas::CanvasAction::BeginGesture(id) => {
                self.with_session(|s| s.begin_gesture(&id));
            }
            canvas::CanvasAction::UpdateGesture(delta) => {
                self.with_session(|s| s.update_gesture(delta).map(|_| ()));
            }
            canvas::CanvasAction::EndGesture => {
                if let Some(session) = self.session.as_mut() {
                    session.end_gesture();
                }
            }
            canvas::CanvasAction::None => {}
        }
    }
}
