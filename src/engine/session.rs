// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Crop session.
//!
//! A [`CropSession`] owns everything one open crop editor needs: the loaded
//! image, its placement on the canvas, the region store, history and the
//! gesture in progress. The UI holds the session and passes it by reference
//! into every operation; closing the editor drops it, and with it any
//! half-finished gesture.

use crate::config::EditorConfig;
use crate::engine::constraints::{self, GestureDelta};
use crate::engine::grid::{self, GridOverlay};
use crate::engine::history::{HistoryEntry, HistoryStack};
use crate::engine::store::RegionStore;
use crate::error::{CropError, Result};
use crate::io::export::{self, ExportedImage};
use crate::models::asset::ImageAsset;
use crate::models::region::{CropRegion, Geometry, RegionId, RegionKind};
use crate::util::geometry::{fit, Placement, Rect};

/// What the editor hands back to the creation flow.
#[derive(Debug, Clone, PartialEq)]
pub enum CropOutcome {
    /// The user applied a crop.
    Applied {
        region_id: RegionId,
        data_url: String,
        image: ExportedImage,
    },
    /// The user skipped cropping; the original reference passes through.
    Skipped { source_url: String },
}

#[derive(Debug, Clone)]
struct ActiveGesture {
    region_id: RegionId,
    before: Geometry,
}

/// State of one open crop editor.
pub struct CropSession {
    config: EditorConfig,
    asset: ImageAsset,
    canvas_width: f64,
    canvas_height: f64,
    placement: Placement,
    store: RegionStore,
    history: HistoryStack,
    gesture: Option<ActiveGesture>,
    grid_visible: bool,
}

impl CropSession {
    /// Open a session over a loaded image. The `main` frame is created
    /// immediately.
    pub fn new(
        asset: ImageAsset,
        canvas_width: f64,
        canvas_height: f64,
        config: EditorConfig,
    ) -> Result<Self> {
        if let Some(err) = asset.error() {
            return Err(err.clone());
        }
        if !asset.is_ready() {
            return Err(CropError::ImageNotReady);
        }
        config.validate()?;

        let placement = fit(
            asset.natural_width,
            asset.natural_height,
            canvas_width,
            canvas_height,
            config.padding(),
            config.mode.alignment(),
        );
        let bounds = placement.image_bounds(asset.natural_width, asset.natural_height);
        let store = RegionStore::new(config.aspect_ratio, &bounds);
        log::info!(
            "Opened crop session for {} ({}x{}) at scale {:.3}",
            asset.source_url,
            asset.natural_width,
            asset.natural_height,
            placement.scale
        );

        Ok(Self {
            history: HistoryStack::new(config.history_limit),
            grid_visible: config.grid_visible,
            config,
            asset,
            canvas_width,
            canvas_height,
            placement,
            store,
            gesture: None,
        })
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn asset(&self) -> &ImageAsset {
        &self.asset
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Canvas-space rectangle covered by the image.
    pub fn image_bounds(&self) -> Rect {
        self.placement
            .image_bounds(self.asset.natural_width, self.asset.natural_height)
    }

    pub fn regions(&self) -> &[CropRegion] {
        self.store.regions()
    }

    pub fn region(&self, id: &RegionId) -> Option<&CropRegion> {
        self.store.get(id)
    }

    pub fn selected(&self) -> &CropRegion {
        self.store.selected()
    }

    pub fn select(&mut self, id: &RegionId) -> Result<()> {
        self.store.select(id)
    }

    pub fn is_full(&self) -> bool {
        self.store.is_full()
    }

    /// Recompute the placement for a new canvas size and carry every region
    /// (and history entry) along so each keeps covering the same pixels.
    pub fn resize_canvas(&mut self, canvas_width: f64, canvas_height: f64) {
        if (canvas_width, canvas_height) == (self.canvas_width, self.canvas_height) {
            return;
        }
        let from = self.placement;
        let to = fit(
            self.asset.natural_width,
            self.asset.natural_height,
            canvas_width,
            canvas_height,
            self.config.padding(),
            self.config.mode.alignment(),
        );
        self.canvas_width = canvas_width;
        self.canvas_height = canvas_height;
        self.placement = to;

        let bounds = self.image_bounds();
        let remap = |g: &Geometry| constraints::contain(&remap_geometry(g, &from, &to), &bounds);
        self.store.remap(remap);
        self.history.remap(remap);
        if let Some(gesture) = &mut self.gesture {
            gesture.before = remap(&gesture.before);
        }
        log::debug!(
            "Canvas resized to {}x{}, scale {:.3}",
            canvas_width,
            canvas_height,
            to.scale
        );
    }

    /// Add a frame or element region.
    pub fn add_region(&mut self, kind: RegionKind) -> Result<RegionId> {
        self.finish_gesture_if_any();
        let bounds = self.image_bounds();
        let region = self.store.create_region(kind, &bounds)?;
        Ok(region.id.clone())
    }

    /// Delete a region; its history goes with it.
    pub fn delete_region(&mut self, id: &RegionId) -> Result<()> {
        if self.gesture.as_ref().is_some_and(|g| g.region_id == *id) {
            self.gesture = None;
        }
        self.store.delete_region(id)?;
        self.history.forget_region(id);
        Ok(())
    }

    pub fn set_visible(&mut self, id: &RegionId, visible: bool) -> Result<()> {
        self.store.set_visible(id, visible)
    }

    /// Pointer down on a region: remember where it started.
    pub fn begin_gesture(&mut self, id: &RegionId) -> Result<()> {
        self.finish_gesture_if_any();
        let before = self
            .store
            .get(id)
            .map(|r| r.geometry)
            .ok_or_else(|| CropError::UnknownRegion(id.to_string()))?;
        self.store.select(id)?;
        self.gesture = Some(ActiveGesture {
            region_id: id.clone(),
            before,
        });
        Ok(())
    }

    /// Pointer move: `delta` is measured from where the gesture began, so the
    /// region tracks the pointer even after being held at an edge.
    pub fn update_gesture(&mut self, delta: GestureDelta) -> Result<&CropRegion> {
        let gesture = self
            .gesture
            .clone()
            .ok_or(CropError::NoActiveGesture)?;
        let bounds = self.image_bounds();
        self.store.set_geometry(&gesture.region_id, gesture.before)?;
        self.store.update_region(&gesture.region_id, delta, &bounds)
    }

    /// Pointer up: commit one history entry if anything changed.
    pub fn end_gesture(&mut self) -> bool {
        let Some(gesture) = self.gesture.take() else {
            return false;
        };
        let Some(after) = self.store.get(&gesture.region_id).map(|r| r.geometry) else {
            return false;
        };
        if after == gesture.before {
            return false;
        }
        log::debug!("Committed gesture on region {}", gesture.region_id);
        self.history.commit(gesture.region_id, gesture.before);
        true
    }

    /// Abandon the gesture in progress and restore the region.
    pub fn cancel_gesture(&mut self) {
        if let Some(gesture) = self.gesture.take() {
            let _ = self.store.set_geometry(&gesture.region_id, gesture.before);
        }
    }

    /// A complete single-step edit (keyboard nudge, button), committed as
    /// one history entry.
    pub fn apply_edit(&mut self, id: &RegionId, delta: GestureDelta) -> Result<()> {
        self.begin_gesture(id)?;
        if let Err(err) = self.update_gesture(delta) {
            self.cancel_gesture();
            return Err(err);
        }
        self.end_gesture();
        Ok(())
    }

    pub fn nudge(&mut self, id: &RegionId, dx: f64, dy: f64) -> Result<()> {
        self.apply_edit(id, GestureDelta::Move { dx, dy })
    }

    /// Set rotation back to 0 degrees (undoable).
    pub fn reset_rotation(&mut self, id: &RegionId) -> Result<()> {
        self.apply_edit(id, GestureDelta::Rotate { degrees: 0.0 })
    }

    pub fn undo(&mut self) -> Option<HistoryEntry> {
        self.cancel_gesture();
        self.history.undo(&mut self.store)
    }

    pub fn redo(&mut self) -> Option<HistoryEntry> {
        self.cancel_gesture();
        self.history.redo(&mut self.store)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn grid_visible(&self) -> bool {
        self.grid_visible
    }

    pub fn set_grid_visible(&mut self, visible: bool) {
        self.grid_visible = visible;
    }

    /// Grid lines for the current frame.
    pub fn grid_overlay(&self) -> GridOverlay {
        if !self.grid_visible {
            return GridOverlay::default();
        }
        grid::render(
            self.config.grid_mode(),
            Some(self.store.selected()),
            self.canvas_width,
            self.canvas_height,
        )
    }

    /// Export the selected region with the configured settings.
    pub fn export_selected(&self) -> Result<ExportedImage> {
        export::export(
            self.store.selected(),
            &self.asset,
            &self.placement,
            &self.config.export_settings(),
        )
    }

    /// Export every visible region.
    pub fn export_visible(&self) -> Result<Vec<(RegionId, ExportedImage)>> {
        export::export_visible(
            self.store.regions(),
            &self.asset,
            &self.placement,
            &self.config.export_settings(),
        )
    }

    /// "Apply Crop": export the selected region.
    pub fn apply(&mut self) -> Result<CropOutcome> {
        self.finish_gesture_if_any();
        let image = self.export_selected()?;
        Ok(CropOutcome::Applied {
            region_id: self.store.selected_id().clone(),
            data_url: image.data_url(),
            image,
        })
    }

    /// "Skip": hand back the original image reference untouched.
    pub fn skip(&self) -> CropOutcome {
        CropOutcome::Skipped {
            source_url: self.asset.source_url.clone(),
        }
    }

    fn finish_gesture_if_any(&mut self) {
        if self.gesture.is_some() {
            self.end_gesture();
        }
    }
}

/// Carry canvas geometry from one placement to another through image space.
fn remap_geometry(geometry: &Geometry, from: &Placement, to: &Placement) -> Geometry {
    if from.scale <= 0.0 {
        return *geometry;
    }
    let ratio = to.scale / from.scale;
    Geometry {
        left: (geometry.left - from.offset_x) * ratio + to.offset_x,
        top: (geometry.top - from.offset_y) * ratio + to.offset_y,
        width: geometry.width * ratio,
        height: geometry.height * ratio,
        rotation: geometry.rotation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::constraints::Handle;
    use crate::engine::grid::GridMode;
    use crate::engine::store::MAX_REGIONS;
    use crate::io::export::source_rect;
    use crate::models::asset::PixelAccess;
    use crate::models::region::CARD_ASPECT_RATIO;
    use image::RgbaImage;

    const EPS: f64 = 1e-6;

    fn asset(width: u32, height: u32) -> ImageAsset {
        ImageAsset::ready("https://cdn.example/card.png", RgbaImage::new(width, height), PixelAccess::Readable)
    }

    fn multi_region_session() -> CropSession {
        CropSession::new(asset(1200, 1600), 800.0, 600.0, EditorConfig::multi_region()).unwrap()
    }

    #[test]
    fn test_placement_and_main_frame() {
        let session = multi_region_session();
        let placement = session.placement();
        assert!((placement.scale - 0.345).abs() < 0.002);
        assert_eq!(placement.offset_y, 24.0);

        let bounds = session.image_bounds();
        let main = session.selected();
        assert!(main.is_main());
        assert!((main.geometry.width - 0.6 * bounds.width).abs() < EPS);
        assert!((main.geometry.height - main.geometry.width / CARD_ASPECT_RATIO).abs() < EPS);
        assert!((main.geometry.rect().center().x - bounds.center().x).abs() < EPS);
        assert!((main.geometry.rect().center().y - bounds.center().y).abs() < EPS);
    }

    #[test]
    fn test_failed_asset_cannot_open_session() {
        let failed = ImageAsset::failed("x", CropError::ImageNotReady);
        assert!(CropSession::new(failed, 800.0, 600.0, EditorConfig::default()).is_err());
        let loading = ImageAsset::loading("x");
        assert_eq!(
            CropSession::new(loading, 800.0, 600.0, EditorConfig::default()).err(),
            Some(CropError::ImageNotReady)
        );
    }

    #[test]
    fn test_gesture_commits_once() {
        let mut session = multi_region_session();
        let main = RegionId::main();
        let start = session.selected().geometry;

        session.begin_gesture(&main).unwrap();
        for step in 1..=20 {
            session
                .update_gesture(GestureDelta::Move { dx: step as f64, dy: step as f64 * 0.5 })
                .unwrap();
        }
        assert!(session.end_gesture());
        assert!((session.selected().geometry.left - (start.left + 20.0)).abs() < EPS);

        assert!(session.undo().is_some());
        assert_eq!(session.selected().geometry, start);
        assert!(!session.can_undo());
        assert!(session.can_redo());
    }

    #[test]
    fn test_drag_past_edge_then_back() {
        let mut session = multi_region_session();
        let main = RegionId::main();
        let bounds = session.image_bounds();
        let start = session.selected().geometry;
        let to_edge = bounds.right() - start.rect().right();

        session.begin_gesture(&main).unwrap();
        let region = session
            .update_gesture(GestureDelta::Move { dx: to_edge + 50.0, dy: 0.0 })
            .unwrap();
        assert!((region.geometry.left - (bounds.right() - start.width)).abs() < EPS);

        // Pointer comes back; the region follows it again.
        let region = session
            .update_gesture(GestureDelta::Move { dx: 10.0, dy: 0.0 })
            .unwrap();
        assert!((region.geometry.left - (start.left + 10.0)).abs() < EPS);
        session.end_gesture();
    }

    #[test]
    fn test_noop_and_cancelled_gestures_leave_no_history() {
        let mut session = multi_region_session();
        let main = RegionId::main();
        let start = session.selected().geometry;

        session.begin_gesture(&main).unwrap();
        assert!(!session.end_gesture());

        session.begin_gesture(&main).unwrap();
        session
            .update_gesture(GestureDelta::Resize { handle: Handle::Left, dx: -30.0, dy: 0.0 })
            .unwrap();
        session.cancel_gesture();
        assert_eq!(session.selected().geometry, start);
        assert!(!session.can_undo());
        assert_eq!(
            session
                .update_gesture(GestureDelta::Move { dx: 1.0, dy: 1.0 })
                .unwrap_err(),
            CropError::NoActiveGesture
        );
    }

    #[test]
    fn test_reset_rotation_is_undoable() {
        let mut session = multi_region_session();
        let main = RegionId::main();
        session.apply_edit(&main, GestureDelta::Rotate { degrees: 25.0 }).unwrap();
        session.reset_rotation(&main).unwrap();
        assert_eq!(session.selected().geometry.rotation, 0.0);

        session.undo();
        assert_eq!(session.selected().geometry.rotation, 25.0);
        session.undo();
        assert_eq!(session.selected().geometry.rotation, 0.0);
        session.redo();
        session.redo();
        assert_eq!(session.selected().geometry.rotation, 0.0);
    }

    #[test]
    fn test_region_lifecycle() {
        let mut session = multi_region_session();
        while !session.is_full() {
            session.add_region(RegionKind::Element).unwrap();
        }
        assert_eq!(session.regions().len(), MAX_REGIONS);
        assert_eq!(
            session.add_region(RegionKind::Frame).unwrap_err(),
            CropError::RegionLimitExceeded { limit: MAX_REGIONS }
        );
        assert_eq!(session.regions().len(), MAX_REGIONS);

        assert_eq!(
            session.delete_region(&RegionId::main()).unwrap_err(),
            CropError::CannotDeleteMainRegion
        );
        assert_eq!(session.regions().len(), MAX_REGIONS);

        let last = session.selected().id.clone();
        session.nudge(&last, 5.0, 5.0).unwrap();
        assert!(session.can_undo());
        session.delete_region(&last).unwrap();
        assert!(session.selected().is_main());
        assert!(!session.can_undo());
    }

    #[test]
    fn test_resize_canvas_keeps_source_pixels() {
        let mut session = multi_region_session();
        let id = session.add_region(RegionKind::Element).unwrap();
        session.nudge(&id, -40.0, 25.0).unwrap();

        let before = source_rect(
            &session.region(&id).unwrap().geometry,
            session.asset(),
            session.placement(),
        );
        session.resize_canvas(1024.0, 900.0);
        let after = source_rect(
            &session.region(&id).unwrap().geometry,
            session.asset(),
            session.placement(),
        );
        assert!((before.left - after.left).abs() < 1e-6);
        assert!((before.top - after.top).abs() < 1e-6);
        assert!((before.width - after.width).abs() < 1e-6);
        assert!((before.height - after.height).abs() < 1e-6);

        // History entries were carried along too.
        session.undo();
        let bounds = session.image_bounds();
        assert!(bounds.contains_rect(&session.region(&id).unwrap().geometry.bounds(), 1e-6));
    }

    #[test]
    fn test_grid_follows_mode_and_toggle() {
        let mut session = multi_region_session();
        assert_eq!(session.config().grid_mode(), GridMode::Canvas { cell_size: 20.0 });
        assert!(!session.grid_overlay().markers.is_empty());

        session.set_grid_visible(false);
        assert!(session.grid_overlay().segments.is_empty());

        let single = CropSession::new(asset(300, 400), 400.0, 300.0, EditorConfig::default()).unwrap();
        let overlay = single.grid_overlay();
        assert_eq!(overlay.segments.len(), 4);
        assert!(overlay.markers.is_empty());
    }

    #[test]
    fn test_apply_and_skip() {
        let mut session =
            CropSession::new(asset(300, 400), 400.0, 300.0, EditorConfig::default()).unwrap();
        let main = session.selected().geometry;

        match session.apply().unwrap() {
            CropOutcome::Applied { region_id, data_url, image } => {
                assert!(region_id.is_main());
                assert!(data_url.starts_with("data:image/png;base64,"));
                assert_eq!(image.width, (main.width * 4.0).round() as u32);
                assert_eq!(image.height, (main.height * 4.0).round() as u32);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        assert_eq!(
            session.skip(),
            CropOutcome::Skipped {
                source_url: "https://cdn.example/card.png".to_string()
            }
        );
    }

    #[test]
    fn test_tainted_image_cannot_be_applied() {
        let tainted = ImageAsset::ready("https://other.example/a.png", RgbaImage::new(50, 50), PixelAccess::Tainted);
        let mut session = CropSession::new(tainted, 200.0, 200.0, EditorConfig::default()).unwrap();
        assert_eq!(session.apply().unwrap_err(), CropError::PixelReadBlocked);
        assert!(matches!(session.skip(), CropOutcome::Skipped { .. }));
    }
}
