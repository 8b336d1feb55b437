// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! The set of crop regions in a session.
//!
//! Regions are plain values in a flat list, looked up by id. The store owns
//! selection and enforces the two structural rules: the `main` region always
//! exists, and there are never more than [`MAX_REGIONS`] regions.

use crate::engine::constraints::{self, GestureDelta};
use crate::error::{CropError, Result};
use crate::models::region::{CropRegion, Geometry, RegionId, RegionKind};
use crate::util::geometry::Rect;

/// Maximum number of regions per session, `main` included.
pub const MAX_REGIONS: usize = 8;

/// New frames span this share of the placed image width.
pub const FRAME_WIDTH_FRACTION: f64 = 0.6;

/// Side length of a new element region.
pub const ELEMENT_SIZE: f64 = 150.0;

/// Diagonal step between successive element regions.
pub const ELEMENT_OFFSET: f64 = 20.0;

/// Crop regions of one session.
#[derive(Debug, Clone)]
pub struct RegionStore {
    regions: Vec<CropRegion>,
    selected: RegionId,
    aspect_ratio: f64,
    next_serial: usize,
    /// Elements ever created; drives the diagonal offset.
    elements_created: usize,
}

impl RegionStore {
    /// Create the store with its `main` frame sized to the image.
    pub fn new(aspect_ratio: f64, image_bounds: &Rect) -> Self {
        let main = CropRegion::new(
            RegionId::main(),
            RegionKind::Frame,
            frame_geometry(image_bounds, aspect_ratio),
            aspect_ratio,
        );
        log::debug!("Created main region {:?}", main.geometry);
        Self {
            regions: vec![main],
            selected: RegionId::main(),
            aspect_ratio,
            next_serial: 1,
            elements_created: 0,
        }
    }

    /// Add a frame or element region and select it.
    pub fn create_region(&mut self, kind: RegionKind, image_bounds: &Rect) -> Result<&CropRegion> {
        if self.regions.len() >= MAX_REGIONS {
            log::warn!("Region limit of {} reached", MAX_REGIONS);
            return Err(CropError::RegionLimitExceeded { limit: MAX_REGIONS });
        }

        let (base, first_step) = match kind {
            RegionKind::Frame => (frame_geometry(image_bounds, self.aspect_ratio), 0),
            RegionKind::Element => {
                let center = image_bounds.center();
                let rect = Rect::new(
                    center.x - ELEMENT_SIZE / 2.0,
                    center.y - ELEMENT_SIZE / 2.0,
                    ELEMENT_SIZE,
                    ELEMENT_SIZE,
                );
                self.elements_created += 1;
                (Geometry::from_rect(rect, 0.0), self.elements_created - 1)
            }
        };
        let geometry = self.offset_clear_of_others(base, first_step, image_bounds);

        let id = match kind {
            RegionKind::Frame => RegionId::new(format!("frame-{}", self.next_serial)),
            RegionKind::Element => RegionId::new(format!("element-{}", self.next_serial)),
        };
        self.next_serial += 1;

        let region = CropRegion::new(id.clone(), kind, geometry, self.aspect_ratio);
        log::info!("Added {} region {}, total: {}", kind, id, self.regions.len() + 1);
        self.regions.push(region);
        self.selected = id;
        Ok(&self.regions[self.regions.len() - 1])
    }

    /// Run `delta` through the constraint engine and store the result.
    pub fn update_region(
        &mut self,
        id: &RegionId,
        delta: GestureDelta,
        image_bounds: &Rect,
    ) -> Result<&CropRegion> {
        let index = self.index_of(id)?;
        let updated = constraints::apply(&self.regions[index], delta, image_bounds);
        self.regions[index] = updated;
        Ok(&self.regions[index])
    }

    /// Overwrite a region's geometry without constraint checks (history
    /// replays geometry that was valid when recorded).
    pub fn set_geometry(&mut self, id: &RegionId, geometry: Geometry) -> Result<()> {
        let index = self.index_of(id)?;
        self.regions[index].geometry = geometry;
        Ok(())
    }

    /// Remove a region. `main` cannot be removed.
    pub fn delete_region(&mut self, id: &RegionId) -> Result<CropRegion> {
        if id.is_main() {
            return Err(CropError::CannotDeleteMainRegion);
        }
        let index = self.index_of(id)?;
        let removed = self.regions.remove(index);
        if self.selected == *id {
            self.selected = RegionId::main();
        }
        log::info!("Deleted region {}, total: {}", id, self.regions.len());
        Ok(removed)
    }

    pub fn set_visible(&mut self, id: &RegionId, visible: bool) -> Result<()> {
        let index = self.index_of(id)?;
        self.regions[index].visible = visible;
        Ok(())
    }

    pub fn select(&mut self, id: &RegionId) -> Result<()> {
        self.index_of(id)?;
        self.selected = id.clone();
        Ok(())
    }

    pub fn selected_id(&self) -> &RegionId {
        &self.selected
    }

    /// The selected region (`main` when nothing else is selected).
    pub fn selected(&self) -> &CropRegion {
        self.get(&self.selected).unwrap_or(&self.regions[0])
    }

    pub fn get(&self, id: &RegionId) -> Option<&CropRegion> {
        self.regions.iter().find(|r| r.id == *id)
    }

    pub fn main(&self) -> &CropRegion {
        &self.regions[0]
    }

    pub fn regions(&self) -> &[CropRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_full(&self) -> bool {
        self.regions.len() >= MAX_REGIONS
    }

    /// Rewrite every region's geometry, e.g. after the placement changed.
    pub fn remap(&mut self, mut f: impl FnMut(&Geometry) -> Geometry) {
        for region in &mut self.regions {
            region.geometry = f(&region.geometry);
        }
    }

    /// Shift `base` diagonally by `step` offsets, stepping further while the
    /// result sits exactly on an existing region.
    fn offset_clear_of_others(&self, base: Geometry, step: usize, image_bounds: &Rect) -> Geometry {
        let place = |step: usize| {
            let mut g = base;
            g.left += step as f64 * ELEMENT_OFFSET;
            g.top += step as f64 * ELEMENT_OFFSET;
            constraints::contain(&g, image_bounds)
        };
        let mut geometry = place(step);
        for next in step + 1..=step + MAX_REGIONS {
            if !self.regions.iter().any(|r| r.geometry == geometry) {
                break;
            }
            geometry = place(next);
        }
        geometry
    }

    fn index_of(&self, id: &RegionId) -> Result<usize> {
        self.regions
            .iter()
            .position(|r| r.id == *id)
            .ok_or_else(|| CropError::UnknownRegion(id.to_string()))
    }
}

/// A frame spanning [`FRAME_WIDTH_FRACTION`] of the image width, centered.
fn frame_geometry(image_bounds: &Rect, aspect_ratio: f64) -> Geometry {
    let width = image_bounds.width * FRAME_WIDTH_FRACTION;
    let height = width / aspect_ratio;
    let center = image_bounds.center();
    let rect = Rect::new(center.x - width / 2.0, center.y - height / 2.0, width, height);
    constraints::contain(&Geometry::from_rect(rect, 0.0), image_bounds)
}
