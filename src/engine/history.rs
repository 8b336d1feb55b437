// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Undo/redo for region geometry.
//!
//! One entry per completed gesture. Entries hold the geometry a region had
//! before the gesture; undo swaps it back in and parks the current geometry
//! on the redo stack. History is linear: a new commit drops the redo stack.

use crate::engine::store::RegionStore;
use crate::models::region::{Geometry, RegionId};

/// Default cap on undo entries.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Geometry of one region at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub region_id: RegionId,
    pub geometry: Geometry,
}

/// History system for undo/redo functionality.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    /// Undo stack (past states)
    undo_stack: Vec<HistoryEntry>,
    /// Redo stack (future states after undo)
    redo_stack: Vec<HistoryEntry>,
    /// Maximum history size
    max_size: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryStack {
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size: max_size.max(1),
        }
    }

    /// Record the geometry a region had before a completed edit.
    pub fn commit(&mut self, region_id: RegionId, before: Geometry) {
        self.undo_stack.push(HistoryEntry {
            region_id,
            geometry: before,
        });
        // Limit history size
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
        // Clear redo stack when new action is performed
        self.redo_stack.clear();
    }

    /// Restore the most recent entry. Returns the entry that was applied.
    pub fn undo(&mut self, store: &mut RegionStore) -> Option<HistoryEntry> {
        let entry = swap(&mut self.undo_stack, &mut self.redo_stack, store)?;
        log::info!("Undo on region {}", entry.region_id);
        Some(entry)
    }

    /// Re-apply the most recently undone entry.
    pub fn redo(&mut self, store: &mut RegionStore) -> Option<HistoryEntry> {
        let entry = swap(&mut self.redo_stack, &mut self.undo_stack, store)?;
        log::info!("Redo on region {}", entry.region_id);
        Some(entry)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Drop every entry that targets `region_id` (the region was deleted).
    pub fn forget_region(&mut self, region_id: &RegionId) {
        self.undo_stack.retain(|e| e.region_id != *region_id);
        self.redo_stack.retain(|e| e.region_id != *region_id);
    }

    /// Rewrite stored geometry, e.g. after the canvas placement changed.
    pub fn remap(&mut self, mut f: impl FnMut(&Geometry) -> Geometry) {
        for entry in self.undo_stack.iter_mut().chain(self.redo_stack.iter_mut()) {
            entry.geometry = f(&entry.geometry);
        }
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }
}

/// Pop from `from`, apply it to the store, and push the displaced geometry
/// onto `to`. Entries for regions that no longer exist are skipped.
fn swap(
    from: &mut Vec<HistoryEntry>,
    to: &mut Vec<HistoryEntry>,
    store: &mut RegionStore,
) -> Option<HistoryEntry> {
    while let Some(entry) = from.pop() {
        let Some(current) = store.get(&entry.region_id).map(|r| r.geometry) else {
            log::debug!("Skipping history for missing region {}", entry.region_id);
            continue;
        };
        if store.set_geometry(&entry.region_id, entry.geometry).is_err() {
            continue;
        }
        to.push(HistoryEntry {
            region_id: entry.region_id.clone(),
            geometry: current,
        });
        return Some(entry);
    }
    None
}
