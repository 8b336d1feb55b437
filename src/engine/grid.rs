// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Grid overlay geometry.
//!
//! Pure derivation from region and canvas geometry; nothing here is stored
//! or mutates session state.

use crate::models::region::CropRegion;
use crate::util::geometry::{rotate_point, Point};
use serde::{Deserialize, Serialize};

/// Default cell size of the full-canvas grid.
pub const DEFAULT_CELL_SIZE: f64 = 20.0;

/// Intersection markers are drawn every this many cells.
pub const MARKER_EVERY: usize = 4;

/// A line segment in canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

/// Which grid to draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridMode {
    /// Thirds of the active region, following its rotation.
    RuleOfThirds,
    /// Uniform grid over the whole canvas.
    Canvas { cell_size: f64 },
}

/// Lines and markers to draw for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridOverlay {
    pub segments: Vec<Segment>,
    pub markers: Vec<Point>,
}

/// Compute the overlay for the given mode.
///
/// `region` is the active region; rule-of-thirds mode draws nothing without
/// one, or when it is hidden.
pub fn render(
    mode: GridMode,
    region: Option<&CropRegion>,
    canvas_width: f64,
    canvas_height: f64,
) -> GridOverlay {
    match mode {
        GridMode::RuleOfThirds => GridOverlay {
            segments: region
                .filter(|r| r.visible)
                .map(rule_of_thirds)
                .unwrap_or_default(),
            markers: Vec::new(),
        },
        GridMode::Canvas { cell_size } => canvas_grid(canvas_width, canvas_height, cell_size),
    }
}

/// Two vertical and two horizontal lines splitting the region into nine
/// equal cells, rotated with the region.
pub fn rule_of_thirds(region: &CropRegion) -> Vec<Segment> {
    let g = &region.geometry;
    let center = g.rect().center();
    let mut segments = Vec::with_capacity(4);

    for i in 1..=2 {
        let x = g.left + g.width * i as f64 / 3.0;
        segments.push(Segment {
            from: Point::new(x, g.top),
            to: Point::new(x, g.top + g.height),
        });
    }
    for i in 1..=2 {
        let y = g.top + g.height * i as f64 / 3.0;
        segments.push(Segment {
            from: Point::new(g.left, y),
            to: Point::new(g.left + g.width, y),
        });
    }

    if g.rotation != 0.0 {
        for segment in &mut segments {
            segment.from = rotate_point(segment.from, center, g.rotation);
            segment.to = rotate_point(segment.to, center, g.rotation);
        }
    }
    segments
}

/// Uniform grid over the canvas with markers on every
/// [`MARKER_EVERY`]-th intersection.
pub fn canvas_grid(width: f64, height: f64, cell_size: f64) -> GridOverlay {
    if cell_size <= 0.0 || width <= 0.0 || height <= 0.0 {
        return GridOverlay::default();
    }

    let columns = (width / cell_size).floor() as usize;
    let rows = (height / cell_size).floor() as usize;
    let mut overlay = GridOverlay::default();

    for col in 0..=columns {
        let x = col as f64 * cell_size;
        overlay.segments.push(Segment {
            from: Point::new(x, 0.0),
            to: Point::new(x, height),
        });
    }
    for row in 0..=rows {
        let y = row as f64 * cell_size;
        overlay.segments.push(Segment {
            from: Point::new(0.0, y),
            to: Point::new(width, y),
        });
    }

    for col in (0..=columns).step_by(MARKER_EVERY) {
        for row in (0..=rows).step_by(MARKER_EVERY) {
            overlay
                .markers
                .push(Point::new(col as f64 * cell_size, row as f64 * cell_size));
        }
    }
    overlay
}
