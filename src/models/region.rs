// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Crop region data structures.
//!
//! This module defines the rectangles a user draws over the source image,
//! their kind (aspect-locked frame or free element) and the geometry
//! snapshot that history entries store.

use crate::util::geometry::{rotated_bounds, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Id of the region every session starts with.
pub const MAIN_REGION_ID: &str = "main";

/// Physical trading-card ratio, 2.5:3.5 (width / height).
pub const CARD_ASPECT_RATIO: f64 = 2.5 / 3.5;

/// Stable identifier of a region within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId(String);

impl RegionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn main() -> Self {
        Self(MAIN_REGION_ID.to_string())
    }

    pub fn is_main(&self) -> bool {
        self.0 == MAIN_REGION_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Kind of region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    /// Aspect-locked to the card ratio.
    Frame,
    /// Free aspect, used for logos and stickers cut from the same image.
    Element,
}

impl RegionKind {
    pub fn locks_aspect(&self) -> bool {
        matches!(self, RegionKind::Frame)
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::Frame => write!(f, "Frame"),
            RegionKind::Element => write!(f, "Element"),
        }
    }
}

/// Canvas-space position, size and rotation of a region.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees, signed, applied around the rectangle's center.
    pub rotation: f64,
}

impl Geometry {
    pub fn from_rect(rect: Rect, rotation: f64) -> Self {
        Self {
            left: rect.left,
            top: rect.top,
            width: rect.width,
            height: rect.height,
            rotation,
        }
    }

    /// The un-rotated rectangle.
    pub fn rect(&self) -> Rect {
        Rect::new(self.left, self.top, self.width, self.height)
    }

    /// Axis-aligned bounding box after rotation.
    pub fn bounds(&self) -> Rect {
        rotated_bounds(&self.rect(), self.rotation)
    }
}

/// A rectangle over the source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub id: RegionId,
    pub kind: RegionKind,
    pub geometry: Geometry,
    pub visible: bool,
    /// Width / height target for frames. Ignored for elements.
    pub aspect_ratio: f64,
}

impl CropRegion {
    /// Create a visible region with the given geometry.
    pub fn new(id: RegionId, kind: RegionKind, geometry: Geometry, aspect_ratio: f64) -> Self {
        Self {
            id,
            kind,
            geometry,
            visible: true,
            aspect_ratio,
        }
    }

    /// The aspect ratio this region is locked to, if any.
    pub fn locked_aspect(&self) -> Option<f64> {
        self.kind.locks_aspect().then_some(self.aspect_ratio)
    }

    pub fn is_main(&self) -> bool {
        self.id.is_main()
    }

    /// Display name for lists.
    pub fn label(&self) -> String {
        if self.is_main() {
            format!("{} (main)", self.kind)
        } else {
            format!("{} {}", self.kind, self.id)
        }
    }
}
