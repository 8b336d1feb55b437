// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! This module maps between the three coordinate spaces the editor works in:
//! source-image pixels, canvas pixels (the scaled and offset image the user
//! sees), and normalized canvas coordinates (0.0 to 1.0). It also computes
//! the fit-to-canvas placement and the bounding boxes of rotated rectangles.

use serde::{Deserialize, Serialize};

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle described by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Whether `other` lies inside this rectangle, allowing `eps` of slack for
    /// floating point error.
    pub fn contains_rect(&self, other: &Rect, eps: f64) -> bool {
        other.left >= self.left - eps
            && other.top >= self.top - eps
            && other.right() <= self.right() + eps
            && other.bottom() <= self.bottom() + eps
    }

    /// Overlap of two rectangles, or `None` when they do not intersect.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// Vertical placement of the fitted image inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Center on both axes.
    #[default]
    Center,
    /// Center horizontally, pin to the top padding so content can follow below.
    Top,
}

/// Where the source image sits on the canvas.
///
/// Derived from the image and canvas sizes by [`fit`]; it is recomputed
/// whenever either changes and never edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Placement {
    /// Canvas-space rectangle covered by an image of the given natural size.
    pub fn image_bounds(&self, natural_width: u32, natural_height: u32) -> Rect {
        Rect::new(
            self.offset_x,
            self.offset_y,
            natural_width as f64 * self.scale,
            natural_height as f64 * self.scale,
        )
    }

    /// Convert a canvas point to source-image pixel coordinates.
    pub fn canvas_to_image(&self, point: Point) -> Point {
        if self.scale <= 0.0 {
            return Point::default();
        }
        Point::new(
            (point.x - self.offset_x) / self.scale,
            (point.y - self.offset_y) / self.scale,
        )
    }

    /// Convert a source-image pixel coordinate to a canvas point.
    pub fn image_to_canvas(&self, point: Point) -> Point {
        Point::new(
            point.x * self.scale + self.offset_x,
            point.y * self.scale + self.offset_y,
        )
    }
}

/// Fit an image of the given natural size into the canvas with `padding` on
/// every side.
///
/// The scale is the smaller of the two axis ratios so the whole image is
/// visible whatever its aspect ratio.
pub fn fit(
    natural_width: u32,
    natural_height: u32,
    canvas_width: f64,
    canvas_height: f64,
    padding: f64,
    alignment: Alignment,
) -> Placement {
    let available_width = (canvas_width - 2.0 * padding).max(0.0);
    let available_height = (canvas_height - 2.0 * padding).max(0.0);

    if natural_width == 0 || natural_height == 0 {
        return Placement {
            scale: 0.0,
            offset_x: padding,
            offset_y: padding,
        };
    }

    let scale = (available_width / natural_width as f64)
        .min(available_height / natural_height as f64);
    let placed_width = natural_width as f64 * scale;
    let placed_height = natural_height as f64 * scale;

    let offset_x = (canvas_width - placed_width) / 2.0;
    let offset_y = match alignment {
        Alignment::Center => (canvas_height - placed_height) / 2.0,
        Alignment::Top => padding,
    };

    Placement {
        scale,
        offset_x,
        offset_y,
    }
}

/// Convert canvas coordinates to normalized coordinates (0.0 to 1.0).
pub fn normalize_coordinates(point: Point, canvas_width: f64, canvas_height: f64) -> Point {
    Point {
        x: point.x / canvas_width,
        y: point.y / canvas_height,
    }
}

/// Convert normalized coordinates to canvas coordinates.
pub fn denormalize_coordinates(point: &Point, canvas_width: f64, canvas_height: f64) -> Point {
    Point::new(point.x * canvas_width, point.y * canvas_height)
}

/// Rotate `point` around `center` by `degrees` (clockwise on a y-down canvas).
pub fn rotate_point(point: Point, center: Point, degrees: f64) -> Point {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    Point::new(
        center.x + dx * cos - dy * sin,
        center.y + dx * sin + dy * cos,
    )
}

/// Corners of `rect` rotated around its center, clockwise from the top-left.
pub fn rotated_corners(rect: &Rect, degrees: f64) -> [Point; 4] {
    let center = rect.center();
    [
        Point::new(rect.left, rect.top),
        Point::new(rect.right(), rect.top),
        Point::new(rect.right(), rect.bottom()),
        Point::new(rect.left, rect.bottom()),
    ]
    .map(|corner| rotate_point(corner, center, degrees))
}

/// Axis-aligned bounding box of `rect` after rotating it around its center.
pub fn rotated_bounds(rect: &Rect, degrees: f64) -> Rect {
    if degrees.rem_euclid(360.0) == 0.0 {
        return *rect;
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    let width = rect.width * cos.abs() + rect.height * sin.abs();
    let height = rect.width * sin.abs() + rect.height * cos.abs();
    let center = rect.center();
    Rect::new(
        center.x - width / 2.0,
        center.y - height / 2.0,
        width,
        height,
    )
}
