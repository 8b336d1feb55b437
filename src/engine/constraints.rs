// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Region constraint engine.
//!
//! Every edit to a region goes through [`apply`], a pure function from the
//! current region and a gesture to the constrained result. Three rules hold
//! after every call:
//!
//! - the region's rotated bounding box lies inside the image bounds,
//! - frames keep their aspect ratio (applied before containment),
//! - oversize requests are clipped, never rejected.

use crate::models::region::{CropRegion, Geometry};
use crate::util::geometry::{rotate_point, rotated_bounds, Point, Rect};

/// Smallest width or height a resize may produce.
pub const MIN_REGION_SIZE: f64 = 10.0;

/// Resize handle on the region outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::TopLeft,
        Handle::Top,
        Handle::TopRight,
        Handle::Right,
        Handle::BottomRight,
        Handle::Bottom,
        Handle::BottomLeft,
        Handle::Left,
    ];

    fn moves_left(&self) -> bool {
        matches!(self, Handle::TopLeft | Handle::Left | Handle::BottomLeft)
    }

    fn moves_right(&self) -> bool {
        matches!(self, Handle::TopRight | Handle::Right | Handle::BottomRight)
    }

    fn moves_top(&self) -> bool {
        matches!(self, Handle::TopLeft | Handle::Top | Handle::TopRight)
    }

    fn moves_bottom(&self) -> bool {
        matches!(self, Handle::BottomLeft | Handle::Bottom | Handle::BottomRight)
    }

    /// Top and bottom edge handles change height only.
    fn is_vertical_edge(&self) -> bool {
        matches!(self, Handle::Top | Handle::Bottom)
    }

    /// Position of the handle on the un-rotated rectangle.
    pub fn position(&self, rect: &Rect) -> Point {
        let x = if self.moves_left() {
            rect.left
        } else if self.moves_right() {
            rect.right()
        } else {
            rect.center().x
        };
        let y = if self.moves_top() {
            rect.top
        } else if self.moves_bottom() {
            rect.bottom()
        } else {
            rect.center().y
        };
        Point::new(x, y)
    }

    /// The point that stays put while this handle is dragged.
    fn anchor(&self, rect: &Rect) -> Point {
        let x = if self.moves_left() {
            rect.right()
        } else if self.moves_right() {
            rect.left
        } else {
            rect.center().x
        };
        let y = if self.moves_top() {
            rect.bottom()
        } else if self.moves_bottom() {
            rect.top
        } else {
            rect.center().y
        };
        Point::new(x, y)
    }
}

/// One requested change to a region, relative to its geometry when the
/// gesture started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureDelta {
    /// Translate by a canvas-space offset.
    Move { dx: f64, dy: f64 },
    /// Drag a handle by a canvas-space offset.
    Resize { handle: Handle, dx: f64, dy: f64 },
    /// Set the absolute rotation in degrees.
    Rotate { degrees: f64 },
}

/// Apply `delta` to `region` and return the constrained region.
pub fn apply(region: &CropRegion, delta: GestureDelta, bounds: &Rect) -> CropRegion {
    let geometry = match delta {
        GestureDelta::Move { dx, dy } => move_region(&region.geometry, dx, dy, bounds),
        GestureDelta::Resize { handle, dx, dy } => {
            resize_region(&region.geometry, handle, dx, dy, region.locked_aspect(), bounds)
        }
        GestureDelta::Rotate { degrees } => rotate_region(&region.geometry, degrees, bounds),
    };
    CropRegion {
        geometry,
        ..region.clone()
    }
}

/// Translate, then clamp each axis back inside the bounds independently.
pub fn move_region(geometry: &Geometry, dx: f64, dy: f64, bounds: &Rect) -> Geometry {
    let moved = Geometry {
        left: geometry.left + dx,
        top: geometry.top + dy,
        ..*geometry
    };
    contain(&moved, bounds)
}

/// Set the rotation, then re-establish containment for the rotated box.
pub fn rotate_region(geometry: &Geometry, degrees: f64, bounds: &Rect) -> Geometry {
    let rotated = Geometry {
        rotation: normalize_degrees(degrees),
        ..*geometry
    };
    contain(&rotated, bounds)
}

/// Drag `handle` by `(dx, dy)` with the opposite side anchored.
///
/// Aspect lock is applied to the raw request first; the result is then
/// scaled down about the anchor until its rotated bounding box fits.
pub fn resize_region(
    geometry: &Geometry,
    handle: Handle,
    dx: f64,
    dy: f64,
    aspect: Option<f64>,
    bounds: &Rect,
) -> Geometry {
    let theta = geometry.rotation;
    let old = geometry.rect();

    // Pointer deltas arrive in canvas space; the handle moves in the
    // region's own frame.
    let local = rotate_point(Point::new(dx, dy), Point::default(), -theta);

    let mut left = old.left;
    let mut top = old.top;
    let mut right = old.right();
    let mut bottom = old.bottom();
    if handle.moves_left() {
        left += local.x;
    }
    if handle.moves_right() {
        right += local.x;
    }
    if handle.moves_top() {
        top += local.y;
    }
    if handle.moves_bottom() {
        bottom += local.y;
    }

    let mut width = (right - left).max(MIN_REGION_SIZE);
    let mut height = (bottom - top).max(MIN_REGION_SIZE);
    if let Some(aspect) = aspect.filter(|a| *a > 0.0) {
        if handle.is_vertical_edge() {
            width = height * aspect;
        } else {
            height = width / aspect;
        }
    }

    let anchor = handle.anchor(&old);
    let new_left = if handle.moves_left() {
        anchor.x - width
    } else if handle.moves_right() {
        anchor.x
    } else {
        anchor.x - width / 2.0
    };
    let new_top = if handle.moves_top() {
        anchor.y - height
    } else if handle.moves_bottom() {
        anchor.y
    } else {
        anchor.y - height / 2.0
    };
    let mut rect = Rect::new(new_left, new_top, width, height);

    // Keep the anchor fixed on screen when the region is rotated.
    let world_anchor = rotate_point(anchor, old.center(), theta);
    let drifted = rotate_point(anchor, rect.center(), theta);
    rect.left += world_anchor.x - drifted.x;
    rect.top += world_anchor.y - drifted.y;

    // Clip about the anchor, but never below the minimum size; whatever
    // still overflows is shifted back in by `contain`.
    let aabb = rotated_bounds(&rect, theta);
    let sx = axis_fit(world_anchor.x, aabb.left, aabb.right(), bounds.left, bounds.right())
        .max((MIN_REGION_SIZE / rect.width).min(1.0));
    let sy = axis_fit(world_anchor.y, aabb.top, aabb.bottom(), bounds.top, bounds.bottom())
        .max((MIN_REGION_SIZE / rect.height).min(1.0));

    let clipped = if aspect.is_none() && theta == 0.0 {
        Rect::new(
            world_anchor.x + (rect.left - world_anchor.x) * sx,
            world_anchor.y + (rect.top - world_anchor.y) * sy,
            rect.width * sx,
            rect.height * sy,
        )
    } else {
        let floor = (MIN_REGION_SIZE / rect.width.min(rect.height)).min(1.0);
        scale_about(&rect, world_anchor, sx.min(sy).max(floor))
    };

    contain(&Geometry::from_rect(clipped, theta), bounds)
}

/// Shrink (uniformly, about the center) and then shift `geometry` until its
/// rotated bounding box fits inside `bounds`. Each axis is shifted on its own.
pub fn contain(geometry: &Geometry, bounds: &Rect) -> Geometry {
    let mut g = *geometry;

    let aabb = g.bounds();
    if aabb.width > bounds.width || aabb.height > bounds.height {
        let factor = (bounds.width / aabb.width).min(bounds.height / aabb.height);
        let rect = scale_about(&g.rect(), g.rect().center(), factor);
        g = Geometry::from_rect(rect, g.rotation);
    }

    let aabb = g.bounds();
    if aabb.left < bounds.left {
        g.left += bounds.left - aabb.left;
    } else if aabb.right() > bounds.right() {
        g.left -= aabb.right() - bounds.right();
    }
    if aabb.top < bounds.top {
        g.top += bounds.top - aabb.top;
    } else if aabb.bottom() > bounds.bottom() {
        g.top -= aabb.bottom() - bounds.bottom();
    }
    g
}

/// Map an angle into `[-180, 180)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

/// Largest factor in `[0, 1]` that keeps `[low, high]`, scaled about
/// `anchor`, inside `[min, max]`.
fn axis_fit(anchor: f64, low: f64, high: f64, min: f64, max: f64) -> f64 {
    let mut factor: f64 = 1.0;
    if low < min && anchor - low > 0.0 {
        factor = factor.min((anchor - min) / (anchor - low));
    }
    if high > max && high - anchor > 0.0 {
        factor = factor.min((max - anchor) / (high - anchor));
    }
    factor.clamp(0.0, 1.0)
}

fn scale_about(rect: &Rect, origin: Point, factor: f64) -> Rect {
    let center = rect.center();
    let width = rect.width * factor;
    let height = rect.height * factor;
    let cx = origin.x + (center.x - origin.x) * factor;
    let cy = origin.y + (center.y - origin.y) * factor;
    Rect::new(cx - width / 2.0, cy - height / 2.0, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::region::{RegionId, RegionKind, CARD_ASPECT_RATIO};

    const EPS: f64 = 1e-6;

    fn image_bounds() -> Rect {
        Rect::new(193.0, 24.0, 414.0, 552.0)
    }

    fn frame(left: f64, top: f64, width: f64) -> CropRegion {
        CropRegion::new(
            RegionId::main(),
            RegionKind::Frame,
            Geometry::from_rect(Rect::new(left, top, width, width / CARD_ASPECT_RATIO), 0.0),
            CARD_ASPECT_RATIO,
        )
    }

    fn element(left: f64, top: f64, width: f64, height: f64) -> CropRegion {
        CropRegion::new(
            RegionId::from("element-1"),
            RegionKind::Element,
            Geometry::from_rect(Rect::new(left, top, width, height), 0.0),
            CARD_ASPECT_RATIO,
        )
    }

    fn assert_contained(region: &CropRegion, bounds: &Rect) {
        assert!(
            bounds.contains_rect(&region.geometry.bounds(), EPS),
            "{:?} escapes {:?}",
            region.geometry.bounds(),
            bounds
        );
    }

    fn assert_aspect(region: &CropRegion) {
        let ratio = region.geometry.width / region.geometry.height;
        assert!((ratio - CARD_ASPECT_RATIO).abs() < 1e-3, "ratio {ratio}");
    }

    #[test]
    fn test_drag_past_right_edge_clamps_to_edge() {
        let bounds = image_bounds();
        let region = frame(300.0, 100.0, 200.0);
        let overshoot = bounds.right() - region.geometry.rect().right() + 50.0;

        let moved = apply(&region, GestureDelta::Move { dx: overshoot, dy: 0.0 }, &bounds);
        assert!((moved.geometry.left - (bounds.right() - 200.0)).abs() < EPS);
        assert_eq!(moved.geometry.top, 100.0);
    }

    #[test]
    fn test_move_clamps_axes_independently() {
        let bounds = image_bounds();
        let region = element(250.0, 100.0, 100.0, 100.0);

        let moved = apply(&region, GestureDelta::Move { dx: -500.0, dy: 30.0 }, &bounds);
        assert_eq!(moved.geometry.left, bounds.left);
        assert_eq!(moved.geometry.top, 130.0);

        let moved = apply(&region, GestureDelta::Move { dx: 10.0, dy: 900.0 }, &bounds);
        assert_eq!(moved.geometry.left, 260.0);
        assert!((moved.geometry.top - (bounds.bottom() - 100.0)).abs() < EPS);
    }

    #[test]
    fn test_frame_resize_keeps_aspect() {
        let bounds = image_bounds();
        let region = frame(250.0, 100.0, 150.0);

        let resized = apply(
            &region,
            GestureDelta::Resize { handle: Handle::BottomRight, dx: 40.0, dy: -70.0 },
            &bounds,
        );
        assert!((resized.geometry.width - 190.0).abs() < EPS);
        assert_aspect(&resized);
        // Top-left is the anchor.
        assert!((resized.geometry.left - 250.0).abs() < EPS);
        assert!((resized.geometry.top - 100.0).abs() < EPS);

        let resized = apply(
            &region,
            GestureDelta::Resize { handle: Handle::Bottom, dx: 0.0, dy: 35.0 },
            &bounds,
        );
        assert_aspect(&resized);
        assert!((resized.geometry.height - (150.0 / CARD_ASPECT_RATIO + 35.0)).abs() < EPS);
    }

    #[test]
    fn test_resize_past_bounds_is_clipped_not_rejected() {
        let bounds = image_bounds();
        let region = frame(400.0, 100.0, 150.0);

        let resized = apply(
            &region,
            GestureDelta::Resize { handle: Handle::BottomRight, dx: 400.0, dy: 0.0 },
            &bounds,
        );
        assert_contained(&resized, &bounds);
        assert_aspect(&resized);
        assert!(resized.geometry.width > 150.0);
        assert!((resized.geometry.rect().right() - bounds.right()).abs() < EPS);
        assert!((resized.geometry.left - 400.0).abs() < EPS);
    }

    #[test]
    fn test_element_resize_clips_each_axis() {
        let bounds = image_bounds();
        let region = element(500.0, 400.0, 80.0, 60.0);

        let resized = apply(
            &region,
            GestureDelta::Resize { handle: Handle::BottomRight, dx: 500.0, dy: 20.0 },
            &bounds,
        );
        assert!((resized.geometry.rect().right() - bounds.right()).abs() < EPS);
        assert!((resized.geometry.height - 80.0).abs() < EPS);
    }

    #[test]
    fn test_resize_respects_minimum_size() {
        let bounds = image_bounds();
        let region = element(300.0, 300.0, 80.0, 60.0);

        let resized = apply(
            &region,
            GestureDelta::Resize { handle: Handle::TopLeft, dx: 200.0, dy: 200.0 },
            &bounds,
        );
        assert_eq!(resized.geometry.width, MIN_REGION_SIZE);
        assert_eq!(resized.geometry.height, MIN_REGION_SIZE);
        // Bottom-right anchored.
        assert!((resized.geometry.rect().right() - 380.0).abs() < EPS);
        assert!((resized.geometry.rect().bottom() - 360.0).abs() < EPS);
    }

    #[test]
    fn test_rotation_shrinks_oversize_region() {
        let bounds = image_bounds();
        let region = frame(193.0, 24.0, 414.0);
        let rotated = apply(&region, GestureDelta::Rotate { degrees: 45.0 }, &bounds);

        assert_eq!(rotated.geometry.rotation, 45.0);
        assert_contained(&rotated, &bounds);
        assert_aspect(&rotated);
    }

    #[test]
    fn test_rotation_is_unconstrained_in_angle() {
        let bounds = image_bounds();
        let region = element(300.0, 200.0, 40.0, 40.0);
        let rotated = apply(&region, GestureDelta::Rotate { degrees: 350.0 }, &bounds);
        assert!((rotated.geometry.rotation - -10.0).abs() < EPS);
        assert_eq!(normalize_degrees(-190.0), 170.0);
        assert_eq!(normalize_degrees(180.0), -180.0);
    }

    #[test]
    fn test_rotated_resize_keeps_anchor_on_screen() {
        let bounds = Rect::new(0.0, 0.0, 1000.0, 1000.0);
        let mut region = element(400.0, 400.0, 100.0, 100.0);
        region.geometry.rotation = 30.0;
        let anchor_before = rotate_point(
            Point::new(400.0, 400.0),
            region.geometry.rect().center(),
            30.0,
        );

        let resized = apply(
            &region,
            GestureDelta::Resize { handle: Handle::BottomRight, dx: 20.0, dy: 20.0 },
            &bounds,
        );
        let g = resized.geometry;
        let anchor_after = rotate_point(Point::new(g.left, g.top), g.rect().center(), 30.0);
        assert!((anchor_before.x - anchor_after.x).abs() < EPS);
        assert!((anchor_before.y - anchor_after.y).abs() < EPS);
    }

    #[test]
    fn test_random_gestures_stay_contained() {
        let bounds = image_bounds();
        let mut frame_region = frame(250.0, 100.0, 150.0);
        let mut element_region = element(300.0, 300.0, 150.0, 150.0);

        // Small LCG so the sequence is deterministic.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) as f64 / (1u64 << 31) as f64) * 2.0 - 1.0
        };

        for step in 0..500 {
            let delta = match step % 3 {
                0 => GestureDelta::Move { dx: next() * 300.0, dy: next() * 300.0 },
                1 => GestureDelta::Resize {
                    handle: Handle::ALL[(next().abs() * 7.99) as usize],
                    dx: next() * 250.0,
                    dy: next() * 250.0,
                },
                _ => GestureDelta::Rotate { degrees: next() * 360.0 },
            };
            frame_region = apply(&frame_region, delta, &bounds);
            element_region = apply(&element_region, delta, &bounds);

            assert_contained(&frame_region, &bounds);
            assert_contained(&element_region, &bounds);
            assert_aspect(&frame_region);
        }
    }
}
