// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Crop canvas.
//!
//! Draws the placed image, the grid and every visible region, and turns
//! pointer drags into gesture actions. Canvas coordinates are relative to the
//! top-left of the allocated rect, matching the session's coordinate space.

use cardcrop::engine::constraints::{GestureDelta, Handle};
use cardcrop::engine::grid::GridOverlay;
use cardcrop::models::region::{CropRegion, RegionId, RegionKind};
use cardcrop::util::geometry::{rotate_point, rotated_corners, Point};
use cardcrop::CropSession;

/// Pixel radius for grabbing a handle or the rotation knob.
const HANDLE_RADIUS: f64 = 8.0;

/// Distance of the rotation knob above the top edge.
const KNOB_OFFSET: f64 = 24.0;

/// What part of a region the pointer grabbed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Grab {
    Body,
    Handle(Handle),
    Knob,
}

/// Pointer drag in progress, kept by the app between frames.
#[derive(Debug, Clone)]
pub struct Drag {
    grab: Grab,
    origin: Point,
    center: Point,
    start_rotation: f64,
}

/// Result of canvas interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasAction {
    None,
    BeginGesture(RegionId),
    UpdateGesture(GestureDelta),
    EndGesture,
}

/// Display the canvas and handle pointer interaction.
pub fn show(
    ui: &mut egui::Ui,
    session: &CropSession,
    texture: Option<&egui::TextureHandle>,
    drag: &mut Option<Drag>,
) -> CanvasAction {
    let (response, painter) =
        ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
    let origin = response.rect.min;
    let to_screen = |p: Point| origin + egui::vec2(p.x as f32, p.y as f32);
    let to_canvas = |p: egui::Pos2| Point::new((p.x - origin.x) as f64, (p.y - origin.y) as f64);

    painter.rect_filled(response.rect, 0.0, egui::Color32::from_gray(40));

    if let Some(texture) = texture {
        let bounds = session.image_bounds();
        let image_rect = egui::Rect::from_min_max(
            to_screen(Point::new(bounds.left, bounds.top)),
            to_screen(Point::new(bounds.right(), bounds.bottom())),
        );
        painter.image(
            texture.id(),
            image_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
    }

    draw_grid(&painter, &session.grid_overlay(), &to_screen);

    let selected = session.selected().id.clone();
    for region in session.regions().iter().filter(|r| r.visible) {
        draw_region(&painter, region, region.id == selected, &to_screen);
    }

    let mut action = CanvasAction::None;

    if response.drag_started() {
        let press = ui
            .input(|i| i.pointer.press_origin())
            .or_else(|| response.interact_pointer_pos());
        if let Some(pos) = press {
            let point = to_canvas(pos);
            if let Some((id, grab)) = hit_test(session, point) {
                if let Some(region) = session.region(&id) {
                    *drag = Some(Drag {
                        grab,
                        origin: point,
                        center: region.geometry.rect().center(),
                        start_rotation: region.geometry.rotation,
                    });
                    action = CanvasAction::BeginGesture(id);
                }
            }
        }
    } else if response.dragged() {
        if let (Some(state), Some(pos)) = (drag.as_ref(), response.interact_pointer_pos()) {
            action = CanvasAction::UpdateGesture(state.delta(to_canvas(pos)));
        }
    } else if response.drag_stopped() && drag.take().is_some() {
        action = CanvasAction::EndGesture;
    }

    if drag.is_none() {
        if let Some(pos) = response.hover_pos() {
            match hit_test(session, to_canvas(pos)) {
                Some((_, Grab::Body)) => ui.ctx().set_cursor_icon(egui::CursorIcon::Move),
                Some((_, Grab::Handle(_))) => {
                    ui.ctx().set_cursor_icon(egui::CursorIcon::Crosshair)
                }
                Some((_, Grab::Knob)) => ui.ctx().set_cursor_icon(egui::CursorIcon::Grab),
                None => {}
            }
        }
    }

    action
}

impl Drag {
    /// Delta from the start of the drag to `pointer`.
    fn delta(&self, pointer: Point) -> GestureDelta {
        let dx = pointer.x - self.origin.x;
        let dy = pointer.y - self.origin.y;
        match self.grab {
            Grab::Body => GestureDelta::Move { dx, dy },
            Grab::Handle(handle) => GestureDelta::Resize { handle, dx, dy },
            Grab::Knob => {
                let start = angle(self.center, self.origin);
                let now = angle(self.center, pointer);
                GestureDelta::Rotate {
                    degrees: self.start_rotation + (now - start),
                }
            }
        }
    }
}

fn angle(center: Point, point: Point) -> f64 {
    (point.y - center.y).atan2(point.x - center.x).to_degrees()
}

/// Find what lies under `point`. The selected region's handles and knob win,
/// then region bodies from topmost down.
fn hit_test(session: &CropSession, point: Point) -> Option<(RegionId, Grab)> {
    let selected = session.selected();
    if selected.visible {
        if distance(knob_position(selected), point) <= HANDLE_RADIUS {
            return Some((selected.id.clone(), Grab::Knob));
        }
        for handle in Handle::ALL {
            if distance(handle_position(selected, handle), point) <= HANDLE_RADIUS {
                return Some((selected.id.clone(), Grab::Handle(handle)));
            }
        }
    }
    session
        .regions()
        .iter()
        .rev()
        .filter(|r| r.visible)
        .find(|r| contains(r, point))
        .map(|r| (r.id.clone(), Grab::Body))
}

fn contains(region: &CropRegion, point: Point) -> bool {
    let rect = region.geometry.rect();
    let local = rotate_point(point, rect.center(), -region.geometry.rotation);
    local.x >= rect.left && local.x <= rect.right() && local.y >= rect.top && local.y <= rect.bottom()
}

fn handle_position(region: &CropRegion, handle: Handle) -> Point {
    let rect = region.geometry.rect();
    rotate_point(handle.position(&rect), rect.center(), region.geometry.rotation)
}

fn knob_position(region: &CropRegion) -> Point {
    let rect = region.geometry.rect();
    let above = Point::new(rect.center().x, rect.top - KNOB_OFFSET);
    rotate_point(above, rect.center(), region.geometry.rotation)
}

fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn draw_grid(
    painter: &egui::Painter,
    overlay: &GridOverlay,
    to_screen: &impl Fn(Point) -> egui::Pos2,
) {
    let stroke = egui::Stroke::new(1.0, egui::Color32::from_white_alpha(60));
    for segment in &overlay.segments {
        painter.line_segment([to_screen(segment.from), to_screen(segment.to)], stroke);
    }
    for marker in &overlay.markers {
        painter.circle_filled(to_screen(*marker), 1.5, egui::Color32::from_white_alpha(120));
    }
}

/// Draw a region outline; the selected one also gets handles and the knob.
fn draw_region(
    painter: &egui::Painter,
    region: &CropRegion,
    is_selected: bool,
    to_screen: &impl Fn(Point) -> egui::Pos2,
) {
    let color = match region.kind {
        RegionKind::Frame => egui::Color32::YELLOW,
        RegionKind::Element => egui::Color32::LIGHT_BLUE,
    };
    let width = if is_selected { 2.5 } else { 1.5 };
    let rect = region.geometry.rect();
    let corners: Vec<egui::Pos2> = rotated_corners(&rect, region.geometry.rotation)
        .into_iter()
        .map(to_screen)
        .collect();
    let label_pos = corners[0] + egui::vec2(4.0, 4.0);
    painter.add(egui::Shape::closed_line(corners, egui::Stroke::new(width, color)));
    painter.text(
        label_pos,
        egui::Align2::LEFT_TOP,
        region.label(),
        egui::FontId::proportional(12.0),
        color,
    );

    if !is_selected {
        return;
    }

    let top_center = to_screen(handle_position(region, Handle::Top));
    let knob = to_screen(knob_position(region));
    painter.line_segment([top_center, knob], egui::Stroke::new(1.0, color));
    painter.circle_filled(knob, 5.0, color);
    painter.circle_stroke(knob, 5.0, egui::Stroke::new(1.0, egui::Color32::BLACK));

    for handle in Handle::ALL {
        let pos = to_screen(handle_position(region, handle));
        let square = egui::Rect::from_center_size(pos, egui::vec2(8.0, 8.0));
        painter.rect_filled(square, 1.0, egui::Color32::WHITE);
        painter.rect_stroke(square, 1.0, egui::Stroke::new(1.0, egui::Color32::BLACK));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardcrop::{EditorConfig, ImageAsset, PixelAccess};
    use image::RgbaImage;

    fn session() -> CropSession {
        let asset = ImageAsset::ready("card.png", RgbaImage::new(600, 800), PixelAccess::Readable);
        CropSession::new(asset, 800.0, 600.0, EditorConfig::default()).unwrap()
    }

    #[test]
    fn test_hit_test_prefers_handles() {
        let session = session();
        let main = session.selected();
        let rect = main.geometry.rect();

        let corner = Point::new(rect.left + 2.0, rect.top + 2.0);
        assert_eq!(
            hit_test(&session, corner),
            Some((RegionId::main(), Grab::Handle(Handle::TopLeft)))
        );
        assert_eq!(
            hit_test(&session, rect.center()),
            Some((RegionId::main(), Grab::Body))
        );
        assert_eq!(
            hit_test(&session, knob_position(main)),
            Some((RegionId::main(), Grab::Knob))
        );
        assert_eq!(hit_test(&session, Point::new(1.0, 1.0)), None);
    }

    #[test]
    fn test_drag_deltas() {
        let drag = Drag {
            grab: Grab::Body,
            origin: Point::new(100.0, 100.0),
            center: Point::new(100.0, 200.0),
            start_rotation: 0.0,
        };
        assert_eq!(
            drag.delta(Point::new(130.0, 90.0)),
            GestureDelta::Move { dx: 30.0, dy: -10.0 }
        );

        // Knob straight above the center, dragged to the right of it.
        let knob = Drag {
            grab: Grab::Knob,
            start_rotation: 10.0,
            ..drag
        };
        match knob.delta(Point::new(200.0, 200.0)) {
            GestureDelta::Rotate { degrees } => assert!((degrees - 100.0).abs() < 1e-9),
            other => panic!("unexpected delta {other:?}"),
        }
    }
}
