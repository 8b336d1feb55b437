// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Crop export.
//!
//! Maps a region's canvas rectangle back onto source pixels, rasterizes it
//! at a fixed multiple of its on-screen size and encodes the result as PNG
//! (lossless, for re-editing) or JPEG (final output).

use crate::error::{CropError, Result};
use crate::models::asset::ImageAsset;
use crate::models::region::{CropRegion, Geometry, RegionId};
use crate::util::geometry::{rotate_point, Placement, Point, Rect};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// JPEG quality range accepted for final output.
pub const JPEG_QUALITY_RANGE: std::ops::RangeInclusive<u8> = 80..=90;

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "format")]
pub enum ExportFormat {
    Png,
    Jpeg { quality: u8 },
}

impl ExportFormat {
    pub fn jpeg(quality: u8) -> Self {
        ExportFormat::Jpeg {
            quality: quality.clamp(*JPEG_QUALITY_RANGE.start(), *JPEG_QUALITY_RANGE.end()),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg { .. } => "jpg",
        }
    }
}

/// How rotated regions are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    /// Ignore rotation and export the un-rotated rectangle.
    #[default]
    BoundingRect,
    /// Sample along the rotated rectangle so the output is upright.
    Rotated,
}

/// Export parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Output pixels per canvas pixel.
    pub upscale: f64,
    pub format: ExportFormat,
    pub rotation: RotationMode,
}

impl ExportSettings {
    /// Single card frame: 4x the on-screen size, lossless.
    pub fn single_frame() -> Self {
        Self {
            upscale: 4.0,
            format: ExportFormat::Png,
            rotation: RotationMode::BoundingRect,
        }
    }

    /// Multi-region editor: on-screen size, lossless.
    pub fn multi_region() -> Self {
        Self {
            upscale: 1.0,
            format: ExportFormat::Png,
            rotation: RotationMode::BoundingRect,
        }
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_rotation(mut self, rotation: RotationMode) -> Self {
        self.rotation = rotation;
        self
    }
}

/// An encoded crop.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

impl ExportedImage {
    /// `data:` URL carrying the encoded bytes.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }
}

/// Source-pixel rectangle under a region's un-rotated canvas rectangle.
pub fn source_rect(geometry: &Geometry, asset: &ImageAsset, placement: &Placement) -> Rect {
    let placed = placement.image_bounds(asset.natural_width, asset.natural_height);
    let scale_x = asset.natural_width as f64 / placed.width;
    let scale_y = asset.natural_height as f64 / placed.height;
    Rect::new(
        (geometry.left - placed.left) * scale_x,
        (geometry.top - placed.top) * scale_y,
        geometry.width * scale_x,
        geometry.height * scale_y,
    )
}

/// Rasterize and encode one region.
pub fn export(
    region: &CropRegion,
    asset: &ImageAsset,
    placement: &Placement,
    settings: &ExportSettings,
) -> Result<ExportedImage> {
    if !asset.is_ready() {
        return Err(CropError::ImageNotReady);
    }
    let pixels = asset.readable_pixels()?;
    if placement.scale <= 0.0 {
        return Err(CropError::EmptyCrop);
    }

    let g = &region.geometry;
    let out_width = (g.width * settings.upscale).round().max(1.0) as u32;
    let out_height = (g.height * settings.upscale).round().max(1.0) as u32;

    let raster = match settings.rotation {
        RotationMode::Rotated if g.rotation != 0.0 => {
            rotated_crop(pixels, g, placement, out_width, out_height)
        }
        _ => axis_aligned_crop(pixels, &source_rect(g, asset, placement), out_width, out_height)?,
    };

    let exported = encode(raster, settings.format)?;
    log::info!(
        "Exported region {} as {}x{} {} ({} bytes)",
        region.id,
        exported.width,
        exported.height,
        exported.mime_type,
        exported.bytes.len()
    );
    Ok(exported)
}

/// Export every visible region, in store order.
pub fn export_visible<'a>(
    regions: impl IntoIterator<Item = &'a CropRegion>,
    asset: &ImageAsset,
    placement: &Placement,
    settings: &ExportSettings,
) -> Result<Vec<(RegionId, ExportedImage)>> {
    regions
        .into_iter()
        .filter(|r| r.visible)
        .map(|r| Ok((r.id.clone(), export(r, asset, placement, settings)?)))
        .collect()
}

/// Crop `source` (fractional source pixels) to `out_width`x`out_height`.
///
/// The whole-pixel block covering the visible part is resampled once at the
/// output scale with Lanczos3, then read back at the exact fractional
/// position of every output pixel. Output pixels whose source lies off the
/// image stay transparent.
fn axis_aligned_crop(
    pixels: &RgbaImage,
    source: &Rect,
    out_width: u32,
    out_height: u32,
) -> Result<RgbaImage> {
    let image_rect = Rect::new(0.0, 0.0, pixels.width() as f64, pixels.height() as f64);
    let clipped = image_rect.intersect(source).ok_or(CropError::EmptyCrop)?;

    let x0 = clipped.left.floor() as u32;
    let y0 = clipped.top.floor() as u32;
    let x1 = (clipped.right().ceil() as u32).min(pixels.width());
    let y1 = (clipped.bottom().ceil() as u32).min(pixels.height());
    if x1 <= x0 || y1 <= y0 {
        return Err(CropError::EmptyCrop);
    }

    // Output pixels per source pixel.
    let scale_x = out_width as f64 / source.width;
    let scale_y = out_height as f64 / source.height;

    let block = image::imageops::crop_imm(pixels, x0, y0, x1 - x0, y1 - y0).to_image();
    let block_width = (((x1 - x0) as f64 * scale_x).round() as u32).max(1);
    let block_height = (((y1 - y0) as f64 * scale_y).round() as u32).max(1);
    let block = if block.dimensions() == (block_width, block_height) {
        block
    } else {
        image::imageops::resize(&block, block_width, block_height, FilterType::Lanczos3)
    };
    let block_scale_x = block_width as f64 / (x1 - x0) as f64;
    let block_scale_y = block_height as f64 / (y1 - y0) as f64;

    Ok(RgbaImage::from_fn(out_width, out_height, |u, v| {
        let sx = source.left + (u as f64 + 0.5) / scale_x;
        let sy = source.top + (v as f64 + 0.5) / scale_y;
        if sx < clipped.left || sx > clipped.right() || sy < clipped.top || sy > clipped.bottom() {
            return Rgba([0, 0, 0, 0]);
        }
        sample_bilinear(
            &block,
            (sx - x0 as f64) * block_scale_x - 0.5,
            (sy - y0 as f64) * block_scale_y - 0.5,
        )
    }))
}

/// Inverse-map every output pixel through the region's rotation and sample
/// the source bilinearly. Points outside the source come out transparent.
fn rotated_crop(
    pixels: &RgbaImage,
    geometry: &Geometry,
    placement: &Placement,
    out_width: u32,
    out_height: u32,
) -> RgbaImage {
    let rect = geometry.rect();
    let center = rect.center();
    let step_x = rect.width / out_width as f64;
    let step_y = rect.height / out_height as f64;

    RgbaImage::from_fn(out_width, out_height, |u, v| {
        let local = Point::new(
            rect.left + (u as f64 + 0.5) * step_x,
            rect.top + (v as f64 + 0.5) * step_y,
        );
        let canvas = rotate_point(local, center, geometry.rotation);
        let source = placement.canvas_to_image(canvas);
        sample_bilinear(pixels, source.x - 0.5, source.y - 0.5)
    })
}

fn sample_bilinear(pixels: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = (pixels.width() as i64, pixels.height() as i64);
    if x < -1.0 || y < -1.0 || x > w as f64 || y > h as f64 {
        return Rgba([0, 0, 0, 0]);
    }
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let fetch = |px: i64, py: i64| -> [f64; 4] {
        let cx = px.clamp(0, w - 1) as u32;
        let cy = py.clamp(0, h - 1) as u32;
        pixels.get_pixel(cx, cy).0.map(f64::from)
    };
    let (a, b, c, d) = (
        fetch(x0, y0),
        fetch(x0 + 1, y0),
        fetch(x0, y0 + 1),
        fetch(x0 + 1, y0 + 1),
    );

    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = a[i] + (b[i] - a[i]) * fx;
        let bottom = c[i] + (d[i] - c[i]) * fx;
        out[i] = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

fn encode(raster: RgbaImage, format: ExportFormat) -> Result<ExportedImage> {
    let (width, height) = raster.dimensions();
    let mut bytes = Vec::new();
    let mime_type = match format {
        ExportFormat::Png => {
            DynamicImage::ImageRgba8(raster)
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .map_err(|e| CropError::encode(format!("PNG encode failed: {e}")))?;
            "image/png"
        }
        ExportFormat::Jpeg { quality } => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgba8(raster).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
            DynamicImage::ImageRgb8(rgb)
                .write_with_encoder(encoder)
                .map_err(|e| CropError::encode(format!("JPEG encode failed: {e}")))?;
            "image/jpeg"
        }
    };
    Ok(ExportedImage {
        bytes,
        mime_type,
        width,
        height,
    })
}
