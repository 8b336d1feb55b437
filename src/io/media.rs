// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Media decoding.
//!
//! This module turns fetched bytes into RGBA pixels suitable both for the
//! egui texture and for export.

use crate::error::{CropError, Result};
use image::RgbaImage;

/// Decode PNG/JPEG/WebP/... bytes into RGBA pixels.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    if bytes.is_empty() {
        return Err(CropError::decode("empty response"));
    }
    let img = image::load_from_memory(bytes).map_err(|e| CropError::decode(e.to_string()))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(CropError::decode("image has no pixels"));
    }
    Ok(img.to_rgba8())
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([200, 40, 40, 255]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode test PNG");
    buf
}
