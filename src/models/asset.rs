// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Source image state for a crop session.

use crate::error::CropError;
use image::RgbaImage;
use std::fmt;
use std::sync::Arc;

/// Load progress of the source image.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(CropError),
}

/// Whether decoded pixels may be read back for export.
///
/// An image fetched without cross-origin permission still renders, but its
/// pixels are off limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelAccess {
    Readable,
    Tainted,
}

/// The image a session crops from.
#[derive(Clone)]
pub struct ImageAsset {
    pub source_url: String,
    pub natural_width: u32,
    pub natural_height: u32,
    pub load_state: LoadState,
    pub pixel_access: PixelAccess,
    /// Retries it took to load (0 when the first attempt succeeded).
    pub retries: u32,
    pixels: Option<Arc<RgbaImage>>,
}

impl ImageAsset {
    /// An asset whose acquisition has not finished yet.
    pub fn loading(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            natural_width: 0,
            natural_height: 0,
            load_state: LoadState::Loading,
            pixel_access: PixelAccess::Readable,
            retries: 0,
            pixels: None,
        }
    }

    /// A decoded, displayable asset.
    pub fn ready(source_url: impl Into<String>, pixels: RgbaImage, pixel_access: PixelAccess) -> Self {
        Self {
            source_url: source_url.into(),
            natural_width: pixels.width(),
            natural_height: pixels.height(),
            load_state: LoadState::Ready,
            pixel_access,
            retries: 0,
            pixels: Some(Arc::new(pixels)),
        }
    }

    /// An asset whose acquisition gave up.
    pub fn failed(source_url: impl Into<String>, error: CropError) -> Self {
        Self {
            load_state: LoadState::Failed(error),
            ..Self::loading(source_url)
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.load_state == LoadState::Ready
    }

    pub fn error(&self) -> Option<&CropError> {
        match &self.load_state {
            LoadState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Decoded pixels, for display. Present whenever the asset is ready,
    /// tainted or not.
    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_deref()
    }

    /// Decoded pixels for export; fails for tainted or unloaded assets.
    pub fn readable_pixels(&self) -> Result<&RgbaImage, CropError> {
        let pixels = self.pixels().ok_or(CropError::ImageNotReady)?;
        match self.pixel_access {
            PixelAccess::Readable => Ok(pixels),
            PixelAccess::Tainted => Err(CropError::PixelReadBlocked),
        }
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("source_url", &self.source_url)
            .field("natural_width", &self.natural_width)
            .field("natural_height", &self.natural_height)
            .field("load_state", &self.load_state)
            .field("pixel_access", &self.pixel_access)
            .field("retries", &self.retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_asset_reports_dimensions() {
        let asset = ImageAsset::ready("card.png", RgbaImage::new(30, 40), PixelAccess::Readable);
        assert!(asset.is_ready());
        assert_eq!((asset.natural_width, asset.natural_height), (30, 40));
        assert!(asset.readable_pixels().is_ok());
    }

    #[test]
    fn test_tainted_asset_blocks_pixel_reads() {
        let asset = ImageAsset::ready("card.png", RgbaImage::new(4, 4), PixelAccess::Tainted);
        assert!(asset.pixels().is_some());
        assert_eq!(asset.readable_pixels().unwrap_err(), CropError::PixelReadBlocked);
    }

    #[test]
    fn test_failed_asset_keeps_error() {
        let asset = ImageAsset::failed("card.png", CropError::ImageNotReady).with_retries(5);
        assert!(!asset.is_ready());
        assert_eq!(asset.error(), Some(&CropError::ImageNotReady));
        assert_eq!(asset.retries, 5);
        assert_eq!(asset.readable_pixels().unwrap_err(), CropError::ImageNotReady);
    }
}
