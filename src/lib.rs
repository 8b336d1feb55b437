// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! cardcrop - crop and region composition for card images
//!
//! Loads an image (retrying while freshly uploaded files propagate), fits it
//! onto a canvas, and lets the user lay out a card-shaped frame plus extra
//! frames and elements. Regions always stay inside the image; every edit is
//! undoable; the result is exported as PNG or JPEG.

pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod models;
pub mod util;

pub use config::{EditorConfig, EditorMode};
pub use engine::constraints::{GestureDelta, Handle};
pub use engine::session::{CropOutcome, CropSession};
pub use error::{CropError, Result};
pub use io::acquire::{AcquirePolicy, ImageAcquirer, LocalFetcher, SystemClock};
pub use io::export::{ExportFormat, ExportSettings, ExportedImage, RotationMode};
pub use models::asset::{ImageAsset, LoadState, PixelAccess};
pub use models::region::{CropRegion, Geometry, RegionId, RegionKind};
