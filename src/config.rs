// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Editor settings.
//!
//! Every field has a default, so a settings file only needs the values it
//! changes. Files are read and written by [`crate::io::serialization`].

use crate::engine::grid::{GridMode, DEFAULT_CELL_SIZE};
use crate::engine::history::DEFAULT_HISTORY_LIMIT;
use crate::error::{CropError, Result};
use crate::io::acquire::AcquirePolicy;
use crate::io::export::{ExportFormat, ExportSettings, RotationMode};
use crate::models::region::CARD_ASPECT_RATIO;
use crate::util::geometry::Alignment;
use serde::{Deserialize, Serialize};

/// Padding around the image in the regular layout.
pub const PADDING: f64 = 24.0;

/// Padding around the image in the compact layout.
pub const COMPACT_PADDING: f64 = 12.0;

/// Which editor flow the session serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    /// One card frame, centered image, rule-of-thirds guide, 4x export.
    #[default]
    SingleFrame,
    /// Several frames and elements, top-aligned image, canvas grid, 1x export.
    MultiRegion,
}

impl EditorMode {
    pub fn alignment(&self) -> Alignment {
        match self {
            EditorMode::SingleFrame => Alignment::Center,
            EditorMode::MultiRegion => Alignment::Top,
        }
    }

    pub fn grid_mode(&self, cell_size: f64) -> GridMode {
        match self {
            EditorMode::SingleFrame => GridMode::RuleOfThirds,
            EditorMode::MultiRegion => GridMode::Canvas { cell_size },
        }
    }

    fn base_export(&self) -> ExportSettings {
        match self {
            EditorMode::SingleFrame => ExportSettings::single_frame(),
            EditorMode::MultiRegion => ExportSettings::multi_region(),
        }
    }
}

/// Output encoding choice in settings files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub format: OutputFormat,
    /// Clamped to 80..=90.
    pub jpeg_quality: u8,
    pub rotation: RotationMode,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            jpeg_quality: 90,
            rotation: RotationMode::BoundingRect,
        }
    }
}

/// Settings for one crop editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Frame width / height.
    pub aspect_ratio: f64,
    pub compact: bool,
    pub mode: EditorMode,
    pub grid_visible: bool,
    pub grid_cell_size: f64,
    pub history_limit: usize,
    pub acquire: AcquirePolicy,
    pub export: ExportConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: CARD_ASPECT_RATIO,
            compact: false,
            mode: EditorMode::SingleFrame,
            grid_visible: true,
            grid_cell_size: DEFAULT_CELL_SIZE,
            history_limit: DEFAULT_HISTORY_LIMIT,
            acquire: AcquirePolicy::default(),
            export: ExportConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn multi_region() -> Self {
        Self {
            mode: EditorMode::MultiRegion,
            ..Self::default()
        }
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(CropError::Settings(format!(
                "aspect_ratio must be positive, got {}",
                self.aspect_ratio
            )));
        }
        if !(self.grid_cell_size.is_finite() && self.grid_cell_size > 0.0) {
            return Err(CropError::Settings(format!(
                "grid_cell_size must be positive, got {}",
                self.grid_cell_size
            )));
        }
        Ok(())
    }

    pub fn padding(&self) -> f64 {
        if self.compact {
            COMPACT_PADDING
        } else {
            PADDING
        }
    }

    pub fn grid_mode(&self) -> GridMode {
        self.mode.grid_mode(self.grid_cell_size)
    }

    /// Export settings for this editor's mode.
    pub fn export_settings(&self) -> ExportSettings {
        let format = match self.export.format {
            OutputFormat::Png => ExportFormat::Png,
            OutputFormat::Jpeg => ExportFormat::jpeg(self.export.jpeg_quality),
        };
        self.mode
            .base_export()
            .with_format(format)
            .with_rotation(self.export.rotation)
    }
}
