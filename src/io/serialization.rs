// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Settings serialization and deserialization.
//!
//! This module reads and writes editor settings in YAML and JSON formats,
//! chosen by file extension.

use crate::config::EditorConfig;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Export settings to YAML format.
pub fn export_yaml(config: &EditorConfig, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Export settings to JSON format.
pub fn export_json(config: &EditorConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Import settings from YAML format.
pub fn import_yaml(path: &Path) -> Result<EditorConfig> {
    let yaml = std::fs::read_to_string(path)?;
    let config = serde_yaml::from_str(&yaml)?;
    Ok(config)
}

/// Import settings from JSON format.
pub fn import_json(path: &Path) -> Result<EditorConfig> {
    let json = std::fs::read_to_string(path)?;
    let config = serde_json::from_str(&json)?;
    Ok(config)
}

/// Load and validate settings, picking the format from the extension.
pub fn load_settings(path: &Path) -> Result<EditorConfig> {
    let extension = path.extension().and_then(|s| s.to_str());
    let config = match extension {
        Some("yaml") | Some("yml") => import_yaml(path),
        Some("json") => import_json(path),
        _ => bail!("Unsupported file extension: {:?}", extension),
    }
    .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Save settings, picking the format from the extension.
pub fn save_settings(config: &EditorConfig, path: &Path) -> Result<()> {
    let extension = path.extension().and_then(|s| s.to_str());
    match extension {
        Some("yaml") | Some("yml") => export_yaml(config, path),
        Some("json") => export_json(config, path),
        _ => bail!("Unsupported file extension: {:?}", extension),
    }
}
