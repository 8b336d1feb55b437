// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! cardcrop desktop editor.
//!
//! Opens an image, lets the user place card frames and elements over it,
//! and saves the cropped result.

mod app;
mod ui;

use anyhow::Result;
use app::CropApp;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    // Optional image to open on startup
    let image = std::env::args().nth(1);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("cardcrop"),
        ..Default::default()
    };

    eframe::run_native(
        "cardcrop",
        options,
        Box::new(move |_cc| {
            let mut app = CropApp::new();
            if let Some(url) = image {
                app.open_image(url);
            }
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Application error: {}", e))?;

    Ok(())
}
