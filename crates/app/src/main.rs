//! Vellum desktop shell.
//!
//! `vellum [FILE]` opens FILE, or the last session's document when
//! `restore_session` is enabled.

mod app;
mod clipboard;
mod scene;

use anyhow::{Context, Result};
use eframe::egui;
use std::path::PathBuf;
use storage::{Settings, Storage};
use tracing::warn;
use viewer_core::{Editor, EditorConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let storage = match Storage::from_env_or_default() {
        Ok(storage) => Some(storage),
        Err(err) => {
            warn!(error = %err, "settings and session will not be persisted");
            None
        }
    };

    let settings = match storage.as_ref().map(Storage::load_settings).transpose() {
        Ok(settings) => settings.unwrap_or_default(),
        Err(err) => {
            warn!(error = %err, "using default settings");
            Settings::default()
        }
    };

    let engine = pdf_engine::default_engine().context("failed to start the PDF backend")?;
    let editor = Editor::new(engine, EditorConfig::from(&settings));
    let initial_file = std::env::args_os().nth(1).map(PathBuf::from);

    let app = app::VellumApp::new(editor, storage, settings, initial_file);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title("Vellum"),
        ..Default::default()
    };

    eframe::run_native("Vellum", options, Box::new(|_cc| Ok(Box::new(app))))
        .map_err(|err| anyhow::anyhow!("failed to start the window: {err}"))
}
