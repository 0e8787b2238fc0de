//! PDF Editor desktop application
//!
//! The window, its menus and dialogs, and the background worker. Editing
//! itself lives in `pdf_editor_core`; this crate maps input onto it.

pub mod cli;
pub mod dialogs;
pub mod editor;
pub mod menu;
pub mod overlay;
pub mod textures;
pub mod worker;

use cli::StartupPlan;
use eframe::egui;

/// Open the editor window and block until it closes
pub fn run(plan: StartupPlan) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("PDF Editor"),
        ..Default::default()
    };

    eframe::run_native(
        "PDF Editor",
        options,
        Box::new(move |cc| Ok(Box::new(editor::EditorApp::new(cc, plan)))),
    )
    .map_err(|err| anyhow::anyhow!("editor window failed: {err}"))
}
