//! Menu bar and keyboard shortcuts
//!
//! Menu items and shortcuts both produce a [`MenuAction`]; the window
//! handles every action in one place.

use crate::dialogs::DialogKind;
use doc_model::ThemeMode;
use eframe::egui;
use std::path::{Path, PathBuf};

/// Menu action identifiers for routing menu selections to app handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuAction {
    // File menu
    Open,
    OpenRecent(PathBuf),
    ClearRecent,
    Save,
    SaveAs,
    ExportImages,
    RecoverSession,
    Close,
    Quit,

    // Edit menu
    Undo,
    Redo,
    DeleteSelection,
    HighlightSelection,
    Preferences,

    // View menu
    ZoomIn,
    ZoomOut,
    ActualSize,
    FitWidth,
    FitPage,
    ToggleAnnotations,
    SetTheme(ThemeMode),

    // Page menu
    RotateClockwise,
    RotateCounterClockwise,
    MovePageUp,
    MovePageDown,
    DeletePage,

    // Insert and remove
    Insert(DialogKind),
    RemoveWatermarks,
    RemovePageNumbers,
    RemoveHeadersFooters,
    RemoveLinksOnPage,
}

/// What the menus need to know to enable their items
#[derive(Debug, Clone, Default)]
pub struct MenuState<'a> {
    pub has_document: bool,
    pub busy: bool,
    pub undo_label: Option<String>,
    pub redo_label: Option<String>,
    pub has_selection: bool,
    pub has_text_selection: bool,
    pub show_annotations: bool,
    pub has_sidecar: bool,
    pub page_count: usize,
    pub current_page: usize,
    pub recent_files: &'a [PathBuf],
    pub theme: ThemeMode,
}

impl MenuAction {
    /// Whether the action can run in `state`
    pub fn enabled(&self, state: &MenuState<'_>) -> bool {
        if state.busy {
            return matches!(self, MenuAction::Quit | MenuAction::SetTheme(_) | MenuAction::Preferences);
        }
        match self {
            MenuAction::Open
            | MenuAction::OpenRecent(_)
            | MenuAction::ClearRecent
            | MenuAction::Quit
            | MenuAction::Preferences
            | MenuAction::SetTheme(_) => true,
            MenuAction::Undo => state.has_document && state.undo_label.is_some(),
            MenuAction::Redo => state.has_document && state.redo_label.is_some(),
            MenuAction::DeleteSelection => state.has_document && state.has_selection,
            MenuAction::HighlightSelection => state.has_document && state.has_text_selection,
            MenuAction::RecoverSession => state.has_document && state.has_sidecar,
            MenuAction::MovePageUp => state.has_document && state.current_page > 0,
            MenuAction::MovePageDown => state.has_document && state.current_page + 1 < state.page_count,
            MenuAction::DeletePage => state.has_document && state.page_count > 1,
            _ => state.has_document,
        }
    }
}

fn item(ui: &mut egui::Ui, state: &MenuState<'_>, label: &str, action: MenuAction, out: &mut Option<MenuAction>) {
    let enabled = action.enabled(state);
    if ui.add_enabled(enabled, egui::Button::new(label)).clicked() {
        *out = Some(action);
        ui.close_menu();
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Draw the menu bar; returns the chosen action
pub fn menu_bar(ui: &mut egui::Ui, state: &MenuState<'_>) -> Option<MenuAction> {
    let mut action = None;
    egui::menu::bar(ui, |ui| {
        ui.menu_button("File", |ui| {
            item(ui, state, "Open…", MenuAction::Open, &mut action);
            ui.menu_button("Open Recent", |ui| {
                if state.recent_files.is_empty() {
                    ui.add_enabled(false, egui::Button::new("No recent files"));
                }
                for path in state.recent_files {
                    let label = file_name(path);
                    if ui.button(label).on_hover_text(path.display().to_string()).clicked() {
                        action = Some(MenuAction::OpenRecent(path.clone()));
                        ui.close_menu();
                    }
                }
                ui.separator();
                item(ui, state, "Clear Recent", MenuAction::ClearRecent, &mut action);
            });
            ui.separator();
            item(ui, state, "Save", MenuAction::Save, &mut action);
            item(ui, state, "Save As…", MenuAction::SaveAs, &mut action);
            item(ui, state, "Export Pages as PNG…", MenuAction::ExportImages, &mut action);
            item(ui, state, "Recover Unsaved Session", MenuAction::RecoverSession, &mut action);
            ui.separator();
            item(ui, state, "Close", MenuAction::Close, &mut action);
            item(ui, state, "Quit", MenuAction::Quit, &mut action);
        });

        ui.menu_button("Edit", |ui| {
            let undo = state.undo_label.as_deref().map_or("Undo".to_owned(), |l| format!("Undo {l}"));
            let redo = state.redo_label.as_deref().map_or("Redo".to_owned(), |l| format!("Redo {l}"));
            item(ui, state, &undo, MenuAction::Undo, &mut action);
            item(ui, state, &redo, MenuAction::Redo, &mut action);
            ui.separator();
            item(ui, state, "Delete Selected Item", MenuAction::DeleteSelection, &mut action);
            item(ui, state, "Highlight Selected Text", MenuAction::HighlightSelection, &mut action);
            ui.separator();
            item(ui, state, "Preferences…", MenuAction::Preferences, &mut action);
        });

        ui.menu_button("View", |ui| {
            item(ui, state, "Zoom In", MenuAction::ZoomIn, &mut action);
            item(ui, state, "Zoom Out", MenuAction::ZoomOut, &mut action);
            item(ui, state, "Actual Size", MenuAction::ActualSize, &mut action);
            item(ui, state, "Fit Width", MenuAction::FitWidth, &mut action);
            item(ui, state, "Fit Page", MenuAction::FitPage, &mut action);
            ui.separator();
            let panel = egui::SelectableLabel::new(state.show_annotations, "Annotations Panel");
            if ui.add_enabled(MenuAction::ToggleAnnotations.enabled(state), panel).clicked() {
                action = Some(MenuAction::ToggleAnnotations);
                ui.close_menu();
            }
            ui.menu_button("Theme", |ui| {
                for theme in [ThemeMode::System, ThemeMode::Light, ThemeMode::Dark] {
                    if ui.radio(state.theme == theme, theme.label()).clicked() {
                        action = Some(MenuAction::SetTheme(theme));
                        ui.close_menu();
                    }
                }
            });
        });

        ui.menu_button("Page", |ui| {
            item(ui, state, "Rotate Clockwise", MenuAction::RotateClockwise, &mut action);
            item(ui, state, "Rotate Counterclockwise", MenuAction::RotateCounterClockwise, &mut action);
            ui.separator();
            item(ui, state, "Move Up", MenuAction::MovePageUp, &mut action);
            item(ui, state, "Move Down", MenuAction::MovePageDown, &mut action);
            ui.separator();
            item(ui, state, "Delete Page", MenuAction::DeletePage, &mut action);
        });

        ui.menu_button("Insert", |ui| {
            for kind in DialogKind::ALL {
                item(ui, state, kind.menu_label(), MenuAction::Insert(kind), &mut action);
            }
            ui.separator();
            ui.menu_button("Remove", |ui| {
                item(ui, state, "All Watermarks", MenuAction::RemoveWatermarks, &mut action);
                item(ui, state, "Page Numbers", MenuAction::RemovePageNumbers, &mut action);
                item(ui, state, "Headers and Footers", MenuAction::RemoveHeadersFooters, &mut action);
                item(ui, state, "Links on This Page", MenuAction::RemoveLinksOnPage, &mut action);
            });
        });
    });
    action
}

/// Keyboard shortcuts, consumed so text fields do not also see them
pub fn shortcut(ctx: &egui::Context) -> Option<MenuAction> {
    use egui::{Key, KeyboardShortcut, Modifiers};

    let shift = Modifiers::COMMAND | Modifiers::SHIFT;
    let bindings = [
        (KeyboardShortcut::new(shift, Key::S), MenuAction::SaveAs),
        (KeyboardShortcut::new(shift, Key::Z), MenuAction::Redo),
        (KeyboardShortcut::new(Modifiers::COMMAND, Key::O), MenuAction::Open),
        (KeyboardShortcut::new(Modifiers::COMMAND, Key::S), MenuAction::Save),
        (KeyboardShortcut::new(Modifiers::COMMAND, Key::Z), MenuAction::Undo),
        (KeyboardShortcut::new(Modifiers::COMMAND, Key::Y), MenuAction::Redo),
        (KeyboardShortcut::new(Modifiers::COMMAND, Key::W), MenuAction::Close),
        (KeyboardShortcut::new(Modifiers::COMMAND, Key::H), MenuAction::HighlightSelection),
        (KeyboardShortcut::new(Modifiers::COMMAND, Key::Plus), MenuAction::ZoomIn),
        (KeyboardShortcut::new(Modifiers::COMMAND, Key::Equals), MenuAction::ZoomIn),
        (KeyboardShortcut::new(Modifiers::COMMAND, Key::Minus), MenuAction::ZoomOut),
        (KeyboardShortcut::new(Modifiers::COMMAND, Key::Num0), MenuAction::ActualSize),
    ];

    ctx.input_mut(|input| {
        for (shortcut, action) in bindings {
            if input.consume_shortcut(&shortcut) {
                return Some(action);
            }
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_state() -> MenuState<'static> {
        MenuState { has_document: true, page_count: 3, current_page: 1, ..MenuState::default() }
    }

    #[test]
    fn document_actions_need_a_document() {
        let empty = MenuState::default();
        assert!(MenuAction::Open.enabled(&empty));
        assert!(!MenuAction::Save.enabled(&empty));
        assert!(!MenuAction::Insert(DialogKind::Stamp).enabled(&empty));
        assert!(MenuAction::Insert(DialogKind::Stamp).enabled(&open_state()));
    }

    #[test]
    fn undo_and_redo_follow_history() {
        let mut state = open_state();
        assert!(!MenuAction::Undo.enabled(&state));

        state.undo_label = Some("Add Stamp".to_owned());
        assert!(MenuAction::Undo.enabled(&state));
        assert!(!MenuAction::Redo.enabled(&state));
    }

    #[test]
    fn page_moves_respect_bounds() {
        let mut state = open_state();
        assert!(MenuAction::MovePageUp.enabled(&state));
        assert!(MenuAction::MovePageDown.enabled(&state));

        state.current_page = 2;
        assert!(!MenuAction::MovePageDown.enabled(&state));

        state.page_count = 1;
        state.current_page = 0;
        assert!(!MenuAction::DeletePage.enabled(&state));
    }

    #[test]
    fn highlighting_needs_selected_text() {
        let mut state = open_state();
        assert!(!MenuAction::HighlightSelection.enabled(&state));

        state.has_selection = true;
        assert!(!MenuAction::HighlightSelection.enabled(&state));

        state.has_text_selection = true;
        assert!(MenuAction::HighlightSelection.enabled(&state));
        assert!(!MenuAction::HighlightSelection.enabled(&MenuState::default()));
    }

    #[test]
    fn busy_window_only_allows_quit_and_appearance() {
        let state = MenuState { busy: true, ..open_state() };
        assert!(!MenuAction::Save.enabled(&state));
        assert!(!MenuAction::Open.enabled(&state));
        assert!(MenuAction::Quit.enabled(&state));
        assert!(MenuAction::SetTheme(ThemeMode::Dark).enabled(&state));
    }
}
