use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MAX_RECENT_FILES: usize = 10;
pub const MIN_ZOOM_PERCENT: u16 = 50;
pub const MAX_ZOOM_PERCENT: u16 = 500;
pub const DEFAULT_HISTORY_DEPTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::Light => "Light",
            Self::Dark => "Dark",
        }
    }

    pub fn resolve(self, system_prefers_dark: bool) -> bool {
        match self {
            Self::System => system_prefers_dark,
            Self::Light => false,
            Self::Dark => true,
        }
    }
}

/// User settings persisted across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: ThemeMode,
    pub author_name: String,
    pub pen_color: [u8; 4],
    pub pen_width: f32,
    pub highlight_color: [u8; 4],
    pub zoom_percent: u16,
    pub history_depth: usize,
    pub recent_files: Vec<PathBuf>,
    pub last_file: Option<PathBuf>,
    pub default_stamp_preset: usize,
    pub default_stamp_image: Option<PathBuf>,
    pub default_signature: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: ThemeMode::System,
            author_name: String::new(),
            pen_color: [255, 0, 0, 255],
            pen_width: 3.0,
            highlight_color: [255, 255, 0, 80],
            zoom_percent: 100,
            history_depth: DEFAULT_HISTORY_DEPTH,
            recent_files: Vec::new(),
            last_file: None,
            default_stamp_preset: 0,
            default_stamp_image: None,
            default_signature: None,
        }
    }
}

impl Settings {
    /// Moves `path` to the front of the recent list, capped at
    /// [`MAX_RECENT_FILES`].
    pub fn add_recent(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.recent_files.retain(|existing| existing != &path);
        self.recent_files.insert(0, path.clone());
        self.recent_files.truncate(MAX_RECENT_FILES);
        self.last_file = Some(path);
    }

    pub fn clear_recent(&mut self) {
        self.recent_files.clear();
    }

    /// Drops recent entries for which `exists` returns false.
    pub fn retain_existing_recent(&mut self, exists: impl Fn(&Path) -> bool) {
        self.recent_files.retain(|path| exists(path));
        self.recent_files.truncate(MAX_RECENT_FILES);
        if self.last_file.as_deref().is_some_and(|path| !exists(path)) {
            self.last_file = None;
        }
    }

    /// Values read from disk may be hand-edited; pull them back into range.
    pub fn normalized(mut self) -> Self {
        self.zoom_percent = self.zoom_percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT);
        self.history_depth = self.history_depth.max(1);
        if !self.pen_width.is_finite() || self.pen_width <= 0.0 {
            self.pen_width = 3.0;
        }
        self.recent_files.truncate(MAX_RECENT_FILES);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZoomMode {
    #[default]
    Percent,
    FitPage,
    FitWidth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomAction {
    ZoomIn,
    ZoomOut,
    ActualSize100,
    FitPage,
    FitWidth,
    SetPercent(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderState {
    pub zoom_mode: ZoomMode,
    pub zoom_percent: u16,
    pub current_page: u32,
    pub page_count: u32,
}

impl Default for ReaderState {
    fn default() -> Self {
        Self {
            zoom_mode: ZoomMode::Percent,
            zoom_percent: 100,
            current_page: 0,
            page_count: 0,
        }
    }
}

impl ReaderState {
    pub fn zoom_factor(&self) -> f32 {
        f32::from(self.zoom_percent) / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderAction {
    DocumentOpened { page_count: u32 },
    DocumentClosed,
    PageCountChanged { page_count: u32 },
    SetCurrentPage { page: u32 },
    NextPage,
    PreviousPage,
    Zoom(ZoomAction),
}

pub fn apply_zoom_action(state: &mut ReaderState, action: ZoomAction) {
    match action {
        ZoomAction::ZoomIn => {
            state.zoom_mode = ZoomMode::Percent;
            state.zoom_percent = scale_percent(state.zoom_percent, 1.2);
        }
        ZoomAction::ZoomOut => {
            state.zoom_mode = ZoomMode::Percent;
            state.zoom_percent = scale_percent(state.zoom_percent, 1.0 / 1.2);
        }
        ZoomAction::ActualSize100 => {
            state.zoom_mode = ZoomMode::Percent;
            state.zoom_percent = 100;
        }
        ZoomAction::FitPage => state.zoom_mode = ZoomMode::FitPage,
        ZoomAction::FitWidth => state.zoom_mode = ZoomMode::FitWidth,
        ZoomAction::SetPercent(percent) => {
            state.zoom_mode = ZoomMode::Percent;
            state.zoom_percent = percent.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT);
        }
    }
}

fn scale_percent(percent: u16, factor: f32) -> u16 {
    let scaled = (f32::from(percent) * factor).round();
    (scaled as u16).clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT)
}

pub fn apply_reader_action(state: &mut ReaderState, action: ReaderAction) {
    match action {
        ReaderAction::DocumentOpened { page_count } => {
            state.page_count = page_count;
            state.current_page = 0;
        }
        ReaderAction::DocumentClosed => {
            state.page_count = 0;
            state.current_page = 0;
        }
        ReaderAction::PageCountChanged { page_count } => {
            state.page_count = page_count;
            state.current_page = state.current_page.min(page_count.saturating_sub(1));
        }
        ReaderAction::SetCurrentPage { page } => {
            state.current_page = page.min(state.page_count.saturating_sub(1));
        }
        ReaderAction::NextPage => {
            if state.current_page + 1 < state.page_count {
                state.current_page += 1;
            }
        }
        ReaderAction::PreviousPage => {
            state.current_page = state.current_page.saturating_sub(1);
        }
        ReaderAction::Zoom(zoom) => apply_zoom_action(state, zoom),
    }
}
