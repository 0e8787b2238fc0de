//! The editor window
//!
//! One [`EditorApp`] owns the open [`EditSession`] and turns menu actions,
//! canvas gestures and dialog input into calls on it. Long jobs go to the
//! [`Worker`]; everything else runs on the UI thread between frames.

use crate::cli::StartupPlan;
use crate::dialogs::{ActiveDialog, DialogForm, DialogResponse, LinkForm, TextPromptForm};
use crate::menu::{self, MenuAction, MenuState};
use crate::overlay::{color32, core_color, ImageTextures, Overlay};
use crate::textures::PageTextures;
use crate::worker::{Job, JobOutcome, Worker};
use doc_model::{
    apply_reader_action, apply_zoom_action, ReaderAction, ReaderState, Settings, ThemeMode, ZoomAction,
    ZoomMode,
};
use eframe::egui;
use pdf_editor_core::persistence::{delete_sidecar, load_sidecar, save_sidecar, sidecar_exists};
use pdf_editor_core::text_blocks::{block_at, text_edit_for};
use pdf_editor_core::tools::image_at;
use pdf_editor_core::{
    generate_handles, handle_at, highlight_selection, text_blocks, Annotation, AnnotationId, Canvas, DialogContext,
    EditSession, EditorError, EditorResult, GestureOutcome, HistoryOutcome, ImagePayload,
    ManipulationState, PageRect, RemovalAction, SessionSidecar, TextBlock, TextEditState, Tool,
    TextSelection, ToolGesture, ToolStyles, ViewPoint,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use storage::Storage;

const APP_NAME: &str = "PDF Editor";

/// How often unsaved edits are written to the recovery sidecar
pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Pixels per point of exported page images
pub const IMAGE_EXPORT_SCALE: f32 = 2.0;

/// Selection handle size on screen
const HANDLE_PX: f32 = 8.0;

const THUMB_WIDTH: f32 = 100.0;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "webp"];

/// Error dialog state
struct ErrorDialogState {
    severity: ErrorSeverity,
    title: String,
    message: String,
}

#[derive(Clone, Copy, PartialEq)]
enum ErrorSeverity {
    Error,
    Warning,
}

impl ErrorSeverity {
    fn icon(&self) -> &'static str {
        match self {
            ErrorSeverity::Error => "❌",
            ErrorSeverity::Warning => "⚠️",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ErrorSeverity::Error => "Error",
            ErrorSeverity::Warning => "Warning",
        }
    }
}

/// Actions that throw away unsaved edits and need confirming first
#[derive(Debug, Clone, PartialEq)]
enum DiscardAction {
    /// `None` asks for a file
    Open(Option<PathBuf>),
    Close,
    Quit,
}

impl DiscardAction {
    fn verb(&self) -> &'static str {
        match self {
            DiscardAction::Open(_) => "opening another document",
            DiscardAction::Close => "closing",
            DiscardAction::Quit => "quitting",
        }
    }
}

/// Text being typed into the popup editor
enum PendingText {
    /// An existing note, text box or replacement
    Existing(TextEditState),
    /// Replacement for a run of page text, added on commit
    Cover { annotation: Annotation, text: String },
}

impl PendingText {
    fn text_mut(&mut self) -> &mut String {
        match self {
            PendingText::Existing(state) => &mut state.text,
            PendingText::Cover { text, .. } => text,
        }
    }

    /// Page and box the popup sits over
    fn target(&self, session: &EditSession) -> Option<(usize, PageRect)> {
        let annotation = match self {
            PendingText::Existing(state) => session.annotations().get(state.annotation_id())?,
            PendingText::Cover { annotation, .. } => annotation,
        };
        Some((usize::from(annotation.page_index()), annotation.bounding_box()))
    }

    /// One undo step when the text changed
    fn commit(self, canvas: &Canvas, session: &mut EditSession) -> EditorResult<bool> {
        match self {
            PendingText::Existing(state) => state.commit(session),
            PendingText::Cover { annotation, text } => {
                if annotation.kind().text() == Some(text.as_str()) {
                    return Ok(false);
                }
                let Some(kind) = annotation.kind().with_text(text) else {
                    return Ok(false);
                };
                canvas.add_item(session, annotation.with_kind(kind))?;
                Ok(true)
            }
        }
    }
}

/// Title bar text: document name, with a marker when modified
pub fn window_title(document: Option<(&str, bool)>) -> String {
    match document {
        None => APP_NAME.to_owned(),
        Some((name, true)) => format!("{name} • {APP_NAME}"),
        Some((name, false)) => format!("{name} - {APP_NAME}"),
    }
}

/// One row of the annotations panel: page, kind and the start of its text
pub fn annotation_row_label(annotation: &Annotation) -> String {
    const PREVIEW_CHARS: usize = 30;

    let label = format!("[P{}] {}", usize::from(annotation.page_index()) + 1, annotation.kind().label());
    let text = annotation.kind().text().and_then(|text| text.lines().map(str::trim).find(|line| !line.is_empty()));
    match text {
        Some(line) if line.chars().count() > PREVIEW_CHARS => {
            let short: String = line.chars().take(PREVIEW_CHARS).collect();
            format!("{label}: {}…", short.trim_end())
        }
        Some(line) => format!("{label}: {line}"),
        None => label,
    }
}

/// `path` with a `.pdf` extension, keeping one the user typed
pub fn with_pdf_extension(path: PathBuf) -> PathBuf {
    let has_pdf = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if has_pdf {
        path
    } else {
        let mut name = path.into_os_string();
        name.push(".pdf");
        PathBuf::from(name)
    }
}

fn theme_preference(theme: ThemeMode) -> egui::ThemePreference {
    match theme {
        ThemeMode::System => egui::ThemePreference::System,
        ThemeMode::Light => egui::ThemePreference::Light,
        ThemeMode::Dark => egui::ThemePreference::Dark,
    }
}

pub struct EditorApp {
    session: Option<EditSession>,
    canvas: Canvas,
    pages: PageTextures,
    images: ImageTextures,
    worker: Option<Worker>,
    storage: Option<Storage>,
    settings: Settings,
    reader: ReaderState,

    // Tools
    tool: Tool,
    styles: ToolStyles,
    gesture: Option<ToolGesture>,
    selection: Option<AnnotationId>,
    manipulation: Option<ManipulationState>,
    text_edit: Option<PendingText>,
    /// Text runs of one page for the Edit Text tool
    text_blocks: Option<(usize, Vec<TextBlock>)>,
    text_selection: Option<TextSelection>,

    // Windows
    dialog: Option<ActiveDialog>,
    error_dialog: Option<ErrorDialogState>,
    confirm: Option<DiscardAction>,
    recovery: Option<SessionSidecar>,
    show_preferences: bool,
    show_annotations: bool,

    // Recovery sidecar
    has_sidecar: bool,
    sidecar_dirty: bool,
    last_autosave: Instant,

    // View
    viewport: egui::Vec2,
    canvas_origin: egui::Pos2,
    scroll_offset: f32,
    scroll_to: Option<usize>,
    sidebar_scroll_to_current: bool,
    status: Option<String>,
    title: String,
    quitting: bool,
}

impl EditorApp {
    pub fn new(cc: &eframe::CreationContext<'_>, plan: StartupPlan) -> Self {
        let storage = match Storage::from_default_project() {
            Ok(storage) => Some(storage),
            Err(err) => {
                tracing::warn!(error = %err, "settings and assets are unavailable");
                None
            }
        };
        let mut settings = storage
            .as_ref()
            .map(|storage| {
                storage.load_settings().unwrap_or_else(|err| {
                    tracing::warn!(error = %err, "using default settings");
                    Settings::default()
                })
            })
            .unwrap_or_default();
        settings.retain_existing_recent(Path::exists);
        cc.egui_ctx.set_theme(theme_preference(settings.theme));

        let ctx = cc.egui_ctx.clone();
        let worker = match Worker::spawn(move || ctx.request_repaint()) {
            Ok(worker) => Some(worker),
            Err(err) => {
                tracing::error!(error = %err, "could not start the worker thread");
                None
            }
        };

        let mut app = Self::with_parts(settings, storage, worker);
        if let Some(path) = plan.open {
            app.open_path(path);
        }
        if let Some(warning) = plan.warning {
            app.show_error(ErrorSeverity::Warning, warning);
        }
        app
    }

    fn with_parts(settings: Settings, storage: Option<Storage>, worker: Option<Worker>) -> Self {
        let mut styles = ToolStyles::default();
        styles.set_pen(pdf_editor_core::Color::from_array(settings.pen_color), settings.pen_width);
        styles.set_highlight(pdf_editor_core::Color::from_array(settings.highlight_color));
        let reader = ReaderState { zoom_percent: settings.zoom_percent, ..ReaderState::default() };

        Self {
            session: None,
            canvas: Canvas::default(),
            pages: PageTextures::default(),
            images: ImageTextures::default(),
            worker,
            storage,
            settings,
            reader,
            tool: Tool::default(),
            styles,
            gesture: None,
            selection: None,
            manipulation: None,
            text_edit: None,
            text_blocks: None,
            text_selection: None,
            dialog: None,
            error_dialog: None,
            confirm: None,
            recovery: None,
            show_preferences: false,
            show_annotations: false,
            has_sidecar: false,
            sidecar_dirty: false,
            last_autosave: Instant::now(),
            viewport: egui::Vec2::ZERO,
            canvas_origin: egui::Pos2::ZERO,
            scroll_offset: 0.0,
            scroll_to: None,
            sidebar_scroll_to_current: false,
            status: None,
            title: String::new(),
            quitting: false,
        }
    }

    fn show_error(&mut self, severity: ErrorSeverity, message: impl Into<String>) {
        self.error_dialog = Some(ErrorDialogState {
            severity,
            title: severity.title().to_string(),
            message: message.into(),
        });
    }

    fn report(&mut self, err: EditorError) {
        tracing::warn!(error = %err, "edit failed");
        let severity = if err.is_user_error() { ErrorSeverity::Warning } else { ErrorSeverity::Error };
        self.show_error(severity, err.to_string());
    }

    fn busy(&self) -> bool {
        self.worker.as_ref().is_some_and(Worker::is_busy)
    }

    fn current_page(&self) -> usize {
        self.reader.current_page as usize
    }

    fn save_settings(&self) {
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.save_settings(&self.settings) {
                tracing::warn!(error = %err, "saving settings failed");
            }
        }
    }

    fn submit(&mut self, job: Job) {
        let Some(worker) = &mut self.worker else {
            self.show_error(ErrorSeverity::Error, "The background worker is not running.");
            return;
        };
        if !worker.submit(job) {
            self.status = Some("Another job is still running".to_owned());
        }
    }

    fn reset_interaction(&mut self) {
        self.gesture = None;
        self.selection = None;
        self.manipulation = None;
        self.text_edit = None;
        self.text_blocks = None;
        self.text_selection = None;
    }
}

// Documents: open, save, export, recovery
impl EditorApp {
    /// Run `action` now, or ask first when it would drop unsaved edits
    fn request_discard(&mut self, action: DiscardAction) {
        if self.session.as_ref().is_some_and(EditSession::is_modified) {
            self.confirm = Some(action);
        } else {
            self.discard(action);
        }
    }

    fn discard(&mut self, action: DiscardAction) {
        match action {
            DiscardAction::Open(Some(path)) => self.open_path(path),
            DiscardAction::Open(None) => {
                if let Some(path) = rfd::FileDialog::new().add_filter("PDF", &["pdf"]).pick_file() {
                    self.open_path(path);
                }
            }
            DiscardAction::Close => self.close_document(),
            DiscardAction::Quit => self.quitting = true,
        }
    }

    fn open_path(&mut self, path: PathBuf) {
        tracing::info!(path = %path.display(), "opening document");
        self.submit(Job::Open { path });
    }

    fn install_session(&mut self, path: PathBuf, mut session: EditSession) {
        if !self.settings.author_name.trim().is_empty() {
            session.set_author(self.settings.author_name.clone());
        }
        session.set_history_depth(self.settings.history_depth);

        self.close_document();
        self.canvas.set_pages(session.pages());
        if let Err(err) = self.pages.load(&session) {
            tracing::warn!(error = %err, "pages will not be rendered");
        }
        apply_reader_action(
            &mut self.reader,
            ReaderAction::DocumentOpened { page_count: session.page_count() as u32 },
        );
        self.viewport = egui::Vec2::ZERO;
        self.scroll_to = Some(0);
        self.sidebar_scroll_to_current = true;
        self.last_autosave = Instant::now();

        match load_sidecar(&path) {
            Ok(Some(sidecar)) => {
                self.has_sidecar = true;
                self.recovery = Some(sidecar);
            }
            Ok(None) => self.has_sidecar = false,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable recovery file");
                self.has_sidecar = sidecar_exists(&path);
            }
        }

        self.settings.add_recent(&path);
        self.settings.last_file = Some(path);
        self.save_settings();
        self.status = Some(format!("Opened {}", session.display_name()));
        self.session = Some(session);
    }

    fn close_document(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("document closed");
        }
        self.pages.close();
        self.images.clear();
        self.reset_interaction();
        self.recovery = None;
        self.has_sidecar = false;
        self.sidecar_dirty = false;
        apply_reader_action(&mut self.reader, ReaderAction::DocumentClosed);
        self.canvas.set_pages(&[]);
    }

    fn save(&mut self, pick: bool) {
        let Some(session) = &self.session else { return };
        let target = match session.path() {
            Some(path) if !pick => Some(path.to_path_buf()),
            _ => rfd::FileDialog::new()
                .add_filter("PDF", &["pdf"])
                .set_file_name(session.display_name())
                .save_file()
                .map(with_pdf_extension),
        };
        if let Some(path) = target {
            let snapshot = session.snapshot();
            self.submit(Job::Save { snapshot, path });
        }
    }

    fn export_images(&mut self) {
        let Some(session) = &self.session else { return };
        if let Some(dir) = rfd::FileDialog::new().pick_folder() {
            let snapshot = session.snapshot();
            self.submit(Job::ExportImages { snapshot, dir, scale: IMAGE_EXPORT_SCALE });
        }
    }

    fn poll_worker(&mut self) {
        let Some(outcome) = self.worker.as_mut().and_then(Worker::poll) else { return };
        match outcome {
            JobOutcome::Opened { path, result: Ok(session) } => self.install_session(path, session),
            JobOutcome::Opened { result: Err(EditorError::Cancelled), .. } => {
                self.status = Some("Open cancelled".to_owned());
            }
            JobOutcome::Opened { path, result: Err(err) } => {
                self.show_error(ErrorSeverity::Error, format!("Failed to open {}: {err}", path.display()));
            }
            JobOutcome::Saved { path, state, result: Ok(()) } => {
                // The sidecar belongs to the path the edits were made under
                self.remove_sidecar();
                if let Some(session) = &mut self.session {
                    session.mark_saved(&path, state);
                }
                self.sidecar_dirty = false;
                self.settings.add_recent(&path);
                self.settings.last_file = Some(path.clone());
                self.save_settings();
                self.status = Some(format!("Saved {}", path.display()));
            }
            JobOutcome::Saved { result: Err(EditorError::Cancelled), .. } => {
                self.status = Some("Save cancelled".to_owned());
            }
            JobOutcome::Saved { path, result: Err(err), .. } => {
                self.show_error(ErrorSeverity::Error, format!("Failed to save {}: {err}", path.display()));
            }
            JobOutcome::ImagesExported { dir, result: Ok(files) } => {
                self.status = Some(format!("Exported {} page images to {}", files.len(), dir.display()));
            }
            JobOutcome::ImagesExported { result: Err(EditorError::Cancelled), .. } => {
                self.status = Some("Export cancelled".to_owned());
            }
            JobOutcome::ImagesExported { result: Err(err), .. } => {
                self.show_error(ErrorSeverity::Error, format!("Image export failed: {err}"));
            }
        }
    }

    fn remove_sidecar(&mut self) {
        let Some(path) = self.session.as_ref().and_then(EditSession::path) else { return };
        if let Err(err) = delete_sidecar(path) {
            tracing::warn!(error = %err, "could not delete recovery file");
        }
        self.has_sidecar = false;
    }

    /// Write the recovery sidecar when edits have piled up
    fn autosave(&mut self, ctx: &egui::Context) {
        if !self.sidecar_dirty || self.busy() {
            return;
        }
        let remaining = AUTOSAVE_INTERVAL.saturating_sub(self.last_autosave.elapsed());
        if !remaining.is_zero() {
            ctx.request_repaint_after(remaining);
            return;
        }
        self.last_autosave = Instant::now();
        self.sidecar_dirty = false;

        let Some(session) = &self.session else { return };
        let Some(path) = session.path() else { return };
        if !session.is_modified() {
            self.remove_sidecar();
            return;
        }
        match save_sidecar(path, &session.sidecar()) {
            Ok(_) => self.has_sidecar = true,
            Err(err) => tracing::warn!(error = %err, "autosave failed"),
        }
    }

    fn offer_recovery(&mut self) {
        let Some(path) = self.session.as_ref().and_then(EditSession::path) else { return };
        match load_sidecar(path) {
            Ok(Some(sidecar)) => self.recovery = Some(sidecar),
            Ok(None) => {
                self.has_sidecar = false;
                self.status = Some("No unsaved session to recover".to_owned());
            }
            Err(err) => self.report(err),
        }
    }

    fn recover(&mut self, sidecar: SessionSidecar) {
        let Some(session) = &mut self.session else { return };
        match session.recover(sidecar) {
            Ok(()) => {
                self.reset_interaction();
                self.after_edit();
                self.sidecar_dirty = false;
                self.status = Some("Recovered unsaved session".to_owned());
            }
            Err(err) => self.report(err),
        }
    }
}

// Editing
impl EditorApp {
    /// Run an edit on the session and refresh everything derived from it
    fn edit(&mut self, f: impl FnOnce(&mut EditSession, &Canvas) -> EditorResult<()>) -> bool {
        let Some(session) = &mut self.session else { return false };
        match f(session, &self.canvas) {
            Ok(()) => {
                self.after_edit();
                true
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    fn after_edit(&mut self) {
        let Some(session) = &self.session else { return };
        self.canvas.set_pages(session.pages());
        self.pages.retain_pages(session.pages());
        apply_reader_action(
            &mut self.reader,
            ReaderAction::PageCountChanged { page_count: session.page_count() as u32 },
        );
        if self.selection.is_some_and(|id| !session.annotations().contains(id)) {
            self.selection = None;
        }
        self.text_blocks = None;
        self.text_selection = None;
        self.sidecar_dirty = true;
    }

    fn history_step(&mut self, redo: bool) {
        let Some(session) = &mut self.session else { return };
        let result = if redo { session.redo() } else { session.undo() };
        match result {
            Ok(HistoryOutcome::Applied(label)) => {
                self.after_edit();
                let verb = if redo { "Redid" } else { "Undid" };
                self.status = Some(format!("{verb} {label}"));
            }
            Ok(HistoryOutcome::Nothing) => {
                self.status = Some(if redo { "Nothing to redo" } else { "Nothing to undo" }.to_owned());
            }
            Err(err) => self.report(err),
        }
    }

    fn remove_all(&mut self, action: RemovalAction) {
        let Some(session) = &mut self.session else { return };
        match session.remove_matching(action.label(), |annotation| action.matches(annotation)) {
            Ok(HistoryOutcome::Applied(label)) => {
                self.after_edit();
                self.status = Some(label);
            }
            Ok(HistoryOutcome::Nothing) => self.status = Some("Nothing to remove".to_owned()),
            Err(err) => self.report(err),
        }
    }

    fn go_to_page(&mut self, page: usize) {
        apply_reader_action(&mut self.reader, ReaderAction::SetCurrentPage { page: page as u32 });
        self.scroll_to = Some(self.current_page());
        self.sidebar_scroll_to_current = true;
    }

    fn zoom(&mut self, action: ZoomAction) {
        apply_zoom_action(&mut self.reader, action);
        self.sync_zoom();
        if self.reader.zoom_mode == ZoomMode::Percent && self.settings.zoom_percent != self.reader.zoom_percent {
            self.settings.zoom_percent = self.reader.zoom_percent;
            self.save_settings();
        }
    }

    /// Bring the canvas zoom in line with the reader's zoom mode
    fn sync_zoom(&mut self) {
        let zoom = match self.reader.zoom_mode {
            ZoomMode::Percent => self.reader.zoom_factor(),
            ZoomMode::FitWidth => self.canvas.fit_width_zoom(self.viewport.x),
            ZoomMode::FitPage => {
                self.canvas.fit_page_zoom(self.current_page(), self.viewport.x, self.viewport.y)
            }
        };
        if (zoom - self.canvas.zoom()).abs() > f32::EPSILON {
            self.canvas.set_zoom(zoom);
            self.pages.clear_cache();
            self.scroll_to = Some(self.current_page());
        }
        self.reader.zoom_percent = (self.canvas.zoom() * 100.0).round() as u16;
    }

    fn set_tool(&mut self, tool: Tool) {
        if self.tool != tool {
            self.tool = tool;
            self.gesture = None;
            self.manipulation = None;
            self.text_selection = None;
            if tool != Tool::Select {
                self.selection = None;
            }
        }
    }

    fn handle_outcome(&mut self, outcome: GestureOutcome) {
        let page_count = self.session.as_ref().map_or(0, EditSession::page_count);
        match outcome {
            GestureOutcome::Annotation(annotation) => {
                self.edit(|session, canvas| canvas.add_item(session, annotation).map(|_| ()));
            }
            GestureOutcome::NotePrompt { page_index, at } => {
                let form = TextPromptForm::note(page_index, at, self.styles.note.clone());
                self.dialog = Some(ActiveDialog::new(DialogForm::Text(form)));
            }
            GestureOutcome::TextPrompt { page_index, at, area } => {
                let form = TextPromptForm::text_box(page_index, at, area, self.styles.text.clone());
                self.dialog = Some(ActiveDialog::new(DialogForm::Text(form)));
            }
            GestureOutcome::LinkArea { page_index, rect } => {
                let form = LinkForm::new(page_index, rect, page_count);
                self.dialog = Some(ActiveDialog::new(DialogForm::Link(form)));
            }
            GestureOutcome::ImagePrompt { page_index, at } => {
                let picked = rfd::FileDialog::new().add_filter("Images", &IMAGE_EXTENSIONS).pick_file();
                if let Some(path) = picked {
                    match ImagePayload::from_path(&path) {
                        Ok(image) => {
                            self.edit(|session, canvas| {
                                canvas.add_item(session, image_at(page_index, at, image)).map(|_| ())
                            });
                        }
                        Err(err) => self.report(err),
                    }
                }
            }
            GestureOutcome::TextArea { page_index, rect } => self.select_text(page_index, rect),
            GestureOutcome::Nothing => {}
        }
    }

    fn select_text(&mut self, page: usize, area: PageRect) {
        let found = self.page_text_blocks(page).map(|blocks| TextSelection::from_area(page, blocks, &area));
        let selection = match found {
            Ok(selection) => selection,
            Err(err) => {
                self.report(err);
                return;
            }
        };
        self.status = Some(match &selection {
            Some(_) => "Text selected, press Ctrl+H to highlight it".to_owned(),
            None => "No text here".to_owned(),
        });
        self.text_selection = selection;
    }

    fn highlight_text_selection(&mut self) {
        let Some(selection) = self.text_selection.take() else { return };
        let style = self.styles.highlight.clone();
        if self.edit(|session, _| highlight_selection(session, &selection, &style).map(|_| ())) {
            self.status = Some("Text highlighted".to_owned());
        }
    }

    fn remove_listed(&mut self, id: AnnotationId) {
        if self.selection == Some(id) {
            self.selection = None;
        }
        self.edit(|session, _| session.remove_annotation(id));
    }

    /// Start typing into the item or page text under `point`
    fn begin_text_edit(&mut self, point: ViewPoint, page_text: bool) {
        let Some(session) = &self.session else { return };
        if let Some(id) = self.canvas.hit_test(session, point) {
            if let Ok(state) = TextEditState::begin(session, id) {
                self.selection = Some(id);
                self.text_edit = Some(PendingText::Existing(state));
                return;
            }
        }
        if !page_text {
            return;
        }
        let Some((page, at)) = self.canvas.view_to_page(point) else { return };
        let found = self
            .page_text_blocks(page)
            .map(|blocks| block_at(blocks, &at).map(|block| (text_edit_for(page, block), block.text.clone())));
        match found {
            Ok(Some((annotation, text))) => self.text_edit = Some(PendingText::Cover { annotation, text }),
            Ok(None) => {}
            Err(err) => self.report(err),
        }
    }

    fn page_text_blocks(&mut self, page: usize) -> EditorResult<&[TextBlock]> {
        let cached = self.text_blocks.as_ref().is_some_and(|(index, _)| *index == page);
        if !cached {
            let Some(session) = &self.session else { return Ok(&[]) };
            self.text_blocks = Some((page, text_blocks(session, page)?));
        }
        Ok(self.text_blocks.as_ref().map_or(&[], |(_, blocks)| blocks.as_slice()))
    }

    fn finish_text_edit(&mut self, keep: bool) {
        let Some(pending) = self.text_edit.take() else { return };
        if keep {
            if let Some(session) = &mut self.session {
                match pending.commit(&self.canvas, session) {
                    Ok(true) => self.after_edit(),
                    Ok(false) => {}
                    Err(err) => self.report(err),
                }
            }
        }
    }

    fn menu_state(&self) -> MenuState<'_> {
        let history = self.session.as_ref().map(EditSession::history);
        MenuState {
            has_document: self.session.is_some(),
            busy: self.busy(),
            undo_label: history.and_then(|h| h.undo_label()),
            redo_label: history.and_then(|h| h.redo_label()),
            has_selection: self.selection.is_some(),
            has_text_selection: self.text_selection.is_some(),
            show_annotations: self.show_annotations,
            has_sidecar: self.has_sidecar,
            page_count: self.session.as_ref().map_or(0, EditSession::page_count),
            current_page: self.current_page(),
            recent_files: &self.settings.recent_files,
            theme: self.settings.theme,
        }
    }

    fn dispatch(&mut self, ctx: &egui::Context, action: MenuAction) {
        if !action.enabled(&self.menu_state()) {
            return;
        }
        tracing::debug!(?action, "menu action");
        let current = self.current_page();
        match action {
            MenuAction::Open => self.request_discard(DiscardAction::Open(None)),
            MenuAction::OpenRecent(path) => self.request_discard(DiscardAction::Open(Some(path))),
            MenuAction::ClearRecent => {
                self.settings.clear_recent();
                self.save_settings();
            }
            MenuAction::Save => self.save(false),
            MenuAction::SaveAs => self.save(true),
            MenuAction::ExportImages => self.export_images(),
            MenuAction::RecoverSession => self.offer_recovery(),
            MenuAction::Close => self.request_discard(DiscardAction::Close),
            MenuAction::Quit => ctx.send_viewport_cmd(egui::ViewportCommand::Close),

            MenuAction::Undo => self.history_step(false),
            MenuAction::Redo => self.history_step(true),
            MenuAction::DeleteSelection => {
                if let Some(id) = self.selection.take() {
                    self.edit(|session, canvas| canvas.remove_item(session, id));
                }
            }
            MenuAction::HighlightSelection => self.highlight_text_selection(),
            MenuAction::Preferences => self.show_preferences = true,

            MenuAction::ZoomIn => self.zoom(ZoomAction::ZoomIn),
            MenuAction::ZoomOut => self.zoom(ZoomAction::ZoomOut),
            MenuAction::ActualSize => self.zoom(ZoomAction::ActualSize100),
            MenuAction::FitWidth => self.zoom(ZoomAction::FitWidth),
            MenuAction::FitPage => self.zoom(ZoomAction::FitPage),
            MenuAction::ToggleAnnotations => self.show_annotations = !self.show_annotations,
            MenuAction::SetTheme(theme) => {
                self.settings.theme = theme;
                ctx.set_theme(theme_preference(theme));
                self.save_settings();
            }

            MenuAction::RotateClockwise => {
                self.edit(|session, _| session.rotate_pages(vec![current], 1));
            }
            MenuAction::RotateCounterClockwise => {
                self.edit(|session, _| session.rotate_pages(vec![current], -1));
            }
            MenuAction::MovePageUp => {
                if self.edit(|session, _| session.move_page(current, current - 1)) {
                    self.go_to_page(current - 1);
                }
            }
            MenuAction::MovePageDown => {
                if self.edit(|session, _| session.move_page(current, current + 1)) {
                    self.go_to_page(current + 1);
                }
            }
            MenuAction::DeletePage => {
                if self.edit(|session, _| session.delete_pages(&[current])) {
                    self.go_to_page(current);
                }
            }

            MenuAction::Insert(kind) => {
                self.dialog = Some(ActiveDialog::for_kind(kind, &self.settings, self.storage.as_ref()));
            }
            MenuAction::RemoveWatermarks => self.remove_all(RemovalAction::Watermarks),
            MenuAction::RemovePageNumbers => self.remove_all(RemovalAction::PageNumbers),
            MenuAction::RemoveHeadersFooters => self.remove_all(RemovalAction::HeadersFooters),
            MenuAction::RemoveLinksOnPage => self.remove_all(RemovalAction::LinksOnPage(current as u16)),
        }
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_worker();
        self.handle_close_request(ctx);
        self.update_title(ctx);

        let mut actions = Vec::new();
        self.draw_menu_bar(ctx, &mut actions);
        self.draw_toolbar(ctx, &mut actions);
        self.draw_status_bar(ctx);
        self.draw_sidebar(ctx, &mut actions);
        self.draw_annotation_list(ctx);
        self.draw_canvas(ctx);
        self.handle_keyboard(ctx, &mut actions);
        for action in actions {
            self.dispatch(ctx, action);
        }

        self.draw_text_popup(ctx);
        self.draw_dialog(ctx);
        self.draw_preferences(ctx);
        self.draw_recovery_prompt(ctx);
        self.draw_confirm(ctx);
        self.draw_busy(ctx);
        self.draw_error_dialog(ctx);
        self.autosave(ctx);
    }
}

// Frame plumbing
impl EditorApp {
    fn handle_close_request(&mut self, ctx: &egui::Context) {
        if self.quitting {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }
        if ctx.input(|input| input.viewport().close_requested()) {
            let modified = self.session.as_ref().is_some_and(EditSession::is_modified);
            if modified || self.busy() {
                ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
                if self.busy() {
                    self.status = Some("Wait for the running job or cancel it".to_owned());
                } else {
                    self.confirm = Some(DiscardAction::Quit);
                }
            }
        }
    }

    fn update_title(&mut self, ctx: &egui::Context) {
        let name = self.session.as_ref().map(|session| (session.display_name(), session.is_modified()));
        let title = window_title(name.as_ref().map(|(name, modified)| (name.as_str(), *modified)));
        if title != self.title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.title = title;
        }
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context, actions: &mut Vec<MenuAction>) {
        if self.dialog.is_some() || self.text_edit.is_some() {
            if self.text_edit.is_some() && ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
                self.finish_text_edit(false);
            }
            return;
        }
        actions.extend(menu::shortcut(ctx));
        if ctx.wants_keyboard_input() {
            return;
        }

        ctx.input(|i| {
            if i.key_pressed(egui::Key::Escape) {
                if self.error_dialog.is_some() {
                    self.error_dialog = None;
                } else {
                    self.gesture = None;
                    self.manipulation = None;
                    self.selection = None;
                    self.text_selection = None;
                }
            }
            if i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace) {
                actions.push(MenuAction::DeleteSelection);
            }
        });

        let step = ctx.input(|i| {
            if i.key_pressed(egui::Key::PageDown) {
                Some(ReaderAction::NextPage)
            } else if i.key_pressed(egui::Key::PageUp) {
                Some(ReaderAction::PreviousPage)
            } else {
                None
            }
        });
        if let Some(step) = step {
            apply_reader_action(&mut self.reader, step);
            self.go_to_page(self.current_page());
        }
    }
}

// Panels
impl EditorApp {
    fn draw_menu_bar(&mut self, ctx: &egui::Context, actions: &mut Vec<MenuAction>) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            let state = self.menu_state();
            actions.extend(menu::menu_bar(ui, &state));
        });
    }

    fn draw_toolbar(&mut self, ctx: &egui::Context, actions: &mut Vec<MenuAction>) {
        let enabled = self.session.is_some() && !self.busy();
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.add_space(8.0);
                if ui.add_enabled(!self.busy(), egui::Button::new("📂 Open")).clicked() {
                    actions.push(MenuAction::Open);
                }
                ui.separator();

                ui.add_enabled_ui(enabled, |ui| {
                    for tool in Tool::ALL {
                        if ui.selectable_label(self.tool == tool, tool.label()).clicked() {
                            self.set_tool(tool);
                        }
                    }
                    ui.separator();
                    self.style_controls(ui);
                    ui.separator();

                    if ui.button("−").clicked() {
                        actions.push(MenuAction::ZoomOut);
                    }
                    let zoom_text = match self.reader.zoom_mode {
                        ZoomMode::Percent => format!("{}%", self.reader.zoom_percent),
                        ZoomMode::FitWidth => "Fit Width".to_owned(),
                        ZoomMode::FitPage => "Fit Page".to_owned(),
                    };
                    egui::ComboBox::from_id_salt("zoom_mode").selected_text(zoom_text).width(80.0).show_ui(
                        ui,
                        |ui| {
                            if ui.selectable_label(false, "Fit Page").clicked() {
                                actions.push(MenuAction::FitPage);
                            }
                            if ui.selectable_label(false, "Fit Width").clicked() {
                                actions.push(MenuAction::FitWidth);
                            }
                            if ui.selectable_label(false, "100%").clicked() {
                                actions.push(MenuAction::ActualSize);
                            }
                        },
                    );
                    if ui.button("+").clicked() {
                        actions.push(MenuAction::ZoomIn);
                    }
                    ui.separator();

                    let page_count = self.reader.page_count as usize;
                    if ui.button("◀").clicked() && self.current_page() > 0 {
                        self.go_to_page(self.current_page() - 1);
                    }
                    let page_text = if page_count > 0 {
                        format!("{} / {}", self.current_page() + 1, page_count)
                    } else {
                        "— / —".to_string()
                    };
                    ui.label(page_text);
                    if ui.button("▶").clicked() && self.current_page() + 1 < page_count {
                        self.go_to_page(self.current_page() + 1);
                    }
                    ui.separator();

                    if ui.button("⟲").on_hover_text("Rotate counterclockwise").clicked() {
                        actions.push(MenuAction::RotateCounterClockwise);
                    }
                    if ui.button("⟳").on_hover_text("Rotate clockwise").clicked() {
                        actions.push(MenuAction::RotateClockwise);
                    }
                });
            });
        });
    }

    fn style_controls(&mut self, ui: &mut egui::Ui) {
        let mut changed = false;

        let mut pen = color32(self.styles.pen.stroke_color);
        let mut width = self.styles.pen.stroke_width;
        ui.label("Pen");
        changed |= egui::color_picker::color_edit_button_srgba(ui, &mut pen, egui::color_picker::Alpha::Opaque)
            .changed();
        changed |= ui.add(egui::DragValue::new(&mut width).range(0.5..=20.0).speed(0.1).suffix(" pt")).changed();

        let mut highlight = color32(self.styles.highlight.stroke_color);
        ui.label("Highlight");
        changed |=
            egui::color_picker::color_edit_button_srgba(ui, &mut highlight, egui::color_picker::Alpha::Opaque)
                .changed();

        if changed {
            self.styles.set_pen(core_color(pen), width);
            self.styles.set_highlight(core_color(highlight));
            self.settings.pen_color = core_color(pen).to_array();
            self.settings.pen_width = width;
            self.settings.highlight_color = core_color(highlight).to_array();
            self.save_settings();
        }
    }

    fn draw_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match &self.session {
                    Some(session) => {
                        ui.label(format!("Page {} of {}", self.current_page() + 1, session.page_count()));
                        ui.separator();
                        ui.label(format!("{}%", self.reader.zoom_percent));
                        if session.is_modified() {
                            ui.separator();
                            ui.label("Modified");
                        }
                    }
                    None => {
                        ui.weak("No document");
                    }
                }
                if let Some(status) = &self.status {
                    ui.separator();
                    ui.label(status.as_str());
                }
                if let Some(kind) = self.worker.as_ref().and_then(Worker::running) {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.spinner();
                        ui.label(kind.label());
                    });
                }
            });
        });
    }

    fn draw_sidebar(&mut self, ctx: &egui::Context, actions: &mut Vec<MenuAction>) {
        egui::SidePanel::left("thumbnails").default_width(130.0).resizable(true).show(ctx, |ui| {
            ui.heading("Pages");
            ui.separator();

            let Some(session) = &self.session else {
                ui.weak("No document loaded");
                return;
            };
            let entries = session.pages().to_vec();
            let busy = self.busy();
            let mut clicked = None;
            let mut context_action = None;

            egui::ScrollArea::vertical().show(ui, |ui| {
                for (page, entry) in entries.iter().enumerate() {
                    let is_current = page == self.current_page();
                    let frame = if is_current {
                        egui::Frame::NONE
                            .stroke(egui::Stroke::new(2.0, ui.visuals().selection.bg_fill))
                            .inner_margin(2.0)
                            .corner_radius(4.0)
                    } else {
                        egui::Frame::NONE
                            .stroke(egui::Stroke::new(1.0, ui.visuals().widgets.inactive.bg_stroke.color))
                            .inner_margin(2.0)
                            .corner_radius(4.0)
                    };

                    let size = entry.display_size();
                    let thumb_scale = THUMB_WIDTH / size.width_pt.max(1.0);
                    let thumb_size = egui::vec2(THUMB_WIDTH, size.height_pt * thumb_scale);

                    let response = frame.show(ui, |ui| {
                        ui.vertical_centered(|ui| {
                            let (rect, _) = ui.allocate_exact_size(thumb_size, egui::Sense::hover());
                            match self.pages.texture(ctx, entry, thumb_scale) {
                                Some(texture) => {
                                    ui.painter().image(
                                        texture.id(),
                                        rect,
                                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                                        egui::Color32::WHITE,
                                    );
                                }
                                None => {
                                    ui.painter().rect_filled(rect, 4.0, ui.visuals().widgets.inactive.bg_fill);
                                }
                            }
                            ui.small(format!("{}", page + 1));
                        });
                    });

                    let response = response.response.interact(egui::Sense::click());
                    if response.clicked() {
                        clicked = Some(page);
                    }
                    if !busy {
                        response.context_menu(|ui| {
                            let mut item = |ui: &mut egui::Ui, label: &str, enabled: bool, action: MenuAction| {
                                if ui.add_enabled(enabled, egui::Button::new(label)).clicked() {
                                    context_action = Some((page, action));
                                    ui.close_menu();
                                }
                            };
                            item(ui, "Rotate Clockwise", true, MenuAction::RotateClockwise);
                            item(ui, "Rotate Counterclockwise", true, MenuAction::RotateCounterClockwise);
                            item(ui, "Move Up", page > 0, MenuAction::MovePageUp);
                            item(ui, "Move Down", page + 1 < entries.len(), MenuAction::MovePageDown);
                            item(ui, "Delete Page", entries.len() > 1, MenuAction::DeletePage);
                        });
                    }

                    if is_current && self.sidebar_scroll_to_current {
                        response.scroll_to_me(Some(egui::Align::Center));
                        self.sidebar_scroll_to_current = false;
                    }
                    ui.add_space(4.0);
                }
            });

            if let Some(page) = clicked {
                self.go_to_page(page);
            }
            if let Some((page, action)) = context_action {
                self.go_to_page(page);
                actions.push(action);
            }
        });
    }

    fn draw_annotation_list(&mut self, ctx: &egui::Context) {
        if !self.show_annotations {
            return;
        }
        let mut open = true;
        let mut clicked = None;
        let mut removed = None;
        egui::SidePanel::right("annotations").default_width(220.0).resizable(true).show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Annotations");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.small_button("Hide").clicked() {
                        open = false;
                    }
                });
            });
            ui.separator();

            let Some(session) = &self.session else {
                ui.weak("No document loaded");
                return;
            };
            let all = session.annotations().all();
            if all.is_empty() {
                ui.weak("No annotations yet");
                return;
            }
            let editable = !self.busy();
            egui::ScrollArea::vertical().show(ui, |ui| {
                for annotation in all {
                    let id = annotation.id();
                    let response = ui.selectable_label(self.selection == Some(id), annotation_row_label(annotation));
                    if response.clicked() {
                        clicked = Some((usize::from(annotation.page_index()), id));
                    }
                    if editable {
                        response.context_menu(|ui| {
                            if ui.button("Delete").clicked() {
                                removed = Some(id);
                                ui.close_menu();
                            }
                        });
                    }
                }
            });
        });

        if let Some((page, id)) = clicked {
            self.set_tool(Tool::Select);
            self.go_to_page(page);
            self.selection = Some(id);
        }
        if let Some(id) = removed {
            self.remove_listed(id);
        }
        self.show_annotations = open;
    }

    fn draw_canvas(&mut self, ctx: &egui::Context) {
        let frame = egui::Frame::central_panel(&ctx.style()).fill(ctx.style().visuals.extreme_bg_color);
        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            if self.session.is_none() {
                ui.centered_and_justified(|ui| {
                    ui.heading("Open a PDF to get started");
                });
                return;
            }

            let viewport = ui.available_size();
            if viewport != self.viewport {
                self.viewport = viewport;
                self.canvas.set_viewport_width(viewport.x);
                self.sync_zoom();
            }

            let mut area = egui::ScrollArea::both().auto_shrink([false, false]);
            let jumped = self.scroll_to.take();
            if let Some(page) = jumped {
                area = area.vertical_scroll_offset(self.canvas.scroll_offset_for(page));
            }
            let output = area.show_viewport(ui, |ui, visible| self.canvas_contents(ctx, ui, visible));
            self.scroll_offset = output.state.offset.y;

            if jumped.is_none() {
                let page = self.canvas.current_page(self.scroll_offset, self.viewport.y);
                if page != self.current_page() {
                    apply_reader_action(&mut self.reader, ReaderAction::SetCurrentPage { page: page as u32 });
                    self.sidebar_scroll_to_current = true;
                }
            }
        });
    }

    fn canvas_contents(&mut self, ctx: &egui::Context, ui: &mut egui::Ui, visible: egui::Rect) {
        let size = egui::vec2(self.canvas.content_width(), self.canvas.content_height());
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click_and_drag());
        self.canvas_origin = rect.min;
        let editing = !self.busy();

        self.paint_canvas(ctx, ui, visible);
        if editing {
            self.canvas_input(ctx, &response);
        }
        if matches!(self.tool, Tool::EditText | Tool::SelectText) {
            response.on_hover_cursor(egui::CursorIcon::Text);
        }
    }

    fn paint_canvas(&mut self, ctx: &egui::Context, ui: &egui::Ui, visible: egui::Rect) {
        let Some(session) = &self.session else { return };
        let painter = ui.painter();
        let overlay = Overlay { painter, canvas: &self.canvas, origin: self.canvas_origin };
        let scale = self.canvas.scale();
        let range = self.canvas.visible_pages(visible.min.y, visible.height());
        let preview = self.manipulation.as_ref().and_then(ManipulationState::result);

        for index in range.clone() {
            let (Some(entry), Some(slot)) = (session.pages().get(index), self.canvas.page_rect(index)) else {
                continue;
            };
            let page_rect = overlay.screen_rect(slot);
            painter.rect_filled(page_rect.translate(egui::vec2(2.0, 3.0)), 0.0, egui::Color32::from_black_alpha(40));
            painter.rect_filled(page_rect, 0.0, egui::Color32::WHITE);
            if let Some(texture) = self.pages.texture(ctx, entry, scale) {
                painter.image(
                    texture.id(),
                    page_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }

            for annotation in session.annotations().get_page_annotations(index as u16) {
                let shown = match &preview {
                    Some(moved) if moved.id() == annotation.id() => moved,
                    _ => annotation,
                };
                overlay.annotation(ctx, &mut self.images, shown, entry.rotation);
            }
        }

        if let Some(annotation) = self.selection.and_then(|id| session.annotations().get(id)) {
            let shown = preview.as_ref().filter(|moved| moved.id() == annotation.id()).unwrap_or(annotation);
            overlay.selection(shown, &generate_handles(shown, HANDLE_PX / scale));
        }

        if let Some(gesture) = &self.gesture {
            let style = if gesture.tool() == Tool::Highlight { &self.styles.highlight } else { &self.styles.pen };
            overlay.gesture(gesture, style.stroke_color, style.stroke_width);
        }

        if let Some(selection) = self.text_selection.as_ref().filter(|s| range.contains(&s.page_index)) {
            for line in selection.line_rects() {
                overlay.text_selection(selection.page_index, line);
            }
        }

        if self.tool == Tool::EditText {
            if let Some((page, blocks)) = &self.text_blocks {
                if range.contains(page) {
                    for block in blocks {
                        overlay.text_block(*page, block.rect);
                    }
                }
            }
        }
    }

    fn view_point(&self, pos: egui::Pos2) -> ViewPoint {
        ViewPoint::new(pos.x - self.canvas_origin.x, pos.y - self.canvas_origin.y)
    }

    fn canvas_input(&mut self, ctx: &egui::Context, response: &egui::Response) {
        if self.tool == Tool::EditText {
            if let Some(pos) = response.hover_pos() {
                if let Some((page, _)) = self.canvas.view_to_page(self.view_point(pos)) {
                    let loaded = self.page_text_blocks(page).map(|_| ());
                    if let Err(err) = loaded {
                        tracing::debug!(error = %err, "no text blocks for page");
                        self.text_blocks = Some((page, Vec::new()));
                    }
                }
            }
        }

        if response.drag_started() {
            let origin = ctx.input(|i| i.pointer.press_origin()).or(response.interact_pointer_pos());
            if let Some(pos) = origin {
                self.drag_start(self.view_point(pos));
            }
        } else if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.drag_update(self.view_point(pos));
            }
        }
        if response.drag_stopped() {
            self.drag_stop();
        }

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let point = self.view_point(pos);
                match self.tool {
                    Tool::Select => self.begin_text_edit(point, false),
                    Tool::EditText => self.begin_text_edit(point, true),
                    _ => {}
                }
            }
        } else if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.click(self.view_point(pos));
            }
        }
    }

    fn click(&mut self, point: ViewPoint) {
        let Some(session) = &self.session else { return };
        match self.tool {
            Tool::Select => self.selection = self.canvas.hit_test(session, point),
            Tool::Eraser => {
                let mut erased = None;
                self.edit(|session, canvas| {
                    erased = canvas.erase_at(session, point)?;
                    Ok(())
                });
                if erased.is_some() {
                    self.status = Some("Item erased".to_owned());
                }
            }
            Tool::EditText => {}
            tool => {
                let Some((page, at)) = self.canvas.view_to_page(point) else { return };
                let Ok(entry) = session.page(page) else { return };
                if let Some(gesture) = ToolGesture::begin(tool, page, entry.size(), at) {
                    let outcome = gesture.finish(&self.styles);
                    self.handle_outcome(outcome);
                }
            }
        }
    }

    fn drag_start(&mut self, point: ViewPoint) {
        let Some(session) = &self.session else { return };
        match self.tool {
            Tool::Select => {
                let tolerance = self.canvas.page_tolerance();
                let handle_size = HANDLE_PX / self.canvas.scale();

                // Handles of the current selection win over items beneath it
                let selected = self.selection.and_then(|id| session.annotations().get(id)).and_then(|annotation| {
                    let page = usize::from(annotation.page_index());
                    let at = self.canvas.view_to_page_on(page, point)?;
                    handle_at(annotation, &at, handle_size, tolerance).map(|handle| (annotation, handle, at))
                });
                let target = selected.or_else(|| {
                    let id = self.canvas.hit_test(session, point)?;
                    let annotation = session.annotations().get(id)?;
                    let at = self.canvas.view_to_page_on(usize::from(annotation.page_index()), point)?;
                    Some((annotation, pdf_editor_core::HandleType::Move, at))
                });

                match target {
                    Some((annotation, handle, at)) => {
                        let Ok(entry) = session.page(usize::from(annotation.page_index())) else { return };
                        self.selection = Some(annotation.id());
                        self.manipulation = Some(ManipulationState::new(annotation.clone(), handle, entry.size(), at));
                    }
                    None => self.selection = None,
                }
            }
            Tool::Eraser => self.click(point),
            Tool::EditText => {}
            tool => {
                let Some((page, at)) = self.canvas.view_to_page(point) else { return };
                let Ok(entry) = session.page(page) else { return };
                self.gesture = ToolGesture::begin(tool, page, entry.size(), at);
            }
        }
    }

    fn drag_update(&mut self, point: ViewPoint) {
        if let Some(manipulation) = &mut self.manipulation {
            let page = usize::from(manipulation.original.page_index());
            if let Some(at) = self.canvas.view_to_page_on(page, point) {
                manipulation.update_position(at);
            }
        } else if let Some(gesture) = &mut self.gesture {
            if let Some(at) = self.canvas.view_to_page_on(gesture.page_index(), point) {
                gesture.update(at);
            }
        } else if self.tool == Tool::Eraser {
            self.click(point);
        }
    }

    fn drag_stop(&mut self) {
        if let Some(manipulation) = self.manipulation.take() {
            if let Some(session) = &mut self.session {
                match manipulation.commit(session) {
                    Ok(true) => self.after_edit(),
                    Ok(false) => {}
                    Err(err) => self.report(err),
                }
            }
        }
        if let Some(gesture) = self.gesture.take() {
            let outcome = gesture.finish(&self.styles);
            self.handle_outcome(outcome);
        }
    }
}

// Windows
impl EditorApp {
    fn draw_text_popup(&mut self, ctx: &egui::Context) {
        let Some(session) = &self.session else { return };
        let Some(target) = self.text_edit.as_ref().and_then(|pending| pending.target(session)) else {
            return;
        };
        let Some(view) = self.canvas.page_rect_to_view(target.0, target.1) else { return };
        let anchor = self.canvas_origin + egui::vec2(view.x, view.y + view.height + 4.0);
        let width = view.width.max(220.0);
        let Some(pending) = &mut self.text_edit else { return };

        let mut done = None;
        egui::Area::new(egui::Id::new("text_edit_popup")).order(egui::Order::Foreground).fixed_pos(anchor).show(
            ctx,
            |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    let response =
                        ui.add(egui::TextEdit::multiline(pending.text_mut()).desired_width(width).desired_rows(3));
                    if ui.memory(|memory| memory.focused().is_none()) {
                        response.request_focus();
                    }
                    ui.horizontal(|ui| {
                        if ui.button("Done").clicked() {
                            done = Some(true);
                        }
                        if ui.button("Cancel").clicked() {
                            done = Some(false);
                        }
                    });
                });
            },
        );
        if let Some(keep) = done {
            self.finish_text_edit(keep);
        }
    }

    fn draw_dialog(&mut self, ctx: &egui::Context) {
        let Some(mut dialog) = self.dialog.take() else { return };
        match dialog.show(ctx, self.storage.as_ref()) {
            Some(DialogResponse::Apply) => {
                let current_page = self.current_page();
                let Some(session) = &mut self.session else { return };
                let context = DialogContext::from_session(session, current_page);
                match dialog.form.build(&context).and_then(|edit| {
                    let label = edit.label.clone();
                    session.apply_edit(edit).map(|()| label)
                }) {
                    Ok(label) => {
                        if dialog.form.remember(&mut self.settings) {
                            self.save_settings();
                        }
                        self.after_edit();
                        self.status = Some(label);
                    }
                    Err(err) => {
                        dialog.error = Some(err.to_string());
                        self.dialog = Some(dialog);
                    }
                }
            }
            Some(DialogResponse::Cancel) => {}
            None => self.dialog = Some(dialog),
        }
    }

    fn draw_preferences(&mut self, ctx: &egui::Context) {
        if !self.show_preferences {
            return;
        }
        let mut open = true;
        let mut changed = false;
        egui::Window::new("Preferences").collapsible(false).resizable(false).open(&mut open).show(ctx, |ui| {
            egui::Grid::new("preferences").num_columns(2).spacing([12.0, 8.0]).show(ui, |ui| {
                ui.label("Author name:");
                changed |= ui.text_edit_singleline(&mut self.settings.author_name).changed();
                ui.end_row();

                ui.label("Undo steps:");
                changed |= ui.add(egui::DragValue::new(&mut self.settings.history_depth).range(1..=500)).changed();
                ui.end_row();

                ui.label("Theme:");
                ui.horizontal(|ui| {
                    for theme in [ThemeMode::System, ThemeMode::Light, ThemeMode::Dark] {
                        if ui.radio_value(&mut self.settings.theme, theme, theme.label()).changed() {
                            ctx.set_theme(theme_preference(theme));
                            changed = true;
                        }
                    }
                });
                ui.end_row();
            });
            ui.add_space(8.0);
            if ui.button("Clear Recent Files").clicked() {
                self.settings.clear_recent();
                changed = true;
            }
        });

        if changed {
            self.settings = std::mem::take(&mut self.settings).normalized();
            if let Some(session) = &mut self.session {
                session.set_history_depth(self.settings.history_depth);
                if !self.settings.author_name.trim().is_empty() {
                    session.set_author(self.settings.author_name.clone());
                }
            }
            self.save_settings();
        }
        self.show_preferences = open;
    }

    fn draw_recovery_prompt(&mut self, ctx: &egui::Context) {
        if self.recovery.is_none() {
            return;
        }
        let mut choice = None;
        egui::Window::new("Recover Unsaved Changes")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Edits to this document were not saved last time.");
                ui.label("Recovering replaces the current pages and items and cannot be undone.");
                ui.add_space(12.0);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                    if ui.button("Recover").clicked() {
                        choice = Some(true);
                    }
                    if ui.button("Discard").clicked() {
                        choice = Some(false);
                    }
                    if ui.button("Later").clicked() {
                        self.recovery = None;
                    }
                });
            });

        match choice {
            Some(true) => {
                if let Some(sidecar) = self.recovery.take() {
                    self.recover(sidecar);
                }
            }
            Some(false) => {
                self.recovery = None;
                self.remove_sidecar();
            }
            None => {}
        }
    }

    fn draw_confirm(&mut self, ctx: &egui::Context) {
        let Some(action) = &self.confirm else { return };
        let name = self.session.as_ref().map(EditSession::display_name).unwrap_or_default();
        let message = format!("{name} has unsaved changes. Discard them before {}?", action.verb());

        let mut choice = None;
        egui::Window::new("Unsaved Changes")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                ui.add_space(12.0);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                    if ui.button("Discard").clicked() {
                        choice = Some(true);
                    }
                    if ui.button("Cancel").clicked() {
                        choice = Some(false);
                    }
                });
            });

        match choice {
            Some(true) => {
                if let Some(action) = self.confirm.take() {
                    self.discard(action);
                }
            }
            Some(false) => self.confirm = None,
            None => {}
        }
    }

    fn draw_busy(&mut self, ctx: &egui::Context) {
        let Some(kind) = self.worker.as_ref().and_then(Worker::running) else { return };
        let mut cancel = false;
        egui::Window::new("Working")
            .collapsible(false)
            .resizable(false)
            .title_bar(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("{}…", kind.label()));
                });
                ui.add_space(8.0);
                if ui.button("Cancel").clicked() {
                    cancel = true;
                }
            });
        if cancel {
            if let Some(worker) = &self.worker {
                worker.cancel();
            }
        }
    }

    fn draw_error_dialog(&mut self, ctx: &egui::Context) {
        let Some(error) = &self.error_dialog else {
            return;
        };

        let title = format!("{} {}", error.severity.icon(), error.title);
        let message = error.message.clone();

        let mut should_close = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&message);
                ui.add_space(12.0);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                    if ui.button("OK").clicked() {
                        should_close = true;
                    }
                });
            });

        if should_close {
            self.error_dialog = None;
        }
    }
}
