//! Dialog windows
//!
//! Forms only collect input. Turning it into annotations is done by the
//! builders in `pdf_editor_core::dialogs`, so everything here is about egui
//! widgets, image picking and the asset folders.

use crate::overlay::{color32, core_color};
use doc_model::Settings;
use eframe::egui;
use pdf_editor_core::dialogs::header_footer::{self, HeaderFooterConfig};
use pdf_editor_core::dialogs::link::{self, LinkConfig, LinkDestination};
use pdf_editor_core::dialogs::page_number::{self, NumberFormat, PageNumberConfig, VerticalPosition};
use pdf_editor_core::dialogs::signature::{self, SignatureConfig};
use pdf_editor_core::dialogs::stamp::{self, StampConfig, StampContent, STAMP_PRESETS};
use pdf_editor_core::dialogs::watermark::{self, WatermarkConfig, WatermarkContent, WatermarkPosition};
use pdf_editor_core::dialogs::HorizontalAlign;
use pdf_editor_core::tools::{note_at, text_box_at};
use pdf_editor_core::{
    AnnotationStyle, Color, DialogContext, EditDescription, EditorError, EditorResult, ImagePayload,
    PageCoordinate, PageRange, PageRect,
};
use std::path::{Path, PathBuf};
use storage::{AssetKind, Storage};

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "webp"];

/// Dialogs reachable from the Insert menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Watermark,
    Stamp,
    Signature,
    PageNumbers,
    HeaderFooter,
}

impl DialogKind {
    pub const ALL: [DialogKind; 5] = [
        DialogKind::Watermark,
        DialogKind::Stamp,
        DialogKind::Signature,
        DialogKind::PageNumbers,
        DialogKind::HeaderFooter,
    ];

    pub fn menu_label(self) -> &'static str {
        match self {
            DialogKind::Watermark => "Watermark…",
            DialogKind::Stamp => "Stamp…",
            DialogKind::Signature => "Signature…",
            DialogKind::PageNumbers => "Page Numbers…",
            DialogKind::HeaderFooter => "Header and Footer…",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogResponse {
    Apply,
    Cancel,
}

/// An open dialog and the last error its input produced
pub struct ActiveDialog {
    pub form: DialogForm,
    pub error: Option<String>,
}

impl ActiveDialog {
    pub fn new(form: DialogForm) -> Self {
        Self { form, error: None }
    }

    /// Dialog for an Insert menu entry
    pub fn for_kind(kind: DialogKind, settings: &Settings, storage: Option<&Storage>) -> Self {
        let form = match kind {
            DialogKind::Watermark => DialogForm::Watermark(WatermarkForm::default()),
            DialogKind::Stamp => DialogForm::Stamp(StampForm::new(settings, storage)),
            DialogKind::Signature => DialogForm::Signature(SignatureForm::new(settings, storage)),
            DialogKind::PageNumbers => DialogForm::PageNumbers(PageNumberForm::default()),
            DialogKind::HeaderFooter => DialogForm::HeaderFooter(HeaderFooterForm::default()),
        };
        Self::new(form)
    }

    pub fn show(&mut self, ctx: &egui::Context, storage: Option<&Storage>) -> Option<DialogResponse> {
        let mut response = None;
        let mut open = true;
        egui::Window::new(self.form.title())
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                if let Err(err) = self.form.ui(ui, storage) {
                    self.error = Some(err);
                }

                if let Some(error) = &self.error {
                    ui.add_space(8.0);
                    ui.colored_label(ui.visuals().error_fg_color, error.as_str());
                }

                ui.add_space(12.0);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                    if ui.button(self.form.apply_label()).clicked() {
                        response = Some(DialogResponse::Apply);
                    }
                    if ui.button("Cancel").clicked() {
                        response = Some(DialogResponse::Cancel);
                    }
                });
            });
        if !open {
            response = Some(DialogResponse::Cancel);
        }
        response
    }
}

pub enum DialogForm {
    Watermark(WatermarkForm),
    Stamp(StampForm),
    Signature(SignatureForm),
    PageNumbers(PageNumberForm),
    HeaderFooter(HeaderFooterForm),
    Link(LinkForm),
    Text(TextPromptForm),
}

impl DialogForm {
    pub fn title(&self) -> &'static str {
        match self {
            DialogForm::Watermark(_) => watermark::LABEL,
            DialogForm::Stamp(_) => stamp::LABEL,
            DialogForm::Signature(_) => signature::LABEL,
            DialogForm::PageNumbers(_) => page_number::LABEL,
            DialogForm::HeaderFooter(_) => header_footer::LABEL,
            DialogForm::Link(_) => link::LABEL,
            DialogForm::Text(form) => form.label(),
        }
    }

    fn apply_label(&self) -> &'static str {
        match self {
            DialogForm::Text(_) | DialogForm::Link(_) => "OK",
            _ => "Apply",
        }
    }

    /// Run the core builder on the collected input
    pub fn build(&self, ctx: &DialogContext) -> EditorResult<EditDescription> {
        match self {
            DialogForm::Watermark(form) => watermark::build(ctx, &form.config()?),
            DialogForm::Stamp(form) => stamp::build(ctx, &form.config()?),
            DialogForm::Signature(form) => signature::build(ctx, &form.config()),
            DialogForm::PageNumbers(form) => page_number::build(ctx, &form.config()?),
            DialogForm::HeaderFooter(form) => header_footer::build(ctx, &form.config()?),
            DialogForm::Link(form) => link::build(ctx, &form.config()),
            DialogForm::Text(form) => form.build(),
        }
    }

    /// Store the picked stamp or signature as the next default
    pub fn remember(&self, settings: &mut Settings) -> bool {
        match self {
            DialogForm::Stamp(form) => {
                let before = (settings.default_stamp_preset, settings.default_stamp_image.clone());
                match form.choice {
                    StampChoice::Preset => {
                        settings.default_stamp_preset = form.preset;
                        settings.default_stamp_image = None;
                    }
                    StampChoice::Image => settings.default_stamp_image = form.image.selected.clone(),
                    StampChoice::Custom => {}
                }
                before != (settings.default_stamp_preset, settings.default_stamp_image.clone())
            }
            DialogForm::Signature(form) => {
                let selected = form.image.selected.clone();
                if selected.is_some() && selected != settings.default_signature {
                    settings.default_signature = selected;
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    fn ui(&mut self, ui: &mut egui::Ui, storage: Option<&Storage>) -> Result<(), String> {
        match self {
            DialogForm::Watermark(form) => form.ui(ui, storage),
            DialogForm::Stamp(form) => form.ui(ui, storage),
            DialogForm::Signature(form) => form.ui(ui, storage),
            DialogForm::PageNumbers(form) => {
                form.ui(ui);
                Ok(())
            }
            DialogForm::HeaderFooter(form) => {
                form.ui(ui);
                Ok(())
            }
            DialogForm::Link(form) => {
                form.ui(ui);
                Ok(())
            }
            DialogForm::Text(form) => {
                form.ui(ui);
                Ok(())
            }
        }
    }
}

fn page_range_row(ui: &mut egui::Ui, text: &mut String) {
    ui.horizontal(|ui| {
        ui.label("Pages:");
        ui.add(egui::TextEdit::singleline(text).hint_text("all, 2-5 or 1,3,7").desired_width(140.0));
    });
}

fn file_label(path: &Path) -> String {
    path.file_name().map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

/// An image chosen from an asset folder or straight from disk
#[derive(Default)]
pub struct ImagePicker {
    kind: Option<AssetKind>,
    assets: Vec<PathBuf>,
    pub selected: Option<PathBuf>,
    pub image: Option<ImagePayload>,
}

impl ImagePicker {
    fn for_assets(kind: AssetKind, storage: Option<&Storage>, preferred: Option<&Path>) -> Self {
        let mut picker = Self { kind: Some(kind), ..Self::default() };
        picker.refresh(storage);
        let initial = preferred
            .filter(|path| picker.assets.iter().any(|asset| asset == path))
            .map(Path::to_path_buf)
            .or_else(|| picker.assets.first().cloned());
        if let Some(path) = initial {
            if let Err(err) = picker.select(path) {
                tracing::warn!(error = %err, "saved default image no longer loads");
            }
        }
        picker
    }

    fn refresh(&mut self, storage: Option<&Storage>) {
        let (Some(kind), Some(storage)) = (self.kind, storage) else { return };
        match storage.list_assets(kind) {
            Ok(assets) => self.assets = assets,
            Err(err) => tracing::warn!(?kind, error = %err, "could not list assets"),
        }
    }

    pub fn select(&mut self, path: PathBuf) -> EditorResult<()> {
        let image = ImagePayload::from_path(&path)?;
        self.image = Some(image);
        self.selected = Some(path);
        Ok(())
    }

    /// Image list plus Import and Delete buttons
    fn ui(&mut self, ui: &mut egui::Ui, storage: Option<&Storage>) -> Result<(), String> {
        let mut result = Ok(());

        if self.kind.is_some() && !self.assets.is_empty() {
            let current = self.selected.as_deref().map_or_else(|| "None".to_owned(), file_label);
            let mut picked = None;
            egui::ComboBox::from_id_salt("asset_picker").selected_text(current).width(220.0).show_ui(ui, |ui| {
                for asset in &self.assets {
                    if ui.selectable_label(self.selected.as_ref() == Some(asset), file_label(asset)).clicked() {
                        picked = Some(asset.clone());
                    }
                }
            });
            if let Some(path) = picked {
                result = self.select(path).map_err(|err| err.to_string());
            }
        } else if let Some(path) = &self.selected {
            ui.label(file_label(path));
        }

        ui.horizontal(|ui| {
            let label = if self.kind.is_some() { "Import…" } else { "Choose Image…" };
            if ui.button(label).clicked() {
                if let Some(path) = rfd::FileDialog::new().add_filter("Images", &IMAGE_EXTENSIONS).pick_file() {
                    result = self.import(&path, storage);
                }
            }
            if let (Some(kind), Some(storage), Some(selected)) = (self.kind, storage, self.selected.clone()) {
                if ui.button("Delete").clicked() {
                    result = match storage.delete_asset(kind, &selected) {
                        Ok(()) => {
                            self.selected = None;
                            self.image = None;
                            self.refresh(Some(storage));
                            Ok(())
                        }
                        Err(err) => Err(err.to_string()),
                    };
                }
            }
        });

        if let Some(image) = &self.image {
            ui.weak(format!("{} × {} px", image.width, image.height));
        }
        result
    }

    /// Copy into the asset folder when there is one, then select
    fn import(&mut self, source: &Path, storage: Option<&Storage>) -> Result<(), String> {
        let path = match (self.kind, storage) {
            (Some(kind), Some(storage)) => {
                let imported = storage.import_asset(kind, source).map_err(|err| err.to_string())?;
                self.refresh(Some(storage));
                imported
            }
            _ => source.to_path_buf(),
        };
        self.select(path).map_err(|err| err.to_string())
    }
}

pub struct WatermarkForm {
    pub use_image: bool,
    pub text: String,
    pub font_size: f32,
    pub color: egui::Color32,
    pub image: ImagePicker,
    pub scale_percent: u32,
    pub opacity_percent: u32,
    pub rotation: i32,
    pub position: WatermarkPosition,
    pub pages: String,
}

impl Default for WatermarkForm {
    fn default() -> Self {
        let defaults = WatermarkConfig::default();
        let (text, font_size, color) = match defaults.content {
            WatermarkContent::Text { text, font_size, color } => (text, font_size, color),
            WatermarkContent::Image { .. } => (String::new(), 60.0, Color::grey(128)),
        };
        Self {
            use_image: false,
            text,
            font_size,
            color: color32(color),
            image: ImagePicker::default(),
            scale_percent: 100,
            opacity_percent: defaults.opacity_percent,
            rotation: defaults.rotation,
            position: defaults.position,
            pages: "all".to_owned(),
        }
    }
}

impl WatermarkForm {
    pub fn config(&self) -> EditorResult<WatermarkConfig> {
        let content = if self.use_image {
            let image = self.image.image.clone().ok_or_else(|| EditorError::invalid("no image chosen"))?;
            WatermarkContent::Image { image, scale_percent: self.scale_percent }
        } else {
            WatermarkContent::Text {
                text: self.text.clone(),
                font_size: self.font_size,
                color: core_color(self.color),
            }
        };
        Ok(WatermarkConfig {
            content,
            opacity_percent: self.opacity_percent,
            rotation: self.rotation,
            position: self.position,
            pages: PageRange::parse(&self.pages)?,
        })
    }

    fn ui(&mut self, ui: &mut egui::Ui, storage: Option<&Storage>) -> Result<(), String> {
        let mut result = Ok(());
        ui.horizontal(|ui| {
            ui.radio_value(&mut self.use_image, false, "Text");
            ui.radio_value(&mut self.use_image, true, "Image");
        });
        ui.separator();

        if self.use_image {
            result = self.image.ui(ui, storage);
            ui.add(egui::Slider::new(&mut self.scale_percent, 10..=300).text("Scale %"));
        } else {
            ui.horizontal(|ui| {
                ui.label("Text:");
                ui.text_edit_singleline(&mut self.text);
            });
            ui.add(egui::Slider::new(&mut self.font_size, 8.0..=200.0).text("Font size"));
            ui.horizontal(|ui| {
                ui.label("Colour:");
                ui.color_edit_button_srgba(&mut self.color);
            });
            ui.add(egui::Slider::new(&mut self.rotation, -90..=90).text("Rotation°"));
        }

        ui.add(egui::Slider::new(&mut self.opacity_percent, 5..=100).text("Opacity %"));
        egui::ComboBox::from_label("Position").selected_text(self.position.label()).show_ui(ui, |ui| {
            for position in WatermarkPosition::ALL {
                ui.selectable_value(&mut self.position, position, position.label());
            }
        });
        page_range_row(ui, &mut self.pages);
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampChoice {
    Preset,
    Custom,
    Image,
}

pub struct StampForm {
    pub choice: StampChoice,
    pub preset: usize,
    pub custom_text: String,
    pub custom_color: egui::Color32,
    pub image: ImagePicker,
    pub scale_percent: u32,
    pub font_size: f32,
    pub rotation: i32,
}

impl StampForm {
    pub fn new(settings: &Settings, storage: Option<&Storage>) -> Self {
        let defaults = StampConfig::default();
        let image = ImagePicker::for_assets(AssetKind::Stamp, storage, settings.default_stamp_image.as_deref());
        let choice = if settings.default_stamp_image.is_some() && image.image.is_some() {
            StampChoice::Image
        } else {
            StampChoice::Preset
        };
        Self {
            choice,
            preset: settings.default_stamp_preset.min(STAMP_PRESETS.len() - 1),
            custom_text: String::new(),
            custom_color: egui::Color32::from_rgb(204, 0, 0),
            image,
            scale_percent: 100,
            font_size: defaults.font_size,
            rotation: defaults.rotation,
        }
    }

    pub fn config(&self) -> EditorResult<StampConfig> {
        let content = match self.choice {
            StampChoice::Preset => StampContent::Preset(self.preset),
            StampChoice::Custom => {
                StampContent::Custom { text: self.custom_text.clone(), color: core_color(self.custom_color) }
            }
            StampChoice::Image => {
                let image = self.image.image.clone().ok_or_else(|| EditorError::invalid("no stamp image chosen"))?;
                StampContent::Image { image, scale_percent: self.scale_percent }
            }
        };
        Ok(StampConfig { content, font_size: self.font_size, rotation: self.rotation })
    }

    fn ui(&mut self, ui: &mut egui::Ui, storage: Option<&Storage>) -> Result<(), String> {
        let mut result = Ok(());
        ui.horizontal(|ui| {
            ui.radio_value(&mut self.choice, StampChoice::Preset, "Preset");
            ui.radio_value(&mut self.choice, StampChoice::Custom, "Custom");
            ui.radio_value(&mut self.choice, StampChoice::Image, "Image");
        });
        ui.separator();

        match self.choice {
            StampChoice::Preset => {
                egui::Grid::new("stamp_presets").num_columns(2).spacing([6.0, 6.0]).show(ui, |ui| {
                    for (index, preset) in STAMP_PRESETS.iter().enumerate() {
                        let text = egui::RichText::new(preset.text).strong().color(color32(preset.color));
                        if ui.selectable_label(self.preset == index, text).clicked() {
                            self.preset = index;
                        }
                        if index % 2 == 1 {
                            ui.end_row();
                        }
                    }
                });
            }
            StampChoice::Custom => {
                ui.horizontal(|ui| {
                    ui.label("Text:");
                    ui.text_edit_singleline(&mut self.custom_text);
                    ui.color_edit_button_srgba(&mut self.custom_color);
                });
            }
            StampChoice::Image => {
                result = self.image.ui(ui, storage);
                ui.add(egui::Slider::new(&mut self.scale_percent, 10..=500).text("Scale %"));
            }
        }

        if self.choice != StampChoice::Image {
            ui.add(egui::Slider::new(&mut self.font_size, 20.0..=120.0).text("Font size"));
            ui.add(egui::Slider::new(&mut self.rotation, -90..=90).text("Rotation°"));
        }
        result
    }
}

pub struct SignatureForm {
    pub draw: bool,
    pub image: ImagePicker,
    pub pad: SignaturePad,
    pub scale_percent: u32,
}

impl SignatureForm {
    pub fn new(settings: &Settings, storage: Option<&Storage>) -> Self {
        let image = ImagePicker::for_assets(AssetKind::Signature, storage, settings.default_signature.as_deref());
        Self { draw: image.image.is_none(), image, pad: SignaturePad::default(), scale_percent: 100 }
    }

    pub fn config(&self) -> SignatureConfig {
        SignatureConfig { image: self.image.image.clone(), scale_percent: self.scale_percent }
    }

    fn ui(&mut self, ui: &mut egui::Ui, storage: Option<&Storage>) -> Result<(), String> {
        let mut result = Ok(());
        ui.horizontal(|ui| {
            ui.radio_value(&mut self.draw, false, "Saved");
            ui.radio_value(&mut self.draw, true, "Draw");
        });
        ui.separator();

        if self.draw {
            self.pad.ui(ui);
            ui.horizontal(|ui| {
                if ui.button("Clear").clicked() {
                    self.pad.clear();
                }
                if ui.add_enabled(!self.pad.is_empty(), egui::Button::new("Use Drawing")).clicked() {
                    result = self.save_drawing(storage);
                }
            });
        } else {
            result = self.image.ui(ui, storage);
        }
        ui.add(egui::Slider::new(&mut self.scale_percent, 10..=500).text("Scale %"));
        result
    }

    /// Keep the drawing in the signature folder and select it
    fn save_drawing(&mut self, storage: Option<&Storage>) -> Result<(), String> {
        let image = self.pad.to_image().ok_or_else(|| "nothing drawn".to_owned())?;
        match storage {
            Some(storage) => {
                let name = format!("signature-{}", chrono::Local::now().format("%Y%m%d-%H%M%S"));
                let path = storage.save_drawn_signature(&image, &name).map_err(|err| err.to_string())?;
                self.image.refresh(Some(storage));
                self.image.select(path).map_err(|err| err.to_string())?;
            }
            None => {
                self.image.image = Some(ImagePayload::from_rgba_image(image));
                self.image.selected = None;
            }
        }
        self.draw = false;
        self.pad.clear();
        Ok(())
    }
}

/// Freehand signature strokes in pad coordinates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignaturePad {
    strokes: Vec<Vec<[f32; 2]>>,
}

impl SignaturePad {
    pub const SIZE: [f32; 2] = [360.0, 140.0];
    const PIXELS_PER_POINT: f32 = 2.0;
    const LINE_WIDTH: f32 = 2.5;

    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(|stroke| stroke.len() < 2)
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    pub fn begin_stroke(&mut self, at: [f32; 2]) {
        self.strokes.push(vec![at]);
    }

    pub fn extend_stroke(&mut self, at: [f32; 2]) {
        match self.strokes.last_mut() {
            Some(stroke) if stroke.last() != Some(&at) => stroke.push(at),
            Some(_) => {}
            None => self.begin_stroke(at),
        }
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(egui::Vec2::from(Self::SIZE), egui::Sense::drag());
        let rect = response.rect;
        painter.rect_filled(rect, 4.0, egui::Color32::WHITE);
        painter.rect_stroke(rect, 4.0, ui.visuals().widgets.inactive.bg_stroke, egui::StrokeKind::Inside);

        if let Some(pos) = response.interact_pointer_pos() {
            let local = [(pos.x - rect.min.x).clamp(0.0, Self::SIZE[0]), (pos.y - rect.min.y).clamp(0.0, Self::SIZE[1])];
            if response.drag_started() {
                self.begin_stroke(local);
            } else if response.dragged() {
                self.extend_stroke(local);
            }
        }

        let stroke = egui::Stroke::new(Self::LINE_WIDTH, egui::Color32::BLACK);
        for points in &self.strokes {
            let line: Vec<egui::Pos2> = points.iter().map(|[x, y]| rect.min + egui::vec2(*x, *y)).collect();
            painter.add(egui::Shape::line(line, stroke));
        }
    }

    /// Black strokes on transparency at twice the pad size
    pub fn to_image(&self) -> Option<image::RgbaImage> {
        if self.is_empty() {
            return None;
        }
        let scale = Self::PIXELS_PER_POINT;
        let (width, height) = ((Self::SIZE[0] * scale) as u32, (Self::SIZE[1] * scale) as u32);
        let mut image = image::RgbaImage::new(width, height);
        let radius = Self::LINE_WIDTH * scale / 2.0;

        for stroke in &self.strokes {
            for segment in stroke.windows(2) {
                let a = [segment[0][0] * scale, segment[0][1] * scale];
                let b = [segment[1][0] * scale, segment[1][1] * scale];
                let min_x = (a[0].min(b[0]) - radius).floor().max(0.0) as u32;
                let max_x = ((a[0].max(b[0]) + radius).ceil() as u32).min(width - 1);
                let min_y = (a[1].min(b[1]) - radius).floor().max(0.0) as u32;
                let max_y = ((a[1].max(b[1]) + radius).ceil() as u32).min(height - 1);
                for y in min_y..=max_y {
                    for x in min_x..=max_x {
                        let p = [x as f32 + 0.5, y as f32 + 0.5];
                        if segment_distance(p, a, b) <= radius {
                            image.put_pixel(x, y, image::Rgba([0, 0, 0, 255]));
                        }
                    }
                }
            }
        }
        Some(image)
    }
}

fn segment_distance(p: [f32; 2], a: [f32; 2], b: [f32; 2]) -> f32 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 { 0.0 } else { (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len_sq).clamp(0.0, 1.0) };
    let (cx, cy) = (a[0] + t * dx, a[1] + t * dy);
    ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt()
}

pub struct PageNumberForm {
    pub config: PageNumberConfig,
    pub pages: String,
}

impl Default for PageNumberForm {
    fn default() -> Self {
        Self { config: PageNumberConfig::default(), pages: "all".to_owned() }
    }
}

impl PageNumberForm {
    pub fn config(&self) -> EditorResult<PageNumberConfig> {
        Ok(PageNumberConfig { pages: PageRange::parse(&self.pages)?, ..self.config.clone() })
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let config = &mut self.config;
        egui::ComboBox::from_label("Format").selected_text(config.format.pattern()).show_ui(ui, |ui| {
            for format in NumberFormat::ALL {
                ui.selectable_value(&mut config.format, format, format.pattern());
            }
        });
        ui.horizontal(|ui| {
            ui.label("Start at:");
            ui.add(egui::DragValue::new(&mut config.start).range(1..=9999));
        });
        ui.add(egui::Slider::new(&mut config.font_size, 6.0..=36.0).text("Font size"));
        ui.horizontal(|ui| {
            ui.radio_value(&mut config.vertical, VerticalPosition::Top, "Top");
            ui.radio_value(&mut config.vertical, VerticalPosition::Bottom, "Bottom");
            ui.separator();
            for align in HorizontalAlign::ALL {
                ui.radio_value(&mut config.horizontal, align, align.label());
            }
        });
        ui.add(egui::Slider::new(&mut config.margin, 10.0..=100.0).text("Margin"));
        page_range_row(ui, &mut self.pages);
        ui.checkbox(&mut self.config.skip_first, "Skip first page");
    }
}

pub struct HeaderFooterForm {
    pub config: HeaderFooterConfig,
    pub pages: String,
}

impl Default for HeaderFooterForm {
    fn default() -> Self {
        Self { config: HeaderFooterConfig::default(), pages: "all".to_owned() }
    }
}

impl HeaderFooterForm {
    pub fn config(&self) -> EditorResult<HeaderFooterConfig> {
        Ok(HeaderFooterConfig { pages: PageRange::parse(&self.pages)?, ..self.config.clone() })
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let config = &mut self.config;
        ui.weak("Variables: {page} {total} {date}");
        egui::Grid::new("header_footer").num_columns(4).show(ui, |ui| {
            ui.label("");
            for align in HorizontalAlign::ALL {
                ui.label(align.label());
            }
            ui.end_row();

            for (name, band) in [("Header", &mut config.header), ("Footer", &mut config.footer)] {
                ui.label(name);
                for slot in [&mut band.left, &mut band.center, &mut band.right] {
                    ui.add(egui::TextEdit::singleline(slot).desired_width(120.0));
                }
                ui.end_row();
            }
        });
        ui.add(egui::Slider::new(&mut config.font_size, 6.0..=24.0).text("Font size"));
        ui.add(egui::Slider::new(&mut config.margin, 10.0..=80.0).text("Margin"));
        page_range_row(ui, &mut self.pages);
        ui.checkbox(&mut self.config.skip_first, "Skip first page");
    }
}

pub struct LinkForm {
    pub page: usize,
    pub rect: PageRect,
    pub page_count: usize,
    pub to_page: bool,
    pub uri: String,
    pub target_page: usize,
    pub border_color: egui::Color32,
}

impl LinkForm {
    pub fn new(page: usize, rect: PageRect, page_count: usize) -> Self {
        let defaults = LinkConfig::new(page, rect);
        Self {
            page,
            rect,
            page_count,
            to_page: false,
            uri: String::new(),
            target_page: 1,
            border_color: color32(defaults.border_color),
        }
    }

    pub fn config(&self) -> LinkConfig {
        let destination = if self.to_page {
            LinkDestination::Page(self.target_page)
        } else {
            LinkDestination::Uri(self.uri.clone())
        };
        LinkConfig { destination, border_color: core_color(self.border_color), ..LinkConfig::new(self.page, self.rect) }
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.radio_value(&mut self.to_page, false, "Web address");
            ui.radio_value(&mut self.to_page, true, "Page in this document");
        });
        if self.to_page {
            ui.add(egui::DragValue::new(&mut self.target_page).range(1..=self.page_count.max(1)).prefix("Page "));
        } else {
            ui.add(egui::TextEdit::singleline(&mut self.uri).hint_text("https://example.com").desired_width(260.0));
        }
        ui.horizontal(|ui| {
            ui.label("Border:");
            ui.color_edit_button_srgba(&mut self.border_color);
        });
    }
}

/// Text for a sticky note or a free text box
pub struct TextPromptForm {
    pub page_index: usize,
    pub at: PageCoordinate,
    /// Dragged box for free text
    pub area: Option<PageRect>,
    pub note: bool,
    pub text: String,
    pub style: AnnotationStyle,
}

impl TextPromptForm {
    pub fn note(page_index: usize, at: PageCoordinate, style: AnnotationStyle) -> Self {
        Self { page_index, at, area: None, note: true, text: String::new(), style }
    }

    pub fn text_box(page_index: usize, at: PageCoordinate, area: Option<PageRect>, style: AnnotationStyle) -> Self {
        Self { page_index, at, area, note: false, text: String::new(), style }
    }

    fn label(&self) -> &'static str {
        if self.note {
            "Add Note"
        } else {
            "Add Text"
        }
    }

    pub fn build(&self) -> EditorResult<EditDescription> {
        let annotation = if self.note {
            note_at(self.page_index, self.at, &self.text, &self.style)?
        } else {
            text_box_at(self.page_index, self.at, self.area, &self.text, &self.style)?
        };
        Ok(EditDescription::adding(self.label(), vec![annotation]))
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        let response = ui.add(egui::TextEdit::multiline(&mut self.text).desired_rows(4).desired_width(280.0));
        if self.text.is_empty() {
            response.request_focus();
        }
        if !self.note {
            ui.add(egui::Slider::new(&mut self.style.font_size, 6.0..=72.0).text("Font size"));
        }
    }
}
