//! Painting overlay items over the page images
//!
//! Every annotation is drawn by one of a few routines picked by its kind:
//! filled or outlined boxes, strokes, text and images. Positions go through
//! [`Canvas::page_to_view`] so rotated pages and zoom need no special cases.

use eframe::egui;
use egui::epaint::{TextShape, Vertex};
use egui::{Color32, Pos2, Shape, Stroke, TextureId};
use pdf_editor_core::canvas::NOTE_SIZE;
use pdf_editor_core::{
    Annotation, AnnotationGeometry, AnnotationKind, Canvas, Color, ImagePayload, ManipulationHandle,
    MarkContent, PageCoordinate, PageRect, StandardFont, ToolGesture, ViewPoint, ViewRect,
};
use std::collections::HashMap;
use std::sync::Arc;

const SELECTION_BLUE: Color32 = Color32::from_rgb(0, 120, 215);

pub fn color32(color: Color) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

pub fn core_color(color: Color32) -> Color {
    Color::from_array(color.to_srgba_unmultiplied())
}

/// `color` with its alpha scaled by `opacity`
fn faded(color: Color, opacity: f32) -> Color32 {
    let alpha = (f32::from(color.a) * opacity.clamp(0.0, 1.0)).round() as u8;
    Color32::from_rgba_unmultiplied(color.r, color.g, color.b, alpha)
}

fn font_id(font: StandardFont, size: f32) -> egui::FontId {
    match font {
        StandardFont::Courier => egui::FontId::monospace(size),
        StandardFont::Helvetica | StandardFont::TimesRoman => egui::FontId::proportional(size),
    }
}

/// Textures for image payloads, keyed by the pixel buffer they were made from
#[derive(Default)]
pub struct ImageTextures {
    handles: HashMap<usize, (Arc<Vec<u8>>, egui::TextureHandle)>,
}

impl ImageTextures {
    pub fn clear(&mut self) {
        self.handles.clear();
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn texture(&mut self, ctx: &egui::Context, image: &ImagePayload) -> TextureId {
        // The stored Arc keeps the buffer alive, so its address stays unique
        let key = Arc::as_ptr(&image.rgba) as usize;
        self.handles
            .entry(key)
            .or_insert_with(|| {
                let pixels = egui::ColorImage::from_rgba_unmultiplied(
                    [image.width as usize, image.height as usize],
                    &image.rgba,
                );
                let name = format!("overlay_image_{key:x}");
                let handle = ctx.load_texture(name, pixels, egui::TextureOptions::LINEAR);
                (Arc::clone(&image.rgba), handle)
            })
            .1
            .id()
    }
}

/// Maps canvas geometry onto the screen for one frame
pub struct Overlay<'a> {
    pub painter: &'a egui::Painter,
    pub canvas: &'a Canvas,
    /// Screen position of the canvas origin
    pub origin: Pos2,
}

impl Overlay<'_> {
    pub fn screen_rect(&self, rect: ViewRect) -> egui::Rect {
        egui::Rect::from_min_size(
            self.origin + egui::vec2(rect.x, rect.y),
            egui::vec2(rect.width, rect.height),
        )
    }

    pub fn view_point(&self, pos: Pos2) -> ViewPoint {
        ViewPoint::new(pos.x - self.origin.x, pos.y - self.origin.y)
    }

    fn screen(&self, page: usize, point: PageCoordinate) -> Option<Pos2> {
        let view = self.canvas.page_to_view(page, point)?;
        Some(Pos2::new(self.origin.x + view.x, self.origin.y + view.y))
    }

    /// Corners of a page-space box rotated by `degrees`, on screen
    fn quad(&self, page: usize, rect: PageRect, degrees: f32) -> Option<[Pos2; 4]> {
        let center = rect.center();
        let [a, b, c, d] =
            rect.corners().map(|corner| self.screen(page, corner.rotated_about(&center, degrees)));
        Some([a?, b?, c?, d?])
    }

    /// Clockwise screen angle of text in an item rotated by `degrees`
    fn text_angle(&self, page_rotation: u16, degrees: f32) -> f32 {
        (degrees + f32::from(page_rotation)).to_radians()
    }

    pub fn annotation(
        &self,
        ctx: &egui::Context,
        textures: &mut ImageTextures,
        annotation: &Annotation,
        page_rotation: u16,
    ) {
        if !annotation.is_visible() {
            return;
        }
        let page = usize::from(annotation.page_index());
        let style = annotation.style();
        let opacity = style.opacity;
        let scale = self.canvas.scale();

        if let AnnotationGeometry::Freehand { points } = annotation.geometry() {
            let line: Vec<Pos2> = points.iter().filter_map(|p| self.screen(page, *p)).collect();
            let stroke = Stroke::new(style.stroke_width * scale, faded(style.stroke_color, opacity));
            self.painter.add(Shape::line(line, stroke));
            return;
        }

        let bounds = annotation.bounding_box();
        let Some(quad) = self.quad(page, bounds, style.rotation) else { return };
        let angle = self.text_angle(page_rotation, style.rotation);
        let outline = Stroke::new(style.stroke_width * scale, faded(style.stroke_color, opacity));
        let font = font_id(style.font, style.font_size * scale);
        let text_color = faded(style.stroke_color, opacity);

        match annotation.kind() {
            AnnotationKind::Highlight => {
                self.fill(quad, faded(style.fill_color.unwrap_or(style.stroke_color), opacity));
            }
            AnnotationKind::Rectangle => {
                if let Some(fill) = style.fill_color {
                    self.fill(quad, faded(fill, opacity));
                }
                self.outline(quad, outline);
            }
            AnnotationKind::Link { .. } => {
                if style.stroke_width > 0.0 {
                    self.outline(quad, outline);
                }
            }
            AnnotationKind::StickyNote { .. } => {
                self.fill(quad, faded(style.fill_color.unwrap_or(Color::NOTE_YELLOW), opacity));
                self.outline(quad, Stroke::new(1.0, faded(style.stroke_color, opacity)));
                let center = egui::Rect::from_points(&quad).center();
                self.painter.text(
                    center,
                    egui::Align2::CENTER_CENTER,
                    "✎",
                    egui::FontId::proportional(NOTE_SIZE * 0.6 * scale),
                    Color32::from_gray(60),
                );
            }
            AnnotationKind::FreeText { text } => {
                if let Some(fill) = style.fill_color {
                    self.fill(quad, faded(fill, opacity));
                }
                self.text(ctx, quad[0], text, font, text_color, angle);
            }
            AnnotationKind::PageText { text, .. } => {
                self.text(ctx, quad[0], text, font, text_color, angle);
            }
            AnnotationKind::TextEdit { replacement, .. } => {
                // Covers stay opaque
                self.fill(quad, color32(style.fill_color.unwrap_or(Color::WHITE)));
                self.text(ctx, quad[0], replacement, font, color32(style.stroke_color), angle);
            }
            AnnotationKind::Stamp { mark: MarkContent::Text(text) } => {
                self.outline(quad, outline);
                let center = egui::Rect::from_points(&quad).center();
                self.centered_text(ctx, center, text, font, text_color, angle);
            }
            AnnotationKind::Watermark { mark: MarkContent::Text(text) } => {
                let center = egui::Rect::from_points(&quad).center();
                self.centered_text(ctx, center, text, font, text_color, angle);
            }
            AnnotationKind::Freehand => {}
            AnnotationKind::Stamp { mark: MarkContent::Image(image) }
            | AnnotationKind::Watermark { mark: MarkContent::Image(image) }
            | AnnotationKind::Signature { image }
            | AnnotationKind::Image { image } => {
                let texture = textures.texture(ctx, image);
                self.image(texture, quad, faded(Color::WHITE, opacity));
            }
        }
    }

    fn fill(&self, quad: [Pos2; 4], color: Color32) {
        self.painter.add(Shape::convex_polygon(quad.to_vec(), color, Stroke::NONE));
    }

    fn outline(&self, quad: [Pos2; 4], stroke: Stroke) {
        self.painter.add(Shape::closed_line(quad.to_vec(), stroke));
    }

    fn image(&self, texture: TextureId, quad: [Pos2; 4], tint: Color32) {
        let uvs = [Pos2::new(0.0, 0.0), Pos2::new(1.0, 0.0), Pos2::new(1.0, 1.0), Pos2::new(0.0, 1.0)];
        let mut mesh = egui::Mesh::with_texture(texture);
        for (pos, uv) in quad.into_iter().zip(uvs) {
            mesh.vertices.push(Vertex { pos, uv, color: tint });
        }
        mesh.add_triangle(0, 1, 2);
        mesh.add_triangle(0, 2, 3);
        self.painter.add(Shape::mesh(mesh));
    }

    /// Text whose top-left corner sits at `anchor`, turned by `angle`
    fn text(
        &self,
        ctx: &egui::Context,
        anchor: Pos2,
        text: &str,
        font: egui::FontId,
        color: Color32,
        angle: f32,
    ) {
        let galley = ctx.fonts(|fonts| fonts.layout_no_wrap(text.to_owned(), font, color));
        self.painter.add(TextShape::new(anchor, galley, color).with_angle(angle));
    }

    /// Text centred on `center`, turned by `angle` around it
    fn centered_text(
        &self,
        ctx: &egui::Context,
        center: Pos2,
        text: &str,
        font: egui::FontId,
        color: Color32,
        angle: f32,
    ) {
        let galley = ctx.fonts(|fonts| fonts.layout_no_wrap(text.to_owned(), font, color));
        let half = galley.size() / 2.0;
        let (sin, cos) = angle.sin_cos();
        let offset = egui::vec2(half.x * cos - half.y * sin, half.x * sin + half.y * cos);
        self.painter.add(TextShape::new(center - offset, galley, color).with_angle(angle));
    }

    /// Outline and resize handles of the selected item
    pub fn selection(&self, annotation: &Annotation, handles: &[ManipulationHandle]) {
        let page = usize::from(annotation.page_index());
        let stroke = Stroke::new(1.0, SELECTION_BLUE);
        match annotation.geometry() {
            AnnotationGeometry::Rectangle { .. } => {
                if let Some(quad) = self.quad(page, annotation.bounding_box(), annotation.style().rotation) {
                    self.outline(quad, stroke);
                }
            }
            AnnotationGeometry::Freehand { .. } => {
                if let Some(quad) = self.quad(page, annotation.bounding_box(), 0.0) {
                    self.outline(quad, stroke);
                }
            }
        }
        for handle in handles.iter().filter(|h| h.handle_type != pdf_editor_core::HandleType::Move) {
            if let Some(center) = self.screen(page, handle.position) {
                let rect = egui::Rect::from_center_size(center, egui::vec2(8.0, 8.0));
                self.painter.rect_filled(rect, 1.0, Color32::WHITE);
                self.painter.rect_stroke(rect, 1.0, stroke, egui::StrokeKind::Inside);
            }
        }
    }

    /// Live preview of a drawing gesture
    pub fn gesture(&self, gesture: &ToolGesture, stroke_color: Color, stroke_width: f32) {
        let page = gesture.page_index();
        let scale = self.canvas.scale();
        let stroke = Stroke::new((stroke_width * scale).max(1.0), color32(stroke_color));
        if gesture.tool() == pdf_editor_core::Tool::Pen {
            let line: Vec<Pos2> = gesture.points().iter().filter_map(|p| self.screen(page, *p)).collect();
            self.painter.add(Shape::line(line, stroke));
        } else if let Some(quad) = gesture.drag_rect().and_then(|rect| self.quad(page, rect, 0.0)) {
            self.outline(quad, Stroke::new(1.0, SELECTION_BLUE));
        }
    }

    /// Dashed-looking outline for text blocks under the Edit Text tool
    pub fn text_block(&self, page: usize, rect: PageRect) {
        if let Some(quad) = self.quad(page, rect, 0.0) {
            self.outline(quad, Stroke::new(1.0, SELECTION_BLUE.gamma_multiply(0.6)));
        }
    }

    /// Tinted band over one line of selected page text
    pub fn text_selection(&self, page: usize, rect: PageRect) {
        if let Some(quad) = self.quad(page, rect, 0.0) {
            self.fill(quad, SELECTION_BLUE.gamma_multiply(0.25));
        }
    }

    /// Screen rectangle covering a page-space box, for popups
    pub fn item_rect(&self, page: usize, rect: PageRect) -> Option<egui::Rect> {
        let view = self.canvas.page_rect_to_view(page, rect)?;
        Some(self.screen_rect(view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colours_round_trip_through_egui() {
        let color = Color::new(10, 200, 30, 255);
        assert_eq!(core_color(color32(color)), color);
    }

    #[test]
    fn opacity_scales_alpha() {
        let faded = faded(Color::new(255, 0, 0, 200), 0.5);
        assert_eq!(faded.to_srgba_unmultiplied()[3], 100);
    }

    #[test]
    fn shared_payloads_share_a_texture() {
        let ctx = egui::Context::default();
        let mut textures = ImageTextures::default();
        let image = ImagePayload::from_rgba_image(image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255])));
        let copy = image.clone();

        let first = textures.texture(&ctx, &image);
        let second = textures.texture(&ctx, &copy);

        assert_eq!(first, second);
        assert_eq!(textures.len(), 1);
    }
}
