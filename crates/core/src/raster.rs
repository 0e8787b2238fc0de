//! Page export to PNG
//!
//! Pages are rendered from the exported PDF so the page order and rotation
//! match what a save would write. When the engine does not draw annotation
//! appearances itself, overlay items are composited on top: fills, outlines,
//! strokes, images and link boxes. Text is left to the engine.

use crate::annotation::{Annotation, AnnotationGeometry, AnnotationKind, Color, ImagePayload, PageCoordinate};
use crate::cancel::CancellationToken;
use crate::error::{EditorError, EditorResult};
use crate::export::{write_atomically, ExportSnapshot};
use crate::pages::PageEntry;
use crate::session::EditSession;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba};
use pdf_engine::{OpenSource, PdfEngine, RenderRequest, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// File name of the exported image for display index `page_index`
pub fn page_image_name(page_index: usize) -> String {
    format!("page-{}.png", page_index + 1)
}

/// Render every page into `dir` as `page-N.png`
///
/// `scale` is pixels per point. On failure or cancellation the images
/// written so far are removed again.
pub fn export_page_images(
    session: &EditSession,
    engine: &mut dyn PdfEngine,
    dir: &Path,
    scale: f32,
    cancel: &CancellationToken,
) -> EditorResult<Vec<PathBuf>> {
    export_snapshot_images(&session.snapshot(), engine, dir, scale, cancel)
}

/// [`export_page_images`] for a snapshot taken earlier, e.g. on a worker thread
pub fn export_snapshot_images(
    snapshot: &ExportSnapshot,
    engine: &mut dyn PdfEngine,
    dir: &Path,
    scale: f32,
    cancel: &CancellationToken,
) -> EditorResult<Vec<PathBuf>> {
    if !(scale > 0.0 && scale.is_finite()) {
        return Err(EditorError::invalid(format!("image scale {scale} must be positive")));
    }
    let bytes = snapshot.to_bytes(cancel)?;
    let handle = engine.open(OpenSource::Bytes(bytes))?;

    let mut written = Vec::new();
    let result: EditorResult<()> = (|| {
        for (index, entry) in snapshot.state.pages.iter().enumerate() {
            cancel.check()?;
            let request = RenderRequest { page_index: index as u32, scale, rotation: 0 };
            let mut image = engine.render_page(handle, request)?;
            if !engine.renders_annotations() {
                composite_page(&mut image, entry, scale, &snapshot.state.annotations.get_page_annotations(index as u16));
            }

            let path = dir.join(page_image_name(index));
            write_atomically(&path, &encode_png(&image)?, cancel)?;
            written.push(path);
        }
        Ok(())
    })();

    if let Err(err) = engine.close(handle) {
        tracing::warn!(error = %err, "failed to close render handle");
    }
    match result {
        Ok(()) => {
            tracing::info!(dir = %dir.display(), pages = written.len(), "exported page images");
            Ok(written)
        }
        Err(err) => {
            for path in &written {
                let _ = std::fs::remove_file(path);
            }
            Err(err)
        }
    }
}

fn encode_png(image: &RgbaImage) -> EditorResult<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|err| EditorError::Serialize(err.to_string()))?;
    Ok(bytes.into_inner())
}

/// Draw `annotations` over a rendered page, bottom layer first
pub fn composite_page(image: &mut RgbaImage, entry: &PageEntry, scale: f32, annotations: &[&Annotation]) {
    let mut painter = Painter { image, entry, scale };
    for annotation in annotations.iter().filter(|a| a.is_visible()) {
        painter.annotation(annotation);
    }
}

struct Painter<'a> {
    image: &'a mut RgbaImage,
    entry: &'a PageEntry,
    scale: f32,
}

impl Painter<'_> {
    fn annotation(&mut self, annotation: &Annotation) {
        let style = annotation.style();
        let opacity = style.opacity.clamp(0.0, 1.0);

        if let AnnotationGeometry::Freehand { points } = annotation.geometry() {
            self.stroke(points, false, style.stroke_color, style.stroke_width, opacity);
            return;
        }

        let bounds = annotation.bounding_box();
        let center = bounds.center();
        let corners: Vec<PageCoordinate> =
            bounds.corners().iter().map(|c| c.rotated_about(&center, style.rotation)).collect();

        match annotation.kind() {
            AnnotationKind::Highlight => {
                let color = style.fill_color.unwrap_or(style.stroke_color);
                self.fill(&corners, color, opacity);
            }
            AnnotationKind::StickyNote { .. } => {
                self.fill(&corners, style.fill_color.unwrap_or(Color::NOTE_YELLOW), opacity);
                self.stroke(&corners, true, style.stroke_color, 1.0, opacity);
            }
            AnnotationKind::Rectangle | AnnotationKind::Link { .. } => {
                if let Some(fill) = style.fill_color {
                    self.fill(&corners, fill, opacity);
                }
                self.stroke(&corners, true, style.stroke_color, style.stroke_width, opacity);
            }
            AnnotationKind::Stamp { .. } if annotation.kind().image().is_none() => {
                self.stroke(&corners, true, style.stroke_color, style.stroke_width, opacity);
            }
            kind => {
                if let Some(image) = kind.image() {
                    self.image(image, &corners, opacity);
                } else if let Some(fill) = style.fill_color {
                    self.fill(&corners, fill, opacity);
                }
            }
        }
    }

    fn to_pixel(&self, point: &PageCoordinate) -> (f32, f32) {
        let display = self.entry.page_to_display(*point);
        (display.x * self.scale, display.y * self.scale)
    }

    fn blend(&mut self, x: i64, y: i64, color: Color, alpha: f32) {
        if x < 0 || y < 0 || x >= i64::from(self.image.width()) || y >= i64::from(self.image.height()) {
            return;
        }
        let alpha = alpha * f32::from(color.a) / 255.0;
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        let Rgba([r, g, b, a]) = *pixel;
        let mix = |under: u8, over: u8| (f32::from(under) * (1.0 - alpha) + f32::from(over) * alpha).round() as u8;
        *pixel = Rgba([mix(r, color.r), mix(g, color.g), mix(b, color.b), a.max((alpha * 255.0) as u8)]);
    }

    /// Pixel bounds of `points`, clipped to the image
    fn pixel_bounds(&self, points: &[(f32, f32)], pad: f32) -> Option<(i64, i64, i64, i64)> {
        let min_x = points.iter().map(|p| p.0).fold(f32::INFINITY, f32::min) - pad;
        let min_y = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min) - pad;
        let max_x = points.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max) + pad;
        let max_y = points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max) + pad;
        let x0 = (min_x.floor() as i64).max(0);
        let y0 = (min_y.floor() as i64).max(0);
        let x1 = (max_x.ceil() as i64).min(i64::from(self.image.width()));
        let y1 = (max_y.ceil() as i64).min(i64::from(self.image.height()));
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    /// Fill a convex polygon given in page space
    fn fill(&mut self, corners: &[PageCoordinate], color: Color, opacity: f32) {
        let points: Vec<(f32, f32)> = corners.iter().map(|c| self.to_pixel(c)).collect();
        let Some((x0, y0, x1, y1)) = self.pixel_bounds(&points, 0.0) else { return };
        for y in y0..y1 {
            for x in x0..x1 {
                if inside_convex(&points, (x as f32 + 0.5, y as f32 + 0.5)) {
                    self.blend(x, y, color, opacity);
                }
            }
        }
    }

    /// Stroke a polyline given in page space, each pixel covered once
    fn stroke(&mut self, points: &[PageCoordinate], closed: bool, color: Color, width: f32, opacity: f32) {
        let pixels: Vec<(f32, f32)> = points.iter().map(|p| self.to_pixel(p)).collect();
        let radius = (width * self.scale / 2.0).max(0.5);
        let Some((x0, y0, x1, y1)) = self.pixel_bounds(&pixels, radius + 1.0) else { return };

        let mut segments: Vec<((f32, f32), (f32, f32))> = pixels.windows(2).map(|w| (w[0], w[1])).collect();
        if closed && pixels.len() > 2 {
            segments.push((pixels[pixels.len() - 1], pixels[0]));
        }
        if segments.is_empty() {
            if let Some(&only) = pixels.first() {
                segments.push((only, only));
            }
        }

        for y in y0..y1 {
            for x in x0..x1 {
                let center = (x as f32 + 0.5, y as f32 + 0.5);
                if segments.iter().any(|&(a, b)| segment_distance(center, a, b) <= radius) {
                    self.blend(x, y, color, opacity);
                }
            }
        }
    }

    /// Draw an image into the axis-aligned pixel box of `corners`
    fn image(&mut self, payload: &ImagePayload, corners: &[PageCoordinate], opacity: f32) {
        let Some(source) = payload.to_rgba_image() else {
            tracing::warn!(width = payload.width, height = payload.height, "skipping malformed image payload");
            return;
        };
        let points: Vec<(f32, f32)> = corners.iter().map(|c| self.to_pixel(c)).collect();
        let Some((x0, y0, x1, y1)) = self.pixel_bounds(&points, 0.0) else { return };

        let upright = match self.entry.rotation {
            90 => imageops::rotate90(&source),
            180 => imageops::rotate180(&source),
            270 => imageops::rotate270(&source),
            _ => source,
        };
        let scaled = imageops::resize(&upright, (x1 - x0) as u32, (y1 - y0) as u32, FilterType::Triangle);
        for (dx, dy, pixel) in scaled.enumerate_pixels() {
            let Rgba([r, g, b, a]) = *pixel;
            if a == 0 {
                continue;
            }
            let alpha = opacity * f32::from(a) / 255.0;
            self.blend(x0 + i64::from(dx), y0 + i64::from(dy), Color::rgb(r, g, b), alpha);
        }
    }
}

fn inside_convex(points: &[(f32, f32)], p: (f32, f32)) -> bool {
    let mut sign = 0.0_f32;
    for (i, &a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
        if cross != 0.0 {
            if sign != 0.0 && cross.signum() != sign {
                return false;
            }
            sign = cross.signum();
        }
    }
    true
}

fn segment_distance(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 { 0.0 } else { (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0) };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    (p.0 - cx).hypot(p.1 - cy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationStyle, PageRect};
    use crate::session::tests::session;
    use pdf_engine::LopdfEngine;

    fn rectangle(rect: PageRect, fill: Option<Color>) -> Annotation {
        let style = AnnotationStyle { fill_color: fill, ..AnnotationStyle::red_markup() };
        Annotation::new(0, AnnotationKind::Rectangle, AnnotationGeometry::rect(rect), style)
    }

    fn blank(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn test_filled_rectangle_is_composited() {
        let entry = PageEntry::new(1, pdf_engine::PageSize::new(100.0, 100.0), 0);
        let item = rectangle(PageRect::new(10.0, 10.0, 40.0, 20.0), Some(Color::BLUE));
        let mut image = blank(100, 100);
        composite_page(&mut image, &entry, 1.0, &[&item]);

        assert_eq!(image.get_pixel(30, 20), &Rgba([0, 0, 255, 255]));
        assert_eq!(image.get_pixel(10, 10)[0], 255, "outline is red");
        assert_eq!(image.get_pixel(80, 80), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_rotated_page_moves_overlay() {
        let entry = PageEntry::new(1, pdf_engine::PageSize::new(100.0, 200.0), 90);
        let item = rectangle(PageRect::new(0.0, 0.0, 20.0, 20.0), Some(Color::BLUE));
        let mut image = blank(200, 100);
        composite_page(&mut image, &entry, 1.0, &[&item]);

        // top-left of the page lands at the top-right of the display
        assert_eq!(image.get_pixel(190, 10), &Rgba([0, 0, 255, 255]));
        assert_eq!(image.get_pixel(10, 10), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_translucent_highlight_blends() {
        let entry = PageEntry::new(1, pdf_engine::PageSize::new(50.0, 50.0), 0);
        let highlight = Annotation::new(
            0,
            AnnotationKind::Highlight,
            AnnotationGeometry::rect(PageRect::new(0.0, 0.0, 50.0, 10.0)),
            AnnotationStyle { fill_color: Some(Color::new(255, 255, 0, 255)), opacity: 0.5, ..AnnotationStyle::new() },
        );
        let mut image = blank(50, 50);
        composite_page(&mut image, &entry, 1.0, &[&highlight]);

        let Rgba([r, g, b, _]) = *image.get_pixel(25, 5);
        assert_eq!((r, g), (255, 255));
        assert!((126..=129).contains(&b));
    }

    #[test]
    fn test_stroke_covers_segment() {
        let entry = PageEntry::new(1, pdf_engine::PageSize::new(50.0, 50.0), 0);
        let stroke = Annotation::new(
            0,
            AnnotationKind::Freehand,
            AnnotationGeometry::Freehand {
                points: vec![PageCoordinate::new(5.0, 25.0), PageCoordinate::new(45.0, 25.0)],
            },
            AnnotationStyle { stroke_color: Color::BLACK, stroke_width: 2.0, ..AnnotationStyle::new() },
        );
        let mut image = blank(50, 50);
        composite_page(&mut image, &entry, 1.0, &[&stroke]);

        assert_eq!(image.get_pixel(25, 24), &Rgba([0, 0, 0, 255]));
        assert_eq!(image.get_pixel(25, 40), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_export_writes_one_png_per_page() {
        let mut session = session(2);
        session.add_annotation(rectangle(PageRect::new(100.0, 100.0, 50.0, 50.0), Some(Color::GREEN))).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut engine = LopdfEngine::new();

        let paths = export_page_images(&session, &mut engine, dir.path(), 0.5, &CancellationToken::new()).unwrap();

        assert_eq!(paths, vec![dir.path().join("page-1.png"), dir.path().join("page-2.png")]);
        let first = image::open(&paths[0]).unwrap().to_rgba8();
        assert_eq!(first.dimensions(), (306, 396));
        assert_eq!(first.get_pixel(62, 62), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_cancelled_export_writes_nothing() {
        let session = session(2);
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = export_page_images(&session, &mut LopdfEngine::new(), dir.path(), 1.0, &cancel);

        assert!(matches!(result, Err(EditorError::Cancelled)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rejects_bad_scale() {
        let session = session(1);
        let dir = tempfile::tempdir().unwrap();
        let result = export_page_images(&session, &mut LopdfEngine::new(), dir.path(), 0.0, &CancellationToken::new());
        assert!(matches!(result, Err(EditorError::InvalidInput(_))));
    }
}
