//! Text or image watermark across a range of pages

use super::{check_range, placed, DialogContext, EditDescription, PageRange};
use crate::annotation::{AnnotationKind, AnnotationStyle, Color, ImagePayload, MarkContent, PageCoordinate, PageRect};
use crate::appearance::text_box_size;
use crate::error::{EditorError, EditorResult};

pub const LABEL: &str = "Add Watermark";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkPosition {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl WatermarkPosition {
    pub const ALL: [WatermarkPosition; 5] = [
        WatermarkPosition::Center,
        WatermarkPosition::TopLeft,
        WatermarkPosition::TopRight,
        WatermarkPosition::BottomLeft,
        WatermarkPosition::BottomRight,
    ];

    pub fn label(self) -> &'static str {
        match self {
            WatermarkPosition::Center => "Center",
            WatermarkPosition::TopLeft => "Top Left",
            WatermarkPosition::TopRight => "Top Right",
            WatermarkPosition::BottomLeft => "Bottom Left",
            WatermarkPosition::BottomRight => "Bottom Right",
        }
    }

    /// Center of a text watermark on a `w` x `h` page
    fn text_center(self, w: f32, h: f32) -> PageCoordinate {
        let (fx, fy) = match self {
            WatermarkPosition::Center => (0.5, 0.5),
            WatermarkPosition::TopLeft => (0.25, 0.2),
            WatermarkPosition::TopRight => (0.75, 0.2),
            WatermarkPosition::BottomLeft => (0.25, 0.8),
            WatermarkPosition::BottomRight => (0.75, 0.8),
        };
        PageCoordinate::new(w * fx, h * fy)
    }

    /// Box of an `iw` x `ih` image watermark, kept 5% off the page edges in
    /// the corners
    fn image_box(self, w: f32, h: f32, iw: f32, ih: f32) -> PageRect {
        let (mx, my) = (w * 0.05, h * 0.05);
        let (x, y) = match self {
            WatermarkPosition::Center => ((w - iw) / 2.0, (h - ih) / 2.0),
            WatermarkPosition::TopLeft => (mx, my),
            WatermarkPosition::TopRight => (w - iw - mx, my),
            WatermarkPosition::BottomLeft => (mx, h - ih - my),
            WatermarkPosition::BottomRight => (w - iw - mx, h - ih - my),
        };
        PageRect::new(x, y, iw, ih)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatermarkContent {
    Text { text: String, font_size: f32, color: Color },
    /// `scale_percent` of the image's pixel size in points
    Image { image: ImagePayload, scale_percent: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkConfig {
    pub content: WatermarkContent,
    /// 5 to 100
    pub opacity_percent: u32,
    /// Degrees, -90 to 90; text only
    pub rotation: i32,
    pub position: WatermarkPosition,
    pub pages: PageRange,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            content: WatermarkContent::Text {
                text: "CONFIDENTIAL".to_owned(),
                font_size: 60.0,
                color: Color::grey(128),
            },
            opacity_percent: 30,
            rotation: -45,
            position: WatermarkPosition::Center,
            pages: PageRange::All,
        }
    }
}

pub fn build(ctx: &DialogContext, config: &WatermarkConfig) -> EditorResult<EditDescription> {
    check_range("opacity", config.opacity_percent, 5..=100)?;
    check_range("rotation", config.rotation, -90..=90)?;
    let pages = config.pages.resolve(ctx.page_count())?;
    let opacity = config.opacity_percent as f32 / 100.0;

    let mut add = Vec::with_capacity(pages.len());
    match &config.content {
        WatermarkContent::Text { text, font_size, color } => {
            let text = text.trim();
            if text.is_empty() {
                return Err(EditorError::invalid("watermark text is empty"));
            }
            check_range("font size", *font_size, 8.0..=200.0)?;

            let style = AnnotationStyle { stroke_color: *color, font_size: *font_size, opacity, ..AnnotationStyle::new() };
            let (tw, th) = text_box_size(style.font, *font_size, text);
            for index in pages {
                let entry = ctx.page(index)?;
                let size = entry.display_size();
                let center = config.position.text_center(size.width_pt, size.height_pt);
                add.push(placed(
                    entry,
                    index,
                    AnnotationKind::Watermark { mark: MarkContent::Text(text.to_owned()) },
                    PageRect::centered(center, tw, th),
                    style.clone(),
                    config.rotation as f32,
                ));
            }
        }
        WatermarkContent::Image { image, scale_percent } => {
            check_range("scale", *scale_percent, 10..=300)?;
            let scale = *scale_percent as f32 / 100.0;
            let style = AnnotationStyle::new().with_opacity(opacity);

            for index in pages {
                let entry = ctx.page(index)?;
                let size = entry.display_size();
                let (w, h) = (size.width_pt, size.height_pt);
                let (iw, ih) = fit_within(image.width as f32 * scale, image.height as f32 * scale, w * 0.9, h * 0.9);
                add.push(placed(
                    entry,
                    index,
                    AnnotationKind::Watermark { mark: MarkContent::Image(image.clone()) },
                    config.position.image_box(w, h, iw, ih),
                    style.clone(),
                    0.0,
                ));
            }
        }
    }

    tracing::debug!(pages = add.len(), "built watermark");
    Ok(EditDescription::adding(LABEL, add))
}

/// Shrink `w` x `h` proportionally to fit the width limit first, then the
/// height limit
fn fit_within(mut w: f32, mut h: f32, max_w: f32, max_h: f32) -> (f32, f32) {
    if w > max_w {
        h *= max_w / w;
        w = max_w;
    }
    if h > max_h {
        w *= max_h / h;
        h = max_h;
    }
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogs::tests::context;
    use crate::pages::PageEntry;
    use pdf_engine::PageSize;
    use std::sync::Arc;

    fn image(width: u32, height: u32) -> ImagePayload {
        ImagePayload { width, height, rgba: Arc::new(vec![255; (width * height * 4) as usize]) }
    }

    #[test]
    fn test_default_text_watermark_on_every_page() {
        let ctx = context(3);
        let edit = build(&ctx, &WatermarkConfig::default()).unwrap();

        assert_eq!(edit.label, LABEL);
        assert_eq!(edit.add.len(), 3);
        for (index, annotation) in edit.add.iter().enumerate() {
            assert_eq!(usize::from(annotation.page_index()), index);
            assert_eq!(annotation.style().rotation, -45.0);
            assert!((annotation.style().opacity - 0.3).abs() < 1e-6);
            let center = annotation.bounding_box().center();
            assert!((center.x - 306.0).abs() < 1e-3);
            assert!((center.y - 396.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_corner_positions() {
        let ctx = context(1);
        let config = WatermarkConfig { position: WatermarkPosition::BottomRight, ..Default::default() };
        let edit = build(&ctx, &config).unwrap();

        let center = edit.add[0].bounding_box().center();
        assert!((center.x - 612.0 * 0.75).abs() < 1e-3);
        assert!((center.y - 792.0 * 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_range_limits_pages() {
        let ctx = context(4);
        let config = WatermarkConfig { pages: PageRange::Span { from: 2, to: 3 }, ..Default::default() };
        let edit = build(&ctx, &config).unwrap();

        let pages: Vec<u16> = edit.add.iter().map(|a| a.page_index()).collect();
        assert_eq!(pages, vec![1, 2]);
    }

    #[test]
    fn test_rejects_bad_input() {
        let ctx = context(2);
        let empty = WatermarkConfig {
            content: WatermarkContent::Text { text: "  ".into(), font_size: 60.0, color: Color::BLACK },
            ..Default::default()
        };
        let faint = WatermarkConfig { opacity_percent: 2, ..Default::default() };
        let out_of_range = WatermarkConfig { pages: PageRange::Span { from: 1, to: 5 }, ..Default::default() };

        for config in [empty, faint, out_of_range] {
            assert!(matches!(build(&ctx, &config), Err(EditorError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_image_watermark_is_limited_to_page() {
        let ctx = context(1);
        let config = WatermarkConfig {
            content: WatermarkContent::Image { image: image(2000, 500), scale_percent: 100 },
            ..Default::default()
        };
        let edit = build(&ctx, &config).unwrap();

        let bounds = edit.add[0].bounding_box();
        assert!((bounds.width - 612.0 * 0.9).abs() < 1e-3);
        assert!((bounds.height - 612.0 * 0.9 / 4.0).abs() < 1e-3);
        assert_eq!(edit.add[0].style().rotation, 0.0);
    }

    #[test]
    fn test_image_corner_margin() {
        let ctx = context(1);
        let config = WatermarkConfig {
            content: WatermarkContent::Image { image: image(100, 50), scale_percent: 50 },
            position: WatermarkPosition::TopLeft,
            ..Default::default()
        };
        let bounds = build(&ctx, &config).unwrap().add[0].bounding_box();

        assert!((bounds.x - 612.0 * 0.05).abs() < 1e-3);
        assert!((bounds.y - 792.0 * 0.05).abs() < 1e-3);
        assert!((bounds.width - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_text_stays_upright_on_rotated_page() {
        let ctx = DialogContext {
            pages: vec![PageEntry::new(1, PageSize::new(612.0, 792.0), 90)],
            ..context(1)
        };
        let edit = build(&ctx, &WatermarkConfig::default()).unwrap();

        assert_eq!(edit.add[0].style().rotation, -135.0);
    }
}
