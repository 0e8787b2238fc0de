//! Bordered text stamps and image stamps on the current page

use super::{check_range, placed, DialogContext, EditDescription};
use crate::annotation::{Annotation, AnnotationKind, AnnotationStyle, Color, ImagePayload, MarkContent, PageCoordinate, PageRect};
use crate::appearance::stamp_box_size;
use crate::error::{EditorError, EditorResult};

pub const LABEL: &str = "Add Stamp";

/// Border width of text stamps in points
pub const STAMP_BORDER: f32 = 2.5;

pub const STAMP_OPACITY: f32 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampPreset {
    pub text: &'static str,
    /// Text and border colour
    pub color: Color,
}

const fn preset(text: &'static str, r: u8, g: u8, b: u8) -> StampPreset {
    StampPreset { text, color: Color { r, g, b, a: 255 } }
}

pub const STAMP_PRESETS: [StampPreset; 10] = [
    preset("APPROVED", 0, 128, 0),
    preset("REJECTED", 204, 0, 0),
    preset("DRAFT", 102, 102, 102),
    preset("CONFIDENTIAL", 179, 0, 0),
    preset("FINAL", 0, 77, 153),
    preset("COPY", 77, 77, 153),
    preset("NOT APPROVED", 179, 51, 0),
    preset("FOR REVIEW", 128, 102, 0),
    preset("VOID", 153, 0, 0),
    preset("URGENT", 230, 26, 26),
];

#[derive(Debug, Clone, PartialEq)]
pub enum StampContent {
    /// Index into [`STAMP_PRESETS`]
    Preset(usize),
    Custom { text: String, color: Color },
    /// `scale_percent` of the image's pixel size in points
    Image { image: ImagePayload, scale_percent: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StampConfig {
    pub content: StampContent,
    /// 20 to 120; text only
    pub font_size: f32,
    /// Degrees, -90 to 90; text only
    pub rotation: i32,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self { content: StampContent::Preset(0), font_size: 40.0, rotation: -20 }
    }
}

pub fn build(ctx: &DialogContext, config: &StampConfig) -> EditorResult<EditDescription> {
    let entry = ctx.current()?;
    let size = entry.display_size();
    let center = PageCoordinate::new(size.width_pt / 2.0, size.height_pt / 2.0);

    let annotation = match &config.content {
        StampContent::Image { image, scale_percent } => {
            check_range("scale", *scale_percent, 10..=500)?;
            let scale = *scale_percent as f32 / 100.0;
            let display = PageRect::centered(center, image.width as f32 * scale, image.height as f32 * scale);
            placed(
                entry,
                ctx.current_page,
                AnnotationKind::Stamp { mark: MarkContent::Image(image.clone()) },
                display,
                AnnotationStyle::new(),
                0.0,
            )
        }
        StampContent::Preset(index) => {
            let preset = STAMP_PRESETS
                .get(*index)
                .ok_or_else(|| EditorError::invalid(format!("no stamp preset {index}")))?;
            text_stamp(ctx, center, preset.text, preset.color, config)?
        }
        StampContent::Custom { text, color } => text_stamp(ctx, center, text.trim(), *color, config)?,
    };

    Ok(EditDescription::adding(LABEL, vec![annotation]))
}

fn text_stamp(
    ctx: &DialogContext,
    center: PageCoordinate,
    text: &str,
    color: Color,
    config: &StampConfig,
) -> EditorResult<Annotation> {
    if text.is_empty() {
        return Err(EditorError::invalid("stamp text is empty"));
    }
    check_range("font size", config.font_size, 20.0..=120.0)?;
    check_range("rotation", config.rotation, -90..=90)?;

    let style = AnnotationStyle {
        stroke_color: color,
        stroke_width: STAMP_BORDER,
        font_size: config.font_size,
        opacity: STAMP_OPACITY,
        ..AnnotationStyle::new()
    };
    let (w, h) = stamp_box_size(style.font, config.font_size, STAMP_BORDER, text);
    Ok(placed(
        ctx.current()?,
        ctx.current_page,
        AnnotationKind::Stamp { mark: MarkContent::Text(text.to_owned()) },
        PageRect::centered(center, w, h),
        style,
        config.rotation as f32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogs::tests::context;
    use std::sync::Arc;

    #[test]
    fn test_preset_stamp_centered_on_current_page() {
        let mut ctx = context(3);
        ctx.current_page = 1;
        let edit = build(&ctx, &StampConfig::default()).unwrap();

        let stamp = &edit.add[0];
        assert_eq!(stamp.page_index(), 1);
        assert_eq!(stamp.kind(), &AnnotationKind::Stamp { mark: MarkContent::Text("APPROVED".into()) });
        assert_eq!(stamp.style().stroke_color, Color::rgb(0, 128, 0));
        assert_eq!(stamp.style().rotation, -20.0);
        assert!((stamp.style().opacity - STAMP_OPACITY).abs() < 1e-6);
        let center = stamp.bounding_box().center();
        assert!((center.x - 306.0).abs() < 1e-3);
        assert!((center.y - 396.0).abs() < 1e-3);
    }

    #[test]
    fn test_custom_text_and_color() {
        let ctx = context(1);
        let config = StampConfig {
            content: StampContent::Custom { text: " PAID ".into(), color: Color::BLUE },
            rotation: 0,
            ..Default::default()
        };
        let stamp = build(&ctx, &config).unwrap().add.remove(0);

        assert_eq!(stamp.kind().text(), Some("PAID"));
        assert_eq!(stamp.style().stroke_color, Color::BLUE);
        let (w, _) = stamp_box_size(stamp.style().font, 40.0, STAMP_BORDER, "PAID");
        assert!((stamp.bounding_box().width - w).abs() < 1e-3);
    }

    #[test]
    fn test_image_stamp_scaled() {
        let ctx = context(1);
        let image = ImagePayload { width: 200, height: 100, rgba: Arc::new(vec![0; 200 * 100 * 4]) };
        let config = StampConfig { content: StampContent::Image { image, scale_percent: 150 }, ..Default::default() };
        let stamp = build(&ctx, &config).unwrap().add.remove(0);

        let bounds = stamp.bounding_box();
        assert!((bounds.width - 300.0).abs() < 1e-3);
        assert!((bounds.height - 150.0).abs() < 1e-3);
        assert_eq!(stamp.style().rotation, 0.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        let ctx = context(1);
        let configs = [
            StampConfig { content: StampContent::Preset(42), ..Default::default() },
            StampConfig { content: StampContent::Custom { text: "".into(), color: Color::RED }, ..Default::default() },
            StampConfig { font_size: 10.0, ..Default::default() },
            StampConfig { rotation: 120, ..Default::default() },
        ];
        for config in configs {
            assert!(matches!(build(&ctx, &config), Err(EditorError::InvalidInput(_))));
        }
    }
}
