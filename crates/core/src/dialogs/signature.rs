//! Signature image placed on the current page

use super::{check_range, placed, DialogContext, EditDescription};
use crate::annotation::{AnnotationKind, AnnotationStyle, ImagePayload, PageRect};
use crate::error::{EditorError, EditorResult};

pub const LABEL: &str = "Add Signature";

/// Signature images are placed at half their pixel size before scaling
const BASE_SCALE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureConfig {
    pub image: Option<ImagePayload>,
    /// 10 to 500
    pub scale_percent: u32,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self { image: None, scale_percent: 100 }
    }
}

/// Signature near the lower right of the current page, kept on the page
pub fn build(ctx: &DialogContext, config: &SignatureConfig) -> EditorResult<EditDescription> {
    let image = config.image.as_ref().ok_or_else(|| EditorError::invalid("no signature image selected"))?;
    check_range("scale", config.scale_percent, 10..=500)?;

    let entry = ctx.current()?;
    let size = entry.display_size();
    let (w, h) = (size.width_pt, size.height_pt);
    let scale = config.scale_percent as f32 / 100.0 * BASE_SCALE;
    let display = PageRect::new(w * 0.6, h * 0.8, image.width as f32 * scale, image.height as f32 * scale)
        .clamped_into(w, h);

    let signature = placed(
        entry,
        ctx.current_page,
        AnnotationKind::Signature { image: image.clone() },
        display,
        AnnotationStyle::new(),
        0.0,
    );
    Ok(EditDescription::adding(LABEL, vec![signature]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogs::tests::context;
    use std::sync::Arc;

    fn image(width: u32, height: u32) -> ImagePayload {
        ImagePayload { width, height, rgba: Arc::new(vec![0; (width * height * 4) as usize]) }
    }

    #[test]
    fn test_signature_placed_lower_right() {
        let ctx = context(2);
        let config = SignatureConfig { image: Some(image(200, 80)), scale_percent: 100 };
        let signature = build(&ctx, &config).unwrap().add.remove(0);

        let bounds = signature.bounding_box();
        assert!((bounds.x - 612.0 * 0.6).abs() < 1e-3);
        assert!((bounds.y - 792.0 * 0.8).abs() < 1e-3);
        assert!((bounds.width - 100.0).abs() < 1e-3);
        assert!((bounds.height - 40.0).abs() < 1e-3);
        assert!(matches!(signature.kind(), AnnotationKind::Signature { .. }));
    }

    #[test]
    fn test_large_signature_is_clamped_onto_page() {
        let ctx = context(1);
        let config = SignatureConfig { image: Some(image(1000, 400)), scale_percent: 100 };
        let bounds = build(&ctx, &config).unwrap().add[0].bounding_box();

        assert!(bounds.right() <= 612.0 + 1e-3);
        assert!(bounds.bottom() <= 792.0 + 1e-3);
        assert!((bounds.width - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_requires_image() {
        let ctx = context(1);
        assert!(matches!(build(&ctx, &SignatureConfig::default()), Err(EditorError::InvalidInput(_))));

        let tiny = SignatureConfig { image: Some(image(10, 10)), scale_percent: 5 };
        assert!(matches!(build(&ctx, &tiny), Err(EditorError::InvalidInput(_))));
    }
}
