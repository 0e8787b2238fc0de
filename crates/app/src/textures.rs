//! Page rasters as egui textures
//!
//! Pages are rendered from the base document (editor annotations already
//! lifted out) so overlay items are never drawn twice. Textures are cached
//! per source page, rotation and pixel width; zooming simply produces new
//! keys and [`PageTextures::retain_pages`] drops what scrolled away.

use eframe::egui;
use pdf_editor_core::{EditSession, EditorError, EditorResult, PageEntry};
use pdf_engine::{DocumentHandle, OpenSource, PdfEngine, RenderRequest};
use std::collections::{HashMap, HashSet};

/// Longest texture side in pixels; deeper zoom is upscaled by the GPU
pub const MAX_TEXTURE_SIDE: f32 = 4096.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextureKey {
    source: u32,
    rotation: u16,
    width_px: u32,
}

pub struct PageTextures {
    engine: Box<dyn PdfEngine>,
    document: Option<DocumentHandle>,
    /// `/Rotate` of each base page, indexed by `source - 1`
    base_rotations: Vec<u16>,
    cache: HashMap<TextureKey, egui::TextureHandle>,
    failed: HashSet<TextureKey>,
}

impl Default for PageTextures {
    fn default() -> Self {
        Self::new(default_engine())
    }
}

fn default_engine() -> Box<dyn PdfEngine> {
    #[cfg(feature = "pdfium")]
    match pdf_engine::pdfium_backend::PdfiumEngine::from_system_library() {
        Ok(engine) => return Box::new(engine),
        Err(err) => tracing::warn!(error = %err, "pdfium unavailable, using placeholder pages"),
    }
    Box::new(pdf_engine::default_engine())
}

/// Rotation to request on top of the page's own `/Rotate`
pub fn extra_rotation(display_rotation: u16, base_rotation: u16) -> u16 {
    ((i32::from(display_rotation) - i32::from(base_rotation)).rem_euclid(360)) as u16
}

/// Pixels per point for a page shown at `scale` view units per point,
/// capped so neither side exceeds [`MAX_TEXTURE_SIDE`]
pub fn render_scale(entry: &PageEntry, scale: f32, pixels_per_point: f32) -> f32 {
    let size = entry.display_size();
    let wanted = scale * pixels_per_point;
    let longest = size.width_pt.max(size.height_pt).max(1.0);
    wanted.min(MAX_TEXTURE_SIDE / longest)
}

impl PageTextures {
    pub fn new(engine: Box<dyn PdfEngine>) -> Self {
        Self {
            engine,
            document: None,
            base_rotations: Vec::new(),
            cache: HashMap::new(),
            failed: HashSet::new(),
        }
    }

    /// Hand the session's base document to the engine
    pub fn load(&mut self, session: &EditSession) -> EditorResult<()> {
        self.close();

        let mut base = session.base_document().clone();
        self.base_rotations = base
            .get_pages()
            .values()
            .map(|page_id| pdf_engine::page_rotation(&base, *page_id))
            .collect();

        let mut bytes = Vec::new();
        base.save_to(&mut bytes).map_err(|err| EditorError::Serialize(err.to_string()))?;
        self.document = Some(self.engine.open(OpenSource::Bytes(bytes))?);
        tracing::debug!(pages = self.base_rotations.len(), "page renderer loaded");
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(handle) = self.document.take() {
            if let Err(err) = self.engine.close(handle) {
                tracing::warn!(error = %err, "closing render document failed");
            }
        }
        self.base_rotations.clear();
        self.cache.clear();
        self.failed.clear();
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    fn key(&self, entry: &PageEntry, pixel_scale: f32) -> TextureKey {
        let width_px = (entry.display_size().width_pt * pixel_scale).round().max(1.0) as u32;
        TextureKey { source: entry.source, rotation: entry.rotation, width_px }
    }

    /// Texture of `entry` at `scale`, rendered on first use
    pub fn texture(
        &mut self,
        ctx: &egui::Context,
        entry: &PageEntry,
        scale: f32,
    ) -> Option<&egui::TextureHandle> {
        let handle = self.document?;
        let pixel_scale = render_scale(entry, scale, ctx.pixels_per_point());
        let key = self.key(entry, pixel_scale);
        if self.failed.contains(&key) {
            return None;
        }

        if !self.cache.contains_key(&key) {
            let base_rotation = self.base_rotations.get(entry.source as usize - 1).copied().unwrap_or(0);
            let request = RenderRequest {
                page_index: entry.source - 1,
                scale: pixel_scale,
                rotation: extra_rotation(entry.rotation, base_rotation),
            };
            match self.engine.render_page(handle, request) {
                Ok(image) => {
                    let size = [image.width() as usize, image.height() as usize];
                    let pixels = egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw());
                    let name = format!("page_{}_{}_{}", key.source, key.rotation, key.width_px);
                    let texture = ctx.load_texture(name, pixels, egui::TextureOptions::LINEAR);
                    self.cache.insert(key, texture);
                }
                Err(err) => {
                    tracing::warn!(source = entry.source, error = %err, "page render failed");
                    self.failed.insert(key);
                    return None;
                }
            }
        }
        self.cache.get(&key)
    }

    /// Drop textures of pages other than `keep`
    pub fn retain_pages(&mut self, keep: &[PageEntry]) {
        self.cache.retain(|key, _| {
            keep.iter().any(|entry| entry.source == key.source && entry.rotation == key.rotation)
        });
    }

    /// Forget every texture, e.g. after a zoom change
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.failed.clear();
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl Drop for PageTextures {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::tests::pdf_bytes;
    use pdf_engine::PageSize;

    #[test]
    fn extra_rotation_is_relative_to_the_base_page() {
        assert_eq!(extra_rotation(90, 0), 90);
        assert_eq!(extra_rotation(0, 90), 270);
        assert_eq!(extra_rotation(180, 180), 0);
    }

    #[test]
    fn render_scale_is_capped() {
        let entry = PageEntry::new(1, PageSize::new(612.0, 792.0), 0);
        assert_eq!(render_scale(&entry, 1.0, 2.0), 2.0);
        assert!((render_scale(&entry, 10.0, 2.0) - MAX_TEXTURE_SIDE / 792.0).abs() < 1e-4);
    }

    #[test]
    fn pages_render_once_per_size() {
        let session = EditSession::from_bytes(pdf_bytes(2)).expect("session opens");
        let ctx = egui::Context::default();
        let mut textures = PageTextures::default();
        textures.load(&session).expect("renderer loads");

        let entry = session.pages()[0];
        let size = textures.texture(&ctx, &entry, 0.5).map(|texture| texture.size());
        assert_eq!(size, Some([306, 396]));
        textures.texture(&ctx, &entry, 0.5);
        assert_eq!(textures.cached(), 1);

        let turned = entry.rotated_by(1);
        let size = textures.texture(&ctx, &turned, 0.5).map(|texture| texture.size());
        assert_eq!(size, Some([396, 306]));
        assert_eq!(textures.cached(), 2);

        textures.retain_pages(&[turned]);
        assert_eq!(textures.cached(), 1);
    }

    #[test]
    fn nothing_renders_before_load() {
        let ctx = egui::Context::default();
        let mut textures = PageTextures::default();
        let entry = PageEntry::new(1, PageSize::new(612.0, 792.0), 0);
        assert!(textures.texture(&ctx, &entry, 1.0).is_none());
    }
}
