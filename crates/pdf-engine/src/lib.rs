use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// US Letter, used when a page carries no usable MediaBox.
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt }
    }

    /// Size after applying a page rotation in degrees (multiples of 90).
    pub fn rotated(self, degrees: u16) -> Self {
        if degrees % 180 == 90 {
            Self { width_pt: self.height_pt, height_pt: self.width_pt }
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
    /// Extra clockwise rotation applied on top of the page's own `/Rotate`.
    pub rotation: u16,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0, rotation: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width_px: u32,
    pub height_px: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self { width_px: 100, height_px: 140 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Rasterizes pages of open documents.
///
/// Documents are reopened from bytes whenever the editor saves, so handles
/// are cheap and short-lived.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(&self, handle: DocumentHandle, page_index: u32)
        -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: ThumbnailSize,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;

    /// Whether rendered pages include annotation appearance streams.
    fn renders_annotations(&self) -> bool {
        false
    }
}

/// Reads the unrotated size of a page from its MediaBox, walking up the page
/// tree for inherited boxes.
pub fn media_box_size(doc: &Document, page_id: ObjectId) -> PageSize {
    let [x0, y0, x1, y1] = media_box(doc, page_id);
    PageSize { width_pt: x1 - x0, height_pt: y1 - y0 }
}

/// Normalised MediaBox `[x0, y0, x1, y1]` with `x0 < x1` and `y0 < y1`.
///
/// Falls back to US Letter at the origin when the box is missing or
/// degenerate.
pub fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok().cloned())
        .and_then(|array| {
            if array.len() != 4 {
                return None;
            }
            let mut values = [0.0f32; 4];
            for (slot, item) in values.iter_mut().zip(array.iter()) {
                let resolved = match item {
                    Object::Reference(id) => doc.get_object(*id).ok()?,
                    other => other,
                };
                *slot = resolved.as_float().ok()?;
            }
            let [a, b, c, d] = values;
            Some([a.min(c), b.min(d), a.max(c), b.max(d)])
        })
        .filter(|[x0, y0, x1, y1]| x1 - x0 > 0.0 && y1 - y0 > 0.0)
        .unwrap_or([0.0, 0.0, DEFAULT_PAGE_SIZE.width_pt, DEFAULT_PAGE_SIZE.height_pt])
}

/// Reads a page's `/Rotate`, normalised to 0, 90, 180 or 270.
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> u16 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .map(|degrees| (degrees.rem_euclid(360) / 90 * 90) as u16)
        .unwrap_or(0)
}

pub fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(target) => doc.get_object(*target).ok(),
                other => Some(other),
            };
        }

        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
        if depth > 64 {
            return None;
        }
    }

    None
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    bytes: Vec<u8>,
    pages: Vec<(PageSize, u16)>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_pages(bytes: &[u8]) -> Result<Vec<(PageSize, u16)>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages: Vec<(PageSize, u16)> = doc
            .get_pages()
            .into_values()
            .map(|page_id| (media_box_size(&doc, page_id), page_rotation(&doc, page_id)))
            .collect();

        if pages.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok(pages)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn page_entry(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<(PageSize, u16), PdfEngineError> {
        let record = self.record(handle)?;
        record.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.pages.len() as u32,
        })
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let pages = Self::parse_pages(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        tracing::debug!(handle = handle.raw(), pages = pages.len(), "opened document");
        self.docs.insert(handle, DocumentRecord { bytes, pages });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.pages.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let (size, rotation) = self.page_entry(handle, page_index)?;
        Ok(size.rotated(rotation))
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let (size, own_rotation) = self.page_entry(handle, request.page_index)?;
        let page_size = size.rotated((own_rotation + request.rotation) % 360);
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: ThumbnailSize,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page = self.render_page(handle, RenderRequest { page_index, scale: 0.25, rotation: 0 })?;

        Ok(image::imageops::thumbnail(&page, target.width_px.max(1), target.height_px.max(1)))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        let record =
            self.docs.remove(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))?;
        tracing::debug!(handle = handle.raw(), bytes = record.bytes.len(), "closed document");
        Ok(())
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Real rasterization through a system pdfium library. Page geometry still
    /// comes from the lopdf parse so both backends agree on sizes.
    pub struct PdfiumEngine {
        pdfium: Pdfium,
        inner: LopdfEngine,
    }

    impl PdfiumEngine {
        pub fn from_system_library() -> Result<Self, PdfEngineError> {
            let bindings = Pdfium::bind_to_system_library().map_err(|err| {
                PdfEngineError::Backend(format!("failed to bind pdfium system library: {err}"))
            })?;

            Ok(Self { pdfium: Pdfium::new(bindings), inner: LopdfEngine::default() })
        }
    }

    impl PdfEngine for PdfiumEngine {
        fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
            self.inner.open(source)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
            self.inner.page_count(handle)
        }

        fn page_size(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PageSize, PdfEngineError> {
            self.inner.page_size(handle, page_index)
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            request: RenderRequest,
        ) -> Result<RgbaImage, PdfEngineError> {
            let record = self.inner.record(handle)?;
            let size = self.inner.page_size(handle, request.page_index)?;
            let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

            let document = self
                .pdfium
                .load_pdf_from_byte_slice(&record.bytes, None)
                .map_err(|err| PdfEngineError::Backend(err.to_string()))?;
            let page = document
                .pages()
                .get(request.page_index as u16)
                .map_err(|err| PdfEngineError::Backend(err.to_string()))?;

            let rotation = match request.rotation % 360 {
                90 => PdfPageRenderRotation::Degrees90,
                180 => PdfPageRenderRotation::Degrees180,
                270 => PdfPageRenderRotation::Degrees270,
                _ => PdfPageRenderRotation::None,
            };
            let swap = request.rotation % 180 == 90;
            let (width, height) = if swap {
                (size.height_pt * scale, size.width_pt * scale)
            } else {
                (size.width_pt * scale, size.height_pt * scale)
            };
            let config = PdfRenderConfig::new()
                .set_target_width(width.round().max(1.0) as i32)
                .set_maximum_height(height.round().max(1.0) as i32)
                .rotate(rotation, false);

            let bitmap = page
                .render_with_config(&config)
                .map_err(|err| PdfEngineError::Backend(err.to_string()))?;

            Ok(bitmap.as_image().into_rgba8())
        }

        fn render_thumbnail(
            &self,
            handle: DocumentHandle,
            page_index: u32,
            target: ThumbnailSize,
        ) -> Result<RgbaImage, PdfEngineError> {
            let page =
                self.render_page(handle, RenderRequest { page_index, scale: 0.5, rotation: 0 })?;
            Ok(image::imageops::thumbnail(&page, target.width_px.max(1), target.height_px.max(1)))
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.inner.close(handle)
        }

        fn renders_annotations(&self) -> bool {
            true
        }
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
