//! Writing an edited document back to PDF
//!
//! Export works on an [`ExportSnapshot`], an immutable copy of everything a
//! save needs, so it can run on a worker thread while the UI keeps the
//! session. The base document is cloned, the page tree is rebuilt only when
//! pages were reordered or deleted, and every annotation is appended to its
//! page's `/Annots` as a standard annotation with an `/AP /N` appearance.
//!
//! Pages nobody touched keep their dictionaries and content streams as they
//! were in the file that was opened.

use crate::annotation::{
    Annotation, AnnotationGeometry, AnnotationKind, ImagePayload, LinkTarget, MarkContent,
};
use crate::appearance::build_appearance;
use crate::cancel::CancellationToken;
use crate::command::DocumentState;
use crate::error::{EditorError, EditorResult};
use crate::pages::PageEntry;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name key recording which editor kind an annotation was exported from
pub const EDITOR_KIND: &str = "EditorKind";

/// String key holding the JSON form of the annotation (image pixels omitted;
/// they are recovered from the appearance stream)
pub const EDITOR_DATA: &str = "EditorData";

const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Everything needed to write the document, detached from the session
#[derive(Debug, Clone)]
pub struct ExportSnapshot {
    pub(crate) base: Arc<Document>,
    pub(crate) original_bytes: Arc<Vec<u8>>,
    pub state: DocumentState,
    /// Nothing changed since open; the original bytes are written as-is
    pub unmodified: bool,
}

impl ExportSnapshot {
    /// Serialize to PDF bytes
    pub fn to_bytes(&self, cancel: &CancellationToken) -> EditorResult<Vec<u8>> {
        cancel.check()?;
        if self.unmodified {
            return Ok(self.original_bytes.as_ref().clone());
        }

        let mut doc = self.build_document(cancel)?;
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).map_err(|err| EditorError::Serialize(err.to_string()))?;
        Ok(bytes)
    }

    /// Serialize and write to `path` through a temporary sibling file
    ///
    /// Nothing is written when the token is cancelled before the final
    /// rename.
    pub fn write_pdf(&self, path: &Path, cancel: &CancellationToken) -> EditorResult<()> {
        let bytes = self.to_bytes(cancel)?;
        write_atomically(path, &bytes, cancel)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "saved document");
        Ok(())
    }

    /// The edited document as a lopdf [`Document`]
    pub fn build_document(&self, cancel: &CancellationToken) -> EditorResult<Document> {
        let mut doc = self.base.as_ref().clone();
        let source_pages = doc.get_pages();

        let mut page_ids = Vec::with_capacity(self.state.pages.len());
        for entry in &self.state.pages {
            let id = source_pages.get(&entry.source).copied().ok_or_else(|| {
                EditorError::CorruptPdf(format!("page {} is missing from the document", entry.source))
            })?;
            page_ids.push(id);
        }
        let original_rotations: Vec<u16> =
            page_ids.iter().map(|id| pdf_engine::page_rotation(&doc, *id)).collect();

        let in_order = self.state.pages.len() == source_pages.len()
            && self.state.pages.iter().enumerate().all(|(i, p)| p.source as usize == i + 1);
        if !in_order {
            rebuild_page_tree(&mut doc, &page_ids)?;
        }

        for (index, (entry, &page_id)) in self.state.pages.iter().zip(&page_ids).enumerate() {
            cancel.check()?;

            if entry.rotation != original_rotations[index] {
                doc.get_dictionary_mut(page_id)
                    .map_err(corrupt)?
                    .set("Rotate", i64::from(entry.rotation));
            }

            let media_box = pdf_engine::media_box(&doc, page_id);
            for annotation in self.state.annotations.get_page_annotations(index as u16) {
                let annot_id =
                    write_annotation(&mut doc, page_id, media_box, &page_ids, annotation)?;
                append_annotation(&mut doc, page_id, annot_id)?;
            }
        }

        // Drops deleted pages and annotations lifted out on import
        doc.prune_objects();
        tracing::debug!(
            pages = page_ids.len(),
            annotations = self.state.annotations.len(),
            reordered = !in_order,
            "built export document"
        );
        Ok(doc)
    }
}

pub(crate) fn corrupt(err: lopdf::Error) -> EditorError {
    EditorError::CorruptPdf(err.to_string())
}

/// Point the root page tree node directly at `page_ids`, in order
///
/// Inheritable attributes are copied onto each page first so pages moved out
/// of intermediate nodes keep their boxes, resources and rotation.
fn rebuild_page_tree(doc: &mut Document, page_ids: &[ObjectId]) -> EditorResult<()> {
    let root_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(corrupt)?;
    let pages_id = doc
        .get_dictionary(root_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(corrupt)?;

    let mut materialized: Vec<(ObjectId, Vec<(&[u8], Object)>)> = Vec::new();
    for &page_id in page_ids {
        let page = doc.get_dictionary(page_id).map_err(corrupt)?;
        let missing: Vec<(&[u8], Object)> = INHERITABLE
            .iter()
            .filter(|key| !page.has(key))
            .filter_map(|key| {
                pdf_engine::inherited_attribute(doc, page_id, key).map(|value| (*key, value.clone()))
            })
            .collect();
        materialized.push((page_id, missing));
    }

    for (page_id, missing) in materialized {
        let page = doc.get_dictionary_mut(page_id).map_err(corrupt)?;
        for (key, value) in missing {
            page.set(key, value);
        }
        page.set("Parent", pages_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    let pages = doc.get_dictionary_mut(pages_id).map_err(corrupt)?;
    pages.set("Kids", kids);
    pages.set("Count", page_ids.len() as i64);
    Ok(())
}

fn append_annotation(doc: &mut Document, page_id: ObjectId, annot_id: ObjectId) -> EditorResult<()> {
    let existing = doc.get_dictionary(page_id).map_err(corrupt)?.get(b"Annots").ok().cloned();

    match existing {
        Some(Object::Reference(array_id)) => {
            if let Ok(Object::Array(items)) = doc.get_object_mut(array_id) {
                items.push(Object::Reference(annot_id));
                return Ok(());
            }
            // Dangling or not an array; replace it
            set_annots(doc, page_id, vec![Object::Reference(annot_id)])
        }
        Some(Object::Array(mut items)) => {
            items.push(Object::Reference(annot_id));
            set_annots(doc, page_id, items)
        }
        _ => set_annots(doc, page_id, vec![Object::Reference(annot_id)]),
    }
}

fn set_annots(doc: &mut Document, page_id: ObjectId, items: Vec<Object>) -> EditorResult<()> {
    doc.get_dictionary_mut(page_id).map_err(corrupt)?.set("Annots", items);
    Ok(())
}

/// Maps page space (origin top-left, y down) into PDF user space
struct PdfSpace {
    x0: f32,
    y1: f32,
}

impl PdfSpace {
    fn new([x0, _, _, y1]: [f32; 4]) -> Self {
        Self { x0, y1 }
    }

    fn point(&self, x: f32, y: f32) -> [f32; 2] {
        [self.x0 + x, self.y1 - y]
    }
}

fn reals(values: &[f32]) -> Vec<Object> {
    values.iter().map(|v| Object::Real(*v)).collect()
}

fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// JSON record stored in `/EditorData`, with image pixels dropped
fn editor_data(annotation: &Annotation) -> EditorResult<String> {
    let mut stored = annotation.clone();
    let strip = |image: &ImagePayload| ImagePayload {
        width: image.width,
        height: image.height,
        rgba: Arc::new(Vec::new()),
    };
    let kind = match annotation.kind() {
        AnnotationKind::Signature { image } => Some(AnnotationKind::Signature { image: strip(image) }),
        AnnotationKind::Image { image } => Some(AnnotationKind::Image { image: strip(image) }),
        AnnotationKind::Stamp { mark: MarkContent::Image(image) } => {
            Some(AnnotationKind::Stamp { mark: MarkContent::Image(strip(image)) })
        }
        AnnotationKind::Watermark { mark: MarkContent::Image(image) } => {
            Some(AnnotationKind::Watermark { mark: MarkContent::Image(strip(image)) })
        }
        _ => None,
    };
    if let Some(kind) = kind {
        stored.set_kind(kind);
    }
    serde_json::to_string(&stored).map_err(|err| EditorError::Serialize(err.to_string()))
}

fn subtype(kind: &AnnotationKind) -> &'static str {
    match kind {
        AnnotationKind::Freehand => "Ink",
        AnnotationKind::Highlight => "Highlight",
        AnnotationKind::StickyNote { .. } => "Text",
        AnnotationKind::FreeText { .. }
        | AnnotationKind::TextEdit { .. }
        | AnnotationKind::PageText { .. } => "FreeText",
        AnnotationKind::Rectangle => "Square",
        AnnotationKind::Stamp { .. }
        | AnnotationKind::Signature { .. }
        | AnnotationKind::Image { .. } => "Stamp",
        AnnotationKind::Watermark { .. } => "Watermark",
        AnnotationKind::Link { .. } => "Link",
    }
}

/// Adds the annotation dictionary and its appearance to `doc`
fn write_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    media_box: [f32; 4],
    page_ids: &[ObjectId],
    annotation: &Annotation,
) -> EditorResult<ObjectId> {
    let space = PdfSpace::new(media_box);
    let style = annotation.style();
    let appearance = build_appearance(annotation);
    let bounds = appearance.bounds;
    let [left, top] = space.point(bounds.x, bounds.y);
    let [right, bottom] = space.point(bounds.right(), bounds.bottom());

    let stream = appearance.into_stream(doc)?;
    let appearance_id = doc.add_object(stream);

    let (r, g, b, _) = style.stroke_color.to_normalized();
    let flags: i64 = if annotation.is_visible() { 4 } else { 4 | 2 };
    let mut dict = dictionary! {
        "Type" => "Annot",
        "Subtype" => subtype(annotation.kind()),
        "Rect" => reals(&[left, bottom, right, top]),
        "F" => flags,
        "P" => page_id,
        "NM" => Object::string_literal(annotation.id().to_string()),
        "C" => reals(&[r, g, b]),
        "AP" => dictionary! { "N" => appearance_id },
        EDITOR_KIND => Object::Name(annotation.kind().type_name().as_bytes().to_vec()),
        EDITOR_DATA => Object::String(editor_data(annotation)?.into_bytes(), StringFormat::Literal),
    };
    if style.opacity < 1.0 {
        dict.set("CA", Object::Real(style.opacity));
    }
    if let Some(author) = &annotation.metadata().author {
        dict.set("T", text_string(author));
    }
    if let Some(text) = annotation.kind().text() {
        dict.set("Contents", text_string(text));
    }

    add_kind_entries(&mut dict, &space, page_ids, annotation);

    Ok(doc.add_object(dict))
}

fn add_kind_entries(
    dict: &mut Dictionary,
    space: &PdfSpace,
    page_ids: &[ObjectId],
    annotation: &Annotation,
) {
    let style = annotation.style();
    let rect = annotation.bounding_box();

    match annotation.kind() {
        AnnotationKind::Freehand => {
            if let AnnotationGeometry::Freehand { points } = annotation.geometry() {
                let path: Vec<f32> = points.iter().flat_map(|p| space.point(p.x, p.y)).collect();
                dict.set("InkList", vec![Object::Array(reals(&path))]);
            }
            dict.set("BS", dictionary! { "W" => Object::Real(style.stroke_width) });
        }
        AnnotationKind::Highlight => {
            let [x1, y1] = space.point(rect.x, rect.y);
            let [x2, y2] = space.point(rect.right(), rect.bottom());
            dict.set("QuadPoints", reals(&[x1, y1, x2, y1, x1, y2, x2, y2]));
            if let Some(fill) = style.fill_color {
                let (r, g, b, _) = fill.to_normalized();
                dict.set("C", reals(&[r, g, b]));
            }
        }
        AnnotationKind::StickyNote { .. } => {
            dict.set("Name", "Comment");
            dict.set("Open", false);
        }
        AnnotationKind::FreeText { .. }
        | AnnotationKind::TextEdit { .. }
        | AnnotationKind::PageText { .. } => {
            let (r, g, b, _) = style.stroke_color.to_normalized();
            dict.set(
                "DA",
                Object::string_literal(format!("/Helv {} Tf {r} {g} {b} rg", style.font_size)),
            );
        }
        AnnotationKind::Rectangle => {
            dict.set("BS", dictionary! { "W" => Object::Real(style.stroke_width) });
            if let Some(fill) = style.fill_color {
                let (r, g, b, _) = fill.to_normalized();
                dict.set("IC", reals(&[r, g, b]));
            }
        }
        AnnotationKind::Link { target } => {
            dict.set("Border", reals(&[0.0, 0.0, style.stroke_width]));
            match target {
                LinkTarget::Uri(uri) => {
                    dict.set(
                        "A",
                        dictionary! {
                            "S" => "URI",
                            "URI" => Object::string_literal(uri.as_str()),
                        },
                    );
                }
                LinkTarget::Page(page) => {
                    if let Some(target_id) = page_ids.get(usize::from(*page)) {
                        dict.set(
                            "Dest",
                            vec![
                                Object::Reference(*target_id),
                                "XYZ".into(),
                                Object::Null,
                                Object::Null,
                                Object::Null,
                            ],
                        );
                    }
                }
            }
        }
        AnnotationKind::Stamp { .. }
        | AnnotationKind::Signature { .. }
        | AnnotationKind::Image { .. }
        | AnnotationKind::Watermark { .. } => {}
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Write `bytes` to a temporary sibling and rename it over `path`
pub fn write_atomically(path: &Path, bytes: &[u8], cancel: &CancellationToken) -> EditorResult<()> {
    let temp = temp_path(path);
    let write_error = |source| EditorError::Write { path: path.to_path_buf(), source };

    let result = (|| {
        let mut file = File::create(&temp).map_err(write_error)?;
        file.write_all(bytes).map_err(write_error)?;
        file.sync_all().map_err(write_error)?;
        cancel.check()?;
        fs::rename(&temp, path).map_err(write_error)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

/// Page entries for a freshly opened document, in file order
pub(crate) fn page_entries(doc: &Document) -> Vec<PageEntry> {
    doc.get_pages()
        .into_iter()
        .map(|(number, id)| {
            PageEntry::new(
                number,
                pdf_engine::media_box_size(doc, id),
                pdf_engine::page_rotation(doc, id),
            )
        })
        .collect()
}
