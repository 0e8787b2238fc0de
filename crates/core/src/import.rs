//! Lifting annotations out of an opened PDF
//!
//! Annotations the editor can represent are turned into model records and
//! removed from the page's `/Annots`, so the base document only keeps what
//! the editor never touches (form widgets, file attachments, popups of
//! foreign notes ...). Annotations written by this editor carry their full
//! record in `/EditorData` and come back exactly; foreign ones are mapped
//! field by field.

use crate::annotation::{
    Annotation, AnnotationGeometry, AnnotationKind, AnnotationStyle, Color, ImagePayload,
    LinkTarget, MarkContent, PageCoordinate, PageRect,
};
use crate::appearance::STAMP_PADDING;
use crate::canvas::NOTE_SIZE;
use crate::error::EditorResult;
use crate::export::{corrupt, EDITOR_DATA};
use crate::fonts::{decode_text, StandardFont};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;
use std::sync::Arc;

/// Lift the supported annotations of the page at `page_index`
///
/// `page_ids` lists every page in display order and resolves link
/// destinations.
pub(crate) fn lift_page(
    doc: &mut Document,
    page_index: usize,
    page_ids: &[ObjectId],
) -> EditorResult<Vec<Annotation>> {
    let Some(&page_id) = page_ids.get(page_index) else {
        return Ok(Vec::new());
    };

    let (items, array_id) = match doc.get_dictionary(page_id).map_err(corrupt)?.get(b"Annots") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => (items.clone(), Some(*id)),
            _ => return Ok(Vec::new()),
        },
        Ok(Object::Array(items)) => (items.clone(), None),
        _ => return Ok(Vec::new()),
    };

    let media_box = pdf_engine::media_box(doc, page_id);
    let mut lifted = Vec::new();
    let mut lifted_ids = HashSet::new();
    let mut kept = Vec::new();

    for item in items {
        let Object::Reference(id) = item else {
            kept.push(item);
            continue;
        };
        let Ok(dict) = doc.get_dictionary(id) else {
            kept.push(item);
            continue;
        };
        match lift(doc, dict, page_index as u16, media_box, page_ids) {
            Some(mut annotations) => {
                lifted.append(&mut annotations);
                lifted_ids.insert(id);
            }
            None => kept.push(item),
        }
    }

    if lifted_ids.is_empty() {
        return Ok(lifted);
    }

    kept.retain(|item| !is_popup_of(doc, item, &lifted_ids));
    tracing::debug!(page = page_index, lifted = lifted.len(), kept = kept.len(), "lifted annotations");

    match array_id {
        Some(id) if !kept.is_empty() => {
            doc.objects.insert(id, Object::Array(kept));
        }
        _ => {
            let page = doc.get_dictionary_mut(page_id).map_err(corrupt)?;
            if kept.is_empty() {
                page.remove(b"Annots");
            } else {
                page.set("Annots", kept);
            }
        }
    }
    Ok(lifted)
}

fn is_popup_of(doc: &Document, item: &Object, parents: &HashSet<ObjectId>) -> bool {
    let Ok(id) = item.as_reference() else {
        return false;
    };
    let Ok(dict) = doc.get_dictionary(id) else {
        return false;
    };
    let is_popup = dict.get(b"Subtype").and_then(Object::as_name).is_ok_and(|name| name == b"Popup");
    is_popup
        && dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .is_ok_and(|parent| parents.contains(&parent))
}

pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

pub(crate) fn get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|value| resolve(doc, value))
}

fn number(doc: &Document, object: &Object) -> Option<f32> {
    resolve(doc, object).as_float().ok()
}

fn numbers(doc: &Document, object: &Object) -> Option<Vec<f32>> {
    resolve(doc, object).as_array().ok()?.iter().map(|item| number(doc, item)).collect()
}

fn text(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match get(doc, dict, key)? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        _ => None,
    }
}

fn color(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<Color> {
    let values = numbers(doc, get(doc, dict, key)?)?;
    match values.as_slice() {
        [grey] => Some(Color::from_unit_rgb(*grey, *grey, *grey)),
        [r, g, b] => Some(Color::from_unit_rgb(*r, *g, *b)),
        [c, m, y, k] => Some(Color::from_unit_rgb(
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        )),
        _ => None,
    }
}

/// Converts PDF user space (y up, MediaBox origin) into page space
struct PageSpace {
    x0: f32,
    y1: f32,
}

impl PageSpace {
    fn point(&self, x: f32, y: f32) -> PageCoordinate {
        PageCoordinate::new(x - self.x0, self.y1 - y)
    }

    fn rect(&self, values: &[f32]) -> Option<PageRect> {
        let [a, b, c, d] = values else {
            return None;
        };
        Some(PageRect::from_corners(self.point(*a, *b), self.point(*c, *d)))
    }
}

fn border_width(doc: &Document, dict: &Dictionary) -> Option<f32> {
    if let Some(Object::Dictionary(bs)) = get(doc, dict, b"BS") {
        if let Some(width) = get(doc, bs, b"W").and_then(|w| number(doc, w)) {
            return Some(width);
        }
    }
    get(doc, dict, b"Border").and_then(|border| numbers(doc, border)).and_then(|b| b.get(2).copied())
}

/// Font size and colour from a default appearance string like
/// `/Helv 12 Tf 0 0 1 rg`
fn parse_default_appearance(da: &str) -> (Option<f32>, Option<Color>) {
    let tokens: Vec<&str> = da.split_whitespace().collect();
    let mut size = None;
    let mut fill = None;
    for (i, token) in tokens.iter().enumerate() {
        let operand = |back: usize| -> Option<f32> { tokens.get(i.checked_sub(back)?)?.parse().ok() };
        match *token {
            "Tf" => size = operand(1),
            "rg" => {
                if let (Some(r), Some(g), Some(b)) = (operand(3), operand(2), operand(1)) {
                    fill = Some(Color::from_unit_rgb(r, g, b));
                }
            }
            "g" => fill = operand(1).map(|v| Color::from_unit_rgb(v, v, v)),
            _ => {}
        }
    }
    (size.filter(|s| *s > 0.0), fill)
}

/// Display index of the page a destination points at
fn destination_page(doc: &Document, dest: &Object, page_ids: &[ObjectId]) -> Option<u16> {
    let target = resolve(doc, dest).as_array().ok()?.first()?;
    let target_id = target.as_reference().ok()?;
    page_ids.iter().position(|id| *id == target_id).map(|index| index as u16)
}

fn link_target(doc: &Document, dict: &Dictionary, page_ids: &[ObjectId]) -> Option<LinkTarget> {
    if let Some(dest) = get(doc, dict, b"Dest") {
        return destination_page(doc, dest, page_ids).map(LinkTarget::Page);
    }
    let Some(Object::Dictionary(action)) = get(doc, dict, b"A") else {
        return None;
    };
    match get(doc, action, b"S").and_then(|s| s.as_name().ok())? {
        b"URI" => text(doc, action, b"URI").filter(|uri| !uri.is_empty()).map(LinkTarget::Uri),
        b"GoTo" => {
            destination_page(doc, get(doc, action, b"D")?, page_ids).map(LinkTarget::Page)
        }
        _ => None,
    }
}

/// Model records for one annotation dictionary, or `None` to leave it in the
/// document
fn lift(
    doc: &Document,
    dict: &Dictionary,
    page_index: u16,
    media_box: [f32; 4],
    page_ids: &[ObjectId],
) -> Option<Vec<Annotation>> {
    if let Some(Object::String(json, _)) = get(doc, dict, EDITOR_DATA.as_bytes()) {
        match restore(doc, dict, json, page_index, page_ids) {
            Some(annotation) => return Some(vec![annotation]),
            None => tracing::warn!(page = page_index, "unreadable editor annotation, importing as foreign"),
        }
    }

    let space = PageSpace { x0: media_box[0], y1: media_box[3] };
    let subtype = get(doc, dict, b"Subtype")?.as_name().ok()?;
    let rect = get(doc, dict, b"Rect").and_then(|r| numbers(doc, r)).and_then(|r| space.rect(&r));
    let stroke = color(doc, dict, b"C");
    let opacity = get(doc, dict, b"CA").and_then(|v| number(doc, v)).unwrap_or(1.0);
    let contents = text(doc, dict, b"Contents").unwrap_or_default();
    let hidden = get(doc, dict, b"F").and_then(|f| f.as_i64().ok()).is_some_and(|f| f & 2 != 0);

    let make = |kind: AnnotationKind, geometry: AnnotationGeometry, style: AnnotationStyle| {
        let mut annotation = Annotation::new(page_index, kind, geometry, style.with_opacity(opacity));
        if let Some(author) = text(doc, dict, b"T") {
            annotation = annotation.with_author(author);
        }
        annotation.set_visible(!hidden);
        annotation
    };

    let annotations = match subtype {
        b"Ink" => {
            let strokes = get(doc, dict, b"InkList")?.as_array().ok()?;
            let style = AnnotationStyle {
                stroke_color: stroke.unwrap_or(Color::BLACK),
                stroke_width: border_width(doc, dict).unwrap_or(1.0),
                ..AnnotationStyle::new()
            };
            let records: Vec<Annotation> = strokes
                .iter()
                .filter_map(|stroke| numbers(doc, stroke))
                .filter(|values| values.len() >= 2)
                .map(|values| {
                    let points =
                        values.chunks_exact(2).map(|p| space.point(p[0], p[1])).collect();
                    make(AnnotationKind::Freehand, AnnotationGeometry::Freehand { points }, style.clone())
                })
                .collect();
            if records.is_empty() {
                return None;
            }
            records
        }
        b"Highlight" => {
            let base = stroke.unwrap_or(Color::YELLOW);
            let style = AnnotationStyle {
                stroke_color: base,
                fill_color: Some(Color { a: 80, ..base }),
                ..AnnotationStyle::yellow_highlight()
            };
            vec![make(AnnotationKind::Highlight, AnnotationGeometry::rect(rect?), style)]
        }
        b"Text" => {
            let rect = rect?;
            let style = AnnotationStyle {
                fill_color: Some(stroke.unwrap_or(Color::NOTE_YELLOW)),
                ..AnnotationStyle::new()
            };
            let note = PageRect::new(rect.x, rect.y, NOTE_SIZE, NOTE_SIZE);
            vec![make(AnnotationKind::StickyNote { text: contents }, AnnotationGeometry::rect(note), style)]
        }
        b"FreeText" => {
            let da = text(doc, dict, b"DA").unwrap_or_default();
            let (size, fill) = parse_default_appearance(&da);
            let style = AnnotationStyle {
                stroke_color: fill.unwrap_or(Color::BLACK),
                font_size: size.unwrap_or(12.0),
                ..AnnotationStyle::new()
            };
            vec![make(AnnotationKind::FreeText { text: contents }, AnnotationGeometry::rect(rect?), style)]
        }
        b"Square" => {
            let style = AnnotationStyle {
                stroke_color: stroke.unwrap_or(Color::BLACK),
                stroke_width: border_width(doc, dict).unwrap_or(1.0),
                fill_color: color(doc, dict, b"IC"),
                ..AnnotationStyle::new()
            };
            vec![make(AnnotationKind::Rectangle, AnnotationGeometry::rect(rect?), style)]
        }
        b"Stamp" => {
            let rect = rect?;
            let label = if contents.is_empty() {
                get(doc, dict, b"Name")
                    .and_then(|name| name.as_name().ok())
                    .map(|name| String::from_utf8_lossy(name).to_uppercase())
                    .unwrap_or_else(|| "STAMP".to_owned())
            } else {
                contents
            };
            let border = 2.5;
            let font = StandardFont::Helvetica;
            let fit = (rect.height - 2.0 * (STAMP_PADDING + border)) / (font.ascent() + font.descent());
            let style = AnnotationStyle {
                stroke_color: stroke.unwrap_or(Color::RED),
                stroke_width: border,
                font_size: fit.clamp(8.0, 120.0),
                ..AnnotationStyle::new()
            };
            let kind = AnnotationKind::Stamp { mark: MarkContent::Text(label) };
            vec![make(kind, AnnotationGeometry::rect(rect), style)]
        }
        b"Watermark" => {
            let rect = rect?;
            let label = if contents.is_empty() { "WATERMARK".to_owned() } else { contents };
            let style = AnnotationStyle {
                stroke_color: stroke.unwrap_or(Color::grey(128)),
                font_size: (rect.height * 0.6).clamp(8.0, 200.0),
                ..AnnotationStyle::new()
            };
            let kind = AnnotationKind::Watermark { mark: MarkContent::Text(label) };
            vec![make(kind, AnnotationGeometry::rect(rect), style)]
        }
        b"Link" => {
            let target = link_target(doc, dict, page_ids)?;
            let style = AnnotationStyle {
                stroke_color: stroke.unwrap_or(Color::LINK_BLUE),
                stroke_width: border_width(doc, dict).unwrap_or(0.0),
                ..AnnotationStyle::new()
            };
            vec![make(AnnotationKind::Link { target }, AnnotationGeometry::rect(rect?), style)]
        }
        _ => return None,
    };
    Some(annotations)
}

/// Rebuild an editor-written annotation from its `/EditorData` record
fn restore(
    doc: &Document,
    dict: &Dictionary,
    json: &[u8],
    page_index: u16,
    page_ids: &[ObjectId],
) -> Option<Annotation> {
    let mut annotation: Annotation = serde_json::from_slice(json).ok()?;
    annotation.set_page_index(page_index);

    if let Some(image) = annotation.kind().image() {
        if image.rgba.is_empty() {
            let recovered = appearance_image(doc, dict)?;
            let kind = with_image(annotation.kind(), recovered);
            annotation.set_kind(kind);
        }
    }

    // Page links follow the destination page, which may have moved since
    if let AnnotationKind::Link { target: LinkTarget::Page(_) } = annotation.kind() {
        if let Some(LinkTarget::Page(page)) = link_target(doc, dict, page_ids) {
            annotation.set_kind(AnnotationKind::Link { target: LinkTarget::Page(page) });
        }
    }
    Some(annotation)
}

fn with_image(kind: &AnnotationKind, image: ImagePayload) -> AnnotationKind {
    match kind {
        AnnotationKind::Signature { .. } => AnnotationKind::Signature { image },
        AnnotationKind::Stamp { .. } => AnnotationKind::Stamp { mark: MarkContent::Image(image) },
        AnnotationKind::Watermark { .. } => {
            AnnotationKind::Watermark { mark: MarkContent::Image(image) }
        }
        _ => AnnotationKind::Image { image },
    }
}

fn stream_bytes(stream: &lopdf::Stream) -> Option<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

/// Pixels of the `/Im0` image in the normal appearance, with its soft mask
fn appearance_image(doc: &Document, dict: &Dictionary) -> Option<ImagePayload> {
    let Some(Object::Dictionary(ap)) = get(doc, dict, b"AP") else {
        return None;
    };
    let form = get(doc, ap, b"N")?.as_stream().ok()?;
    let Some(Object::Dictionary(resources)) = get(doc, &form.dict, b"Resources") else {
        return None;
    };
    let Some(Object::Dictionary(xobjects)) = get(doc, resources, b"XObject") else {
        return None;
    };
    let image = get(doc, xobjects, b"Im0")?.as_stream().ok()?;

    let width = u32::try_from(get(doc, &image.dict, b"Width")?.as_i64().ok()?).ok()?;
    let height = u32::try_from(get(doc, &image.dict, b"Height")?.as_i64().ok()?).ok()?;
    let pixels = (width as usize).checked_mul(height as usize).filter(|&p| p > 0)?;
    let rgb = stream_bytes(image)?;
    if rgb.len() < pixels.checked_mul(3)? {
        return None;
    }

    let alpha = get(doc, &image.dict, b"SMask")
        .and_then(|mask| mask.as_stream().ok())
        .and_then(stream_bytes)
        .filter(|mask| mask.len() >= pixels);

    let mut rgba = Vec::with_capacity(pixels * 4);
    for i in 0..pixels {
        rgba.extend_from_slice(&rgb[i * 3..i * 3 + 3]);
        rgba.push(alpha.as_ref().map_or(255, |mask| mask[i]));
    }
    Some(ImagePayload { width, height, rgba: Arc::new(rgba) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationCollection;
    use crate::cancel::CancellationToken;
    use crate::command::DocumentState;
    use crate::export::{page_entries, ExportSnapshot};
    use lopdf::{dictionary, Stream};
    use pretty_assertions::assert_eq;

    fn reals(values: &[f32]) -> Vec<Object> {
        values.iter().map(|v| Object::Real(*v)).collect()
    }

    /// One-page document whose page carries the given annotation dictionaries
    fn document_with(annots: Vec<Dictionary>) -> (Document, Vec<ObjectId>) {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => reals(&[0.0, 0.0, 600.0, 800.0]),
            "Contents" => content_id,
        });
        let refs: Vec<Object> =
            annots.into_iter().map(|a| Object::Reference(doc.add_object(a))).collect();
        doc.get_dictionary_mut(page_id).unwrap().set("Annots", refs);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1_i64,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        (doc, vec![page_id])
    }

    fn annots_len(doc: &Document, page_id: ObjectId) -> usize {
        doc.get_dictionary(page_id)
            .unwrap()
            .get(b"Annots")
            .map(|a| a.as_array().unwrap().len())
            .unwrap_or(0)
    }

    fn image_appearance(width: i64, height: i64, rgb: Vec<u8>) -> (Document, Dictionary) {
        let mut doc = Document::with_version("1.7");
        let image = doc.add_object(Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Image", "Width" => width, "Height" => height },
            rgb,
        ));
        let form = doc.add_object(Stream::new(
            dictionary! { "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => image } } },
            b"q Q".to_vec(),
        ));
        (doc, dictionary! { "AP" => dictionary! { "N" => form } })
    }

    #[test]
    fn test_appearance_image_reads_rgb_pixels() {
        let (doc, annot) = image_appearance(2, 1, vec![255, 0, 0, 0, 0, 255]);
        let image = appearance_image(&doc, &annot).unwrap();

        assert_eq!((image.width, image.height), (2, 1));
        assert_eq!(image.rgba.as_slice(), &[255, 0, 0, 255, 0, 0, 255, 255]);
    }

    #[test]
    fn test_appearance_image_rejects_bad_sizes() {
        for (width, height) in [(-1, 4), (4, -1), (0, 4), (i64::from(u32::MAX), i64::from(u32::MAX))] {
            let (doc, annot) = image_appearance(width, height, vec![0; 48]);
            assert!(appearance_image(&doc, &annot).is_none(), "{width}x{height} should be rejected");
        }
    }

    #[test]
    fn test_foreign_ink_becomes_one_stroke_per_path() {
        let (mut doc, ids) = document_with(vec![dictionary! {
            "Type" => "Annot",
            "Subtype" => "Ink",
            "Rect" => reals(&[0.0, 0.0, 100.0, 100.0]),
            "C" => reals(&[1.0, 0.0, 0.0]),
            "InkList" => vec![
                Object::Array(reals(&[10.0, 790.0, 20.0, 780.0])),
                Object::Array(reals(&[50.0, 700.0, 60.0, 700.0, 70.0, 690.0])),
            ],
            "BS" => dictionary! { "W" => 3_i64 },
        }]);

        let lifted = lift_page(&mut doc, 0, &ids).unwrap();

        assert_eq!(lifted.len(), 2);
        assert_eq!(lifted[0].style().stroke_color, Color::RED);
        assert_eq!(lifted[0].style().stroke_width, 3.0);
        let AnnotationGeometry::Freehand { points } = lifted[0].geometry() else {
            panic!("expected freehand geometry");
        };
        assert_eq!(points[0], PageCoordinate::new(10.0, 10.0));
        assert_eq!(annots_len(&doc, ids[0]), 0);
    }

    #[test]
    fn test_widgets_and_unrelated_popups_stay() {
        let (mut doc, ids) = document_with(vec![
            dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "Rect" => reals(&[0.0, 0.0, 10.0, 10.0]),
            },
            dictionary! {
                "Type" => "Annot",
                "Subtype" => "Square",
                "Rect" => reals(&[100.0, 600.0, 200.0, 700.0]),
                "IC" => reals(&[0.0, 0.0, 1.0]),
            },
        ]);

        let lifted = lift_page(&mut doc, 0, &ids).unwrap();

        assert_eq!(lifted.len(), 1);
        assert_eq!(lifted[0].bounding_box(), PageRect::new(100.0, 100.0, 100.0, 100.0));
        assert_eq!(lifted[0].style().fill_color, Some(Color::BLUE));
        assert_eq!(annots_len(&doc, ids[0]), 1);
    }

    #[test]
    fn test_popup_of_lifted_note_is_removed() {
        let (mut doc, ids) = document_with(vec![dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "Rect" => reals(&[20.0, 760.0, 40.0, 780.0]),
            "Contents" => Object::string_literal("remember"),
            "T" => Object::string_literal("Ada"),
        }]);
        let note_ref = doc.get_dictionary(ids[0]).unwrap().get(b"Annots").unwrap().as_array().unwrap()[0].clone();
        let popup = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Popup",
            "Parent" => note_ref,
            "Rect" => reals(&[0.0, 0.0, 1.0, 1.0]),
        });
        let page = doc.get_dictionary_mut(ids[0]).unwrap();
        let mut annots = page.get(b"Annots").unwrap().as_array().unwrap().clone();
        annots.push(Object::Reference(popup));
        page.set("Annots", annots);

        let lifted = lift_page(&mut doc, 0, &ids).unwrap();

        assert_eq!(lifted.len(), 1);
        assert_eq!(lifted[0].kind(), &AnnotationKind::StickyNote { text: "remember".into() });
        assert_eq!(lifted[0].metadata().author.as_deref(), Some("Ada"));
        assert_eq!(lifted[0].bounding_box(), PageRect::new(20.0, 20.0, NOTE_SIZE, NOTE_SIZE));
        assert_eq!(annots_len(&doc, ids[0]), 0);
    }

    #[test]
    fn test_free_text_reads_default_appearance() {
        let (mut doc, ids) = document_with(vec![dictionary! {
            "Type" => "Annot",
            "Subtype" => "FreeText",
            "Rect" => reals(&[10.0, 10.0, 200.0, 40.0]),
            "Contents" => Object::string_literal("hello"),
            "DA" => Object::string_literal("/Helv 14 Tf 0 0 1 rg"),
        }]);

        let lifted = lift_page(&mut doc, 0, &ids).unwrap();

        assert_eq!(lifted[0].style().font_size, 14.0);
        assert_eq!(lifted[0].style().stroke_color, Color::BLUE);
    }

    #[test]
    fn test_named_destination_links_are_left_alone() {
        let (mut doc, ids) = document_with(vec![dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => reals(&[10.0, 10.0, 200.0, 40.0]),
            "Dest" => Object::string_literal("chapter1"),
        }]);

        let lifted = lift_page(&mut doc, 0, &ids).unwrap();

        assert!(lifted.is_empty());
        assert_eq!(annots_len(&doc, ids[0]), 1);
    }

    #[test]
    fn test_uri_link_is_lifted() {
        let (mut doc, ids) = document_with(vec![dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => reals(&[10.0, 10.0, 200.0, 40.0]),
            "A" => dictionary! { "S" => "URI", "URI" => Object::string_literal("https://example.com") },
        }]);

        let lifted = lift_page(&mut doc, 0, &ids).unwrap();

        assert_eq!(
            lifted[0].kind(),
            &AnnotationKind::Link { target: LinkTarget::Uri("https://example.com".into()) }
        );
    }

    #[test]
    fn test_editor_annotations_round_trip_through_export() {
        let (doc, _) = document_with(Vec::new());
        let pages = page_entries(&doc);
        let mut annotations = AnnotationCollection::new();

        let image = ImagePayload {
            width: 2,
            height: 1,
            rgba: Arc::new(vec![255, 0, 0, 255, 0, 0, 255, 128]),
        };
        let signature = Annotation::new(
            0,
            AnnotationKind::Signature { image },
            AnnotationGeometry::rect(PageRect::new(300.0, 600.0, 80.0, 40.0)),
            AnnotationStyle::new(),
        )
        .with_author("Grace");
        let stamp = Annotation::new(
            0,
            AnnotationKind::Stamp { mark: MarkContent::Text("APPROVED".into()) },
            AnnotationGeometry::rect(PageRect::new(100.0, 100.0, 180.0, 60.0)),
            AnnotationStyle::red_markup().with_rotation(-20.0).with_opacity(0.85),
        );
        annotations.add(signature.clone());
        annotations.add(stamp.clone());

        let snapshot = ExportSnapshot {
            base: Arc::new(doc),
            original_bytes: Arc::new(Vec::new()),
            state: DocumentState::new(pages, annotations),
            unmodified: false,
        };
        let bytes = snapshot.to_bytes(&CancellationToken::new()).unwrap();
        let mut reopened = Document::load_mem(&bytes).unwrap();
        let ids: Vec<ObjectId> = reopened.get_pages().into_values().collect();

        let mut lifted = lift_page(&mut reopened, 0, &ids).unwrap();
        lifted.sort_by_key(|a| a.id() != signature.id());

        assert_eq!(lifted, vec![signature, stamp]);
        assert_eq!(annots_len(&reopened, ids[0]), 0);
    }
}
