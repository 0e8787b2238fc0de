//! Appearance streams for exported annotations
//!
//! Every annotation is written with a normal appearance (`/AP /N`) form
//! XObject so any viewer draws it the way the editor does. The form's BBox is
//! the annotation's visual bounds; drawing happens in a local frame whose
//! origin is the bottom-left corner of those bounds. Resources are
//! self-contained: a base font, an ExtGState for opacity and image XObjects.

use crate::annotation::{
    Annotation, AnnotationGeometry, AnnotationKind, Color, ImagePayload, MarkContent, PageRect,
};
use crate::error::{EditorError, EditorResult};
use crate::fonts::{encode_text, StandardFont};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

/// Padding between a stamp border and its text
pub const STAMP_PADDING: f32 = 8.0;

/// Line height as a multiple of font size
pub const LINE_HEIGHT: f32 = 1.2;

const FONT_RESOURCE: &str = "F1";
const STATE_RESOURCE: &str = "GS0";
const IMAGE_RESOURCE: &str = "Im0";

/// Drawing for one annotation before it is attached to a document
#[derive(Debug)]
pub struct Appearance {
    /// Visual bounds in page space; becomes `/Rect` and the form BBox
    pub bounds: PageRect,
    operations: Vec<Operation>,
    font: Option<StandardFont>,
    opacity: Option<f32>,
    multiply: bool,
    image: Option<ImagePayload>,
}

impl Appearance {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Encode as a form XObject stream, adding image XObjects to `doc`
    pub fn into_stream(self, doc: &mut Document) -> EditorResult<Stream> {
        let mut resources = Dictionary::new();

        if let Some(font) = self.font {
            resources.set(
                "Font",
                dictionary! {
                    FONT_RESOURCE => dictionary! {
                        "Type" => "Font",
                        "Subtype" => "Type1",
                        "BaseFont" => font.base_font_name(),
                        "Encoding" => "WinAnsiEncoding",
                    },
                },
            );
        }

        if self.opacity.is_some() || self.multiply {
            let alpha = self.opacity.unwrap_or(1.0);
            let mut state = dictionary! {
                "Type" => "ExtGState",
                "CA" => alpha,
                "ca" => alpha,
            };
            if self.multiply {
                state.set("BM", "Multiply");
            }
            resources.set("ExtGState", dictionary! { STATE_RESOURCE => state });
        }

        if let Some(image) = &self.image {
            let image_id = add_image_xobject(doc, image)?;
            resources.set("XObject", dictionary! { IMAGE_RESOURCE => image_id });
        }

        let content = Content { operations: self.operations }
            .encode()
            .map_err(|err| EditorError::Serialize(err.to_string()))?;

        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(self.bounds.width),
                    Object::Real(self.bounds.height),
                ],
                "Resources" => resources,
            },
            content,
        );
        // Tiny streams are not worth compressing
        if stream.content.len() > 256 {
            stream.compress().map_err(|err| EditorError::Serialize(err.to_string()))?;
        }
        Ok(stream)
    }
}

/// Adds an RGB image XObject (with a DeviceGray soft mask when the image has
/// transparency) and returns its id.
pub fn add_image_xobject(doc: &mut Document, image: &ImagePayload) -> EditorResult<lopdf::ObjectId> {
    let pixels = image.rgba.chunks_exact(4);
    let rgb: Vec<u8> = pixels.clone().flat_map(|px| [px[0], px[1], px[2]]).collect();

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(image.width),
        "Height" => i64::from(image.height),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8_i64,
    };

    if image.has_alpha() {
        let alpha: Vec<u8> = pixels.map(|px| px[3]).collect();
        let mut mask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width),
                "Height" => i64::from(image.height),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8_i64,
            },
            alpha,
        );
        mask.compress().map_err(|err| EditorError::Serialize(err.to_string()))?;
        dict.set("SMask", doc.add_object(mask));
    }

    let mut stream = Stream::new(dict, rgb);
    stream.compress().map_err(|err| EditorError::Serialize(err.to_string()))?;
    Ok(doc.add_object(stream))
}

/// Maps page space (y down) into the form's local space (y up)
struct Frame {
    bounds: PageRect,
}

impl Frame {
    fn x(&self, x: f32) -> f32 {
        x - self.bounds.x
    }

    fn y(&self, y: f32) -> f32 {
        self.bounds.bottom() - y
    }

    /// `[x, y, w, h]` of a page-space rect, y at the local bottom edge
    fn rect(&self, rect: &PageRect) -> [f32; 4] {
        [self.x(rect.x), self.y(rect.bottom()), rect.width, rect.height]
    }
}

struct Ops(Vec<Operation>);

impl Ops {
    fn op(&mut self, operator: &str, operands: Vec<Object>) {
        self.0.push(Operation::new(operator, operands));
    }

    fn reals(values: &[f32]) -> Vec<Object> {
        values.iter().map(|v| Object::Real(*v)).collect()
    }

    fn stroke_color(&mut self, color: Color) {
        let (r, g, b, _) = color.to_normalized();
        self.op("RG", Self::reals(&[r, g, b]));
    }

    fn fill_color(&mut self, color: Color) {
        let (r, g, b, _) = color.to_normalized();
        self.op("rg", Self::reals(&[r, g, b]));
    }

    fn rect(&mut self, [x, y, w, h]: [f32; 4]) {
        self.op("re", Self::reals(&[x, y, w, h]));
    }

    fn text_line(&mut self, font_size: f32, x: f32, y: f32, text: &str) {
        self.op("BT", vec![]);
        self.op("Tf", vec![Object::Name(FONT_RESOURCE.into()), Object::Real(font_size)]);
        self.op("Td", Self::reals(&[x, y]));
        self.op("Tj", vec![Object::String(encode_text(text), StringFormat::Literal)]);
        self.op("ET", vec![]);
    }
}

/// Build the appearance of `annotation`
pub fn build_appearance(annotation: &Annotation) -> Appearance {
    let style = annotation.style();
    let bounds = annotation.visual_bounds();
    let frame = Frame { bounds };
    let rect = annotation.bounding_box();
    let local = frame.rect(&rect);
    let mut ops = Ops(Vec::new());
    let mut font = None;
    let mut image = None;
    let mut multiply = false;

    let mut opacity = (style.opacity < 1.0).then_some(style.opacity);
    ops.op("q", vec![]);
    if opacity.is_some() || matches!(annotation.kind(), AnnotationKind::Highlight) {
        ops.op("gs", vec![Object::Name(STATE_RESOURCE.into())]);
    }

    if style.rotation != 0.0 && matches!(annotation.geometry(), AnnotationGeometry::Rectangle { .. })
    {
        // Clockwise on screen is a negative angle in PDF's y-up space
        let (sin, cos) = (-style.rotation).to_radians().sin_cos();
        let cx = local[0] + local[2] / 2.0;
        let cy = local[1] + local[3] / 2.0;
        ops.op("cm", Ops::reals(&[1.0, 0.0, 0.0, 1.0, cx, cy]));
        ops.op("cm", Ops::reals(&[cos, sin, -sin, cos, 0.0, 0.0]));
        ops.op("cm", Ops::reals(&[1.0, 0.0, 0.0, 1.0, -cx, -cy]));
    }

    let [x, y, w, h] = local;
    let text_font = style.font;
    let fs = style.font_size;

    match annotation.kind() {
        AnnotationKind::Freehand => {
            if let AnnotationGeometry::Freehand { points } = annotation.geometry() {
                ops.stroke_color(style.stroke_color);
                ops.op("w", vec![Object::Real(style.stroke_width)]);
                ops.op("J", vec![Object::Integer(1)]);
                ops.op("j", vec![Object::Integer(1)]);
                for (i, point) in points.iter().enumerate() {
                    let operator = if i == 0 { "m" } else { "l" };
                    ops.op(operator, Ops::reals(&[frame.x(point.x), frame.y(point.y)]));
                }
                if points.len() == 1 {
                    ops.op("l", Ops::reals(&[frame.x(points[0].x), frame.y(points[0].y)]));
                }
                ops.op("S", vec![]);
            }
        }

        AnnotationKind::Highlight => {
            let fill = style.fill_color.unwrap_or(style.stroke_color);
            multiply = true;
            opacity = Some(style.opacity * f32::from(fill.a) / 255.0);
            ops.fill_color(fill);
            ops.rect(local);
            ops.op("f", vec![]);
        }

        AnnotationKind::StickyNote { .. } => {
            ops.fill_color(style.fill_color.unwrap_or(Color::NOTE_YELLOW));
            ops.stroke_color(Color::grey(110));
            ops.op("w", vec![Object::Real(1.0)]);
            ops.rect([x + 0.5, y + 0.5, w - 1.0, h - 1.0]);
            ops.op("B", vec![]);
            for line in 1..=3 {
                let ly = y + h - h * line as f32 / 4.0;
                ops.op("m", Ops::reals(&[x + w * 0.2, ly]));
                ops.op("l", Ops::reals(&[x + w * 0.8, ly]));
            }
            ops.op("S", vec![]);
        }

        AnnotationKind::Rectangle => {
            let inset = style.stroke_width / 2.0;
            ops.stroke_color(style.stroke_color);
            ops.op("w", vec![Object::Real(style.stroke_width)]);
            ops.rect([x + inset, y + inset, (w - style.stroke_width).max(0.0), (h - style.stroke_width).max(0.0)]);
            match style.fill_color {
                Some(fill) => {
                    ops.fill_color(fill);
                    ops.op("B", vec![]);
                }
                None => ops.op("S", vec![]),
            }
        }

        AnnotationKind::FreeText { text } => {
            font = Some(text_font);
            if let Some(fill) = style.fill_color {
                ops.fill_color(fill);
                ops.rect(local);
                ops.op("f", vec![]);
            }
            ops.fill_color(style.stroke_color);
            let mut baseline = y + h - 2.0 - text_font.ascent() * fs;
            for line in text.lines() {
                ops.text_line(fs, x + 2.0, baseline, line);
                baseline -= fs * LINE_HEIGHT;
            }
        }

        AnnotationKind::Stamp { mark: MarkContent::Text(text) } => {
            font = Some(text_font);
            let border = style.stroke_width;
            ops.stroke_color(style.stroke_color);
            ops.op("w", vec![Object::Real(border)]);
            ops.rect([x + border / 2.0, y + border / 2.0, w - border, h - border]);
            ops.op("S", vec![]);
            ops.fill_color(style.stroke_color);
            let tw = text_font.text_width(text, fs);
            let baseline = y + (h - (text_font.ascent() - text_font.descent()) * fs) / 2.0;
            ops.text_line(fs, x + (w - tw) / 2.0, baseline, text);
        }

        AnnotationKind::Watermark { mark: MarkContent::Text(text) } => {
            font = Some(text_font);
            ops.fill_color(style.stroke_color);
            let tw = text_font.text_width(text, fs);
            let baseline = y + (h - (text_font.ascent() - text_font.descent()) * fs) / 2.0;
            ops.text_line(fs, x + (w - tw) / 2.0, baseline, text);
        }

        AnnotationKind::Stamp { mark: MarkContent::Image(payload) }
        | AnnotationKind::Watermark { mark: MarkContent::Image(payload) }
        | AnnotationKind::Signature { image: payload }
        | AnnotationKind::Image { image: payload } => {
            image = Some(payload.clone());
            ops.op("cm", Ops::reals(&[w, 0.0, 0.0, h, x, y]));
            ops.op("Do", vec![Object::Name(IMAGE_RESOURCE.into())]);
        }

        AnnotationKind::Link { .. } => {
            if style.stroke_width > 0.0 {
                let inset = style.stroke_width / 2.0;
                ops.stroke_color(style.stroke_color);
                ops.op("w", vec![Object::Real(style.stroke_width)]);
                ops.rect([x + inset, y + inset, w - style.stroke_width, h - style.stroke_width]);
                ops.op("S", vec![]);
            }
        }

        AnnotationKind::TextEdit { replacement, .. } => {
            font = Some(text_font);
            ops.fill_color(style.fill_color.unwrap_or(Color::WHITE));
            ops.rect(local);
            ops.op("f", vec![]);
            ops.fill_color(style.stroke_color);
            ops.text_line(fs, x, y + text_font.descent() * fs, replacement);
        }

        AnnotationKind::PageText { text, .. } => {
            font = Some(text_font);
            ops.fill_color(style.stroke_color);
            ops.text_line(fs, x, y + text_font.descent() * fs, text);
        }
    }

    ops.op("Q", vec![]);

    Appearance { bounds, operations: ops.0, font, opacity, multiply, image }
}

/// Size of the box a single line of text occupies, from ascent to descent
pub fn text_box_size(font: StandardFont, font_size: f32, text: &str) -> (f32, f32) {
    (font.text_width(text, font_size), (font.ascent() + font.descent()) * font_size)
}

/// Size of a text stamp including border padding
pub fn stamp_box_size(font: StandardFont, font_size: f32, border: f32, text: &str) -> (f32, f32) {
    let (tw, th) = text_box_size(font, font_size, text);
    let pad = STAMP_PADDING + border;
    (tw + 2.0 * pad, th + 2.0 * pad)
}

/// Size of a multi-line free text box
pub fn free_text_box_size(font: StandardFont, font_size: f32, text: &str) -> (f32, f32) {
    let lines: Vec<&str> = text.lines().collect();
    let width = lines.iter().map(|l| font.text_width(l, font_size)).fold(0.0, f32::max);
    let count = lines.len().max(1) as f32;
    (width + 4.0, count * font_size * LINE_HEIGHT + 4.0)
}
