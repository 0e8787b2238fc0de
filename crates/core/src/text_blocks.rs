//! Positioned text runs read from page content streams
//!
//! Only simple fonts are decoded; runs drawn with composite (Type0) fonts
//! are skipped since their bytes mean nothing without a ToUnicode map.
//! Widths use the closest standard-14 metrics, which is what the cover box
//! of a text edit needs, not an exact glyph outline.
//!
//! A drag with the Select Text tool becomes a [`TextSelection`]; highlighting
//! it adds one highlight per line of selected runs in a single step.

use crate::annotation::{
    Annotation, AnnotationGeometry, AnnotationKind, AnnotationStyle, Color, PageCoordinate, PageRect,
};
use crate::error::{EditorError, EditorResult};
use crate::export::corrupt;
use crate::fonts::{decode_text, StandardFont};
use crate::import::{get, resolve};
use crate::session::EditSession;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

/// Padding added around a block when it is covered by a text edit
const COVER_PADDING: f32 = 1.0;

/// Runs share a line when their centres are closer than this fraction of
/// the average run height
const LINE_TOLERANCE: f32 = 0.5;

/// One run of text as drawn on the page
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    /// Page space, from ascent to descent
    pub rect: PageRect,
    /// Effective size after the text and graphics matrices
    pub font_size: f32,
    pub font: StandardFont,
}

impl TextBlock {
    pub fn baseline(&self) -> f32 {
        self.rect.y + self.font.ascent() * self.font_size
    }
}

/// Text runs of the page at display index `page_index`, in drawing order
pub fn text_blocks(session: &EditSession, page_index: usize) -> EditorResult<Vec<TextBlock>> {
    let entry = session.page(page_index)?;
    let doc = session.base_document();
    let page_id = *doc
        .get_pages()
        .get(&entry.source)
        .ok_or_else(|| EditorError::CorruptPdf(format!("page {} is missing", entry.source)))?;
    page_text_blocks(doc, page_id)
}

/// Block under `point`, topmost first
pub fn block_at<'a>(blocks: &'a [TextBlock], point: &PageCoordinate) -> Option<&'a TextBlock> {
    blocks.iter().rev().find(|block| block.rect.contains(point, 0.0))
}

/// A text edit covering `block`, pre-filled with its text
pub fn text_edit_for(page_index: usize, block: &TextBlock) -> Annotation {
    let r = block.rect;
    let cover = PageRect::new(
        r.x - COVER_PADDING,
        r.y - COVER_PADDING,
        r.width + 2.0 * COVER_PADDING,
        r.height + 2.0 * COVER_PADDING,
    );
    let style = AnnotationStyle {
        fill_color: Some(Color::WHITE),
        font: block.font,
        ..AnnotationStyle::new().with_font_size(block.font_size)
    };
    Annotation::new(
        page_index as u16,
        AnnotationKind::TextEdit { original: block.text.clone(), replacement: block.text.clone() },
        AnnotationGeometry::rect(cover),
        style,
    )
}

/// Text runs picked on one page by a Select Text drag
#[derive(Debug, Clone, PartialEq)]
pub struct TextSelection {
    pub page_index: usize,
    /// Reading order: top to bottom, then left to right
    pub blocks: Vec<TextBlock>,
}

impl TextSelection {
    /// Runs of `blocks` touched by `area`; `None` when there are none
    pub fn from_area(page_index: usize, blocks: &[TextBlock], area: &PageRect) -> Option<Self> {
        let touched: Vec<&TextBlock> = blocks.iter().filter(|b| b.rect.intersects(area)).collect();
        let rects: Vec<PageRect> = touched.iter().map(|b| b.rect).collect();
        let blocks: Vec<TextBlock> =
            line_groups(&rects).into_iter().flatten().map(|i| touched[i].clone()).collect();
        if blocks.is_empty() {
            None
        } else {
            Some(Self { page_index, blocks })
        }
    }

    /// Selected text, runs of a line joined by spaces
    pub fn text(&self) -> String {
        let rects: Vec<PageRect> = self.blocks.iter().map(|b| b.rect).collect();
        line_groups(&rects)
            .into_iter()
            .map(|line| line.into_iter().map(|i| self.blocks[i].text.as_str()).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One box per line of selected runs
    pub fn line_rects(&self) -> Vec<PageRect> {
        merge_by_line(&self.blocks.iter().map(|b| b.rect).collect::<Vec<_>>())
    }

    /// Highlight annotations covering the selection, one per line
    pub fn highlights(&self, style: &AnnotationStyle) -> Vec<Annotation> {
        self.line_rects()
            .into_iter()
            .map(|rect| {
                Annotation::new(
                    self.page_index as u16,
                    AnnotationKind::Highlight,
                    AnnotationGeometry::rect(rect),
                    style.clone(),
                )
            })
            .collect()
    }
}

/// Add the selection's highlights as one undo step; returns how many
pub fn highlight_selection(
    session: &mut EditSession,
    selection: &TextSelection,
    style: &AnnotationStyle,
) -> EditorResult<usize> {
    session.page(selection.page_index)?;
    let highlights = selection.highlights(style);
    if highlights.is_empty() {
        return Err(EditorError::invalid("no text selected"));
    }
    let count = highlights.len();
    session.add_annotations(highlights)?;
    tracing::debug!(page = selection.page_index, lines = count, "highlighted selection");
    Ok(count)
}

/// Join rectangles sitting on the same line into one box per line, top to
/// bottom
pub fn merge_by_line(rects: &[PageRect]) -> Vec<PageRect> {
    line_groups(rects)
        .into_iter()
        .filter_map(|line| line.into_iter().map(|i| rects[i]).reduce(|a, b| a.union(&b)))
        .collect()
}

/// Indices of `rects` grouped into lines, top to bottom, each left to right
fn line_groups(rects: &[PageRect]) -> Vec<Vec<usize>> {
    if rects.is_empty() {
        return Vec::new();
    }
    let tolerance = rects.iter().map(|r| r.height).sum::<f32>() / rects.len() as f32 * LINE_TOLERANCE;
    let mut order: Vec<usize> = (0..rects.len()).collect();
    order.sort_by(|&a, &b| rects[a].y.total_cmp(&rects[b].y).then(rects[a].x.total_cmp(&rects[b].x)));

    let mut lines: Vec<Vec<usize>> = Vec::new();
    // Centre of the first run of the current line
    let mut anchor = 0.0;
    for index in order {
        let center = rects[index].center().y;
        match lines.last_mut() {
            Some(line) if (center - anchor).abs() < tolerance => line.push(index),
            _ => {
                anchor = center;
                lines.push(vec![index]);
            }
        }
    }
    for line in &mut lines {
        line.sort_by(|&a, &b| rects[a].x.total_cmp(&rects[b].x));
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self` applied first, then `other`
    fn then(self, other: Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values: Vec<f32> = operands.iter().filter_map(|o| o.as_float().ok()).collect();
        <[f32; 6]>::try_from(values).ok().map(Matrix)
    }

    fn x_scale(&self) -> f32 {
        self.0[0].hypot(self.0[1])
    }

    fn y_scale(&self) -> f32 {
        self.0[2].hypot(self.0[3])
    }
}

#[derive(Debug, Clone, Copy)]
struct FontInfo {
    font: StandardFont,
    composite: bool,
}

#[derive(Debug, Clone)]
struct TextState {
    ctm: Matrix,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font: Option<FontInfo>,
    font_size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            font: None,
            font_size: 0.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).then(self.line_matrix);
        self.text_matrix = self.line_matrix;
    }
}

struct Extractor {
    fonts: HashMap<Vec<u8>, FontInfo>,
    media_box: [f32; 4],
    state: TextState,
    saved: Vec<TextState>,
    blocks: Vec<TextBlock>,
    /// Block still being extended by runs on the same line
    open_block: Option<usize>,
}

impl Extractor {
    fn show(&mut self, bytes: &[u8]) {
        let Some(info) = self.state.font else { return };
        if info.composite || self.state.font_size <= 0.0 {
            return;
        }
        let text = decode_text(bytes);
        let fs = self.state.font_size;

        let mut advance = 0.0;
        for ch in text.chars() {
            advance += f32::from(info.font.char_width(ch)) / 1000.0 * fs + self.state.char_spacing;
            if ch == ' ' {
                advance += self.state.word_spacing;
            }
        }

        let m = self.state.text_matrix.then(self.state.ctm);
        let size = fs * m.y_scale();
        let width = advance * m.x_scale();
        let x = m.0[4] - self.media_box[0];
        let baseline = self.media_box[3] - m.0[5];
        self.push_run(text, x, baseline, width, size, info.font);

        self.state.text_matrix = Matrix::translate(advance, 0.0).then(self.state.text_matrix);
    }

    /// Kerning from a `TJ` array, in thousandths of an em
    fn adjust(&mut self, amount: f32) {
        let shift = -amount / 1000.0 * self.state.font_size;
        self.state.text_matrix = Matrix::translate(shift, 0.0).then(self.state.text_matrix);
    }

    fn push_run(&mut self, text: String, x: f32, baseline: f32, width: f32, size: f32, font: StandardFont) {
        if text.trim().is_empty() && self.open_block.is_none() {
            return;
        }
        let ascent = font.ascent() * size;
        let height = (font.ascent() + font.descent()) * size;

        if let Some(block) = self.open_block.and_then(|index| self.blocks.get_mut(index)) {
            let same_line = (block.baseline() - baseline).abs() < 0.5 && (block.font_size - size).abs() < 0.5;
            let gap = x - block.rect.right();
            if same_line && gap > -size && gap < size * 0.5 {
                if gap > size * 0.15 && !block.text.ends_with(' ') && !text.starts_with(' ') {
                    block.text.push(' ');
                }
                block.text.push_str(&text);
                block.rect.width = (x + width - block.rect.x).max(block.rect.width);
                return;
            }
        }

        if text.trim().is_empty() {
            return;
        }
        self.blocks.push(TextBlock {
            text,
            rect: PageRect::new(x, baseline - ascent, width, height),
            font_size: size,
            font,
        });
        self.open_block = Some(self.blocks.len() - 1);
    }

    fn run(&mut self, content: &Content) {
        for operation in &content.operations {
            let operands = &operation.operands;
            let float = |i: usize| operands.get(i).and_then(|o| o.as_float().ok());

            match operation.operator.as_str() {
                "q" => self.saved.push(self.state.clone()),
                "Q" => {
                    if let Some(state) = self.saved.pop() {
                        self.state = state;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.state.ctm = m.then(self.state.ctm);
                    }
                }
                "BT" => {
                    self.state.text_matrix = Matrix::IDENTITY;
                    self.state.line_matrix = Matrix::IDENTITY;
                }
                "ET" => self.open_block = None,
                "Tf" => {
                    let name = operands.first().and_then(|o| o.as_name().ok());
                    self.state.font = name.and_then(|n| self.fonts.get(n).copied());
                    self.state.font_size = float(1).unwrap_or(0.0);
                }
                "Tc" => self.state.char_spacing = float(0).unwrap_or(0.0),
                "Tw" => self.state.word_spacing = float(0).unwrap_or(0.0),
                "TL" => self.state.leading = float(0).unwrap_or(0.0),
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.state.text_matrix = m;
                        self.state.line_matrix = m;
                        self.open_block = None;
                    }
                }
                "Td" => {
                    if let (Some(tx), Some(ty)) = (float(0), float(1)) {
                        self.state.move_line(tx, ty);
                    }
                }
                "TD" => {
                    if let (Some(tx), Some(ty)) = (float(0), float(1)) {
                        self.state.leading = -ty;
                        self.state.move_line(tx, ty);
                    }
                }
                "T*" => self.state.move_line(0.0, -self.state.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes),
                                other => {
                                    if let Ok(amount) = other.as_float() {
                                        self.adjust(amount);
                                    }
                                }
                            }
                        }
                    }
                }
                "'" => {
                    self.state.move_line(0.0, -self.state.leading);
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes);
                    }
                }
                "\"" => {
                    self.state.word_spacing = float(0).unwrap_or(self.state.word_spacing);
                    self.state.char_spacing = float(1).unwrap_or(self.state.char_spacing);
                    self.state.move_line(0.0, -self.state.leading);
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(bytes);
                    }
                }
                _ => {}
            }
        }
    }
}

fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontInfo> {
    let resources = pdf_engine::inherited_attribute(doc, page_id, b"Resources")
        .map(|object| resolve(doc, object))
        .and_then(|object| object.as_dict().ok());
    let Some(fonts) = resources.and_then(|r| get(doc, r, b"Font")).and_then(|f| f.as_dict().ok()) else {
        return HashMap::new();
    };

    fonts
        .iter()
        .filter_map(|(name, font)| {
            let font: &Dictionary = resolve(doc, font).as_dict().ok()?;
            let base = get(doc, font, b"BaseFont").and_then(|b| b.as_name().ok()).unwrap_or(b"Helvetica".as_slice());
            let composite = get(doc, font, b"Subtype").and_then(|s| s.as_name().ok()) == Some(b"Type0".as_slice());
            let info = FontInfo {
                font: StandardFont::from_base_font_name(&String::from_utf8_lossy(base)),
                composite,
            };
            Some((name.clone(), info))
        })
        .collect()
}

pub(crate) fn page_text_blocks(doc: &Document, page_id: ObjectId) -> EditorResult<Vec<TextBlock>> {
    let bytes = doc.get_page_content(page_id).map_err(corrupt)?;
    let content = Content::decode(&bytes).map_err(corrupt)?;

    let mut extractor = Extractor {
        fonts: page_fonts(doc, page_id),
        media_box: pdf_engine::media_box(doc, page_id),
        state: TextState::new(),
        saved: Vec::new(),
        blocks: Vec::new(),
        open_block: None,
    };
    extractor.run(&content);
    tracing::debug!(?page_id, blocks = extractor.blocks.len(), "extracted text blocks");
    Ok(extractor.blocks)
}
