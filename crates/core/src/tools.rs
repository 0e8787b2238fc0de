//! Drawing tools and in-place text editing
//!
//! A [`ToolGesture`] follows one press, drag and release on a page and turns
//! it into an annotation. Tools that need more input (note text, a link
//! target, an image file) finish with a prompt instead, and the window
//! completes them with [`note_at`], [`text_box_at`] or [`image_at`].

use crate::annotation::{
    Annotation, AnnotationGeometry, AnnotationId, AnnotationKind, AnnotationStyle, Color,
    ImagePayload, PageCoordinate, PageRect,
};
use crate::appearance::free_text_box_size;
use crate::canvas::NOTE_SIZE;
use crate::error::{EditorError, EditorResult};
use crate::session::EditSession;
use pdf_engine::PageSize;

/// Smallest drag, per side in points, that counts as a rectangle
pub const MIN_DRAG_SIZE: f32 = 4.0;

/// Longest side of a placed image in points
pub const MAX_IMAGE_SIDE: f32 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Select,
    /// Drag over page text, then highlight it
    SelectText,
    Pen,
    Highlight,
    Note,
    Text,
    Rectangle,
    Eraser,
    Link,
    Image,
    /// Double-click text runs to replace them
    EditText,
}

impl Tool {
    pub const ALL: [Tool; 11] = [
        Tool::Select,
        Tool::SelectText,
        Tool::Pen,
        Tool::Highlight,
        Tool::Note,
        Tool::Text,
        Tool::Rectangle,
        Tool::Eraser,
        Tool::Link,
        Tool::Image,
        Tool::EditText,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Tool::Select => "Select",
            Tool::SelectText => "Select Text",
            Tool::Pen => "Pen",
            Tool::Highlight => "Highlight",
            Tool::Note => "Note",
            Tool::Text => "Text",
            Tool::Rectangle => "Rectangle",
            Tool::Eraser => "Eraser",
            Tool::Link => "Link",
            Tool::Image => "Image",
            Tool::EditText => "Edit Text",
        }
    }

    /// Whether pressing on a page starts a [`ToolGesture`]
    pub fn draws(self) -> bool {
        !matches!(self, Tool::Select | Tool::Eraser | Tool::EditText)
    }
}

/// Styles the drawing tools apply
#[derive(Debug, Clone, PartialEq)]
pub struct ToolStyles {
    pub pen: AnnotationStyle,
    pub highlight: AnnotationStyle,
    pub rectangle: AnnotationStyle,
    pub text: AnnotationStyle,
    pub note: AnnotationStyle,
}

impl Default for ToolStyles {
    fn default() -> Self {
        Self {
            pen: AnnotationStyle::red_markup(),
            highlight: AnnotationStyle::yellow_highlight(),
            rectangle: AnnotationStyle::red_markup(),
            text: AnnotationStyle::new().with_font_size(14.0),
            note: AnnotationStyle { fill_color: Some(Color::NOTE_YELLOW), ..AnnotationStyle::new() },
        }
    }
}

impl ToolStyles {
    pub fn set_pen(&mut self, color: Color, width: f32) {
        self.pen.stroke_color = color;
        self.pen.stroke_width = width;
        self.rectangle.stroke_color = color;
        self.rectangle.stroke_width = width;
        self.text.stroke_color = color;
    }

    /// Highlights keep their translucency whatever colour is picked
    pub fn set_highlight(&mut self, color: Color) {
        self.highlight.fill_color = Some(Color { a: 80, ..color });
        self.highlight.stroke_color = Color { a: 255, ..color };
    }
}

/// What a finished gesture produced
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    Annotation(Annotation),
    /// Ask for note text, then call [`note_at`]
    NotePrompt { page_index: usize, at: PageCoordinate },
    /// Ask for text, then call [`text_box_at`]; `area` when a box was dragged
    TextPrompt { page_index: usize, at: PageCoordinate, area: Option<PageRect> },
    /// Open the link dialog for this area
    LinkArea { page_index: usize, rect: PageRect },
    /// Select the page text under this area
    TextArea { page_index: usize, rect: PageRect },
    /// Pick an image file, then call [`image_at`]
    ImagePrompt { page_index: usize, at: PageCoordinate },
    /// The drag was too small to mean anything
    Nothing,
}

/// One press-drag-release on a page
#[derive(Debug, Clone, PartialEq)]
pub struct ToolGesture {
    tool: Tool,
    page_index: usize,
    page_size: PageSize,
    points: Vec<PageCoordinate>,
}

impl ToolGesture {
    /// Start a gesture at `point`; `None` for tools that do not draw
    pub fn begin(tool: Tool, page_index: usize, page_size: PageSize, point: PageCoordinate) -> Option<Self> {
        if !tool.draws() {
            return None;
        }
        let mut gesture = Self { tool, page_index, page_size, points: Vec::new() };
        gesture.update(point);
        Some(gesture)
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Follow the pointer; points off the page are pulled back onto it
    pub fn update(&mut self, point: PageCoordinate) {
        let point = PageCoordinate::new(
            point.x.clamp(0.0, self.page_size.width_pt),
            point.y.clamp(0.0, self.page_size.height_pt),
        );
        match self.tool {
            Tool::Pen => {
                if self.points.last() != Some(&point) {
                    self.points.push(point);
                }
            }
            _ => {
                self.points.truncate(1);
                self.points.push(point);
            }
        }
    }

    /// Rectangle from the press to the latest point
    pub fn drag_rect(&self) -> Option<PageRect> {
        let (first, last) = (self.points.first()?, self.points.last()?);
        Some(PageRect::from_corners(*first, *last))
    }

    /// Points of the stroke drawn so far, for live preview
    pub fn points(&self) -> &[PageCoordinate] {
        &self.points
    }

    pub fn finish(self, styles: &ToolStyles) -> GestureOutcome {
        let Some(start) = self.points.first().copied() else {
            return GestureOutcome::Nothing;
        };
        let dragged = self.drag_rect().filter(|r| r.width >= MIN_DRAG_SIZE && r.height >= MIN_DRAG_SIZE);
        let page = self.page_index as u16;

        match self.tool {
            Tool::Pen => {
                if self.points.len() < 2 {
                    return GestureOutcome::Nothing;
                }
                GestureOutcome::Annotation(Annotation::new(
                    page,
                    AnnotationKind::Freehand,
                    AnnotationGeometry::Freehand { points: self.points },
                    styles.pen.clone(),
                ))
            }
            Tool::Highlight | Tool::Rectangle => match dragged {
                Some(rect) => {
                    let (kind, style) = if self.tool == Tool::Highlight {
                        (AnnotationKind::Highlight, styles.highlight.clone())
                    } else {
                        (AnnotationKind::Rectangle, styles.rectangle.clone())
                    };
                    GestureOutcome::Annotation(Annotation::new(page, kind, AnnotationGeometry::rect(rect), style))
                }
                None => GestureOutcome::Nothing,
            },
            Tool::Link => match dragged {
                Some(rect) => GestureOutcome::LinkArea { page_index: self.page_index, rect },
                None => GestureOutcome::Nothing,
            },
            Tool::SelectText => match self.drag_rect() {
                Some(rect) => GestureOutcome::TextArea { page_index: self.page_index, rect },
                None => GestureOutcome::Nothing,
            },
            Tool::Note => GestureOutcome::NotePrompt { page_index: self.page_index, at: start },
            Tool::Text => GestureOutcome::TextPrompt { page_index: self.page_index, at: start, area: dragged },
            Tool::Image => GestureOutcome::ImagePrompt { page_index: self.page_index, at: start },
            Tool::Select | Tool::Eraser | Tool::EditText => GestureOutcome::Nothing,
        }
    }
}

fn require_text(text: &str) -> EditorResult<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(EditorError::invalid("text is empty"))
    } else {
        Ok(text.trim_end())
    }
}

/// A [`NOTE_SIZE`] sticky note with its corner at `at`
pub fn note_at(page_index: usize, at: PageCoordinate, text: &str, style: &AnnotationStyle) -> EditorResult<Annotation> {
    let text = require_text(text)?;
    Ok(Annotation::new(
        page_index as u16,
        AnnotationKind::StickyNote { text: text.to_owned() },
        AnnotationGeometry::rect(PageRect::new(at.x, at.y, NOTE_SIZE, NOTE_SIZE)),
        style.clone(),
    ))
}

/// Free text in the dragged `area`, or sized to the text at `at`
pub fn text_box_at(
    page_index: usize,
    at: PageCoordinate,
    area: Option<PageRect>,
    text: &str,
    style: &AnnotationStyle,
) -> EditorResult<Annotation> {
    let text = require_text(text)?;
    let rect = area.unwrap_or_else(|| {
        let (w, h) = free_text_box_size(style.font, style.font_size, text);
        PageRect::new(at.x, at.y, w, h)
    });
    Ok(Annotation::new(
        page_index as u16,
        AnnotationKind::FreeText { text: text.to_owned() },
        AnnotationGeometry::rect(rect),
        style.clone(),
    ))
}

/// An image with its corner at `at`, no larger than [`MAX_IMAGE_SIDE`]
pub fn image_at(page_index: usize, at: PageCoordinate, image: ImagePayload) -> Annotation {
    let (w, h) = image.fitted_size(MAX_IMAGE_SIDE);
    Annotation::new(
        page_index as u16,
        AnnotationKind::Image { image },
        AnnotationGeometry::rect(PageRect::new(at.x, at.y, w, h)),
        AnnotationStyle::new(),
    )
}

/// Text of one item being edited in place
#[derive(Debug, Clone, PartialEq)]
pub struct TextEditState {
    original: Annotation,
    pub text: String,
}

impl TextEditState {
    /// Start editing a note, free text, text edit or page text item
    pub fn begin(session: &EditSession, id: AnnotationId) -> EditorResult<Self> {
        let original = session.annotations().get(id).cloned().ok_or(EditorError::AnnotationNotFound(id))?;
        let text = match original.kind() {
            AnnotationKind::StickyNote { text }
            | AnnotationKind::FreeText { text }
            | AnnotationKind::PageText { text, .. }
            | AnnotationKind::TextEdit { replacement: text, .. } => text.clone(),
            other => {
                return Err(EditorError::invalid(format!("{} items have no editable text", other.label())))
            }
        };
        Ok(Self { original, text })
    }

    pub fn annotation_id(&self) -> AnnotationId {
        self.original.id()
    }

    pub fn is_changed(&self) -> bool {
        self.original.kind().text() != Some(self.text.as_str())
    }

    /// Store the edited text as one undo step; false when it is unchanged
    pub fn commit(self, session: &mut EditSession) -> EditorResult<bool> {
        if !self.is_changed() {
            return Ok(false);
        }
        let Some(kind) = self.original.kind().with_text(self.text.clone()) else {
            return Ok(false);
        };
        let mut after = self.original.with_kind(kind);

        // Free text grows to fit; other kinds keep their box
        if let AnnotationKind::FreeText { text } = after.kind() {
            let style = after.style();
            let (w, h) = free_text_box_size(style.font, style.font_size, text);
            let bounds = after.bounding_box();
            let grown = PageRect::new(bounds.x, bounds.y, bounds.width.max(w), bounds.height.max(h));
            if grown != bounds {
                after = after.with_geometry(AnnotationGeometry::rect(grown));
            }
        }
        session.update_annotation(after)
    }

    /// Drop the edit; the session was never touched
    pub fn cancel(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::session;
    use pdf_engine::DEFAULT_PAGE_SIZE;
    use std::sync::Arc;

    fn gesture(tool: Tool, points: &[(f32, f32)]) -> ToolGesture {
        let (x, y) = points[0];
        let mut gesture = ToolGesture::begin(tool, 0, DEFAULT_PAGE_SIZE, PageCoordinate::new(x, y)).unwrap();
        for &(x, y) in &points[1..] {
            gesture.update(PageCoordinate::new(x, y));
        }
        gesture
    }

    #[test]
    fn test_select_and_eraser_do_not_draw() {
        for tool in [Tool::Select, Tool::Eraser, Tool::EditText] {
            assert!(ToolGesture::begin(tool, 0, DEFAULT_PAGE_SIZE, PageCoordinate::new(1.0, 1.0)).is_none());
        }
    }

    #[test]
    fn test_pen_stroke() {
        let outcome = gesture(Tool::Pen, &[(10.0, 10.0), (20.0, 15.0), (20.0, 15.0), (30.0, 30.0)])
            .finish(&ToolStyles::default());

        let GestureOutcome::Annotation(stroke) = outcome else {
            panic!("expected a stroke, got {outcome:?}");
        };
        assert_eq!(stroke.kind(), &AnnotationKind::Freehand);
        match stroke.geometry() {
            AnnotationGeometry::Freehand { points } => assert_eq!(points.len(), 3),
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn test_single_click_pen_draws_nothing() {
        let outcome = gesture(Tool::Pen, &[(10.0, 10.0)]).finish(&ToolStyles::default());
        assert_eq!(outcome, GestureOutcome::Nothing);
    }

    #[test]
    fn test_rectangle_from_any_drag_direction() {
        let outcome = gesture(Tool::Rectangle, &[(100.0, 100.0), (60.0, 70.0), (40.0, 50.0)])
            .finish(&ToolStyles::default());

        let GestureOutcome::Annotation(rect) = outcome else {
            panic!("expected a rectangle");
        };
        assert_eq!(rect.bounding_box(), PageRect::new(40.0, 50.0, 60.0, 50.0));
    }

    #[test]
    fn test_small_drags_are_ignored() {
        for tool in [Tool::Highlight, Tool::Rectangle, Tool::Link] {
            let outcome = gesture(tool, &[(100.0, 100.0), (103.0, 140.0)]).finish(&ToolStyles::default());
            assert_eq!(outcome, GestureOutcome::Nothing, "{tool:?}");
        }
    }

    #[test]
    fn test_select_text_reports_the_dragged_area() {
        let outcome = gesture(Tool::SelectText, &[(40.0, 90.0), (20.0, 95.0)]).finish(&ToolStyles::default());
        assert_eq!(
            outcome,
            GestureOutcome::TextArea { page_index: 0, rect: PageRect::new(20.0, 90.0, 20.0, 5.0) }
        );
    }

    #[test]
    fn test_drag_is_clamped_to_page() {
        let outcome = gesture(Tool::Link, &[(600.0, 780.0), (700.0, 900.0)]).finish(&ToolStyles::default());
        assert_eq!(
            outcome,
            GestureOutcome::LinkArea { page_index: 0, rect: PageRect::new(600.0, 780.0, 12.0, 12.0) }
        );
    }

    #[test]
    fn test_highlight_is_translucent() {
        let mut styles = ToolStyles::default();
        styles.set_highlight(Color::GREEN);
        let GestureOutcome::Annotation(highlight) =
            gesture(Tool::Highlight, &[(10.0, 10.0), (100.0, 30.0)]).finish(&styles)
        else {
            panic!("expected a highlight");
        };
        assert_eq!(highlight.style().fill_color, Some(Color::new(0, 255, 0, 80)));
    }

    #[test]
    fn test_note_and_text_prompts() {
        let styles = ToolStyles::default();
        let note = gesture(Tool::Note, &[(50.0, 60.0)]).finish(&styles);
        assert_eq!(note, GestureOutcome::NotePrompt { page_index: 0, at: PageCoordinate::new(50.0, 60.0) });

        let GestureOutcome::NotePrompt { page_index, at } = note else { unreachable!() };
        let annotation = note_at(page_index, at, "check this", &styles.note).unwrap();
        assert_eq!(annotation.bounding_box(), PageRect::new(50.0, 60.0, NOTE_SIZE, NOTE_SIZE));
        assert!(note_at(0, at, "   ", &styles.note).is_err());

        let text = gesture(Tool::Text, &[(50.0, 60.0), (150.0, 100.0)]).finish(&styles);
        let GestureOutcome::TextPrompt { area, .. } = text else { panic!("expected a text prompt") };
        assert_eq!(area, Some(PageRect::new(50.0, 60.0, 100.0, 40.0)));
    }

    #[test]
    fn test_text_box_sized_to_text() {
        let style = AnnotationStyle::new();
        let annotation = text_box_at(0, PageCoordinate::new(10.0, 10.0), None, "hello", &style).unwrap();
        let (w, h) = free_text_box_size(style.font, style.font_size, "hello");
        let bounds = annotation.bounding_box();
        assert_eq!((bounds.x, bounds.y), (10.0, 10.0));
        assert!((bounds.width - w).abs() < 1e-3);
        assert!((bounds.height - h).abs() < 1e-3);
    }

    #[test]
    fn test_image_is_fitted() {
        let image = ImagePayload { width: 800, height: 200, rgba: Arc::new(vec![0; 800 * 200 * 4]) };
        let annotation = image_at(0, PageCoordinate::new(0.0, 0.0), image);
        assert_eq!(annotation.bounding_box(), PageRect::new(0.0, 0.0, 400.0, 100.0));
    }

    #[test]
    fn test_text_edit_commit_and_cancel() {
        let mut session = session(1);
        let note = note_at(0, PageCoordinate::new(10.0, 10.0), "first", &AnnotationStyle::new()).unwrap();
        session.add_annotation(note.clone()).unwrap();

        let unchanged = TextEditState::begin(&session, note.id()).unwrap();
        assert!(!unchanged.commit(&mut session).unwrap());
        assert_eq!(session.history().undo_len(), 1);

        let mut cancelled = TextEditState::begin(&session, note.id()).unwrap();
        cancelled.text = "never stored".into();
        cancelled.cancel();
        assert_eq!(session.annotations().get(note.id()).unwrap().kind().text(), Some("first"));

        let mut edit = TextEditState::begin(&session, note.id()).unwrap();
        edit.text = "second".into();
        assert!(edit.commit(&mut session).unwrap());
        assert_eq!(session.annotations().get(note.id()).unwrap().kind().text(), Some("second"));

        session.undo().unwrap();
        assert_eq!(session.annotations().get(note.id()).unwrap().kind().text(), Some("first"));
    }

    #[test]
    fn test_text_edit_rejects_other_kinds() {
        let mut session = session(1);
        let GestureOutcome::Annotation(rect) =
            gesture(Tool::Rectangle, &[(10.0, 10.0), (50.0, 50.0)]).finish(&ToolStyles::default())
        else {
            panic!("expected a rectangle");
        };
        session.add_annotation(rect.clone()).unwrap();

        assert!(matches!(TextEditState::begin(&session, rect.id()), Err(EditorError::InvalidInput(_))));
    }

    #[test]
    fn test_free_text_grows_on_commit() {
        let mut session = session(1);
        let style = AnnotationStyle::new();
        let text = text_box_at(0, PageCoordinate::new(10.0, 10.0), None, "a", &style).unwrap();
        session.add_annotation(text.clone()).unwrap();

        let mut edit = TextEditState::begin(&session, text.id()).unwrap();
        edit.text = "a much longer line of text".into();
        edit.commit(&mut session).unwrap();

        let stored = session.annotations().get(text.id()).unwrap();
        assert!(stored.bounding_box().width > text.bounding_box().width);
    }
}
