//! Dialog-driven edits
//!
//! Each dialog is split in two: the window collects a config struct, and a
//! pure `build(&DialogContext, &Config)` function here turns it into an
//! [`EditDescription`]. Builders validate everything and never touch the
//! session; [`EditSession::apply_edit`] applies the result as one undo step.
//!
//! Layout happens on the page as displayed (rotation applied) and is mapped
//! back into page space, so generated text stays upright on rotated pages.
//!
//! [`EditSession::apply_edit`]: crate::EditSession::apply_edit

pub mod header_footer;
pub mod link;
pub mod page_number;
pub mod signature;
pub mod stamp;
pub mod watermark;

use crate::annotation::{
    Annotation, AnnotationGeometry, AnnotationId, AnnotationKind, AnnotationStyle, Color, PageRect,
    PageTextRole,
};
use crate::error::{EditorError, EditorResult};
use crate::fonts::StandardFont;
use crate::pages::PageEntry;
use crate::session::EditSession;
use chrono::NaiveDate;
use std::ops::RangeInclusive;

/// Colour of generated page numbers, headers and footers
pub const PAGE_TEXT_GREY: Color = Color { r: 77, g: 77, b: 77, a: 255 };

/// What a dialog builder may look at
#[derive(Debug, Clone, PartialEq)]
pub struct DialogContext {
    pub pages: Vec<PageEntry>,
    /// Display index of the page in view
    pub current_page: usize,
    /// Substituted for `{date}`
    pub today: NaiveDate,
}

impl DialogContext {
    pub fn new(pages: Vec<PageEntry>, current_page: usize, today: NaiveDate) -> Self {
        Self { pages, current_page, today }
    }

    /// Context for `session`, dated today in local time
    pub fn from_session(session: &EditSession, current_page: usize) -> Self {
        Self::new(session.pages().to_vec(), current_page, chrono::Local::now().date_naive())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn page(&self, index: usize) -> EditorResult<&PageEntry> {
        self.pages
            .get(index)
            .ok_or(EditorError::PageOutOfRange { page: index, page_count: self.pages.len() })
    }

    pub(crate) fn current(&self) -> EditorResult<&PageEntry> {
        self.page(self.current_page)
    }
}

/// Which pages a dialog applies to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageRange {
    #[default]
    All,
    /// 1-based, inclusive
    Span { from: usize, to: usize },
    /// 1-based inclusive spans from a typed list such as `1-3,5`
    Pages(Vec<RangeInclusive<usize>>),
}

impl PageRange {
    /// Parse `all`, `4`, `2-7` or a comma separated mix like `1-3,5`
    ///
    /// The result is checked against the document only by [`Self::resolve`].
    pub fn parse(input: &str) -> EditorResult<Self> {
        let input = input.trim();
        if input.is_empty() || input.eq_ignore_ascii_case("all") {
            return Ok(PageRange::All);
        }

        let mut spans = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            let (from, to) = match part.split_once('-') {
                Some((from, to)) => (parse_page_number(from)?, parse_page_number(to)?),
                None => {
                    let page = parse_page_number(part)?;
                    (page, page)
                }
            };
            if from > to {
                return Err(EditorError::invalid(format!("page range {part} is reversed")));
            }
            spans.push(from..=to);
        }

        match spans.as_slice() {
            [single] => Ok(PageRange::Span { from: *single.start(), to: *single.end() }),
            _ => Ok(PageRange::Pages(spans)),
        }
    }

    /// 0-based display indices, ascending
    pub fn resolve(&self, page_count: usize) -> EditorResult<Vec<usize>> {
        let check = |page: usize| {
            if page == 0 || page > page_count {
                Err(EditorError::invalid(format!(
                    "page {page} is outside the document (1-{page_count})"
                )))
            } else {
                Ok(page - 1)
            }
        };

        match self {
            PageRange::All => Ok((0..page_count).collect()),
            PageRange::Span { from, to } => {
                if from > to {
                    return Err(EditorError::invalid(format!("page range {from}-{to} is reversed")));
                }
                check(*from)?;
                check(*to)?;
                Ok((from - 1..*to).collect())
            }
            PageRange::Pages(spans) => {
                if spans.is_empty() {
                    return Err(EditorError::invalid("no pages selected"));
                }
                // Bounds first, so a typo like 1-4000000000 never expands
                let mut indices = Vec::new();
                for span in spans {
                    let (first, last) = (check(*span.start())?, check(*span.end())?);
                    if first > last {
                        return Err(EditorError::invalid(format!(
                            "page range {}-{} is reversed",
                            span.start(),
                            span.end()
                        )));
                    }
                    indices.extend(first..=last);
                }
                indices.sort_unstable();
                indices.dedup();
                Ok(indices)
            }
        }
    }
}

fn parse_page_number(text: &str) -> EditorResult<usize> {
    text.trim()
        .parse()
        .map_err(|_| EditorError::invalid(format!("'{}' is not a page number", text.trim())))
}

/// Result of a dialog: annotations to add and ids to remove, applied as one
/// step named `label`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditDescription {
    pub label: String,
    pub add: Vec<Annotation>,
    pub remove: Vec<AnnotationId>,
}

impl EditDescription {
    pub fn adding(label: impl Into<String>, add: Vec<Annotation>) -> Self {
        Self { label: label.into(), add, remove: Vec::new() }
    }
}

/// Bulk removals offered next to the dialogs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalAction {
    Watermarks,
    PageNumbers,
    HeadersFooters,
    /// Links on one page (display index)
    LinksOnPage(u16),
}

impl RemovalAction {
    pub fn label(&self) -> &'static str {
        match self {
            RemovalAction::Watermarks => "Remove Watermarks",
            RemovalAction::PageNumbers => "Remove Page Numbers",
            RemovalAction::HeadersFooters => "Remove Header/Footer",
            RemovalAction::LinksOnPage(_) => "Remove Links",
        }
    }

    pub fn matches(&self, annotation: &Annotation) -> bool {
        match (self, annotation.kind()) {
            (RemovalAction::Watermarks, AnnotationKind::Watermark { .. }) => true,
            (RemovalAction::PageNumbers, AnnotationKind::PageText { role, .. }) => {
                *role == PageTextRole::PageNumber
            }
            (RemovalAction::HeadersFooters, AnnotationKind::PageText { role, .. }) => {
                matches!(role, PageTextRole::Header | PageTextRole::Footer)
            }
            (RemovalAction::LinksOnPage(page), AnnotationKind::Link { .. }) => {
                annotation.page_index() == *page
            }
            _ => false,
        }
    }
}

pub(crate) fn check_range<T: PartialOrd + std::fmt::Display>(
    name: &str,
    value: T,
    range: RangeInclusive<T>,
) -> EditorResult<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(EditorError::invalid(format!(
            "{name} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

/// Box of a single line of text with its baseline at `baseline`, laid out on
/// the displayed page
pub(crate) fn baseline_box(font: StandardFont, font_size: f32, text: &str, x: f32, baseline: f32) -> PageRect {
    let width = font.text_width(text, font_size);
    let height = (font.ascent() + font.descent()) * font_size;
    PageRect::new(x, baseline - font.ascent() * font_size, width, height)
}

/// Annotation for a box laid out on the displayed page
pub(crate) fn placed(
    entry: &PageEntry,
    page_index: usize,
    kind: AnnotationKind,
    display_box: PageRect,
    mut style: AnnotationStyle,
    display_rotation: f32,
) -> Annotation {
    let (rect, rotation) = entry.display_box_to_page(display_box, display_rotation);
    style.rotation = rotation;
    Annotation::new(page_index as u16, kind, AnnotationGeometry::rect(rect), style)
}

/// Generated page text in the shared grey
pub(crate) fn page_text(
    entry: &PageEntry,
    page_index: usize,
    role: PageTextRole,
    text: String,
    font_size: f32,
    display_box: PageRect,
) -> Annotation {
    let style = AnnotationStyle {
        stroke_color: PAGE_TEXT_GREY,
        font_size,
        ..AnnotationStyle::new()
    };
    placed(entry, page_index, AnnotationKind::PageText { text, role }, display_box, style, 0.0)
}

/// Horizontal placement shared by page numbers, headers and footers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HorizontalAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl HorizontalAlign {
    pub const ALL: [HorizontalAlign; 3] =
        [HorizontalAlign::Left, HorizontalAlign::Center, HorizontalAlign::Right];

    pub fn label(self) -> &'static str {
        match self {
            HorizontalAlign::Left => "Left",
            HorizontalAlign::Center => "Center",
            HorizontalAlign::Right => "Right",
        }
    }

    /// Left edge of a `text_width` wide line on a `page_width` wide page
    pub(crate) fn x(self, page_width: f32, margin: f32, text_width: f32) -> f32 {
        match self {
            HorizontalAlign::Left => margin,
            HorizontalAlign::Center => (page_width - text_width) / 2.0,
            HorizontalAlign::Right => page_width - margin - text_width,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pdf_engine::PageSize;

    pub(crate) fn context(pages: usize) -> DialogContext {
        let entries = (0..pages)
            .map(|i| PageEntry::new(i as u32 + 1, PageSize::new(612.0, 792.0), 0))
            .collect();
        DialogContext::new(entries, 0, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
    }

    #[test]
    fn test_parse_all_and_spans() {
        assert_eq!(PageRange::parse("").unwrap(), PageRange::All);
        assert_eq!(PageRange::parse(" ALL ").unwrap(), PageRange::All);
        assert_eq!(PageRange::parse("4").unwrap(), PageRange::Span { from: 4, to: 4 });
        assert_eq!(PageRange::parse("2 - 7").unwrap(), PageRange::Span { from: 2, to: 7 });
        assert_eq!(PageRange::parse("1-3,5,2").unwrap(), PageRange::Pages(vec![1..=3, 5..=5, 2..=2]));
        assert_eq!(PageRange::parse("1-3,5,2").unwrap().resolve(5).unwrap(), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["x", "1-", "3-1", "1,,2", "-2"] {
            assert!(
                matches!(PageRange::parse(input), Err(EditorError::InvalidInput(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_checks_bounds() {
        assert_eq!(PageRange::All.resolve(3).unwrap(), vec![0, 1, 2]);
        assert_eq!(PageRange::Span { from: 2, to: 3 }.resolve(3).unwrap(), vec![1, 2]);
        assert!(PageRange::Span { from: 0, to: 2 }.resolve(3).is_err());
        assert!(PageRange::Span { from: 2, to: 4 }.resolve(3).is_err());
        assert!(PageRange::Span { from: 3, to: 2 }.resolve(3).is_err());
        assert!(PageRange::Pages(vec![]).resolve(3).is_err());
        assert!(PageRange::Pages(vec![1..=1, 9..=9]).resolve(3).is_err());
    }

    #[test]
    fn test_huge_span_in_list_is_rejected_without_expanding() {
        let range = PageRange::parse("1-4000000000,3").unwrap();
        assert_eq!(range, PageRange::Pages(vec![1..=4_000_000_000, 3..=3]));
        assert!(matches!(range.resolve(3), Err(EditorError::InvalidInput(_))));

        let range = PageRange::parse(&format!("2,1-{}", usize::MAX)).unwrap();
        assert!(matches!(range.resolve(3), Err(EditorError::InvalidInput(_))));
    }

    #[test]
    fn test_removal_actions_match_kinds() {
        let entry = &context(1).pages[0];
        let number = page_text(
            entry,
            0,
            PageTextRole::PageNumber,
            "1".into(),
            10.0,
            PageRect::new(0.0, 0.0, 10.0, 10.0),
        );
        let footer = page_text(
            entry,
            0,
            PageTextRole::Footer,
            "f".into(),
            10.0,
            PageRect::new(0.0, 0.0, 10.0, 10.0),
        );

        assert!(RemovalAction::PageNumbers.matches(&number));
        assert!(!RemovalAction::PageNumbers.matches(&footer));
        assert!(RemovalAction::HeadersFooters.matches(&footer));
        assert!(!RemovalAction::Watermarks.matches(&footer));
    }

    #[test]
    fn test_placed_box_on_rotated_page_stays_upright() {
        let entry = PageEntry::new(1, PageSize::new(612.0, 792.0), 90);
        // Displayed page is 792 wide, 612 tall
        let display = PageRect::new(10.0, 20.0, 100.0, 30.0);
        let annotation = placed(
            &entry,
            0,
            AnnotationKind::FreeText { text: "x".into() },
            display,
            AnnotationStyle::new(),
            0.0,
        );

        assert_eq!(annotation.style().rotation, -90.0);
        let center = entry.page_to_display(annotation.bounding_box().center());
        assert!((center.x - display.center().x).abs() < 1e-3);
        assert!((center.y - display.center().y).abs() < 1e-3);
    }
}
