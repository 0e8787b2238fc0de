//! Page numbering

use super::{baseline_box, check_range, page_text, DialogContext, EditDescription, HorizontalAlign, PageRange};
use crate::annotation::PageTextRole;
use crate::error::{EditorError, EditorResult};
use crate::fonts::StandardFont;

pub const LABEL: &str = "Add Page Numbers";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberFormat {
    #[default]
    Plain,
    Page,
    PageOfTotal,
    Fraction,
    Dashed,
}

impl NumberFormat {
    pub const ALL: [NumberFormat; 5] = [
        NumberFormat::Plain,
        NumberFormat::Page,
        NumberFormat::PageOfTotal,
        NumberFormat::Fraction,
        NumberFormat::Dashed,
    ];

    /// Pattern shown in the format picker
    pub fn pattern(self) -> &'static str {
        match self {
            NumberFormat::Plain => "{n}",
            NumberFormat::Page => "Page {n}",
            NumberFormat::PageOfTotal => "Page {n} of {total}",
            NumberFormat::Fraction => "{n} / {total}",
            NumberFormat::Dashed => "- {n} -",
        }
    }

    pub fn format(self, n: u32, total: u32) -> String {
        match self {
            NumberFormat::Plain => n.to_string(),
            NumberFormat::Page => format!("Page {n}"),
            NumberFormat::PageOfTotal => format!("Page {n} of {total}"),
            NumberFormat::Fraction => format!("{n} / {total}"),
            NumberFormat::Dashed => format!("- {n} -"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalPosition {
    Top,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageNumberConfig {
    pub format: NumberFormat,
    /// Number shown on the first page of the range
    pub start: u32,
    /// 6 to 36
    pub font_size: f32,
    pub vertical: VerticalPosition,
    pub horizontal: HorizontalAlign,
    /// Distance from the page edge in points, 10 to 100
    pub margin: f32,
    pub pages: PageRange,
    /// Leave the first page of the range unnumbered; it still counts
    pub skip_first: bool,
}

impl Default for PageNumberConfig {
    fn default() -> Self {
        Self {
            format: NumberFormat::Plain,
            start: 1,
            font_size: 10.0,
            vertical: VerticalPosition::Bottom,
            horizontal: HorizontalAlign::Center,
            margin: 30.0,
            pages: PageRange::All,
            skip_first: false,
        }
    }
}

pub fn build(ctx: &DialogContext, config: &PageNumberConfig) -> EditorResult<EditDescription> {
    check_range("start number", config.start, 1..=9999)?;
    check_range("font size", config.font_size, 6.0..=36.0)?;
    check_range("margin", config.margin, 10.0..=100.0)?;
    let pages = config.pages.resolve(ctx.page_count())?;

    let font = StandardFont::Helvetica;
    let fs = config.font_size;
    let total = pages.len() as u32 + config.start - 1;

    let mut add = Vec::with_capacity(pages.len());
    for (position, &index) in pages.iter().enumerate() {
        if config.skip_first && position == 0 {
            continue;
        }
        let entry = ctx.page(index)?;
        let size = entry.display_size();
        let text = config.format.format(config.start + position as u32, total);

        let baseline = match config.vertical {
            VerticalPosition::Bottom => size.height_pt - config.margin,
            VerticalPosition::Top => config.margin + fs,
        };
        let x = config.horizontal.x(size.width_pt, config.margin, font.text_width(&text, fs));
        let display = baseline_box(font, fs, &text, x, baseline);
        add.push(page_text(entry, index, PageTextRole::PageNumber, text, fs, display));
    }

    if add.is_empty() {
        return Err(EditorError::invalid("no pages left to number"));
    }
    tracing::debug!(pages = add.len(), "built page numbers");
    Ok(EditDescription::adding(LABEL, add))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationKind;
    use crate::dialogs::tests::context;
    use pretty_assertions::assert_eq;

    fn texts(edit: &EditDescription) -> Vec<String> {
        edit.add.iter().filter_map(|a| a.kind().text().map(str::to_owned)).collect()
    }

    #[test]
    fn test_page_of_total() {
        let ctx = context(3);
        let config = PageNumberConfig { format: NumberFormat::PageOfTotal, ..Default::default() };
        let edit = build(&ctx, &config).unwrap();

        assert_eq!(texts(&edit), vec!["Page 1 of 3", "Page 2 of 3", "Page 3 of 3"]);
        assert!(edit
            .add
            .iter()
            .all(|a| matches!(a.kind(), AnnotationKind::PageText { role: PageTextRole::PageNumber, .. })));
    }

    #[test]
    fn test_skip_first_still_counts_it() {
        let ctx = context(4);
        let config = PageNumberConfig {
            format: NumberFormat::Fraction,
            start: 5,
            pages: PageRange::Span { from: 2, to: 4 },
            skip_first: true,
            ..Default::default()
        };
        let edit = build(&ctx, &config).unwrap();

        assert_eq!(texts(&edit), vec!["6 / 7", "7 / 7"]);
        let pages: Vec<u16> = edit.add.iter().map(|a| a.page_index()).collect();
        assert_eq!(pages, vec![2, 3]);
    }

    #[test]
    fn test_bottom_center_placement() {
        let ctx = context(1);
        let edit = build(&ctx, &PageNumberConfig::default()).unwrap();

        let font = StandardFont::Helvetica;
        let bounds = edit.add[0].bounding_box();
        let baseline = bounds.y + font.ascent() * 10.0;
        assert!((baseline - (792.0 - 30.0)).abs() < 1e-3);
        assert!((bounds.center().x - 306.0).abs() < 1e-3);
    }

    #[test]
    fn test_top_right_placement() {
        let ctx = context(1);
        let config = PageNumberConfig {
            vertical: VerticalPosition::Top,
            horizontal: HorizontalAlign::Right,
            margin: 40.0,
            font_size: 12.0,
            ..Default::default()
        };
        let bounds = build(&ctx, &config).unwrap().add[0].bounding_box();

        let baseline = bounds.y + StandardFont::Helvetica.ascent() * 12.0;
        assert!((baseline - 52.0).abs() < 1e-3);
        assert!((bounds.right() - (612.0 - 40.0)).abs() < 1e-3);
    }

    #[test]
    fn test_nothing_to_number() {
        let ctx = context(1);
        let config = PageNumberConfig { skip_first: true, ..Default::default() };
        assert!(matches!(build(&ctx, &config), Err(EditorError::InvalidInput(_))));

        let tiny = PageNumberConfig { font_size: 2.0, ..Default::default() };
        assert!(matches!(build(&ctx, &tiny), Err(EditorError::InvalidInput(_))));
    }
}
