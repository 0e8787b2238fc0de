//! Header and footer text with `{page}`, `{total}` and `{date}` fields

use super::{baseline_box, check_range, page_text, DialogContext, EditDescription, HorizontalAlign, PageRange};
use crate::annotation::PageTextRole;
use crate::error::{EditorError, EditorResult};
use crate::fonts::StandardFont;

pub const LABEL: &str = "Add Header/Footer";

/// Three slots per band, in [`HorizontalAlign::ALL`] order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Band {
    pub left: String,
    pub center: String,
    pub right: String,
}

impl Band {
    fn slots(&self) -> [(HorizontalAlign, &str); 3] {
        [
            (HorizontalAlign::Left, self.left.as_str()),
            (HorizontalAlign::Center, self.center.as_str()),
            (HorizontalAlign::Right, self.right.as_str()),
        ]
    }

    fn is_empty(&self) -> bool {
        self.slots().iter().all(|(_, text)| text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFooterConfig {
    pub header: Band,
    pub footer: Band,
    /// 6 to 24
    pub font_size: f32,
    /// 10 to 80
    pub margin: f32,
    pub pages: PageRange,
    pub skip_first: bool,
}

impl Default for HeaderFooterConfig {
    fn default() -> Self {
        Self {
            header: Band::default(),
            footer: Band::default(),
            font_size: 9.0,
            margin: 25.0,
            pages: PageRange::All,
            skip_first: false,
        }
    }
}

/// Replace the fields; `page` is 1-based over the whole document
pub fn substitute(template: &str, page: usize, total: usize, date: &str) -> String {
    template
        .replace("{page}", &page.to_string())
        .replace("{total}", &total.to_string())
        .replace("{date}", date)
}

pub fn build(ctx: &DialogContext, config: &HeaderFooterConfig) -> EditorResult<EditDescription> {
    if config.header.is_empty() && config.footer.is_empty() {
        return Err(EditorError::invalid("no header or footer text entered"));
    }
    check_range("font size", config.font_size, 6.0..=24.0)?;
    check_range("margin", config.margin, 10.0..=80.0)?;
    let pages = config.pages.resolve(ctx.page_count())?;

    let font = StandardFont::Helvetica;
    let fs = config.font_size;
    let total = ctx.page_count();
    let date = ctx.today.format("%Y-%m-%d").to_string();

    let mut add = Vec::new();
    for (position, &index) in pages.iter().enumerate() {
        if config.skip_first && position == 0 {
            continue;
        }
        let entry = ctx.page(index)?;
        let size = entry.display_size();
        let bands = [
            (PageTextRole::Header, &config.header, config.margin + fs),
            (PageTextRole::Footer, &config.footer, size.height_pt - config.margin),
        ];

        for (role, band, baseline) in bands {
            for (align, template) in band.slots() {
                if template.trim().is_empty() {
                    continue;
                }
                let text = substitute(template, index + 1, total, &date);
                let x = align.x(size.width_pt, config.margin, font.text_width(&text, fs));
                let display = baseline_box(font, fs, &text, x, baseline);
                add.push(page_text(entry, index, role, text, fs, display));
            }
        }
    }

    if add.is_empty() {
        return Err(EditorError::invalid("no pages left for header or footer"));
    }
    Ok(EditDescription::adding(LABEL, add))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationKind;
    use crate::dialogs::tests::context;
    use pretty_assertions::assert_eq;

    fn footer(center: &str) -> HeaderFooterConfig {
        HeaderFooterConfig {
            footer: Band { center: center.into(), ..Default::default() },
            ..Default::default()
        }
    }

    #[test]
    fn test_substitute_fields() {
        assert_eq!(substitute("{page}/{total} on {date}", 2, 9, "2024-03-09"), "2/9 on 2024-03-09");
        assert_eq!(substitute("plain", 1, 1, ""), "plain");
    }

    #[test]
    fn test_footer_uses_absolute_page_numbers() {
        let ctx = context(4);
        let config = HeaderFooterConfig { pages: PageRange::Span { from: 3, to: 4 }, ..footer("{page} of {total}") };
        let edit = build(&ctx, &config).unwrap();

        let texts: Vec<&str> = edit.add.iter().filter_map(|a| a.kind().text()).collect();
        assert_eq!(texts, vec!["3 of 4", "4 of 4"]);
    }

    #[test]
    fn test_header_and_footer_slots() {
        let ctx = context(1);
        let config = HeaderFooterConfig {
            header: Band { left: "Report".into(), right: "{date}".into(), ..Default::default() },
            footer: Band { center: "{page}".into(), ..Default::default() },
            ..Default::default()
        };
        let edit = build(&ctx, &config).unwrap();

        let items: Vec<(PageTextRole, &str)> = edit
            .add
            .iter()
            .filter_map(|a| match a.kind() {
                AnnotationKind::PageText { text, role } => Some((*role, text.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            items,
            vec![
                (PageTextRole::Header, "Report"),
                (PageTextRole::Header, "2024-03-09"),
                (PageTextRole::Footer, "1"),
            ]
        );

        let header = edit.add[0].bounding_box();
        assert!((header.x - 25.0).abs() < 1e-3);
        assert!((header.y + StandardFont::Helvetica.ascent() * 9.0 - 34.0).abs() < 1e-3);
        let date = edit.add[1].bounding_box();
        assert!((date.right() - (612.0 - 25.0)).abs() < 1e-3);
    }

    #[test]
    fn test_requires_text() {
        let ctx = context(2);
        assert!(matches!(build(&ctx, &footer("   ")), Err(EditorError::InvalidInput(_))));
    }

    #[test]
    fn test_skip_first() {
        let ctx = context(3);
        let config = HeaderFooterConfig { skip_first: true, ..footer("{page}") };
        let pages: Vec<u16> = build(&ctx, &config).unwrap().add.iter().map(|a| a.page_index()).collect();
        assert_eq!(pages, vec![1, 2]);
    }
}
