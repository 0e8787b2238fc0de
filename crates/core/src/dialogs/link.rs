//! Links drawn on a page, to a URI or another page

use super::{DialogContext, EditDescription};
use crate::annotation::{
    Annotation, AnnotationGeometry, AnnotationKind, AnnotationStyle, Color, LinkTarget, PageRect,
};
use crate::error::{EditorError, EditorResult};

pub const LABEL: &str = "Add Link";

/// Smallest link area in points, per side
pub const MIN_LINK_SIZE: f32 = 4.0;

pub const LINK_BORDER_WIDTH: f32 = 0.8;

const URI_SCHEMES: [&str; 3] = ["http://", "https://", "mailto:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDestination {
    Uri(String),
    /// 1-based page number
    Page(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    pub destination: LinkDestination,
    pub border_color: Color,
    /// Display index of the page the link sits on
    pub page: usize,
    /// Dragged area in page space
    pub rect: PageRect,
}

impl LinkConfig {
    pub fn new(page: usize, rect: PageRect) -> Self {
        Self { destination: LinkDestination::Uri(String::new()), border_color: Color::LINK_BLUE, page, rect }
    }
}

/// Trim a typed URI and add `https://` unless it already has a scheme
pub fn normalize_uri(input: &str) -> EditorResult<String> {
    let uri = input.trim();
    if uri.is_empty() {
        return Err(EditorError::invalid("link URL is empty"));
    }
    let lower = uri.to_ascii_lowercase();
    if URI_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        Ok(uri.to_owned())
    } else {
        Ok(format!("https://{uri}"))
    }
}

pub fn build(ctx: &DialogContext, config: &LinkConfig) -> EditorResult<EditDescription> {
    let entry = ctx.page(config.page)?;
    if config.rect.width < MIN_LINK_SIZE || config.rect.height < MIN_LINK_SIZE {
        return Err(EditorError::invalid(format!(
            "link area must be at least {MIN_LINK_SIZE}x{MIN_LINK_SIZE} points"
        )));
    }

    let target = match &config.destination {
        LinkDestination::Uri(uri) => LinkTarget::Uri(normalize_uri(uri)?),
        LinkDestination::Page(page) => {
            let count = ctx.page_count();
            if *page == 0 || *page > count {
                return Err(EditorError::invalid(format!("target page {page} is outside 1-{count}")));
            }
            LinkTarget::Page((page - 1) as u16)
        }
    };

    let style = AnnotationStyle {
        stroke_color: config.border_color,
        stroke_width: LINK_BORDER_WIDTH,
        ..AnnotationStyle::new()
    };
    let size = entry.size();
    let rect = config.rect.clamped_into(size.width_pt, size.height_pt);
    let link = Annotation::new(
        config.page as u16,
        AnnotationKind::Link { target },
        AnnotationGeometry::rect(rect),
        style,
    );
    Ok(EditDescription::adding(LABEL, vec![link]))
}
