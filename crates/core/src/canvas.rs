//! Continuous page layout and the overlay operations that go through it
//!
//! View space is what the window paints in: pages stacked top to bottom,
//! centred horizontally, [`PAGE_GAP`] apart, each drawn at
//! `zoom * dpi / 72` view units per point. Every conversion between view and
//! page space passes through the page's rotation.

use crate::annotation::{Annotation, AnnotationId, PageCoordinate, PageRect};
use crate::error::{EditorError, EditorResult};
use crate::pages::PageEntry;
use crate::session::EditSession;
use std::ops::Range;

/// Gap around and between pages, in view units
pub const PAGE_GAP: f32 = 20.0;

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 5.0;
pub const ZOOM_STEP: f32 = 1.2;

/// Resolution pages are laid out and rendered at when zoom is 1.0
pub const DEFAULT_RENDER_DPI: f32 = 96.0;

/// Selection tolerance in view units
pub const HIT_TOLERANCE: f32 = 4.0;

/// Side of a sticky note in points
pub const NOTE_SIZE: f32 = 24.0;

/// Point in view space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPoint {
    pub x: f32,
    pub y: f32,
}

impl ViewPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Rectangle in view space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewRect {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, point: ViewPoint) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.bottom()
    }
}

/// Page positions for the current page list, zoom and viewport width
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    zoom: f32,
    dpi: f32,
    viewport_width: f32,
    pages: Vec<PageEntry>,
    slots: Vec<ViewRect>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_DPI)
    }
}

impl Canvas {
    pub fn new(dpi: f32) -> Self {
        Self { zoom: 1.0, dpi: dpi.max(1.0), viewport_width: 0.0, pages: Vec::new(), slots: Vec::new() }
    }

    /// Replace the page list, e.g. after open, reorder or rotation
    pub fn set_pages(&mut self, pages: &[PageEntry]) {
        self.pages = pages.to_vec();
        self.relayout();
    }

    pub fn set_viewport_width(&mut self, width: f32) {
        if (width - self.viewport_width).abs() > f32::EPSILON {
            self.viewport_width = width.max(0.0);
            self.relayout();
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Set the zoom factor, clamped to [`MIN_ZOOM`]..=[`MAX_ZOOM`]
    pub fn set_zoom(&mut self, zoom: f32) {
        let zoom = if zoom.is_finite() { zoom.clamp(MIN_ZOOM, MAX_ZOOM) } else { 1.0 };
        if zoom != self.zoom {
            self.zoom = zoom;
            self.relayout();
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom * ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom / ZOOM_STEP);
    }

    pub fn reset_zoom(&mut self) {
        self.set_zoom(1.0);
    }

    /// View units per point
    pub fn scale(&self) -> f32 {
        self.zoom * self.dpi / 72.0
    }

    /// Zoom at which the widest page fills the viewport width
    pub fn fit_width_zoom(&self, viewport_width: f32) -> f32 {
        let widest = self.pages.iter().map(|p| p.display_size().width_pt).fold(0.0, f32::max);
        if widest <= 0.0 || viewport_width <= 2.0 * PAGE_GAP {
            return 1.0;
        }
        let base = self.dpi / 72.0;
        ((viewport_width - 2.0 * PAGE_GAP) / (widest * base)).clamp(MIN_ZOOM, MAX_ZOOM)
    }

    /// Zoom at which page `index` fits the viewport entirely
    pub fn fit_page_zoom(&self, index: usize, viewport_width: f32, viewport_height: f32) -> f32 {
        let Some(page) = self.pages.get(index) else {
            return 1.0;
        };
        let size = page.display_size();
        if viewport_width <= 2.0 * PAGE_GAP || viewport_height <= 2.0 * PAGE_GAP {
            return 1.0;
        }
        let base = self.dpi / 72.0;
        let width = (viewport_width - 2.0 * PAGE_GAP) / (size.width_pt * base);
        let height = (viewport_height - 2.0 * PAGE_GAP) / (size.height_pt * base);
        width.min(height).clamp(MIN_ZOOM, MAX_ZOOM)
    }

    fn relayout(&mut self) {
        let scale = self.scale();
        let widest = self.pages.iter().map(|p| p.display_size().width_pt * scale).fold(0.0, f32::max);
        let content_width = self.viewport_width.max(widest + 2.0 * PAGE_GAP);

        let mut top = PAGE_GAP;
        self.slots = self
            .pages
            .iter()
            .map(|page| {
                let size = page.display_size();
                let (width, height) = (size.width_pt * scale, size.height_pt * scale);
                let slot = ViewRect { x: (content_width - width) / 2.0, y: top, width, height };
                top += height + PAGE_GAP;
                slot
            })
            .collect();
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Where page `index` is drawn
    pub fn page_rect(&self, index: usize) -> Option<ViewRect> {
        self.slots.get(index).copied()
    }

    /// Height of the whole scrollable strip
    pub fn content_height(&self) -> f32 {
        self.slots.last().map_or(0.0, |slot| slot.bottom() + PAGE_GAP)
    }

    pub fn content_width(&self) -> f32 {
        self.slots.iter().map(|slot| slot.x * 2.0 + slot.width).fold(self.viewport_width, f32::max)
    }

    /// Pages intersecting the scrolled window
    pub fn visible_pages(&self, scroll_offset: f32, viewport_height: f32) -> Range<usize> {
        let bottom = scroll_offset + viewport_height.max(0.0);
        let first = self.slots.iter().position(|slot| slot.bottom() >= scroll_offset);
        match first {
            Some(first) => {
                let end = self.slots[first..]
                    .iter()
                    .position(|slot| slot.y > bottom)
                    .map_or(self.slots.len(), |offset| first + offset);
                first..end.max(first + 1).min(self.slots.len())
            }
            None => self.slots.len()..self.slots.len(),
        }
    }

    /// Page under the middle of the scrolled window
    pub fn current_page(&self, scroll_offset: f32, viewport_height: f32) -> usize {
        let center = scroll_offset + viewport_height / 2.0;
        self.slots
            .iter()
            .position(|slot| center <= slot.bottom() + PAGE_GAP / 2.0)
            .unwrap_or(self.slots.len().saturating_sub(1))
    }

    /// Scroll offset that brings page `index` to the top of the window
    pub fn scroll_offset_for(&self, index: usize) -> f32 {
        self.slots.get(index).map_or(0.0, |slot| (slot.y - PAGE_GAP).max(0.0))
    }

    /// Page and page-space point under a view point, if any
    pub fn view_to_page(&self, point: ViewPoint) -> Option<(usize, PageCoordinate)> {
        let index = self.slots.iter().position(|slot| slot.contains(point))?;
        Some((index, self.view_to_page_on(index, point)?))
    }

    /// Page-space point for a view point relative to page `index`, which may
    /// lie outside the page
    pub fn view_to_page_on(&self, index: usize, point: ViewPoint) -> Option<PageCoordinate> {
        let slot = self.slots.get(index)?;
        let scale = self.scale();
        let display = PageCoordinate::new((point.x - slot.x) / scale, (point.y - slot.y) / scale);
        Some(self.pages[index].display_to_page(display))
    }

    pub fn page_to_view(&self, index: usize, point: PageCoordinate) -> Option<ViewPoint> {
        let slot = self.slots.get(index)?;
        let scale = self.scale();
        let display = self.pages[index].page_to_display(point);
        Some(ViewPoint::new(slot.x + display.x * scale, slot.y + display.y * scale))
    }

    /// View rectangle covering a page-space rectangle
    pub fn page_rect_to_view(&self, index: usize, rect: PageRect) -> Option<ViewRect> {
        let corners = rect.corners().map(|corner| self.page_to_view(index, corner));
        let mut xs = corners.iter().flatten().map(|p| p.x);
        let first_x = xs.next()?;
        let (min_x, max_x) = xs.fold((first_x, first_x), |(lo, hi), x| (lo.min(x), hi.max(x)));
        let ys = corners.iter().flatten().map(|p| p.y);
        let (min_y, max_y) = ys.fold((f32::MAX, f32::MIN), |(lo, hi), y| (lo.min(y), hi.max(y)));
        Some(ViewRect { x: min_x, y: min_y, width: max_x - min_x, height: max_y - min_y })
    }

    /// Clamp a page-space point into page `index`
    pub fn clamp_to_page(&self, index: usize, point: PageCoordinate) -> Option<PageCoordinate> {
        let page = self.pages.get(index)?;
        Some(PageCoordinate::new(point.x.clamp(0.0, page.width), point.y.clamp(0.0, page.height)))
    }

    /// Hit tolerance in points at the current zoom
    pub fn page_tolerance(&self) -> f32 {
        HIT_TOLERANCE / self.scale()
    }

    /// Topmost visible annotation under `point`
    pub fn hit_test(&self, session: &EditSession, point: ViewPoint) -> Option<AnnotationId> {
        let (index, page_point) = self.view_to_page(point)?;
        session
            .annotations()
            .hit_test(index as u16, &page_point, self.page_tolerance())
            .first()
            .map(|annotation| annotation.id())
    }

    /// Add an overlay item, clamped into its page
    pub fn add_item(&self, session: &mut EditSession, annotation: Annotation) -> EditorResult<AnnotationId> {
        let page = session.page(usize::from(annotation.page_index()))?;
        let geometry = annotation.geometry().clamped(page.width, page.height);
        let annotation = if &geometry == annotation.geometry() {
            annotation
        } else {
            annotation.with_geometry(geometry)
        };
        let id = annotation.id();
        session.add_annotation(annotation)?;
        Ok(id)
    }

    pub fn remove_item(&self, session: &mut EditSession, id: AnnotationId) -> EditorResult<()> {
        session.remove_annotation(id)
    }

    /// Eraser: remove whatever is under `point`
    pub fn erase_at(&self, session: &mut EditSession, point: ViewPoint) -> EditorResult<Option<AnnotationId>> {
        match self.hit_test(session, point) {
            Some(id) => {
                session.remove_annotation(id)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn page(&self, index: usize) -> EditorResult<&PageEntry> {
        self.pages
            .get(index)
            .ok_or(EditorError::PageOutOfRange { page: index, page_count: self.pages.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationGeometry, AnnotationKind, AnnotationStyle};
    use crate::session::tests::session;
    use pdf_engine::PageSize;
    use proptest::prelude::*;

    fn letter(rotation: u16) -> PageEntry {
        PageEntry::new(1, PageSize::new(612.0, 792.0), rotation)
    }

    /// 72 dpi so one point is one view unit at zoom 1
    fn canvas(pages: &[PageEntry]) -> Canvas {
        let mut canvas = Canvas::new(72.0);
        canvas.set_viewport_width(800.0);
        canvas.set_pages(pages);
        canvas
    }

    #[test]
    fn test_layout_stacks_pages() {
        let canvas = canvas(&[letter(0), letter(90)]);

        let first = canvas.page_rect(0).unwrap();
        let second = canvas.page_rect(1).unwrap();
        assert_eq!(first.y, PAGE_GAP);
        // The rotated page is wider than the viewport and sets the strip width
        assert_eq!(first.x, (792.0 + 2.0 * PAGE_GAP - 612.0) / 2.0);
        assert_eq!(second.y, PAGE_GAP + 792.0 + PAGE_GAP);
        assert_eq!((second.width, second.height), (792.0, 612.0));
        assert_eq!(canvas.content_height(), second.bottom() + PAGE_GAP);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut canvas = canvas(&[letter(0)]);
        for _ in 0..20 {
            canvas.zoom_in();
        }
        assert_eq!(canvas.zoom(), MAX_ZOOM);
        for _ in 0..40 {
            canvas.zoom_out();
        }
        assert_eq!(canvas.zoom(), MIN_ZOOM);
        canvas.reset_zoom();
        assert_eq!(canvas.zoom(), 1.0);

        canvas.zoom_in();
        assert!((canvas.zoom() - 1.2).abs() < 1e-6);
        assert!((canvas.page_rect(0).unwrap().width - 612.0 * 1.2).abs() < 1e-3);
    }

    #[test]
    fn test_fit_zooms() {
        let canvas = canvas(&[letter(0)]);
        let fit_width = canvas.fit_width_zoom(612.0 + 2.0 * PAGE_GAP);
        assert!((fit_width - 1.0).abs() < 1e-6);

        let fit_page = canvas.fit_page_zoom(0, 2000.0, 792.0 / 2.0 + 2.0 * PAGE_GAP);
        assert!((fit_page - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_visible_and_current_pages() {
        let canvas = canvas(&[letter(0), letter(0), letter(0)]);

        assert_eq!(canvas.visible_pages(0.0, 500.0), 0..1);
        assert_eq!(canvas.visible_pages(700.0, 300.0), 0..2);
        assert_eq!(canvas.visible_pages(10_000.0, 300.0), 3..3);
        assert_eq!(canvas.current_page(900.0, 400.0), 1);
        assert_eq!(canvas.scroll_offset_for(2), 2.0 * (792.0 + PAGE_GAP));
    }

    #[test]
    fn test_view_to_page_outside_pages() {
        let canvas = canvas(&[letter(0)]);
        assert_eq!(canvas.view_to_page(ViewPoint::new(5.0, 5.0)), None);
    }

    #[test]
    fn test_rotated_page_mapping() {
        let canvas = canvas(&[letter(90)]);
        let slot = canvas.page_rect(0).unwrap();

        // Top-left of the displayed page is the bottom-left corner of the page
        let (index, point) = canvas.view_to_page(ViewPoint::new(slot.x, slot.y)).unwrap();
        assert_eq!(index, 0);
        assert!((point.x - 0.0).abs() < 1e-3);
        assert!((point.y - 792.0).abs() < 1e-3);
    }

    #[test]
    fn test_clamp_to_page() {
        let canvas = canvas(&[letter(0)]);
        let clamped = canvas.clamp_to_page(0, PageCoordinate::new(-5.0, 900.0)).unwrap();
        assert_eq!(clamped, PageCoordinate::new(0.0, 792.0));
        assert_eq!(canvas.clamp_to_page(3, PageCoordinate::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_add_item_clamps_and_hit_test_finds_it() {
        let mut session = session(1);
        let canvas = canvas(session.pages());
        let item = Annotation::new(
            0,
            AnnotationKind::Rectangle,
            AnnotationGeometry::rect(PageRect::new(580.0, 10.0, 100.0, 50.0)),
            AnnotationStyle::red_markup(),
        );

        let id = canvas.add_item(&mut session, item).unwrap();
        let stored = session.annotations().get(id).unwrap();
        assert_eq!(stored.bounding_box(), PageRect::new(512.0, 10.0, 100.0, 50.0));

        let inside = canvas.page_to_view(0, PageCoordinate::new(550.0, 30.0)).unwrap();
        assert_eq!(canvas.hit_test(&session, inside), Some(id));

        let outside = canvas.page_to_view(0, PageCoordinate::new(100.0, 400.0)).unwrap();
        assert_eq!(canvas.hit_test(&session, outside), None);

        assert_eq!(canvas.erase_at(&mut session, inside).unwrap(), Some(id));
        assert!(session.annotations().is_empty());
        session.undo().unwrap();
        assert!(session.annotations().contains(id));
    }

    #[test]
    fn test_add_item_on_missing_page() {
        let mut session = session(1);
        let canvas = canvas(session.pages());
        let item = Annotation::new(
            2,
            AnnotationKind::Rectangle,
            AnnotationGeometry::rect(PageRect::new(0.0, 0.0, 10.0, 10.0)),
            AnnotationStyle::new(),
        );
        assert!(matches!(canvas.add_item(&mut session, item), Err(EditorError::PageOutOfRange { .. })));
    }

    proptest! {
        #[test]
        fn view_page_round_trip(
            rotation in prop::sample::select(vec![0_u16, 90, 180, 270]),
            zoom in 0.5_f32..5.0,
            x in 0.0_f32..612.0,
            y in 0.0_f32..792.0,
        ) {
            let mut canvas = canvas(&[letter(0), letter(rotation)]);
            canvas.set_zoom(zoom);
            let point = PageCoordinate::new(x, y);

            let view = canvas.page_to_view(1, point).unwrap();
            let (index, back) = canvas.view_to_page(view).unwrap();

            prop_assert_eq!(index, 1);
            prop_assert!((back.x - x).abs() < 1e-2);
            prop_assert!((back.y - y).abs() < 1e-2);
        }
    }
}
