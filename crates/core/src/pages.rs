//! Page list entries and page-space transforms for rotated pages

use crate::error::{EditorError, EditorResult};
use pdf_engine::PageSize;
use serde::{Deserialize, Serialize};

use crate::annotation::{PageCoordinate, PageRect};

/// One page as the session shows it
///
/// Page operations never touch the base document until save; they only
/// reorder, rotate or drop these entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    /// 1-based page number in the base document
    pub source: u32,
    /// Unrotated MediaBox width in points
    pub width: f32,
    /// Unrotated MediaBox height in points
    pub height: f32,
    /// Clockwise rotation in degrees: 0, 90, 180 or 270
    pub rotation: u16,
}

impl PageEntry {
    pub fn new(source: u32, size: PageSize, rotation: u16) -> Self {
        Self {
            source,
            width: size.width_pt,
            height: size.height_pt,
            rotation: normalize_rotation(i32::from(rotation)),
        }
    }

    /// Unrotated size; the space annotation geometry lives in
    pub fn size(&self) -> PageSize {
        PageSize::new(self.width, self.height)
    }

    /// Size as displayed, with width and height swapped for 90/270
    pub fn display_size(&self) -> PageSize {
        self.size().rotated(self.rotation)
    }

    pub fn rotated_by(&self, quarter_turns: i32) -> Self {
        Self {
            rotation: normalize_rotation(i32::from(self.rotation) + quarter_turns * 90),
            ..*self
        }
    }

    /// Map a point of the displayed (rotated) page into page space
    pub fn display_to_page(&self, point: PageCoordinate) -> PageCoordinate {
        let (w, h) = (self.width, self.height);
        match self.rotation {
            90 => PageCoordinate::new(point.y, h - point.x),
            180 => PageCoordinate::new(w - point.x, h - point.y),
            270 => PageCoordinate::new(w - point.y, point.x),
            _ => point,
        }
    }

    /// Map a page-space point onto the displayed (rotated) page
    pub fn page_to_display(&self, point: PageCoordinate) -> PageCoordinate {
        let (w, h) = (self.width, self.height);
        match self.rotation {
            90 => PageCoordinate::new(h - point.y, point.x),
            180 => PageCoordinate::new(w - point.x, h - point.y),
            270 => PageCoordinate::new(point.y, w - point.x),
            _ => point,
        }
    }

    /// Place a box laid out on the displayed page into page space
    ///
    /// Returns the unrotated box (same size, moved to the mapped center) and
    /// the item rotation that keeps its content upright on screen.
    pub fn display_box_to_page(&self, display: PageRect, rotation: f32) -> (PageRect, f32) {
        let center = self.display_to_page(display.center());
        let page_rotation = f32::from(self.rotation);
        let mut item_rotation = rotation - page_rotation;
        if item_rotation <= -180.0 {
            item_rotation += 360.0;
        }
        (PageRect::centered(center, display.width, display.height), item_rotation)
    }
}

/// Normalizes any multiple of 90 degrees into 0..360
pub fn normalize_rotation(degrees: i32) -> u16 {
    (degrees.rem_euclid(360) / 90 * 90) as u16
}

/// Checks that `index` addresses one of `page_count` pages
pub fn check_page(index: usize, page_count: usize) -> EditorResult<()> {
    if index < page_count {
        Ok(())
    } else {
        Err(EditorError::PageOutOfRange { page: index, page_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(rotation: u16) -> PageEntry {
        PageEntry::new(1, PageSize::new(612.0, 792.0), rotation)
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(360), 0);
    }

    #[test]
    fn test_display_size_swaps_for_quarter_turns() {
        assert_eq!(letter(90).display_size(), PageSize::new(792.0, 612.0));
        assert_eq!(letter(180).display_size(), PageSize::new(612.0, 792.0));
        assert_eq!(letter(0).rotated_by(-1).rotation, 270);
    }

    #[test]
    fn test_display_transforms_roundtrip() {
        let point = PageCoordinate::new(100.0, 40.0);
        for rotation in [0, 90, 180, 270] {
            let page = letter(rotation);
            let shown = page.page_to_display(point);
            assert_eq!(page.display_to_page(shown), point, "rotation {rotation}");
        }
    }

    #[test]
    fn test_quarter_turn_moves_bottom_left_to_top_left() {
        let page = letter(90);
        let shown = page.page_to_display(PageCoordinate::new(0.0, 792.0));
        assert_eq!(shown, PageCoordinate::new(0.0, 0.0));
    }

    #[test]
    fn test_display_box_counter_rotates_content() {
        let page = letter(90);
        let (rect, rotation) =
            page.display_box_to_page(PageRect::new(0.0, 0.0, 100.0, 20.0), 0.0);
        assert_eq!(rotation, -90.0);
        assert_eq!(rect.center(), page.display_to_page(PageCoordinate::new(50.0, 10.0)));
        assert_eq!((rect.width, rect.height), (100.0, 20.0));
    }

    #[test]
    fn test_check_page() {
        assert!(check_page(2, 3).is_ok());
        assert!(matches!(
            check_page(3, 3),
            Err(EditorError::PageOutOfRange { page: 3, page_count: 3 })
        ));
    }
}
