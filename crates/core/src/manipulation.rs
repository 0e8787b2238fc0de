//! Annotation manipulation handles and operations
//!
//! A selected rectangle item shows eight resize handles on its bounding box;
//! anywhere else inside the box moves it. Strokes can only be moved.
//! Dragging produces a new geometry and releasing commits it as a single
//! `ModifyAnnotation`.

use crate::annotation::{Annotation, AnnotationGeometry, AnnotationId, PageCoordinate, PageRect};
use crate::error::EditorResult;
use crate::session::EditSession;
use pdf_engine::PageSize;

/// Smallest width or height a resize can produce, in points
pub const MIN_ITEM_SIZE: f32 = 5.0;

/// Type of manipulation handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleType {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,

    Top,
    Bottom,
    Left,
    Right,

    /// The whole bounding box
    Move,
}

impl HandleType {
    /// Which edges of the box this handle drags: (left, top, right, bottom)
    fn edges(self) -> (bool, bool, bool, bool) {
        match self {
            HandleType::TopLeft => (true, true, false, false),
            HandleType::TopRight => (false, true, true, false),
            HandleType::BottomLeft => (true, false, false, true),
            HandleType::BottomRight => (false, false, true, true),
            HandleType::Top => (false, true, false, false),
            HandleType::Bottom => (false, false, false, true),
            HandleType::Left => (true, false, false, false),
            HandleType::Right => (false, false, true, false),
            HandleType::Move => (false, false, false, false),
        }
    }
}

/// Manipulation handle with position and type
#[derive(Debug, Clone, Copy)]
pub struct ManipulationHandle {
    pub handle_type: HandleType,

    /// Position in page coordinates
    pub position: PageCoordinate,

    /// Handle size in page coordinates (radius of hit area)
    pub size: f32,

    pub annotation_id: AnnotationId,
}

impl ManipulationHandle {
    pub fn new(
        handle_type: HandleType,
        position: PageCoordinate,
        size: f32,
        annotation_id: AnnotationId,
    ) -> Self {
        Self { handle_type, position, size, annotation_id }
    }

    /// Check if a point hits this handle
    pub fn hit_test(&self, point: &PageCoordinate, tolerance: f32) -> bool {
        point.distance_to(&self.position) <= self.size + tolerance
    }
}

/// Resize handles for an annotation; empty for strokes
pub fn generate_handles(annotation: &Annotation, handle_size: f32) -> Vec<ManipulationHandle> {
    let AnnotationGeometry::Rectangle { top_left, bottom_right } = annotation.geometry() else {
        return Vec::new();
    };
    let id = annotation.id();
    let center_x = (top_left.x + bottom_right.x) / 2.0;
    let center_y = (top_left.y + bottom_right.y) / 2.0;

    [
        (HandleType::TopLeft, *top_left),
        (HandleType::TopRight, PageCoordinate::new(bottom_right.x, top_left.y)),
        (HandleType::BottomLeft, PageCoordinate::new(top_left.x, bottom_right.y)),
        (HandleType::BottomRight, *bottom_right),
        (HandleType::Top, PageCoordinate::new(center_x, top_left.y)),
        (HandleType::Bottom, PageCoordinate::new(center_x, bottom_right.y)),
        (HandleType::Left, PageCoordinate::new(top_left.x, center_y)),
        (HandleType::Right, PageCoordinate::new(bottom_right.x, center_y)),
    ]
    .into_iter()
    .map(|(handle_type, position)| ManipulationHandle::new(handle_type, position, handle_size, id))
    .collect()
}

/// Handle under `point`, falling back to [`HandleType::Move`] inside the item
pub fn handle_at(
    annotation: &Annotation,
    point: &PageCoordinate,
    handle_size: f32,
    tolerance: f32,
) -> Option<HandleType> {
    generate_handles(annotation, handle_size)
        .iter()
        .find(|handle| handle.hit_test(point, tolerance))
        .map(|handle| handle.handle_type)
        .or_else(|| annotation.hit_test(point, tolerance).then_some(HandleType::Move))
}

/// Active manipulation state
#[derive(Debug, Clone)]
pub struct ManipulationState {
    pub annotation_id: AnnotationId,

    pub handle_type: HandleType,

    /// Annotation as it was when the drag started
    pub original: Annotation,

    /// Unrotated page size the result is clamped into
    pub page_size: PageSize,

    /// Drag start position in page coordinates
    pub drag_start: PageCoordinate,

    pub current_position: PageCoordinate,
}

impl ManipulationState {
    pub fn new(
        original: Annotation,
        handle_type: HandleType,
        page_size: PageSize,
        drag_start: PageCoordinate,
    ) -> Self {
        Self {
            annotation_id: original.id(),
            handle_type,
            original,
            page_size,
            drag_start,
            current_position: drag_start,
        }
    }

    pub fn update_position(&mut self, position: PageCoordinate) {
        self.current_position = position;
    }

    /// Geometry for the current drag position
    pub fn calculate_new_geometry(&self) -> AnnotationGeometry {
        let dx = self.current_position.x - self.drag_start.x;
        let dy = self.current_position.y - self.drag_start.y;
        let (page_w, page_h) = (self.page_size.width_pt, self.page_size.height_pt);
        let geometry = self.original.geometry();

        match (self.handle_type, geometry) {
            (HandleType::Move, _) => {
                // Keep the whole item on the page without squashing it
                let bounds = geometry.bounding_box();
                let dx = dx.clamp(-bounds.x, page_w - bounds.right());
                let dy = dy.clamp(-bounds.y, page_h - bounds.bottom());
                geometry.translated(dx, dy)
            }
            (handle, AnnotationGeometry::Rectangle { .. }) => {
                let b = geometry.bounding_box();
                let (drag_left, drag_top, drag_right, drag_bottom) = handle.edges();
                let (mut left, mut top, mut right, mut bottom) = (b.x, b.y, b.right(), b.bottom());

                if drag_left {
                    left = (left + dx).clamp(0.0, right - MIN_ITEM_SIZE);
                }
                if drag_right {
                    right = (right + dx).clamp(left + MIN_ITEM_SIZE, page_w);
                }
                if drag_top {
                    top = (top + dy).clamp(0.0, bottom - MIN_ITEM_SIZE);
                }
                if drag_bottom {
                    bottom = (bottom + dy).clamp(top + MIN_ITEM_SIZE, page_h);
                }
                AnnotationGeometry::rect(PageRect::new(left, top, right - left, bottom - top))
            }
            _ => geometry.clone(),
        }
    }

    /// The dragged annotation, or `None` when the drag changed nothing
    pub fn result(&self) -> Option<Annotation> {
        let geometry = self.calculate_new_geometry();
        (&geometry != self.original.geometry()).then(|| self.original.with_geometry(geometry))
    }

    /// Push the drag as one undo step; false when nothing moved
    pub fn commit(self, session: &mut EditSession) -> EditorResult<bool> {
        match self.result() {
            Some(after) => session.update_annotation(after),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationKind, AnnotationStyle};
    use crate::session::tests::session;

    const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

    fn rectangle(x: f32, y: f32, w: f32, h: f32) -> Annotation {
        Annotation::new(
            0,
            AnnotationKind::Rectangle,
            AnnotationGeometry::rect(PageRect::new(x, y, w, h)),
            AnnotationStyle::red_markup(),
        )
    }

    fn drag(annotation: &Annotation, handle: HandleType, from: (f32, f32), to: (f32, f32)) -> PageRect {
        let mut state =
            ManipulationState::new(annotation.clone(), handle, LETTER, PageCoordinate::new(from.0, from.1));
        state.update_position(PageCoordinate::new(to.0, to.1));
        state.calculate_new_geometry().bounding_box()
    }

    #[test]
    fn test_handle_hit_test() {
        let handle = ManipulationHandle::new(
            HandleType::TopLeft,
            PageCoordinate::new(100.0, 100.0),
            5.0,
            AnnotationId::new_v4(),
        );

        assert!(handle.hit_test(&PageCoordinate::new(102.0, 102.0), 2.0));
        assert!(!handle.hit_test(&PageCoordinate::new(120.0, 120.0), 2.0));
    }

    #[test]
    fn test_generate_handles_for_rectangle() {
        let handles = generate_handles(&rectangle(0.0, 0.0, 100.0, 100.0), 5.0);
        assert_eq!(handles.len(), 8);
    }

    #[test]
    fn test_strokes_have_no_resize_handles() {
        let stroke = Annotation::new(
            0,
            AnnotationKind::Freehand,
            AnnotationGeometry::Freehand {
                points: vec![PageCoordinate::new(0.0, 0.0), PageCoordinate::new(50.0, 50.0)],
            },
            AnnotationStyle::new(),
        );
        assert!(generate_handles(&stroke, 5.0).is_empty());
        assert_eq!(handle_at(&stroke, &PageCoordinate::new(25.0, 25.0), 5.0, 2.0), Some(HandleType::Move));
    }

    #[test]
    fn test_handle_at_prefers_handles() {
        let item = rectangle(100.0, 100.0, 100.0, 50.0);
        assert_eq!(handle_at(&item, &PageCoordinate::new(201.0, 151.0), 4.0, 1.0), Some(HandleType::BottomRight));
        assert_eq!(handle_at(&item, &PageCoordinate::new(150.0, 125.0), 4.0, 1.0), Some(HandleType::Move));
        assert_eq!(handle_at(&item, &PageCoordinate::new(400.0, 400.0), 4.0, 1.0), None);
    }

    #[test]
    fn test_resize_corner() {
        let item = rectangle(0.0, 0.0, 100.0, 100.0);
        let bounds = drag(&item, HandleType::BottomRight, (100.0, 100.0), (150.0, 150.0));
        assert_eq!(bounds, PageRect::new(0.0, 0.0, 150.0, 150.0));
    }

    #[test]
    fn test_resize_keeps_minimum_size() {
        let item = rectangle(100.0, 100.0, 50.0, 50.0);
        let bounds = drag(&item, HandleType::Left, (100.0, 125.0), (400.0, 125.0));
        assert_eq!(bounds.x, 145.0);
        assert_eq!(bounds.width, MIN_ITEM_SIZE);

        let bounds = drag(&item, HandleType::Bottom, (125.0, 150.0), (125.0, 0.0));
        assert_eq!(bounds.height, MIN_ITEM_SIZE);
    }

    #[test]
    fn test_move_stays_on_page() {
        let item = rectangle(500.0, 700.0, 100.0, 50.0);
        let bounds = drag(&item, HandleType::Move, (550.0, 725.0), (700.0, 900.0));
        assert_eq!(bounds, PageRect::new(512.0, 742.0, 100.0, 50.0));
    }

    #[test]
    fn test_commit_is_one_undo_step() {
        let mut session = session(1);
        let item = rectangle(10.0, 10.0, 40.0, 40.0);
        session.add_annotation(item.clone()).unwrap();

        let mut state =
            ManipulationState::new(item.clone(), HandleType::Move, LETTER, PageCoordinate::new(20.0, 20.0));
        state.update_position(PageCoordinate::new(60.0, 20.0));
        assert!(state.commit(&mut session).unwrap());

        assert_eq!(session.annotations().get(item.id()).unwrap().bounding_box().x, 50.0);
        assert_eq!(session.history().undo_len(), 2);

        session.undo().unwrap();
        assert_eq!(session.annotations().get(item.id()).unwrap().bounding_box().x, 10.0);
    }

    #[test]
    fn test_commit_without_movement_records_nothing() {
        let mut session = session(1);
        let item = rectangle(10.0, 10.0, 40.0, 40.0);
        session.add_annotation(item.clone()).unwrap();

        let state = ManipulationState::new(item, HandleType::Move, LETTER, PageCoordinate::new(20.0, 20.0));
        assert!(!state.commit(&mut session).unwrap());
        assert_eq!(session.history().undo_len(), 1);
    }
}
