//! Reversible edit commands
//!
//! Every change to an open document goes through an [`EditCommand`]. Each
//! command validates everything up front and then mutates, so a rejected
//! command leaves [`DocumentState`] exactly as it was. `Batch` applies its
//! parts in order and rolls back the applied prefix if a later part fails.

use crate::annotation::{Annotation, AnnotationCollection, AnnotationId};
use crate::error::{EditorError, EditorResult};
use crate::history::Reversible;
use crate::pages::{check_page, PageEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The mutable part of an open document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentState {
    pub pages: Vec<PageEntry>,
    pub annotations: AnnotationCollection,
}

impl DocumentState {
    pub fn new(pages: Vec<PageEntry>, annotations: AnnotationCollection) -> Self {
        Self { pages, annotations }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// A page removed by [`EditCommand::DeletePages`], kept so it can be restored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedPage {
    /// Display index the page had before deletion
    pub index: usize,
    pub entry: PageEntry,
    /// Annotations that lived on the page
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    AddAnnotations(Vec<Annotation>),
    RemoveAnnotations(Vec<Annotation>),
    ModifyAnnotation { before: Annotation, after: Annotation },
    MovePage { from: usize, to: usize },
    /// `order[new_index] = old_index`
    ReorderPages { order: Vec<usize> },
    /// Clockwise quarter turns, negative for counter-clockwise
    RotatePages { pages: Vec<usize>, quarter_turns: i32 },
    /// Sorted by ascending `index`
    DeletePages { removed: Vec<RemovedPage> },
    RestorePages { removed: Vec<RemovedPage> },
    Batch(String, Vec<EditCommand>),
}

impl EditCommand {
    /// Capture the pages at `indices` (and their annotations) for deletion
    pub fn delete_pages(state: &DocumentState, indices: &[usize]) -> EditorResult<Self> {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        if sorted.is_empty() {
            return Err(EditorError::invalid("no pages selected"));
        }
        for &index in &sorted {
            check_page(index, state.page_count())?;
        }
        if sorted.len() >= state.page_count() {
            return Err(EditorError::invalid("a document must keep at least one page"));
        }

        let removed = sorted
            .into_iter()
            .map(|index| RemovedPage {
                index,
                entry: state.pages[index],
                annotations: state
                    .annotations
                    .get_page_annotations(index as u16)
                    .into_iter()
                    .cloned()
                    .collect(),
            })
            .collect();

        Ok(EditCommand::DeletePages { removed })
    }

    fn apply_inner(&self, state: &mut DocumentState) -> EditorResult<()> {
        match self {
            EditCommand::AddAnnotations(annotations) => {
                let mut seen = HashSet::new();
                for annotation in annotations {
                    check_page(usize::from(annotation.page_index()), state.page_count())?;
                    if state.annotations.contains(annotation.id()) || !seen.insert(annotation.id())
                    {
                        return Err(EditorError::invalid(format!(
                            "annotation {} already exists",
                            annotation.id()
                        )));
                    }
                }
                for annotation in annotations {
                    state.annotations.add(annotation.clone());
                }
            }

            EditCommand::RemoveAnnotations(annotations) => {
                for annotation in annotations {
                    ensure_present(state, annotation.id())?;
                }
                for annotation in annotations {
                    state.annotations.remove(annotation.id());
                }
            }

            EditCommand::ModifyAnnotation { before, after } => {
                if before.id() != after.id() {
                    return Err(EditorError::invalid("modification must keep the annotation id"));
                }
                ensure_present(state, before.id())?;
                check_page(usize::from(after.page_index()), state.page_count())?;
                state.annotations.add(after.clone());
            }

            EditCommand::MovePage { from, to } => {
                check_page(*from, state.page_count())?;
                check_page(*to, state.page_count())?;
                let mut order: Vec<usize> = (0..state.page_count()).collect();
                let moved = order.remove(*from);
                order.insert(*to, moved);
                reorder(state, &order);
            }

            EditCommand::ReorderPages { order } => {
                validate_permutation(order, state.page_count())?;
                reorder(state, order);
            }

            EditCommand::RotatePages { pages, quarter_turns } => {
                for &index in pages {
                    check_page(index, state.page_count())?;
                }
                for &index in pages {
                    state.pages[index] = state.pages[index].rotated_by(*quarter_turns);
                }
            }

            EditCommand::DeletePages { removed } => {
                let indices: Vec<usize> = removed.iter().map(|r| r.index).collect();
                for &index in &indices {
                    check_page(index, state.page_count())?;
                }
                if indices.len() >= state.page_count() {
                    return Err(EditorError::invalid("a document must keep at least one page"));
                }

                for page in removed {
                    for annotation in &page.annotations {
                        state.annotations.remove(annotation.id());
                    }
                }
                for &index in indices.iter().rev() {
                    state.pages.remove(index);
                }
                state.annotations.remap_pages(|old| {
                    let below = indices.iter().filter(|&&i| i < usize::from(old)).count();
                    old - below as u16
                });
            }

            EditCommand::RestorePages { removed } => {
                let final_count = state.page_count() + removed.len();
                for page in removed {
                    check_page(page.index, final_count)?;
                }

                // Survivors shift up past every restored index at or below them
                let indices: Vec<usize> = removed.iter().map(|r| r.index).collect();
                state.annotations.remap_pages(|current| {
                    let mut index = usize::from(current);
                    for &restored in &indices {
                        if restored <= index {
                            index += 1;
                        }
                    }
                    index as u16
                });
                for page in removed {
                    state.pages.insert(page.index, page.entry);
                    for annotation in &page.annotations {
                        state.annotations.add(annotation.clone());
                    }
                }
            }

            EditCommand::Batch(_, commands) => {
                for (applied, command) in commands.iter().enumerate() {
                    if let Err(err) = command.apply_inner(state) {
                        for done in commands[..applied].iter().rev() {
                            if let Err(rollback) = done.inverse().apply_inner(state) {
                                tracing::error!(%rollback, "batch rollback failed");
                            }
                        }
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }
}

fn ensure_present(state: &DocumentState, id: AnnotationId) -> EditorResult<()> {
    if state.annotations.contains(id) {
        Ok(())
    } else {
        Err(EditorError::AnnotationNotFound(id))
    }
}

fn validate_permutation(order: &[usize], page_count: usize) -> EditorResult<()> {
    if order.len() != page_count {
        return Err(EditorError::invalid(format!(
            "page order lists {} pages, document has {page_count}",
            order.len()
        )));
    }
    let mut seen = vec![false; page_count];
    for &old in order {
        check_page(old, page_count)?;
        if std::mem::replace(&mut seen[old], true) {
            return Err(EditorError::invalid(format!("page {} listed twice", old + 1)));
        }
    }
    Ok(())
}

fn reorder(state: &mut DocumentState, order: &[usize]) {
    let mut new_index_of = vec![0u16; order.len()];
    for (new_index, &old_index) in order.iter().enumerate() {
        new_index_of[old_index] = new_index as u16;
    }
    state.pages = order.iter().map(|&old| state.pages[old]).collect();
    state.annotations.remap_pages(|old| new_index_of.get(usize::from(old)).copied().unwrap_or(old));
}

fn inverse_permutation(order: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; order.len()];
    for (new_index, &old_index) in order.iter().enumerate() {
        if let Some(slot) = inverse.get_mut(old_index) {
            *slot = new_index;
        }
    }
    inverse
}

impl Reversible for EditCommand {
    type Target = DocumentState;

    fn apply(&self, target: &mut DocumentState) -> EditorResult<()> {
        self.apply_inner(target)
    }

    fn inverse(&self) -> Self {
        match self {
            EditCommand::AddAnnotations(a) => EditCommand::RemoveAnnotations(a.clone()),
            EditCommand::RemoveAnnotations(a) => EditCommand::AddAnnotations(a.clone()),
            EditCommand::ModifyAnnotation { before, after } => {
                EditCommand::ModifyAnnotation { before: after.clone(), after: before.clone() }
            }
            EditCommand::MovePage { from, to } => EditCommand::MovePage { from: *to, to: *from },
            EditCommand::ReorderPages { order } => {
                EditCommand::ReorderPages { order: inverse_permutation(order) }
            }
            EditCommand::RotatePages { pages, quarter_turns } => {
                EditCommand::RotatePages { pages: pages.clone(), quarter_turns: -quarter_turns }
            }
            EditCommand::DeletePages { removed } => {
                EditCommand::RestorePages { removed: removed.clone() }
            }
            EditCommand::RestorePages { removed } => {
                EditCommand::DeletePages { removed: removed.clone() }
            }
            EditCommand::Batch(label, commands) => EditCommand::Batch(
                label.clone(),
                commands.iter().rev().map(Reversible::inverse).collect(),
            ),
        }
    }

    fn label(&self) -> String {
        match self {
            EditCommand::AddAnnotations(a) => match a.as_slice() {
                [one] => format!("Add {}", one.kind().label()),
                many => format!("Add {} Items", many.len()),
            },
            EditCommand::RemoveAnnotations(a) => match a.as_slice() {
                [one] => format!("Delete {}", one.kind().label()),
                many => format!("Delete {} Items", many.len()),
            },
            EditCommand::ModifyAnnotation { after, .. } => format!("Edit {}", after.kind().label()),
            EditCommand::MovePage { .. } => "Move Page".to_string(),
            EditCommand::ReorderPages { .. } => "Reorder Pages".to_string(),
            EditCommand::RotatePages { .. } => "Rotate Pages".to_string(),
            EditCommand::DeletePages { removed } if removed.len() == 1 => "Delete Page".to_string(),
            EditCommand::DeletePages { .. } => "Delete Pages".to_string(),
            EditCommand::RestorePages { .. } => "Restore Pages".to_string(),
            EditCommand::Batch(label, _) => label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{
        AnnotationGeometry, AnnotationKind, AnnotationStyle, LinkTarget, PageRect,
    };
    use pdf_engine::PageSize;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn state(pages: usize) -> DocumentState {
        let pages = (0..pages)
            .map(|i| PageEntry::new(i as u32 + 1, PageSize::new(612.0, 792.0), 0))
            .collect();
        DocumentState::new(pages, AnnotationCollection::new())
    }

    fn rect_on(page: u16) -> Annotation {
        Annotation::new(
            page,
            AnnotationKind::Rectangle,
            AnnotationGeometry::rect(PageRect::new(10.0, 10.0, 50.0, 50.0)),
            AnnotationStyle::red_markup(),
        )
    }

    fn sources(state: &DocumentState) -> Vec<u32> {
        state.pages.iter().map(|p| p.source).collect()
    }

    #[test]
    fn test_add_then_inverse_removes() {
        let mut doc = state(2);
        let original = doc.clone();
        let add = EditCommand::AddAnnotations(vec![rect_on(0), rect_on(1)]);

        add.apply(&mut doc).unwrap();
        assert_eq!(doc.annotations.len(), 2);

        add.inverse().apply(&mut doc).unwrap();
        assert_eq!(doc, original);
    }

    #[test]
    fn test_add_rejects_out_of_range_page_without_changes() {
        let mut doc = state(1);
        let command = EditCommand::AddAnnotations(vec![rect_on(0), rect_on(5)]);

        let err = command.apply(&mut doc).unwrap_err();
        assert!(matches!(err, EditorError::PageOutOfRange { page: 5, .. }));
        assert!(doc.annotations.is_empty());
    }

    #[test]
    fn test_remove_missing_annotation_fails() {
        let mut doc = state(1);
        let command = EditCommand::RemoveAnnotations(vec![rect_on(0)]);
        assert!(matches!(command.apply(&mut doc), Err(EditorError::AnnotationNotFound(_))));
    }

    #[test]
    fn test_modify_swaps_versions() {
        let mut doc = state(1);
        let before = rect_on(0);
        EditCommand::AddAnnotations(vec![before.clone()]).apply(&mut doc).unwrap();

        let after = before.with_geometry(AnnotationGeometry::rect(PageRect::new(0.0, 0.0, 5.0, 5.0)));
        let modify = EditCommand::ModifyAnnotation { before: before.clone(), after: after.clone() };
        modify.apply(&mut doc).unwrap();
        assert_eq!(doc.annotations.get(before.id()), Some(&after));

        modify.inverse().apply(&mut doc).unwrap();
        assert_eq!(doc.annotations.get(before.id()), Some(&before));
    }

    #[test]
    fn test_move_page_carries_annotations() {
        let mut doc = state(3);
        let annotation = rect_on(0);
        EditCommand::AddAnnotations(vec![annotation.clone()]).apply(&mut doc).unwrap();

        EditCommand::MovePage { from: 0, to: 2 }.apply(&mut doc).unwrap();

        assert_eq!(sources(&doc), vec![2, 3, 1]);
        assert_eq!(doc.annotations.get(annotation.id()).unwrap().page_index(), 2);
    }

    #[test]
    fn test_reorder_rejects_non_permutation() {
        let mut doc = state(3);
        let err = EditCommand::ReorderPages { order: vec![0, 0, 1] }.apply(&mut doc).unwrap_err();
        assert!(matches!(err, EditorError::InvalidInput(_)));
        assert_eq!(sources(&doc), vec![1, 2, 3]);

        let short = EditCommand::ReorderPages { order: vec![1, 0] };
        assert!(short.apply(&mut doc).is_err());
    }

    #[test]
    fn test_rotate_and_back() {
        let mut doc = state(2);
        let rotate = EditCommand::RotatePages { pages: vec![1], quarter_turns: 1 };
        rotate.apply(&mut doc).unwrap();
        assert_eq!(doc.pages[1].rotation, 90);
        assert_eq!(doc.pages[0].rotation, 0);

        rotate.inverse().apply(&mut doc).unwrap();
        assert_eq!(doc.pages[1].rotation, 0);
    }

    #[test]
    fn test_delete_and_restore_pages() {
        let mut doc = state(4);
        let on_deleted = rect_on(1);
        let on_last = rect_on(3);
        let link = Annotation::new(
            0,
            AnnotationKind::Link { target: LinkTarget::Page(3) },
            AnnotationGeometry::rect(PageRect::new(0.0, 0.0, 10.0, 10.0)),
            AnnotationStyle::new(),
        );
        EditCommand::AddAnnotations(vec![on_deleted.clone(), on_last.clone(), link.clone()])
            .apply(&mut doc)
            .unwrap();
        let original = doc.clone();

        let delete = EditCommand::delete_pages(&doc, &[2, 1]).unwrap();
        delete.apply(&mut doc).unwrap();

        assert_eq!(sources(&doc), vec![1, 4]);
        assert!(!doc.annotations.contains(on_deleted.id()));
        assert_eq!(doc.annotations.get(on_last.id()).unwrap().page_index(), 1);
        assert_eq!(
            doc.annotations.get(link.id()).unwrap().kind(),
            &AnnotationKind::Link { target: LinkTarget::Page(1) }
        );

        delete.inverse().apply(&mut doc).unwrap();
        assert_eq!(doc, original);
    }

    #[test]
    fn test_cannot_delete_every_page() {
        let doc = state(2);
        assert!(EditCommand::delete_pages(&doc, &[0, 1]).is_err());
        assert!(EditCommand::delete_pages(&doc, &[]).is_err());
        assert!(EditCommand::delete_pages(&doc, &[7]).is_err());
    }

    #[test]
    fn test_failing_batch_rolls_back() {
        let mut doc = state(2);
        let original = doc.clone();
        let batch = EditCommand::Batch(
            "Mixed".into(),
            vec![
                EditCommand::AddAnnotations(vec![rect_on(0)]),
                EditCommand::RotatePages { pages: vec![0], quarter_turns: 1 },
                EditCommand::RemoveAnnotations(vec![rect_on(1)]),
            ],
        );

        assert!(batch.apply(&mut doc).is_err());
        assert_eq!(doc, original);
    }

    #[test]
    fn test_labels() {
        assert_eq!(EditCommand::AddAnnotations(vec![rect_on(0)]).label(), "Add Rectangle");
        assert_eq!(
            EditCommand::RemoveAnnotations(vec![rect_on(0), rect_on(0)]).label(),
            "Delete 2 Items"
        );
        assert_eq!(EditCommand::Batch("Add Watermark".into(), vec![]).label(), "Add Watermark");
    }

    fn permutation(len: usize) -> impl Strategy<Value = Vec<usize>> {
        Just((0..len).collect::<Vec<_>>()).prop_shuffle()
    }

    proptest! {
        #[test]
        fn prop_reorder_then_inverse_restores_order(
            order in (1usize..12).prop_flat_map(permutation),
        ) {
            let mut doc = state(order.len());
            for page in 0..order.len() {
                EditCommand::AddAnnotations(vec![rect_on(page as u16)]).apply(&mut doc).unwrap();
            }
            let original = doc.clone();

            let reorder = EditCommand::ReorderPages { order: order.clone() };
            reorder.apply(&mut doc).unwrap();
            let expected: Vec<u32> = order.iter().map(|&old| old as u32 + 1).collect();
            prop_assert_eq!(sources(&doc), expected);

            reorder.inverse().apply(&mut doc).unwrap();
            prop_assert_eq!(doc, original);
        }

        #[test]
        fn prop_move_page_inverse(len in 1usize..10, from in 0usize..10, to in 0usize..10) {
            let (from, to) = (from % len, to % len);
            let mut doc = state(len);
            let original = doc.clone();
            let command = EditCommand::MovePage { from, to };
            command.apply(&mut doc).unwrap();
            command.inverse().apply(&mut doc).unwrap();
            prop_assert_eq!(doc, original);
        }
    }
}
