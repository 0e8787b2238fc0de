//! The open document and everything done to it
//!
//! An [`EditSession`] owns the parsed base document (with the annotations the
//! editor manages lifted out), the page list, the annotation collection and
//! the undo/redo history. All mutation goes through [`EditSession::apply`],
//! which applies a command and records it only if it succeeded.

use crate::annotation::{Annotation, AnnotationCollection, AnnotationId, AnnotationKind, LinkTarget};
use crate::cancel::CancellationToken;
use crate::command::{DocumentState, EditCommand};
use crate::dialogs::EditDescription;
use crate::error::{EditorError, EditorResult};
use crate::export::{corrupt, page_entries, ExportSnapshot};
use crate::history::{History, HistoryOutcome, Reversible};
use crate::import::lift_page;
use crate::pages::{check_page, PageEntry};
use crate::persistence::{SessionSidecar, SIDECAR_VERSION};
use lopdf::{Document, ObjectId};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How far into the file the `%PDF-` header may appear
const HEADER_SEARCH: usize = 1024;

pub struct EditSession {
    path: Option<PathBuf>,
    original_bytes: Arc<Vec<u8>>,
    base: Arc<Document>,
    state: DocumentState,
    /// State right after opening; saving it again writes the original bytes
    opened_state: DocumentState,
    /// State at the last successful save
    saved_state: DocumentState,
    history: History<EditCommand>,
    author: Option<String>,
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("path", &self.path)
            .field("pages", &self.state.page_count())
            .field("annotations", &self.state.annotations.len())
            .field("modified", &self.is_modified())
            .finish()
    }
}

impl EditSession {
    pub fn open(path: &Path) -> EditorResult<Self> {
        Self::open_with_cancel(path, &CancellationToken::new())
    }

    /// Open a file, checking `cancel` before each page is imported
    pub fn open_with_cancel(path: &Path, cancel: &CancellationToken) -> EditorResult<Self> {
        let bytes = std::fs::read(path)?;
        let mut session = Self::from_bytes_with_cancel(bytes, cancel)?;
        session.path = Some(path.to_path_buf());
        tracing::info!(
            path = %path.display(),
            pages = session.page_count(),
            annotations = session.annotations().len(),
            "opened document"
        );
        Ok(session)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> EditorResult<Self> {
        Self::from_bytes_with_cancel(bytes, &CancellationToken::new())
    }

    pub fn from_bytes_with_cancel(bytes: Vec<u8>, cancel: &CancellationToken) -> EditorResult<Self> {
        let head = &bytes[..bytes.len().min(HEADER_SEARCH)];
        if !head.windows(5).any(|window| window == b"%PDF-") {
            return Err(EditorError::CorruptPdf("missing %PDF header".to_owned()));
        }

        let mut doc = Document::load_mem(&bytes).map_err(corrupt)?;
        if doc.trailer.has(b"Encrypt") {
            return Err(EditorError::CorruptPdf("encrypted documents are not supported".to_owned()));
        }

        let pages = page_entries(&doc);
        if pages.is_empty() {
            return Err(EditorError::CorruptPdf("document has no pages".to_owned()));
        }

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let mut annotations = AnnotationCollection::new();
        for index in 0..page_ids.len() {
            cancel.check()?;
            for annotation in lift_page(&mut doc, index, &page_ids)? {
                annotations.add(annotation);
            }
        }

        let state = DocumentState::new(pages, annotations);
        Ok(Self {
            path: None,
            original_bytes: Arc::new(bytes),
            base: Arc::new(doc),
            opened_state: state.clone(),
            saved_state: state.clone(),
            state,
            history: History::new(),
            author: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// File name for the window title
    pub fn display_name(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_owned())
    }

    /// The parsed document with editor-managed annotations removed
    pub fn base_document(&self) -> &Document {
        &self.base
    }

    /// Bytes the document was opened from
    pub fn original_bytes(&self) -> &[u8] {
        &self.original_bytes
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    pub fn pages(&self) -> &[PageEntry] {
        &self.state.pages
    }

    pub fn page(&self, index: usize) -> EditorResult<&PageEntry> {
        check_page(index, self.page_count())?;
        Ok(&self.state.pages[index])
    }

    pub fn page_count(&self) -> usize {
        self.state.page_count()
    }

    pub fn annotations(&self) -> &AnnotationCollection {
        &self.state.annotations
    }

    pub fn history(&self) -> &History<EditCommand> {
        &self.history
    }

    /// Whether there are changes since the last save
    pub fn is_modified(&self) -> bool {
        self.state != self.saved_state
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Author stamped on new annotations; empty clears it
    pub fn set_author(&mut self, author: impl Into<String>) {
        let author = author.into();
        self.author = (!author.trim().is_empty()).then_some(author);
    }

    pub fn set_history_depth(&mut self, depth: usize) {
        self.history.set_depth(depth);
    }

    /// Apply `command` and record it; a rejected command changes nothing
    pub fn apply(&mut self, command: EditCommand) -> EditorResult<()> {
        command.apply(&mut self.state)?;
        tracing::debug!(label = %command.label(), "applied edit");
        self.history.push(command);
        Ok(())
    }

    /// Add annotations on top of everything already placed
    pub fn add_annotations(&mut self, annotations: Vec<Annotation>) -> EditorResult<()> {
        if annotations.is_empty() {
            return Err(EditorError::invalid("nothing to add"));
        }
        let prepared = self.prepare(annotations);
        self.apply(EditCommand::AddAnnotations(prepared))
    }

    pub fn add_annotation(&mut self, annotation: Annotation) -> EditorResult<()> {
        self.add_annotations(vec![annotation])
    }

    /// Stack new annotations above the existing ones and stamp the author
    fn prepare(&self, annotations: Vec<Annotation>) -> Vec<Annotation> {
        let base_layer = self.state.annotations.next_layer();
        annotations
            .into_iter()
            .enumerate()
            .map(|(offset, mut annotation)| {
                annotation.set_layer(base_layer + offset as u32);
                let unsigned = annotation.metadata().author.is_none();
                match &self.author {
                    Some(author) if unsigned => annotation.with_author(author.clone()),
                    _ => annotation,
                }
            })
            .collect()
    }

    pub fn remove_annotations(&mut self, ids: &[AnnotationId]) -> EditorResult<()> {
        let removed = self.collect(ids)?;
        if removed.is_empty() {
            return Err(EditorError::invalid("nothing to remove"));
        }
        self.apply(EditCommand::RemoveAnnotations(removed))
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) -> EditorResult<()> {
        self.remove_annotations(&[id])
    }

    fn collect(&self, ids: &[AnnotationId]) -> EditorResult<Vec<Annotation>> {
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| seen.insert(**id))
            .map(|id| self.state.annotations.get(*id).cloned().ok_or(EditorError::AnnotationNotFound(*id)))
            .collect()
    }

    /// Replace an annotation with an edited copy (same id)
    ///
    /// Returns `false` when the copy equals the current record and nothing
    /// was recorded.
    pub fn update_annotation(&mut self, after: Annotation) -> EditorResult<bool> {
        let before = self
            .state
            .annotations
            .get(after.id())
            .cloned()
            .ok_or(EditorError::AnnotationNotFound(after.id()))?;
        if before == after {
            return Ok(false);
        }
        self.apply(EditCommand::ModifyAnnotation { before, after })?;
        Ok(true)
    }

    /// Apply a dialog result as one undo step
    pub fn apply_edit(&mut self, edit: EditDescription) -> EditorResult<()> {
        let mut parts = Vec::new();
        if !edit.remove.is_empty() {
            parts.push(EditCommand::RemoveAnnotations(self.collect(&edit.remove)?));
        }
        if !edit.add.is_empty() {
            parts.push(EditCommand::AddAnnotations(self.prepare(edit.add)));
        }
        if parts.is_empty() {
            return Err(EditorError::invalid("the edit changes nothing"));
        }
        self.apply(EditCommand::Batch(edit.label, parts))
    }

    /// Remove every annotation matching `predicate` as one step labelled
    /// `label`; [`HistoryOutcome::Nothing`] when none match
    pub fn remove_matching(
        &mut self,
        label: &str,
        predicate: impl Fn(&Annotation) -> bool,
    ) -> EditorResult<HistoryOutcome> {
        let matching: Vec<Annotation> =
            self.state.annotations.filter(predicate).into_iter().cloned().collect();
        if matching.is_empty() {
            return Ok(HistoryOutcome::Nothing);
        }
        let count = matching.len();
        self.apply(EditCommand::Batch(label.to_owned(), vec![EditCommand::RemoveAnnotations(matching)]))?;
        tracing::info!(label, count, "removed annotations");
        Ok(HistoryOutcome::Applied(label.to_owned()))
    }

    pub fn move_page(&mut self, from: usize, to: usize) -> EditorResult<()> {
        if from == to {
            check_page(from, self.page_count())?;
            return Ok(());
        }
        self.apply(EditCommand::MovePage { from, to })
    }

    /// `order[new_index] = old_index`
    pub fn reorder_pages(&mut self, order: Vec<usize>) -> EditorResult<()> {
        self.apply(EditCommand::ReorderPages { order })
    }

    pub fn rotate_pages(&mut self, pages: Vec<usize>, quarter_turns: i32) -> EditorResult<()> {
        if pages.is_empty() {
            return Err(EditorError::invalid("no pages selected"));
        }
        if quarter_turns.rem_euclid(4) == 0 {
            return Err(EditorError::invalid("rotation must be a quarter turn"));
        }
        self.apply(EditCommand::RotatePages { pages, quarter_turns })
    }

    /// Delete pages, together with links elsewhere that point at them
    pub fn delete_pages(&mut self, indices: &[usize]) -> EditorResult<()> {
        let delete = EditCommand::delete_pages(&self.state, indices)?;
        let EditCommand::DeletePages { removed } = &delete else {
            return Err(EditorError::invalid("unexpected page deletion command"));
        };

        let doomed: HashSet<u16> = removed.iter().map(|page| page.index as u16).collect();
        let dangling: Vec<Annotation> = self
            .state
            .annotations
            .filter(|annotation| {
                !doomed.contains(&annotation.page_index())
                    && matches!(
                        annotation.kind(),
                        AnnotationKind::Link { target: LinkTarget::Page(target) } if doomed.contains(target)
                    )
            })
            .into_iter()
            .cloned()
            .collect();

        let label = delete.label();
        let command = if dangling.is_empty() {
            delete
        } else {
            EditCommand::Batch(label, vec![EditCommand::RemoveAnnotations(dangling), delete])
        };
        self.apply(command)
    }

    pub fn undo(&mut self) -> EditorResult<HistoryOutcome> {
        let outcome = self.history.undo(&mut self.state)?;
        if let HistoryOutcome::Applied(label) = &outcome {
            tracing::debug!(%label, "undo");
        }
        Ok(outcome)
    }

    pub fn redo(&mut self) -> EditorResult<HistoryOutcome> {
        let outcome = self.history.redo(&mut self.state)?;
        if let HistoryOutcome::Applied(label) = &outcome {
            tracing::debug!(%label, "redo");
        }
        Ok(outcome)
    }

    /// Immutable copy of what a save needs, for worker threads
    pub fn snapshot(&self) -> ExportSnapshot {
        ExportSnapshot {
            base: Arc::clone(&self.base),
            original_bytes: Arc::clone(&self.original_bytes),
            state: self.state.clone(),
            unmodified: self.state == self.opened_state,
        }
    }

    /// Save to `path`; on failure the session is left exactly as it was
    pub fn save_to(&mut self, path: &Path, cancel: &CancellationToken) -> EditorResult<()> {
        let snapshot = self.snapshot();
        snapshot.write_pdf(path, cancel)?;
        self.mark_saved(path, snapshot.state);
        Ok(())
    }

    /// Record a save made from a snapshot of `state`
    pub fn mark_saved(&mut self, path: &Path, state: DocumentState) {
        self.path = Some(path.to_path_buf());
        self.saved_state = state;
    }

    /// Current page list and annotations in sidecar form
    pub fn sidecar(&self) -> SessionSidecar {
        SessionSidecar {
            version: SIDECAR_VERSION,
            pages: self.state.pages.clone(),
            annotations: self.state.annotations.all().into_iter().cloned().collect(),
        }
    }

    /// Replace the current state with a recovered sidecar
    ///
    /// The history is cleared; recovery itself cannot be undone. The
    /// sidecar must describe pages of this document.
    pub fn recover(&mut self, sidecar: SessionSidecar) -> EditorResult<()> {
        let source_count = self.base.get_pages().len();
        if sidecar.pages.is_empty() {
            return Err(EditorError::invalid("recovered session has no pages"));
        }
        if let Some(page) = sidecar.pages.iter().find(|p| p.source == 0 || p.source as usize > source_count) {
            return Err(EditorError::invalid(format!(
                "recovered session refers to page {} of a {source_count} page document",
                page.source
            )));
        }

        let mut annotations = AnnotationCollection::new();
        for annotation in sidecar.annotations {
            check_page(usize::from(annotation.page_index()), sidecar.pages.len())?;
            annotations.add(annotation);
        }

        self.state = DocumentState::new(sidecar.pages, annotations);
        self.history.clear();
        tracing::info!(annotations = self.state.annotations.len(), "recovered session");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::annotation::{AnnotationGeometry, AnnotationStyle, Color, MarkContent, PageRect};
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use pretty_assertions::assert_eq;

    /// A `pages`-page US Letter document, each page showing its number
    pub(crate) fn sample_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for number in 1..=pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), Object::Integer(24)]),
                    Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {number}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    pub(crate) fn session(pages: usize) -> EditSession {
        EditSession::from_bytes(sample_pdf(pages)).unwrap()
    }

    fn rectangle(page: u16, x: f32) -> Annotation {
        Annotation::new(
            page,
            AnnotationKind::Rectangle,
            AnnotationGeometry::rect(PageRect::new(x, 100.0, 50.0, 40.0)),
            AnnotationStyle::red_markup(),
        )
    }

    #[test]
    fn test_rejects_non_pdf_bytes() {
        let result = EditSession::from_bytes(b"hello world".to_vec());
        assert!(matches!(result, Err(EditorError::CorruptPdf(_))));
    }

    #[test]
    fn test_rejects_truncated_pdf() {
        let mut bytes = sample_pdf(1);
        bytes.truncate(40);
        assert!(matches!(EditSession::from_bytes(bytes), Err(EditorError::CorruptPdf(_))));
    }

    #[test]
    fn test_open_reads_pages() {
        let session = session(3);
        assert_eq!(session.page_count(), 3);
        assert_eq!(session.pages()[2].source, 3);
        assert_eq!(session.display_name(), "Untitled");
        assert!(!session.is_modified());
    }

    #[test]
    fn test_cancelled_open() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = EditSession::from_bytes_with_cancel(sample_pdf(2), &cancel);
        assert!(matches!(result, Err(EditorError::Cancelled)));
    }

    #[test]
    fn test_add_assigns_layers_and_author() {
        let mut session = session(1);
        session.set_author("Lin");
        session.add_annotations(vec![rectangle(0, 10.0), rectangle(0, 100.0)]).unwrap();

        let page = session.annotations().get_page_annotations(0);
        let layers: Vec<u32> = page.iter().map(|a| a.layer()).collect();
        assert_eq!(layers, vec![0, 1]);
        assert!(page.iter().all(|a| a.metadata().author.as_deref() == Some("Lin")));
        assert!(session.is_modified());
    }

    #[test]
    fn test_rejected_command_leaves_state_and_history() {
        let mut session = session(1);
        let before = session.state().clone();

        let result = session.add_annotation(rectangle(4, 10.0));

        assert!(matches!(result, Err(EditorError::PageOutOfRange { page: 4, .. })));
        assert_eq!(session.state(), &before);
        assert!(!session.history().can_undo());
    }

    #[test]
    fn test_n_edits_then_n_undos_restore_state() {
        let mut session = session(3);
        let start = session.state().clone();

        let first = rectangle(0, 10.0);
        session.add_annotation(first.clone()).unwrap();
        let moved = session
            .annotations()
            .get(first.id())
            .unwrap()
            .with_geometry(AnnotationGeometry::rect(PageRect::new(200.0, 200.0, 10.0, 10.0)));
        session.update_annotation(moved).unwrap();
        session.rotate_pages(vec![1], 1).unwrap();
        session.move_page(0, 2).unwrap();
        session.delete_pages(&[1]).unwrap();

        for _ in 0..5 {
            assert!(session.undo().unwrap().applied());
        }
        assert_eq!(session.state(), &start);
        assert_eq!(session.undo().unwrap(), HistoryOutcome::Nothing);
    }

    #[test]
    fn test_undo_then_redo_is_identity() {
        let mut session = session(2);
        session.add_annotation(rectangle(1, 10.0)).unwrap();
        session.rotate_pages(vec![0, 1], -1).unwrap();
        let edited = session.state().clone();

        session.undo().unwrap();
        session.redo().unwrap();

        assert_eq!(session.state(), &edited);
    }

    #[test]
    fn test_update_with_identical_copy_records_nothing() {
        let mut session = session(1);
        let annotation = rectangle(0, 10.0);
        session.add_annotation(annotation.clone()).unwrap();
        let current = session.annotations().get(annotation.id()).unwrap().clone();

        assert!(!session.update_annotation(current).unwrap());
        assert_eq!(session.history().undo_len(), 1);
    }

    #[test]
    fn test_remove_missing_annotation() {
        let mut session = session(1);
        let id = AnnotationId::new_v4();
        assert!(matches!(session.remove_annotation(id), Err(EditorError::AnnotationNotFound(x)) if x == id));
    }

    #[test]
    fn test_apply_edit_is_one_step() {
        let mut session = session(3);
        let edit = EditDescription {
            label: "Add Watermark".into(),
            add: (0..3).map(|page| rectangle(page, 10.0)).collect(),
            remove: Vec::new(),
        };

        session.apply_edit(edit).unwrap();
        assert_eq!(session.annotations().len(), 3);
        assert_eq!(session.history().undo_label().as_deref(), Some("Add Watermark"));

        session.undo().unwrap();
        assert!(session.annotations().is_empty());
    }

    #[test]
    fn test_remove_matching_reports_nothing() {
        let mut session = session(1);
        let outcome = session
            .remove_matching("Remove Watermarks", |a| matches!(a.kind(), AnnotationKind::Watermark { .. }))
            .unwrap();
        assert_eq!(outcome, HistoryOutcome::Nothing);
        assert!(!session.history().can_undo());
    }

    #[test]
    fn test_deleting_target_page_removes_links_in_same_step() {
        let mut session = session(3);
        let link = Annotation::new(
            0,
            AnnotationKind::Link { target: LinkTarget::Page(2) },
            AnnotationGeometry::rect(PageRect::new(10.0, 10.0, 40.0, 10.0)),
            AnnotationStyle::new(),
        );
        session.add_annotation(link.clone()).unwrap();
        let before = session.state().clone();

        session.delete_pages(&[2]).unwrap();
        assert!(!session.annotations().contains(link.id()));
        assert_eq!(session.page_count(), 2);

        session.undo().unwrap();
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn test_cannot_delete_every_page() {
        let mut session = session(2);
        assert!(matches!(session.delete_pages(&[0, 1]), Err(EditorError::InvalidInput(_))));
        assert_eq!(session.page_count(), 2);
    }

    #[test]
    fn test_unmodified_save_writes_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("copy.pdf");
        let bytes = sample_pdf(2);
        let mut session = EditSession::from_bytes(bytes.clone()).unwrap();

        session.save_to(&target, &CancellationToken::new()).unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), bytes);
        assert_eq!(session.path(), Some(target.as_path()));
    }

    #[test]
    fn test_save_then_reopen_restores_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("edited.pdf");
        let mut session = session(2);
        let mut style = AnnotationStyle::red_markup();
        style.fill_color = Some(Color::new(0, 128, 255, 255));
        let shape = Annotation::new(
            1,
            AnnotationKind::Rectangle,
            AnnotationGeometry::rect(PageRect::new(72.5, 144.25, 100.0, 50.0)),
            style,
        );
        let stamp = Annotation::new(
            0,
            AnnotationKind::Stamp { mark: MarkContent::Text("DRAFT".into()) },
            AnnotationGeometry::rect(PageRect::new(200.0, 300.0, 150.0, 60.0)),
            AnnotationStyle::red_markup().with_rotation(-20.0),
        );
        session.add_annotations(vec![shape, stamp]).unwrap();
        session.rotate_pages(vec![0], 1).unwrap();
        session.move_page(1, 0).unwrap();

        session.save_to(&target, &CancellationToken::new()).unwrap();
        assert!(!session.is_modified());

        let reopened = EditSession::open(&target).unwrap();
        assert_eq!(reopened.annotations(), session.annotations());
        assert_eq!(reopened.pages()[1].rotation, 90);
        assert_eq!(reopened.page_count(), 2);
    }

    #[test]
    fn test_failed_save_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing-dir").join("out.pdf");
        let mut session = session(1);
        session.add_annotation(rectangle(0, 10.0)).unwrap();
        let before = session.state().clone();

        let result = session.save_to(&target, &CancellationToken::new());

        assert!(matches!(result, Err(EditorError::Write { .. })));
        assert!(session.is_modified());
        assert_eq!(session.state(), &before);
        assert_eq!(session.path(), None);
        assert!(session.history().can_undo());
    }

    #[test]
    fn test_cancelled_save_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.pdf");
        let mut session = session(2);
        session.add_annotation(rectangle(0, 10.0)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(matches!(session.save_to(&target, &cancel), Err(EditorError::Cancelled)));
        assert!(!target.exists());
        assert!(session.is_modified());
    }

    #[test]
    fn test_untouched_pages_keep_content_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.pdf");
        let mut session = session(3);
        session.add_annotation(rectangle(1, 10.0)).unwrap();
        session.save_to(&target, &CancellationToken::new()).unwrap();

        let original = Document::load_mem(session.original_bytes()).unwrap();
        let saved = Document::load(&target).unwrap();
        let (src, dst) = (original.get_pages(), saved.get_pages());
        for number in [1, 3] {
            assert_eq!(
                original.get_page_content(src[&number]).unwrap(),
                saved.get_page_content(dst[&number]).unwrap()
            );
            assert!(!saved.get_dictionary(dst[&number]).unwrap().has(b"Annots"));
        }
    }

    #[test]
    fn test_recover_replaces_state_and_clears_history() {
        let mut session = session(2);
        session.add_annotation(rectangle(0, 10.0)).unwrap();
        let sidecar = session.sidecar();

        let mut fresh = EditSession::from_bytes(sample_pdf(2)).unwrap();
        fresh.recover(sidecar).unwrap();

        assert_eq!(fresh.annotations(), session.annotations());
        assert!(fresh.is_modified());
        assert!(!fresh.history().can_undo());
    }

    #[test]
    fn test_recover_rejects_foreign_pages() {
        let mut small = session(1);
        let big = session(4);
        let before = small.state().clone();

        assert!(small.recover(big.sidecar()).is_err());
        assert_eq!(small.state(), &before);
    }
}
