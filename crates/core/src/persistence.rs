//! Session sidecar persistence
//!
//! The page list and annotations of an open session can be written to a
//! JSON sidecar next to the PDF so unsaved work survives a crash. The
//! sidecar never replaces saving; it only feeds [`EditSession::recover`].
//!
//! [`EditSession::recover`]: crate::EditSession::recover

use crate::annotation::Annotation;
use crate::cancel::CancellationToken;
use crate::error::{EditorError, EditorResult};
use crate::export::write_atomically;
use crate::pages::PageEntry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Format version written into every sidecar
pub const SIDECAR_VERSION: u32 = 1;

/// Recoverable state of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSidecar {
    pub version: u32,
    pub pages: Vec<PageEntry>,
    pub annotations: Vec<Annotation>,
}

/// Get the sidecar path for a given PDF path
///
/// The sidecar is stored next to the PDF with `.pdf-editor.json` appended
/// to the full file name.
///
/// # Example
/// ```
/// use std::path::Path;
/// use pdf_editor_core::persistence::sidecar_path;
///
/// let pdf_path = Path::new("/path/to/document.pdf");
/// let sidecar = sidecar_path(pdf_path);
/// assert_eq!(sidecar, Path::new("/path/to/document.pdf.pdf-editor.json"));
/// ```
pub fn sidecar_path(pdf_path: &Path) -> PathBuf {
    let mut path = pdf_path.as_os_str().to_owned();
    path.push(".pdf-editor.json");
    PathBuf::from(path)
}

/// Save a sidecar for `pdf_path`, returning where it was written
pub fn save_sidecar(pdf_path: &Path, sidecar: &SessionSidecar) -> EditorResult<PathBuf> {
    let path = sidecar_path(pdf_path);
    let json = serde_json::to_vec_pretty(sidecar)
        .map_err(|err| EditorError::Serialize(err.to_string()))?;

    write_atomically(&path, &json, &CancellationToken::new())?;
    tracing::debug!(path = %path.display(), annotations = sidecar.annotations.len(), "saved sidecar");
    Ok(path)
}

/// Load the sidecar for `pdf_path`, if there is one
///
/// Sidecars from a different format version are ignored.
pub fn load_sidecar(pdf_path: &Path) -> EditorResult<Option<SessionSidecar>> {
    let path = sidecar_path(pdf_path);
    if !path.exists() {
        return Ok(None);
    }

    let json = fs::read(&path)?;
    let sidecar: SessionSidecar = serde_json::from_slice(&json)
        .map_err(|err| EditorError::Serialize(format!("{}: {err}", path.display())))?;

    if sidecar.version != SIDECAR_VERSION {
        tracing::warn!(
            path = %path.display(),
            version = sidecar.version,
            "ignoring sidecar from another version"
        );
        return Ok(None);
    }
    Ok(Some(sidecar))
}

pub fn sidecar_exists(pdf_path: &Path) -> bool {
    sidecar_path(pdf_path).exists()
}

/// Delete the sidecar for a PDF; a missing sidecar is not an error
pub fn delete_sidecar(pdf_path: &Path) -> EditorResult<()> {
    let path = sidecar_path(pdf_path);
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationGeometry, AnnotationKind, AnnotationStyle, PageRect};
    use pdf_engine::PageSize;

    fn test_sidecar() -> SessionSidecar {
        SessionSidecar {
            version: SIDECAR_VERSION,
            pages: vec![
                PageEntry::new(2, PageSize::new(612.0, 792.0), 90),
                PageEntry::new(1, PageSize::new(612.0, 792.0), 0),
            ],
            annotations: vec![Annotation::new(
                1,
                AnnotationKind::FreeText { text: "draft".into() },
                AnnotationGeometry::rect(PageRect::new(10.0, 10.0, 100.0, 20.0)),
                AnnotationStyle::new(),
            )],
        }
    }

    #[test]
    fn test_sidecar_path() {
        let pdf_path = Path::new("/path/to/document.pdf");
        assert_eq!(sidecar_path(pdf_path), PathBuf::from("/path/to/document.pdf.pdf-editor.json"));
    }

    #[test]
    fn test_save_and_load_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_path = dir.path().join("doc.pdf");
        let sidecar = test_sidecar();

        let saved = save_sidecar(&pdf_path, &sidecar).unwrap();
        assert!(saved.exists());
        assert!(sidecar_exists(&pdf_path));

        let loaded = load_sidecar(&pdf_path).unwrap();
        assert_eq!(loaded, Some(sidecar));

        delete_sidecar(&pdf_path).unwrap();
        assert!(!sidecar_exists(&pdf_path));
    }

    #[test]
    fn test_load_missing_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_sidecar(&dir.path().join("none.pdf")).unwrap(), None);
    }

    #[test]
    fn test_delete_missing_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        assert!(delete_sidecar(&dir.path().join("none.pdf")).is_ok());
    }

    #[test]
    fn test_other_version_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_path = dir.path().join("doc.pdf");
        let mut sidecar = test_sidecar();
        sidecar.version = SIDECAR_VERSION + 1;
        save_sidecar(&pdf_path, &sidecar).unwrap();

        assert_eq!(load_sidecar(&pdf_path).unwrap(), None);
    }

    #[test]
    fn test_garbage_sidecar_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pdf_path = dir.path().join("doc.pdf");
        fs::write(sidecar_path(&pdf_path), b"{ not json").unwrap();

        assert!(matches!(load_sidecar(&pdf_path), Err(EditorError::Serialize(_))));
    }
}
