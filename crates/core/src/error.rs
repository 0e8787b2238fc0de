//! Error type shared by every editing operation.

use crate::annotation::AnnotationId;
use pdf_engine::PdfEngineError;
use std::path::PathBuf;

/// Errors raised while opening, editing or writing a document.
///
/// Every command either applies fully or fails with one of these and leaves
/// the session as it was.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("not a readable PDF: {0}")]
    CorruptPdf(String),

    #[error("unsupported image {name}: {reason}")]
    UnsupportedImage { name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("annotation {0} not found")]
    AnnotationNotFound(AnnotationId),

    #[error("operation cancelled")]
    Cancelled,

    #[error("PDF serialization failed: {0}")]
    Serialize(String),

    #[error(transparent)]
    Engine(#[from] PdfEngineError),
}

impl EditorError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// True for errors caused by what the user typed or picked, as opposed to
    /// the environment.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::UnsupportedImage { .. } | Self::PageOutOfRange { .. }
        )
    }
}

pub type EditorResult<T> = Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = EditorError::PageOutOfRange { page: 7, page_count: 3 };
        assert_eq!(err.to_string(), "page 7 out of range (page_count=3)");
        assert_eq!(EditorError::invalid("no text entered").to_string(), "invalid input: no text entered");
    }

    #[test]
    fn test_user_error_classification() {
        assert!(EditorError::invalid("x").is_user_error());
        assert!(!EditorError::Cancelled.is_user_error());
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!EditorError::from(io).is_user_error());
    }
}
