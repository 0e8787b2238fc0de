//! PDF Editor Core Library
//!
//! Editing model for the PDF editor: annotations over pages, the canvas
//! geometry that places them on screen, an undo/redo history of reversible
//! commands, dialog edit builders, and save/export through lopdf.
//!
//! Nothing here depends on a GUI toolkit. The window owns one
//! [`EditSession`] and turns gestures and dialog input into calls on it.

pub mod annotation;
pub mod appearance;
pub mod cancel;
pub mod canvas;
pub mod command;
pub mod dialogs;
pub mod error;
pub mod export;
pub mod fonts;
pub mod history;
mod import;
pub mod manipulation;
pub mod pages;
pub mod persistence;
pub mod raster;
pub mod session;
pub mod text_blocks;
pub mod tools;

pub use annotation::{
    Annotation, AnnotationCollection, AnnotationGeometry, AnnotationId, AnnotationKind,
    AnnotationMetadata, AnnotationStyle, Color, ImagePayload, LinkTarget, MarkContent,
    PageCoordinate, PageRect, PageTextRole,
};
pub use cancel::CancellationToken;
pub use canvas::{Canvas, ViewPoint, ViewRect};
pub use command::{DocumentState, EditCommand};
pub use dialogs::{DialogContext, EditDescription, PageRange, RemovalAction};
pub use error::{EditorError, EditorResult};
pub use export::ExportSnapshot;
pub use fonts::StandardFont;
pub use history::{History, HistoryOutcome};
pub use manipulation::{generate_handles, handle_at, HandleType, ManipulationHandle, ManipulationState};
pub use pages::PageEntry;
pub use persistence::SessionSidecar;
pub use raster::{export_page_images, export_snapshot_images};
pub use session::EditSession;
pub use text_blocks::{highlight_selection, text_blocks, TextBlock, TextSelection};
pub use tools::{GestureOutcome, TextEditState, Tool, ToolGesture, ToolStyles};
