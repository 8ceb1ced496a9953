//! Core types: document categories, path naming, tracing

pub mod category;
pub mod tracing;

pub use category::{
    DOCUMENT_EXTENSIONS, DocumentCategory, PRESENTATION_EXTENSIONS, SPREADSHEET_EXTENSIONS,
    display_name,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
