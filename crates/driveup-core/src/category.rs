//! Document categories and file naming.
//!
//! A selected file is classified into one of three [`DocumentCategory`]
//! values by its extension. The category only decides which kind of
//! document the remote service will convert the upload into; files with
//! other extensions can still be selected, they just have no category.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Extensions converted to a text document.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["doc", "docx", "odt", "rtf", "txt"];

/// Extensions converted to a spreadsheet.
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xls", "xlsx", "ods", "csv", "tsv"];

/// Extensions converted to a presentation.
pub const PRESENTATION_EXTENSIONS: &[&str] = &["ppt", "pptx", "odp"];

/// The kind of document a file is converted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Document,
    Spreadsheet,
    Presentation,
}

impl DocumentCategory {
    /// Classifies a bare extension (without the leading dot), ignoring case.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let ext = extension.to_ascii_lowercase();
        let ext = ext.as_str();
        if DOCUMENT_EXTENSIONS.contains(&ext) {
            Some(Self::Document)
        } else if SPREADSHEET_EXTENSIONS.contains(&ext) {
            Some(Self::Spreadsheet)
        } else if PRESENTATION_EXTENSIONS.contains(&ext) {
            Some(Self::Presentation)
        } else {
            None
        }
    }

    /// Classifies a file name or path by its extension.
    pub fn from_path(path: &str) -> Option<Self> {
        extension(display_name(path)).and_then(Self::from_extension)
    }

    /// Returns the machine name of this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Spreadsheet => "spreadsheet",
            Self::Presentation => "presentation",
        }
    }

    /// Returns the user-facing product name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Document => "Google Docs",
            Self::Spreadsheet => "Google Sheets",
            Self::Presentation => "Google Slides",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Returns the last segment of a path, accepting both `/` and `\` as
/// separators regardless of the host platform.
pub fn display_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Returns the text after the last `.` of a file name, if any.
fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext).filter(|ext| !ext.is_empty())
}
