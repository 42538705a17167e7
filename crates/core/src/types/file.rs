//! Uploaded file metadata and per-file print settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StorageKey;

/// A document format accepted for printing.
///
/// The allow-list is closed: anything that does not map to one of these
/// variants is rejected by the upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Doc,
    Docx,
    Jpeg,
    Png,
}

impl FileKind {
    /// Every supported kind, in display order.
    pub const ALL: [Self; 5] = [Self::Pdf, Self::Doc, Self::Docx, Self::Jpeg, Self::Png];

    /// Canonical MIME type.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Doc => "application/msword",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Short name used in configuration (`pdf`, `doc`, ...).
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    /// Resolve a declared MIME type, ignoring case and parameters
    /// (`application/pdf; charset=binary` resolves to [`FileKind::Pdf`]).
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.mime_type() == essence)
    }

    /// Resolve a configuration short name (`jpg` is accepted for JPEG).
    #[must_use]
    pub fn from_short_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpg" => Some(Self::Jpeg),
            other => Self::ALL.into_iter().find(|kind| kind.short_name() == other),
        }
    }

    /// Whether the format is printed as-is (PDF and images).
    #[must_use]
    pub const fn is_print_ready(self) -> bool {
        matches!(self, Self::Pdf | Self::Jpeg | Self::Png)
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Color mode requested for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ColorMode {
    Color,
    #[default]
    BlackAndWhite,
}

/// Paper size requested for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    Letter,
}

/// Per-file print settings. Every field has a default so that settings stored
/// before a field existed still deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintSettings {
    pub copies: u32,
    pub color_mode: ColorMode,
    pub page_size: PageSize,
    pub double_sided: bool,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            copies: 1,
            color_mode: ColorMode::default(),
            page_size: PageSize::default(),
            double_sided: false,
        }
    }
}

/// An order's reference to one stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// Key under which the bytes live in the content store.
    #[serde(rename = "fileName")]
    pub storage_key: StorageKey,
    /// Name the customer uploaded the file with.
    pub original_name: String,
    /// Size in bytes.
    #[serde(rename = "fileSize")]
    pub size_bytes: u64,
    /// Declared MIME type.
    #[serde(rename = "fileType")]
    pub mime_type: String,
    /// When the bytes were written.
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub print_settings: PrintSettings,
}

impl FileRef {
    /// The allow-listed kind of this file, if the stored MIME type still maps
    /// to one.
    #[must_use]
    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_mime(&self.mime_type)
    }
}
