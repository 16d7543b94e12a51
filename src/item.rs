//! Work items: one ingested image and everything derived from it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::region::Region;

/// Opaque identifier assigned at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(Uuid);

impl ItemId {
    /// A fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Processing state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Ingested, never processed.
    Pending,
    /// A `process` call is in flight.
    Running,
    /// A final artifact exists for the current region.
    Done,
    /// The last attempt failed; see [`ImageItem::error_message`].
    Failed,
}

impl ItemStatus {
    /// Whether batch-all picks this item up.
    #[must_use]
    pub fn is_submittable(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// One ingested image.
///
/// Payloads are reference-counted so snapshots and in-flight work share them
/// without copying.
#[derive(Debug, Clone)]
pub struct ImageItem {
    id: ItemId,
    file_name: String,
    mime_type: String,
    source: Arc<[u8]>,
    pub(crate) cleaned: Option<Arc<[u8]>>,
    pub(crate) final_image: Option<Arc<[u8]>>,
    pub(crate) status: ItemStatus,
    pub(crate) error_message: Option<String>,
    pub(crate) region: Region,
}

impl ImageItem {
    /// A pending item over `file` with its own copy of `region`.
    #[must_use]
    pub fn new(file: IngestFile, region: Region) -> Self {
        Self {
            id: ItemId::new(),
            file_name: file.name,
            mime_type: file.mime_type,
            source: file.bytes.into(),
            cleaned: None,
            final_image: None,
            status: ItemStatus::Pending,
            error_message: None,
            region: region.clamp(),
        }
    }

    /// Identifier.
    #[must_use]
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// File name given at ingestion.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// MIME type given at ingestion.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Original payload.
    #[must_use]
    pub fn source_bytes(&self) -> &[u8] {
        &self.source
    }

    pub(crate) fn source(&self) -> Arc<[u8]> {
        Arc::clone(&self.source)
    }

    /// Cached full-frame output of the cleanup service.
    #[must_use]
    pub fn cleaned_bytes(&self) -> Option<&[u8]> {
        self.cleaned.as_deref()
    }

    /// Composited PNG for the current region.
    #[must_use]
    pub fn final_bytes(&self) -> Option<&[u8]> {
        self.final_image.as_deref()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// Failure reason, present only while `status` is `Failed`.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// The item's own zone.
    #[must_use]
    pub fn region(&self) -> Region {
        self.region
    }

    /// Name used when exporting the final artifact: `clean-<stem>.png`.
    #[must_use]
    pub fn export_name(&self) -> String {
        let stem = Path::new(&self.file_name)
            .file_stem()
            .map_or_else(|| "image".into(), |s| s.to_string_lossy());
        format!("clean-{stem}.png")
    }
}

/// Supported input MIME types.
pub const SUPPORTED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Whether `mime_type` names a supported input format.
#[must_use]
pub fn is_supported_mime(mime_type: &str) -> bool {
    SUPPORTED_MIME_TYPES
        .iter()
        .any(|m| m.eq_ignore_ascii_case(mime_type.trim()))
}

/// MIME type for a file extension, if supported.
#[must_use]
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase()
        .as_str()
    {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    mime_for_path(path).is_some()
}

/// A raw image handed over by the host.
#[derive(Debug, Clone)]
pub struct IngestFile {
    /// Original file name.
    pub name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
}

impl IngestFile {
    /// Wrap in-memory bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, deriving the MIME type from its extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for unknown extensions and
    /// [`Error::Io`] if reading fails.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mime_type = mime_for_path(path)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map_or_else(|| "image".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(name, mime_type, bytes))
    }

    /// Reject files whose MIME type is not JPEG, PNG or WebP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] naming the file and type.
    pub fn validate(&self) -> Result<()> {
        if is_supported_mime(&self.mime_type) {
            Ok(())
        } else {
            Err(Error::UnsupportedFormat(format!(
                "{} ({})",
                self.name, self.mime_type
            )))
        }
    }
}

/// A finished artifact ready for download.
#[derive(Debug, Clone)]
pub struct ExportedImage {
    /// Item it came from.
    pub id: ItemId,
    /// Suggested file name, always `.png`.
    pub file_name: String,
    /// PNG bytes.
    pub bytes: Arc<[u8]>,
}

impl ExportedImage {
    /// Write into `dir`, creating it if needed. Returns the written path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory or file cannot be written.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}
