//! Error types for the watermark-zone-eraser crate.

use std::fmt;

use crate::item::ItemId;

/// Which of the two compositing inputs an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// The image as ingested.
    Original,
    /// The full-frame output of the cleanup service.
    Cleaned,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => f.write_str("original"),
            Self::Cleaned => f.write_str("cleaned"),
        }
    }
}

/// Errors that can occur while editing, cleaning, or compositing images.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One of the compositing inputs could not be decoded.
    #[error("failed to load {role} image: {source}")]
    Decode {
        /// Which input failed.
        role: ImageRole,
        /// Underlying decoder error.
        source: image::ImageError,
    },

    /// The composited canvas could not be encoded as PNG.
    #[error("failed to encode composited image: {0}")]
    Encode(image::ImageError),

    /// The cleanup service answered, but not with a usable image.
    #[error("cleanup service error: {0}")]
    Service(String),

    /// The HTTP request to the cleanup service failed in transport.
    #[error("cleanup service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials or configuration values are missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// No item with this id is in the working set.
    #[error("unknown image item: {0}")]
    UnknownItem(ItemId),

    /// The item already has a `process` call in flight.
    #[error("image item {0} is already being processed")]
    AlreadyRunning(ItemId),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking compositing task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl Error {
    /// Whether this error came from the external cleanup boundary.
    #[must_use]
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            Self::Service(_) | Self::Http(_) | Self::Configuration(_)
        )
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("image/gif".to_string());
        assert!(unsupported.to_string().contains("image/gif"));

        let decode = Error::Decode {
            role: ImageRole::Cleaned,
            source: image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "truncated",
            )),
        };
        let msg = decode.to_string();
        assert!(msg.contains("failed to load cleaned image"));
        assert!(msg.contains("truncated"));
    }

    #[test]
    fn service_failures_are_grouped() {
        assert!(Error::Service("no image data found in response".into()).is_service_failure());
        assert!(Error::Configuration("missing API key".into()).is_service_failure());
        assert!(!Error::Task("cancelled".into()).is_service_failure());
        assert!(!Error::UnsupportedFormat("image/tiff".into()).is_service_failure());
    }
}
