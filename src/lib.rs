//! Erase watermarks inside a user-defined zone.
//!
//! The whole image is sent to an external cleanup service, and only the
//! pixels inside the chosen zone are taken from its output. Everything outside
//! the zone stays byte-for-byte original, even if the service re-rendered the
//! whole frame or changed its resolution.
//!
//! # Quick Start
//!
//! ```no_run
//! use watermark_zone_eraser::{BatchProcessor, Config, GeminiCleanupService, IngestFile};
//!
//! # async fn run() -> watermark_zone_eraser::Result<()> {
//! let config = Config::from_env()?;
//! let service = GeminiCleanupService::new(config.service.clone())?;
//! let processor = BatchProcessor::with_config(service, &config)?;
//!
//! let file = IngestFile::from_path("photo.jpg".as_ref())?;
//! processor.ingest(vec![file]).await?;
//! processor.process_all().await;
//!
//! for export in processor.export_all().await {
//!     export.save_to("cleaned".as_ref())?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Editing the zone
//!
//! Each item carries its own [`Region`] in percent of the image. An
//! [`EditSession`] lets the user drag the box or paint over the watermark;
//! committing the edited region re-composites from the cached cleaned image
//! without another service call.
//!
//! ```no_run
//! use std::time::Instant;
//! use watermark_zone_eraser::{EditSession, Handle, PointerEvent, Region, Size};
//!
//! let mut session = EditSession::new(Region::default());
//! let display = Size::new(800.0, 600.0);
//! let now = Instant::now();
//! session.handle_event(PointerEvent::down(700.0, 550.0), Some(Handle::NorthWest), display, now);
//! session.handle_event(PointerEvent::moved(600.0, 500.0), None, display, now);
//! session.handle_event(PointerEvent::up(600.0, 500.0), None, display, now);
//! let region = session.commit();
//! // processor.process(id, Some(region)).await
//! ```

#![deny(missing_docs)]

pub mod batch;
pub mod brush;
pub mod compositing;
pub mod config;
pub mod editor;
pub mod error;
pub mod item;
pub mod pointer;
pub mod region;
pub mod service;
pub mod session;
mod store;

pub use batch::{BatchProcessor, BatchReport};
pub use brush::{BrushConverter, BrushMask, BrushOutcome, PixelBounds};
pub use compositing::{composite, composite_images, CompositePlan};
pub use config::{BatchConfig, BrushConfig, Config, ServiceConfig};
pub use editor::{BoxEditor, Handle};
pub use error::{Error, ImageRole, Result};
pub use item::{
    is_supported_image, is_supported_mime, ExportedImage, ImageItem, IngestFile, ItemId,
    ItemStatus,
};
pub use pointer::{Point, PointerEvent, PointerPhase, Size};
pub use region::{PixelRect, Region, SnappedRect};
pub use service::{CleanupRequest, CleanupResponse, CleanupService, GeminiCleanupService};
pub use session::{EditMode, EditSession};
