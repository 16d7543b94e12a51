//! Blend cleaned pixels back into the original, inside the zone only.
//!
//! The cleanup service returns a full frame whose resolution may differ from
//! the original. The same percentage region is mapped onto both images and
//! the cleaned rectangle is scaled into the original's rectangle:
//!
//! ```text
//! dst = region * original_size
//! src = region * cleaned_size
//! out = original, with out[dst] = resize(cleaned[src], dst.size)
//! ```

use std::io::Cursor;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{Error, ImageRole, Result};
use crate::region::{PixelRect, Region};

/// Source and destination rectangles for one composite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositePlan {
    /// Rectangle read from the cleaned image.
    pub source: PixelRect,
    /// Rectangle written in the original image.
    pub destination: PixelRect,
}

/// Map `region` onto an original of `original` dimensions and a cleaned image
/// of `cleaned` dimensions.
#[must_use]
pub fn plan(original: (u32, u32), cleaned: (u32, u32), region: Region) -> CompositePlan {
    CompositePlan {
        source: region.to_pixels(cleaned.0, cleaned.1),
        destination: region.to_pixels(original.0, original.1),
    }
}

/// Composite two decoded images. The result has the original's dimensions.
#[must_use]
pub fn composite_images(
    original: &DynamicImage,
    cleaned: &DynamicImage,
    region: Region,
) -> RgbaImage {
    let mut canvas = original.to_rgba8();
    let (width, height) = canvas.dimensions();
    let plan = plan((width, height), (cleaned.width(), cleaned.height()), region);

    let src = plan.source.snap(cleaned.width(), cleaned.height());
    let dst = plan.destination.snap(width, height);
    if src.is_empty() || dst.is_empty() {
        return canvas;
    }

    let patch = cleaned
        .crop_imm(src.x, src.y, src.width, src.height)
        .to_rgba8();
    let patch = if patch.dimensions() == (dst.width, dst.height) {
        patch
    } else {
        imageops::resize(&patch, dst.width, dst.height, FilterType::Triangle)
    };

    imageops::replace(&mut canvas, &patch, i64::from(dst.x), i64::from(dst.y));
    canvas
}

/// Decode both payloads, composite them, and encode the result as PNG.
///
/// # Errors
///
/// Returns [`Error::Decode`] naming the input that failed to load, or
/// [`Error::Encode`] if PNG encoding fails. No partial output is produced.
pub fn composite(original: &[u8], cleaned: &[u8], region: Region) -> Result<Vec<u8>> {
    let original = image::load_from_memory(original).map_err(|source| Error::Decode {
        role: ImageRole::Original,
        source,
    })?;
    let cleaned = image::load_from_memory(cleaned).map_err(|source| Error::Decode {
        role: ImageRole::Cleaned,
        source,
    })?;

    let canvas = composite_images(&original, &cleaned, region);
    encode_png(&DynamicImage::ImageRgba8(canvas))
}

/// Run [`composite`] on the blocking thread pool.
///
/// Decoding, resampling and PNG encoding are CPU-bound and would otherwise
/// stall the async executor.
///
/// # Errors
///
/// Same as [`composite`], plus [`Error::Task`] if the blocking task dies.
pub async fn composite_async(
    original: Arc<[u8]>,
    cleaned: Arc<[u8]>,
    region: Region,
) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || composite(&original, &cleaned, region))
        .await
        .map_err(|e| Error::Task(e.to_string()))?
}

/// Encode an image as PNG bytes.
///
/// # Errors
///
/// Returns [`Error::Encode`] if the encoder fails.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(Error::Encode)?;
    Ok(bytes)
}
