//! Normalized watermark zones.
//!
//! A [`Region`] is stored in percent of the image it is applied to, so the
//! same value addresses the same area of an image regardless of its pixel
//! size. Every constructor and mutator goes through [`Region::clamp`].

/// Smallest allowed width or height, in percent.
pub const MIN_SIZE: f64 = 5.0;

/// Upper bound of the percentage space.
pub const FULL: f64 = 100.0;

/// Largest width or height the anchored default zone control allows.
pub const MAX_ANCHORED_SIZE: f64 = 50.0;

/// A rectangle in percentage units (0-100) of an image's own dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    /// Left edge, percent of the image width.
    pub x: f64,
    /// Top edge, percent of the image height.
    pub y: f64,
    /// Width, percent of the image width.
    pub width: f64,
    /// Height, percent of the image height.
    pub height: f64,
}

impl Default for Region {
    /// Bottom-right zone, 20% wide and 15% tall.
    fn default() -> Self {
        Self {
            x: 80.0,
            y: 85.0,
            width: 20.0,
            height: 15.0,
        }
    }
}

impl Region {
    /// Build a region, clamping it into the valid range.
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
        .clamp()
    }

    /// Zone of the given size anchored to the bottom-right corner.
    ///
    /// Sizes are limited to `5..=50` percent, matching the default zone control.
    #[must_use]
    pub fn anchored_bottom_right(width: f64, height: f64) -> Self {
        let width = finite_or(width, MIN_SIZE).clamp(MIN_SIZE, MAX_ANCHORED_SIZE);
        let height = finite_or(height, MIN_SIZE).clamp(MIN_SIZE, MAX_ANCHORED_SIZE);
        Self::new(FULL - width, FULL - height, width, height)
    }

    /// Enforce the region invariants.
    ///
    /// Sizes are clamped to `[5, 100]` first, then offsets to `[0, 100 - size]`.
    /// Non-finite sizes become the minimum and non-finite offsets become 0.
    #[must_use]
    pub fn clamp(self) -> Self {
        let width = finite_or(self.width, MIN_SIZE).clamp(MIN_SIZE, FULL);
        let height = finite_or(self.height, MIN_SIZE).clamp(MIN_SIZE, FULL);
        let x = finite_or(self.x, 0.0).clamp(0.0, FULL - width);
        let y = finite_or(self.y, 0.0).clamp(0.0, FULL - height);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether all invariants hold without clamping.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width >= MIN_SIZE
            && self.height >= MIN_SIZE
            && self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= FULL
            && self.y + self.height <= FULL
    }

    /// Right edge, percent.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge, percent.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Map this region onto an image of `width x height` pixels.
    #[must_use]
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let w = f64::from(width);
        let h = f64::from(height);
        PixelRect {
            x: w * self.x / FULL,
            y: h * self.y / FULL,
            width: w * self.width / FULL,
            height: h * self.height / FULL,
        }
    }

    /// Inverse of [`Region::to_pixels`], clamped.
    ///
    /// An image with a zero dimension has no meaningful percentages, so the
    /// affected axis collapses to the minimum-size region at the origin.
    #[must_use]
    pub fn from_pixels(rect: PixelRect, width: u32, height: u32) -> Self {
        let w = f64::from(width);
        let h = f64::from(height);
        let (x, rw) = if width == 0 {
            (0.0, MIN_SIZE)
        } else {
            (rect.x / w * FULL, rect.width / w * FULL)
        };
        let (y, rh) = if height == 0 {
            (0.0, MIN_SIZE)
        } else {
            (rect.y / h * FULL, rect.height / h * FULL)
        };
        Self::new(x, y, rw, rh)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// A rectangle in (possibly fractional) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl PixelRect {
    /// Round edges to whole pixels and clip to a `bound_w x bound_h` raster.
    ///
    /// Left/top and right/bottom edges are rounded independently so adjacent
    /// rectangles never overlap or leave gaps.
    #[must_use]
    pub fn snap(&self, bound_w: u32, bound_h: u32) -> SnappedRect {
        let x0 = snap_edge(self.x, bound_w);
        let y0 = snap_edge(self.y, bound_h);
        let x1 = snap_edge(self.x + self.width, bound_w).max(x0);
        let y1 = snap_edge(self.y + self.height, bound_h).max(y0);
        SnappedRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn snap_edge(value: f64, bound: u32) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let rounded = value.round();
    if rounded >= f64::from(bound) {
        bound
    } else {
        rounded as u32
    }
}

/// A whole-pixel rectangle inside a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnappedRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl SnappedRect {
    /// Whether the rectangle covers no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
