//! Freehand painting converted to a bounding-box zone.
//!
//! The user smears over the watermark on a transparent raster the size of the
//! displayed image. When a stroke ends, the tight bounding box of every
//! painted pixel, padded by a fixed margin, becomes the new region.

use std::time::Duration;

use image::{Rgba, RgbaImage};

use crate::pointer::{Point, PointerEvent, PointerPhase};
use crate::region::{Region, FULL};

/// Margin added around the painted bounding box, in raster units.
pub const DEFAULT_PADDING: u32 = 10;

/// Brush diameter, in raster units.
pub const DEFAULT_BRUSH_DIAMETER: f64 = 20.0;

/// How long the derived box stays visible before returning to box mode.
pub const SWITCH_BACK_DELAY: Duration = Duration::from_millis(200);

/// Semi-transparent red used for strokes.
pub const STROKE_COLOR: Rgba<u8> = Rgba([239, 68, 68, 128]);

/// Inclusive pixel bounds of painted coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    /// Leftmost painted column.
    pub min_x: u32,
    /// Topmost painted row.
    pub min_y: u32,
    /// Rightmost painted column.
    pub max_x: u32,
    /// Bottom painted row.
    pub max_y: u32,
}

impl PixelBounds {
    fn union(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Grow by `padding` on every side, clamped to a `width x height` raster,
    /// and express the result in percent of that raster.
    ///
    /// The low edges clamp to 0 and the high edges clamp to the raster size.
    #[must_use]
    pub fn padded_region(&self, padding: u32, width: u32, height: u32) -> Region {
        let min_x = self.min_x.saturating_sub(padding);
        let min_y = self.min_y.saturating_sub(padding);
        let max_x = self.max_x.saturating_add(padding).min(width);
        let max_y = self.max_y.saturating_add(padding).min(height);

        let w = f64::from(width.max(1));
        let h = f64::from(height.max(1));
        Region::new(
            f64::from(min_x) / w * FULL,
            f64::from(min_y) / h * FULL,
            f64::from(max_x - min_x) / w * FULL,
            f64::from(max_y - min_y) / h * FULL,
        )
    }
}

/// Transparent paint surface that accumulates strokes.
#[derive(Debug, Clone)]
pub struct BrushMask {
    raster: RgbaImage,
    diameter: f64,
    last: Option<Point>,
}

impl BrushMask {
    /// A clean `width x height` raster.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_raster(RgbaImage::new(width, height))
    }

    /// Wrap an existing raster; any pixel with non-zero alpha counts as painted.
    #[must_use]
    pub fn from_raster(raster: RgbaImage) -> Self {
        Self {
            raster,
            diameter: DEFAULT_BRUSH_DIAMETER,
            last: None,
        }
    }

    /// Use a different brush diameter.
    #[must_use]
    pub fn with_diameter(mut self, diameter: f64) -> Self {
        self.diameter = if diameter.is_finite() && diameter > 0.0 {
            diameter
        } else {
            DEFAULT_BRUSH_DIAMETER
        };
        self
    }

    /// Raster width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    /// Raster height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    /// The painted raster, for overlay rendering.
    #[must_use]
    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    /// Erase all paint.
    pub fn clear(&mut self) {
        self.raster.fill(0);
        self.last = None;
    }

    /// Replace the raster with a clean one of a new size.
    pub fn reset(&mut self, width: u32, height: u32) {
        self.raster = RgbaImage::new(width, height);
        self.last = None;
    }

    /// Whether a stroke is in progress.
    #[must_use]
    pub fn is_stroking(&self) -> bool {
        self.last.is_some()
    }

    /// Start a new path at `at`. Nothing is painted until the pointer moves.
    pub fn begin_stroke(&mut self, at: Point) {
        self.last = Some(at);
    }

    /// Paint the segment from the previous point to `to`.
    ///
    /// A non-finite `to` is dropped and the stroke continues from the last
    /// finite point.
    pub fn extend_stroke(&mut self, to: Point) {
        let Some(from) = self.last else {
            return;
        };
        if !is_finite(to) {
            return;
        }
        if is_finite(from) {
            self.paint_segment(from, to);
        }
        self.last = Some(to);
    }

    /// Finish the current path.
    pub fn end_stroke(&mut self) {
        self.last = None;
    }

    /// Round-capped segment: discs stamped densely along the line.
    ///
    /// The segment is first clipped to the raster grown by the brush radius,
    /// so the stamp count depends on the raster size, not the pointer travel.
    fn paint_segment(&mut self, from: Point, to: Point) {
        let radius = self.diameter / 2.0;
        let min = Point::new(-radius, -radius);
        let max = Point::new(
            f64::from(self.raster.width()) + radius,
            f64::from(self.raster.height()) + radius,
        );
        let Some((from, to)) = clip_segment(from, to, min, max) else {
            return;
        };

        let step = (radius * 0.5).max(0.5);
        let length = from.distance(to);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = ((length / step).ceil() as u32).max(1);
        for i in 0..=steps {
            let t = f64::from(i) / f64::from(steps);
            let center = Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t);
            self.stamp(center, radius);
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn stamp(&mut self, center: Point, radius: f64) {
        if !center.x.is_finite() || !center.y.is_finite() {
            return;
        }
        let w = f64::from(self.raster.width());
        let h = f64::from(self.raster.height());
        let x0 = (center.x - radius).floor().max(0.0);
        let y0 = (center.y - radius).floor().max(0.0);
        let x1 = (center.x + radius).ceil().min(w);
        let y1 = (center.y + radius).ceil().min(h);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let r2 = radius * radius;
        for py in (y0 as u32)..(y1 as u32) {
            let dy = f64::from(py) + 0.5 - center.y;
            for px in (x0 as u32)..(x1 as u32) {
                let dx = f64::from(px) + 0.5 - center.x;
                if dx * dx + dy * dy <= r2 {
                    self.raster.put_pixel(px, py, STROKE_COLOR);
                }
            }
        }
    }

    /// Tight bounds of every pixel with non-zero alpha, or `None` when the
    /// raster is blank.
    #[must_use]
    pub fn opaque_bounds(&self) -> Option<PixelBounds> {
        let width = self.raster.width();
        if width == 0 || self.raster.height() == 0 {
            return None;
        }
        scan_rows(self.raster.as_raw(), width as usize * 4)
    }
}

fn is_finite(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

/// Liang-Barsky clip of `from..to` against the box `min..max`.
fn clip_segment(from: Point, to: Point, min: Point, max: Point) -> Option<(Point, Point)> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    for (p, q) in [
        (-dx, from.x - min.x),
        (dx, max.x - from.x),
        (-dy, from.y - min.y),
        (dy, max.y - from.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > t1 {
                return None;
            }
            t0 = t0.max(t);
        } else {
            if t < t0 {
                return None;
            }
            t1 = t1.min(t);
        }
    }
    let at = |t: f64| Point::new(from.x + dx * t, from.y + dy * t);
    Some((at(t0), at(t1)))
}

#[cfg(feature = "parallel")]
fn scan_rows(raw: &[u8], stride: usize) -> Option<PixelBounds> {
    use rayon::prelude::*;
    raw.par_chunks(stride)
        .enumerate()
        .filter_map(|(y, row)| row_bounds(y, row))
        .reduce_with(PixelBounds::union)
}

#[cfg(not(feature = "parallel"))]
fn scan_rows(raw: &[u8], stride: usize) -> Option<PixelBounds> {
    raw.chunks(stride)
        .enumerate()
        .filter_map(|(y, row)| row_bounds(y, row))
        .reduce(PixelBounds::union)
}

#[allow(clippy::cast_possible_truncation)]
fn row_bounds(y: usize, row: &[u8]) -> Option<PixelBounds> {
    let mut painted = row
        .chunks_exact(4)
        .enumerate()
        .filter(|(_, px)| px[3] > 0)
        .map(|(x, _)| x as u32);
    let first = painted.next()?;
    let last = painted.next_back().unwrap_or(first);
    let y = y as u32;
    Some(PixelBounds {
        min_x: first,
        min_y: y,
        max_x: last,
        max_y: y,
    })
}

/// A region derived from paint, plus when the host should return to box mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushOutcome {
    /// The padded, normalized bounding box.
    pub region: Region,
    /// Delay before switching back to direct manipulation.
    pub switch_back_after: Duration,
}

/// Turns pointer strokes on a [`BrushMask`] into regions.
#[derive(Debug, Clone)]
pub struct BrushConverter {
    mask: BrushMask,
    padding: u32,
    switch_back_delay: Duration,
}

impl BrushConverter {
    /// Converter over a clean `width x height` raster with default settings.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_mask(BrushMask::new(width, height))
    }

    /// Converter over an existing mask.
    #[must_use]
    pub fn with_mask(mask: BrushMask) -> Self {
        Self {
            mask,
            padding: DEFAULT_PADDING,
            switch_back_delay: SWITCH_BACK_DELAY,
        }
    }

    /// Override the padding margin.
    #[must_use]
    pub fn padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Override the switch-back delay.
    #[must_use]
    pub fn switch_back_delay(mut self, delay: Duration) -> Self {
        self.switch_back_delay = delay;
        self
    }

    /// The paint surface.
    #[must_use]
    pub fn mask(&self) -> &BrushMask {
        &self.mask
    }

    /// Mutable access to the paint surface.
    pub fn mask_mut(&mut self) -> &mut BrushMask {
        &mut self.mask
    }

    /// Feed one pointer event in raster coordinates.
    ///
    /// Returns an outcome only when a stroke ends over a non-blank raster.
    pub fn handle_event(&mut self, event: PointerEvent) -> Option<BrushOutcome> {
        match event.phase {
            PointerPhase::Down => {
                self.mask.begin_stroke(event.position);
                None
            }
            PointerPhase::Move => {
                self.mask.extend_stroke(event.position);
                None
            }
            PointerPhase::Up => {
                if !self.mask.is_stroking() {
                    return None;
                }
                self.mask.end_stroke();
                self.derive_region()
            }
        }
    }

    /// Scan the raster and derive the padded region, if anything is painted.
    #[must_use]
    pub fn derive_region(&self) -> Option<BrushOutcome> {
        let bounds = self.mask.opaque_bounds()?;
        let region = bounds.padded_region(self.padding, self.mask.width(), self.mask.height());
        tracing::debug!(?bounds, ?region, "derived zone from brush strokes");
        Some(BrushOutcome {
            region,
            switch_back_after: self.switch_back_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn mask_with_rect(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> BrushMask {
        let mut raster = RgbaImage::new(w, h);
        for y in y0..=y1 {
            for x in x0..=x1 {
                raster.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        BrushMask::from_raster(raster)
    }

    #[test]
    fn bounding_box_is_padded_clamped_and_normalized() {
        let mask = mask_with_rect(200, 150, 10, 10, 50, 40);
        assert_eq!(
            mask.opaque_bounds(),
            Some(PixelBounds {
                min_x: 10,
                min_y: 10,
                max_x: 50,
                max_y: 40
            })
        );

        let outcome = BrushConverter::with_mask(mask).derive_region().unwrap();
        let r = outcome.region;
        assert!(approx(r.x, 0.0));
        assert!(approx(r.y, 0.0));
        assert!(approx(r.width, 30.0));
        assert!(approx(r.height, 100.0 / 3.0));
        assert_eq!(outcome.switch_back_after, SWITCH_BACK_DELAY);
    }

    #[test]
    fn padding_clamps_at_far_edges() {
        let mask = mask_with_rect(200, 100, 150, 60, 199, 99);
        let r = mask.opaque_bounds().unwrap().padded_region(10, 200, 100);
        assert!(approx(r.x, 70.0));
        assert!(approx(r.y, 50.0));
        assert!(approx(r.right(), 100.0));
        assert!(approx(r.bottom(), 100.0));
    }

    #[test]
    fn blank_raster_yields_nothing() {
        let mut converter = BrushConverter::new(200, 150);
        converter.handle_event(PointerEvent::down(20.0, 20.0));
        assert!(converter.handle_event(PointerEvent::up(20.0, 20.0)).is_none());
        assert!(BrushConverter::new(0, 0).derive_region().is_none());
    }

    #[test]
    fn painting_then_clearing_is_a_no_op() {
        let mut converter = BrushConverter::new(200, 150);
        converter.handle_event(PointerEvent::down(20.0, 20.0));
        converter.handle_event(PointerEvent::moved(60.0, 20.0));
        converter.mask_mut().clear();
        assert!(converter.handle_event(PointerEvent::up(60.0, 20.0)).is_none());
    }

    #[test]
    fn stroke_covers_segment_with_round_brush() {
        let mut converter = BrushConverter::new(400, 300);
        converter.handle_event(PointerEvent::down(100.0, 100.0));
        converter.handle_event(PointerEvent::moved(200.0, 100.0));
        let outcome = converter
            .handle_event(PointerEvent::up(200.0, 100.0))
            .unwrap();

        let b = converter.mask().opaque_bounds().unwrap();
        assert_eq!((b.min_x, b.max_x), (90, 209));
        assert_eq!((b.min_y, b.max_y), (90, 109));

        // (90-10, 90-10) to (209+10, 109+10) on 400x300
        let r = outcome.region;
        assert!(approx(r.x, 20.0));
        assert!(approx(r.y, 80.0 / 3.0));
        assert!(approx(r.width, 139.0 / 4.0));
        assert!(approx(r.height, 13.0));
    }

    #[test]
    fn strokes_accumulate_and_clip_to_raster() {
        let mut converter = BrushConverter::new(100, 100);
        converter.handle_event(PointerEvent::down(-50.0, 5.0));
        converter.handle_event(PointerEvent::moved(5.0, 5.0));
        converter.handle_event(PointerEvent::up(5.0, 5.0));
        converter.handle_event(PointerEvent::down(90.0, 90.0));
        converter.handle_event(PointerEvent::moved(95.0, 95.0));
        let outcome = converter.handle_event(PointerEvent::up(95.0, 95.0)).unwrap();

        let b = converter.mask().opaque_bounds().unwrap();
        assert_eq!((b.min_x, b.min_y), (0, 0));
        assert_eq!((b.max_x, b.max_y), (99, 99));
        assert_eq!(outcome.region, Region::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn far_and_infinite_moves_are_clipped_to_the_raster() {
        let start = std::time::Instant::now();
        let mut converter = BrushConverter::new(200, 150);
        converter.handle_event(PointerEvent::down(10.0, 10.0));
        converter.handle_event(PointerEvent::moved(1e10, 10.0));
        converter.handle_event(PointerEvent::moved(f64::INFINITY, 10.0));
        converter.handle_event(PointerEvent::moved(f64::NAN, f64::NEG_INFINITY));
        let outcome = converter
            .handle_event(PointerEvent::up(1e10, 10.0))
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));

        let b = converter.mask().opaque_bounds().unwrap();
        assert_eq!((b.min_x, b.max_x), (0, 199));
        assert_eq!((b.min_y, b.max_y), (0, 19));
        assert!(approx(outcome.region.right(), 100.0));
    }

    #[test]
    fn segment_entirely_outside_paints_nothing() {
        let mut mask = BrushMask::new(100, 100);
        mask.begin_stroke(Point::new(-500.0, -500.0));
        mask.extend_stroke(Point::new(1e12, -500.0));
        assert!(mask.opaque_bounds().is_none());
        assert!(clip_segment(
            Point::new(-50.0, 50.0),
            Point::new(-20.0, 60.0),
            Point::new(-10.0, -10.0),
            Point::new(110.0, 110.0),
        )
        .is_none());
    }

    #[test]
    fn up_without_stroke_is_ignored() {
        let mut converter = BrushConverter::with_mask(mask_with_rect(50, 50, 5, 5, 10, 10));
        assert!(converter.handle_event(PointerEvent::up(1.0, 1.0)).is_none());
    }
}
