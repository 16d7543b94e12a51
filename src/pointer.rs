//! Device-independent pointer input.
//!
//! Hosts translate mouse and touch input into [`PointerEvent`] once, at the
//! input boundary. The box editor and the brush only ever see this type.

/// A position in the host's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Rendered size of the surface a pointer moves over.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    /// Width in host units.
    pub width: f64,
    /// Height in host units.
    pub height: f64,
}

impl Size {
    /// Create a size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether both dimensions are finite and strictly positive.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Stage of a pointer interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// Button pressed or finger placed.
    Down,
    /// Pointer moved.
    Move,
    /// Button released or finger lifted.
    Up,
}

/// A single pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// What happened.
    pub phase: PointerPhase,
    /// Where it happened.
    pub position: Point,
}

impl PointerEvent {
    /// Pointer pressed at `(x, y)`.
    #[must_use]
    pub const fn down(x: f64, y: f64) -> Self {
        Self {
            phase: PointerPhase::Down,
            position: Point::new(x, y),
        }
    }

    /// Pointer moved to `(x, y)`.
    #[must_use]
    pub const fn moved(x: f64, y: f64) -> Self {
        Self {
            phase: PointerPhase::Move,
            position: Point::new(x, y),
        }
    }

    /// Pointer released at `(x, y)`.
    #[must_use]
    pub const fn up(x: f64, y: f64) -> Self {
        Self {
            phase: PointerPhase::Up,
            position: Point::new(x, y),
        }
    }

    /// Build an event from a touch list, tracking the first touch only.
    ///
    /// Returns `None` when no touch is active.
    #[must_use]
    pub fn from_touches(phase: PointerPhase, touches: &[Point]) -> Option<Self> {
        touches.first().map(|&position| Self { phase, position })
    }

    /// The same event with its position moved into a surface whose top-left
    /// corner sits at `origin`.
    #[must_use]
    pub fn relative_to(self, origin: Point) -> Self {
        Self {
            phase: self.phase,
            position: Point::new(self.position.x - origin.x, self.position.y - origin.y),
        }
    }
}
