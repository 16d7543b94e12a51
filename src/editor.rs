//! Direct manipulation of a zone: move the box or drag one of its corners.
//!
//! Every pointer move derives the new region from the snapshot taken when the
//! drag started, so rounding never accumulates across frames.

use crate::pointer::{Point, PointerEvent, PointerPhase, Size};
use crate::region::{Region, FULL, MIN_SIZE};

/// Interaction point a drag starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    /// The box body: translate without resizing.
    Move,
    /// Top-left corner.
    NorthWest,
    /// Top-right corner.
    NorthEast,
    /// Bottom-left corner.
    SouthWest,
    /// Bottom-right corner.
    SouthEast,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragState {
    Idle,
    Dragging {
        handle: Handle,
        origin: Point,
        snapshot: Region,
    },
}

/// Drag/resize state machine for one region.
#[derive(Debug, Clone)]
pub struct BoxEditor {
    region: Region,
    state: DragState,
}

impl BoxEditor {
    /// Start editing `region`.
    #[must_use]
    pub fn new(region: Region) -> Self {
        Self {
            region: region.clamp(),
            state: DragState::Idle,
        }
    }

    /// The in-progress region.
    #[must_use]
    pub fn region(&self) -> Region {
        self.region
    }

    /// Replace the region, abandoning any drag in progress.
    pub fn set_region(&mut self, region: Region) {
        self.region = region.clamp();
        self.state = DragState::Idle;
    }

    /// Whether a drag is in progress.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// The handle being dragged, if any.
    #[must_use]
    pub fn active_handle(&self) -> Option<Handle> {
        match self.state {
            DragState::Idle => None,
            DragState::Dragging { handle, .. } => Some(handle),
        }
    }

    /// Begin dragging `handle` from `at`.
    pub fn begin_drag(&mut self, handle: Handle, at: Point) {
        self.state = DragState::Dragging {
            handle,
            origin: at,
            snapshot: self.region,
        };
    }

    /// Update the region for a pointer at `at` over a container of `container`
    /// size. Ignored while idle or when the container has no usable size.
    pub fn drag_to(&mut self, at: Point, container: Size) -> Region {
        if let DragState::Dragging {
            handle,
            origin,
            snapshot,
        } = self.state
        {
            if container.is_usable() {
                let dx = (at.x - origin.x) / container.width * FULL;
                let dy = (at.y - origin.y) / container.height * FULL;
                self.region = apply_drag(snapshot, handle, dx, dy);
            }
        }
        self.region
    }

    /// Finish the drag, keeping the current region.
    pub fn end_drag(&mut self) {
        self.state = DragState::Idle;
    }

    /// Feed one pointer event.
    ///
    /// `target` is what the host hit-tested under a `Down` event; it is
    /// ignored for other phases.
    pub fn handle_event(
        &mut self,
        event: PointerEvent,
        target: Option<Handle>,
        container: Size,
    ) -> Region {
        match event.phase {
            PointerPhase::Down => {
                if let Some(handle) = target {
                    self.begin_drag(handle, event.position);
                }
            }
            PointerPhase::Move => {
                self.drag_to(event.position, container);
            }
            PointerPhase::Up => self.end_drag(),
        }
        self.region
    }

    /// Hand the edited region to the caller for committing.
    #[must_use]
    pub fn commit(&mut self) -> Region {
        self.end_drag();
        self.region
    }
}

/// Derive a region from `snapshot` moved by a percentage delta on `handle`.
#[must_use]
pub fn apply_drag(snapshot: Region, handle: Handle, dx: f64, dy: f64) -> Region {
    let mut next = snapshot;
    match handle {
        Handle::Move => {
            next.x = (snapshot.x + dx).clamp(0.0, FULL - snapshot.width);
            next.y = (snapshot.y + dy).clamp(0.0, FULL - snapshot.height);
        }
        Handle::SouthEast => {
            next.width = grow(snapshot.width, snapshot.x, dx);
            next.height = grow(snapshot.height, snapshot.y, dy);
        }
        Handle::SouthWest => {
            (next.x, next.width) = pull_leading_edge(snapshot.x, snapshot.width, dx);
            next.height = grow(snapshot.height, snapshot.y, dy);
        }
        Handle::NorthWest => {
            (next.x, next.width) = pull_leading_edge(snapshot.x, snapshot.width, dx);
            (next.y, next.height) = pull_leading_edge(snapshot.y, snapshot.height, dy);
        }
        Handle::NorthEast => {
            (next.y, next.height) = pull_leading_edge(snapshot.y, snapshot.height, dy);
            next.width = grow(snapshot.width, snapshot.x, dx);
        }
    }
    next.clamp()
}

/// Trailing edge moves: size follows the delta within `[5, 100 - offset]`.
fn grow(size: f64, offset: f64, delta: f64) -> f64 {
    (size + delta).min(FULL - offset).max(MIN_SIZE)
}

/// Leading edge moves within `[0, far_edge - 5]`; the far edge stays put.
fn pull_leading_edge(offset: f64, size: f64, delta: f64) -> (f64, f64) {
    let max_offset = offset + size - MIN_SIZE;
    let moved = (offset + delta).min(max_offset).max(0.0);
    (moved, size + (offset - moved))
}
