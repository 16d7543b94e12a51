//! Per-image editing surface combining the box editor and the brush.

use std::time::{Duration, Instant};

use crate::brush::{
    BrushConverter, BrushMask, DEFAULT_BRUSH_DIAMETER, DEFAULT_PADDING, SWITCH_BACK_DELAY,
};
use crate::config::BrushConfig;
use crate::editor::{BoxEditor, Handle};
use crate::pointer::{PointerEvent, Size};
use crate::region::Region;

/// Which tool receives pointer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Drag the box or its corners.
    Box,
    /// Paint over the watermark.
    Brush,
}

/// Editing state for one image. Nothing here touches the item until the host
/// passes [`EditSession::commit`] to the batch processor.
#[derive(Debug, Clone)]
pub struct EditSession {
    editor: BoxEditor,
    brush: Option<BrushConverter>,
    mode: EditMode,
    switch_back_at: Option<Instant>,
    brush_padding: u32,
    brush_diameter: f64,
    switch_back_delay: Duration,
}

impl EditSession {
    /// Start editing from `region`, in box mode.
    #[must_use]
    pub fn new(region: Region) -> Self {
        Self {
            editor: BoxEditor::new(region),
            brush: None,
            mode: EditMode::Box,
            switch_back_at: None,
            brush_padding: DEFAULT_PADDING,
            brush_diameter: DEFAULT_BRUSH_DIAMETER,
            switch_back_delay: SWITCH_BACK_DELAY,
        }
    }

    /// Use brush settings from configuration.
    #[must_use]
    pub fn with_brush_config(mut self, config: &BrushConfig) -> Self {
        self.brush_padding = config.padding;
        self.brush_diameter = config.diameter;
        self.switch_back_delay = config.switch_back_delay;
        self
    }

    /// Current tool.
    #[must_use]
    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// The in-progress region.
    #[must_use]
    pub fn region(&self) -> Region {
        self.editor.region()
    }

    /// The brush surface while in brush mode.
    #[must_use]
    pub fn brush(&self) -> Option<&BrushConverter> {
        self.brush.as_ref()
    }

    /// Switch to box mode immediately.
    pub fn enter_box(&mut self) {
        self.mode = EditMode::Box;
        self.brush = None;
        self.switch_back_at = None;
    }

    /// Switch to brush mode on a clean raster the size of the displayed image.
    pub fn enter_brush(&mut self, display_width: u32, display_height: u32) {
        self.editor.end_drag();
        let mask = BrushMask::new(display_width, display_height).with_diameter(self.brush_diameter);
        self.brush = Some(
            BrushConverter::with_mask(mask)
                .padding(self.brush_padding)
                .switch_back_delay(self.switch_back_delay),
        );
        self.mode = EditMode::Brush;
        self.switch_back_at = None;
    }

    /// Route a pointer event to the active tool.
    ///
    /// In box mode `target` is the hit-tested handle under a `Down` event and
    /// `container` the rendered size of the image. In brush mode the event
    /// must already be in raster coordinates.
    pub fn handle_event(
        &mut self,
        event: PointerEvent,
        target: Option<Handle>,
        container: Size,
        now: Instant,
    ) -> Region {
        match self.mode {
            EditMode::Box => {
                self.editor.handle_event(event, target, container);
            }
            EditMode::Brush => {
                let outcome = self
                    .brush
                    .as_mut()
                    .and_then(|brush| brush.handle_event(event));
                if let Some(outcome) = outcome {
                    self.editor.set_region(outcome.region);
                    self.switch_back_at = Some(now + outcome.switch_back_after);
                }
            }
        }
        self.editor.region()
    }

    /// When the pending return to box mode is due, if one is scheduled.
    #[must_use]
    pub fn switch_back_at(&self) -> Option<Instant> {
        self.switch_back_at
    }

    /// Apply a scheduled switch back to box mode once `now` reaches it.
    pub fn tick(&mut self, now: Instant) -> EditMode {
        if self.switch_back_at.is_some_and(|at| now >= at) {
            self.enter_box();
        }
        self.mode
    }

    /// The region to hand to [`crate::BatchProcessor::process`].
    #[must_use]
    pub fn commit(&mut self) -> Region {
        self.editor.commit()
    }
}
