use seqatlas_core::Viewport;

/// Latest visible rectangle plus one "dirty" flag per axis. The render surface
/// reports X and Y separately; the viewport counts as settled only once both
/// have reported since the flags were last cleared.
#[derive(Debug, Clone)]
pub struct ViewportTracker {
    current: Viewport,
    x_dirty: bool,
    y_dirty: bool,
    // set while the camera drives the viewport; echoes must not settle it
    suppressed: bool,
}

impl ViewportTracker {
    pub fn new(initial: Viewport) -> Self {
        Self {
            current: initial,
            x_dirty: false,
            y_dirty: false,
            suppressed: false,
        }
    }

    pub fn current(&self) -> Viewport {
        self.current
    }

    pub fn on_x_range(&mut self, min: f64, max: f64) -> bool {
        let Some(next) = self.current.with_x(min, max) else {
            tracing::warn!(min, max, "ignoring invalid x range");
            return false;
        };
        self.current = next;
        if !self.suppressed {
            self.x_dirty = true;
        }
        true
    }

    pub fn on_y_range(&mut self, min: f64, max: f64) -> bool {
        let Some(next) = self.current.with_y(min, max) else {
            tracing::warn!(min, max, "ignoring invalid y range");
            return false;
        };
        self.current = next;
        if !self.suppressed {
            self.y_dirty = true;
        }
        true
    }

    /// Programmatic write (camera frames). Does not touch the axis flags.
    pub fn write(&mut self, viewport: Viewport) {
        self.current = viewport;
    }

    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    pub fn is_settled(&self) -> bool {
        self.x_dirty && self.y_dirty
    }

    pub fn clear_settled(&mut self) {
        self.x_dirty = false;
        self.y_dirty = false;
    }
}
