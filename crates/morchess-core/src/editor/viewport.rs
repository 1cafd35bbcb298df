use crate::keybinds::Mode;

/// Index of the first visible line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Camera {
    y: usize,
}

impl Camera {
    pub fn y(&self) -> usize {
        self.y
    }

    /// Move the camera to `target`, clamped into `[0, line_count]`.
    /// Returns whether the camera actually moved.
    pub fn scroll_camera_y(&mut self, target: usize, line_count: usize) -> bool {
        let target = target.min(line_count);
        if target == self.y {
            return false;
        }
        self.y = target;
        true
    }

    /// Pull the camera back after lines were removed.
    pub fn clamp(&mut self, line_count: usize) {
        self.y = self.y.min(line_count);
    }
}

/// Snapshot handed to the host whenever the cursor line changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorView {
    pub i_line: usize,
    pub i_cursor: usize,
    pub camera_y: usize,
    pub line_count: usize,
    pub mode: Mode,
}

/// Keeps the cursor line between `camera_y + top` and `camera_y + bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarginPolicy {
    pub top: usize,
    pub bottom: usize,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self { top: 3, bottom: 20 }
    }
}

impl MarginPolicy {
    /// Policy for a view showing `visible` lines: keep `top` lines of context
    /// at both edges.
    pub fn for_height(visible: usize) -> Self {
        let top = Self::default().top;
        let bottom = visible.saturating_sub(top + 1).max(top);
        Self { top, bottom }
    }

    /// Camera position that brings the cursor back inside the margins, if it
    /// left them.
    pub fn scroll_target(&self, view: &CursorView) -> Option<usize> {
        if view.i_line < view.camera_y + self.top {
            Some(view.i_line.saturating_sub(self.top))
        } else if view.i_line > view.camera_y + self.bottom {
            Some(view.i_line - self.bottom)
        } else {
            None
        }
    }
}
