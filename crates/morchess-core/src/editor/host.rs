use super::viewport::{CursorView, MarginPolicy};

/// Everything the editor tells the world about.
///
/// Notifications raised while a key is being handled are delivered after the
/// key's edit is complete, so a host always observes a consistent editor.
pub trait EditorHost {
    /// Program text after `:w` succeeded, or after a load.
    fn on_save_program(&mut self, program: &str);

    /// Name of the block the cursor is in, `""` if none.
    fn on_column_under_cursor(&mut self, column: &str);

    /// Cursor line changed. Return `Some(y)` to scroll the camera to `y`.
    fn on_cursor_change(&mut self, view: &CursorView) -> Option<usize> {
        MarginPolicy::default().scroll_target(view)
    }

    /// A `:` command other than `w`. Return whether it was recognized.
    fn on_command_execute(&mut self, command: &str) -> bool;
}
