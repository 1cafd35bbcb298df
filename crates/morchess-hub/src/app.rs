use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use tracing::{debug, warn};

use morchess_core::{
    editor::{
        Editor, EditorAction,
        host::EditorHost,
        viewport::{CursorView, MarginPolicy},
    },
    keybinds::Mode,
    ui,
};

// ── Host ─────────────────────────────────────────────────────────────

/// The terminal side of the editor: command table, scroll policy and the
/// bits of editor output shown on the status line.
#[derive(Debug, Default)]
pub struct HubHost {
    /// Set by `:q`.
    pub should_quit: bool,
    /// One-line message for the status bar.
    pub status: String,
    /// Block name under the cursor.
    pub column: String,
    /// Last saved (or loaded) program text.
    pub program: String,
    /// Derived from the editor's height on every render.
    pub margins: MarginPolicy,
}

impl HubHost {
    fn copy_program(&mut self) {
        let result = arboard::Clipboard::new().and_then(|mut cb| cb.set_text(self.program.clone()));
        match result {
            Ok(()) => self.status = "Program copied to clipboard".to_string(),
            Err(err) => {
                warn!("clipboard write failed: {err}");
                self.status = format!("Copy failed: {err}");
            }
        }
    }
}

impl EditorHost for HubHost {
    fn on_save_program(&mut self, program: &str) {
        self.program = program.to_string();
        let lines = program.split('\n').count();
        self.status = format!("{lines}L written");
    }

    fn on_column_under_cursor(&mut self, column: &str) {
        self.column = column.to_string();
    }

    fn on_cursor_change(&mut self, view: &CursorView) -> Option<usize> {
        self.margins.scroll_target(view)
    }

    fn on_command_execute(&mut self, command: &str) -> bool {
        match command {
            "q" => {
                self.should_quit = true;
                true
            }
            "copy" => {
                self.copy_program();
                true
            }
            _ => {
                self.status = format!("Not an editor command: {command}");
                false
            }
        }
    }
}

// ── App ──────────────────────────────────────────────────────────────

/// The main application state.
pub struct App {
    editor: Editor<HubHost>,
}

impl App {
    pub fn new(editor: Editor<HubHost>) -> Self {
        Self { editor }
    }

    pub fn should_quit(&self) -> bool {
        self.editor.host().should_quit
    }

    /// Called every tick; applies finished clipboard reads.
    pub fn tick(&mut self) {
        self.editor.poll_clipboard();
    }

    /// Handle a terminal event.
    pub fn handle_event(&mut self, event: Event) {
        if let Event::Key(key) = event {
            self.handle_key(key);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        // Ctrl-c always quits
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            self.editor.host_mut().should_quit = true;
            return;
        }

        match self.editor.handle_key(key) {
            EditorAction::SaveFailed(msg) => {
                self.editor.host_mut().status = format!("Save failed: {msg}");
            }
            EditorAction::ModeChanged(mode) => {
                debug!(mode = mode.label(), "mode changed");
            }
            EditorAction::Handled | EditorAction::Unhandled => {}
        }
    }

    /// Render the entire application.
    pub fn render(&mut self, frame: &mut Frame) {
        let (content_area, status_area, command_area) = ui::standard_layout(frame.area());

        let title = self.editor.config().storage_key.clone();
        let block = ui::editor_block(&title);
        let inner = block.inner(content_area);
        frame.render_widget(block, content_area);

        self.editor.host_mut().margins = MarginPolicy::for_height(inner.height as usize);
        let mode = self.editor.mode();
        self.editor.render(frame, inner, mode != Mode::Command);

        let host = self.editor.host();
        let dirty = if self.editor.has_unsaved_changes() { "[+] " } else { "" };
        let info = format!(
            "{dirty}{}:{}  {}",
            self.editor.i_line() + 1,
            self.editor.i_cursor() + 1,
            host.status
        );
        ui::render_status_bar(frame, status_area, mode, &title, &host.column, &info);

        if mode == Mode::Command {
            ui::render_command_line(frame, command_area, self.editor.command());
        }
    }
}
