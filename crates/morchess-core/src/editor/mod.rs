//! Modal program editor.
//!
//! `Editor` owns the line buffer, the per-line lex table and the viewport.
//! Every `handle_key` call is one transaction: the edit, the incremental
//! re-lex and cursor clamping all happen before any host notification goes
//! out.

pub mod buffer;
pub mod clipboard;
pub mod host;
pub mod lexer;
pub mod motion;
pub mod render;
pub mod ripple;
pub mod store;
pub mod viewport;

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent};
use tracing::{debug, warn};

use crate::keybinds::{is_command_char, is_ctrl, is_literal_char, Mode};
use buffer::{Change, Line, LineId, TextBuffer, next_char_start, prev_char_start};
use clipboard::{ClipboardReader, ClipboardSource};
use host::EditorHost;
use lexer::{LexState, LineMetadata};
use motion::Operator;
use ripple::LexTable;
use store::{PersistedProgram, ProgramStore};
use viewport::{Camera, CursorView};

/// The command the editor handles itself.
const SAVE_COMMAND: &str = "w";

// ── Configuration ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// Lines moved by ctrl-u / ctrl-d.
    pub page_lines: usize,
    /// Content of the line that stands in for an empty buffer.
    pub placeholder: String,
    /// Name the program is persisted under.
    pub storage_key: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            page_lines: 13,
            placeholder: "hello".to_string(),
            storage_key: ".morchess4.program".to_string(),
        }
    }
}

/// Collaborators handed to the editor at construction.
pub struct EditorContext<H> {
    pub host: H,
    pub store: Box<dyn ProgramStore>,
    pub clipboard: Box<dyn ClipboardSource>,
}

// ── Editor action result ─────────────────────────────────────────────

/// What a key did, for the host to decide whether the platform default
/// should still run and what to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// Key was consumed.
    Handled,
    /// Key means nothing here; let it through.
    Unhandled,
    /// Key was consumed and switched the mode.
    ModeChanged(Mode),
    /// `:w` failed; the program is still unsaved.
    SaveFailed(String),
}

/// Notifications collected during a transaction.
#[derive(Debug, Default)]
struct Outbox {
    saved: Option<String>,
    cursor_moved: bool,
}

// ── Editor ───────────────────────────────────────────────────────────

pub struct Editor<H: EditorHost> {
    config: EditorConfig,
    buffer: TextBuffer,
    lex: LexTable,
    camera: Camera,
    mode: Mode,
    motion: Option<Operator>,
    g_mode: bool,
    command: String,
    yank: Option<String>,
    host: H,
    store: Box<dyn ProgramStore>,
    clipboard: ClipboardReader,
    /// Bumped on every load; pastes requested before it are dropped.
    paste_generation: u64,
    outbox: Outbox,
}

impl<H: EditorHost> Editor<H> {
    pub fn new(config: EditorConfig, context: EditorContext<H>) -> Self {
        let buffer = TextBuffer::new(&config.placeholder);
        let mut lex = LexTable::new();
        lex.reload(buffer.lines());
        Self {
            config,
            buffer,
            lex,
            camera: Camera::default(),
            mode: Mode::Normal,
            motion: None,
            g_mode: false,
            command: String::new(),
            yank: None,
            host: context.host,
            store: context.store,
            clipboard: ClipboardReader::spawn(context.clipboard),
            paste_generation: 0,
            outbox: Outbox::default(),
        }
    }

    /// Replace the buffer with the persisted program, or the placeholder
    /// record if nothing was saved yet. Restores cursor and camera.
    pub fn load(&mut self) -> Result<()> {
        let record = self
            .store
            .load(&self.config.storage_key)
            .context("Failed to load program")?
            .unwrap_or_else(|| PersistedProgram::initial(&self.config.placeholder));

        let removed = self.buffer.set_text(&record.program);
        self.lex.forget(&removed);
        self.lex.reload(self.buffer.lines());

        self.buffer.i_line = record.i_line;
        self.buffer.i_cursor = record.i_cursor;
        let change = self.buffer.clamp_cursor(true);
        self.apply(change);
        self.camera = Camera::default();
        self.camera
            .scroll_camera_y(record.camera_y, self.buffer.line_count());

        self.mode = Mode::Normal;
        self.motion = None;
        self.g_mode = false;
        self.command.clear();
        self.paste_generation += 1;
        self.buffer.dirty = false;

        debug!(
            lines = self.buffer.line_count(),
            key = %self.config.storage_key,
            "program loaded"
        );
        let program = self.full_text();
        self.host.on_save_program(&program);
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn full_text(&self) -> String {
        self.buffer.text()
    }

    pub fn lines(&self) -> &[Line] {
        self.buffer.lines()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn i_line(&self) -> usize {
        self.buffer.i_line
    }

    pub fn i_cursor(&self) -> usize {
        self.buffer.i_cursor
    }

    pub fn camera_y(&self) -> usize {
        self.camera.y()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn yank(&self) -> Option<&str> {
        self.yank.as_deref()
    }

    pub fn pending_motion(&self) -> Option<Operator> {
        self.motion
    }

    pub fn g_mode(&self) -> bool {
        self.g_mode
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.buffer.dirty
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn metadata(&self, id: LineId) -> Option<&LineMetadata> {
        self.lex.metadata(id)
    }

    pub fn exit_state(&self, id: LineId) -> Option<LexState> {
        self.lex.exit_state(id)
    }

    pub fn column_under_cursor(&self) -> String {
        self.lex
            .column_under_cursor(self.buffer.lines(), self.buffer.i_line)
    }

    pub fn cursor_view(&self) -> CursorView {
        CursorView {
            i_line: self.buffer.i_line,
            i_cursor: self.buffer.i_cursor,
            camera_y: self.camera.y(),
            line_count: self.buffer.line_count(),
            mode: self.mode,
        }
    }

    /// Move the camera (clamped). Returns whether it moved.
    pub fn scroll_camera_y(&mut self, target: usize) -> bool {
        self.camera
            .scroll_camera_y(target, self.buffer.line_count())
    }

    // ── Transaction plumbing ─────────────────────────────────────────

    /// Bring the lex table in line with a buffer edit.
    fn apply(&mut self, change: Change) {
        if change.is_empty() {
            return;
        }
        self.lex.forget(&change.removed);
        if let Some(index) = change.relex_from {
            self.lex.ripple(self.buffer.lines(), index);
        }
        self.buffer.dirty = true;
    }

    fn clamp(&mut self) {
        let change = self.buffer.clamp_cursor(self.mode == Mode::Edit);
        self.apply(change);
        self.camera.clamp(self.buffer.line_count());
    }

    /// Deliver everything queued during the transaction.
    fn flush(&mut self) {
        let outbox = std::mem::take(&mut self.outbox);
        if let Some(program) = &outbox.saved {
            self.host.on_save_program(program);
        }
        if outbox.saved.is_none() && !outbox.cursor_moved {
            return;
        }
        let column = self.column_under_cursor();
        self.host.on_column_under_cursor(&column);
        let view = self.cursor_view();
        if let Some(target) = self.host.on_cursor_change(&view) {
            self.scroll_camera_y(target);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> EditorAction {
        let mode_before = self.mode;
        let line_before = self.buffer.i_line;
        let count_before = self.buffer.line_count();

        let action = match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Edit => self.handle_edit_key(key),
            Mode::Command => self.handle_command_key(key),
        };

        if action != EditorAction::Unhandled {
            self.clamp();
        }
        if self.buffer.i_line != line_before || self.buffer.line_count() != count_before {
            self.outbox.cursor_moved = true;
        }
        self.flush();

        match action {
            EditorAction::Handled if self.mode != mode_before => {
                EditorAction::ModeChanged(self.mode)
            }
            other => other,
        }
    }

    // ── Normal mode ──────────────────────────────────────────────────

    fn handle_normal_key(&mut self, key: KeyEvent) -> EditorAction {
        if is_ctrl(&key) {
            return self.handle_normal_ctrl_key(key);
        }

        let c = match key.code {
            KeyCode::Char(c) => c,
            KeyCode::Backspace => 'h',
            KeyCode::Esc => {
                self.motion = None;
                self.g_mode = false;
                return EditorAction::Handled;
            }
            _ => return EditorAction::Unhandled,
        };

        if self.motion == Some(Operator::Replace) && c.is_ascii_alphanumeric() {
            self.replace_under_cursor(c);
            self.motion = None;
            self.g_mode = false;
            return EditorAction::Handled;
        }

        // first half of `gg` keeps a pending `d` alive
        if c == 'g' && !self.g_mode {
            self.g_mode = true;
            return EditorAction::Handled;
        }

        match c {
            'g' => {
                self.g_mode = false;
                if self.motion == Some(Operator::Delete) {
                    self.delete_to_start_of_buffer();
                    self.motion = None;
                } else {
                    self.buffer.i_line = 0;
                    self.buffer.i_cursor = 0;
                }
            }
            'G' => {
                if self.motion == Some(Operator::Delete) {
                    self.delete_to_end_of_buffer();
                    self.motion = None;
                } else {
                    self.buffer.i_line = self.buffer.line_count() - 1;
                    self.buffer.i_cursor = 0;
                }
            }
            ':' => {
                self.command.clear();
                self.mode = Mode::Command;
            }
            'i' => self.mode = Mode::Edit,
            'a' => {
                self.buffer.cursor_right();
                self.mode = Mode::Edit;
            }
            'A' => {
                self.buffer.i_cursor = self.buffer.current_line().len();
                self.mode = Mode::Edit;
            }
            'o' => self.open_line(self.buffer.i_line + 1),
            'O' => self.open_line(self.buffer.i_line),
            'h' => self.buffer.cursor_left(),
            'l' => self.buffer.cursor_right(),
            'j' if self.motion == Some(Operator::Delete) => self.delete_lines_down(),
            'k' if self.motion == Some(Operator::Delete) => self.delete_lines_up(),
            'j' => self.buffer.i_line += 1,
            'k' => self.buffer.i_line = self.buffer.i_line.saturating_sub(1),
            'w' => self.word_forward(),
            'b' => self.word_backward(),
            '_' => self.first_word(),
            '0' => self.buffer.i_cursor = 0,
            '$' => self.line_end(),
            'x' => {
                let (line, at) = (self.buffer.i_line, self.buffer.i_cursor);
                let end = next_char_start(self.buffer.current_line(), at);
                let (_, change) = self.buffer.delete_range(line, at, end);
                self.apply(change);
            }
            'D' => self.delete_rest_of_line(),
            'C' => {
                self.delete_rest_of_line();
                self.mode = Mode::Edit;
            }
            'J' => self.join_with_next(),
            'p' | 'P' => {
                if let Some(text) = self.yank.clone() {
                    self.insert_text(&text);
                }
            }
            'd' | 'y' | 'c' | 'r' | 'Y' | 'R' => {
                if let Some(op) = Operator::from_key(c) {
                    self.begin_operator(op);
                }
            }
            _ => return EditorAction::Unhandled,
        }

        self.settle_pending(c);
        EditorAction::Handled
    }

    fn handle_normal_ctrl_key(&mut self, key: KeyEvent) -> EditorAction {
        match key.code {
            KeyCode::Char('u') => {
                self.buffer.i_line = self.buffer.i_line.saturating_sub(self.config.page_lines);
            }
            KeyCode::Char('d') => {
                self.buffer.i_line = self.buffer.i_line.saturating_add(self.config.page_lines);
            }
            _ => return EditorAction::Unhandled,
        }
        self.motion = None;
        self.g_mode = false;
        EditorAction::Handled
    }

    /// A pending operator survives only its own key; `g` state only `g`.
    fn settle_pending(&mut self, key: char) {
        if self.motion.is_some() && self.motion != Operator::from_key(key) {
            self.motion = None;
        }
        if key != 'g' {
            self.g_mode = false;
        }
    }

    /// `d`, `y`, `c`, `r`: arm the operator, or run the doubled form.
    fn begin_operator(&mut self, op: Operator) {
        if self.motion != Some(op) {
            self.motion = Some(op);
            return;
        }
        self.motion = None;
        match op {
            Operator::Delete => self.delete_current_line(),
            Operator::Change => self.change_current_line(),
            Operator::Yank => self.yank_current_line(),
            Operator::Replace => {}
        }
    }

    fn open_line(&mut self, at: usize) {
        let change = self.buffer.splice_lines(at, 0, vec![String::new()]);
        self.apply(change);
        self.buffer.i_line = at;
        self.buffer.i_cursor = 0;
        self.mode = Mode::Edit;
    }

    fn join_with_next(&mut self) {
        let line = self.buffer.i_line;
        if line + 1 >= self.buffer.line_count() {
            return;
        }
        let col = self.buffer.current_line().len();
        let change = self.buffer.join_line(line);
        self.apply(change);
        self.buffer.i_cursor = col;
    }

    /// Insert (possibly multi-line) text at the cursor and move past it.
    fn insert_text(&mut self, text: &str) {
        let (change, line, col) =
            self.buffer
                .insert_text(self.buffer.i_line, self.buffer.i_cursor, text);
        self.apply(change);
        self.buffer.i_line = line;
        self.buffer.i_cursor = col;
    }

    // ── Edit mode ────────────────────────────────────────────────────

    fn handle_edit_key(&mut self, key: KeyEvent) -> EditorAction {
        if is_ctrl(&key) {
            return match key.code {
                KeyCode::Char('o') => EditorAction::Handled,
                KeyCode::Char('h') => {
                    self.backspace();
                    EditorAction::Handled
                }
                KeyCode::Char('j') => {
                    self.break_line();
                    EditorAction::Handled
                }
                KeyCode::Char('v') => {
                    self.request_paste();
                    EditorAction::Handled
                }
                _ => EditorAction::Unhandled,
            };
        }

        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.motion = None;
                self.g_mode = false;
            }
            KeyCode::Enter => self.break_line(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char('J') => self.join_with_next(),
            KeyCode::Char(c) if is_literal_char(c) => {
                let change = self
                    .buffer
                    .insert_char(self.buffer.i_line, self.buffer.i_cursor, c);
                self.apply(change);
                self.buffer.i_cursor += c.len_utf8();
            }
            _ => return EditorAction::Unhandled,
        }
        EditorAction::Handled
    }

    fn break_line(&mut self) {
        let change = self
            .buffer
            .split_line(self.buffer.i_line, self.buffer.i_cursor);
        self.apply(change);
        self.buffer.i_line += 1;
        self.buffer.i_cursor = 0;
    }

    /// Delete the char before the cursor; at column 0, join onto the line above.
    fn backspace(&mut self) {
        let (line, at) = (self.buffer.i_line, self.buffer.i_cursor);
        if at > 0 {
            let start = prev_char_start(self.buffer.current_line(), at);
            let (_, change) = self.buffer.delete_range(line, start, at);
            self.apply(change);
            self.buffer.i_cursor = start;
        } else if line > 0 {
            self.buffer.i_line -= 1;
            self.join_with_next();
        }
    }

    fn request_paste(&mut self) {
        if !self.clipboard.request(self.paste_generation) {
            warn!("clipboard reader is gone, paste ignored");
        }
    }

    /// Apply finished clipboard reads. Call on the host's tick.
    /// Returns whether anything was pasted.
    pub fn poll_clipboard(&mut self) -> bool {
        let line_before = self.buffer.i_line;
        let count_before = self.buffer.line_count();
        let mut pasted = false;
        while let Some(result) = self.clipboard.try_recv() {
            if result.generation != self.paste_generation {
                debug!(generation = result.generation, "dropping paste from before reload");
                continue;
            }
            match result.text {
                Ok(text) => {
                    self.insert_text(&text);
                    pasted = true;
                }
                Err(err) => debug!("clipboard read failed: {err:#}"),
            }
        }
        if pasted {
            self.clamp();
            if self.buffer.i_line != line_before || self.buffer.line_count() != count_before {
                self.outbox.cursor_moved = true;
            }
            self.flush();
        }
        pasted
    }

    // ── Command mode ─────────────────────────────────────────────────

    fn handle_command_key(&mut self, key: KeyEvent) -> EditorAction {
        match key.code {
            KeyCode::Esc => {
                self.command.clear();
                self.mode = Mode::Normal;
                EditorAction::Handled
            }
            KeyCode::Enter => {
                let command = std::mem::take(&mut self.command);
                self.mode = Mode::Normal;
                self.execute_command(&command)
            }
            KeyCode::Backspace => {
                self.command.pop();
                EditorAction::Handled
            }
            KeyCode::Char(c) if !is_ctrl(&key) && is_command_char(c) => {
                self.command.push(c);
                EditorAction::Handled
            }
            _ => EditorAction::Unhandled,
        }
    }

    fn execute_command(&mut self, command: &str) -> EditorAction {
        if command == SAVE_COMMAND {
            return match self.save() {
                Ok(()) => EditorAction::Handled,
                Err(err) => {
                    warn!("save failed: {err:#}");
                    EditorAction::SaveFailed(format!("{err:#}"))
                }
            };
        }
        if !self.host.on_command_execute(command) {
            debug!(command, "unrecognized command");
        }
        EditorAction::Handled
    }

    fn save(&mut self) -> Result<()> {
        let record = PersistedProgram {
            program: self.full_text(),
            i_cursor: self.buffer.i_cursor,
            i_line: self.buffer.i_line,
            camera_y: self.camera.y(),
        };
        self.store.save(&self.config.storage_key, &record)?;
        self.buffer.dirty = false;
        debug!(key = %self.config.storage_key, "program saved");
        self.outbox.saved = Some(record.program);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_db;
    use crate::editor::lexer::TokenKind;
    use crate::editor::store::SqliteProgramStore;
    use crate::editor::viewport::MarginPolicy;
    use crossterm::event::KeyModifiers;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct RecordingHost {
        saved: Vec<String>,
        columns: Vec<String>,
        commands: Vec<String>,
        cursor_changes: usize,
    }

    impl EditorHost for RecordingHost {
        fn on_save_program(&mut self, program: &str) {
            self.saved.push(program.to_string());
        }

        fn on_column_under_cursor(&mut self, column: &str) {
            self.columns.push(column.to_string());
        }

        fn on_cursor_change(&mut self, view: &CursorView) -> Option<usize> {
            self.cursor_changes += 1;
            MarginPolicy::default().scroll_target(view)
        }

        fn on_command_execute(&mut self, command: &str) -> bool {
            self.commands.push(command.to_string());
            command == "q"
        }
    }

    struct FixedClipboard(&'static str);

    impl ClipboardSource for FixedClipboard {
        fn read_text(&mut self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Clone, Default)]
    struct SharedStore(Rc<RefCell<HashMap<String, PersistedProgram>>>);

    impl ProgramStore for SharedStore {
        fn load(&self, name: &str) -> Result<Option<PersistedProgram>> {
            Ok(self.0.borrow().get(name).cloned())
        }

        fn save(&mut self, name: &str, record: &PersistedProgram) -> Result<()> {
            self.0.borrow_mut().insert(name.to_string(), record.clone());
            Ok(())
        }
    }

    struct FailingStore;

    impl ProgramStore for FailingStore {
        fn load(&self, _name: &str) -> Result<Option<PersistedProgram>> {
            Ok(None)
        }

        fn save(&mut self, _name: &str, _record: &PersistedProgram) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn editor_on(store: Box<dyn ProgramStore>, paste: &'static str) -> Editor<RecordingHost> {
        let mut ed = Editor::new(
            EditorConfig::default(),
            EditorContext {
                host: RecordingHost::default(),
                store,
                clipboard: Box::new(FixedClipboard(paste)),
            },
        );
        ed.load().unwrap();
        ed
    }

    fn editor_with(text: &str) -> Editor<RecordingHost> {
        let mut store = SqliteProgramStore::new(open_memory_db().unwrap()).unwrap();
        let record = PersistedProgram {
            program: text.to_string(),
            ..PersistedProgram::initial("")
        };
        store
            .save(&EditorConfig::default().storage_key, &record)
            .unwrap();
        editor_on(Box::new(store), "")
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn esc() -> KeyEvent {
        KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)
    }

    fn enter() -> KeyEvent {
        KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)
    }

    fn backspace() -> KeyEvent {
        KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE)
    }

    fn keys(ed: &mut Editor<RecordingHost>, s: &str) {
        for c in s.chars() {
            ed.handle_key(key(c));
        }
    }

    fn contents(ed: &Editor<RecordingHost>) -> Vec<&str> {
        ed.lines().iter().map(|l| l.content.as_str()).collect()
    }

    fn numbered(n: usize) -> String {
        (0..n).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n")
    }

    // ── Loading ──────────────────────────────────────────────────────

    #[test]
    fn test_empty_store_loads_placeholder() {
        let ed = editor_on(Box::new(SharedStore::default()), "");
        assert_eq!(contents(&ed), vec!["hello"]);
        assert_eq!(ed.host().saved, vec!["hello"]);
        assert!(!ed.has_unsaved_changes());
        assert_eq!(ed.mode(), Mode::Normal);
    }

    #[test]
    fn test_load_restores_cursor_and_camera() {
        let store = SharedStore::default();
        store.0.borrow_mut().insert(
            EditorConfig::default().storage_key,
            PersistedProgram {
                program: numbered(40),
                i_cursor: 1,
                i_line: 30,
                camera_y: 12,
            },
        );
        let ed = editor_on(Box::new(store), "");
        assert_eq!((ed.i_line(), ed.i_cursor(), ed.camera_y()), (30, 1, 12));
        assert_eq!(ed.lex.len(), 40);
    }

    #[test]
    fn test_load_clamps_out_of_range_record() {
        let store = SharedStore::default();
        store.0.borrow_mut().insert(
            EditorConfig::default().storage_key,
            PersistedProgram {
                program: "ab\ncd".to_string(),
                i_cursor: 9,
                i_line: 9,
                camera_y: 9,
            },
        );
        let ed = editor_on(Box::new(store), "");
        assert_eq!((ed.i_line(), ed.i_cursor(), ed.camera_y()), (1, 2, 2));
    }

    // ── Normal mode ──────────────────────────────────────────────────

    #[test]
    fn test_dd_deletes_line() {
        let mut ed = editor_with("a\nb\nc");
        keys(&mut ed, "jdd");
        assert_eq!(contents(&ed), vec!["a", "c"]);
        assert_eq!(ed.i_line(), 1);
        assert!(ed.has_unsaved_changes());
        assert_eq!(ed.lex.len(), 2);
    }

    #[test]
    fn test_dd_on_only_line_leaves_placeholder() {
        let mut ed = editor_with("fact x");
        keys(&mut ed, "dd");
        assert_eq!(contents(&ed), vec!["hello"]);
        assert_eq!(ed.i_cursor(), 0);
    }

    #[test]
    fn test_cc_clears_line_and_enters_edit() {
        let mut ed = editor_with("abc\ndef");
        assert_eq!(ed.handle_key(key('c')), EditorAction::Handled);
        assert_eq!(ed.pending_motion(), Some(Operator::Change));
        assert_eq!(ed.handle_key(key('c')), EditorAction::ModeChanged(Mode::Edit));
        assert_eq!(contents(&ed), vec!["", "def"]);
        assert_eq!((ed.i_line(), ed.i_cursor()), (0, 0));
    }

    #[test]
    fn test_typing_keyword_opens_region() {
        let mut ed = editor_with("abc");
        keys(&mut ed, "ccfact");
        let id = ed.lines()[0].id;
        let kinds: Vec<TokenKind> = ed.metadata(id).unwrap().tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::BeginFact]);
        assert!(ed.exit_state(id).unwrap().in_fact());
    }

    #[test]
    fn test_dw_deletes_word() {
        let mut ed = editor_with("fact x");
        keys(&mut ed, "dw");
        assert_eq!(contents(&ed), vec!["x"]);
        assert_eq!(ed.pending_motion(), None);
    }

    #[test]
    fn test_dw_on_last_word_deletes_to_end() {
        let mut ed = editor_with("ab cd\nef");
        keys(&mut ed, "wdw");
        assert_eq!(contents(&ed), vec!["ab ", "ef"]);
        assert_eq!(ed.i_line(), 0);
    }

    #[test]
    fn test_cw_changes_word() {
        let mut ed = editor_with("idea old");
        keys(&mut ed, "wcw");
        assert_eq!(ed.mode(), Mode::Edit);
        keys(&mut ed, "new");
        assert_eq!(contents(&ed), vec!["idea new"]);
    }

    #[test]
    fn test_db_deletes_back_to_word_start() {
        let mut ed = editor_with("hello world");
        keys(&mut ed, "$db");
        assert_eq!(contents(&ed), vec!["hello d"]);
        assert_eq!(ed.i_cursor(), 6);
    }

    #[test]
    fn test_d_dollar_and_underscore() {
        let mut ed = editor_with("abc def");
        keys(&mut ed, "wd$");
        assert_eq!(contents(&ed), vec!["abc "]);
        assert_eq!(ed.i_cursor(), 3);

        let mut ed = editor_with("  ab cd");
        keys(&mut ed, "$d_");
        assert_eq!(contents(&ed), vec!["  d"]);
        assert_eq!(ed.i_cursor(), 2);
    }

    #[test]
    fn test_yank_motion_and_paste() {
        let mut ed = editor_with("ab cd");
        keys(&mut ed, "yw");
        assert_eq!(ed.yank(), Some("ab "));
        keys(&mut ed, "$p");
        assert_eq!(contents(&ed), vec!["ab cab d"]);
    }

    #[test]
    fn test_yy_and_p() {
        let mut ed = editor_with("abc\ndef");
        keys(&mut ed, "xJDyyp");
        assert_eq!(ed.yank(), Some("bc"));
        assert_eq!(contents(&ed), vec!["bbcc"]);
        assert_eq!(ed.i_cursor(), 3);
    }

    #[test]
    fn test_replace_char() {
        let mut ed = editor_with("abc");
        keys(&mut ed, "lrX");
        assert_eq!(contents(&ed), vec!["aXc"]);
        assert_eq!(ed.pending_motion(), None);
    }

    #[test]
    fn test_pending_operator_cleared_by_other_key() {
        let mut ed = editor_with("abc\ndef");
        keys(&mut ed, "dl");
        assert_eq!(ed.pending_motion(), None);
        keys(&mut ed, "d");
        assert_eq!(ed.pending_motion(), Some(Operator::Delete));
        keys(&mut ed, "y");
        assert_eq!(ed.pending_motion(), Some(Operator::Yank));
        assert_eq!(contents(&ed), vec!["abc", "def"]);
    }

    #[test]
    fn test_escape_clears_pending_state() {
        let mut ed = editor_with("abc");
        keys(&mut ed, "dg");
        assert!(ed.g_mode());
        ed.handle_key(esc());
        assert_eq!(ed.pending_motion(), None);
        assert!(!ed.g_mode());
    }

    #[test]
    fn test_gg_and_big_g() {
        let mut ed = editor_with(&numbered(5));
        keys(&mut ed, "G");
        assert_eq!(ed.i_line(), 4);
        keys(&mut ed, "g");
        assert!(ed.g_mode());
        assert_eq!(ed.i_line(), 4);
        keys(&mut ed, "g");
        assert_eq!(ed.i_line(), 0);
        assert!(!ed.g_mode());
    }

    #[test]
    fn test_g_then_other_key_drops_prefix() {
        let mut ed = editor_with(&numbered(5));
        keys(&mut ed, "gjg");
        assert_eq!(ed.i_line(), 1);
        assert!(ed.g_mode());
    }

    #[test]
    fn test_dgg_deletes_lines_above() {
        let mut ed = editor_with("a\nb\nc\nd");
        keys(&mut ed, "jjdgg");
        assert_eq!(contents(&ed), vec!["c", "d"]);
        assert_eq!(ed.i_line(), 0);
        assert_eq!(ed.pending_motion(), None);
    }

    #[test]
    fn test_d_big_g_deletes_to_end() {
        let mut ed = editor_with("a\nb\nc\nd");
        keys(&mut ed, "jdG");
        assert_eq!(contents(&ed), vec!["a"]);
        assert_eq!(ed.i_line(), 0);

        let mut ed = editor_with("a\nb");
        keys(&mut ed, "dG");
        assert_eq!(contents(&ed), vec!["hello"]);
    }

    #[test]
    fn test_dj_and_dk() {
        let mut ed = editor_with("a\nb\nc\nd\ne");
        keys(&mut ed, "jdj");
        assert_eq!(contents(&ed), vec!["a", "d", "e"]);
        assert_eq!(ed.i_line(), 1);
        keys(&mut ed, "dk");
        assert_eq!(contents(&ed), vec!["e"]);
        assert_eq!(ed.i_line(), 0);
    }

    #[test]
    fn test_w_moves_to_next_line() {
        let mut ed = editor_with("ab\n  cd");
        keys(&mut ed, "w");
        assert_eq!((ed.i_line(), ed.i_cursor()), (1, 2));
    }

    #[test]
    fn test_b_moves_to_previous_line() {
        let mut ed = editor_with("ab cd\nx");
        keys(&mut ed, "jb");
        assert_eq!((ed.i_line(), ed.i_cursor()), (0, 3));
        keys(&mut ed, "b");
        assert_eq!((ed.i_line(), ed.i_cursor()), (0, 0));
    }

    #[test]
    fn test_horizontal_motions_clamp_in_normal_mode() {
        let mut ed = editor_with("abc");
        keys(&mut ed, "llll");
        assert_eq!(ed.i_cursor(), 2);
        keys(&mut ed, "0");
        assert_eq!(ed.i_cursor(), 0);
        keys(&mut ed, "$");
        assert_eq!(ed.i_cursor(), 2);
        ed.handle_key(backspace());
        assert_eq!(ed.i_cursor(), 1);
    }

    #[test]
    fn test_vertical_motion_clamps_cursor() {
        let mut ed = editor_with("abcdef\nab");
        keys(&mut ed, "$j");
        assert_eq!((ed.i_line(), ed.i_cursor()), (1, 1));
        keys(&mut ed, "jjj");
        assert_eq!(ed.i_line(), 1);
        keys(&mut ed, "kkk");
        assert_eq!(ed.i_line(), 0);
    }

    #[test]
    fn test_page_keys_and_margin_scroll() {
        let mut ed = editor_with(&numbered(40));
        ed.handle_key(ctrl('d'));
        assert_eq!(ed.i_line(), 13);
        assert_eq!(ed.camera_y(), 0);
        ed.handle_key(ctrl('d'));
        assert_eq!(ed.i_line(), 26);
        assert_eq!(ed.camera_y(), 6);
        ed.handle_key(ctrl('u'));
        assert_eq!(ed.i_line(), 13);
        assert_eq!(ed.camera_y(), 6);
        ed.handle_key(ctrl('u'));
        assert_eq!(ed.i_line(), 0);
        assert_eq!(ed.camera_y(), 0);
    }

    #[test]
    fn test_unknown_keys_fall_through() {
        let mut ed = editor_with("abc");
        assert_eq!(ed.handle_key(key('#')), EditorAction::Unhandled);
        assert_eq!(ed.handle_key(ctrl('z')), EditorAction::Unhandled);
        assert_eq!(
            ed.handle_key(KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE)),
            EditorAction::Unhandled
        );
    }

    #[test]
    fn test_open_line_above_and_below() {
        let mut ed = editor_with("a");
        assert_eq!(ed.handle_key(key('o')), EditorAction::ModeChanged(Mode::Edit));
        assert_eq!(contents(&ed), vec!["a", ""]);
        assert_eq!(ed.i_line(), 1);
        ed.handle_key(esc());
        keys(&mut ed, "O");
        assert_eq!(contents(&ed), vec!["a", "", ""]);
        assert_eq!(ed.i_line(), 1);
    }

    #[test]
    fn test_append_keys() {
        let mut ed = editor_with("ab");
        keys(&mut ed, "a");
        assert_eq!(ed.i_cursor(), 1);
        ed.handle_key(esc());
        keys(&mut ed, "A");
        assert_eq!(ed.i_cursor(), 2);
        assert_eq!(ed.mode(), Mode::Edit);
    }

    // ── Edit mode ────────────────────────────────────────────────────

    #[test]
    fn test_edit_mode_inserts_literals_only() {
        let mut ed = editor_with("ab");
        assert_eq!(ed.handle_key(key('i')), EditorAction::ModeChanged(Mode::Edit));
        assert_eq!(ed.handle_key(key('-')), EditorAction::Unhandled);
        keys(&mut ed, ". =!_");
        assert_eq!(contents(&ed), vec![". =!_ab"]);
        assert_eq!(ed.handle_key(ctrl('o')), EditorAction::Handled);
        assert_eq!(ed.handle_key(esc()), EditorAction::ModeChanged(Mode::Normal));
        assert_eq!(ed.i_cursor(), 5);
    }

    #[test]
    fn test_enter_splits_and_backspace_joins() {
        let mut ed = editor_with("hello");
        keys(&mut ed, "llli");
        ed.handle_key(enter());
        assert_eq!(contents(&ed), vec!["hel", "lo"]);
        assert_eq!((ed.i_line(), ed.i_cursor()), (1, 0));
        ed.handle_key(backspace());
        assert_eq!(contents(&ed), vec!["hello"]);
        assert_eq!((ed.i_line(), ed.i_cursor()), (0, 3));
        ed.handle_key(ctrl('h'));
        assert_eq!(contents(&ed), vec!["helo"]);
        ed.handle_key(ctrl('j'));
        assert_eq!(contents(&ed), vec!["he", "lo"]);
    }

    #[test]
    fn test_backspace_at_buffer_start_is_noop() {
        let mut ed = editor_with("ab");
        keys(&mut ed, "i");
        ed.handle_key(backspace());
        assert_eq!(contents(&ed), vec!["ab"]);
    }

    #[test]
    fn test_region_ripples_through_following_lines() {
        let mut ed = editor_with("x\n  a\n  b\n\nc");
        keys(&mut ed, "ifact ");
        let regions: Vec<bool> = ed
            .lines()
            .iter()
            .map(|l| ed.exit_state(l.id).unwrap().in_fact())
            .collect();
        assert_eq!(regions, vec![true, true, true, false, false]);
    }

    #[test]
    fn test_clipboard_paste() {
        let mut ed = editor_on(Box::new(SharedStore::default()), "x\ny");
        keys(&mut ed, "a");
        ed.handle_key(ctrl('v'));
        let mut pasted = false;
        for _ in 0..500 {
            if ed.poll_clipboard() {
                pasted = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(pasted);
        assert_eq!(contents(&ed), vec!["hx", "yello"]);
        assert_eq!((ed.i_line(), ed.i_cursor()), (1, 1));
        assert_eq!(ed.lex.len(), 2);
    }

    #[test]
    fn test_paste_requested_before_reload_is_dropped() {
        let mut ed = editor_on(Box::new(SharedStore::default()), "zzz");
        keys(&mut ed, "i");
        ed.handle_key(ctrl('v'));
        ed.load().unwrap();
        for _ in 0..20 {
            assert!(!ed.poll_clipboard());
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(contents(&ed), vec!["hello"]);
    }

    // ── Command mode ─────────────────────────────────────────────────

    #[test]
    fn test_command_mode_forwards_to_host() {
        let mut ed = editor_with("abc");
        assert_eq!(ed.handle_key(key(':')), EditorAction::ModeChanged(Mode::Command));
        keys(&mut ed, "q");
        assert_eq!(ed.command(), "q");
        assert_eq!(ed.handle_key(enter()), EditorAction::ModeChanged(Mode::Normal));
        assert_eq!(ed.host().commands, vec!["q"]);
        assert_eq!(ed.command(), "");

        keys(&mut ed, ":xy");
        ed.handle_key(backspace());
        assert_eq!(ed.command(), "x");
        assert_eq!(ed.handle_key(key('-')), EditorAction::Unhandled);
        assert_eq!(ed.handle_key(esc()), EditorAction::ModeChanged(Mode::Normal));
        assert_eq!(ed.command(), "");
        assert_eq!(ed.host().commands, vec!["q"]);
    }

    #[test]
    fn test_save_round_trip() {
        let store = SharedStore::default();
        let mut ed = editor_on(Box::new(store.clone()), "");
        keys(&mut ed, "A x");
        ed.handle_key(esc());
        assert!(ed.has_unsaved_changes());
        keys(&mut ed, ":w");
        assert_eq!(ed.handle_key(enter()), EditorAction::ModeChanged(Mode::Normal));
        assert!(!ed.has_unsaved_changes());
        assert_eq!(ed.host().saved.last().map(String::as_str), Some("hello x"));
        assert_eq!(ed.host().columns.last().map(String::as_str), Some(""));

        let reopened = editor_on(Box::new(store), "");
        assert_eq!(reopened.full_text(), "hello x");
        assert_eq!(
            (reopened.i_line(), reopened.i_cursor(), reopened.camera_y()),
            (ed.i_line(), ed.i_cursor(), ed.camera_y())
        );
    }

    #[test]
    fn test_save_failure_keeps_unsaved_flag() {
        let mut ed = editor_on(Box::new(FailingStore), "");
        keys(&mut ed, "x:w");
        match ed.handle_key(enter()) {
            EditorAction::SaveFailed(msg) => assert!(msg.contains("disk full"), "{msg}"),
            other => panic!("expected SaveFailed, got {other:?}"),
        }
        assert!(ed.has_unsaved_changes());
        assert_eq!(ed.host().saved, vec!["hello"]);
        assert_eq!(ed.mode(), Mode::Normal);
    }

    // ── Notifications ────────────────────────────────────────────────

    #[test]
    fn test_column_under_cursor_on_line_change() {
        let mut ed = editor_with("fact alpha\n  beta\n\nidea gamma");
        keys(&mut ed, "l");
        assert!(ed.host().columns.is_empty());
        keys(&mut ed, "j");
        assert_eq!(ed.host().columns, vec!["alpha"]);
        keys(&mut ed, "G");
        assert_eq!(ed.host().columns.last().map(String::as_str), Some("gamma"));
        assert_eq!(ed.column_under_cursor(), "gamma");
    }

    #[test]
    fn test_cursor_change_only_on_line_change() {
        let mut ed = editor_with("abc\ndef");
        keys(&mut ed, "ll");
        assert_eq!(ed.host().cursor_changes, 0);
        keys(&mut ed, "j");
        assert_eq!(ed.host().cursor_changes, 1);
    }

    #[test]
    fn test_scroll_camera_y_clamps() {
        let mut ed = editor_with(&numbered(10));
        assert!(ed.scroll_camera_y(4));
        assert!(!ed.scroll_camera_y(4));
        assert!(ed.scroll_camera_y(99));
        assert_eq!(ed.camera_y(), 10);
        keys(&mut ed, "dG");
        // clamped to the single placeholder line, then pulled back by the margin
        assert_eq!(contents(&ed), vec!["hello"]);
        assert_eq!(ed.camera_y(), 0);
    }

    // ── Properties ───────────────────────────────────────────────────

    fn any_key() -> impl Strategy<Value = KeyEvent> {
        let mut pool: Vec<KeyEvent> = "hjklwb0$_xDCJpPydcrgGioaAO:fq. 1"
            .chars()
            .map(key)
            .collect();
        pool.extend([esc(), enter(), backspace(), ctrl('d'), ctrl('u'), ctrl('h'), ctrl('j')]);
        prop::sample::select(pool)
    }

    fn check_invariants(ed: &Editor<RecordingHost>) -> std::result::Result<(), TestCaseError> {
        let lines = ed.lines();
        prop_assert!(!lines.is_empty());
        prop_assert!(ed.i_line() < lines.len());
        let current = &lines[ed.i_line()].content;
        prop_assert!(ed.i_cursor() <= current.len());
        prop_assert!(current.is_char_boundary(ed.i_cursor()));
        if ed.mode() == Mode::Normal && !current.is_empty() {
            prop_assert!(ed.i_cursor() < current.len());
        }
        prop_assert!(ed.camera_y() <= lines.len());

        let mut full = LexTable::new();
        full.reload(lines);
        prop_assert_eq!(ed.lex.len(), lines.len());
        for line in lines {
            let incremental = ed.lex.get(line.id).map(|e| (e.exit.region, &e.meta));
            let reference = full.get(line.id).map(|e| (e.exit.region, &e.meta));
            prop_assert_eq!(incremental, reference);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn key_sequences_keep_editor_consistent(
            seq in prop::collection::vec(any_key(), 0..60),
        ) {
            let mut ed = editor_with("fact alpha\n  a\n\nidea beta\nx y");
            for k in seq {
                ed.handle_key(k);
                check_invariants(&ed)?;
            }
        }
    }
}
