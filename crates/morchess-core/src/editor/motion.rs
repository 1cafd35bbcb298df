//! Operators, word motions and the line-level edits they compose into.

use super::buffer::snap_to_char_boundary;
use super::host::EditorHost;
use super::Editor;
use crate::keybinds::Mode;

/// A pending normal-mode operator waiting for its motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Delete,
    Yank,
    Change,
    Replace,
}

impl Operator {
    /// The operator a normal-mode key starts, if any.
    pub fn from_key(c: char) -> Option<Self> {
        match c {
            'd' | 'D' => Some(Self::Delete),
            'y' | 'Y' => Some(Self::Yank),
            'c' | 'C' => Some(Self::Change),
            'r' | 'R' => Some(Self::Replace),
            _ => None,
        }
    }

    /// Whether the operator consumes a motion range (`r` takes a char instead).
    pub fn takes_range(self) -> bool {
        !matches!(self, Self::Replace)
    }
}

// ── Word boundary helpers ────────────────────────────────────────────

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

/// Start of the next word at or after `from`. With `skip_current`, the word
/// the cursor is in is skipped first. Returns `line.len()` if there is none.
pub fn next_word_start(line: &str, from: usize, skip_current: bool) -> usize {
    let bytes = line.as_bytes();
    let mut cursor = from.min(bytes.len());
    let mut skipping = skip_current;
    while cursor < bytes.len() {
        let word = is_word_byte(bytes[cursor]);
        if skipping && word {
            cursor += 1;
            continue;
        }
        skipping = false;
        if word {
            break;
        }
        cursor += 1;
    }
    cursor
}

/// Start of the word before `from`. With `skip_current`, separators right
/// before the cursor are skipped first. Returns 0 if there is none.
pub fn prev_word_start(line: &str, from: usize, skip_current: bool) -> usize {
    let bytes = line.as_bytes();
    let mut cursor = from.min(bytes.len());
    let mut skipping = skip_current;
    while cursor > 0 {
        let word = is_word_byte(bytes[cursor - 1]);
        if skipping && !word {
            cursor -= 1;
            continue;
        }
        skipping = false;
        if !word {
            break;
        }
        cursor -= 1;
    }
    snap_to_char_boundary(line, cursor)
}

/// Offset of the first word character on the line, or 0.
pub fn first_word_start(line: &str) -> usize {
    line.bytes().position(is_word_byte).unwrap_or(0)
}

// ── Operator execution ───────────────────────────────────────────────

impl<H: EditorHost> Editor<H> {
    /// Apply `op` to `[a, b)` (either order) on the cursor line.
    pub(super) fn apply_operator(&mut self, op: Operator, a: usize, b: usize) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let line = self.buffer.i_line;
        match op {
            Operator::Delete | Operator::Change => {
                let (_, change) = self.buffer.delete_range(line, lo, hi);
                self.apply(change);
                self.buffer.i_cursor = lo;
                if op == Operator::Change {
                    self.mode = Mode::Edit;
                }
            }
            Operator::Yank => {
                let content = self.buffer.current_line();
                let lo = snap_to_char_boundary(content, lo);
                let hi = snap_to_char_boundary(content, hi);
                self.yank = Some(content[lo..hi].to_string());
                self.buffer.i_cursor = lo;
            }
            Operator::Replace => {}
        }
    }

    fn range_operator(&self) -> Option<Operator> {
        self.motion.filter(|op| op.takes_range())
    }

    /// `w`: next word start; past the last word, the next line's first word.
    pub(super) fn word_forward(&mut self) {
        let a = self.buffer.i_cursor;
        let b = next_word_start(self.buffer.current_line(), a, true);
        let at_end = b == self.buffer.current_line().len();

        if let Some(op) = self.range_operator() {
            self.apply_operator(op, a, b);
            return;
        }
        if at_end && self.buffer.i_line + 1 < self.buffer.line_count() {
            self.buffer.i_line += 1;
            self.buffer.i_cursor = next_word_start(self.buffer.current_line(), 0, false);
        } else {
            self.buffer.i_cursor = b;
        }
    }

    /// `b`: previous word start; from column 0, the previous line's last word.
    pub(super) fn word_backward(&mut self) {
        let a = self.buffer.i_cursor;
        let op = self.range_operator();
        if a == 0 && op.is_none() {
            if self.buffer.i_line > 0 {
                self.buffer.i_line -= 1;
                let line = self.buffer.current_line();
                self.buffer.i_cursor = prev_word_start(line, line.len(), true);
            }
            return;
        }

        let b = prev_word_start(self.buffer.current_line(), a, true);
        self.buffer.i_cursor = b;
        if let Some(op) = op {
            self.apply_operator(op, b, a);
        }
    }

    /// `_`: first word of the line.
    pub(super) fn first_word(&mut self) {
        let a = self.buffer.i_cursor;
        let b = first_word_start(self.buffer.current_line());
        self.buffer.i_cursor = b;
        if let Some(op) = self.range_operator() {
            self.apply_operator(op, b, a);
        }
    }

    /// `$`: end of line. With an operator, the range runs to the end.
    pub(super) fn line_end(&mut self) {
        let a = self.buffer.i_cursor;
        let len = self.buffer.current_line().len();
        if let Some(op) = self.range_operator() {
            self.apply_operator(op, a, len);
        } else {
            self.buffer.i_cursor = len;
        }
    }

    // ── Line operators ───────────────────────────────────────────────

    /// `dd`. The only line is reset to the placeholder instead of removed.
    pub(super) fn delete_current_line(&mut self) {
        let line = self.buffer.i_line;
        let change = if self.buffer.line_count() == 1 {
            let placeholder = self.buffer.placeholder().to_string();
            self.buffer.set_line(line, placeholder)
        } else {
            self.buffer.splice_lines(line, 1, Vec::new())
        };
        self.apply(change);
        self.buffer.i_cursor = 0;
    }

    /// `cc`: empty the line and start typing on it.
    pub(super) fn change_current_line(&mut self) {
        let line = self.buffer.i_line;
        let change = self.buffer.splice_lines(line, 1, vec![String::new()]);
        self.apply(change);
        self.buffer.i_line = line;
        self.buffer.i_cursor = 0;
        self.mode = Mode::Edit;
    }

    /// `yy`.
    pub(super) fn yank_current_line(&mut self) {
        self.yank = Some(self.buffer.current_line().to_string());
    }

    /// `dj`: current and next line.
    pub(super) fn delete_lines_down(&mut self) {
        let line = self.buffer.i_line;
        let change = self.buffer.splice_lines(line, 2, Vec::new());
        self.apply(change);
        self.buffer.i_cursor = 0;
    }

    /// `dk`: previous and current line.
    pub(super) fn delete_lines_up(&mut self) {
        let line = self.buffer.i_line;
        let start = line.saturating_sub(1);
        let change = self.buffer.splice_lines(start, line - start + 1, Vec::new());
        self.apply(change);
        self.buffer.i_line = start;
        self.buffer.i_cursor = 0;
    }

    /// `dG`: cursor line through the end of the buffer.
    pub(super) fn delete_to_end_of_buffer(&mut self) {
        let line = self.buffer.i_line;
        let count = self.buffer.line_count() - line;
        let change = self.buffer.splice_lines(line, count, Vec::new());
        self.apply(change);
        self.buffer.i_cursor = 0;
    }

    /// `dgg`: every line above the cursor line.
    pub(super) fn delete_to_start_of_buffer(&mut self) {
        let line = self.buffer.i_line;
        if line > 0 {
            let change = self.buffer.splice_lines(0, line, Vec::new());
            self.apply(change);
        }
        self.buffer.i_line = 0;
        self.buffer.i_cursor = 0;
    }

    /// `D` / `C`: cursor to end of line.
    pub(super) fn delete_rest_of_line(&mut self) {
        let line = self.buffer.i_line;
        let len = self.buffer.current_line().len();
        let (_, change) = self.buffer.delete_range(line, self.buffer.i_cursor, len);
        self.apply(change);
    }

    /// `r<c>`.
    pub(super) fn replace_under_cursor(&mut self, c: char) {
        let change = self
            .buffer
            .replace_char(self.buffer.i_line, self.buffer.i_cursor, c);
        self.apply(change);
    }
}
