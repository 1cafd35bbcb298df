/// Stable identity of a line. Minted by the buffer, never reused while the
/// buffer lives, and unchanged by edits to the line's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub id: LineId,
    pub content: String,
}

/// What an edit did to the line structure.
///
/// `relex_from` is the first line index whose tokens may be stale and
/// `removed` lists the ids that no longer exist. The editor feeds both into
/// the lex table inside the same transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct Change {
    pub relex_from: Option<usize>,
    pub removed: Vec<LineId>,
}

impl Change {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn relex(index: usize) -> Self {
        Self {
            relex_from: Some(index),
            removed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.relex_from.is_none() && self.removed.is_empty()
    }

    /// Combine two changes: the earliest re-lex index wins, removals add up.
    pub fn merge(mut self, other: Change) -> Self {
        self.relex_from = match (self.relex_from, other.relex_from) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.removed.extend(other.removed);
        self
    }
}

/// An ordered list of identified lines with a (line, byte offset) cursor.
///
/// The buffer is never empty: removing every line leaves a single
/// placeholder line behind. Offsets are bytes and always sit on a char
/// boundary.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    lines: Vec<Line>,
    pub i_line: usize,
    pub i_cursor: usize,
    /// Whether the buffer has been modified since last save.
    pub dirty: bool,
    next_id: u64,
    placeholder: String,
}

impl TextBuffer {
    pub fn new(placeholder: &str) -> Self {
        let mut buffer = Self {
            lines: Vec::new(),
            i_line: 0,
            i_cursor: 0,
            dirty: false,
            next_id: 0,
            placeholder: placeholder.to_string(),
        };
        let line = buffer.mint(placeholder.to_string());
        buffer.lines.push(line);
        buffer
    }

    /// Create a buffer from a string, one line per `\n`-delimited segment.
    pub fn from_text(text: &str, placeholder: &str) -> Self {
        let mut buffer = Self::new(placeholder);
        let _ = buffer.set_text(text);
        buffer.dirty = false;
        buffer
    }

    fn mint(&mut self, content: String) -> Line {
        self.next_id += 1;
        Line {
            id: LineId(self.next_id),
            content,
        }
    }

    /// Replace every line. Returns the ids of the lines that were dropped.
    /// The cursor is reset to the origin.
    pub fn set_text(&mut self, text: &str) -> Vec<LineId> {
        let fresh: Vec<Line> = text.split('\n').map(|s| self.mint(s.to_string())).collect();
        let removed = std::mem::replace(&mut self.lines, fresh)
            .into_iter()
            .map(|line| line.id)
            .collect();
        self.i_line = 0;
        self.i_cursor = 0;
        removed
    }

    /// Get the full text as a single string with newlines.
    pub fn text(&self) -> String {
        let contents: Vec<&str> = self.lines.iter().map(|l| l.content.as_str()).collect();
        contents.join("\n")
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Number of lines in the buffer.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Get the current line.
    pub fn current_line(&self) -> &str {
        &self.lines[self.i_line].content
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    // ── Cursor ───────────────────────────────────────────────────────

    /// Pull the cursor back inside the buffer.
    /// In Normal mode the cursor can't go past the last character,
    /// in Edit mode it can sit one past (to append).
    /// Refills an emptied buffer with the placeholder line.
    pub fn clamp_cursor(&mut self, allow_past_end: bool) -> Change {
        let mut change = Change::none();
        if self.lines.is_empty() {
            let line = self.mint(self.placeholder.clone());
            self.lines.push(line);
            self.i_line = 0;
            self.i_cursor = 0;
            change = Change::relex(0);
        }

        self.i_line = self.i_line.min(self.lines.len() - 1);
        let line = &self.lines[self.i_line].content;
        let max = if allow_past_end || line.is_empty() {
            line.len()
        } else {
            last_char_start(line)
        };
        self.i_cursor = snap_to_char_boundary(line, self.i_cursor.min(max));
        change
    }

    /// Move cursor left by one character.
    pub fn cursor_left(&mut self) {
        if self.i_cursor > 0 {
            let line = self.current_line();
            self.i_cursor = prev_char_start(line, self.i_cursor);
        }
    }

    /// Move cursor right by one character (may land one past the end).
    pub fn cursor_right(&mut self) {
        let line = self.current_line();
        self.i_cursor = next_char_start(line, self.i_cursor);
    }

    // ── Text edits ───────────────────────────────────────────────────

    fn line_index(&self, line: usize) -> usize {
        line.min(self.lines.len() - 1)
    }

    /// Insert a character at byte offset `at` of line `line`.
    pub fn insert_char(&mut self, line: usize, at: usize, ch: char) -> Change {
        let line = self.line_index(line);
        let content = &mut self.lines[line].content;
        let at = snap_to_char_boundary(content, at);
        content.insert(at, ch);
        Change::relex(line)
    }

    /// Replace the character starting at `at`. No-op past the end of the line.
    pub fn replace_char(&mut self, line: usize, at: usize, ch: char) -> Change {
        let line = self.line_index(line);
        let content = &mut self.lines[line].content;
        let at = snap_to_char_boundary(content, at);
        if at >= content.len() {
            return Change::none();
        }
        let end = next_char_start(content, at);
        content.replace_range(at..end, ch.encode_utf8(&mut [0; 4]));
        Change::relex(line)
    }

    /// Remove `[a, b)` from line `line` (offsets are ordered and clamped).
    /// Returns the removed text.
    pub fn delete_range(&mut self, line: usize, a: usize, b: usize) -> (String, Change) {
        let line = self.line_index(line);
        let content = &mut self.lines[line].content;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let lo = snap_to_char_boundary(content, lo);
        let hi = snap_to_char_boundary(content, hi);
        if lo == hi {
            return (String::new(), Change::none());
        }
        let removed: String = content.drain(lo..hi).collect();
        (removed, Change::relex(line))
    }

    /// Replace the whole content of a line, keeping its id.
    pub fn set_line(&mut self, line: usize, content: String) -> Change {
        let line = self.line_index(line);
        self.lines[line].content = content;
        Change::relex(line)
    }

    /// Break line `line` at `at`; the tail becomes a new line below.
    pub fn split_line(&mut self, line: usize, at: usize) -> Change {
        let line = self.line_index(line);
        let content = &mut self.lines[line].content;
        let at = snap_to_char_boundary(content, at);
        let tail = content.split_off(at);
        let fresh = self.mint(tail);
        self.lines.insert(line + 1, fresh);
        Change::relex(line)
    }

    /// Append line `line + 1` onto line `line` and drop it.
    /// No-op on the last line.
    pub fn join_line(&mut self, line: usize) -> Change {
        if line + 1 >= self.lines.len() {
            return Change::none();
        }
        let next = self.lines.remove(line + 1);
        self.lines[line].content.push_str(&next.content);
        Change {
            relex_from: Some(line),
            removed: vec![next.id],
        }
    }

    /// Remove `delete_count` lines at `at` and insert new lines there.
    /// Refills the placeholder when everything is gone.
    pub fn splice_lines(&mut self, at: usize, delete_count: usize, inserted: Vec<String>) -> Change {
        let at = at.min(self.lines.len());
        let end = at.saturating_add(delete_count).min(self.lines.len());
        let fresh: Vec<Line> = inserted.into_iter().map(|c| self.mint(c)).collect();
        let removed: Vec<LineId> = self.lines.splice(at..end, fresh).map(|l| l.id).collect();
        let change = Change {
            relex_from: Some(at),
            removed,
        };
        change.merge(self.clamp_cursor(true))
    }

    /// Insert possibly multi-line text at (`line`, `at`). The text after the
    /// insertion point ends up behind the last inserted segment.
    /// Returns the change and the position right after the inserted text.
    pub fn insert_text(&mut self, line: usize, at: usize, text: &str) -> (Change, usize, usize) {
        let line = self.line_index(line);
        let content = &mut self.lines[line].content;
        let at = snap_to_char_boundary(content, at);
        let segments: Vec<&str> = text.split('\n').collect();
        if let [only] = segments.as_slice() {
            content.insert_str(at, only);
            return (Change::relex(line), line, at + only.len());
        }

        let tail = content.split_off(at);
        content.push_str(segments[0]);
        let mut below: Vec<String> = segments[1..].iter().map(|s| s.to_string()).collect();
        let end_col = below.last().map(String::len).unwrap_or(0);
        if let Some(last) = below.last_mut() {
            last.push_str(&tail);
        }
        let end_line = line + below.len();
        let change = Change::relex(line).merge(self.splice_lines(line + 1, 0, below));
        (change, end_line, end_col)
    }
}

// ── Char boundary helpers ────────────────────────────────────────────

/// Snap a byte offset to a valid char boundary (at or before target).
pub fn snap_to_char_boundary(s: &str, target: usize) -> usize {
    if target >= s.len() {
        return s.len();
    }
    s.char_indices()
        .take_while(|(i, _)| *i <= target)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn last_char_start(s: &str) -> usize {
    s.char_indices().next_back().map(|(i, _)| i).unwrap_or(0)
}

pub fn prev_char_start(s: &str, at: usize) -> usize {
    let at = snap_to_char_boundary(s, at);
    s[..at].char_indices().next_back().map(|(i, _)| i).unwrap_or(0)
}

pub fn next_char_start(s: &str, at: usize) -> usize {
    let at = snap_to_char_boundary(s, at);
    s[at..]
        .char_indices()
        .nth(1)
        .map(|(i, _)| at + i)
        .unwrap_or(s.len())
}
