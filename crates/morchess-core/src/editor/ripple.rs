use std::collections::HashMap;

use tracing::debug;

use super::buffer::{Line, LineId};
use super::lexer::{scan_line, LexState, LineMetadata, TokenKind};

/// Lex result for one line: the state it ends in and its tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineLex {
    pub exit: LexState,
    pub meta: LineMetadata,
}

/// Per-line lex results keyed by line id.
///
/// Holds exactly one entry per live line once the editor has synced it with
/// the buffer (`reload` after wholesale replacement, `forget` + `ripple`
/// after every edit).
#[derive(Debug, Clone, Default)]
pub struct LexTable {
    entries: HashMap<LineId, LineLex>,
}

impl LexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything and lex `lines` top to bottom.
    pub fn reload(&mut self, lines: &[Line]) {
        self.entries.clear();
        let mut state = LexState::default();
        for line in lines {
            let (exit, meta) = scan_line(&line.content, state);
            self.entries.insert(line.id, LineLex { exit, meta });
            state = exit;
        }
    }

    /// Re-lex from `index` downward, stopping after the first line past
    /// `index` whose exit state came out unchanged. A line without a previous
    /// entry never stops the scan. Returns how many lines were scanned.
    pub fn ripple(&mut self, lines: &[Line], index: usize) -> usize {
        let mut incoming = index
            .checked_sub(1)
            .and_then(|prev| lines.get(prev))
            .and_then(|line| self.exit_state(line.id))
            .unwrap_or_default();

        let mut scanned = 0;
        for (i, line) in lines.iter().enumerate().skip(index) {
            let previous = self.entries.get(&line.id).map(|entry| entry.exit);
            let (exit, meta) = scan_line(&line.content, incoming);
            self.entries.insert(line.id, LineLex { exit, meta });
            scanned += 1;
            if i > index && previous == Some(exit) {
                break;
            }
            incoming = exit;
        }

        debug!(from = index, scanned, "ripple re-lex");
        scanned
    }

    /// Remove the entries of lines that left the buffer.
    pub fn forget(&mut self, ids: &[LineId]) {
        for id in ids {
            self.entries.remove(id);
        }
    }

    pub fn get(&self, id: LineId) -> Option<&LineLex> {
        self.entries.get(&id)
    }

    pub fn exit_state(&self, id: LineId) -> Option<LexState> {
        self.entries.get(&id).map(|entry| entry.exit)
    }

    pub fn metadata(&self, id: LineId) -> Option<&LineMetadata> {
        self.entries.get(&id).map(|entry| &entry.meta)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name of the block the cursor sits in: walking up from `i_line`, the
    /// first path that follows a region keyword on the same line.
    pub fn column_under_cursor(&self, lines: &[Line], i_line: usize) -> String {
        let top = i_line.min(lines.len().saturating_sub(1));
        for line in lines.iter().take(top + 1).rev() {
            let Some(meta) = self.metadata(line.id) else {
                continue;
            };
            let Some(begin) = meta.tokens.iter().position(|t| t.kind.is_begin()) else {
                continue;
            };
            if let Some(path) = meta.tokens[begin + 1..]
                .iter()
                .find(|t| t.kind == TokenKind::Path)
            {
                return path.value.clone();
            }
        }
        String::new()
    }
}
