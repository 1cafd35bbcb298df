use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line as TextLine, Span},
    widgets::Paragraph,
};
use unicode_width::UnicodeWidthStr;

use super::host::EditorHost;
use super::lexer::{LineMetadata, TokenKind};
use super::Editor;

fn token_style(kind: TokenKind, base: Style) -> Style {
    match kind {
        TokenKind::BeginFact => base.fg(Color::Green).add_modifier(Modifier::BOLD),
        TokenKind::BeginIdea => base.fg(Color::Yellow).add_modifier(Modifier::BOLD),
        TokenKind::BeginLegal => base.fg(Color::Magenta).add_modifier(Modifier::BOLD),
        TokenKind::Path => base.fg(Color::Cyan),
        TokenKind::Whitespace | TokenKind::Newline => base,
    }
}

/// Split a line into styled spans following its tokens. Text the tokenizer
/// did not reach keeps the base style.
pub fn styled_line(text: &str, meta: Option<&LineMetadata>, base: Style) -> TextLine<'static> {
    let mut spans = Vec::new();
    let mut pos = 0;
    for token in meta.map(|m| m.tokens.as_slice()).unwrap_or_default() {
        if token.begin_char == token.end_char || token.end_char > text.len() {
            continue;
        }
        if token.begin_char > pos {
            spans.push(Span::styled(text[pos..token.begin_char].to_string(), base));
        }
        spans.push(Span::styled(
            text[token.begin_char..token.end_char].to_string(),
            token_style(token.kind, base),
        ));
        pos = token.end_char;
    }
    if pos < text.len() {
        spans.push(Span::styled(text[pos..].to_string(), base));
    }
    TextLine::from(spans)
}

impl<H: EditorHost> Editor<H> {
    /// Draw the lines from `camera_y` down, with a line-number gutter.
    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let lines = self.lines();
        let gutter_width = u16::try_from(lines.len().to_string().len() + 2).unwrap_or(u16::MAX);
        let text_area = Rect {
            x: area.x + gutter_width.min(area.width),
            width: area.width.saturating_sub(gutter_width),
            ..area
        };
        let gutter_area = Rect {
            width: gutter_width.min(area.width),
            ..area
        };

        let visible = area.height as usize;
        let top = self.camera_y();
        let mut gutter_lines: Vec<TextLine> = Vec::new();
        let mut text_lines: Vec<TextLine> = Vec::new();

        for (i, line) in lines.iter().enumerate().skip(top).take(visible) {
            let is_current = i == self.i_line();
            let gutter_style = if is_current && focused {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            gutter_lines.push(TextLine::from(Span::styled(
                format!("{:>width$} ", i + 1, width = gutter_width as usize - 2),
                gutter_style,
            )));

            let base = if is_current && focused {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::Gray)
            };
            text_lines.push(styled_line(&line.content, self.metadata(line.id), base));
        }

        // Fill remaining lines with ~ (like vim)
        for _ in lines.len().saturating_sub(top)..visible {
            gutter_lines.push(TextLine::from(Span::styled(
                format!("{:>width$} ", "~", width = gutter_width as usize - 2),
                Style::default().fg(Color::DarkGray),
            )));
            text_lines.push(TextLine::from(""));
        }

        frame.render_widget(Paragraph::new(gutter_lines), gutter_area);
        frame.render_widget(Paragraph::new(text_lines), text_area);

        if focused && self.i_line() >= top {
            let row = self.i_line() - top;
            let current = &lines[self.i_line()].content;
            let col = current[..self.i_cursor().min(current.len())].width();
            let cursor_x = text_area.x as usize + col;
            let cursor_y = text_area.y as usize + row;
            if cursor_x < (text_area.x + text_area.width) as usize
                && cursor_y < (text_area.y + text_area.height) as usize
            {
                frame.set_cursor_position((cursor_x as u16, cursor_y as u16));
            }
        }
    }
}
