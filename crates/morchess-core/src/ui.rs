use crate::keybinds::Mode;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

/// Render the bottom status bar: mode badge, program name, cursor column and
/// an optional message from the host.
pub fn render_status_bar(
    frame: &mut Frame,
    area: Rect,
    mode: Mode,
    title: &str,
    column: &str,
    info: &str,
) {
    let mode_style = match mode {
        Mode::Normal => Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED),
        Mode::Edit => Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD | Modifier::REVERSED),
        Mode::Command => Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::REVERSED),
    };

    let mut spans = vec![
        Span::styled(format!(" {} ", mode.label()), mode_style),
        Span::raw(" "),
        Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
    ];
    if !column.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("[{column}]"),
            Style::default().fg(Color::Cyan),
        ));
    }
    spans.push(Span::raw("  "));
    spans.push(Span::styled(info, Style::default().add_modifier(Modifier::DIM)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the command-line input at the bottom of the screen.
pub fn render_command_line(frame: &mut Frame, area: Rect, input: &str) {
    let line = Line::from(vec![
        Span::styled(":", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(input),
    ]);

    frame.render_widget(Paragraph::new(line), area);

    let cursor = u16::try_from(input.len()).unwrap_or(u16::MAX);
    frame.set_cursor_position((area.x.saturating_add(1).saturating_add(cursor), area.y));
}

/// Editor layout: main content + status bar (1 line) + command line (1 line).
/// Returns (content_area, status_area, command_area).
pub fn standard_layout(area: Rect) -> (Rect, Rect, Rect) {
    let [content_area, status_area, command_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    (content_area, status_area, command_area)
}

/// Bordered block around the program view.
pub fn editor_block(title: &str) -> Block<'_> {
    Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().add_modifier(Modifier::DIM))
}
