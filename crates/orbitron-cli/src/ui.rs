//! UI rendering with ratatui.
//!
//! Two columns: the chat on the left and the desktop panel on the right,
//! between a header bar and a status bar.

use chrono::Local;
use orbitron_core::{FileView, ImageView, Payload, Speaker, TranscriptEntry};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap};
use ratatui::Frame;

use crate::app::App;
use crate::theme::Palette;

const TITLE: &str = "Orbitron CUA";
const GREETING: &str = "Hello! How can I assist you today?";
const INPUT_PLACEHOLDER: &str = "Try 'go_to google.com', 'new_tab', 'switch_tab 0'";
const INPUT_PROMPT: &str = "> ";

/// Horizontal padding for chat content.
const CHAT_PADDING: u16 = 1;

/// Render the UI.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let palette = app.theme.palette();

    frame.render_widget(
        Block::default().style(Style::default().bg(palette.background).fg(palette.text)),
        area,
    );

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),                          // Header bar
            Constraint::Length(u16::from(!app.connected)), // Disconnected banner
            Constraint::Min(5),                             // Chat + desktop
            Constraint::Length(1),                          // Status bar
        ])
        .split(area);

    render_header_bar(frame, app, &palette, main_layout[0]);
    if !app.connected {
        render_disconnected_banner(frame, &palette, main_layout[1]);
    }

    let content_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(main_layout[2]);

    render_chat_column(frame, app, &palette, content_layout[0]);
    render_desktop_panel(frame, app, &palette, content_layout[1]);
    render_status_bar(frame, app, &palette, main_layout[3]);
}

/// Truncate a string in the middle with ellipsis if it exceeds `max_len` characters.
fn truncate_middle(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        return s.to_string();
    }
    if max_len < 5 {
        return chars[..max_len].iter().collect();
    }
    let keep = (max_len - 3) / 2;
    let start: String = chars[..keep].iter().collect();
    let end: String = chars[chars.len() - keep..].iter().collect();
    format!("{start}...{end}")
}

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// Render the header bar with the title, backend URL and status.
fn render_header_bar(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let (status_text, status_style) = if app.connected {
        ("connected", Style::default().fg(palette.agent))
    } else {
        ("disconnected", Style::default().fg(palette.error))
    };

    let max_url_width = (area.width as usize / 2).saturating_sub(15);
    let display_url = truncate_middle(app.server_url(), max_url_width);

    let right_text = format!("{display_url} [{status_text}]");
    let padding = (area.width as usize)
        .saturating_sub(TITLE.len() + right_text.chars().count());

    let line = Line::from(vec![
        Span::styled(TITLE, Style::default().fg(palette.focus).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(padding)),
        Span::raw(display_url),
        Span::raw(" ["),
        Span::styled(status_text, status_style),
        Span::raw("]"),
    ]);

    let header = Paragraph::new(line).style(Style::default().bg(palette.bar).fg(palette.text));
    frame.render_widget(header, area);
}

fn render_disconnected_banner(frame: &mut Frame, palette: &Palette, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" ⚠ Backend is not connected. ", Style::default().fg(palette.warning).bold()),
        Span::styled("Ctrl+R", Style::default().fg(palette.warning)),
        Span::styled(" to reconnect", Style::default().fg(palette.muted)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

// =============================================================================
// Chat Column
// =============================================================================

fn entry_lines<'a>(entry: &'a TranscriptEntry, palette: &Palette) -> Vec<Line<'a>> {
    let (label_style, text_style) = match entry.speaker {
        Speaker::User => (
            Style::default().fg(palette.user).add_modifier(Modifier::BOLD),
            Style::default().fg(palette.text),
        ),
        Speaker::Agent if entry.is_error() => (
            Style::default().fg(palette.error).add_modifier(Modifier::BOLD),
            Style::default().fg(palette.error),
        ),
        Speaker::Agent => (
            Style::default().fg(palette.agent).add_modifier(Modifier::BOLD),
            Style::default().fg(palette.text),
        ),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(entry.speaker.label(), label_style),
        Span::styled(
            format!("  {}", entry.at.with_timezone(&Local).format("%H:%M")),
            Style::default().fg(palette.muted),
        ),
    ])];
    lines.extend(entry.text.lines().map(|l| Line::from(Span::styled(l, text_style))));
    lines.push(Line::from(""));
    lines
}

/// Render the chat column: transcript above, input line below.
fn render_chat_column(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let block = Block::default()
        .title(" Chat ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.focus));

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Chat messages
            Constraint::Length(1), // Separator line
            Constraint::Length(1), // Input line
        ])
        .split(inner_area);

    let chat_area_full = inner_layout[0];
    let chat_area = Rect::new(
        chat_area_full.x + CHAT_PADDING,
        chat_area_full.y,
        chat_area_full.width.saturating_sub(CHAT_PADDING * 2 + 1), // +1 for scrollbar
        chat_area_full.height,
    );

    let transcript = app.session.transcript();
    let mut lines: Vec<Line> = Vec::new();

    if transcript.is_empty() {
        lines.push(Line::from(Span::styled(
            Speaker::Agent.label(),
            Style::default().fg(palette.agent).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(GREETING, Style::default().fg(palette.muted))));
        lines.push(Line::from(""));
    }
    for entry in transcript.entries() {
        lines.extend(entry_lines(entry, palette));
    }
    if app.is_streaming() {
        lines.push(Line::from(vec![
            Span::styled(app.spinner_char(), Style::default().fg(palette.warning)),
            Span::styled(" Orbitron is working...", Style::default().fg(palette.muted)),
        ]));
    }

    render_scrolled_from_bottom(frame, Text::from(lines), app.chat_scroll, chat_area, chat_area_full);
    render_input_line(frame, app, palette, inner_layout[1], inner_layout[2]);
}

/// Render wrapped text anchored at the bottom, `scroll` lines up.
fn render_scrolled_from_bottom(frame: &mut Frame, text: Text, scroll: usize, area: Rect, scrollbar_area: Rect) {
    let visible_lines = area.height as usize;
    let total_wrapped_lines = calculate_wrapped_line_count(&text, area.width as usize);

    // Max scroll is how far we can scroll up from the bottom
    let max_scroll = total_wrapped_lines.saturating_sub(visible_lines);
    let effective_scroll = scroll.min(max_scroll);

    // Lines to skip from the top
    let scroll_offset = max_scroll.saturating_sub(effective_scroll);

    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .scroll((to_u16(scroll_offset), 0));
    frame.render_widget(paragraph, area);

    if total_wrapped_lines > visible_lines {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));

        let mut scrollbar_state = ScrollbarState::new(total_wrapped_lines)
            .position(scroll_offset)
            .viewport_content_length(visible_lines);

        frame.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);
    }
}

/// Render the input line at the bottom of the chat column.
fn render_input_line(frame: &mut Frame, app: &App, palette: &Palette, separator_area: Rect, input_area: Rect) {
    let separator = Paragraph::new("─".repeat(separator_area.width as usize))
        .style(Style::default().fg(palette.muted));
    frame.render_widget(separator, separator_area);

    // Input is disabled while a reply streams in
    let enabled = !app.is_streaming();
    let prompt_style = Style::default().fg(if enabled { palette.focus } else { palette.muted });

    let prompt_width = Span::raw(INPUT_PROMPT).width();
    let field_width = usize::from(input_area.width).saturating_sub(prompt_width);
    let (scroll, column) = input_scroll(app.input_before_cursor(), field_width);
    let visible = &app.input[scroll..];

    let input_span = if app.input.is_empty() {
        Span::styled(INPUT_PLACEHOLDER, Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC))
    } else if enabled {
        Span::styled(visible, Style::default().fg(palette.text))
    } else {
        Span::styled(visible, Style::default().fg(palette.muted))
    };

    frame.render_widget(
        Paragraph::new(Line::from(vec![Span::styled(INPUT_PROMPT, prompt_style), input_span])),
        input_area,
    );

    if enabled {
        let x = input_area.x + to_u16(prompt_width + column);
        let max_x = input_area.x + input_area.width.saturating_sub(1);
        frame.set_cursor_position((x.min(max_x), input_area.y));
    }
}

/// Horizontal scroll for a one-line input field `width` cells wide.
///
/// Returns the byte offset of the first visible character and the display
/// column of the cursor, dropping leading characters until the cursor fits.
fn input_scroll(before_cursor: &str, width: usize) -> (usize, usize) {
    let mut start = 0;
    let mut column = Span::raw(before_cursor).width();
    let mut chars = before_cursor.chars();
    while column >= width.max(1) {
        let Some(c) = chars.next() else { break };
        start += c.len_utf8();
        column = Span::raw(&before_cursor[start..]).width();
    }
    (start, column)
}

// =============================================================================
// Desktop Panel
// =============================================================================

fn panel_block<'a>(title: impl Into<Line<'a>>, palette: &Palette) -> Block<'a> {
    let title: Line<'a> = title.into();
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
}

/// Render the desktop panel for whatever the active mode has loaded.
fn render_desktop_panel(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    match app.session.active_payload() {
        Payload::Terminal(text) => render_terminal(frame, app, text, palette, area),
        Payload::File(file) => render_file(frame, app, file, palette, area),
        Payload::Image(image) => render_browser(frame, app, image, palette, area),
        Payload::Empty => render_placeholder(frame, app, palette, area),
    }
}

fn render_terminal(frame: &mut Frame, app: &App, text: &str, palette: &Palette, area: Rect) {
    let block = panel_block(" Terminal ", palette);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines: Vec<Line> = text
        .lines()
        .map(|l| {
            let style = if l.starts_with("STDERR: ") || l.starts_with("EXECUTION ERROR: ") {
                Style::default().fg(palette.error)
            } else if l.starts_with("--- ") {
                Style::default().fg(palette.muted)
            } else {
                Style::default().fg(palette.text)
            };
            Line::from(Span::styled(l, style))
        })
        .collect();

    let text_area = Rect::new(inner.x, inner.y, inner.width.saturating_sub(1), inner.height);
    render_scrolled_from_bottom(frame, Text::from(lines), app.desktop_scroll, text_area, inner);
}

fn render_file(frame: &mut Frame, app: &App, file: &FileView, palette: &Palette, area: Rect) {
    let mut block = panel_block(format!(" {} ", file.filename), palette);
    if let Some(syntax) = app.file_syntax() {
        block = block.title(
            Line::from(Span::styled(format!(" {syntax} "), Style::default().fg(palette.muted))).right_aligned(),
        );
    }
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let total = app.file_lines.len();
    let visible = inner.height as usize;
    let max_scroll = total.saturating_sub(visible);
    let offset = app.desktop_scroll.min(max_scroll);

    frame.render_widget(
        Paragraph::new(app.file_lines.clone()).scroll((to_u16(offset), 0)),
        inner,
    );

    if total > visible {
        let mut scrollbar_state = ScrollbarState::new(total)
            .position(offset)
            .viewport_content_length(visible);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼")),
            inner,
            &mut scrollbar_state,
        );
    }
}

fn render_browser(frame: &mut Frame, app: &App, image: &ImageView, palette: &Palette, area: Rect) {
    let block = panel_block(format!(" Browser View - {} ", image.filename), palette);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = match app.screenshot {
        Some(info) if !app.session.desktop().image_load_error() => vec![
            Line::from(Span::styled(
                format!("{} screenshot, {} bytes", info.format, info.bytes),
                Style::default().fg(palette.text).bold(),
            )),
            Line::from(Span::styled(image.content_type.as_str(), Style::default().fg(palette.muted))),
            Line::from(""),
            Line::from(Span::styled(
                "Image preview is not available in the terminal.",
                Style::default().fg(palette.muted),
            )),
        ],
        _ => vec![
            Line::from(Span::styled(
                "Failed to load browser view.",
                Style::default().fg(palette.error).bold(),
            )),
            Line::from(Span::styled(
                "This might be due to an invalid image format or data.",
                Style::default().fg(palette.muted),
            )),
        ],
    };

    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        centered_rows(inner, 4),
    );
}

fn render_placeholder(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let block = panel_block(" Desktop Area ", palette);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let text = Text::from(vec![
        Line::from(Span::styled("Desktop Area", Style::default().fg(palette.muted).bold())),
        Line::from(Span::styled(
            format!("mode: {}", app.session.desktop().mode().as_str()),
            Style::default().fg(palette.muted),
        )),
    ]);

    frame.render_widget(
        Paragraph::new(text).alignment(Alignment::Center),
        centered_rows(inner, 2),
    );
}

/// A full-width strip of `rows` rows in the vertical middle of `area`.
fn centered_rows(area: Rect, rows: u16) -> Rect {
    let height = rows.min(area.height);
    Rect::new(area.x, area.y + (area.height - height) / 2, area.width, height)
}

// =============================================================================
// Status Bar
// =============================================================================

/// Render the status bar.
fn render_status_bar(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(palette.warning));

    let status = if let Some(ref error) = app.error_message {
        Line::from(vec![
            Span::styled(" ERROR: ", Style::default().fg(palette.error).bold()),
            Span::styled(error.as_str(), Style::default().fg(palette.error)),
        ])
    } else if let Some(ref status) = app.status_message {
        Line::from(vec![
            Span::styled(format!(" {status} "), Style::default().fg(palette.agent)),
            Span::styled(format!("[{}]", app.theme.label()), Style::default().fg(palette.muted)),
        ])
    } else {
        Line::from(vec![
            Span::raw(" "),
            key("Enter"),
            Span::raw(":send "),
            key("Esc"),
            Span::raw(":cancel "),
            key("PgUp/PgDn"),
            Span::raw(":chat "),
            key("Ctrl+↑/↓"),
            Span::raw(":desktop "),
            key("Ctrl+T"),
            Span::raw(":theme "),
            key("Ctrl+R"),
            Span::raw(":reconnect "),
            key("Ctrl+C"),
            Span::raw(":quit"),
        ])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(palette.bar).fg(palette.text));
    frame.render_widget(status_bar, area);
}

/// Calculate the number of visual lines after text wrapping.
fn calculate_wrapped_line_count(text: &Text, available_width: usize) -> usize {
    if available_width == 0 {
        return text.lines.len();
    }

    text.lines
        .iter()
        .map(|line| line.width().div_ceil(available_width).max(1))
        .sum()
}
