use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use snarky_core::{Chat, Lane, Turn};
use crate::app::{App, FocusPane, InputMode};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(bold_text, Style::default().add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    Line::from(spans)
}

/// Local "Mon 02 15:04" label for a chat timestamp
pub fn format_timestamp(timestamp: f64) -> String {
    let secs = timestamp.trunc() as i64;
    let nanos = (timestamp.fract() * 1e9) as u32;
    chrono::DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%b %d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn chat_label(chat: &Chat, width: usize) -> String {
    let title = chat.title().unwrap_or("(empty)").replace('\n', " ");
    let title: String = title.chars().take(width).collect();
    format!("{} {}", format_timestamp(chat.timestamp), title)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, input, footer
    let [header_area, body_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    let [sidebar_area, chat_area] = Layout::horizontal([
        Constraint::Length(32),
        Constraint::Min(0),
    ])
    .areas(body_area);

    render_header(app, frame, header_area);
    render_sidebar(app, frame, sidebar_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" SnarkyAI ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::styled(
            format!("{} | text: {} | image: {}", app.provider.display_name(), app.text_model, app.image_model),
            Style::default().fg(Color::Gray),
        ),
    ]);
    frame.render_widget(Paragraph::new(title), area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Sidebar;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let label_width = area.width.saturating_sub(17) as usize;

    let items: Vec<ListItem> = app
        .history
        .iter()
        .enumerate()
        .map(|(i, chat)| {
            let marker = if app.active == Some(i) { "● " } else { "  " };
            ListItem::new(format!("{}{}", marker, chat_label(chat, label_width)))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color))
                .title(format!(" Chats ({}) ", app.history.len())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    frame.render_stateful_widget(list, area, &mut app.sidebar_state);
}

fn render_chat(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(match app.active_chat() {
            Some(chat) => format!(" {} ", format_timestamp(chat.timestamp)),
            None => " New chat ".to_string(),
        });

    let mut lines: Vec<Line> = Vec::new();
    if let Some(chat) = app.active_chat() {
        for turn in &chat.messages {
            lines.extend(turn_lines(turn));
        }
    }

    for lane in [Lane::Text, Lane::Image] {
        if app.is_busy(lane) {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            let label = match lane {
                Lane::Text => format!("Thinking{}", dots),
                Lane::Image => format!("Painting{}", dots),
            };
            lines.push(Line::from(Span::styled(
                label,
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
    }

    let text = if lines.is_empty() {
        Text::from(Span::styled(
            "Type a prompt and press Enter. Ctrl+G or /image generates a picture.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(lines)
    };

    // Keep the newest lines in view unless the user scrolled up
    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let inner_height = area.height.saturating_sub(2);
    let total_lines: usize = text
        .lines
        .iter()
        .map(|line| line.width() / inner_width + 1)
        .sum();
    let bottom = to_u16(total_lines).saturating_sub(inner_height);
    let offset = bottom.saturating_sub(app.chat_scroll);

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    frame.render_widget(chat, area);
}

fn turn_lines(turn: &Turn) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match turn {
        Turn::User(text) => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            lines.extend(text.lines().map(|l| Line::from(l.to_string())));
        }
        Turn::Ai(text) => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.extend(text.lines().map(parse_markdown_line));
        }
        Turn::Image(url) => {
            lines.push(Line::from(Span::styled(
                "Image:",
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                url.clone(),
                Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
            )));
        }
    }
    lines.push(Line::default());
    lines
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let input = Paragraph::new(app.input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(" Prompt "),
    );
    frame.render_widget(input, area);

    if editing {
        let cursor_x = input_cursor_x(area, app.input_cursor);
        frame.set_cursor_position(Position::new(cursor_x, area.y + 1));
    }
}

/// Clamp a count to the terminal coordinate range
fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// Cursor column inside the bordered input box, pinned to its last cell
fn input_cursor_x(area: Rect, cursor: usize) -> u16 {
    area.x
        .saturating_add(1)
        .saturating_add(to_u16(cursor))
        .min(area.right().saturating_sub(2))
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];

    if let Some(status) = &app.status {
        let style = if status.starts_with(snarky_core::session::ERROR_PREFIX) {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };
        spans.push(Span::styled(format!("{} ", status), style));
    }

    let hints: &[(&str, &str)] = match app.input_mode {
        InputMode::Editing => &[(" Enter ", " send "), (" C-g ", " image "), (" Esc ", " normal ")],
        InputMode::Normal => &[
            (" i ", " edit "),
            (" n ", " new "),
            (" Tab ", " focus "),
            (" o ", " open "),
            (" p ", " provider "),
            (" q ", " quit "),
        ],
    };
    for (key, label) in hints {
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
