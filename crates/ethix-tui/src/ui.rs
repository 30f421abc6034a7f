use chrono::Local;
use ethix_core::{ChatRole, ChatTurn};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, InputMode};

const ASSISTANT_NAME: &str = "Ethix IA";

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
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
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

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let error_height = if app.session.last_error().is_some() { 3 } else { 0 };

    let [header_area, chat_area, error_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(error_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if let Some(error) = app.session.last_error() {
        render_error_banner(error, frame, error_area);
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_api_key_modal {
        render_api_key_modal(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = if app.credentials.is_using_default() {
        Style::default().fg(Color::Blue)
    } else {
        Style::default().fg(Color::Green)
    };

    let title = Line::from(vec![
        Span::styled(" Ethix IA Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
        Span::styled(app.client.model().to_string(), Style::default().fg(Color::Magenta)),
        Span::raw("  "),
        Span::styled(app.key_status_label(), key_style),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn turn_lines(turn: &ChatTurn) -> Vec<Line<'static>> {
    let time = turn.timestamp.with_timezone(&Local).format("%H:%M").to_string();
    let mut lines = Vec::new();

    match turn.role {
        ChatRole::User => {
            lines.push(
                Line::from(vec![
                    Span::styled(time, Style::default().fg(Color::DarkGray)),
                    Span::raw(" "),
                    Span::styled("You", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                ])
                .alignment(Alignment::Right),
            );
            for line in turn.content.lines() {
                lines.push(
                    Line::from(Span::styled(line.to_string(), Style::default().fg(Color::Cyan)))
                        .alignment(Alignment::Right),
                );
            }
        }
        ChatRole::Assistant => {
            lines.push(
                Line::from(vec![
                    Span::styled(
                        ASSISTANT_NAME,
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(" "),
                    Span::styled(time, Style::default().fg(Color::DarkGray)),
                ])
                .alignment(Alignment::Left),
            );
            for line in turn.content.lines() {
                lines.push(parse_markdown_line(line).alignment(Alignment::Left));
            }
        }
    }

    lines.push(Line::default());
    lines
}

/// The conversation as one word-wrapped paragraph, without its block.
/// Scroll limits are measured on this same paragraph.
pub(crate) fn chat_paragraph(app: &App) -> Paragraph<'static> {
    let mut lines: Vec<Line<'static>> = app.turns().iter().flat_map(turn_lines).collect();

    if app.session.is_in_flight() {
        lines.push(Line::from(Span::styled(
            ASSISTANT_NAME,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false })
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let border_color = if app.input_mode == InputMode::Normal { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");

    if app.turns().is_empty() && !app.session.is_in_flight() {
        let welcome = Text::from(vec![
            Line::default(),
            Line::from(Span::styled(
                "Welcome to Ethix IA Chat",
                Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Start a conversation by typing a message below",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .alignment(Alignment::Center);

        frame.render_widget(Paragraph::new(welcome).block(block), area);
        return;
    }

    // The area may have changed since the last scroll (resize, error banner)
    let max_scroll = app.max_chat_scroll();
    app.chat_scroll = if app.follow_chat { max_scroll } else { app.chat_scroll.min(max_scroll) };

    let chat = chat_paragraph(app).block(block).scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_error_banner(error: &str, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Error ");

    let banner = Paragraph::new(Line::from(vec![
        Span::styled("! ", Style::default().fg(Color::Red).bold()),
        Span::styled(error.to_string(), Style::default().fg(Color::LightRed)),
    ]))
    .block(block)
    .wrap(Wrap { trim: true });

    frame.render_widget(banner, area);
}

/// First visible char of a single-line field, so the cursor stays in view
fn input_scroll_offset(cursor: usize, width: usize) -> usize {
    if width == 0 || cursor < width {
        0
    } else {
        cursor - width + 1
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let waiting = app.session.is_in_flight();
    let editing = app.input_mode == InputMode::Editing;

    let (border_color, title) = if waiting {
        (Color::DarkGray, " Waiting for reply... ")
    } else if editing {
        (Color::Yellow, " Message (Enter to send, Esc for commands) ")
    } else {
        (Color::DarkGray, " Message (i to type) ")
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = input_scroll_offset(cursor_pos, inner_width);

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_style = if waiting {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };

    frame.render_widget(Paragraph::new(visible_text).style(text_style).block(block), area);

    if editing && !waiting && !app.show_api_key_modal {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    let hints = match app.input_mode {
        InputMode::Normal => " i: type  a: API key  j/k: scroll  q: quit",
        InputMode::Editing => " Enter: send  Esc: commands  Ctrl+C: quit",
    };

    let footer = Line::from(vec![
        Span::styled(mode_text, mode_style),
        Span::styled(hints, Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(footer), area);
}

fn render_api_key_modal(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 64.min(area.width.saturating_sub(4));
    let popup_height = 13.min(area.height);

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Configure API Key ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let badge_style = if app.credentials.is_using_default() {
        Style::default().bg(Color::Blue).fg(Color::White)
    } else {
        Style::default().bg(Color::Green).fg(Color::Black)
    };

    let reveal_hint = if app.reveal_api_key { " (Tab to hide)" } else { " (Tab to reveal)" };

    let [status_area, active_key_area, _, label_area, input_area, help_area, error_area, hints_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(inner);

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("Current status: ", Style::default().fg(Color::Gray)),
            Span::styled(format!(" {} ", app.key_status_label()), badge_style),
        ])),
        status_area,
    );
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(app.displayed_active_key(), Style::default().fg(Color::DarkGray)),
            Span::styled(reveal_hint, Style::default().fg(Color::DarkGray).italic()),
        ])),
        active_key_area,
    );
    frame.render_widget(
        Paragraph::new(Span::styled("Ethix IA API Key", Style::default().bold())),
        label_area,
    );

    // Input is always masked, like a password field, and scrolls
    // sideways once it is wider than the popup
    let input_width = input_area.width as usize;
    let scroll_offset = input_scroll_offset(app.api_key_cursor, input_width);
    let visible_len = app.api_key_input.chars().count().saturating_sub(scroll_offset).min(input_width);
    frame.render_widget(
        Paragraph::new(Span::styled("*".repeat(visible_len), Style::default().fg(Color::Cyan))),
        input_area,
    );

    frame.render_widget(
        Paragraph::new(Span::styled(
            "Leave empty to use the default API key. Your custom key will be stored locally.",
            Style::default().fg(Color::DarkGray),
        ))
        .wrap(Wrap { trim: true }),
        help_area,
    );

    if let Some(error) = &app.api_key_error {
        frame.render_widget(
            Paragraph::new(Span::styled(error.clone(), Style::default().fg(Color::Red))),
            error_area,
        );
    }

    frame.render_widget(
        Paragraph::new(Span::styled(
            "Enter: save  Ctrl+D: reset to default  Esc: cancel",
            Style::default().fg(Color::Gray),
        )),
        hints_area,
    );

    if input_area.height > 0 && input_area.width > 0 {
        let cursor_x = (app.api_key_cursor - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
    }
}
