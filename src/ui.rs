use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use crate::app::{App, InputMode};
use crate::conversation::{ChatMessage, ChatRole, MessageStatus};
use crate::theme::Palette;

const INDENT: &str = "  ";

/// Greedy word wrap on character counts. Explicit newlines are kept, words
/// longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();

    for raw_line in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in raw_line.split(' ') {
            let mut word: Vec<char> = word.chars().collect();

            // Hard-split words that can never fit
            while word.len() > width {
                if current_len > 0 {
                    out.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(width);
                out.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
            if needed > width && current_len > 0 {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        out.push(current);
    }

    out
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = app.theme.palette();

    frame.render_widget(
        Block::default().style(Style::default().bg(palette.background).fg(palette.text)),
        area,
    );

    // Main layout: title, chat, input, footer
    let [title_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_title(app, frame, title_area, &palette);

    if app.controller.is_header_visible() {
        app.chat_area = None;
        render_greeting(app, frame, chat_area, &palette);
    } else {
        render_chat(app, frame, chat_area, &palette);
    }

    render_input(app, frame, input_area, &palette);
    render_footer(app, frame, footer_area, &palette);

    if app.show_clear_confirm {
        render_clear_confirm(frame, area, &palette);
    }
}

fn render_title(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let title = Line::from(vec![
        Span::styled(" Gemini Chat ", Style::default().fg(palette.accent).bold()),
        Span::styled(format!("{} ", app.client.model()), Style::default().fg(palette.muted)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(palette.muted),
        ),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

fn render_greeting(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let inner = block.inner(area);
    let width = inner.width.saturating_sub(INDENT.len() as u16 * 2) as usize;

    let mut lines: Vec<Line> = vec![
        Line::default(),
        Line::from(Span::styled(
            format!("{}Hello, there", INDENT),
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("{}How can I help you today?", INDENT),
            Style::default().fg(palette.muted),
        )),
        Line::default(),
    ];

    for (i, suggestion) in app.suggestions.iter().take(9).enumerate() {
        let label = format!("[{}] ", i + 1);
        let wrapped = wrap_text(suggestion, width.saturating_sub(label.len()));
        for (n, part) in wrapped.into_iter().enumerate() {
            let prefix = if n == 0 { label.clone() } else { " ".repeat(label.len()) };
            lines.push(Line::from(vec![
                Span::raw(INDENT),
                Span::styled(prefix, Style::default().fg(palette.accent).bold()),
                Span::raw(part),
            ]));
        }
        lines.push(Line::default());
    }

    frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
}

/// Lines for one message plus the trailing blank line.
fn message_lines(
    app: &App,
    idx: usize,
    msg: &ChatMessage,
    width: usize,
    palette: &Palette,
) -> Vec<Line<'static>> {
    let selected = app.selected_message == Some(idx);
    let base = if selected {
        Style::default().bg(palette.selection)
    } else {
        Style::default()
    };

    let (label, label_color) = match msg.role {
        ChatRole::User => ("You", palette.user),
        ChatRole::Assistant => ("Gemini", palette.assistant),
    };

    let mut header = vec![Span::styled(
        label.to_string(),
        base.fg(label_color).add_modifier(Modifier::BOLD),
    )];
    if !msg.status.is_transient() {
        if app.is_copied(idx) {
            header.push(Span::styled("  ✓ copied", base.fg(palette.accent)));
        } else if selected {
            header.push(Span::styled("  [c] copy", base.fg(palette.muted)));
        }
    }

    let mut lines = vec![Line::from(header).style(base)];

    match msg.status {
        MessageStatus::Loading => {
            let lit = (app.animation_frame / 4) as usize;
            let mut bars = vec![Span::styled(INDENT, base)];
            for i in 0..3 {
                let color = if i == lit { palette.accent } else { palette.muted };
                bars.push(Span::styled("━━━━ ", base.fg(color)));
            }
            lines.push(Line::from(bars).style(base));
        }
        MessageStatus::Error => {
            for (n, part) in wrap_text(&msg.content, width.saturating_sub(2)).into_iter().enumerate() {
                let marker = if n == 0 { "⚠ " } else { "  " };
                lines.push(
                    Line::from(Span::styled(
                        format!("{}{}{}", INDENT, marker, part),
                        base.fg(palette.error),
                    ))
                    .style(base),
                );
            }
        }
        MessageStatus::Complete | MessageStatus::Typing => {
            for part in wrap_text(&msg.content, width) {
                lines.push(
                    Line::from(Span::styled(format!("{}{}", INDENT, part), base.fg(palette.text)))
                        .style(base),
                );
            }
        }
    }

    lines.push(Line::default());
    lines
}

/// Line counts saturate instead of wrapping on very long conversations.
fn line_count(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

/// All conversation lines and, per message, the line range it occupies.
pub fn chat_lines(app: &App, width: usize, palette: &Palette) -> (Vec<Line<'static>>, Vec<(u16, u16)>) {
    let text_width = width.saturating_sub(INDENT.len()).max(1);
    let mut lines = Vec::new();
    let mut spans = Vec::new();

    for (idx, msg) in app.controller.conversation().messages().iter().enumerate() {
        let start = line_count(lines.len());
        lines.extend(message_lines(app, idx, msg, text_width, palette));
        spans.push((start, line_count(lines.len())));
    }

    (lines, spans)
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect, palette: &Palette) {
    app.chat_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let inner = block.inner(area);
    // One column for the scrollbar
    let width = inner.width.saturating_sub(1) as usize;
    app.chat_height = inner.height;

    let (lines, spans) = chat_lines(app, width, palette);
    let total = line_count(lines.len());
    let max_scroll = total.saturating_sub(app.chat_height);

    // Keep the selected message on screen
    if app.scroll_to_selection {
        app.scroll_to_selection = false;
        if let Some((start, end)) = app.selected_message.and_then(|i| spans.get(i).copied()) {
            if start < app.chat_scroll {
                app.chat_scroll = start;
            } else if end > app.chat_scroll.saturating_add(app.chat_height) {
                app.chat_scroll = end.saturating_sub(app.chat_height);
            }
            app.follow_bottom = false;
        }
    }

    if app.follow_bottom || app.chat_scroll >= max_scroll {
        app.chat_scroll = max_scroll;
        app.follow_bottom = true;
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);

    if total > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state = ScrollbarState::new(max_scroll as usize)
            .position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { palette.border_focused } else { palette.border };

    let title = if app.controller.is_typing() {
        " Gemini is typing... "
    } else if app.controller.is_in_flight() {
        " Waiting for reply... "
    } else {
        " Enter a prompt here "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(palette.user))
        .block(block);

    frame.render_widget(input, area);

    if editing && !app.show_clear_confirm {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect, palette: &Palette) {
    let key_style = Style::default().bg(palette.muted).fg(palette.background);
    let label_style = Style::default().fg(palette.text);

    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(palette.accent).fg(palette.background)),
        InputMode::Editing => (" INSERT ", Style::default().bg(palette.assistant).fg(palette.background)),
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];

    if let Some(status) = &app.status_line {
        spans.push(Span::styled(status.clone(), Style::default().fg(palette.error)));
    } else {
        let hints: Vec<(&str, &str)> = match app.input_mode {
            InputMode::Editing => vec![("Enter", "send"), ("Esc", "normal mode")],
            InputMode::Normal => {
                let mut hints = vec![("i", "type")];
                if app.controller.is_header_visible() {
                    hints.push(("1-4", "suggestion"));
                }
                hints.extend([
                    ("j/k", "select"),
                    ("c", "copy"),
                    ("t", app.theme.toggle_label()),
                    ("D", "delete chats"),
                    ("q", "quit"),
                ]);
                hints
            }
        };

        for (key, label) in hints {
            spans.push(Span::styled(format!(" {} ", key), key_style));
            spans.push(Span::styled(format!(" {} ", label), label_style));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_clear_confirm(frame: &mut Frame, area: Rect, palette: &Palette) {
    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = 5;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.error))
        .style(Style::default().bg(palette.background))
        .title(" Delete chats ");

    let text = Text::from(vec![
        Line::from("Are you sure you want to delete all chats?"),
        Line::default(),
        Line::from(Span::styled("y: delete   n: cancel", Style::default().fg(palette.muted))),
    ]);

    let popup = Paragraph::new(text)
        .style(Style::default().fg(palette.text))
        .wrap(Wrap { trim: true })
        .block(block);

    frame.render_widget(popup, popup_area);
}
