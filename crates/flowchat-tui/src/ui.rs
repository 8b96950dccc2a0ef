use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use flowchat_core::{ChatRole, ChatTurn, Provider, Segment, split_segments};
use unicode_width::UnicodeWidthChar;
use crate::app::{App, InputMode};
use crate::theme::Palette;

/// Tabs are shown as this many spaces
const TAB: &str = "    ";

fn display_width(text: &str) -> usize {
    text.chars().map(|c| c.width().unwrap_or(0)).sum()
}

/// Wrap text to fit within a given width in terminal columns, returning multiple lines.
/// Breaks at whitespace and keeps the runs between words; only words wider than the
/// line are split. Leading indentation is repeated on every wrapped line.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let body = text.trim_start();
    if body.is_empty() {
        return vec![String::new()];
    }
    let mut indent = text[..text.len() - body.len()].replace('\t', TAB);
    if display_width(&indent) > width / 2 {
        indent.clear();
    }
    let indent_width = display_width(&indent);

    let mut lines = Vec::new();
    let mut current = indent.clone();
    let mut used = indent_width;
    let mut started = false;
    let mut rest = body;

    while !rest.is_empty() {
        let after = rest.trim_start();
        let gap = rest[..rest.len() - after.len()].replace('\t', TAB);
        let word_end = after.find(char::is_whitespace).unwrap_or(after.len());
        let word = &after[..word_end];
        rest = &after[word_end..];
        if word.is_empty() {
            // Trailing whitespace
            break;
        }

        let gap_width = display_width(&gap);
        let word_width = display_width(word);
        if started && used + gap_width + word_width <= width {
            current.push_str(&gap);
            current.push_str(word);
            used += gap_width + word_width;
            continue;
        }

        if started {
            lines.push(std::mem::replace(&mut current, indent.clone()));
            used = indent_width;
        }
        started = true;
        for c in word.chars() {
            let char_width = c.width().unwrap_or(0);
            if used + char_width > width && used > indent_width {
                lines.push(std::mem::replace(&mut current, indent.clone()));
                used = indent_width;
            }
            current.push(c);
            used += char_width;
        }
    }

    lines.push(current);
    lines
}

/// Style inline `**bold**` and `` `code` `` runs; unmatched markers stay literal
fn parse_markdown_line(text: &str, base: Style, code: Style) -> Line<'static> {
    let markers = [("**", base.add_modifier(Modifier::BOLD)), ("`", code)];
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let next = markers
            .iter()
            .filter_map(|&(marker, style)| {
                let open = rest.find(marker)?;
                let inner = open + marker.len();
                let len = rest[inner..].find(marker)?;
                (len > 0).then_some((open, inner, len, marker.len(), style))
            })
            .min_by_key(|&(open, ..)| open);

        let Some((open, inner, len, marker_len, style)) = next else {
            spans.push(Span::styled(rest.to_string(), base));
            break;
        };
        if open > 0 {
            spans.push(Span::styled(rest[..open].to_string(), base));
        }
        spans.push(Span::styled(rest[inner..inner + len].to_string(), style));
        rest = &rest[inner + len + marker_len..];
    }

    Line::from(spans)
}

/// Hard-wrap styled fragments to `width` columns on a shaded background
fn wrap_code_line(spans: Vec<Span<'static>>, width: usize, bg: Style) -> Vec<Line<'static>> {
    let width = width.max(1);
    let pad = |used: usize| Span::styled(" ".repeat(width.saturating_sub(used)), bg);
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0;

    for span in spans {
        let style = bg.patch(span.style);
        let mut chunk = String::new();
        for c in span.content.replace('\t', TAB).chars() {
            let char_width = c.width().unwrap_or(0);
            if used + char_width > width && used > 0 {
                if !chunk.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut chunk), style));
                }
                if used < width {
                    current.push(pad(used));
                }
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
            }
            chunk.push(c);
            used += char_width;
        }
        if !chunk.is_empty() {
            current.push(Span::styled(chunk, style));
        }
    }

    if used < width {
        current.push(pad(used));
    }
    lines.push(Line::from(current));
    lines
}

fn render_turn_body(app: &App, turn: &ChatTurn, width: usize, palette: &Palette, lines: &mut Vec<Line<'static>>) {
    let text_style = match turn.role {
        ChatRole::User => Style::default().fg(palette.user),
        ChatRole::Assistant => Style::default().fg(palette.text),
    };
    let inline_code = Style::default().fg(palette.code_caption).bg(palette.code_bg);
    let alignment = match turn.role {
        ChatRole::User => Alignment::Right,
        ChatRole::Assistant => Alignment::Left,
    };

    for (index, segment) in split_segments(&turn.content).into_iter().enumerate() {
        match segment {
            Segment::Text(text) => {
                // Text right after a closing fence continues the fence's line
                let starts_line = index == 0 || text.starts_with(['\n', '\r']);
                let text = text.trim_matches('\n');
                if text.trim().is_empty() {
                    continue;
                }
                for (line_no, raw_line) in text.split('\n').enumerate() {
                    let raw_line = raw_line.trim_end_matches('\r');
                    let raw_line = if line_no == 0 && !starts_line {
                        raw_line.trim_start()
                    } else {
                        raw_line
                    };
                    for wrapped in wrap_text_to_width(raw_line, width) {
                        lines.push(parse_markdown_line(&wrapped, text_style, inline_code).alignment(alignment));
                    }
                }
            }
            Segment::Code(block) => {
                let bg = Style::default().bg(palette.code_bg).fg(palette.code_fg);
                lines.push(Line::from(vec![
                    Span::styled(
                        format!(" {} ", block.language),
                        Style::default().fg(palette.code_caption).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled("(y to copy)", Style::default().fg(palette.muted)),
                ]));
                let highlighted =
                    app.highlighter.highlight(block.code, block.language, palette.syntax_theme);
                for code_line in highlighted {
                    lines.extend(wrap_code_line(code_line, width, bg));
                }
            }
        }
    }
}

/// Lay out the whole conversation as pre-wrapped lines
fn build_chat_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let palette = app.theme.palette();
    let mut lines: Vec<Line<'static>> = Vec::new();

    for turn in app.session.turns() {
        let (label, color, alignment) = match turn.role {
            ChatRole::User => ("You", palette.user, Alignment::Right),
            ChatRole::Assistant => ("AI", palette.assistant, Alignment::Left),
        };

        lines.push(
            Line::from(Span::styled(
                label,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))
            .alignment(alignment),
        );
        render_turn_body(app, turn, width, &palette, &mut lines);
        lines.push(
            Line::from(Span::styled(turn.time_label(), Style::default().fg(palette.muted)))
                .alignment(alignment),
        );
        lines.push(Line::default());
    }

    if app.session.is_loading() {
        lines.push(Line::from(Span::styled(
            "AI",
            Style::default().fg(palette.assistant).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let banner_height = if app.session.error().is_some() { 3 } else { 0 };

    // Main layout: header, chat, error banner, input, footer
    let [header_area, chat_area, banner_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(banner_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if banner_height > 0 {
        render_error_banner(app, frame, banner_area);
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_provider_picker {
        render_provider_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let palette = app.theme.palette();
    let title = Line::from(vec![
        Span::styled(" AI Chat ", Style::default().fg(palette.border_active).bold()),
        Span::styled(
            format!(" {} ", app.provider.display_name()),
            Style::default().fg(palette.text),
        ),
        Span::styled(
            format!(" [{}] ", app.theme.as_str()),
            Style::default().fg(palette.muted),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(palette.muted),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(palette.header_bg));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let palette = app.theme.palette();
    let focused = app.input_mode == InputMode::Normal;
    let border_color = if focused { palette.border_active } else { palette.border };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");

    // Inner size minus borders
    let inner_width = area.width.saturating_sub(2) as usize;
    app.chat_height = area.height.saturating_sub(2);

    let chat_text = if app.session.turns().is_empty() && !app.session.is_loading() {
        app.chat_lines = 1;
        Text::from(Span::styled(
            "Type a message below and press Enter...",
            Style::default().fg(palette.muted),
        ))
    } else {
        let lines = build_chat_lines(app, inner_width);
        app.chat_lines = u16::try_from(lines.len()).unwrap_or(u16::MAX);
        Text::from(lines)
    };

    // Keep the newest turn in view unless the user scrolled away
    if app.follow {
        app.scroll = app.max_scroll();
    } else {
        app.scroll = app.scroll.min(app.max_scroll());
    }

    let chat = Paragraph::new(chat_text)
        .block(block)
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_error_banner(app: &App, frame: &mut Frame, area: Rect) {
    let palette = app.theme.palette();
    let message = app.session.error().unwrap_or_default();

    let banner = Paragraph::new(format!("Error: {}", message))
        .style(Style::default().bg(palette.error_bg).fg(palette.error_fg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.error_fg))
                .title(" Esc to dismiss "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(banner, area);
}

/// First character shown in an input box `width` cells wide, keeping the cursor in view
fn input_scroll_offset(cursor: usize, width: usize) -> usize {
    if width == 0 {
        0
    } else {
        cursor.saturating_sub(width - 1)
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let palette = app.theme.palette();
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { palette.border_active } else { palette.border };

    let title = if app.session.is_loading() {
        " Waiting for reply... "
    } else {
        " Message (Enter to send) "
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = input_scroll_offset(cursor_pos, inner_width);

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .map(|c| if c == '\n' { '↵' } else { c })
        .collect();

    let text_color = if app.session.is_loading() { palette.muted } else { palette.user };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(input_block);

    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let palette = app.theme.palette();
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " VIEW ",
        InputMode::Editing => " INSERT ",
    };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(palette.text);

    let hints: &[(&str, &str)] = match app.input_mode {
        InputMode::Editing => &[("Enter", "send"), ("Esc", "view"), ("PgUp/PgDn", "scroll")],
        InputMode::Normal => &[
            ("i", "type"),
            ("j/k", "scroll"),
            ("y", "copy code"),
            ("Y", "copy reply"),
            ("t", "theme"),
            ("P", "provider"),
            ("q", "quit"),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    if let Some((notice, _)) = &app.notice {
        spans.push(Span::styled(
            format!("  {} ", notice),
            Style::default().fg(palette.assistant).add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_provider_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let palette = app.theme.palette();
    let providers = Provider::all();

    let width = 56.min(area.width.saturating_sub(4));
    let height = (providers.len() as u16 + 2).min(area.height.saturating_sub(4));
    let popup = Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    );
    frame.render_widget(Clear, popup);

    let items: Vec<ListItem> = providers
        .iter()
        .map(|&provider| {
            let env_name = provider.key_env();
            let (status, style) = match app.get_key_source(provider) {
                Some("env") => (format!("{} from env", env_name), Style::default().fg(palette.text)),
                Some(_) => ("key in config".to_string(), Style::default().fg(palette.text)),
                None => (format!("needs {}", env_name), Style::default().fg(palette.muted)),
            };
            let marker = if provider == app.provider { "* " } else { "  " };
            let style = if provider == app.provider {
                Style::default().fg(palette.user).add_modifier(Modifier::BOLD)
            } else {
                style
            };
            ListItem::new(format!("{}{} ({})", marker, provider.display_name(), status)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border_active))
                .title(" Provider (Enter to select) "),
        )
        .highlight_style(
            Style::default()
                .bg(palette.border_active)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup, &mut app.provider_picker_state);
}
