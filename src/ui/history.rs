//! Transcript display: chat bubbles and error notices.

use crate::conversation::{AUTHORS, AvatarKind, Message, Notice, Turn};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Renders a conversation snapshot, newest messages anchored to the
/// bottom of the viewport.
pub struct Transcript<'a> {
    messages: &'a [Message],
}

impl<'a> Transcript<'a> {
    pub fn new(messages: &'a [Message]) -> Self {
        Self { messages }
    }
}

impl Widget for Transcript<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Generative AI chat");

        let inner = block.inner(area);
        block.render(area, buf);

        if self.messages.is_empty() {
            let welcome = vec![
                Line::from(Span::styled(
                    "Ask a question to start the conversation.",
                    Style::default().fg(Color::Gray),
                )),
                Line::from(Span::raw("")),
                Line::from(Span::styled(
                    "Enter to send · Ctrl+N new conversation · Ctrl+E load example",
                    Style::default().fg(Color::DarkGray),
                )),
            ];
            for (i, line) in welcome.iter().enumerate() {
                if i < inner.height as usize {
                    buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
                }
            }
            return;
        }

        let mut all_lines: Vec<Line> = Vec::new();
        for message in self.messages {
            match message {
                Message::Turn(turn) => all_lines.extend(render_turn(turn, inner.width)),
                Message::Notice(notice) => all_lines.extend(render_notice(notice, inner.width)),
            }
            all_lines.push(Line::from(Span::raw("")));
        }

        // Show the tail that fits; the newest message is always visible.
        let height = inner.height as usize;
        let start = all_lines.len().saturating_sub(height);
        for (i, line) in all_lines[start..].iter().enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}

fn render_turn(turn: &Turn, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let info = AUTHORS
        .get(&turn.author.to_string())
        .copied()
        .unwrap_or(crate::conversation::AuthorInfo {
            name: "Unknown",
            initials: None,
            kind: AvatarKind::GenAi,
        });
    let (icon, content_color) = match info.kind {
        AvatarKind::User => ("👤", Color::Blue),
        AvatarKind::GenAi => ("🤖", Color::Green),
    };

    let header = format!("{} {} {}", icon, info.name, "─".repeat(20));
    lines.push(Line::from(Span::styled(
        header,
        Style::default().fg(Color::DarkGray),
    )));

    if turn.pending && turn.text.is_empty() {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled("…", Style::default().fg(Color::Yellow)),
        ]));
        return lines;
    }

    let content_lines = wrap_text(&turn.text, width.saturating_sub(2) as usize);
    let last = content_lines.len().saturating_sub(1);
    for (i, content) in content_lines.into_iter().enumerate() {
        let cursor = if turn.pending && i == last { "▋" } else { "" };
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(content, Style::default().fg(content_color)),
            Span::styled(cursor, Style::default().fg(Color::Yellow)),
        ]));
    }

    lines
}

fn render_notice(notice: &Notice, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let title = notice.title.as_deref().unwrap_or("Error");
    lines.push(Line::from(Span::styled(
        format!("⚠ {} {}", title, "─".repeat(20)),
        Style::default().fg(Color::Red),
    )));

    for content in wrap_text(&notice.text, width.saturating_sub(2) as usize) {
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(content, Style::default().fg(Color::Red)),
        ]));
    }

    lines
}

/// Word-wrap text to the given width, keeping explicit line breaks.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
            } else if current.chars().count() + 1 + word.chars().count() <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(current);
                current = word.to_string();
            }
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Author;

    #[test]
    fn wrap_text_respects_width() {
        let lines = wrap_text("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
    }

    #[test]
    fn wrap_text_keeps_explicit_breaks() {
        let lines = wrap_text("first\nsecond", 80);
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn wrap_text_of_empty_string_is_one_empty_line() {
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn pending_turn_renders_a_thinking_indicator() {
        let turn = Turn {
            author: Author::Assistant,
            text: String::new(),
            pending: true,
        };
        let lines = render_turn(&turn, 40);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn notice_renders_title_and_text() {
        let notice = Notice {
            title: Some("Request failed".to_string()),
            text: "timeout".to_string(),
        };
        let lines = render_notice(&notice, 40);
        assert!(lines.len() >= 2);
    }
}
