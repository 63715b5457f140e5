//! Prompt input box.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Result of feeding a key event to the composer.
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    /// The user pressed Enter on a non-empty prompt; the field is cleared.
    Submitted(String),
    None,
}

/// Single-line prompt input. While a request cycle is in flight the
/// composer is disabled and ignores every key.
#[derive(Default)]
pub struct Composer {
    content: String,
    /// Cursor position in characters, not bytes.
    cursor: usize,
    disabled: bool,
}

impl Composer {
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[allow(dead_code)]
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if self.disabled {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if !self.content.is_empty() {
                    let prompt = std::mem::take(&mut self.content);
                    self.cursor = 0;
                    return ComposerResult::Submitted(prompt);
                }
            }
            KeyCode::Char(c) => {
                let at = char_to_byte_index(&self.content, self.cursor);
                self.content.insert(at, c);
                self.cursor += 1;
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = char_to_byte_index(&self.content, self.cursor);
                    self.content.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.content.chars().count() {
                    let at = char_to_byte_index(&self.content, self.cursor);
                    self.content.remove(at);
                }
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.cursor < self.content.chars().count() {
                    self.cursor += 1;
                }
            }
            KeyCode::Home => {
                self.cursor = 0;
            }
            KeyCode::End => {
                self.cursor = self.content.chars().count();
            }
            _ => {}
        }

        ComposerResult::None
    }
}

/// Byte offset of the `char_idx`-th character.
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl Widget for &Composer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.disabled {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green)
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Ask a question")
            .style(border_style);
        let inner = block.inner(area);
        block.render(area, buf);

        let line = if self.disabled {
            Line::from(Span::styled(
                "Waiting for the response…",
                Style::default().fg(Color::DarkGray),
            ))
        } else if self.content.is_empty() {
            Line::from(vec![
                Span::styled("▌", Style::default().fg(Color::White)),
                Span::styled("Ask a question", Style::default().fg(Color::DarkGray)),
            ])
        } else {
            let mut content = self.content.clone();
            let at = char_to_byte_index(&content, self.cursor);
            content.insert(at, '▌');
            Line::from(Span::raw(content))
        };

        buf.set_line(inner.x, inner.y, &line, inner.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(composer: &mut Composer, text: &str) {
        for c in text.chars() {
            composer.handle_key(press(KeyCode::Char(c)));
        }
    }

    #[test]
    fn typing_and_submitting_clears_the_field() {
        let mut composer = Composer::default();
        type_str(&mut composer, "hello");
        assert_eq!(composer.content(), "hello");

        let result = composer.handle_key(press(KeyCode::Enter));
        assert_eq!(result, ComposerResult::Submitted("hello".to_string()));
        assert_eq!(composer.content(), "");
    }

    #[test]
    fn enter_on_empty_field_submits_nothing() {
        let mut composer = Composer::default();
        assert_eq!(composer.handle_key(press(KeyCode::Enter)), ComposerResult::None);
    }

    #[test]
    fn disabled_composer_ignores_keys() {
        let mut composer = Composer::default();
        composer.set_disabled(true);
        type_str(&mut composer, "hi");
        assert_eq!(composer.content(), "");
        assert_eq!(composer.handle_key(press(KeyCode::Enter)), ComposerResult::None);
    }

    #[test]
    fn cursor_editing_is_character_safe() {
        let mut composer = Composer::default();
        type_str(&mut composer, "héllo");
        composer.handle_key(press(KeyCode::Home));
        composer.handle_key(press(KeyCode::Right));
        composer.handle_key(press(KeyCode::Right));
        composer.handle_key(press(KeyCode::Backspace));
        assert_eq!(composer.content(), "hllo");
    }

    #[test]
    fn delete_removes_character_at_cursor() {
        let mut composer = Composer::default();
        type_str(&mut composer, "abc");
        composer.handle_key(press(KeyCode::Home));
        composer.handle_key(press(KeyCode::Delete));
        assert_eq!(composer.content(), "bc");
    }
}
