use crate::ui::commands::{ParsedCommand, parse_slash_command};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Result returned when the user interacts with the composer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// Single-line input box at the bottom of the widget.
///
/// While a logical turn is running the composer is disabled: keystrokes are
/// dropped, so a new send cannot start until the busy flag clears.
pub struct Composer {
    content: String,
    cursor_position: usize,
    placeholder: String,
    disabled: bool,
}

impl Composer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            cursor_position: 0,
            placeholder: placeholder.into(),
            disabled: false,
        }
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press || self.disabled {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if self.content.trim().is_empty() {
                    return ComposerResult::None;
                }
                let content = std::mem::take(&mut self.content);
                self.cursor_position = 0;
                if let Some(command) = parse_slash_command(&content) {
                    ComposerResult::Command(command)
                } else {
                    ComposerResult::Submitted(content)
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.content.insert(self.byte_offset(), c);
                self.cursor_position += 1;
                ComposerResult::None
            }
            KeyCode::Backspace => {
                if self.cursor_position > 0 {
                    self.cursor_position -= 1;
                    self.content.remove(self.byte_offset());
                }
                ComposerResult::None
            }
            KeyCode::Left => {
                self.cursor_position = self.cursor_position.saturating_sub(1);
                ComposerResult::None
            }
            KeyCode::Right => {
                if self.cursor_position < self.content.chars().count() {
                    self.cursor_position += 1;
                }
                ComposerResult::None
            }
            KeyCode::Home => {
                self.cursor_position = 0;
                ComposerResult::None
            }
            KeyCode::End => {
                self.cursor_position = self.content.chars().count();
                ComposerResult::None
            }
            _ => ComposerResult::None,
        }
    }

    /// Byte offset of the cursor within `content`.
    fn byte_offset(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }
}

impl Widget for &Composer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.disabled { "✉ (waiting...)" } else { "✉ Message" };
        let block = Block::default().borders(Borders::ALL).title(title);
        let inner = block.inner(area);
        block.render(area, buf);

        let line = if self.content.is_empty() {
            Line::from(vec![Span::styled(
                self.placeholder.clone(),
                Style::default().fg(Color::DarkGray),
            )])
        } else {
            let before: String = self.content.chars().take(self.cursor_position).collect();
            let at: String = self
                .content
                .chars()
                .nth(self.cursor_position)
                .map(|c| c.to_string())
                .unwrap_or_else(|| " ".to_string());
            let after: String = self.content.chars().skip(self.cursor_position + 1).collect();

            let cursor_style = if self.disabled {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::Black).bg(Color::White)
            };

            Line::from(vec![
                Span::raw(before),
                Span::styled(at, cursor_style),
                Span::raw(after),
            ])
        };

        buf.set_line(inner.x, inner.y, &line, inner.width);
    }
}
