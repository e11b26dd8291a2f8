//! Conversation history display component

use crate::store::{ConversationStore, Message, Role};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Repaints the whole conversation each frame, newest message anchored to
/// the bottom. The store is the single source of truth; this widget holds
/// no message state of its own.
pub struct HistoryView<'a> {
    store: &'a ConversationStore,
    busy: bool,
    show_timestamps: bool,
}

impl<'a> HistoryView<'a> {
    pub fn new(store: &'a ConversationStore, busy: bool, show_timestamps: bool) -> Self {
        Self {
            store,
            busy,
            show_timestamps,
        }
    }

    /// Render a single message into lines
    fn render_message(&self, message: &Message, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let role_icon = match message.role {
            Role::User => "👤",
            Role::Assistant => "🤖",
        };

        let header = if self.show_timestamps {
            let timestamp = message.timestamp.format("%H:%M:%S").to_string();
            format!("{} {} {}", role_icon, timestamp, "─".repeat(20))
        } else {
            format!("{} {}", role_icon, "─".repeat(20))
        };

        lines.push(Line::from(vec![Span::styled(
            header,
            Style::default().fg(Color::DarkGray),
        )]));

        let content_lines = wrap_text(&message.text, width.saturating_sub(2) as usize);
        for content_line in content_lines {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(content_line, content_style(message.role)),
            ]));
        }

        lines
    }

    /// Animated "thinking" indicator shown while a logical turn is running.
    fn thinking_line(&self) -> Line<'static> {
        let dots = match (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
            / 300)
            % 4
        {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "   ",
        };

        Line::from(vec![
            Span::styled("🤖 ", Style::default().fg(Color::Green)),
            Span::styled("thinking", Style::default().fg(Color::Green)),
            Span::styled(dots.to_string(), Style::default().fg(Color::Yellow)),
        ])
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title("💬 Parley");

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.store.is_empty() && !self.busy {
            let welcome_lines = vec![
                Line::from(vec![Span::styled(
                    "Welcome to Parley 💬",
                    Style::default().fg(Color::Green),
                )]),
                Line::from(vec![Span::raw("")]),
                Line::from(vec![Span::styled(
                    "Type a question below and press Enter to send.",
                    Style::default().fg(Color::Gray),
                )]),
                Line::from(vec![Span::styled(
                    "Type /help for commands.",
                    Style::default().fg(Color::DarkGray),
                )]),
            ];

            for (i, line) in welcome_lines.iter().enumerate() {
                if i < inner_area.height as usize {
                    buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
                }
            }
            return;
        }

        // Collect every message's lines in append order
        let mut all_lines: Vec<Line> = Vec::new();
        for message in self.store.messages() {
            let mut lines = self.render_message(message, inner_area.width);
            all_lines.append(&mut lines);
            // spacing between messages
            all_lines.push(Line::from(vec![Span::raw("")]));
        }

        if self.busy {
            all_lines.push(self.thinking_line());
        }

        // Show the tail: auto-scroll to the latest message
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let start = total.saturating_sub(height);
        let visible = &all_lines[start..];

        for (i, line) in visible.iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

fn content_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Blue),
        Role::Assistant => Style::default().fg(Color::Green),
    }
}

/// Wrap text to fit within the given width, honoring explicit line breaks.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();

    for raw_line in text.lines() {
        let mut current_line = String::new();

        for word in raw_line.split_whitespace() {
            if word.chars().count() > width {
                // hard-break words that cannot fit on any line (long URLs)
                if !current_line.is_empty() {
                    lines.push(std::mem::take(&mut current_line));
                }
                let chars: Vec<char> = word.chars().collect();
                for chunk in chars.chunks(width) {
                    if chunk.len() == width {
                        lines.push(chunk.iter().collect());
                    } else {
                        current_line = chunk.iter().collect();
                    }
                }
            } else if current_line.len() + word.len() + 1 <= width {
                if !current_line.is_empty() {
                    current_line.push(' ');
                }
                current_line.push_str(word);
            } else {
                if !current_line.is_empty() {
                    lines.push(current_line);
                    current_line = String::new();
                }
                current_line.push_str(word);
            }
        }

        if !current_line.is_empty() || raw_line.trim().is_empty() {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("one two three four five", 9);
        assert!(lines.iter().all(|l| l.len() <= 9));
        assert_eq!(lines.join(" "), "one two three four five");
    }

    #[test]
    fn wrap_honors_explicit_line_breaks() {
        let lines = wrap_text("first\nsecond", 40);
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn overlong_words_are_hard_broken() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn text_around_an_overlong_word_still_fits() {
        let lines = wrap_text("x abcdefgh y", 4);
        assert_eq!(lines, vec!["x", "abcd", "efgh", "y"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 4));
    }

    #[test]
    fn zero_width_passes_text_through() {
        assert_eq!(wrap_text("anything", 0), vec!["anything"]);
    }
}
