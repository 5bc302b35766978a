//! Single-line text editor used for the composer, the search box and the
//! login prompt

use crate::input::Action;
use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthChar;

/// Editable line of text with a character-indexed cursor
#[derive(Debug, Default, Clone)]
pub struct InputBox {
    content: String,
    /// Cursor position in characters
    cursor: usize,
    /// Horizontal scroll offset in display columns
    scroll: usize,
    placeholder: String,
    title: String,
    focused: bool,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.cursor = self.char_count();
        self.scroll = 0;
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
        self.scroll = 0;
    }

    /// Return the content and leave the box empty
    pub fn take(&mut self) -> String {
        let content = std::mem::take(&mut self.content);
        self.clear();
        content
    }

    /// Apply an editing action. Returns true if the content or cursor changed.
    pub fn handle_action(&mut self, action: &Action, width: u16) -> bool {
        let changed = match action {
            Action::Char(c) => {
                self.insert(*c);
                true
            }
            Action::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.remove_at_cursor();
                true
            }
            Action::Delete if self.cursor < self.char_count() => {
                self.remove_at_cursor();
                true
            }
            Action::Left if self.cursor > 0 => {
                self.cursor -= 1;
                true
            }
            Action::Right if self.cursor < self.char_count() => {
                self.cursor += 1;
                true
            }
            Action::Home => {
                self.cursor = 0;
                true
            }
            Action::End => {
                self.cursor = self.char_count();
                true
            }
            Action::ClearLine => {
                self.clear();
                true
            }
            Action::DeleteWord => self.delete_word(),
            Action::Paste(text) => {
                for c in text.chars() {
                    if c == '\n' || c == '\r' {
                        // single line: newlines collapse into one space
                        if self.cursor > 0 && !self.content.ends_with(' ') {
                            self.insert(' ');
                        }
                    } else {
                        self.insert(c);
                    }
                }
                true
            }
            _ => false,
        };

        if changed {
            self.update_scroll(width as usize);
        }
        changed
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn insert(&mut self, c: char) {
        let at = self.byte_offset(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    fn remove_at_cursor(&mut self) {
        let at = self.byte_offset(self.cursor);
        if at < self.content.len() {
            self.content.remove(at);
        }
    }

    fn delete_word(&mut self) -> bool {
        let chars: Vec<char> = self.content.chars().collect();
        let mut start = self.cursor;
        while start > 0 && chars[start - 1] == ' ' {
            start -= 1;
        }
        while start > 0 && chars[start - 1] != ' ' {
            start -= 1;
        }
        if start == self.cursor {
            return false;
        }
        let range = self.byte_offset(start)..self.byte_offset(self.cursor);
        self.content.drain(range);
        self.cursor = start;
        true
    }

    /// Display columns occupied by the text before the cursor
    fn cursor_column(&self) -> usize {
        self.content
            .chars()
            .take(self.cursor)
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }

    fn update_scroll(&mut self, width: usize) {
        // borders plus one column for the cursor
        let visible = width.saturating_sub(3).max(1);
        let column = self.cursor_column();
        if column < self.scroll {
            self.scroll = column;
        } else if column >= self.scroll + visible {
            self.scroll = column + 1 - visible;
        }
    }

    fn visible_text(&self, width: usize) -> String {
        let mut skipped = 0;
        let mut used = 0;
        let mut visible = String::new();
        for c in self.content.chars() {
            let w = c.width().unwrap_or(0);
            if skipped < self.scroll {
                skipped += w;
                continue;
            }
            if used + w > width {
                break;
            }
            visible.push(c);
            used += w;
        }
        visible
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(if self.focused {
                theme.accent_style()
            } else {
                theme.border_style()
            });
        if !self.title.is_empty() {
            block = block.title(Line::from(Span::styled(
                format!(" {} ", self.title),
                theme.dim_style(),
            )));
        }

        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let (text, style) = if self.content.is_empty() {
            (self.placeholder.clone(), theme.dim_style())
        } else {
            (self.visible_text(inner.width as usize), theme.base_style())
        };
        Paragraph::new(text).style(style).render(inner, buf);

        if self.focused {
            let column = self.cursor_column().saturating_sub(self.scroll);
            if column < inner.width as usize {
                if let Some(cell) = buf.cell_mut((inner.x + column as u16, inner.y)) {
                    cell.set_style(Style::default().bg(theme.accent));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> InputBox {
        let mut input = InputBox::new();
        for c in text.chars() {
            input.handle_action(&Action::Char(c), 40);
        }
        input
    }

    #[test]
    fn test_editing_multibyte_text() {
        let mut input = typed("مرحبا");
        input.handle_action(&Action::Backspace, 40);
        assert_eq!(input.content(), "مرحب");

        input.handle_action(&Action::Home, 40);
        input.handle_action(&Action::Delete, 40);
        assert_eq!(input.content(), "رحب");
    }

    #[test]
    fn test_delete_word() {
        let mut input = typed("hello big world  ");
        assert!(input.handle_action(&Action::DeleteWord, 40));
        assert_eq!(input.content(), "hello big ");
        input.handle_action(&Action::DeleteWord, 40);
        input.handle_action(&Action::DeleteWord, 40);
        assert!(input.is_empty());
        assert!(!input.handle_action(&Action::DeleteWord, 40));
    }

    #[test]
    fn test_paste_flattens_newlines() {
        let mut input = InputBox::new();
        input.handle_action(&Action::Paste("one\r\ntwo\n".into()), 40);
        assert_eq!(input.content(), "one two ");
    }

    #[test]
    fn test_take_empties_box() {
        let mut input = typed("question");
        assert_eq!(input.take(), "question");
        assert!(input.is_empty());
        assert!(!input.handle_action(&Action::Backspace, 40));
    }

    #[test]
    fn test_scroll_keeps_cursor_visible() {
        let mut input = InputBox::new();
        for _ in 0..30 {
            input.handle_action(&Action::Char('x'), 13);
        }
        // 10 visible columns
        assert_eq!(input.scroll, 21);
        assert_eq!(input.visible_text(10).len(), 9);
        input.handle_action(&Action::Home, 13);
        assert_eq!(input.scroll, 0);
    }
}
