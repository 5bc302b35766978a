//! Name prompt shown until the user logs in

use crate::theme::Theme;
use crate::widgets::input_box::InputBox;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

/// Width of the welcome card
pub const CARD_WIDTH: u16 = 52;
const CARD_HEIGHT: u16 = 11;

/// Centered welcome card wrapping the name input
pub struct LoginScreen<'a> {
    input: &'a InputBox,
    theme: &'a Theme,
    assistant_name: &'a str,
    error: Option<&'a str>,
}

impl<'a> LoginScreen<'a> {
    pub fn new(input: &'a InputBox, theme: &'a Theme) -> Self {
        Self {
            input,
            theme,
            assistant_name: "Assistant",
            error: None,
        }
    }

    pub fn assistant_name(mut self, name: &'a str) -> Self {
        self.assistant_name = name;
        self
    }

    pub fn error(mut self, error: Option<&'a str>) -> Self {
        self.error = error;
        self
    }

    /// Area of the card within `area`
    pub fn card_area(area: Rect) -> Rect {
        let [row] = Layout::vertical([Constraint::Length(CARD_HEIGHT.min(area.height))])
            .flex(Flex::Center)
            .areas(area);
        let [card] = Layout::horizontal([Constraint::Length(CARD_WIDTH.min(area.width))])
            .flex(Flex::Center)
            .areas(row);
        card
    }

    pub fn render(self, area: Rect, buf: &mut Buffer) {
        let card = Self::card_area(area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style());
        let inner = block.inner(card);
        block.render(card, buf);

        let [heading, hint, _, input, status] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .areas(inner);

        Paragraph::new(Line::from(Span::styled(
            format!("Welcome to {}", self.assistant_name),
            self.theme.accent_bold(),
        )))
        .alignment(Alignment::Center)
        .render(heading, buf);

        Paragraph::new(Line::from(Span::styled(
            "Enter your name to start chatting",
            self.theme.dim_style(),
        )))
        .alignment(Alignment::Center)
        .render(hint, buf);

        self.input.render(input, buf, self.theme);

        if let Some(error) = self.error {
            Paragraph::new(Line::from(Span::styled(error.to_string(), self.theme.error_style())))
                .alignment(Alignment::Center)
                .render(status, buf);
        }
    }
}
