//! Sidebar listing conversations, newest first

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, HighlightSpacing, List, ListItem, ListState, StatefulWidget},
};

/// One row of the sidebar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationItem {
    pub title: String,
    /// Creation date, already formatted
    pub date: String,
    pub is_active: bool,
}

/// Keyboard selection within the sidebar
#[derive(Debug, Default, Clone)]
pub struct ConversationListState {
    /// Currently selected index
    pub selected: usize,
}

impl ConversationListState {
    /// Move selection up, wrapping to the bottom
    pub fn up(&mut self, item_count: usize) {
        if item_count == 0 {
            return;
        }
        self.selected = if self.selected > 0 {
            self.selected - 1
        } else {
            item_count - 1
        };
    }

    /// Move selection down, wrapping to the top
    pub fn down(&mut self, item_count: usize) {
        if item_count == 0 {
            return;
        }
        self.selected = if self.selected + 1 < item_count {
            self.selected + 1
        } else {
            0
        };
    }

    /// Keep the selection inside a list of `item_count` rows
    pub fn clamp(&mut self, item_count: usize) {
        self.selected = self.selected.min(item_count.saturating_sub(1));
    }
}

pub struct ConversationList<'a> {
    items: &'a [ConversationItem],
    theme: &'a Theme,
    focused: bool,
}

impl<'a> ConversationList<'a> {
    pub fn new(items: &'a [ConversationItem], theme: &'a Theme) -> Self {
        Self {
            items,
            theme,
            focused: false,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    fn build_item(&self, item: &ConversationItem, width: usize) -> ListItem<'static> {
        let marker = if item.is_active { "● " } else { "  " };
        let title_style = if item.is_active {
            self.theme.accent_bold()
        } else {
            self.theme.base_style()
        };
        let title = truncate(&item.title, width.saturating_sub(4));

        ListItem::new(vec![
            Line::from(vec![
                Span::styled(marker, self.theme.accent_style()),
                Span::styled(title, title_style),
            ]),
            Line::from(Span::styled(format!("  {}", item.date), self.theme.dim_style())),
        ])
    }
}

impl StatefulWidget for ConversationList<'_> {
    type State = ConversationListState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let block = Block::default()
            .title(" Conversations ")
            .title_style(if self.focused {
                self.theme.accent_bold()
            } else {
                self.theme.dim_style()
            })
            .borders(Borders::ALL)
            .border_style(if self.focused {
                self.theme.accent_style()
            } else {
                self.theme.border_style()
            });

        let inner_width = block.inner(area).width as usize;
        let items: Vec<ListItem> = self
            .items
            .iter()
            .map(|item| self.build_item(item, inner_width))
            .collect();

        let mut list = List::new(items)
            .block(block)
            .highlight_spacing(HighlightSpacing::Never);
        if self.focused {
            list = list.highlight_style(self.theme.selected_style());
        }

        state.clamp(self.items.len());
        let mut list_state = ListState::default();
        if !self.items.is_empty() {
            list_state.select(Some(state.selected));
        }
        StatefulWidget::render(list, area, buf, &mut list_state);
    }
}

/// Cut `text` to `max` characters, marking the cut with an ellipsis
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
