//! Search results view shown in place of the transcript

use crate::theme::Theme;
use crate::widgets::message_list::Speaker;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

/// One matching message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResultItem {
    pub conversation_title: String,
    pub speaker: Speaker,
    pub text: String,
}

/// What the panel has to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchView {
    /// Empty query
    Prompt,
    Results {
        query: String,
        items: Vec<SearchResultItem>,
    },
}

/// Lines of message text kept per result
const RESULT_TEXT_LINES: usize = 3;

pub struct SearchPanel<'a> {
    view: &'a SearchView,
    theme: &'a Theme,
    selected: Option<usize>,
}

impl<'a> SearchPanel<'a> {
    pub fn new(view: &'a SearchView, theme: &'a Theme) -> Self {
        Self {
            view,
            theme,
            selected: None,
        }
    }

    /// Highlight one result
    pub fn selected(mut self, selected: Option<usize>) -> Self {
        self.selected = selected;
        self
    }

    pub fn lines(&self, width: usize) -> Vec<Line<'static>> {
        let (query, items) = match self.view {
            SearchView::Prompt => {
                return vec![
                    Line::from(Span::styled(
                        "Search your past conversations",
                        self.theme.accent_bold(),
                    )),
                    Line::from(Span::styled(
                        "Type in the search box to find what you are looking for.",
                        self.theme.dim_style(),
                    )),
                ];
            }
            SearchView::Results { query, items } => (query, items),
        };

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Results for: ", self.theme.base_style()),
                Span::styled(format!("\"{}\"", query), self.theme.accent_bold()),
            ]),
            Line::from(Span::styled(
                format!("Found {} result(s).", items.len()),
                self.theme.dim_style(),
            )),
            Line::from(""),
        ];

        if items.is_empty() {
            lines.push(Line::from(Span::styled(
                "No results for this search.",
                self.theme.warning_style(),
            )));
            lines.push(Line::from(Span::styled(
                "Try searching for another word.",
                self.theme.dim_style(),
            )));
            return lines;
        }

        let content_width = width.saturating_sub(4).max(1);
        for (i, item) in items.iter().enumerate() {
            let is_selected = self.selected == Some(i);
            let title_style = if is_selected {
                self.theme.selected_style().add_modifier(Modifier::BOLD)
            } else {
                self.theme.link_style().add_modifier(Modifier::BOLD)
            };
            lines.push(Line::from(vec![
                Span::styled(if is_selected { "▶ " } else { "  " }, self.theme.accent_style()),
                Span::styled(item.conversation_title.clone(), title_style),
            ]));

            let who = match item.speaker {
                Speaker::User => "You:",
                Speaker::Assistant => "Assistant:",
            };
            let flattened = item.text.split_whitespace().collect::<Vec<_>>().join(" ");
            let wrapped = textwrap::wrap(&flattened, content_width);
            for (n, part) in wrapped.iter().take(RESULT_TEXT_LINES).enumerate() {
                let mut text = part.to_string();
                if n + 1 == RESULT_TEXT_LINES && wrapped.len() > RESULT_TEXT_LINES {
                    text.push('…');
                }
                let mut spans = vec![Span::raw("    ")];
                if n == 0 {
                    spans.push(Span::styled(format!("{} ", who), self.theme.dim_style()));
                }
                spans.push(Span::styled(text, self.theme.base_style()));
                lines.push(Line::from(spans));
            }
            lines.push(Line::from(""));
        }
        lines
    }
}

impl Widget for SearchPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Search ")
            .title_style(self.theme.dim_style())
            .borders(Borders::ALL)
            .border_style(self.theme.border_style());
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let lines = self.lines(inner.width as usize);
        // keep the selected result on screen
        let skip = match self.selected {
            Some(selected) => {
                let header = 3;
                let before: usize = header + selected * (RESULT_TEXT_LINES + 2);
                before.saturating_sub(inner.height as usize / 2)
            }
            None => 0,
        };
        let visible: Vec<Line> = lines.into_iter().skip(skip).collect();
        Paragraph::new(visible).render(inner, buf);
    }
}
