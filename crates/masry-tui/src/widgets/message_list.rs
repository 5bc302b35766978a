//! Message list widget for displaying the transcript of a conversation

use crate::theme::Theme;
use crate::widgets::spinner::frame_at;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

/// Who wrote a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

/// A web source listed under a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLink {
    pub title: String,
    pub uri: String,
}

/// A single message in the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub text: String,
    /// Mime type of an attached image
    pub image: Option<String>,
    pub sources: Vec<SourceLink>,
    /// Failure notice rather than a real reply
    pub is_error: bool,
    /// Reply still streaming in
    pub is_streaming: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            image: None,
            sources: Vec::new(),
            is_error: false,
            is_streaming: false,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            ..Self::user(text)
        }
    }

    pub fn with_image(mut self, mime: impl Into<String>) -> Self {
        self.image = Some(mime.into());
        self
    }

    pub fn with_sources(mut self, sources: Vec<SourceLink>) -> Self {
        self.sources = sources;
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.is_streaming = streaming;
        self
    }

    pub fn error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }
}

/// Widget for displaying a list of chat messages.
///
/// Scrolling counts lines up from the bottom, so new text stays in view
/// while the offset is zero.
pub struct MessageList<'a> {
    messages: &'a [ChatMessage],
    theme: &'a Theme,
    user_label: &'a str,
    assistant_label: &'a str,
    scroll_from_bottom: usize,
    frame: usize,
}

impl<'a> MessageList<'a> {
    pub fn new(messages: &'a [ChatMessage], theme: &'a Theme) -> Self {
        Self {
            messages,
            theme,
            user_label: "You",
            assistant_label: "Assistant",
            scroll_from_bottom: 0,
            frame: 0,
        }
    }

    /// Header names for the two speakers
    pub fn labels(mut self, user: &'a str, assistant: &'a str) -> Self {
        self.user_label = user;
        self.assistant_label = assistant;
        self
    }

    pub fn scroll(mut self, lines_from_bottom: usize) -> Self {
        self.scroll_from_bottom = lines_from_bottom;
        self
    }

    /// Animation frame for the typing indicator
    pub fn frame(mut self, frame: usize) -> Self {
        self.frame = frame;
        self
    }

    fn render_message(&self, msg: &ChatMessage, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let content_width = width.saturating_sub(2).max(1);

        let (label, style, prefix) = match msg.speaker {
            Speaker::User => (self.user_label, self.theme.accent_bold(), "▶ "),
            Speaker::Assistant if msg.is_error => (self.assistant_label, self.theme.error_style(), "◀ "),
            Speaker::Assistant => (self.assistant_label, self.theme.assistant_bold(), "◀ "),
        };
        let header = if msg.is_streaming {
            format!("{}{} ▌", prefix, label)
        } else {
            format!("{}{}", prefix, label)
        };
        lines.push(Line::from(Span::styled(header, style)));

        if let Some(mime) = &msg.image {
            lines.push(Line::from(Span::styled(
                format!("  [image: {}]", mime),
                self.theme.dim_style(),
            )));
        }

        if msg.text.is_empty() && msg.is_streaming {
            lines.push(Line::from(Span::styled(
                format!("  {} typing...", frame_at(self.frame)),
                self.theme.warning_style(),
            )));
        } else {
            let text_style = if msg.is_error {
                self.theme.error_style()
            } else {
                self.theme.base_style()
            };
            for paragraph in msg.text.lines() {
                if paragraph.is_empty() {
                    lines.push(Line::from(""));
                    continue;
                }
                for wrapped in textwrap::wrap(paragraph, content_width) {
                    lines.push(Line::from(Span::styled(format!("  {}", wrapped), text_style)));
                }
            }
        }

        if !msg.sources.is_empty() {
            lines.push(Line::from(Span::styled(
                "  Sources:",
                self.theme.dim_style().add_modifier(Modifier::BOLD),
            )));
            for (i, source) in msg.sources.iter().enumerate() {
                let title = if source.title.is_empty() {
                    &source.uri
                } else {
                    &source.title
                };
                lines.push(Line::from(vec![
                    Span::styled(format!("  {}. ", i + 1), self.theme.dim_style()),
                    Span::styled(title.clone(), self.theme.link_style()),
                ]));
                if !source.title.is_empty() {
                    for wrapped in textwrap::wrap(&source.uri, content_width.saturating_sub(3).max(1)) {
                        lines.push(Line::from(Span::styled(
                            format!("     {}", wrapped),
                            self.theme.dim_style(),
                        )));
                    }
                }
            }
        }

        lines.push(Line::from(""));
        lines
    }

    /// All transcript lines at `width`
    pub fn lines(&self, width: usize) -> Vec<Line<'static>> {
        self.messages
            .iter()
            .flat_map(|msg| self.render_message(msg, width))
            .collect()
    }
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let lines = self.lines(area.width as usize);
        let height = area.height as usize;
        let max_scroll = lines.len().saturating_sub(height);
        let from_bottom = self.scroll_from_bottom.min(max_scroll);
        let start = max_scroll - from_bottom;

        let visible: Vec<Line> = lines.into_iter().skip(start).take(height).collect();
        Paragraph::new(visible).render(area, buf);
    }
}

/// Number of lines the transcript occupies at `width`
pub fn message_height(messages: &[ChatMessage], width: usize) -> usize {
    let theme = Theme::dark();
    MessageList::new(messages, &theme).lines(width).len()
}
