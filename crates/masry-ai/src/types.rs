//! Core types for generative API requests

use serde::{Deserialize, Serialize};

/// Default Gemini model used by the assistant
pub const DEFAULT_MODEL_ID: &str = "gemini-2.5-flash";

/// Base URL of the Generative Language API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Mime type assumed for inline images whose data URI carries none
pub const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

/// Model definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier (e.g., "gemini-2.5-flash")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Base URL for API calls
    pub base_url: String,
    /// Maximum output tokens requested per reply
    pub max_tokens: Option<u32>,
}

impl Model {
    /// Build a model entry for the default endpoint
    pub fn gemini(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: None,
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::gemini(DEFAULT_MODEL_ID)
    }
}

/// Content blocks inside a conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Text content
    Text { text: String },
    /// Image content (base64 encoded)
    Image { data: String, mime_type: String },
}

impl Content {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create image content from base64 data
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URI into image content.
    ///
    /// Returns `None` when the URI has no payload after the comma.
    pub fn image_from_data_uri(uri: &str) -> Option<Self> {
        let (meta, data) = uri.split_once(',')?;
        if data.is_empty() {
            return None;
        }
        let mime_type = meta
            .strip_prefix("data:")
            .and_then(|rest| rest.strip_suffix(";base64"))
            .filter(|mime| !mime.is_empty())
            .unwrap_or(FALLBACK_IMAGE_MIME);
        Some(Self::image(data, mime_type))
    }

    /// Get text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A role-tagged conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// User turn (text and inline images)
    User { content: Vec<Content> },
    /// Assistant turn (text only)
    Assistant { content: Vec<Content> },
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: vec![Content::text(text)],
        }
    }

    /// Create an assistant message with text content
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: vec![Content::text(text)],
        }
    }

    /// Get the role as a string
    pub fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
        }
    }

    /// Get the content blocks
    pub fn content(&self) -> &[Content] {
        match self {
            Self::User { content } | Self::Assistant { content } => content,
        }
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.content()
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Built-in tools the provider can use while answering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Web search grounding
    GoogleSearch,
}

/// A web source the reply was grounded on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: String,
}

/// Context for a generation request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    /// System instruction
    pub system_prompt: Option<String>,
    /// Conversation turns, oldest first
    pub messages: Vec<Message>,
    /// Enabled tools
    pub tools: Vec<Tool>,
}

impl Context {
    /// Create a new context with a system instruction
    pub fn with_system(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            messages: vec![],
            tools: vec![],
        }
    }

    /// Add a message to the context
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Enable a tool
    pub fn add_tool(&mut self, tool: Tool) {
        if !self.tools.contains(&tool) {
            self.tools.push(tool);
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
}

/// Reason why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of response
    Stop,
    /// Maximum tokens reached
    Length,
    /// Blocked by safety or recitation filters
    Safety,
    /// Ended by the model for an unspecified reason
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_with_mime() {
        let content = Content::image_from_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(content, Content::image("iVBORw0KGgo=", "image/png"));
    }

    #[test]
    fn test_data_uri_without_mime_falls_back_to_jpeg() {
        let content = Content::image_from_data_uri("data:;base64,AAAA").unwrap();
        assert_eq!(content, Content::image("AAAA", "image/jpeg"));

        let content = Content::image_from_data_uri("garbage,AAAA").unwrap();
        assert_eq!(content, Content::image("AAAA", "image/jpeg"));
    }

    #[test]
    fn test_data_uri_without_payload() {
        assert!(Content::image_from_data_uri("data:image/png;base64").is_none());
        assert!(Content::image_from_data_uri("data:image/png;base64,").is_none());
    }

    #[test]
    fn test_message_text_skips_images() {
        let msg = Message::User {
            content: vec![
                Content::image("AAAA", "image/png"),
                Content::text("what is "),
                Content::text("this?"),
            ],
        };
        assert_eq!(msg.text(), "what is this?");
        assert_eq!(msg.role(), "user");
    }

    #[test]
    fn test_context_tools_deduplicated() {
        let mut ctx = Context::with_system("be nice");
        ctx.add_tool(Tool::GoogleSearch);
        ctx.add_tool(Tool::GoogleSearch);
        assert_eq!(ctx.tools, vec![Tool::GoogleSearch]);
    }
}
