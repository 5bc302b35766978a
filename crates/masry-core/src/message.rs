//! Conversation and message records as they are shown and persisted

use masry_ai::Citation;
use serde::{Deserialize, Serialize};

/// Title shown until the first user message names the conversation
pub const PLACEHOLDER_TITLE: &str = "New conversation";

/// Number of characters of the first user message used as the title
pub const TITLE_LENGTH: usize = 30;

/// Id prefix of the reply recorded for a failed exchange
const ERROR_ID_PREFIX: &str = "msg-error-";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// A web source attached to an assistant reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

impl From<Citation> for Source {
    fn from(c: Citation) -> Self {
        Self {
            uri: c.uri,
            title: c.title,
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Attached image as a `data:` URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Message {
    /// A user message with a fresh id
    pub fn user(text: impl Into<String>, image: Option<String>) -> Self {
        Self {
            id: new_message_id(),
            text: text.into(),
            sender: Sender::User,
            sources: None,
            image,
        }
    }

    /// An assistant message with the given id
    pub fn assistant(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            sender: Sender::Assistant,
            sources: None,
            image: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// Whether this is the reply recorded for a failed exchange
    pub fn is_failure_notice(&self) -> bool {
        self.sender == Sender::Assistant && self.id.starts_with(ERROR_ID_PREFIX)
    }

    /// Mime type of the attached image, if any
    pub fn image_mime(&self) -> Option<&str> {
        let image = self.image.as_deref()?;
        let meta = image.split_once(',').map(|(meta, _)| meta)?;
        meta.strip_prefix("data:")
            .and_then(|rest| rest.strip_suffix(";base64"))
            .filter(|m| !m.is_empty())
    }
}

/// A named, ordered thread of messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    /// Creation time in epoch milliseconds
    #[serde(default)]
    pub created_at: i64,
}

impl Conversation {
    /// An empty conversation with the placeholder title
    pub fn new() -> Self {
        Self {
            id: new_conversation_id(),
            title: PLACEHOLDER_TITLE.to_string(),
            messages: Vec::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(Message::is_user)
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Leading characters of `text` used as a conversation title
pub fn derive_title(text: &str) -> String {
    text.chars().take(TITLE_LENGTH).collect()
}

pub fn new_conversation_id() -> String {
    format!("conv-{}", uuid::Uuid::new_v4())
}

pub fn new_message_id() -> String {
    format!("msg-{}", uuid::Uuid::new_v4())
}

pub fn new_assistant_message_id() -> String {
    format!("msg-assistant-{}", uuid::Uuid::new_v4())
}

pub fn new_error_message_id() -> String {
    format!("{}{}", ERROR_ID_PREFIX, uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_counts_chars_not_bytes() {
        let text = "مرحبا كيف حالك اليوم يا صديقي العزيز";
        let title = derive_title(text);
        assert_eq!(title.chars().count(), 30);
        assert!(text.starts_with(&title));
    }

    #[test]
    fn test_derive_title_short_text() {
        assert_eq!(derive_title("Hi"), "Hi");
    }

    #[test]
    fn test_failure_notice_is_recognised_by_id() {
        assert!(Message::assistant(new_error_message_id(), "sorry").is_failure_notice());
        assert!(!Message::assistant(new_assistant_message_id(), "hi").is_failure_notice());
    }

    #[test]
    fn test_message_json_omits_absent_fields() {
        let msg = Message::assistant("msg-1", "hello");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"id": "msg-1", "text": "hello", "sender": "assistant"})
        );
    }

    #[test]
    fn test_conversation_reads_data_without_timestamp() {
        let raw = r#"{"id":"a","title":"t","messages":[{"id":"m","text":"x","sender":"user"}]}"#;
        let conv: Conversation = serde_json::from_str(raw).unwrap();
        assert_eq!(conv.created_at, 0);
        assert_eq!(conv.messages[0].sender, Sender::User);
    }

    #[test]
    fn test_image_mime() {
        let msg = Message::user("look", Some("data:image/png;base64,AAAA".into()));
        assert_eq!(msg.image_mime(), Some("image/png"));
        assert_eq!(Message::user("x", None).image_mime(), None);
    }

    #[test]
    fn test_ids_are_prefixed_and_unique() {
        let a = new_conversation_id();
        let b = new_conversation_id();
        assert!(a.starts_with("conv-"));
        assert_ne!(a, b);
        assert!(new_assistant_message_id().starts_with("msg-assistant-"));
        assert!(new_error_message_id().starts_with("msg-error-"));
    }
}
