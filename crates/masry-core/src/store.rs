//! In-memory ordered collection of conversations

use crate::error::{Error, Result};
use crate::message::{Conversation, Message, Sender, Source, derive_title};

/// Identifies the assistant message an exchange is streaming into
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub conversation_id: String,
    pub message_id: String,
}

/// Conversations ordered most-recently-created first, with one active.
///
/// The list is never empty and the active id always names a member.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active_id: String,
}

impl ConversationStore {
    /// A store holding one fresh conversation
    pub fn new() -> Self {
        let conversation = Conversation::new();
        Self {
            active_id: conversation.id.clone(),
            conversations: vec![conversation],
        }
    }

    /// Restore a persisted list; the first element becomes active
    pub fn from_conversations(conversations: Vec<Conversation>) -> Self {
        match conversations.first() {
            Some(first) => Self {
                active_id: first.id.clone(),
                conversations,
            },
            None => Self::new(),
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active(&self) -> &Conversation {
        self.get(&self.active_id)
            .unwrap_or(&self.conversations[0])
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::UnknownConversation(id.to_string()))
    }

    /// Insert a fresh conversation at the head and make it active
    pub fn create(&mut self) -> &Conversation {
        let conversation = Conversation::new();
        tracing::debug!(id = %conversation.id, "created conversation");
        self.active_id = conversation.id.clone();
        self.conversations.insert(0, conversation);
        &self.conversations[0]
    }

    /// Make `id` active. Unknown ids are ignored.
    pub fn select(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            tracing::debug!(id, "ignoring select of unknown conversation");
            return false;
        }
        self.active_id = id.to_string();
        true
    }

    /// Remove `id`. Unknown ids are ignored.
    ///
    /// Deleting the active conversation activates the new head, or a fresh
    /// conversation when none remain.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(index) = self.conversations.iter().position(|c| c.id == id) else {
            tracing::debug!(id, "ignoring delete of unknown conversation");
            return false;
        };
        self.conversations.remove(index);

        if self.conversations.is_empty() {
            self.create();
        } else if self.active_id == id {
            self.active_id = self.conversations[0].id.clone();
        }
        true
    }

    /// Append a finished message.
    ///
    /// The first user message of a conversation names it; the title is not
    /// touched afterwards.
    pub fn append_message(&mut self, conversation_id: &str, message: Message) -> Result<()> {
        let conversation = self.get_mut(conversation_id)?;

        if message.sender == Sender::User && !conversation.has_user_message() {
            let title = derive_title(&message.text);
            if !title.trim().is_empty() {
                conversation.title = title;
            }
        }

        conversation.messages.push(message);
        Ok(())
    }

    /// Feed one streamed fragment into the assistant message named by `target`.
    ///
    /// The message is created on the first fragment. `sources`, when given,
    /// replace the ones already attached.
    pub fn append_or_start_assistant_stream(
        &mut self,
        target: &StreamTarget,
        chunk: &str,
        sources: Option<Vec<Source>>,
    ) -> Result<()> {
        let conversation = self.get_mut(&target.conversation_id)?;

        let existing = conversation
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.id == target.message_id && m.sender == Sender::Assistant);

        match existing {
            Some(message) => {
                message.text.push_str(chunk);
                if sources.is_some() {
                    message.sources = sources;
                }
            }
            None => {
                let mut message = Message::assistant(target.message_id.clone(), chunk);
                message.sources = sources;
                conversation.messages.push(message);
            }
        }
        Ok(())
    }

    /// Drop the message named by `target`, if present
    pub fn remove_message(&mut self, target: &StreamTarget) -> bool {
        let Ok(conversation) = self.get_mut(&target.conversation_id) else {
            return false;
        };
        let before = conversation.messages.len();
        conversation.messages.retain(|m| m.id != target.message_id);
        conversation.messages.len() != before
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{PLACEHOLDER_TITLE, new_assistant_message_id};

    fn assert_consistent(store: &ConversationStore) {
        assert!(!store.conversations().is_empty());
        assert!(store.get(store.active_id()).is_some());
    }

    fn target(store: &ConversationStore) -> StreamTarget {
        StreamTarget {
            conversation_id: store.active_id().to_string(),
            message_id: new_assistant_message_id(),
        }
    }

    #[test]
    fn test_new_store_has_one_active_placeholder() {
        let store = ConversationStore::new();
        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.active().title, PLACEHOLDER_TITLE);
        assert!(store.active().messages.is_empty());
        assert_consistent(&store);
    }

    #[test]
    fn test_create_prepends_and_activates() {
        let mut store = ConversationStore::new();
        let first = store.active_id().to_string();
        let created = store.create().id.clone();

        assert_eq!(store.active_id(), created);
        assert_eq!(store.conversations()[0].id, created);
        assert_eq!(store.conversations()[1].id, first);
    }

    #[test]
    fn test_from_conversations_activates_first() {
        let mut a = Conversation::new();
        a.id = "a".into();
        let mut b = Conversation::new();
        b.id = "b".into();

        let store = ConversationStore::from_conversations(vec![a, b]);
        assert_eq!(store.active_id(), "a");
        let ids: Vec<_> = store.conversations().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_from_empty_list_creates_fresh() {
        let store = ConversationStore::from_conversations(vec![]);
        assert_eq!(store.conversations().len(), 1);
        assert_consistent(&store);
    }

    #[test]
    fn test_select_unknown_is_noop() {
        let mut store = ConversationStore::new();
        let active = store.active_id().to_string();
        assert!(!store.select("nope"));
        assert_eq!(store.active_id(), active);
    }

    #[test]
    fn test_delete_only_conversation_creates_new() {
        let mut store = ConversationStore::new();
        let only = store.active_id().to_string();

        assert!(store.delete(&only));
        assert_eq!(store.conversations().len(), 1);
        assert_ne!(store.active_id(), only);
        assert!(store.active().messages.is_empty());
    }

    #[test]
    fn test_delete_active_selects_head() {
        let mut store = ConversationStore::new();
        let oldest = store.active_id().to_string();
        let middle = store.create().id.clone();
        let newest = store.create().id.clone();

        assert!(store.select(&middle));
        assert!(store.delete(&middle));
        assert_eq!(store.active_id(), newest);
        assert!(store.get(&oldest).is_some());
    }

    #[test]
    fn test_delete_inactive_keeps_active() {
        let mut store = ConversationStore::new();
        let oldest = store.active_id().to_string();
        let newest = store.create().id.clone();

        assert!(store.delete(&oldest));
        assert_eq!(store.active_id(), newest);
        assert!(!store.delete(&oldest));
    }

    #[test]
    fn test_create_delete_sequences_stay_consistent() {
        let mut store = ConversationStore::new();
        // deterministic mix of creates, deletes of head/tail/active and unknown ids
        for step in 0..60 {
            match step % 5 {
                0 | 3 => {
                    store.create();
                }
                1 => {
                    let id = store.active_id().to_string();
                    store.delete(&id);
                }
                2 => {
                    let id = store.conversations().last().map(|c| c.id.clone()).unwrap();
                    store.delete(&id);
                }
                _ => {
                    store.delete("missing");
                }
            }
            assert_consistent(&store);
        }
    }

    #[test]
    fn test_first_user_message_sets_title_once() {
        let mut store = ConversationStore::new();
        let id = store.active_id().to_string();
        let long = "This first question is definitely longer than thirty chars";

        store.append_message(&id, Message::user(long, None)).unwrap();
        assert_eq!(store.active().title, &long[..30]);

        store
            .append_message(&id, Message::user("A different second question", None))
            .unwrap();
        assert_eq!(store.active().title, &long[..30]);
    }

    #[test]
    fn test_image_only_first_message_keeps_placeholder() {
        let mut store = ConversationStore::new();
        let id = store.active_id().to_string();
        store
            .append_message(&id, Message::user("", Some("data:image/png;base64,AAAA".into())))
            .unwrap();
        assert_eq!(store.active().title, PLACEHOLDER_TITLE);
    }

    #[test]
    fn test_append_to_unknown_conversation_fails() {
        let mut store = ConversationStore::new();
        let err = store
            .append_message("ghost", Message::user("hi", None))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownConversation(id) if id == "ghost"));
        assert!(store.active().messages.is_empty());
    }

    #[test]
    fn test_stream_fragments_concatenate_into_one_message() {
        let mut store = ConversationStore::new();
        let target = target(&store);
        let fragments = ["The ", "answer ", "is ", "42."];

        for fragment in fragments {
            store
                .append_or_start_assistant_stream(&target, fragment, None)
                .unwrap();
        }

        let messages = &store.active().messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, target.message_id);
        assert_eq!(messages[0].sender, Sender::Assistant);
        assert_eq!(messages[0].text, fragments.concat());
    }

    #[test]
    fn test_stream_sources_replace_when_given() {
        let mut store = ConversationStore::new();
        let target = target(&store);
        let source = |t: &str| Source {
            uri: format!("https://{t}.example"),
            title: t.to_string(),
        };

        store
            .append_or_start_assistant_stream(&target, "a", Some(vec![source("one")]))
            .unwrap();
        store
            .append_or_start_assistant_stream(&target, "b", None)
            .unwrap();
        assert_eq!(store.active().messages[0].sources, Some(vec![source("one")]));

        store
            .append_or_start_assistant_stream(&target, "c", Some(vec![source("two")]))
            .unwrap();
        assert_eq!(store.active().messages[0].sources, Some(vec![source("two")]));
    }

    #[test]
    fn test_stream_finds_target_even_when_not_last() {
        let mut store = ConversationStore::new();
        let target = target(&store);
        let conv = target.conversation_id.clone();

        store
            .append_or_start_assistant_stream(&target, "part one", None)
            .unwrap();
        store
            .append_message(&conv, Message::assistant("msg-other", "interleaved"))
            .unwrap();
        store
            .append_or_start_assistant_stream(&target, ", part two", None)
            .unwrap();

        let messages = &store.active().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "part one, part two");
    }

    #[test]
    fn test_stream_into_other_conversation() {
        let mut store = ConversationStore::new();
        let target = target(&store);
        store.create();

        store
            .append_or_start_assistant_stream(&target, "late", None)
            .unwrap();
        assert!(store.active().messages.is_empty());
        assert_eq!(
            store.get(&target.conversation_id).unwrap().messages[0].text,
            "late"
        );
    }

    #[test]
    fn test_remove_message() {
        let mut store = ConversationStore::new();
        let target = target(&store);
        store
            .append_or_start_assistant_stream(&target, "partial", None)
            .unwrap();

        assert!(store.remove_message(&target));
        assert!(store.active().messages.is_empty());
        assert!(!store.remove_message(&target));
    }
}
