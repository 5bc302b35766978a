//! Linear search over every message of every conversation

use crate::message::{Conversation, Message};

/// One matching message with the conversation it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit<'a> {
    pub conversation_id: &'a str,
    pub conversation_title: &'a str,
    pub message: &'a Message,
}

/// What the search view should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome<'a> {
    /// No query yet: ask the user to type one
    Prompt,
    /// Matches in conversation-then-message order; may be empty
    Results(Vec<SearchHit<'a>>),
}

impl<'a> SearchOutcome<'a> {
    pub fn hits(&self) -> &[SearchHit<'a>] {
        match self {
            SearchOutcome::Prompt => &[],
            SearchOutcome::Results(hits) => hits,
        }
    }
}

/// Case-insensitive substring search
pub fn search<'a>(conversations: &'a [Conversation], query: &str) -> SearchOutcome<'a> {
    if query.is_empty() {
        return SearchOutcome::Prompt;
    }

    let needle = query.to_lowercase();
    let hits = conversations
        .iter()
        .flat_map(|conversation| {
            conversation
                .messages
                .iter()
                .filter(|message| message.text.to_lowercase().contains(&needle))
                .map(move |message| SearchHit {
                    conversation_id: &conversation.id,
                    conversation_title: &conversation.title,
                    message,
                })
        })
        .collect();

    SearchOutcome::Results(hits)
}
