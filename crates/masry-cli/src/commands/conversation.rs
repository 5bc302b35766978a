//! /list, /open and /delete - browse and manage saved conversations

use super::CommandResult;
use crate::utils::{format_date, truncate_chars};
use masry_core::{AppState, Conversation, KeyValueStore};

pub struct ConversationCommand;

impl ConversationCommand {
    /// Numbered list of conversations, newest first
    pub fn list<S: KeyValueStore>(state: &AppState<S>) -> CommandResult {
        let active = state.active_id();
        let mut output = String::from("Conversations:\n");
        for (i, conversation) in state.conversations().iter().enumerate() {
            let marker = if conversation.id == active { "*" } else { " " };
            output.push_str(&format!(
                "{} {:>2}. {}  ({}, {} messages)\n",
                marker,
                i + 1,
                truncate_chars(&conversation.title, 40),
                format_date(conversation.created_at),
                conversation.messages.len()
            ));
        }
        output.push_str("\nOpen with: /open <number>");
        CommandResult::Message(output)
    }

    pub fn open<S: KeyValueStore>(args: &str, state: &mut AppState<S>) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message("Usage: /open <number|id>".to_string());
        }
        let Some(id) = resolve(args, state.conversations()) else {
            return CommandResult::Message(format!("No conversation matching '{}'", args));
        };
        state.select_conversation(&id);
        CommandResult::Message(format!("Opened: {}", state.active_conversation().title))
    }

    /// Delete the given conversation, or the active one when no argument is given
    pub fn delete<S: KeyValueStore>(args: &str, state: &mut AppState<S>) -> CommandResult {
        let id = if args.is_empty() {
            Some(state.active_id().to_string())
        } else {
            resolve(args, state.conversations())
        };
        let Some(id) = id else {
            return CommandResult::Message(format!("No conversation matching '{}'", args));
        };

        let title = state
            .conversations()
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.title.clone())
            .unwrap_or_default();
        if state.delete_conversation(&id) {
            CommandResult::Message(format!("Deleted: {}", title))
        } else {
            CommandResult::Message(format!("No conversation matching '{}'", args))
        }
    }
}

/// Resolve a 1-based list position or a conversation id
fn resolve(arg: &str, conversations: &[Conversation]) -> Option<String> {
    if let Ok(n) = arg.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| conversations.get(i))
            .map(|c| c.id.clone());
    }
    conversations
        .iter()
        .find(|c| c.id == arg)
        .map(|c| c.id.clone())
}
