//! Slash commands shared by the line and TUI modes

mod conversation;

pub use conversation::ConversationCommand;

use masry_core::{AppState, ImageAttachment, KeyValueStore};

/// Result of executing a slash command
#[derive(Debug)]
pub enum CommandResult {
    /// Show a message to the user (not sent to the assistant)
    Message(String),
    /// The search query changed; results come from the state
    Search,
    /// Attach an image to the next message
    Attach(ImageAttachment),
    /// Drop the pending attachment
    Detach,
    /// The user name was forgotten
    LoggedOut,
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command against `state`.
///
/// Returns `None` when `input` is not a command.
pub fn execute_command<S: KeyValueStore>(
    input: &str,
    state: &mut AppState<S>,
) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (command, args) = match rest.split_once(char::is_whitespace) {
        Some((command, args)) => (command.to_lowercase(), args.trim()),
        None => (rest.to_lowercase(), ""),
    };

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "new" | "n" => {
            state.create_conversation();
            CommandResult::Message("Started a new conversation.".to_string())
        }

        "list" | "l" => ConversationCommand::list(state),

        "open" | "o" => ConversationCommand::open(args, state),

        "delete" | "d" => ConversationCommand::delete(args, state),

        "search" | "s" => {
            state.set_search_query(args);
            CommandResult::Search
        }

        "attach" | "a" => {
            if args.is_empty() {
                CommandResult::Message("Usage: /attach <path to image>".to_string())
            } else {
                match ImageAttachment::from_path(crate::config::expand_home(args)) {
                    Ok(image) => CommandResult::Attach(image),
                    Err(e) => CommandResult::Message(format!("Cannot attach: {}", e)),
                }
            }
        }

        "detach" => CommandResult::Detach,

        "theme" | "t" => {
            let theme = state.toggle_theme();
            CommandResult::Message(format!("Theme: {}", theme.as_str()))
        }

        "logout" => {
            state.logout();
            CommandResult::LoggedOut
        }

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?          Show this help message
  /new, /n               Start a new conversation
  /list, /l              List conversations
  /open, /o <n|id>       Open a conversation by number or id
  /delete, /d [n|id]     Delete a conversation (the current one by default)
  /search, /s <query>    Search all messages (empty query clears)
  /attach, /a <path>     Attach an image to your next message
  /detach                Remove the pending attachment
  /theme, /t             Toggle light/dark theme
  /logout                Forget your name
  /quit, /exit, /q       Exit masry"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use masry_core::{MemoryStore, Persistence, ThemeMode, ViewMode};

    fn state() -> AppState<MemoryStore> {
        let mut state = AppState::load(Persistence::new(MemoryStore::new()), ThemeMode::Dark);
        state.login("Mona").unwrap();
        state
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        let mut state = state();
        assert!(execute_command("hello", &mut state).is_none());
    }

    #[test]
    fn test_new_and_open() {
        let mut state = state();
        let first = state.active_id().to_string();
        execute_command("/new", &mut state);
        assert_eq!(state.conversations().len(), 2);
        assert_ne!(state.active_id(), first);

        execute_command("/open 2", &mut state);
        assert_eq!(state.active_id(), first);
    }

    #[test]
    fn test_delete_defaults_to_active() {
        let mut state = state();
        execute_command("/new", &mut state);
        let active = state.active_id().to_string();
        let result = execute_command("/delete", &mut state);
        assert!(matches!(result, Some(CommandResult::Message(m)) if m.starts_with("Deleted")));
        assert!(state.conversations().iter().all(|c| c.id != active));
    }

    #[test]
    fn test_open_unknown_reports() {
        let mut state = state();
        let result = execute_command("/open 9", &mut state);
        assert!(matches!(result, Some(CommandResult::Message(m)) if m.contains("No conversation")));
    }

    #[test]
    fn test_search_switches_view() {
        let mut state = state();
        assert!(matches!(
            execute_command("/search  pyramids ", &mut state),
            Some(CommandResult::Search)
        ));
        assert_eq!(state.view(), ViewMode::Search);
        assert_eq!(state.search_query(), "pyramids");

        execute_command("/search", &mut state);
        assert_eq!(state.view(), ViewMode::Chat);
    }

    #[test]
    fn test_theme_toggles() {
        let mut state = state();
        execute_command("/theme", &mut state);
        assert_eq!(state.theme(), ThemeMode::Light);
    }

    #[test]
    fn test_logout() {
        let mut state = state();
        assert!(matches!(
            execute_command("/logout", &mut state),
            Some(CommandResult::LoggedOut)
        ));
        assert!(!state.is_logged_in());
    }

    #[test]
    fn test_attach_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hi").unwrap();

        let mut state = state();
        let result = execute_command(&format!("/attach {}", path.display()), &mut state);
        assert!(matches!(result, Some(CommandResult::Message(m)) if m.starts_with("Cannot attach")));
    }

    #[test]
    fn test_attach_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let mut state = state();
        match execute_command(&format!("/attach {}", path.display()), &mut state) {
            Some(CommandResult::Attach(image)) => {
                assert_eq!(image.name, "cat.png");
                assert_eq!(image.mime_type, "image/png");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command() {
        let mut state = state();
        assert!(matches!(
            execute_command("/Frobnicate now", &mut state),
            Some(CommandResult::Unknown(c)) if c == "frobnicate"
        ));
    }
}
