//! Custom widgets for the TUI

pub mod conversation_list;
pub mod input_box;
pub mod login;
pub mod message_list;
pub mod search_panel;
pub mod spinner;

pub use conversation_list::{ConversationItem, ConversationList, ConversationListState};
pub use input_box::InputBox;
pub use login::LoginScreen;
pub use message_list::{ChatMessage, MessageList, SourceLink, Speaker};
pub use search_panel::{SearchPanel, SearchResultItem, SearchView};
pub use spinner::Spinner;
