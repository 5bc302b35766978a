//! masry-core: Conversation state for the Masry chat assistant
//!
//! This crate owns everything between the terminal front end and the provider:
//! the conversation store and its streaming accumulator, search, the
//! persistence port, and the exchange driver that turns a provider stream into
//! updates of the application state.

pub mod app;
pub mod attachment;
pub mod error;
pub mod exchange;
pub mod message;
pub mod persistence;
pub mod persona;
pub mod search;
pub mod store;

pub use app::{AppState, Applied, PendingExchange, ViewMode};
pub use attachment::{ImageAttachment, UserInput};
pub use error::{Error, Result};
pub use exchange::{ExchangeEvent, ExchangeRequest, ProviderTransport, Transport, drive};
pub use message::{Conversation, Message, Sender, Source};
pub use persistence::{FileStore, KeyValueStore, MemoryStore, Persistence, ThemeMode};
pub use search::{SearchHit, SearchOutcome, search};
pub use store::{ConversationStore, StreamTarget};
