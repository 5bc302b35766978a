//! masry-ai: Streaming client for the Google Generative Language API
//!
//! This crate turns a conversation context into a request for the Gemini
//! `streamGenerateContent` endpoint and exposes the reply as a stream of
//! text deltas with grounding citations.

pub mod error;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::{MessageEvent, MessageEventStream};
pub use types::*;
