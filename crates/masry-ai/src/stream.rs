//! Streaming event types

use crate::types::{Citation, StopReason, Usage};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while a reply streams in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    /// The provider accepted the request
    Start { model: String },
    /// A fragment of reply text, with the citations known at that point
    TextDelta {
        delta: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        citations: Vec<Citation>,
    },
    /// Reply completed successfully
    Done { stop_reason: StopReason, usage: Usage },
    /// Error occurred; no further events follow
    Error { message: String },
}

/// A stream of message events
pub type MessageEventStream = Pin<Box<dyn Stream<Item = MessageEvent> + Send>>;
