//! Error types for masry-core

use thiserror::Error;

/// Result type alias using masry-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the application state
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the provider layer
    #[error(transparent)]
    Ai(#[from] masry_ai::Error),

    /// A message was addressed to a conversation that does not exist
    #[error("Unknown conversation: {0}")]
    UnknownConversation(String),

    /// Login attempted with a blank display name
    #[error("Display name must not be empty")]
    EmptyName,

    /// Submission with neither text nor an image
    #[error("Nothing to send: type a message or attach an image")]
    EmptyInput,

    /// A second submission while a reply is still streaming
    #[error("A reply is still streaming")]
    ExchangeInFlight,

    /// Submission before a user has logged in
    #[error("Not logged in")]
    NotLoggedIn,

    /// The attached file is not an image
    #[error("Not an image: {path} ({mime})")]
    NotAnImage { path: String, mime: String },

    /// Filesystem error (attachments, state file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error in persisted state
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_is_transparent() {
        let err: Error = masry_ai::Error::InvalidApiKey.into();
        assert_eq!(err.to_string(), "Invalid or missing API key");
    }

    #[test]
    fn test_unknown_conversation_display() {
        let err = Error::UnknownConversation("conv-x".into());
        assert_eq!(err.to_string(), "Unknown conversation: conv-x");
    }
}
