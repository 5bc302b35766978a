//! One user submission and its streamed reply

use std::{pin::Pin, sync::Arc};

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use masry_ai::{
    Context, MessageEvent, Model,
    providers::{LlmProvider, google::GoogleProvider},
};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::message::Source;

/// Everything the provider needs for one reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub model: Model,
    pub context: Context,
}

/// Progress of an exchange as seen by the application state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeEvent {
    /// A piece of reply text, with sources when the provider sent some
    Fragment {
        text: String,
        sources: Option<Vec<Source>>,
    },
    /// The exchange failed; no further events follow
    Failed { message: String },
    /// The provider closed the reply normally
    Finished,
    /// The exchange was cancelled before it finished
    Cancelled,
}

impl ExchangeEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExchangeEvent::Fragment { .. })
    }
}

/// A stream of exchange events
pub type ExchangeEventStream = Pin<Box<dyn Stream<Item = ExchangeEvent> + Send>>;

/// Transport for running exchanges
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start one exchange, streaming its events
    async fn run(
        &self,
        request: ExchangeRequest,
        cancel: CancellationToken,
    ) -> masry_ai::Result<ExchangeEventStream>;
}

/// Direct provider transport - calls the Gemini API
#[derive(Debug, Clone, Default)]
pub struct ProviderTransport {
    api_key: Option<String>,
}

impl ProviderTransport {
    /// Look the key up in the environment on every exchange
    pub fn new() -> Self {
        Self { api_key: None }
    }

    /// Create with a specific API key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
        }
    }
}

#[async_trait]
impl Transport for ProviderTransport {
    async fn run(
        &self,
        request: ExchangeRequest,
        cancel: CancellationToken,
    ) -> masry_ai::Result<ExchangeEventStream> {
        let provider = match &self.api_key {
            Some(key) => GoogleProvider::new(key.clone()),
            None => GoogleProvider::from_env()?,
        };

        if cancel.is_cancelled() {
            return Err(masry_ai::Error::Aborted);
        }

        let mut messages = provider.stream(&request.model, &request.context).await?;

        Ok(Box::pin(stream! {
            while let Some(event) = messages.next().await {
                if cancel.is_cancelled() {
                    yield ExchangeEvent::Cancelled;
                    return;
                }

                match event {
                    MessageEvent::Start { model } => {
                        tracing::debug!(%model, "reply started");
                    }
                    MessageEvent::TextDelta { delta, citations } => {
                        let sources = if citations.is_empty() {
                            None
                        } else {
                            Some(citations.into_iter().map(Source::from).collect())
                        };
                        yield ExchangeEvent::Fragment { text: delta, sources };
                    }
                    MessageEvent::Done { stop_reason, usage } => {
                        tracing::debug!(?stop_reason, input = usage.input, output = usage.output, "reply finished");
                        yield ExchangeEvent::Finished;
                        return;
                    }
                    MessageEvent::Error { message } => {
                        yield ExchangeEvent::Failed { message };
                        return;
                    }
                }
            }
        }))
    }
}

/// Run one exchange to completion.
///
/// The returned stream always ends with exactly one terminal event, and
/// ends with [`ExchangeEvent::Cancelled`] soon after `cancel` fires.
pub fn drive(
    transport: Arc<dyn Transport>,
    request: ExchangeRequest,
    cancel: CancellationToken,
) -> ExchangeEventStream {
    Box::pin(stream! {
        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = transport.run(request, cancel.clone()) => Some(result),
        };

        let mut events = match started {
            None => {
                yield ExchangeEvent::Cancelled;
                return;
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "exchange could not start");
                yield ExchangeEvent::Failed { message: e.to_string() };
                return;
            }
            Some(Ok(events)) => events,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                event = events.next() => Some(event),
            };

            match next {
                None => {
                    yield ExchangeEvent::Cancelled;
                    return;
                }
                Some(None) => {
                    yield ExchangeEvent::Finished;
                    return;
                }
                Some(Some(event)) => {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        return;
                    }
                }
            }
        }
    })
}
