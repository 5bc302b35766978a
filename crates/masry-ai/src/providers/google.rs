//! Google Generative AI (Gemini) API provider

use super::{LlmProvider, get_api_key};
use crate::{
    error::{Error, Result},
    stream::{MessageEvent, MessageEventStream},
    types::{Citation, Content, Context, Message, Model, StopReason, Tool, Usage},
};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

/// Environment variables consulted for the API key, in order
pub const API_KEY_ENV_VARS: &[&str] = &["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Header carrying the API key, so it never appears in a URL
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Generative AI client
pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
}

impl GoogleProvider {
    /// Create a new Google provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Create from environment variable
    pub fn from_env() -> Result<Self> {
        get_api_key(None, API_KEY_ENV_VARS).map(Self::new)
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    async fn stream(&self, model: &Model, context: &Context) -> Result<MessageEventStream> {
        let request = build_request(model, context);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            model.base_url, model.id
        );

        tracing::debug!(
            model = %model.id,
            turns = request.contents.len(),
            "sending streamGenerateContent request"
        );

        let request_builder = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source, model.id.clone())))
    }
}

fn build_request(model: &Model, context: &Context) -> GeminiRequest {
    let contents = context.messages.iter().filter_map(convert_message).collect();

    let system_instruction = context.system_prompt.as_ref().map(|prompt| GeminiContent {
        role: None,
        parts: vec![GeminiPart::Text {
            text: prompt.clone(),
        }],
    });

    let tools = if context.tools.is_empty() {
        None
    } else {
        Some(
            context
                .tools
                .iter()
                .map(|tool| match tool {
                    Tool::GoogleSearch => GeminiTool {
                        google_search: Some(GeminiGoogleSearch {}),
                    },
                })
                .collect(),
        )
    };

    GeminiRequest {
        contents,
        system_instruction,
        tools,
        generation_config: model.max_tokens.map(|max| GeminiGenerationConfig {
            max_output_tokens: Some(max),
        }),
    }
}

fn convert_message(msg: &Message) -> Option<GeminiContent> {
    let (role, content) = match msg {
        Message::User { content } => ("user", content),
        Message::Assistant { content } => ("model", content),
    };

    let mut parts = Vec::new();

    // Gemini reads inline images before the question that refers to them
    if matches!(msg, Message::User { .. }) {
        for c in content {
            if let Content::Image { data, mime_type } = c {
                parts.push(GeminiPart::InlineData {
                    inline_data: GeminiBlob {
                        mime_type: mime_type.clone(),
                        data: data.clone(),
                    },
                });
            }
        }
    }

    let text = msg.text();
    if !text.is_empty() {
        parts.push(GeminiPart::Text { text });
    }

    if parts.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: Some(role.to_string()),
            parts,
        })
    }
}

/// Result of parsing one SSE data chunk
#[derive(Debug, PartialEq, Eq)]
enum ChunkOutcome {
    Delta(MessageEvent),
    Nothing,
    Failed(String),
}

/// Incremental state across the chunks of one reply
#[derive(Debug, Default)]
struct ChunkParser {
    pending_citations: Vec<Citation>,
    finish_reason: Option<String>,
    usage: Usage,
}

impl ChunkParser {
    fn parse(&mut self, data: &str) -> ChunkOutcome {
        let response = match serde_json::from_str::<GeminiStreamResponse>(data) {
            Ok(response) => response,
            Err(e) => {
                if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(data) {
                    return ChunkOutcome::Failed(error_response.error.message);
                }
                return ChunkOutcome::Failed(format!("Failed to parse chunk: {}", e));
            }
        };

        if let Some(error) = response.error {
            return ChunkOutcome::Failed(error.message);
        }

        if let Some(usage) = response.usage_metadata {
            self.usage = Usage {
                input: usage.prompt_token_count.unwrap_or(0),
                output: usage.candidates_token_count.unwrap_or(0),
            };
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            return ChunkOutcome::Nothing;
        };

        if candidate.finish_reason.is_some() {
            self.finish_reason = candidate.finish_reason;
        }

        let citations: Vec<Citation> = candidate
            .grounding_metadata
            .map(|meta| {
                meta.grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .map(|web| Citation {
                        uri: web.uri.unwrap_or_default(),
                        title: web.title.unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let delta: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if delta.is_empty() {
            if !citations.is_empty() {
                self.pending_citations = citations;
            }
            return ChunkOutcome::Nothing;
        }

        let citations = if citations.is_empty() {
            std::mem::take(&mut self.pending_citations)
        } else {
            self.pending_citations.clear();
            citations
        };

        ChunkOutcome::Delta(MessageEvent::TextDelta { delta, citations })
    }

    fn finish(self) -> MessageEvent {
        let stop_reason = match self.finish_reason.as_deref() {
            Some("MAX_TOKENS") => StopReason::Length,
            Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT") => {
                StopReason::Safety
            }
            Some("OTHER") | Some("MALFORMED_FUNCTION_CALL") => StopReason::Error,
            _ => StopReason::Stop,
        };
        MessageEvent::Done {
            stop_reason,
            usage: self.usage,
        }
    }
}

async fn describe_sse_error(error: reqwest_eventsource::Error) -> String {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<GeminiErrorResponse>(&body) {
                Ok(parsed) => Error::api(status.to_string(), parsed.error.message).to_string(),
                Err(_) => Error::UnexpectedResponse(format!("HTTP {}: {}", status, body)).to_string(),
            }
        }
        reqwest_eventsource::Error::Transport(e) => {
            Error::Sse(e.without_url().to_string()).to_string()
        }
        other => Error::Sse(other.to_string()).to_string(),
    }
}

fn create_stream(
    mut event_source: EventSource,
    model_id: String,
) -> impl futures::Stream<Item = MessageEvent> {
    stream! {
        let mut parser = ChunkParser::default();

        yield MessageEvent::Start { model: model_id };

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data.is_empty() || msg.data == "[DONE]" {
                        continue;
                    }

                    match parser.parse(&msg.data) {
                        ChunkOutcome::Delta(event) => yield event,
                        ChunkOutcome::Nothing => {}
                        ChunkOutcome::Failed(message) => {
                            event_source.close();
                            tracing::warn!(%message, "gemini stream reported an error");
                            yield MessageEvent::Error { message };
                            return;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    event_source.close();
                    let message = describe_sse_error(e).await;
                    tracing::warn!(%message, "gemini stream failed");
                    yield MessageEvent::Error { message };
                    return;
                }
            }
        }

        event_source.close();
        yield parser.finish();
    }
}

// Request types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<GeminiGoogleSearch>,
}

#[derive(Debug, Serialize)]
struct GeminiGoogleSearch {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

// Response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GeminiGroundingChunk {
    web: Option<GeminiWebSource>,
}

#[derive(Debug, Deserialize)]
struct GeminiWebSource {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
