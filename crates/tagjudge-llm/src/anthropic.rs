//! Anthropic Claude API provider. Streams over SSE and accumulates the text.

use crate::provider::{retry_after_ms, LlmError, LlmProvider, LlmResult};
use crate::types::{LlmRequest, StreamDelta};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 2048;

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn models(&self) -> &[&str] {
        &["claude-haiku-4-5", "claude-sonnet-4", "claude-opus-4"]
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<String> {
        let body = build_body(&request);

        debug!("Anthropic request: model={}", body.model);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let retry_after = retry_after_ms(response.headers());
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic error {}: {}", status, error_text);
            return Err(LlmError::from_status(status.as_u16(), error_text, retry_after));
        }

        let stream = parse_sse_stream(response.bytes_stream());
        collect_text(stream).await
    }
}

/// System turns become the top-level `system` field; the rest stay in order.
fn build_body(request: &LlmRequest) -> AnthropicRequest {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect();

    AnthropicRequest {
        model: request.model.clone(),
        messages: request
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| AnthropicMessage {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect(),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        stream: true,
        system: if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        },
        temperature: request.temperature,
    }
}

async fn collect_text(
    stream: impl futures::Stream<Item = LlmResult<StreamDelta>> + Send,
) -> LlmResult<String> {
    tokio::pin!(stream);
    let mut text = String::new();
    let mut done = false;

    while let Some(delta) = stream.next().await {
        match delta? {
            StreamDelta::Text(t) => text.push_str(&t),
            StreamDelta::Done { stop_reason } => {
                debug!("Message complete: stop_reason={:?}", stop_reason);
                done = true;
                break;
            }
        }
    }

    if !done {
        return Err(LlmError::StreamError("stream ended before message_stop".into()));
    }
    Ok(text)
}

fn parse_sse_stream(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> impl futures::Stream<Item = LlmResult<StreamDelta>> + Send {
    async_stream::stream! {
        // Raw bytes, so a character split across chunks is decoded whole.
        let mut buffer: Vec<u8> = Vec::new();
        let mut stop_reason: Option<String> = None;

        tokio::pin!(bytes_stream);

        while let Some(chunk_result) = bytes_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    return;
                }
            };

            buffer.extend_from_slice(&chunk);

            while let Some(event_end) = find_event_end(&buffer) {
                let event_bytes: Vec<u8> = buffer.drain(..event_end + 2).collect();
                let event_str = String::from_utf8_lossy(&event_bytes[..event_end]);

                let (event_type, event_data) = parse_event(&event_str);
                if event_data.is_empty() { continue; }

                match event_type.as_str() {
                    "content_block_delta" => {
                        if let Ok(data) = serde_json::from_str::<ContentBlockDelta>(&event_data) {
                            if let DeltaType::TextDelta { text } = data.delta {
                                yield Ok(StreamDelta::Text(text));
                            }
                        }
                    }
                    "message_delta" => {
                        if let Ok(data) = serde_json::from_str::<MessageDelta>(&event_data) {
                            stop_reason = data.delta.stop_reason;
                        }
                    }
                    "message_stop" => {
                        yield Ok(StreamDelta::Done { stop_reason: stop_reason.take() });
                    }
                    "error" => {
                        if let Ok(data) = serde_json::from_str::<ErrorEvent>(&event_data) {
                            let err = if data.error.error_type == "overloaded_error" {
                                LlmError::ServerError { status: 529, body: data.error.message }
                            } else {
                                LlmError::StreamError(data.error.message)
                            };
                            yield Err(err);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Offset of the blank line that ends the next complete event.
fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_event(event_str: &str) -> (String, String) {
    let mut event_type = String::new();
    let mut event_data = String::new();
    for line in event_str.lines() {
        if let Some(rest) = line.strip_prefix("event: ") {
            event_type = rest.to_string();
        } else if let Some(rest) = line.strip_prefix("data: ") {
            event_data = rest.to_string();
        }
    }
    (event_type, event_data)
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    #[allow(dead_code)]
    index: u32,
    delta: DeltaType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaType {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaContent,
}

#[derive(Deserialize)]
struct MessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
