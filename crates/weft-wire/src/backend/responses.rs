//! OpenAI Responses API backend
//!
//! Speaks the streaming Responses protocol: named SSE events carrying text,
//! reasoning, and function-call fragments, with `previous_response_id` as the
//! continuation token and a native `/responses/compact` endpoint for
//! structural compaction.

use std::collections::HashMap;

use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::backend::{Backend, BackendProfile, SubmitRequest};
use crate::error::{Error, Result};
use crate::item::{Role, StoredItem};
use crate::stream::{WireEvent, WireEventStream};
use crate::types::Usage;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const PROVIDER: &str = "openai-responses";

/// Client for the OpenAI Responses API
pub struct ResponsesBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ResponsesBackend {
    /// Create a new backend with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Override the API base URL (proxies, compatible servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request(&self, request: &SubmitRequest) -> ResponsesRequest {
        let tools = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();

        ResponsesRequest {
            model: request.model.clone(),
            input: to_input_items(&request.input),
            instructions: request.instructions.clone(),
            tools,
            previous_response_id: request.continuation.clone(),
            max_output_tokens: request.max_output_tokens,
            stream: true,
            store: true,
        }
    }
}

#[async_trait::async_trait]
impl Backend for ResponsesBackend {
    fn profile(&self) -> BackendProfile {
        BackendProfile {
            provider: PROVIDER.to_string(),
            supports_continuation: true,
            supports_compaction: true,
        }
    }

    async fn submit(&self, request: SubmitRequest) -> Result<WireEventStream> {
        let body = self.build_request(&request);
        let url = format!("{}/responses", self.base_url);

        tracing::debug!("Responses API URL: {}", url);

        let request_builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(decode_stream(event_source)))
    }

    async fn compact(&self, items: &[StoredItem], model: &str) -> Result<Vec<StoredItem>> {
        let url = format!("{}/responses/compact", self.base_url);
        let body = json!({
            "model": model,
            "input": to_input_items(items),
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error_body(status.as_u16(), &text));
        }

        let compacted: CompactResponse = response.json().await?;
        Ok(from_output_items(compacted.output))
    }
}

fn decode_stream(mut event_source: EventSource) -> impl futures::Stream<Item = Result<WireEvent>> {
    stream! {
        let mut decoder = ResponseDecoder::default();

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    match decoder.decode(&msg.event, &msg.data) {
                        Ok(Some(wire_event)) => {
                            let terminal = wire_event.is_terminal();
                            yield Ok(wire_event);
                            if terminal {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(code, response)) => {
                    let text = response.text().await.unwrap_or_default();
                    yield Err(parse_error_body(code.as_u16(), &text));
                    return;
                }
                Err(e) => {
                    yield Err(Error::Sse(e.to_string()));
                    return;
                }
            }
        }
    }
}

/// Translates named Responses SSE events into wire events.
///
/// Function-call fragments arrive keyed by item id; the decoder assigns each
/// call a dense index so downstream accumulation stays positional.
#[derive(Debug, Default)]
struct ResponseDecoder {
    call_index: HashMap<String, usize>,
}

impl ResponseDecoder {
    fn decode(&mut self, event: &str, data: &str) -> Result<Option<WireEvent>> {
        match event {
            "response.created" => {
                let payload: ResponseEnvelope = serde_json::from_str(data)?;
                Ok(Some(WireEvent::Created {
                    response_id: payload.response.id.unwrap_or_default(),
                }))
            }
            "response.output_text.delta" => {
                let payload: DeltaPayload = serde_json::from_str(data)?;
                Ok(Some(WireEvent::TextDelta {
                    delta: payload.delta,
                }))
            }
            "response.reasoning_text.delta" | "response.reasoning_summary_text.delta" => {
                let payload: DeltaPayload = serde_json::from_str(data)?;
                Ok(Some(WireEvent::ReasoningDelta {
                    delta: payload.delta,
                }))
            }
            "response.reasoning_text.done" | "response.reasoning_summary_text.done" => {
                Ok(Some(WireEvent::ReasoningEnd))
            }
            "response.output_item.added" => {
                let payload: ItemEnvelope = serde_json::from_str(data)?;
                Ok(self.begin_item(payload.item))
            }
            "response.function_call_arguments.delta" => {
                let payload: ArgumentsPayload = serde_json::from_str(data)?;
                let index = self.index_for(&payload.item_id);
                Ok(Some(WireEvent::ToolCallDelta {
                    index,
                    call_id: None,
                    name: None,
                    arguments: Some(payload.delta),
                }))
            }
            "response.output_item.done" => {
                let payload: ItemEnvelope = serde_json::from_str(data)?;
                Ok(self.finish_item(payload.item))
            }
            "response.completed" => {
                let payload: ResponseEnvelope = serde_json::from_str(data)?;
                Ok(Some(WireEvent::Completed {
                    usage: convert_usage(payload.response.usage.unwrap_or_default()),
                }))
            }
            "response.incomplete" => {
                let payload: ResponseEnvelope = serde_json::from_str(data)?;
                let reason = payload
                    .response
                    .incomplete_details
                    .map(|d| d.reason)
                    .unwrap_or_else(|| "unknown".to_string());
                Ok(Some(WireEvent::Incomplete { reason }))
            }
            "response.failed" => {
                let payload: ResponseEnvelope = serde_json::from_str(data)?;
                let error = payload.response.error.unwrap_or_default();
                Err(Error::api(
                    error.code.unwrap_or_else(|| "response_failed".into()),
                    error.message.unwrap_or_else(|| "response failed".into()),
                ))
            }
            "error" => {
                let payload: ApiError = serde_json::from_str(data)?;
                Err(Error::api(
                    payload.code.unwrap_or_else(|| "error".into()),
                    payload.message.unwrap_or_default(),
                ))
            }
            // Lifecycle noise and event kinds this version does not render
            _ => Ok(None),
        }
    }

    fn begin_item(&mut self, item: OutputItem) -> Option<WireEvent> {
        if item.kind != "function_call" {
            return None;
        }
        let index = self.index_for(item.id.as_deref().unwrap_or_default());
        Some(WireEvent::ToolCallDelta {
            index,
            call_id: item.call_id,
            name: item.name,
            arguments: None,
        })
    }

    fn finish_item(&mut self, item: OutputItem) -> Option<WireEvent> {
        if item.kind != "function_call" {
            return None;
        }
        let id = item.id.clone().unwrap_or_default();
        if self.call_index.contains_key(&id) {
            // Already announced; argument deltas carried the rest.
            return None;
        }
        // Some servers skip the added/delta events and send finished items
        // only, so surface the whole call at once.
        let index = self.index_for(&id);
        Some(WireEvent::ToolCallDelta {
            index,
            call_id: item.call_id,
            name: item.name,
            arguments: item.arguments,
        })
    }

    fn index_for(&mut self, item_id: &str) -> usize {
        if let Some(&index) = self.call_index.get(item_id) {
            return index;
        }
        let index = self.call_index.len();
        self.call_index.insert(item_id.to_string(), index);
        index
    }
}

fn convert_usage(usage: ResponseUsage) -> Usage {
    let cached = usage.input_tokens_details.cached_tokens;
    Usage {
        input: usage.input_tokens.saturating_sub(cached),
        output: usage.output_tokens,
        cache_read: cached,
        cache_write: 0,
        reasoning: usage.output_tokens_details.reasoning_tokens,
    }
}

/// Convert stored items to Responses input items. Reasoning never goes back
/// to the wire; message payloads and opaque items pass through verbatim.
fn to_input_items(items: &[StoredItem]) -> Vec<Value> {
    let mut input = Vec::with_capacity(items.len());
    for item in items {
        match item {
            StoredItem::Message {
                payload: Some(payload),
                ..
            } => input.push(payload.clone()),
            StoredItem::Message { role, text, .. } => {
                let content_type = match role {
                    Role::Assistant => "output_text",
                    _ => "input_text",
                };
                input.push(json!({
                    "type": "message",
                    "role": role.as_str(),
                    "content": [{"type": content_type, "text": text}],
                }));
            }
            StoredItem::ToolCall {
                call_id,
                name,
                arguments,
            } => input.push(json!({
                "type": "function_call",
                "call_id": call_id,
                "name": name,
                "arguments": arguments,
            })),
            StoredItem::ToolResult { call_id, output } => input.push(json!({
                "type": "function_call_output",
                "call_id": call_id,
                "output": output,
            })),
            StoredItem::Reasoning { .. } => {}
            StoredItem::Compaction { payload } => input.push(payload.clone()),
            StoredItem::Unknown { payload, .. } => input.push(payload.clone()),
        }
    }
    input
}

/// Convert compaction output items back into stored items
fn from_output_items(items: Vec<Value>) -> Vec<StoredItem> {
    items
        .into_iter()
        .map(|value| {
            let kind = value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default();
            match kind {
                "message" => {
                    let role = value
                        .get("role")
                        .and_then(Value::as_str)
                        .map(parse_role)
                        .unwrap_or(Role::User);
                    let text = collect_text(&value);
                    StoredItem::Message {
                        role,
                        text,
                        payload: None,
                    }
                }
                "compaction" => StoredItem::Compaction { payload: value },
                _ => StoredItem::Unknown {
                    kind: kind.to_string(),
                    payload: value,
                },
            }
        })
        .collect()
}

fn parse_role(role: &str) -> Role {
    match role {
        "assistant" => Role::Assistant,
        "system" => Role::System,
        "developer" => Role::Developer,
        _ => Role::User,
    }
}

fn collect_text(value: &Value) -> String {
    let Some(parts) = value.get("content").and_then(Value::as_array) else {
        return String::new();
    };
    parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

fn parse_error_body(code: u16, body: &str) -> Error {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        let error = envelope.error;
        match code {
            401 => return Error::InvalidApiKey,
            429 => return Error::RateLimited { retry_after: None },
            _ => {
                return Error::Api {
                    error_type: error
                        .kind
                        .or(error.code)
                        .unwrap_or_else(|| format!("http_{code}")),
                    message: error.message.unwrap_or_default(),
                };
            }
        }
    }
    Error::status(code, body)
}

// Request/response types

#[derive(Debug, Serialize)]
struct ResponsesRequest {
    model: String,
    input: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    stream: bool,
    store: bool,
}

#[derive(Debug, Deserialize)]
struct CompactResponse {
    #[serde(default)]
    output: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    response: ResponseBody,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseBody {
    id: Option<String>,
    usage: Option<ResponseUsage>,
    incomplete_details: Option<IncompleteDetails>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct IncompleteDetails {
    reason: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeltaPayload {
    delta: String,
}

#[derive(Debug, Deserialize)]
struct ArgumentsPayload {
    item_id: String,
    delta: String,
}

#[derive(Debug, Deserialize)]
struct ItemEnvelope {
    item: OutputItem,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: String,
    id: Option<String>,
    call_id: Option<String>,
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
    #[serde(default)]
    input_tokens_details: InputTokensDetails,
    #[serde(default)]
    output_tokens_details: OutputTokensDetails,
}

#[derive(Debug, Default, Deserialize)]
struct InputTokensDetails {
    #[serde(default)]
    cached_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct OutputTokensDetails {
    #[serde(default)]
    reasoning_tokens: u32,
}
