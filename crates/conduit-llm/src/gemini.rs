//! Gemini `generateContentStream`: request assembly and streaming frame
//! handling.
//!
//! Unlike OpenAI and Anthropic, Gemini has no stable server-assigned call id
//! for `functionCall` parts — `allocate_local_id` mints one locally so the
//! rest of the pipeline (dispatch, continuation) can treat all three
//! providers uniformly.

use std::sync::atomic::{AtomicU64, Ordering};

use conduit_core::error::{AppError, AppResult};
use conduit_core::types::{ContentPart, Message, MessageBody, MessageRole, StreamEvent, ToolCall, Usage};
use serde::Deserialize;
use serde_json::Value;

use crate::sse::SseEvent;

/// Convert one canonical message into a Gemini `Content` object.
#[must_use]
pub fn convert_message(message: &Message) -> Value {
    let role = match message.role {
        MessageRole::Assistant => "model",
        MessageRole::User | MessageRole::Tool | MessageRole::System => "user",
    };

    let parts: Vec<Value> = match &message.content {
        MessageBody::Text(text) => vec![serde_json::json!({ "text": text })],
        MessageBody::Parts(parts) => parts.iter().map(convert_part).collect(),
    };

    serde_json::json!({ "role": role, "parts": parts })
}

fn convert_part(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => serde_json::json!({ "text": text }),
        ContentPart::Image { data, mime_type } => serde_json::json!({
            "inlineData": { "mimeType": mime_type, "data": data },
        }),
        ContentPart::Document { data, mime_type } => serde_json::json!({
            "inlineData": { "mimeType": mime_type, "data": data },
        }),
        ContentPart::ToolResult { call_id, name, output } => serde_json::json!({
            "functionResponse": {
                "id": call_id,
                "name": name,
                "response": { "output": output },
            },
        }),
    }
}

/// Assemble the request body for a `generateContentStream` call.
#[must_use]
pub fn build_request(native_contents: Vec<Value>, tools: &[Value], system: &str) -> Value {
    let mut request = serde_json::json!({ "contents": native_contents });

    if !system.is_empty() {
        request["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system }] });
    }

    if !tools.is_empty() {
        request["tools"] = serde_json::json!([{ "functionDeclarations": tools }]);
    }

    request
}

static LOCAL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Mint a locally-unique call id for a `functionCall` part lacking one on
/// the wire. Monotonic within the process; never reused.
fn allocate_local_id() -> String {
    format!("gemini-call-{}", LOCAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Gemini handlers are stateless across frames: each candidate carries its
/// own complete `content.parts`, so no cross-frame accumulator is needed.
#[derive(Debug, Default)]
pub struct GeminiStreamState;

/// Fold one decoded `generateContentStream` frame into canonical events.
///
/// Tie-break: when a single frame yields both text and a function call, text
/// is emitted first.
pub fn handle_frame(frame: &SseEvent, _state: &mut GeminiStreamState) -> AppResult<Vec<StreamEvent>> {
    let response: GenerateContentResponse = serde_json::from_str(&frame.data)
        .map_err(|e| AppError::StreamFailure(format!("gemini frame: {e}")))?;

    let mut events = Vec::new();
    let mut is_final = false;

    if let Some(candidate) = response.candidates.first() {
        let mut tool_calls = Vec::new();
        for part in &candidate.content.parts {
            if let Some(text) = &part.text {
                events.push(StreamEvent::content(text.clone()));
            }
            if let Some(call) = &part.function_call {
                tool_calls.push(ToolCall {
                    id: allocate_local_id(),
                    name: call.name.clone(),
                    arguments: serde_json::to_string(&call.args).unwrap_or_default(),
                });
            }
        }
        if !tool_calls.is_empty() {
            events.push(StreamEvent::function_call(tool_calls));
        }
        is_final = candidate.finish_reason.is_some();
    }

    if let Some(usage) = response.usage_metadata {
        events.push(StreamEvent::Usage {
            usage: Usage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            },
        });
    }

    if is_final {
        events.push(StreamEvent::Done);
    }

    Ok(events)
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    args: Value,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: u64,
    #[serde(rename = "totalTokenCount")]
    total_token_count: u64,
}
