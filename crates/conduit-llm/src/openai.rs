//! OpenAI Responses API: request assembly and streaming frame handling.

use std::collections::HashMap;

use conduit_core::error::{AppError, AppResult};
use conduit_core::types::{ContentPart, Message, MessageBody, MessageRole, StreamEvent, ToolCall, Usage};
use serde::Deserialize;
use serde_json::Value;

use crate::sse::SseEvent;

/// Convert one canonical message into zero or more Responses API `input`
/// items.
///
/// A `function_call_output` is a standalone top-level item in the Responses
/// API, not content nested under a `role`/`content` envelope — so a message
/// made entirely of [`ContentPart::ToolResult`] parts (the shape
/// `conduit-tools`' tool-result continuation messages always take) expands
/// to one flat item per tool result instead of one wrapped message.
#[must_use]
pub fn convert_message(message: &Message) -> Vec<Value> {
    let role = match message.role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
        MessageRole::Tool => "user",
    };

    match &message.content {
        MessageBody::Text(text) => vec![serde_json::json!({ "role": role, "content": text })],
        MessageBody::Parts(parts) if parts.iter().all(|p| matches!(p, ContentPart::ToolResult { .. })) => {
            parts.iter().map(convert_part).collect()
        },
        MessageBody::Parts(parts) => {
            let content: Vec<Value> = parts.iter().map(convert_part).collect();
            vec![serde_json::json!({ "role": role, "content": content })]
        },
    }
}

fn convert_part(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => serde_json::json!({ "type": "input_text", "text": text }),
        ContentPart::Image { data, mime_type } => serde_json::json!({
            "type": "input_image",
            "image_url": format!("data:{mime_type};base64,{data}"),
        }),
        ContentPart::Document { data, mime_type } => serde_json::json!({
            "type": "input_file",
            "file_data": format!("data:{mime_type};base64,{data}"),
        }),
        ContentPart::ToolResult { call_id, output, .. } => serde_json::json!({
            "type": "function_call_output",
            "call_id": call_id,
            "output": output,
        }),
    }
}

/// Assemble the request body for a streaming Responses API call.
#[must_use]
pub fn build_request(
    model: &str,
    native_messages: Vec<Value>,
    tools: &[Value],
    system: &str,
) -> Value {
    let mut request = serde_json::json!({
        "model": model,
        "input": native_messages,
        "stream": true,
    });

    if !system.is_empty() {
        request["instructions"] = Value::String(system.to_string());
    }

    if !tools.is_empty() {
        request["tools"] = Value::Array(tools.to_vec());
    }

    request
}

/// Accumulator state for one Responses API stream, keyed by `item_id`.
#[derive(Debug, Default)]
pub struct OpenAiStreamState {
    partial_calls: HashMap<String, PartialToolCall>,
}

#[derive(Debug, Clone, Default)]
struct PartialToolCall {
    arguments: String,
}

/// Fold one decoded Responses API SSE frame into canonical events.
pub fn handle_frame(frame: &SseEvent, state: &mut OpenAiStreamState) -> AppResult<Vec<StreamEvent>> {
    let mut events = Vec::new();

    match frame.event_type.as_str() {
        "response.output_text.delta" => {
            let payload: OutputTextDelta = parse(&frame.data)?;
            events.push(StreamEvent::content(payload.delta));
        },
        "response.function_call_arguments.delta" => {
            let payload: FunctionCallArgumentsDelta = parse(&frame.data)?;
            state
                .partial_calls
                .entry(payload.item_id)
                .or_default()
                .arguments
                .push_str(&payload.delta);
        },
        "response.output_item.done" => {
            let payload: OutputItemDone = parse(&frame.data)?;
            if payload.item.item_type == "function_call" {
                let accumulated = state.partial_calls.remove(&payload.item.id);
                let arguments = accumulated
                    .map(|c| c.arguments)
                    .filter(|a| !a.is_empty())
                    .or(payload.item.arguments)
                    .unwrap_or_default();
                events.push(StreamEvent::function_call(vec![ToolCall {
                    id: payload.item.call_id.unwrap_or(payload.item.id),
                    name: payload.item.name.unwrap_or_default(),
                    arguments,
                }]));
            }
        },
        "response.completed" => {
            let payload: ResponseCompleted = parse(&frame.data)?;
            if let Some(usage) = payload.response.usage {
                events.push(StreamEvent::Usage {
                    usage: Usage {
                        prompt_tokens: usage.input_tokens,
                        completion_tokens: usage.output_tokens,
                        total_tokens: usage.total_tokens,
                    },
                });
            }
            events.push(StreamEvent::Done);
        },
        "response.failed" => {
            let payload: ResponseFailed = parse(&frame.data)?;
            events.push(StreamEvent::Error {
                message: payload
                    .response
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "response failed".to_string()),
            });
        },
        "message" if frame.data.trim() == "[DONE]" => events.push(StreamEvent::Done),
        _ => {},
    }

    Ok(events)
}

fn parse<T: serde::de::DeserializeOwned>(data: &str) -> AppResult<T> {
    serde_json::from_str(data).map_err(|e| AppError::StreamFailure(format!("openai frame: {e}")))
}

#[derive(Debug, Deserialize)]
struct OutputTextDelta {
    delta: String,
}

#[derive(Debug, Deserialize)]
struct FunctionCallArgumentsDelta {
    item_id: String,
    delta: String,
}

#[derive(Debug, Deserialize)]
struct OutputItemDone {
    item: OutputItem,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    id: String,
    #[serde(rename = "type")]
    item_type: String,
    call_id: Option<String>,
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseCompleted {
    response: ResponseBody,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    input_tokens: u64,
    output_tokens: u64,
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ResponseFailed {
    response: ResponseError,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
