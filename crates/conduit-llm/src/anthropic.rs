//! Anthropic Messages API: request assembly and streaming frame handling.

use std::collections::HashMap;

use conduit_core::error::{AppError, AppResult};
use conduit_core::types::{ContentPart, Message, MessageBody, MessageRole, StreamEvent, ToolCall, Usage};
use serde::Deserialize;
use serde_json::Value;

use crate::http_factory::HttpClientFactory;
use crate::sse::SseEvent;

/// Convert one canonical message into Anthropic's wire shape. System
/// messages are dropped here — the system prompt travels in the request's
/// top-level `system` field, not the `messages` array.
#[must_use]
pub fn convert_message(message: &Message) -> Value {
    let role = match message.role {
        MessageRole::Assistant => "assistant",
        MessageRole::User | MessageRole::Tool | MessageRole::System => "user",
    };

    match &message.content {
        MessageBody::Text(text) => serde_json::json!({ "role": role, "content": text }),
        MessageBody::Parts(parts) => {
            let content: Vec<Value> = parts.iter().map(convert_part).collect();
            serde_json::json!({ "role": role, "content": content })
        },
    }
}

fn convert_part(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => serde_json::json!({ "type": "text", "text": text }),
        ContentPart::Image { data, mime_type } => serde_json::json!({
            "type": "image",
            "source": { "type": "base64", "media_type": mime_type, "data": data },
        }),
        ContentPart::Document { data, mime_type } => serde_json::json!({
            "type": "document",
            "source": { "type": "base64", "media_type": mime_type, "data": data },
        }),
        ContentPart::ToolResult { call_id, output, .. } => serde_json::json!({
            "type": "tool_result",
            "tool_use_id": call_id,
            "content": output,
        }),
    }
}

/// Assemble the request body for a streaming Messages call.
///
/// `native_messages` is the already-converted (and, for continuation turns,
/// tool-result-appended) message array; `tools` are already in Anthropic's
/// `{name, description, input_schema}` declaration shape.
#[must_use]
pub fn build_request(
    model: &str,
    max_tokens: u32,
    native_messages: Vec<Value>,
    tools: &[Value],
    system: &str,
) -> Value {
    let mut system_text = HttpClientFactory::anthropic_preamble().to_string();
    if !system.is_empty() {
        system_text.push('\n');
        system_text.push_str(system);
    }

    let mut request = serde_json::json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": native_messages,
        "system": system_text,
        "stream": true,
    });

    if !tools.is_empty() {
        request["tools"] = Value::Array(tools.to_vec());
        request["tool_choice"] = serde_json::json!({ "type": "auto" });
    }

    request
}

/// Accumulator state for one Anthropic stream, keyed by content-block index.
#[derive(Debug, Default)]
pub struct AnthropicStreamState {
    tool_calls: HashMap<usize, PartialToolCall>,
}

#[derive(Debug, Clone, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments_json: String,
}

/// Fold one decoded Messages-streaming SSE frame into canonical events.
pub fn handle_frame(
    frame: &SseEvent,
    state: &mut AnthropicStreamState,
) -> AppResult<Vec<StreamEvent>> {
    let mut events = Vec::new();

    match frame.event_type.as_str() {
        "content_block_start" => {
            let payload: ContentBlockStartFrame = parse(&frame.data)?;
            if payload.content_block.block_type == "tool_use" {
                state.tool_calls.insert(
                    payload.index,
                    PartialToolCall {
                        id: payload.content_block.id.unwrap_or_default(),
                        name: payload.content_block.name.unwrap_or_default(),
                        arguments_json: String::new(),
                    },
                );
            }
        },
        "content_block_delta" => {
            let payload: ContentBlockDeltaFrame = parse(&frame.data)?;
            match payload.delta {
                Delta::TextDelta { text } => events.push(StreamEvent::content(text)),
                Delta::InputJsonDelta { partial_json } => {
                    if let Some(call) = state.tool_calls.get_mut(&payload.index) {
                        call.arguments_json.push_str(&partial_json);
                    }
                },
            }
        },
        "content_block_stop" => {
            let payload: ContentBlockStopFrame = parse(&frame.data)?;
            if let Some(call) = state.tool_calls.remove(&payload.index) {
                events.push(StreamEvent::function_call(vec![ToolCall {
                    id: call.id,
                    name: call.name,
                    arguments: call.arguments_json,
                }]));
            }
        },
        "message_delta" => {
            let payload: MessageDeltaFrame = parse(&frame.data)?;
            if let Some(usage) = payload.usage {
                let prompt = usage.input_tokens.unwrap_or(0);
                let completion = usage.output_tokens;
                events.push(StreamEvent::Usage {
                    usage: Usage {
                        prompt_tokens: prompt,
                        completion_tokens: completion,
                        total_tokens: prompt.saturating_add(completion),
                    },
                });
            }
        },
        "message_stop" => events.push(StreamEvent::Done),
        "error" => events.push(StreamEvent::Error {
            message: extract_error_message(&frame.data),
        }),
        _ => {},
    }

    Ok(events)
}

fn parse<T: serde::de::DeserializeOwned>(data: &str) -> AppResult<T> {
    serde_json::from_str(data)
        .map_err(|e| AppError::StreamFailure(format!("anthropic frame: {e}")))
}

fn extract_error_message(data: &str) -> String {
    serde_json::from_str::<Value>(data)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| data.to_string())
}

#[derive(Debug, Deserialize)]
struct ContentBlockStartFrame {
    index: usize,
    content_block: ContentBlockInfo,
}

#[derive(Debug, Deserialize)]
struct ContentBlockInfo {
    #[serde(rename = "type")]
    block_type: String,
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDeltaFrame {
    index: usize,
    delta: Delta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Deserialize)]
struct ContentBlockStopFrame {
    index: usize,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaFrame {
    usage: Option<MessageDeltaUsage>,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaUsage {
    input_tokens: Option<u64>,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event_type: &str, data: &str) -> SseEvent {
        SseEvent {
            event_type: event_type.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn text_delta_emits_content() {
        let mut state = AnthropicStreamState::default();
        let events = handle_frame(
            &frame(
                "content_block_delta",
                r#"{"index":0,"delta":{"type":"text_delta","text":"ok"}}"#,
            ),
            &mut state,
        )
        .unwrap();
        assert_eq!(events, vec![StreamEvent::content("ok")]);
    }

    #[test]
    fn tool_use_round_trip_matches_scenario_s2() {
        let mut state = AnthropicStreamState::default();

        handle_frame(
            &frame(
                "content_block_start",
                r#"{"index":0,"content_block":{"type":"tool_use","id":"T1","name":"shell"}}"#,
            ),
            &mut state,
        )
        .unwrap();

        let deltas = handle_frame(
            &frame(
                "content_block_delta",
                r#"{"index":0,"delta":{"type":"input_json_delta","partial_json":"{\"command\":[\"ls\",\"-F\"]}"}}"#,
            ),
            &mut state,
        )
        .unwrap();
        assert!(deltas.is_empty());

        let events = handle_frame(&frame("content_block_stop", r#"{"index":0}"#), &mut state).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::FunctionCall { tool_calls } => {
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].id, "T1");
                assert_eq!(tool_calls[0].name, "shell");
                assert_eq!(tool_calls[0].arguments, r#"{"command":["ls","-F"]}"#);
            },
            other => panic!("expected FunctionCall, got {other:?}"),
        }
    }

    #[test]
    fn message_delta_usage_sums_prompt_and_completion() {
        let mut state = AnthropicStreamState::default();
        let events = handle_frame(
            &frame(
                "message_delta",
                r#"{"delta":{},"usage":{"input_tokens":10,"output_tokens":4}}"#,
            ),
            &mut state,
        )
        .unwrap();
        match &events[0] {
            StreamEvent::Usage { usage } => {
                assert_eq!(usage.prompt_tokens, 10);
                assert_eq!(usage.completion_tokens, 4);
                assert_eq!(usage.total_tokens, 14);
            },
            other => panic!("expected Usage, got {other:?}"),
        }
    }

    #[test]
    fn message_stop_emits_done() {
        let mut state = AnthropicStreamState::default();
        let events = handle_frame(&frame("message_stop", "{}"), &mut state).unwrap();
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn build_request_omits_tool_choice_when_no_tools() {
        let body = build_request("claude-opus-4", 4096, vec![], &[], "");
        assert!(body.get("tool_choice").is_none());
        assert!(body["system"].as_str().unwrap().contains("Claude Code"));
    }

    #[test]
    fn build_request_sets_tool_choice_auto_when_tools_present() {
        let tool = serde_json::json!({"name": "shell", "description": "", "input_schema": {}});
        let body = build_request("claude-opus-4", 4096, vec![], &[tool], "");
        assert_eq!(body["tool_choice"]["type"], "auto");
    }
}
