//! C6 ToolRegistry translation (§4.6): turn a provider-neutral tool
//! description into each vendor's declaration wire format, and turn a tool
//! result back into a provider-specific continuation message.

use conduit_core::types::{ContentPart, Message};
use serde_json::{Value, json};

/// A provider-neutral tool description, whether it comes from a built-in
/// ([`crate::BuiltinTool`]) or an MCP server's discovered tool list.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Tool name, possibly `<server_id>__<tool>` namespaced (§4.8).
    pub name: String,
    /// Human-readable description for the model.
    pub description: String,
    /// JSON schema for the tool's input.
    pub input_schema: Value,
}

/// Build an OpenAI Responses API `tools` array entry (§4.6, §6.3).
#[must_use]
pub fn openai_declaration(tool: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "name": tool.name,
        "description": tool.description,
        "parameters": tool.input_schema,
    })
}

/// Build an Anthropic Messages API `tools` array entry (§4.6, §6.3).
#[must_use]
pub fn anthropic_declaration(tool: &ToolSpec) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

/// Build a Gemini `functionDeclarations` entry (§4.6, §6.3).
#[must_use]
pub fn gemini_declaration(tool: &ToolSpec) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "parametersJsonSchema": tool.input_schema,
    })
}

/// Full per-provider request fragment for a set of tools. `None` when
/// `tools` is empty — no `tools`/`tool_choice` field should be emitted at
/// all (§8 boundary behavior: `tools=[]` ⇒ no `tool_choice` field).
#[must_use]
pub fn declare_for_provider(provider: &str, tools: &[ToolSpec]) -> Option<Value> {
    if tools.is_empty() {
        return None;
    }
    match provider {
        "openai" => Some(json!({
            "tools": tools.iter().map(openai_declaration).collect::<Vec<_>>(),
        })),
        "anthropic" => Some(json!({
            "tools": tools.iter().map(anthropic_declaration).collect::<Vec<_>>(),
            "tool_choice": {"type": "auto"},
        })),
        "gemini" => Some(json!({
            "tools": [{
                "functionDeclarations": tools.iter().map(gemini_declaration).collect::<Vec<_>>(),
            }],
        })),
        _ => None,
    }
}

/// Turn one tool's dispatch result into a continuation message.
///
/// Carries the result as a provider-neutral [`ContentPart::ToolResult`] —
/// each provider's `convert_part` (in `conduit-llm`) renders it in that
/// wire format's native tool-result shape rather than this crate
/// pre-encoding provider-specific JSON. `provider` only distinguishes a
/// recognized provider (which gets a structured tool result part) from an
/// unrecognized one (which falls back to plain text, e.g. for a
/// provider-less dry run).
#[must_use]
pub fn tool_result_message(provider: &str, call_id: &str, name: &str, output: &str) -> Message {
    match provider {
        "openai" | "anthropic" | "gemini" => Message::user_parts(vec![ContentPart::ToolResult {
            call_id: call_id.to_string(),
            name: name.to_string(),
            output: output.to_string(),
        }]),
        _ => Message::user(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ToolSpec {
        ToolSpec {
            name: "shell".into(),
            description: "run a shell command".into(),
            input_schema: json!({"type": "object"}),
        }
    }

    #[test]
    fn openai_shape() {
        let decl = openai_declaration(&spec());
        assert_eq!(decl["type"], "function");
        assert_eq!(decl["name"], "shell");
    }

    #[test]
    fn anthropic_shape() {
        let decl = anthropic_declaration(&spec());
        assert_eq!(decl["input_schema"]["type"], "object");
        assert!(decl.get("type").is_none());
    }

    #[test]
    fn gemini_shape() {
        let decl = gemini_declaration(&spec());
        assert_eq!(decl["parametersJsonSchema"]["type"], "object");
    }

    #[test]
    fn empty_tools_emit_no_tool_choice_field() {
        assert!(declare_for_provider("anthropic", &[]).is_none());
    }

    #[test]
    fn anthropic_non_empty_sets_tool_choice_auto() {
        let decl = declare_for_provider("anthropic", &[spec()]).unwrap();
        assert_eq!(decl["tool_choice"]["type"], "auto");
    }

    #[test]
    fn tool_result_messages_carry_the_call_id() {
        let msg = tool_result_message("anthropic", "T1", "shell", "README.md\n");
        match &msg.content {
            conduit_core::types::MessageBody::Parts(parts) => match &parts[0] {
                ContentPart::ToolResult { call_id, output, .. } => {
                    assert_eq!(call_id, "T1");
                    assert!(output.contains("README.md"));
                }
                other => panic!("expected a tool result part, got {other:?}"),
            },
            other => panic!("expected a multi-part message, got {other:?}"),
        }
    }

    #[test]
    fn recognized_providers_all_carry_a_structured_tool_result() {
        for provider in ["openai", "anthropic", "gemini"] {
            let msg = tool_result_message(provider, "T2", "shell", "ok");
            assert!(matches!(
                msg.content,
                conduit_core::types::MessageBody::Parts(_)
            ));
        }
    }

    #[test]
    fn unknown_provider_falls_back_to_plain_user_text() {
        let msg = tool_result_message("mystery", "T3", "shell", "ok");
        assert_eq!(msg.role, conduit_core::types::MessageRole::User);
        assert_eq!(msg.text(), Some("ok"));
    }
}
