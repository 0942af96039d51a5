//! C5 — `PromptStack` (§4.5): resolve the ordered, versioned system-prompt
//! set for a session + provider, then render it into the provider's native
//! prompt payload shape.
//!
//! The versioned-row/family-lineage pattern follows `supplied_context_items`
//! (§6.1) and this crate's existing storage idioms (see
//! `conduit-storage::conversation`'s row/public-type split).

use std::collections::HashMap;
use std::time::Instant;

use conduit_core::error::{AppError, AppResult};
use conduit_core::types::{PromptRenderFormat, Session, SystemPromptItem};
use conduit_telemetry::{EventName, TelemetryEvent, TelemetrySink};
use serde_json::Value;
use uuid::Uuid;

/// How a [`Stack`] was resolved — drives the `source` telemetry tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSource {
    /// The session pinned an explicit, ordered prompt list.
    Session,
    /// No pin; the provider's (or `shared`'s) defaults were used.
    Default,
}

impl StackSource {
    fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Default => "default",
        }
    }
}

/// One resolved entry: the immutable prompt revision plus any per-session
/// overrides to merge into its rendered payload.
#[derive(Debug, Clone)]
pub struct ResolvedPromptItem {
    /// The resolved revision.
    pub item: SystemPromptItem,
    /// Per-session overrides (may replace `segments`/`blocks`/`parts`).
    pub overrides: HashMap<String, Value>,
}

/// A resolved, ordered system-prompt stack, ready for [`PromptStack::render_for_provider`].
#[derive(Debug, Clone)]
pub struct Stack {
    /// The resolved items, in application order.
    pub items: Vec<ResolvedPromptItem>,
    /// How this stack was resolved.
    pub source: StackSource,
}

/// A rendered, provider-specific prompt payload (§4.5 Rendering).
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPayload {
    /// OpenAI: a list of `{type:"text", text}` segments.
    Text(Vec<Value>),
    /// Anthropic: a list of `{type:"text", text}` blocks.
    AnthropicBlocks(Vec<Value>),
    /// Gemini: `{role:"user", parts:[...]}`.
    GeminiParts(Value),
}

/// Storage seam `PromptStack` resolves prompt rows through — implemented by
/// `conduit-storage` in production, faked in tests. Kept as a trait so this
/// crate has no hard dependency on the storage engine (mirrors
/// `conduit_llm::router::CredentialSource`).
#[async_trait::async_trait]
pub trait PromptSource: Send + Sync {
    /// Fetch one revision by id.
    async fn get_item(&self, id: Uuid) -> AppResult<Option<SystemPromptItem>>;

    /// The default stack for `provider`: every `is_default=true` item where
    /// `provider ∈ {provider, "shared"}`, in stable position order.
    async fn defaults_for_provider(&self, provider: &str) -> AppResult<Vec<SystemPromptItem>>;
}

/// C5 `PromptStack` (§4.5).
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptStack;

impl PromptStack {
    /// §4.5 `resolve_for_session`.
    ///
    /// Emits `[:system_prompts, :resolved]` (§4.13) with `{prompt_count,
    /// overrides_count, missing_defaults, duration}` on every call.
    pub async fn resolve_for_session(
        session: &Session,
        provider: &str,
        source: &(impl PromptSource + ?Sized),
        telemetry: &(impl TelemetrySink + ?Sized),
    ) -> AppResult<Stack> {
        let start = Instant::now();

        let (stack_source, items) = if let Some(bindings) = session.system_prompt_ids_by_provider.get(provider) {
            let mut resolved = Vec::new();
            for binding in bindings {
                if !binding.enabled {
                    continue;
                }
                let Some(item) = source.get_item(binding.id).await? else {
                    continue;
                };
                resolved.push(ResolvedPromptItem {
                    item,
                    overrides: binding.overrides.clone(),
                });
            }
            (StackSource::Session, resolved)
        } else {
            let defaults = source.defaults_for_provider(provider).await?;
            let resolved = defaults
                .into_iter()
                .map(|item| ResolvedPromptItem {
                    item,
                    overrides: HashMap::new(),
                })
                .collect();
            (StackSource::Default, resolved)
        };

        let missing_defaults = u32::from(stack_source == StackSource::Default && items.is_empty());
        let overrides_count: usize = items.iter().map(|r| r.overrides.len()).sum();

        let event = TelemetryEvent::new(EventName::SystemPromptsResolved)
            .with_measurement("prompt_count", items.len() as f64)
            .with_measurement("overrides_count", overrides_count as f64)
            .with_measurement("missing_defaults", f64::from(missing_defaults))
            .with_measurement("duration_ms", start.elapsed().as_secs_f64() * 1000.0)
            .with_metadata("provider", Value::String(provider.to_string()))
            .with_metadata("session_id", Value::String(session.id.to_string()))
            .with_metadata("source", Value::String(stack_source.as_str().to_string()));
        telemetry.emit(event);

        Ok(Stack {
            items,
            source: stack_source,
        })
    }

    /// §4.5 Rendering — pure function of the stack's stored rows and
    /// overrides (§8 invariant 5).
    #[must_use]
    pub fn render_for_provider(provider: &str, stack: &Stack) -> PromptPayload {
        match provider {
            "anthropic" => PromptPayload::AnthropicBlocks(
                stack
                    .items
                    .iter()
                    .filter(|r| r.item.render_format == PromptRenderFormat::AnthropicBlocks || r.item.render_format == PromptRenderFormat::Text)
                    .flat_map(render_anthropic_blocks)
                    .collect(),
            ),
            "gemini" => {
                let parts: Vec<Value> = stack.items.iter().flat_map(render_gemini_parts).collect();
                PromptPayload::GeminiParts(serde_json::json!({ "role": "user", "parts": parts }))
            },
            _ => PromptPayload::Text(stack.items.iter().flat_map(render_text_segments).collect()),
        }
    }
}

impl PromptPayload {
    /// Flatten this payload to the plain string `stream_chat`'s `system`
    /// parameter expects — every provider's wire format still carries system
    /// instructions as a single string underneath its own structuring
    /// (`instructions`, a `system` block array, or a prepended user turn), so
    /// the text content of each segment/block/part is joined with blank
    /// lines in stack order.
    #[must_use]
    pub fn flatten_to_system_text(&self) -> String {
        let texts: Vec<&str> = match self {
            Self::Text(segments) | Self::AnthropicBlocks(segments) => {
                segments.iter().filter_map(|v| v.get("text").and_then(Value::as_str)).collect()
            },
            Self::GeminiParts(value) => value
                .get("parts")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|v| v.get("text").and_then(Value::as_str))
                .collect(),
        };
        texts.join("\n\n")
    }
}

fn render_text_segments(resolved: &ResolvedPromptItem) -> Vec<Value> {
    if let Some(segments) = resolved.overrides.get("segments").and_then(Value::as_array) {
        return segments.clone();
    }
    if let Some(segments) = resolved.item.metadata.get("segments").and_then(Value::as_array) {
        return segments.clone();
    }
    vec![serde_json::json!({ "type": "text", "text": resolved.item.text })]
}

fn render_anthropic_blocks(resolved: &ResolvedPromptItem) -> Vec<Value> {
    if let Some(blocks) = resolved.overrides.get("blocks").and_then(Value::as_array) {
        return blocks.clone();
    }
    if let Some(blocks) = resolved.item.metadata.get("blocks").and_then(Value::as_array) {
        return blocks.clone();
    }
    vec![serde_json::json!({ "type": "text", "text": resolved.item.text })]
}

fn render_gemini_parts(resolved: &ResolvedPromptItem) -> Vec<Value> {
    if let Some(parts) = resolved.overrides.get("parts").and_then(Value::as_array) {
        return parts.clone();
    }
    if let Some(parts) = resolved.item.metadata.get("parts").and_then(Value::as_array) {
        return parts.clone();
    }
    vec![serde_json::json!({ "text": resolved.item.text })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_telemetry::RecordingSink;
    use std::collections::HashMap as Map;

    fn item(provider: &str, is_default: bool, text: &str) -> SystemPromptItem {
        SystemPromptItem {
            id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            provider: provider.to_string(),
            render_format: PromptRenderFormat::Text,
            version: 1,
            is_default,
            text: text.to_string(),
            metadata: Value::Null,
            editor: None,
            change_note: None,
            inserted_at: chrono::Utc::now(),
        }
    }

    struct FakeSource {
        items: Vec<SystemPromptItem>,
    }

    #[async_trait::async_trait]
    impl PromptSource for FakeSource {
        async fn get_item(&self, id: Uuid) -> AppResult<Option<SystemPromptItem>> {
            Ok(self.items.iter().find(|i| i.id == id).cloned())
        }

        async fn defaults_for_provider(&self, provider: &str) -> AppResult<Vec<SystemPromptItem>> {
            Ok(self
                .items
                .iter()
                .filter(|i| i.is_default && (i.provider == provider || i.provider == "shared"))
                .cloned()
                .collect())
        }
    }

    fn session() -> Session {
        Session {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            auth_id: ("openai".to_string(), conduit_core::types::AuthType::ApiKey, "default".to_string()),
            model_id: "gpt-5".to_string(),
            working_dir: "/tmp".into(),
            tools: Vec::new(),
            system_prompt_ids_by_provider: Map::new(),
        }
    }

    #[tokio::test]
    async fn falls_back_to_provider_and_shared_defaults() {
        let source = FakeSource {
            items: vec![item("openai", true, "openai default"), item("shared", true, "shared default")],
        };
        let sink = RecordingSink::default();
        let stack = PromptStack::resolve_for_session(&session(), "openai", &source, &sink).await.unwrap();
        assert_eq!(stack.source, StackSource::Default);
        assert_eq!(stack.items.len(), 2);
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn missing_defaults_produces_empty_stack_and_flags_telemetry() {
        let source = FakeSource { items: vec![] };
        let sink = RecordingSink::default();
        let stack = PromptStack::resolve_for_session(&session(), "anthropic", &source, &sink).await.unwrap();
        assert!(stack.items.is_empty());
        let events = sink.events();
        assert_eq!(events[0].measurements["missing_defaults"], 1.0);
    }

    #[tokio::test]
    async fn session_pin_skips_disabled_bindings() {
        let enabled = item("openai", false, "enabled prompt");
        let disabled_id = Uuid::new_v4();
        let mut sess = session();
        sess.system_prompt_ids_by_provider.insert(
            "openai".to_string(),
            vec![
                conduit_core::types::SystemPromptBinding { id: enabled.id, enabled: true, overrides: Map::new() },
                conduit_core::types::SystemPromptBinding { id: disabled_id, enabled: false, overrides: Map::new() },
            ],
        );
        let source = FakeSource { items: vec![enabled.clone()] };
        let sink = RecordingSink::default();
        let stack = PromptStack::resolve_for_session(&sess, "openai", &source, &sink).await.unwrap();
        assert_eq!(stack.source, StackSource::Session);
        assert_eq!(stack.items.len(), 1);
        assert_eq!(stack.items[0].item.id, enabled.id);
    }

    #[test]
    fn text_rendering_wraps_plain_text_when_no_segments_present() {
        let stack = Stack {
            items: vec![ResolvedPromptItem { item: item("openai", true, "hello"), overrides: Map::new() }],
            source: StackSource::Default,
        };
        let payload = PromptStack::render_for_provider("openai", &stack);
        match payload {
            PromptPayload::Text(segments) => {
                assert_eq!(segments.len(), 1);
                assert_eq!(segments[0]["text"], "hello");
            },
            other => panic!("expected Text payload, got {other:?}"),
        }
    }

    #[test]
    fn overrides_replace_segments_for_text_rendering() {
        let mut overrides = Map::new();
        overrides.insert("segments".to_string(), serde_json::json!([{"type": "text", "text": "overridden"}]));
        let stack = Stack {
            items: vec![ResolvedPromptItem { item: item("openai", true, "hello"), overrides }],
            source: StackSource::Default,
        };
        let payload = PromptStack::render_for_provider("openai", &stack);
        match payload {
            PromptPayload::Text(segments) => assert_eq!(segments[0]["text"], "overridden"),
            other => panic!("expected Text payload, got {other:?}"),
        }
    }

    #[test]
    fn flatten_to_system_text_joins_segments_in_order() {
        let stack = Stack {
            items: vec![
                ResolvedPromptItem { item: item("openai", true, "first"), overrides: Map::new() },
                ResolvedPromptItem { item: item("shared", true, "second"), overrides: Map::new() },
            ],
            source: StackSource::Default,
        };
        let payload = PromptStack::render_for_provider("openai", &stack);
        assert_eq!(payload.flatten_to_system_text(), "first\n\nsecond");
    }

    #[test]
    fn flatten_to_system_text_handles_gemini_parts() {
        let stack = Stack {
            items: vec![ResolvedPromptItem { item: item("gemini", true, "hi"), overrides: Map::new() }],
            source: StackSource::Default,
        };
        let payload = PromptStack::render_for_provider("gemini", &stack);
        assert_eq!(payload.flatten_to_system_text(), "hi");
    }

    #[test]
    fn gemini_rendering_wraps_into_a_single_user_turn() {
        let stack = Stack {
            items: vec![ResolvedPromptItem { item: item("gemini", true, "hi"), overrides: Map::new() }],
            source: StackSource::Default,
        };
        let payload = PromptStack::render_for_provider("gemini", &stack);
        match payload {
            PromptPayload::GeminiParts(value) => {
                assert_eq!(value["role"], "user");
                assert_eq!(value["parts"][0]["text"], "hi");
            },
            other => panic!("expected GeminiParts payload, got {other:?}"),
        }
    }
}
