//! Wires C6 `ToolRegistry` (built-ins, `conduit-tools`) and C7/C8
//! `MCPClient`/`MCPRegistry` (`conduit-mcp`) into the single dispatch
//! surface §4.10's agent loop drives: given a round's
//! [`conduit_core::types::ToolCall`]s, run each (built-in or MCP, bounded
//! concurrency per §5) and return results in the model's original call
//! order regardless of completion order.

use std::sync::Arc;
use std::time::Instant;

use conduit_core::types::ToolCall;
use conduit_mcp::McpRegistry;
use conduit_telemetry::{EventName, TelemetryEvent, TelemetrySink};
use conduit_tools::declare::ToolSpec;
use conduit_tools::{ToolContext, ToolRegistry, truncate_output};
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;

/// Default inner concurrency cap: at most this many tool calls from one
/// round run in parallel (§5 Backpressure).
pub const DEFAULT_TOOL_CONCURRENCY: usize = 4;

/// The outcome of dispatching one [`ToolCall`], always `Ok` at this layer —
/// a failing tool execution becomes a `"error: ..."`-prefixed `output`
/// string (§4.10 Partial failure), never a hard error the loop must abort
/// on. Only a dispatch that can't even be *attempted* (e.g. an MCP tool
/// name that resolves to no server) takes that path, via `ok = false`.
#[derive(Debug, Clone)]
pub struct DispatchedTool {
    /// The call this result answers.
    pub call: ToolCall,
    /// Parsed arguments, or `Value::Null` if they failed to parse (the
    /// failure is then reflected in `output`).
    pub args: Value,
    /// The text to feed back to the model as this call's result.
    pub output: String,
    /// Whether the tool itself reported success.
    pub ok: bool,
}

/// C6 dispatch surface: built-in tools plus MCP-discovered tools, unified.
pub struct ToolDispatcher {
    builtins: Arc<ToolRegistry>,
    mcp: Option<Arc<McpRegistry>>,
    concurrency: usize,
}

impl ToolDispatcher {
    /// Construct a dispatcher over a built-in registry and an optional MCP
    /// registry (sessions with no MCP servers attached pass `None`).
    #[must_use]
    pub fn new(builtins: Arc<ToolRegistry>, mcp: Option<Arc<McpRegistry>>) -> Self {
        Self {
            builtins,
            mcp,
            concurrency: DEFAULT_TOOL_CONCURRENCY,
        }
    }

    /// Override the default concurrency cap.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The combined, declaration-ready tool set: every built-in plus every
    /// MCP-discovered tool, namespace-resolved per §4.8 (a name unique
    /// across connected servers is exposed unprefixed; a name more than one
    /// server provides is exposed from each as `<server>__<tool>`).
    ///
    /// If `enabled` is non-empty, the result is filtered to only the named
    /// tools (a name matches either the bare built-in name or, for MCP
    /// tools, the resolved/namespaced name).
    pub async fn available_tool_specs(&self, enabled: &[String]) -> Vec<ToolSpec> {
        let mut specs = self.builtins.tool_specs();

        if let Some(mcp) = &self.mcp {
            let definitions = mcp.list_tools().await;
            let mut by_name: HashMap<&str, usize> = HashMap::new();
            for def in &definitions {
                *by_name.entry(def.name.as_str()).or_insert(0) += 1;
            }
            specs.extend(definitions.iter().map(|def| {
                let name = if by_name.get(def.name.as_str()).copied().unwrap_or(0) > 1 {
                    def.namespaced_name()
                } else {
                    def.name.clone()
                };
                ToolSpec {
                    name,
                    description: def.description.clone().unwrap_or_default(),
                    input_schema: def.input_schema.clone(),
                }
            }));
        }

        if enabled.is_empty() {
            return specs;
        }
        specs.retain(|spec| enabled.iter().any(|name| name == &spec.name));
        specs
    }

    /// Dispatch every call in `calls`, with up to `self.concurrency` running
    /// at once, returning results re-sorted into the model's original call
    /// order (§5 Ordering guarantees, §9 Open Question 2).
    pub async fn dispatch_all(
        &self,
        calls: &[ToolCall],
        ctx: &ToolContext,
        telemetry: &(impl TelemetrySink + ?Sized),
    ) -> Vec<DispatchedTool> {
        let mut indexed: Vec<(usize, DispatchedTool)> = futures::stream::iter(calls.iter().cloned().enumerate())
            .map(|(idx, call)| async move {
                let result = self.dispatch_one(&call, ctx, telemetry).await;
                (idx, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, result)| result).collect()
    }

    async fn dispatch_one(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        telemetry: &(impl TelemetrySink + ?Sized),
    ) -> DispatchedTool {
        let start = Instant::now();
        let (output, ok, args) = self.run(call, ctx).await;

        telemetry.emit(
            TelemetryEvent::new(EventName::ToolDispatched)
                .with_measurement("duration_ms", start.elapsed().as_secs_f64() * 1000.0)
                .with_measurement("ok", if ok { 1.0 } else { 0.0 })
                .with_metadata("name", Value::String(call.name.clone())),
        );

        DispatchedTool {
            call: call.clone(),
            args,
            output,
            ok,
        }
    }

    async fn run(&self, call: &ToolCall, ctx: &ToolContext) -> (String, bool, Value) {
        let args: Value = match serde_json::from_str(&call.arguments) {
            Ok(v) => v,
            Err(e) => return (format!("error: invalid arguments: {e}"), false, Value::Null),
        };

        if ToolRegistry::is_builtin(&call.name) {
            return match self.builtins.get(&call.name) {
                Some(tool) => match tool.execute(args.clone(), ctx).await {
                    Ok(output) => (truncate_output(output), true, args),
                    Err(e) => (format!("error: {e}"), false, args),
                },
                None => (format!("error: unknown tool {}", call.name), false, args),
            };
        }

        let Some(mcp) = &self.mcp else {
            return (format!("error: no MCP servers configured for tool {}", call.name), false, args);
        };

        match mcp.call_tool(&call.name, args.clone()).await {
            Ok(result) if result.is_error => {
                (format!("error: {}", result.error.unwrap_or_else(|| "unknown error".to_string())), false, args)
            },
            Ok(result) => (truncate_output(result.text_content()), true, args),
            Err(e) => (format!("error: {e}"), false, args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_telemetry::RecordingSink;
    use std::path::PathBuf;

    fn ctx() -> ToolContext {
        ToolContext::new(PathBuf::from("/tmp"))
    }

    #[tokio::test]
    async fn available_tool_specs_without_a_filter_returns_every_builtin() {
        let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::with_defaults()), None);
        let specs = dispatcher.available_tool_specs(&[]).await;
        assert_eq!(specs.len(), 7);
    }

    #[tokio::test]
    async fn available_tool_specs_filters_to_the_enabled_set() {
        let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::with_defaults()), None);
        let specs = dispatcher.available_tool_specs(&["shell".to_string(), "read_file".to_string()]).await;
        assert_eq!(specs.len(), 2);
        assert!(specs.iter().any(|s| s.name == "shell"));
        assert!(specs.iter().any(|s| s.name == "read_file"));
    }

    #[tokio::test]
    async fn unknown_builtin_surfaces_as_an_error_result_not_a_panic() {
        let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::with_defaults()), None);
        let call = ToolCall { id: "t1".into(), name: "does_not_exist".into(), arguments: "{}".into() };
        let sink = RecordingSink::default();
        let results = dispatcher.dispatch_all(&[call], &ctx(), &sink).await;
        assert_eq!(results.len(), 1);
        assert!(!results[0].ok);
        assert!(results[0].output.starts_with("error:"));
    }

    #[tokio::test]
    async fn invalid_json_arguments_are_reported_not_panicked_on() {
        let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::with_defaults()), None);
        let call = ToolCall { id: "t1".into(), name: "read_file".into(), arguments: "not json".into() };
        let sink = RecordingSink::default();
        let results = dispatcher.dispatch_all(&[call], &ctx(), &sink).await;
        assert!(!results[0].ok);
        assert!(results[0].output.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn mcp_tool_with_no_registry_configured_is_a_clean_error() {
        let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::with_defaults()), None);
        let call = ToolCall { id: "t1".into(), name: "filesystem__read_file".into(), arguments: "{}".into() };
        let sink = RecordingSink::default();
        let results = dispatcher.dispatch_all(&[call], &ctx(), &sink).await;
        assert!(!results[0].ok);
        assert!(results[0].output.contains("no MCP servers configured"));
    }

    #[tokio::test]
    async fn results_preserve_the_models_original_call_order() {
        let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::with_defaults()), None).with_concurrency(4);
        let calls = vec![
            ToolCall { id: "a".into(), name: "does_not_exist".into(), arguments: "{}".into() },
            ToolCall { id: "b".into(), name: "also_missing".into(), arguments: "{}".into() },
            ToolCall { id: "c".into(), name: "still_missing".into(), arguments: "{}".into() },
        ];
        let sink = RecordingSink::default();
        let results = dispatcher.dispatch_all(&calls, &ctx(), &sink).await;
        assert_eq!(results.iter().map(|r| r.call.id.clone()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn every_dispatch_emits_one_tool_dispatched_event() {
        let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::with_defaults()), None);
        let calls = vec![
            ToolCall { id: "a".into(), name: "does_not_exist".into(), arguments: "{}".into() },
            ToolCall { id: "b".into(), name: "also_missing".into(), arguments: "{}".into() },
        ];
        let sink = RecordingSink::default();
        dispatcher.dispatch_all(&calls, &ctx(), &sink).await;
        assert_eq!(sink.count(EventName::ToolDispatched), 2);
    }
}
