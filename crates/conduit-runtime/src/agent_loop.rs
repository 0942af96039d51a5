//! C10 `AgentLoop` (§4.10): the ReAct turn state machine —
//! `STREAMING → (TOOL_DISPATCH → STREAMING)* → DONE`, bounded by
//! `max_tool_rounds`.
//!
//! Drives [`conduit_llm::router::ProviderRouter::stream_chat`] and
//! [`crate::tool_dispatch::ToolDispatcher`] through that cycle.
//! Cancellation uses `tokio_util::sync::CancellationToken`, checked
//! cooperatively between rounds and raced against the in-flight stream.

use std::sync::Arc;

use conduit_core::error::{AppError, AppResult};
use conduit_core::types::{Message, StreamEvent, ToolCall, Usage};
use conduit_llm::router::{CredentialSource, EventStream, ProviderRouter};
use conduit_telemetry::{EventName, TelemetryEvent, TelemetrySink};
use conduit_tools::ToolContext;
use conduit_tools::declare::{anthropic_declaration, gemini_declaration, openai_declaration, tool_result_message};
use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, RuntimeResult};
use crate::session::AgentSession;
use crate::tool_dispatch::ToolDispatcher;

/// Default hard bound on tool-dispatch rounds per turn (§4.10 step 4).
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

/// The grace window a tool is given to finish after cancellation before
/// the loop hard-returns (§4.10 Cancellation).
pub const CANCELLATION_GRACE: std::time::Duration = std::time::Duration::from_secs(2);

/// Per-call options for [`AgentLoop::run_turn`].
#[derive(Debug, Clone)]
pub struct TurnOptions {
    /// Hard bound on tool-dispatch rounds.
    pub max_tool_rounds: u32,
    /// Tool names enabled for this turn (built-in and/or MCP); empty means
    /// every tool the dispatcher can discover.
    pub enabled_tools: Vec<String>,
    /// Cooperative cancellation — checked between rounds and passed down to
    /// the in-flight stream/dispatch.
    pub cancellation: CancellationToken,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            enabled_tools: Vec::new(),
            cancellation: CancellationToken::new(),
        }
    }
}

/// One completed tool call within a turn, as reported to the caller.
#[derive(Debug, Clone)]
pub struct TurnToolRecord {
    /// Tool name.
    pub name: String,
    /// Parsed arguments.
    pub args: Value,
    /// The result text fed back to the model (or an `"error: ..."` string).
    pub result: String,
}

/// The successful result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Accumulated text across every STREAMING round of this turn.
    pub final_text: String,
    /// Every tool call dispatched this turn, in completion order across
    /// rounds (original per-round call order preserved within each round).
    pub tools: Vec<TurnToolRecord>,
    /// Token usage, summed across every round.
    pub usage: Usage,
}

/// A turn that did not complete successfully. Carries the same partial
/// accumulation an ok outcome would have, per §4.10 Partial failure.
#[derive(Debug, Clone)]
pub struct TurnFailure {
    /// The underlying error.
    pub error: RuntimeError,
    /// Text accumulated before the failure.
    pub final_text: String,
    /// Tool calls completed before the failure.
    pub tools: Vec<TurnToolRecord>,
    /// Usage accumulated before the failure.
    pub usage: Usage,
}

/// C10 `AgentLoop`: drives one turn of STREAMING/TOOL_DISPATCH across a
/// [`ProviderRouter`] and [`ToolDispatcher`].
pub struct AgentLoop<C: CredentialSource> {
    router: Arc<ProviderRouter<C>>,
    dispatcher: Arc<ToolDispatcher>,
}

impl<C: CredentialSource> AgentLoop<C> {
    /// Construct a loop over a router and tool dispatcher.
    #[must_use]
    pub fn new(router: Arc<ProviderRouter<C>>, dispatcher: Arc<ToolDispatcher>) -> Self {
        Self { router, dispatcher }
    }

    /// §4.10 `run_turn`. `system` is the already-rendered, flattened system
    /// prompt text for this provider (see [`crate::prompt_stack::PromptStack`]).
    pub async fn run_turn(
        &self,
        session: &AgentSession,
        system: &str,
        opts: TurnOptions,
        telemetry: &(impl TelemetrySink + ?Sized),
    ) -> Result<TurnOutcome, TurnFailure> {
        let mut messages = session.messages.clone();
        let mut final_text = String::new();
        let mut tools_so_far: Vec<TurnToolRecord> = Vec::new();
        let mut usage_sum = Usage::default();
        let mut rounds_completed: u32 = 0;

        let tool_specs = self.dispatcher.available_tool_specs(&opts.enabled_tools).await;
        let tool_decls = declarations_for_provider(&session.provider, &tool_specs);

        let ctx = ToolContext::with_shared_cwd(session.working_dir.clone(), session.cwd.clone());

        loop {
            if opts.cancellation.is_cancelled() {
                return Err(TurnFailure {
                    error: RuntimeError::Cancelled,
                    final_text,
                    tools: tools_so_far,
                    usage: usage_sum,
                });
            }

            if rounds_completed >= opts.max_tool_rounds {
                return Err(TurnFailure {
                    error: RuntimeError::ToolLoopExceeded { max_rounds: opts.max_tool_rounds },
                    final_text,
                    tools: tools_so_far,
                    usage: usage_sum,
                });
            }

            let stream = self
                .router
                .stream_chat(&session.provider, session.auth_type, &session.credential_name, &session.model_id, &messages, &tool_decls, system)
                .await
                .map_err(|e| TurnFailure {
                    error: RuntimeError::App(e),
                    final_text: final_text.clone(),
                    tools: tools_so_far.clone(),
                    usage: usage_sum,
                })?;

            let round = self.drain_round(stream, &opts.cancellation, telemetry).await.map_err(|e| TurnFailure {
                error: e,
                final_text: final_text.clone(),
                tools: tools_so_far.clone(),
                usage: usage_sum,
            })?;

            final_text.push_str(&round.buf_text);
            usage_sum = usage_sum.add(round.usage_sum);

            if round.pending_tool_calls.is_empty() {
                return Ok(TurnOutcome { final_text, tools: tools_so_far, usage: usage_sum });
            }

            if !round.buf_text.is_empty() {
                messages.push(Message::assistant(round.buf_text.clone()));
            }

            if opts.cancellation.is_cancelled() {
                return Err(TurnFailure {
                    error: RuntimeError::Cancelled,
                    final_text,
                    tools: tools_so_far,
                    usage: usage_sum,
                });
            }

            let dispatch_fut = self.dispatcher.dispatch_all(&round.pending_tool_calls, &ctx, telemetry);
            tokio::pin!(dispatch_fut);
            let dispatched = tokio::select! {
                biased;
                result = &mut dispatch_fut => result,
                () = opts.cancellation.cancelled() => {
                    match tokio::time::timeout(CANCELLATION_GRACE, &mut dispatch_fut).await {
                        Ok(result) => result,
                        Err(_) => return Err(TurnFailure {
                            error: RuntimeError::Cancelled,
                            final_text,
                            tools: tools_so_far,
                            usage: usage_sum,
                        }),
                    }
                }
            };
            for d in &dispatched {
                tools_so_far.push(TurnToolRecord {
                    name: d.call.name.clone(),
                    args: d.args.clone(),
                    result: d.output.clone(),
                });
                messages.push(tool_result_message(&session.provider, &d.call.id, &d.call.name, &d.output));
            }

            rounds_completed = rounds_completed.saturating_add(1);
        }
    }

    async fn drain_round(
        &self,
        mut stream: EventStream,
        cancellation: &CancellationToken,
        telemetry: &(impl TelemetrySink + ?Sized),
    ) -> RuntimeResult<RoundAccumulator> {
        let mut acc = RoundAccumulator::default();

        loop {
            tokio::select! {
                biased;
                () = cancellation.cancelled() => {
                    return Err(RuntimeError::Cancelled);
                }
                next = stream.next() => {
                    let Some(event) = next else { break };
                    let event = event.map_err(RuntimeError::App)?;
                    telemetry.emit(
                        TelemetryEvent::new(EventName::StreamEvent)
                            .with_metadata("kind", Value::String(event_kind(&event).to_string())),
                    );
                    match event {
                        StreamEvent::Content { content } => acc.buf_text.push_str(&content),
                        StreamEvent::FunctionCall { tool_calls } => acc.pending_tool_calls.extend(tool_calls),
                        StreamEvent::Usage { usage } => acc.usage_sum = acc.usage_sum.add(usage),
                        StreamEvent::Done => break,
                        StreamEvent::Error { message } => return Err(RuntimeError::StreamFailure(message)),
                    }
                }
            }
        }

        Ok(acc)
    }
}

#[derive(Debug, Default)]
struct RoundAccumulator {
    buf_text: String,
    pending_tool_calls: Vec<ToolCall>,
    usage_sum: Usage,
}

fn event_kind(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::Content { .. } => "content",
        StreamEvent::FunctionCall { .. } => "function_call",
        StreamEvent::Usage { .. } => "usage",
        StreamEvent::Done => "done",
        StreamEvent::Error { .. } => "error",
    }
}

/// Build the raw per-provider tool declaration array `ProviderRouter::stream_chat`
/// expects (not the `declare_for_provider` envelope — the router's own
/// `build_request` functions add `tool_choice`/`tools` wrapping themselves).
fn declarations_for_provider(provider: &str, specs: &[conduit_tools::declare::ToolSpec]) -> Vec<Value> {
    match provider {
        "openai" => specs.iter().map(openai_declaration).collect(),
        "anthropic" => specs.iter().map(anthropic_declaration).collect(),
        "gemini" => specs.iter().map(gemini_declaration).collect(),
        _ => Vec::new(),
    }
}

impl From<TurnFailure> for AppError {
    fn from(failure: TurnFailure) -> Self {
        failure.error.into()
    }
}
