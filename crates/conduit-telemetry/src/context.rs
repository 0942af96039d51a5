//! Request correlation context.
//!
//! A [`RequestContext`] threads a correlation id and a component/operation
//! label through a `tracing` span so log lines for a single turn, tool
//! dispatch, or MCP round-trip can be grepped out of a shared log stream.

use tracing::Span;
use uuid::Uuid;

/// Correlation context for one logical unit of work.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique id for this unit of work.
    pub request_id: Uuid,
    /// The component emitting the span (`"agent_loop"`, `"mcp_client"`, …).
    pub component: String,
    /// The operation within that component, if set.
    pub operation: Option<String>,
}

impl RequestContext {
    /// Start a new context for `component`, generating a fresh request id.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            component: component.into(),
            operation: None,
        }
    }

    /// Attach an operation label.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Build the `tracing` span for this context. Entering it attaches
    /// `request_id`/`component`/`operation` to every event logged inside.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            component = %self.component,
            operation = self.operation.as_deref().unwrap_or("-"),
        )
    }

    /// Enter the span for the lifetime of the returned guard.
    #[must_use]
    pub fn enter(&self) -> RequestGuard {
        RequestGuard {
            _span: self.span(),
        }
    }
}

/// RAII guard keeping a [`RequestContext`]'s span entered.
pub struct RequestGuard {
    _span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_carries_operation() {
        let ctx = RequestContext::new("agent_loop").with_operation("run_turn");
        assert_eq!(ctx.component, "agent_loop");
        assert_eq!(ctx.operation.as_deref(), Some("run_turn"));
    }

    #[test]
    fn each_context_gets_a_distinct_id() {
        let a = RequestContext::new("x");
        let b = RequestContext::new("x");
        assert_ne!(a.request_id, b.request_id);
    }
}
