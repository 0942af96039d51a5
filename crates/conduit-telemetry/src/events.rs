//! C13 — the named telemetry event surface (§4.13 / §6.4).
//!
//! Every subsystem that the spec calls out emits one of a fixed set of
//! named events with numeric measurements and string metadata. Emission
//! must never block the producer, so [`TelemetrySink::emit`] is a plain
//! synchronous call — implementations that need to do I/O (a metrics
//! backend, a file) are expected to buffer or spawn internally.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// One of the fixed telemetry event names from §4.13.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// `[:system_prompts, :resolved]`
    SystemPromptsResolved,
    /// `[:stream, :event]`
    StreamEvent,
    /// `[:tool, :dispatched]`
    ToolDispatched,
    /// `[:oauth, :refreshed]`
    OauthRefreshed,
    /// `[:mcp, :server_status_changed]`
    McpServerStatusChanged,
}

impl EventName {
    /// The dotted name used in `tracing` events and test assertions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SystemPromptsResolved => "system_prompts.resolved",
            Self::StreamEvent => "stream.event",
            Self::ToolDispatched => "tool.dispatched",
            Self::OauthRefreshed => "oauth.refreshed",
            Self::McpServerStatusChanged => "mcp.server_status_changed",
        }
    }
}

/// A single emitted telemetry event: a name, numeric measurements, and
/// string/JSON metadata.
#[derive(Debug, Clone)]
pub struct TelemetryEvent {
    /// Which named event this is.
    pub name: EventName,
    /// Numeric measurements (`duration`, `prompt_count`, `delta_bytes`, …).
    pub measurements: HashMap<String, f64>,
    /// Key/value metadata (`provider`, `session_id`, `outcome`, …).
    pub metadata: HashMap<String, Value>,
}

impl TelemetryEvent {
    /// Start building an event of the given name.
    #[must_use]
    pub fn new(name: EventName) -> Self {
        Self {
            name,
            measurements: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a numeric measurement.
    #[must_use]
    pub fn with_measurement(mut self, key: impl Into<String>, value: f64) -> Self {
        self.measurements.insert(key.into(), value);
        self
    }

    /// Attach a metadata value.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A sink that telemetry events are handed to. Must not block the caller
/// beyond the synchronous cost of recording/forwarding.
pub trait TelemetrySink: Send + Sync {
    /// Record one event.
    fn emit(&self, event: TelemetryEvent);
}

/// Forwards every event to a `tracing::info!` call — the default sink in
/// production, consumed by whatever `tracing-subscriber` layer is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, event: TelemetryEvent) {
        tracing::info!(
            target: "conduit_telemetry",
            event = event.name.as_str(),
            measurements = ?event.measurements,
            metadata = ?event.metadata,
            "telemetry event"
        );
    }
}

/// Buffers every event in memory. Used by tests asserting on what got
/// emitted, and available for callers that want to batch-export later.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl RecordingSink {
    /// Construct an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Count events matching a given name.
    #[must_use]
    pub fn count(&self, name: EventName) -> usize {
        self.events()
            .iter()
            .filter(|e| e.name == name)
            .count()
    }
}

impl PartialEq for TelemetryEvent {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl TelemetrySink for RecordingSink {
    fn emit(&self, event: TelemetryEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_counts_by_name() {
        let sink = RecordingSink::new();
        sink.emit(TelemetryEvent::new(EventName::ToolDispatched).with_metadata("name", "shell"));
        sink.emit(TelemetryEvent::new(EventName::ToolDispatched).with_metadata("name", "read_file"));
        sink.emit(TelemetryEvent::new(EventName::StreamEvent));

        assert_eq!(sink.count(EventName::ToolDispatched), 2);
        assert_eq!(sink.count(EventName::StreamEvent), 1);
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn event_name_strings_match_spec() {
        assert_eq!(EventName::SystemPromptsResolved.as_str(), "system_prompts.resolved");
        assert_eq!(EventName::McpServerStatusChanged.as_str(), "mcp.server_status_changed");
    }
}
