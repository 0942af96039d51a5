//! Commonly used types for convenient import.
//!
//! Use `use conduit_telemetry::prelude::*;` to import all essential types.

// Errors
pub use crate::{TelemetryError, TelemetryResult};

// Logging configuration
pub use crate::{LogConfig, LogFormat, LogTarget};

// Setup functions
pub use crate::{setup_default_logging, setup_logging};

// Request context
pub use crate::{RequestContext, RequestGuard};

// Named telemetry event surface
pub use crate::{EventName, RecordingSink, TelemetryEvent, TelemetrySink, TracingSink};
