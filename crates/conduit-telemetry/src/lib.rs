//! Telemetry for the conduit agent orchestration runtime.
//!
//! Two things live here:
//! - logging setup ([`LogConfig`]/[`setup_logging`]) and request correlation
//!   ([`RequestContext`]), both plain `tracing` integration;
//! - the fixed named-event surface (§4.13) other crates emit through —
//!   [`TelemetrySink`] and its [`TracingSink`]/[`RecordingSink`]
//!   implementations.
//!
//! # Example
//!
//! ```rust,no_run
//! use conduit_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), conduit_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("conduit_mcp=trace");
//!
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("agent_loop").with_operation("run_turn");
//! let _guard = ctx.enter();
//! tracing::info!("processing turn");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod events;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use events::{EventName, RecordingSink, TelemetryEvent, TelemetrySink, TracingSink};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
