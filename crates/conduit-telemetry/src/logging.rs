//! `tracing-subscriber` setup: format, target, and per-module filter
//! directives driven by a [`LogConfig`].

use std::path::PathBuf;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{TelemetryError, TelemetryResult};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line format (default for interactive use).
    #[default]
    Pretty,
    /// Single-line compact format.
    Compact,
    /// Newline-delimited JSON, for log aggregation.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Default)]
pub enum LogTarget {
    /// Standard error (default).
    #[default]
    Stderr,
    /// A rotating file under the given directory with the given prefix.
    RollingFile {
        /// Directory to write log files into.
        directory: PathBuf,
        /// File name prefix; `tracing-appender` appends a date suffix.
        prefix: String,
    },
}

/// Logging configuration: level, format, target, and extra per-module
/// filter directives layered on top of the base level.
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    format: LogFormat,
    target: LogTarget,
    directives: Vec<String>,
}

impl LogConfig {
    /// Start a config at the given base level (`"trace"`..`"error"`).
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            directives: Vec::new(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Direct output to a rotating file instead of stderr.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Add an extra `EnvFilter` directive, e.g. `"conduit_mcp=trace"`.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn build_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|e| TelemetryError::ConfigError(e.to_string()))?;
        for directive in &self.directives {
            filter = filter.add_directive(
                directive
                    .parse()
                    .map_err(|e: tracing_subscriber::filter::ParseError| {
                        TelemetryError::ConfigError(e.to_string())
                    })?,
            );
        }
        Ok(filter)
    }
}

/// Install a global `tracing` subscriber built from `config`.
///
/// Returns an optional file-appender guard — drop it only on process exit;
/// dropping it early stops flushing buffered log lines to disk.
pub fn setup_logging(
    config: &LogConfig,
) -> TelemetryResult<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = config.build_filter()?;

    match &config.target {
        LogTarget::Stderr => {
            let fmt_layer = fmt::layer().with_writer(std::io::stderr);
            init_with_format(fmt_layer, config.format, filter)?;
            Ok(None)
        }
        LogTarget::RollingFile { directory, prefix } => {
            let appender = tracing_appender::rolling::daily(directory, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let fmt_layer = fmt::layer().with_writer(writer).with_ansi(false);
            init_with_format(fmt_layer, config.format, filter)?;
            Ok(Some(guard))
        }
    }
}

fn init_with_format<W>(
    layer: fmt::Layer<tracing_subscriber::Registry, fmt::format::DefaultFields, fmt::format::Format, W>,
    format: LogFormat,
    filter: EnvFilter,
) -> TelemetryResult<()>
where
    W: for<'writer> fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
    // try_init is idempotent-safe to call once per process; a second call
    // (e.g. in tests running in the same process) returning an error is not
    // fatal to the caller.
    result.map_err(|e| TelemetryError::InitError(e.to_string()))
}

/// Install a sensible default subscriber (`info` level, pretty, stderr).
/// Convenience wrapper over [`setup_logging`] for binaries that don't need
/// custom configuration.
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::new("info"))?;
    Ok(())
}
