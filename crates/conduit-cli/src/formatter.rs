//! Output rendering mode shared by every subcommand.

/// How a subcommand renders its result to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text (default).
    #[default]
    Pretty,
    /// Newline-free JSON, for piping into `jq`/scripts.
    Json,
}

impl OutputFormat {
    /// Parse the `--format` flag value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}
