//! `mcp_settings.json` configuration: per-server transport settings and
//! global defaults.
//!
//! JSON `mcpServers` format with `priority`/`trust`/`timeout`/`max_failures`/
//! `failure_window` fields and a `globalSettings` block, plus `$VAR` /
//! `${VAR}` / `${VAR:-default}` environment expansion for `env` and
//! `headers` string values.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};

/// Default per-request timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default consecutive-failure count before the circuit breaker opens.
pub const DEFAULT_MAX_FAILURES: u32 = 3;
/// Default tool discovery cache TTL, in milliseconds (one hour).
pub const DEFAULT_TOOL_CACHE_TTL_MS: u64 = 3_600_000;

/// How a server is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// Launch a subprocess and speak JSON-RPC over its stdin/stdout.
    Stdio,
    /// POST each request to a URL; the response is a single JSON document.
    Http,
    /// Long-lived `GET` stream of server-sent events, paired with a
    /// companion POST (or inband write) for outgoing requests.
    Sse,
}

/// Confirmation level required before a tool call is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationLevel {
    /// Run tools without prompting.
    Low,
    /// The default: prompt for tools from untrusted servers.
    #[default]
    Medium,
    /// Prompt for every tool call.
    High,
}

/// One server entry in `mcpServers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Populated from the map key on load; not itself serialized.
    #[serde(skip)]
    pub name: String,

    /// Transport kind.
    #[serde(rename = "transportType")]
    pub transport_type: TransportType,

    /// Executable to launch (stdio only).
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments passed to `command` (stdio only).
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables passed to the subprocess, or added as request
    /// context for http/sse. Values support `$VAR`/`${VAR}`/`${VAR:-default}`
    /// expansion against the calling process's environment.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Endpoint URL (http/sse only).
    #[serde(default)]
    pub url: Option<String>,

    /// Extra HTTP headers (http/sse only). Same expansion rules as `env`.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Whether this server is trusted to run without per-call confirmation.
    #[serde(default)]
    pub trust: bool,

    /// Per-request timeout in milliseconds; falls back to
    /// `GlobalSettings::default_timeout` when absent.
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Priority used to break tool-namespace ties; higher wins.
    #[serde(default)]
    pub priority: i32,

    /// Consecutive failures before the circuit breaker opens.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Window, in seconds, over which `max_failures` is counted. `None`
    /// means the failure count never resets on its own.
    #[serde(default)]
    pub failure_window: Option<u64>,
}

fn default_max_failures() -> u32 {
    DEFAULT_MAX_FAILURES
}

impl McpServerConfig {
    /// Build a minimal stdio server entry.
    #[must_use]
    pub fn stdio(command: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            transport_type: TransportType::Stdio,
            command: Some(command.into()),
            args: Vec::new(),
            env: HashMap::new(),
            url: None,
            headers: HashMap::new(),
            trust: false,
            timeout: None,
            priority: 0,
            max_failures: DEFAULT_MAX_FAILURES,
            failure_window: None,
        }
    }

    /// Build a minimal http/sse server entry.
    #[must_use]
    pub fn remote(transport_type: TransportType, url: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            transport_type,
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            url: Some(url.into()),
            headers: HashMap::new(),
            trust: false,
            timeout: None,
            priority: 0,
            max_failures: DEFAULT_MAX_FAILURES,
            failure_window: None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn trusted(mut self) -> Self {
        self.trust = true;
        self
    }

    /// Effective per-request timeout, falling back to the global default.
    #[must_use]
    pub fn effective_timeout_ms(&self, global: &GlobalSettings) -> u64 {
        self.timeout.unwrap_or(global.default_timeout)
    }

    /// `env` with `$VAR`/`${VAR}`/`${VAR:-default}` expanded against the
    /// process environment.
    #[must_use]
    pub fn expanded_env(&self) -> HashMap<String, String> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), expand_env_vars(v)))
            .collect()
    }

    /// `headers` with the same expansion applied.
    #[must_use]
    pub fn expanded_headers(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .map(|(k, v)| (k.clone(), expand_env_vars(v)))
            .collect()
    }
}

/// Global defaults applying across all configured servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Default per-request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub default_timeout: u64,
    /// Confirmation policy for untrusted-server tool calls.
    #[serde(default)]
    pub confirmation_level: ConfirmationLevel,
    /// Whether tool calls are written to the audit log.
    #[serde(default)]
    pub audit_logging: bool,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT_MS,
            confirmation_level: ConfirmationLevel::default(),
            audit_logging: false,
        }
    }
}

/// Parsed `mcp_settings.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpSettings {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: HashMap<String, McpServerConfig>,
    #[serde(rename = "globalSettings", default)]
    pub global_settings: GlobalSettings,
}

impl McpSettings {
    /// Load and parse `mcp_settings.json` from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> McpResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&contents)
            .map_err(|e| McpError::ConfigInvalid(format!("{}: {e}", path.display())))?;
        settings.backfill_names();
        Ok(settings)
    }

    fn backfill_names(&mut self) {
        let names: Vec<String> = self.mcp_servers.keys().cloned().collect();
        for name in names {
            if let Some(server) = self.mcp_servers.get_mut(&name) {
                server.name.clone_from(&name);
            }
        }
    }

    /// Load from the conventional per-user config location
    /// (`$CONDUIT_HOME/mcp_settings.json` or `~/.conduit/mcp_settings.json`).
    ///
    /// Returns `Ok(Self::default())` if no file exists there yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but fails to parse.
    pub fn load_default() -> McpResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// The conventional per-user config path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Ok(home) = std::env::var("CONDUIT_HOME") {
            return PathBuf::from(home).join("mcp_settings.json");
        }
        dirs_home().join(".conduit").join("mcp_settings.json")
    }

    /// Write this configuration to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> McpResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Look up one server's configuration.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&McpServerConfig> {
        self.mcp_servers.get(name)
    }

    /// Insert or replace a server's configuration under `server.name`.
    pub fn add(&mut self, server: McpServerConfig) {
        let name = server.name.clone();
        self.mcp_servers.insert(name, server);
    }

    /// Remove a server's configuration, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<McpServerConfig> {
        self.mcp_servers.remove(name)
    }

    /// All configured servers in unspecified order.
    #[must_use]
    pub fn list(&self) -> Vec<&McpServerConfig> {
        self.mcp_servers.values().collect()
    }

    /// All configured servers, ordered by descending priority, ties broken
    /// by name.
    #[must_use]
    pub fn list_by_priority(&self) -> Vec<&McpServerConfig> {
        let mut servers: Vec<&McpServerConfig> = self.mcp_servers.values().collect();
        servers.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        servers
    }
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

/// Expand `$VAR`, `${VAR}`, and `${VAR:-default}` references against the
/// process environment. Unrecognized `$`-sequences (no identifier following,
/// or an unset variable with no default) are left verbatim or expand empty,
/// matching common shell behavior.
#[must_use]
pub fn expand_env_vars(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            let ch_len = input[i..].chars().next().map_or(1, char::len_utf8);
            out.push_str(&input[i..i + ch_len]);
            i += ch_len;
            continue;
        }

        if i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(close) = input[i + 2..].find('}') {
                let inner = &input[i + 2..i + 2 + close];
                out.push_str(&resolve_braced(inner));
                i += 2 + close + 1;
                continue;
            }
        } else if i + 1 < bytes.len() && is_ident_start(bytes[i + 1]) {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && is_ident_continue(bytes[end]) {
                end += 1;
            }
            let name = &input[start..end];
            out.push_str(&std::env::var(name).unwrap_or_default());
            i = end;
            continue;
        }

        out.push('$');
        i += 1;
    }

    out
}

fn resolve_braced(inner: &str) -> String {
    if let Some((name, default)) = inner.split_once(":-") {
        std::env::var(name).unwrap_or_else(|_| default.to_string())
    } else {
        std::env::var(inner).unwrap_or_default()
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    #[test]
    fn stdio_server_builder_round_trips() {
        let server = McpServerConfig::stdio("npx")
            .with_args(["-y", "@modelcontextprotocol/server-filesystem", "/tmp"])
            .trusted()
            .with_priority(5);
        assert_eq!(server.transport_type, TransportType::Stdio);
        assert_eq!(server.args.len(), 3);
        assert!(server.trust);
        assert_eq!(server.priority, 5);
    }

    #[test]
    fn parses_mcp_settings_json() {
        let json = r#"{
            "mcpServers": {
                "filesystem": {
                    "transportType": "stdio",
                    "command": "npx",
                    "args": ["-y", "server-filesystem"],
                    "priority": 10
                },
                "remote": {
                    "transportType": "http",
                    "url": "https://example.com/mcp",
                    "headers": {"Authorization": "Bearer $TOKEN"},
                    "trust": true,
                    "timeout": 5000
                }
            },
            "globalSettings": {
                "defaultTimeout": 15000,
                "confirmationLevel": "high",
                "auditLogging": true
            }
        }"#;
        let settings: McpSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.list().len(), 2);
        assert_eq!(settings.global_settings.default_timeout, 15_000);
        assert_eq!(settings.global_settings.confirmation_level, ConfirmationLevel::High);
        assert!(settings.global_settings.audit_logging);

        let remote = settings.get("remote").unwrap();
        assert_eq!(remote.transport_type, TransportType::Http);
        assert!(remote.trust);
        assert_eq!(remote.timeout, Some(5000));
    }

    #[test]
    fn names_are_backfilled_from_the_map_key() {
        let json = r#"{"mcpServers": {"memory": {"transportType": "stdio", "command": "mem-server"}}}"#;
        let mut settings: McpSettings = serde_json::from_str(json).unwrap();
        settings.backfill_names();
        assert_eq!(settings.get("memory").unwrap().name, "memory");
    }

    #[test]
    fn list_by_priority_orders_descending_then_by_name() {
        let json = r#"{"mcpServers": {
            "low": {"transportType": "stdio", "command": "a", "priority": 1},
            "high": {"transportType": "stdio", "command": "b", "priority": 10},
            "also_low": {"transportType": "stdio", "command": "c", "priority": 1}
        }}"#;
        let mut settings: McpSettings = serde_json::from_str(json).unwrap();
        settings.backfill_names();
        let ordered = settings.list_by_priority();
        assert_eq!(ordered[0].name, "high");
        assert_eq!(ordered[1].name, "also_low");
        assert_eq!(ordered[2].name, "low");
    }

    #[test]
    fn expands_plain_and_braced_vars() {
        // SAFETY: no other thread in this test binary touches this var name.
        unsafe {
            std::env::set_var("CONDUIT_TEST_VAR", "hello");
        }
        assert_eq!(expand_env_vars("$CONDUIT_TEST_VAR world"), "hello world");
        assert_eq!(expand_env_vars("${CONDUIT_TEST_VAR}!"), "hello!");
        unsafe {
            std::env::remove_var("CONDUIT_TEST_VAR");
        }
    }

    #[test]
    fn braced_default_is_used_when_var_is_unset() {
        unsafe {
            std::env::remove_var("CONDUIT_TEST_UNSET");
        }
        assert_eq!(expand_env_vars("${CONDUIT_TEST_UNSET:-fallback}"), "fallback");
    }

    #[test]
    fn unset_plain_var_expands_to_empty() {
        unsafe {
            std::env::remove_var("CONDUIT_TEST_UNSET2");
        }
        assert_eq!(expand_env_vars("prefix-$CONDUIT_TEST_UNSET2-suffix"), "prefix--suffix");
    }

    #[test]
    fn dollar_without_identifier_is_left_verbatim() {
        assert_eq!(expand_env_vars("cost: $5"), "cost: $5");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp_settings.json");
        let mut settings = McpSettings::default();
        let mut server = McpServerConfig::stdio("echo").with_priority(2);
        server.name = "echo".to_string();
        settings.add(server);
        settings.global_settings.audit_logging = true;
        settings.save(&path).unwrap();

        let loaded = McpSettings::load(&path).unwrap();
        assert!(loaded.global_settings.audit_logging);
        assert_eq!(loaded.list().len(), 1);
    }
}
