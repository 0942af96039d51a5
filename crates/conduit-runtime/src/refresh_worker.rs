//! C12 `TokenRefreshWorker` (§4.12): scheduled OAuth token refresh.
//!
//! Each OAuth credential is scheduled at `expires_at − 20%·lifetime`,
//! clamped to `[expires_at−5min, now+24h]`. A background task wakes on a
//! fixed poll interval, asks `CredentialStore::list_oauth_expiring_within`
//! for anything due, and refreshes each one directly against the
//! provider's token endpoint — `ProviderRouter` is deliberately not
//! reused here since its own refresh path requires a client id it has no
//! way to be configured with; this worker owns that configuration via
//! [`ProviderClientIds`].

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use conduit_core::error::AppError;
use conduit_core::retry::RetryPolicy;
use conduit_core::types::AuthType;
use conduit_storage::error::StorageError;
use conduit_storage::{CredentialPatch, CredentialStore};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{RuntimeError, RuntimeResult};

/// Retry policy for a single refresh attempt: base 1s, factor 2, cap 30s,
/// ±10% jitter, capped at 5 attempts (§4.12 Execution).
const MAX_REFRESH_RETRIES: u32 = 5;

fn refresh_retry_policy() -> RetryPolicy {
    RetryPolicy {
        base: StdDuration::from_secs(1),
        factor: 2.0,
        cap: StdDuration::from_secs(30),
        jitter: 0.1,
    }
}

/// OAuth client ids per provider, required to call a refresh endpoint.
/// Absence for a provider that needs refreshing is a hard error at use
/// time rather than an invented placeholder client id.
#[derive(Debug, Clone, Default)]
pub struct ProviderClientIds {
    openai: Option<String>,
    anthropic: Option<String>,
    gemini: Option<String>,
}

impl ProviderClientIds {
    /// Start from no configured client ids.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the OpenAI OAuth client id.
    #[must_use]
    pub fn with_openai(mut self, client_id: impl Into<String>) -> Self {
        self.openai = Some(client_id.into());
        self
    }

    /// Set the Anthropic OAuth client id.
    #[must_use]
    pub fn with_anthropic(mut self, client_id: impl Into<String>) -> Self {
        self.anthropic = Some(client_id.into());
        self
    }

    /// Set the Gemini (Google) OAuth client id.
    #[must_use]
    pub fn with_gemini(mut self, client_id: impl Into<String>) -> Self {
        self.gemini = Some(client_id.into());
        self
    }

    fn get(&self, provider: &str) -> RuntimeResult<&str> {
        let configured = match provider {
            "openai" => &self.openai,
            "anthropic" => &self.anthropic,
            "gemini" => &self.gemini,
            other => return Err(RuntimeError::App(AppError::ProviderNotSupported(other.to_string()))),
        };
        configured
            .as_deref()
            .ok_or_else(|| RuntimeError::App(AppError::ConfigInvalid(format!("{provider}: no oauth client id configured"))))
    }
}

fn token_endpoint(provider: &str) -> RuntimeResult<&'static str> {
    match provider {
        "openai" => Ok("https://auth.openai.com/oauth/token"),
        "anthropic" => Ok("https://console.anthropic.com/v1/oauth/token"),
        "gemini" => Ok("https://oauth2.googleapis.com/token"),
        other => Err(RuntimeError::App(AppError::ProviderNotSupported(other.to_string()))),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    scope: Option<String>,
    token_type: Option<String>,
}

/// C12 `TokenRefreshWorker`.
pub struct TokenRefreshWorker {
    credentials: Arc<CredentialStore>,
    http: reqwest::Client,
    client_ids: ProviderClientIds,
}

impl TokenRefreshWorker {
    /// Construct a worker over a credential store and the client ids it's
    /// allowed to refresh with.
    pub fn new(credentials: Arc<CredentialStore>, client_ids: ProviderClientIds) -> RuntimeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()
            .map_err(|e| RuntimeError::App(AppError::ConfigInvalid(format!("failed to build http client: {e}"))))?;
        Ok(Self { credentials, http, client_ids })
    }

    /// §4.12 Scheduling: the next refresh time for a credential expiring at
    /// `expires_at`, whose full token lifetime was `lifetime`.
    #[must_use]
    pub fn next_refresh_at(expires_at: DateTime<Utc>, lifetime: Duration) -> DateTime<Utc> {
        let now = Utc::now();
        let ideal = expires_at - lifetime * 20 / 100;
        // Bounded above by the two "don't schedule later than this" limits,
        // below by "don't schedule in the past" — not a `[min, max]` clamp,
        // since the two upper bounds can themselves fall below `now`.
        let no_later_than_expiry_buffer = expires_at - Duration::minutes(5);
        let no_later_than_24h_out = now + Duration::hours(24);
        ideal.max(now).min(no_later_than_expiry_buffer).min(no_later_than_24h_out)
    }

    /// Credentials due for refresh within `window` from now.
    pub async fn due_within(&self, window: Duration) -> RuntimeResult<Vec<conduit_core::types::SavedAuthentication>> {
        self.credentials
            .list_oauth_expiring_within(window)
            .await
            .map_err(storage_err)
    }

    /// Refresh one credential, retrying transient (network/5xx) failures up
    /// to [`MAX_REFRESH_RETRIES`] times with exponential backoff. A 401 or
    /// an `invalid_grant` body is terminal — does not retry or reschedule.
    pub async fn refresh_one(&self, provider: &str, name: &str) -> RuntimeResult<conduit_core::types::SavedAuthentication> {
        let record = self
            .credentials
            .get(provider, AuthType::OAuth, name)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| RuntimeError::CredentialNotFound(format!("{provider}/{name}")))?;

        let refresh_token = record
            .credentials
            .get("refresh_token")
            .and_then(Value::as_str)
            .ok_or(RuntimeError::App(AppError::InvalidRefreshToken))?
            .to_string();

        let client_id = self.client_ids.get(provider)?.to_string();
        let endpoint = token_endpoint(provider)?;
        let policy = refresh_retry_policy();

        let mut last_err = None;
        for attempt in 0..MAX_REFRESH_RETRIES {
            match self.post_refresh(endpoint, &refresh_token, &client_id).await {
                Ok(Some(parsed)) => {
                    let mut credentials = std::collections::HashMap::new();
                    credentials.insert("access_token".to_string(), Value::String(parsed.access_token));
                    let next_refresh_token = parsed.refresh_token.unwrap_or(refresh_token.clone());
                    credentials.insert("refresh_token".to_string(), Value::String(next_refresh_token));
                    if let Some(scope) = parsed.scope {
                        credentials.insert("scope".to_string(), Value::String(scope));
                    }
                    if let Some(token_type) = parsed.token_type {
                        credentials.insert("token_type".to_string(), Value::String(token_type));
                    }
                    let expires_at = Utc::now() + Duration::seconds(parsed.expires_in);
                    let patch = CredentialPatch {
                        credentials: Some(credentials),
                        expires_at: Some(Some(expires_at)),
                    };

                    return self
                        .credentials
                        .update(provider, AuthType::OAuth, name, patch)
                        .await
                        .map_err(storage_err);
                },
                Ok(None) => return Err(RuntimeError::App(AppError::InvalidRefreshToken)),
                Err(e) => {
                    last_err = Some(e);
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                },
            }
        }

        Err(RuntimeError::App(AppError::RefreshFailed {
            retries: MAX_REFRESH_RETRIES,
            reason: last_err.map(|e| e.to_string()).unwrap_or_default(),
        }))
    }

    /// POST the refresh request. `Ok(None)` signals a terminal 401/`invalid_grant`
    /// (do not retry); `Err` signals a transient failure worth retrying.
    async fn post_refresh(&self, endpoint: &str, refresh_token: &str, client_id: &str) -> RuntimeResult<Option<TokenResponse>> {
        let response = self
            .http
            .post(endpoint)
            .json(&serde_json::json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
                "client_id": client_id,
            }))
            .send()
            .await
            .map_err(|e| RuntimeError::App(AppError::NetworkError(e.to_string())))?;

        if response.status().as_u16() == 401 {
            return Ok(None);
        }
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| RuntimeError::App(AppError::StreamFailure(format!("invalid token response: {e}"))))?;
        if body.get("error").and_then(Value::as_str) == Some("invalid_grant") {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RuntimeError::App(AppError::HttpError {
                status: status.as_u16(),
                body: body.to_string(),
            }));
        }

        serde_json::from_value(body)
            .map(Some)
            .map_err(|e| RuntimeError::App(AppError::StreamFailure(format!("malformed token response: {e}"))))
    }

    /// Spawn the background poll loop: every `poll_interval`, refresh every
    /// credential due within the same window. Runs until the returned
    /// handle is aborted or dropped.
    pub fn spawn(self: Arc<Self>, poll_interval: StdDuration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let window = Duration::from_std(poll_interval).unwrap_or(Duration::hours(24));
            loop {
                tokio::time::sleep(poll_interval).await;
                match self.due_within(window).await {
                    Ok(due) => {
                        for record in due {
                            if let Err(e) = self.refresh_one(&record.provider, &record.name).await {
                                tracing::warn!(provider = %record.provider, name = %record.name, error = %e, "oauth refresh failed");
                            }
                        }
                    },
                    Err(e) => tracing::warn!(error = %e, "failed to list credentials due for refresh"),
                }
            }
        })
    }
}

fn storage_err(e: StorageError) -> RuntimeError {
    RuntimeError::App(AppError::StorageError(e.to_string()))
}
