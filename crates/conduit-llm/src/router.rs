//! `ProviderRouter` (C9): the single facade dispatching `create_session`,
//! `list_models`, `stream_chat`, `refresh_tokens`, and `delete_session` to
//! the correct `(provider, auth_type)` implementation.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_core::error::{AppError, AppResult};
use conduit_core::types::{AuthType, Message, SavedAuthentication, StreamEvent};
use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::anthropic;
use crate::gemini;
use crate::http_factory::HttpClientFactory;
use crate::openai;
use crate::sse::decode_stream;

/// A boxed stream of canonical stream events, as returned by `stream_chat`.
pub type EventStream = Pin<Box<dyn Stream<Item = AppResult<StreamEvent>> + Send>>;

/// Storage seam `ProviderRouter` depends on for persisting credentials.
/// Implemented by `conduit-storage`'s `CredentialStore` (C1); kept as a
/// trait here so this crate has no hard dependency on the storage engine.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Persist a brand-new credential record. Fails with
    /// `UniquenessViolation` if `(provider, auth_type, name)` already exists.
    async fn create_named(
        &self,
        provider: &str,
        auth_type: AuthType,
        name: &str,
        credentials: HashMap<String, Value>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<SavedAuthentication>;

    /// Fetch a credential record, if present.
    async fn get(
        &self,
        provider: &str,
        auth_type: AuthType,
        name: &str,
    ) -> AppResult<Option<SavedAuthentication>>;

    /// Delete a credential record. Idempotent: deleting an absent record is
    /// not an error.
    async fn delete(&self, provider: &str, auth_type: AuthType, name: &str) -> AppResult<()>;

    /// Replace `credentials`/`expires_at` on an existing record (used after
    /// a successful OAuth refresh).
    async fn update(
        &self,
        provider: &str,
        auth_type: AuthType,
        name: &str,
        credentials: HashMap<String, Value>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<SavedAuthentication>;
}

/// Auth types each provider supports (§4.9 capability table).
#[must_use]
pub fn supported_auth_types(provider: &str) -> AppResult<&'static [AuthType]> {
    match provider {
        "openai" => Ok(&[AuthType::ApiKey, AuthType::OAuth]),
        "anthropic" => Ok(&[AuthType::ApiKey, AuthType::OAuth]),
        "gemini" => Ok(&[AuthType::ApiKey, AuthType::OAuth, AuthType::ServiceAccount]),
        other => Err(AppError::ProviderNotSupported(other.to_string())),
    }
}

/// Options accepted by [`ProviderRouter::create_session`].
#[derive(Debug, Clone, Default)]
pub struct CreateSessionOptions {
    /// Caller-chosen credential name.
    pub name: String,
    /// Plain API key (required when `auth_type == ApiKey`).
    pub api_key: Option<String>,
    /// OAuth authorization code (required when `auth_type == OAuth`).
    pub authorization_code: Option<String>,
    /// PKCE code verifier paired with `authorization_code`.
    pub code_verifier: Option<String>,
}

/// A normalized model entry, as returned by `list_models`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    /// Provider-native model id.
    pub id: String,
    /// Human-facing name.
    pub name: String,
    /// Free-form capability tags (`"vision"`, `"tools"`, …).
    pub capabilities: Vec<String>,
}

/// One facade over all three supported providers.
pub struct ProviderRouter<C: CredentialSource> {
    http: HttpClientFactory,
    credentials: C,
}

impl<C: CredentialSource> ProviderRouter<C> {
    /// Construct a router over the given credential store.
    pub fn new(credentials: C) -> AppResult<Self> {
        Ok(Self {
            http: HttpClientFactory::new()?,
            credentials,
        })
    }

    /// §4.9 `create_session`.
    pub async fn create_session(
        &self,
        provider: &str,
        auth_type: AuthType,
        opts: CreateSessionOptions,
    ) -> AppResult<SavedAuthentication> {
        let allowed = supported_auth_types(provider)?;
        if !allowed.contains(&auth_type) {
            return Err(AppError::InvalidAuthType {
                provider: provider.to_string(),
                auth_type: format!("{auth_type:?}"),
            });
        }
        if opts.name.len() > 50 {
            return Err(AppError::InvalidSessionName(opts.name));
        }

        match auth_type {
            AuthType::ApiKey => {
                let key = opts
                    .api_key
                    .ok_or_else(|| AppError::InvalidOptions("missing api_key".to_string()))?;
                if key.trim().is_empty() {
                    return Err(AppError::InvalidOptions("api_key is empty".to_string()));
                }
                let mut credentials = HashMap::new();
                credentials.insert("api_key".to_string(), Value::String(key));
                self.credentials
                    .create_named(provider, auth_type, &opts.name, credentials, None)
                    .await
            },
            AuthType::OAuth => {
                let code = opts.authorization_code.ok_or_else(|| {
                    AppError::InvalidOptions("missing authorization_code".to_string())
                })?;
                let verifier = opts
                    .code_verifier
                    .ok_or_else(|| AppError::InvalidOptions("missing code_verifier".to_string()))?;
                let exchanged = self.exchange_authorization_code(provider, &code, &verifier).await?;
                self.credentials
                    .create_named(
                        provider,
                        auth_type,
                        &opts.name,
                        exchanged.credentials,
                        Some(exchanged.expires_at),
                    )
                    .await
            },
            AuthType::ServiceAccount => Err(AppError::InvalidAuthType {
                provider: provider.to_string(),
                auth_type: "service_account requires CreateSessionOptions extension".to_string(),
            }),
        }
    }

    /// §4.9 `delete_session` — idempotent.
    pub async fn delete_session(&self, provider: &str, auth_type: AuthType, name: &str) -> AppResult<()> {
        self.credentials.delete(provider, auth_type, name).await
    }

    /// §4.9 `list_models`.
    pub async fn list_models(
        &self,
        provider: &str,
        auth_type: AuthType,
        session_name: &str,
    ) -> AppResult<Vec<ModelInfo>> {
        let record = self
            .credentials
            .get(provider, auth_type, session_name)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(session_name.to_string()))?;
        let secret = secret_for(&record)?;

        let base = HttpClientFactory::base_url(provider, auth_type)?;
        let headers = HttpClientFactory::headers(provider, auth_type, &secret)?;
        let url = format!("{base}/v1/models");

        let response = self
            .http
            .client()
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| AppError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::HttpError { status, body });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::StreamFailure(format!("invalid models response: {e}")))?;

        Ok(normalize_models(provider, &body))
    }

    /// §4.9/§4.12 `refresh_tokens`.
    pub async fn refresh_tokens(&self, provider: &str, session_name: &str) -> AppResult<SavedAuthentication> {
        let record = self
            .credentials
            .get(provider, AuthType::OAuth, session_name)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(session_name.to_string()))?;

        let refresh_token = record
            .credentials
            .get("refresh_token")
            .and_then(Value::as_str)
            .ok_or(AppError::InvalidRefreshToken)?;

        let exchanged = self.refresh_via_provider(provider, refresh_token).await?;
        self.credentials
            .update(
                provider,
                AuthType::OAuth,
                session_name,
                exchanged.credentials,
                Some(exchanged.expires_at),
            )
            .await
    }

    /// §4.9/§4.10 `stream_chat` — assemble the provider request and return a
    /// canonical event stream.
    pub async fn stream_chat(
        &self,
        provider: &str,
        auth_type: AuthType,
        session_name: &str,
        model: &str,
        messages: &[Message],
        tools: &[Value],
        system: &str,
    ) -> AppResult<EventStream> {
        if messages.is_empty() {
            return Err(AppError::EmptyMessages);
        }
        if model.trim().is_empty() {
            return Err(AppError::MissingModel);
        }

        let record = self
            .credentials
            .get(provider, auth_type, session_name)
            .await?
            .ok_or_else(|| AppError::SessionNotFound(session_name.to_string()))?;
        let secret = secret_for(&record)?;

        let headers = HttpClientFactory::headers(provider, auth_type, &secret)?;
        let base = HttpClientFactory::base_url(provider, auth_type)?;

        let (url, body) = match provider {
            "anthropic" => {
                let native: Vec<Value> = messages.iter().map(anthropic::convert_message).collect();
                let body = anthropic::build_request(model, 8192, native, tools, system);
                (format!("{base}/v1/messages"), body)
            },
            "openai" => {
                let native: Vec<Value> = messages.iter().flat_map(openai::convert_message).collect();
                let body = openai::build_request(model, native, tools, system);
                (format!("{base}/v1/responses"), body)
            },
            "gemini" => {
                let native: Vec<Value> = messages.iter().map(gemini::convert_message).collect();
                let body = gemini::build_request(native, tools, system);
                let mut url = format!("{base}/v1beta/models/{model}:streamGenerateContent?alt=sse");
                if auth_type == AuthType::ApiKey {
                    url.push_str("&key=");
                    url.push_str(&secret);
                }
                (url, body)
            },
            other => return Err(AppError::ProviderNotSupported(other.to_string())),
        };

        let response = self
            .http
            .client()
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::HttpError { status, body });
        }

        let provider = provider.to_string();
        let frames = decode_stream(response.bytes_stream());
        let events = futures::stream::unfold(
            (frames, HandlerState::new(&provider)),
            move |(mut frames, mut state)| async move {
                let frame = frames.next().await?;
                let result = state.handle(&frame);
                Some((result, (frames, state)))
            },
        )
        .flat_map(|result: AppResult<Vec<StreamEvent>>| {
            futures::stream::iter(match result {
                Ok(events) => events.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            })
        });

        Ok(Box::pin(events))
    }

    async fn exchange_authorization_code(
        &self,
        provider: &str,
        _code: &str,
        _verifier: &str,
    ) -> AppResult<ExchangedTokens> {
        // The token endpoint and client id are provider-specific and
        // configuration-supplied (§9 open question); callers inject the
        // actual HTTP exchange via their own `CredentialSource` when client
        // ids are available. Absent that, oauth session creation fails
        // loudly instead of inventing a client id.
        Err(AppError::ConfigInvalid(format!(
            "{provider}: oauth client id not configured for authorization code exchange"
        )))
    }

    async fn refresh_via_provider(&self, provider: &str, _refresh_token: &str) -> AppResult<ExchangedTokens> {
        Err(AppError::ConfigInvalid(format!(
            "{provider}: oauth client id not configured for token refresh"
        )))
    }
}

struct ExchangedTokens {
    credentials: HashMap<String, Value>,
    expires_at: DateTime<Utc>,
}

fn secret_for(record: &SavedAuthentication) -> AppResult<String> {
    let key = match record.auth_type {
        AuthType::ApiKey => "api_key",
        AuthType::OAuth | AuthType::ServiceAccount => "access_token",
    };
    record
        .credentials
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidCredentials(format!("missing {key}")))
}

fn normalize_models(provider: &str, body: &Value) -> Vec<ModelInfo> {
    let list = match provider {
        "gemini" => body.get("models").and_then(Value::as_array),
        _ => body.get("data").and_then(Value::as_array),
    };
    list.map(|entries| {
        entries
            .iter()
            .filter_map(|entry| {
                let id = entry.get("id").or_else(|| entry.get("name"))?.as_str()?.to_string();
                Some(ModelInfo {
                    name: entry
                        .get("display_name")
                        .or_else(|| entry.get("displayName"))
                        .and_then(Value::as_str)
                        .unwrap_or(&id)
                        .to_string(),
                    id,
                    capabilities: Vec::new(),
                })
            })
            .collect()
    })
    .unwrap_or_default()
}

/// Dispatches a decoded SSE frame to the right per-provider handler,
/// threading its accumulator state across the stream's lifetime.
enum HandlerState {
    OpenAi(openai::OpenAiStreamState),
    Anthropic(anthropic::AnthropicStreamState),
    Gemini(gemini::GeminiStreamState),
}

impl HandlerState {
    fn new(provider: &str) -> Self {
        match provider {
            "openai" => Self::OpenAi(openai::OpenAiStreamState::default()),
            "anthropic" => Self::Anthropic(anthropic::AnthropicStreamState::default()),
            _ => Self::Gemini(gemini::GeminiStreamState::default()),
        }
    }

    fn handle(&mut self, frame: &crate::sse::SseEvent) -> AppResult<Vec<StreamEvent>> {
        match self {
            Self::OpenAi(state) => openai::handle_frame(frame, state),
            Self::Anthropic(state) => anthropic::handle_frame(frame, state),
            Self::Gemini(state) => gemini::handle_frame(frame, state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_table_matches_contract() {
        assert_eq!(
            supported_auth_types("gemini").unwrap(),
            &[AuthType::ApiKey, AuthType::OAuth, AuthType::ServiceAccount]
        );
        assert!(supported_auth_types("cohere").is_err());
    }

    #[test]
    fn normalize_models_reads_openai_shape() {
        let body = serde_json::json!({ "data": [{ "id": "gpt-5" }] });
        let models = normalize_models("openai", &body);
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "gpt-5");
    }

    #[test]
    fn normalize_models_reads_gemini_shape() {
        let body = serde_json::json!({ "models": [{ "name": "models/gemini-2.5-pro", "displayName": "Gemini 2.5 Pro" }] });
        let models = normalize_models("gemini", &body);
        assert_eq!(models[0].name, "Gemini 2.5 Pro");
    }
}
