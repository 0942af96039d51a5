//! Per-provider HTTP client construction: base URL, auth headers, pooling.

use std::sync::Arc;
use std::time::Duration;

use conduit_core::error::{AppError, AppResult};
use conduit_core::http::SafeDnsResolver;
use conduit_core::types::AuthType;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_OAUTH_BETA: &str = "oauth-2025-04-20";
const CLAUDE_CODE_PREAMBLE: &str = "You are Claude Code, Anthropic's official CLI for Claude.";
const CODEX_USER_AGENT: &str = "codex_cli_rs/0.1 (conduit)";

/// Builds the single shared, SSRF-safe [`reqwest::Client`] and computes the
/// per-`(provider, auth_type)` base URL and header set.
#[derive(Clone)]
pub struct HttpClientFactory {
    client: reqwest::Client,
}

impl HttpClientFactory {
    /// Construct the factory. Fails only if the underlying TLS backend
    /// cannot be initialized.
    pub fn new() -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .dns_resolver(Arc::new(SafeDnsResolver))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| AppError::ConfigInvalid(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }

    /// The shared pooled client every provider request is sent through.
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Base URL for a `(provider, auth_type)` pair.
    pub fn base_url(provider: &str, auth_type: AuthType) -> AppResult<&'static str> {
        match (provider, auth_type) {
            ("openai", _) => Ok("https://api.openai.com"),
            ("anthropic", _) => Ok("https://api.anthropic.com"),
            ("gemini", AuthType::ApiKey) => Ok("https://generativelanguage.googleapis.com"),
            ("gemini", AuthType::OAuth | AuthType::ServiceAccount) => {
                Ok("https://cloudcode-pa.googleapis.com")
            }
            _ => Err(AppError::ProviderNotSupported(provider.to_string())),
        }
    }

    /// Build the request headers for `provider`/`auth_type`, given the
    /// resolved secret (`api_key` or `access_token`, never logged raw).
    pub fn headers(provider: &str, auth_type: AuthType, secret: &str) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        match (provider, auth_type) {
            ("anthropic", AuthType::ApiKey) => {
                headers.insert(HeaderName::from_static("x-api-key"), sensitive(secret)?);
                headers.insert(
                    HeaderName::from_static("anthropic-version"),
                    HeaderValue::from_static(ANTHROPIC_VERSION),
                );
            },
            ("anthropic", AuthType::OAuth) => {
                headers.insert(reqwest::header::AUTHORIZATION, bearer(secret)?);
                headers.insert(
                    HeaderName::from_static("anthropic-version"),
                    HeaderValue::from_static(ANTHROPIC_VERSION),
                );
                headers.insert(
                    HeaderName::from_static("anthropic-beta"),
                    HeaderValue::from_static(ANTHROPIC_OAUTH_BETA),
                );
            },
            ("openai", AuthType::ApiKey) => {
                headers.insert(reqwest::header::AUTHORIZATION, bearer(secret)?);
            },
            ("openai", AuthType::OAuth) => {
                headers.insert(reqwest::header::AUTHORIZATION, bearer(secret)?);
                headers.insert(
                    reqwest::header::USER_AGENT,
                    HeaderValue::from_static(CODEX_USER_AGENT),
                );
            },
            ("gemini", AuthType::ApiKey) => {
                // the key is appended as a `?key=` query parameter at request
                // time, not carried as a header.
            },
            ("gemini", AuthType::OAuth | AuthType::ServiceAccount) => {
                headers.insert(reqwest::header::AUTHORIZATION, bearer(secret)?);
                headers.insert(
                    HeaderName::from_static("x-goog-api-client"),
                    HeaderValue::from_static("conduit-agent-runtime"),
                );
            },
            _ => return Err(AppError::ProviderNotSupported(provider.to_string())),
        }

        Ok(headers)
    }

    /// The preamble every Anthropic request's `system` field must be
    /// prefixed with, regardless of the session's own prompt stack.
    #[must_use]
    pub const fn anthropic_preamble() -> &'static str {
        CLAUDE_CODE_PREAMBLE
    }
}

fn sensitive(value: &str) -> AppResult<HeaderValue> {
    let mut header = HeaderValue::try_from(value)
        .map_err(|e| AppError::InvalidCredentials(format!("invalid header characters: {e}")))?;
    header.set_sensitive(true);
    Ok(header)
}

fn bearer(token: &str) -> AppResult<HeaderValue> {
    sensitive(&format!("Bearer {token}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_resolves_per_provider_and_auth() {
        assert_eq!(
            HttpClientFactory::base_url("openai", AuthType::ApiKey).unwrap(),
            "https://api.openai.com"
        );
        assert_eq!(
            HttpClientFactory::base_url("gemini", AuthType::ApiKey).unwrap(),
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(
            HttpClientFactory::base_url("gemini", AuthType::OAuth).unwrap(),
            "https://cloudcode-pa.googleapis.com"
        );
    }

    #[test]
    fn unknown_provider_is_not_supported() {
        let err = HttpClientFactory::base_url("cohere", AuthType::ApiKey).unwrap_err();
        assert!(matches!(err, AppError::ProviderNotSupported(p) if p == "cohere"));
    }

    #[test]
    fn api_key_with_newline_is_rejected() {
        let err = HttpClientFactory::headers("anthropic", AuthType::ApiKey, "bad\nkey").unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials(_)));
    }

    #[test]
    fn anthropic_api_key_headers_carry_version_and_key() {
        let headers = HttpClientFactory::headers("anthropic", AuthType::ApiKey, "sk-ant-test").unwrap();
        assert!(headers.contains_key("x-api-key"));
        assert_eq!(headers.get("anthropic-version").unwrap(), ANTHROPIC_VERSION);
    }

    #[test]
    fn gemini_api_key_carries_no_auth_header() {
        let headers = HttpClientFactory::headers("gemini", AuthType::ApiKey, "AIza-test").unwrap();
        assert!(!headers.contains_key(reqwest::header::AUTHORIZATION));
    }
}
