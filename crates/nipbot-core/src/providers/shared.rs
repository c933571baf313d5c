//! Provider-agnostic types shared by the model backend and the session client.

use std::fmt;

use anyhow::{Context, Result};
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard User-Agent header for nipbot API requests.
pub const USER_AGENT: &str = concat!("nipbot/", env!("CARGO_PKG_VERSION"));

/// Value shipped in `.env` templates; treated the same as an unset key.
pub const PLACEHOLDER_API_KEY: &str = "PLACEHOLDER_API_KEY";

// ============================================================================
// Config resolution helpers
// ============================================================================

/// Resolves an API key with precedence: config > env vars (in order).
///
/// Blank values and [`PLACEHOLDER_API_KEY`] are skipped. Returns `None` when no
/// usable key exists; the caller decides how to surface that.
pub fn resolve_api_key(config_api_key: Option<&str>, env_vars: &[&str]) -> Option<String> {
    resolve_api_key_with(config_api_key, env_vars, |name| std::env::var(name).ok())
}

/// Same as [`resolve_api_key`] with an injectable environment lookup.
pub fn resolve_api_key_with<F>(
    config_api_key: Option<&str>,
    env_vars: &[&str],
    lookup: F,
) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let usable = |raw: &str| {
        let trimmed = raw.trim();
        (!trimmed.is_empty() && trimmed != PLACEHOLDER_API_KEY).then(|| trimmed.to_string())
    };

    if let Some(key) = config_api_key.and_then(usable) {
        return Some(key);
    }

    env_vars
        .iter()
        .find_map(|name| lookup(name).as_deref().and_then(usable))
}

/// Resolves a base URL with precedence: env > config > default.
///
/// # Arguments
/// * `config_base_url` - Value from config file (if present)
/// * `env_var` - Environment variable name (e.g., "`GEMINI_BASE_URL`")
/// * `default_url` - Default URL if neither env nor config is set
/// * `provider_name` - Human-readable provider name for error messages
///
/// # Errors
/// Returns an error if the env or config value is not a valid URL.
pub fn resolve_base_url(
    config_base_url: Option<&str>,
    env_var: &str,
    default_url: &str,
    provider_name: &str,
) -> Result<String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, provider_name)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    Ok(default_url.to_string())
}

/// Validates that a URL is well-formed.
fn validate_url(url: &str, provider_name: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid {provider_name} base URL: {url}"))?;
    Ok(())
}

// ============================================================================
// Conversation history
// ============================================================================

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// One `(role, text)` pair of the history sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub text: String,
}

impl HistoryEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

// ============================================================================
// Stream records
// ============================================================================

/// A web citation returned by the provider's search grounding.
///
/// Both fields are optional because the upstream omits them freely; filtering
/// happens later against the domain allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Citation {
    pub title: Option<String>,
    pub uri: Option<String>,
}

/// Narrow record produced by the provider translation boundary.
///
/// Nothing downstream of the provider module ever sees raw upstream JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// Incremental answer text.
    Text(String),
    /// Incremental model reasoning ("thought") text.
    Thought(String),
    /// Latest grounding citations seen on the stream (replaces earlier ones).
    Grounding(Vec<Citation>),
    /// The response was stopped by the provider's safety filters.
    Blocked { reason: String },
    /// API-level error object delivered inside the stream.
    Error { status: String, message: String },
}

/// Boxed stream of provider records.
pub type ModelStream = BoxStream<'static, ProviderResult<ModelEvent>>;

// ============================================================================
// Errors
// ============================================================================

/// Categories of provider errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Missing or unusable configuration (e.g. no API key); no request was sent
    Config,
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Request or stream read timed out
    Timeout,
    /// Connection failure or a dropped stream
    Network,
    /// Request could not be built, or the response body could not be decoded
    Request,
    /// Failed to read the response stream
    Parse,
    /// API-level error returned by the provider inside the stream
    ApiError,
    /// Response blocked by provider safety filters
    Blocked,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Config => write!(f, "config"),
            ProviderErrorKind::HttpStatus => write!(f, "http_status"),
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::Network => write!(f, "network"),
            ProviderErrorKind::Request => write!(f, "request"),
            ProviderErrorKind::Parse => write!(f, "parse"),
            ProviderErrorKind::ApiError => write!(f, "api_error"),
            ProviderErrorKind::Blocked => write!(f, "blocked"),
        }
    }
}

/// Structured error from the provider with kind and details.
#[derive(Debug, Clone)]
pub struct ProviderError {
    /// Error category
    pub kind: ProviderErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ProviderError {
    /// Creates a new provider error.
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Config, message)
    }

    /// Creates an HTTP status error.
    pub fn http_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}");
        let details = if body.is_empty() {
            None
        } else {
            // Try to extract a cleaner error message from JSON
            if let Ok(json) = serde_json::from_str::<Value>(body)
                && let Some(error_obj) = json.get("error")
                && let Some(msg) = error_obj.get("message").and_then(|v| v.as_str())
            {
                return Self {
                    kind: ProviderErrorKind::HttpStatus,
                    message: format!("HTTP {status}: {msg}"),
                    details: Some(body.to_string()),
                };
            }
            Some(body.to_string())
        };
        Self {
            kind: ProviderErrorKind::HttpStatus,
            message,
            details,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    /// Creates a connection error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    /// Creates a request construction or body decoding error.
    pub fn request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Request, message)
    }

    /// Creates an API error (from mid-stream error event).
    pub fn api_error(error_type: &str, message: &str) -> Self {
        Self {
            kind: ProviderErrorKind::ApiError,
            message: format!("{error_type}: {message}"),
            details: None,
        }
    }

    /// Creates a safety-block error.
    pub fn blocked(reason: &str) -> Self {
        Self::new(ProviderErrorKind::Blocked, format!("Response blocked: {reason}"))
    }

    /// Message and details joined, for pattern matching.
    pub fn full_text(&self) -> String {
        match &self.details {
            Some(details) => format!("{}\n{}", self.message, details),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let owned: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| {
            owned
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_api_key_config_wins_over_env() {
        let key = resolve_api_key_with(
            Some("from-config"),
            &["GEMINI_API_KEY"],
            env(&[("GEMINI_API_KEY", "from-env")]),
        );
        assert_eq!(key.as_deref(), Some("from-config"));
    }

    #[test]
    fn test_api_key_env_order_and_placeholder() {
        let key = resolve_api_key_with(
            Some("  "),
            &["GEMINI_API_KEY", "VITE_API_KEY", "API_KEY"],
            env(&[
                ("GEMINI_API_KEY", PLACEHOLDER_API_KEY),
                ("VITE_API_KEY", ""),
                ("API_KEY", "last-resort"),
            ]),
        );
        assert_eq!(key.as_deref(), Some("last-resort"));
    }

    #[test]
    fn test_api_key_missing() {
        let key = resolve_api_key_with(None, &["GEMINI_API_KEY"], env(&[]));
        assert!(key.is_none());
    }

    #[test]
    fn test_http_status_extracts_upstream_message() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = ProviderError::http_status(429, body);
        assert_eq!(err.kind, ProviderErrorKind::HttpStatus);
        assert_eq!(err.message, "HTTP 429: Resource has been exhausted");
        assert!(err.full_text().contains("RESOURCE_EXHAUSTED"));
    }

    #[test]
    fn test_http_status_plain_body() {
        let err = ProviderError::http_status(502, "bad gateway");
        assert_eq!(err.message, "HTTP 502");
        assert_eq!(err.details.as_deref(), Some("bad gateway"));
    }

    #[test]
    fn test_history_role_serializes_lowercase() {
        let json = serde_json::to_string(&HistoryEntry::model("hi")).unwrap();
        assert_eq!(json, r#"{"role":"model","text":"hi"}"#);
    }
}
