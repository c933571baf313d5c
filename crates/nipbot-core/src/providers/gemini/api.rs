//! Gemini API key provider (Generative Language API).

use anyhow::Result;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};

use super::request::{GenerationOptions, build_gemini_request};
use super::sse::GeminiSseParser;
use crate::config::Config;
use crate::providers::shared::{USER_AGENT, resolve_api_key, resolve_base_url};
use crate::providers::{HistoryEntry, ModelStream, ProviderError, ProviderResult};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "VITE_API_KEY", "API_KEY"];

/// User-facing text for a missing credential.
pub const MISSING_API_KEY_MESSAGE: &str = "API_KEY가 설정되지 않았습니다. GEMINI_API_KEY 환경 변수 또는 config.toml의 api_key를 확인해주세요.";

/// Gemini API configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// `None` when no usable key was found; requests then fail before any I/O.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub system_instruction: Option<String>,
    pub options: GenerationOptions,
}

impl GeminiConfig {
    /// Creates a config from the loaded [`Config`] and the environment.
    ///
    /// Authentication resolution order:
    /// 1. `api_key` in config.toml
    /// 2. `GEMINI_API_KEY`, `VITE_API_KEY`, `API_KEY` environment variables
    ///
    /// The base URL honours `GEMINI_BASE_URL`, then `base_url` in config.toml.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the system prompt file
    /// cannot be read.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), API_KEY_ENV_VARS);
        let base_url = resolve_base_url(
            config.base_url.as_deref(),
            "GEMINI_BASE_URL",
            DEFAULT_BASE_URL,
            "Gemini",
        )?;

        Ok(Self {
            api_key,
            base_url,
            model: config.model.clone(),
            system_instruction: Some(config.effective_system_prompt()?),
            options: GenerationOptions {
                web_search: config.web_search,
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
            },
        })
    }

    pub fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

/// Gemini client.
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Opens a streaming generation request for `history`.
    ///
    /// # Errors
    /// Returns a `Config` error without touching the network when no API key
    /// is configured, an `HttpStatus`, `Timeout`, `Network` or `Request`
    /// error when the request fails.
    pub async fn send_messages_stream(&self, history: &[HistoryEntry]) -> ProviderResult<ModelStream> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(ProviderError::config(MISSING_API_KEY_MESSAGE));
        };

        let request = build_gemini_request(
            history,
            self.config.system_instruction.as_deref(),
            &self.config.options,
        );
        let url = self.config.stream_url();
        tracing::debug!(model = %self.config.model, turns = history.len(), "opening Gemini stream");

        let response = self
            .http
            .post(&url)
            .headers(build_headers(api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Gemini request rejected");
            return Err(ProviderError::http_status(status.as_u16(), &error_body));
        }

        Ok(GeminiSseParser::new(response.bytes_stream()).boxed())
    }
}

/// Classifies a reqwest error into a `ProviderError`.
pub fn classify_reqwest_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ProviderError::network(format!("Connection failed: {e}"))
    } else if e.is_request() {
        ProviderError::network(format!("Failed to send request: {e}"))
    } else {
        ProviderError::request(format!("Request error: {e}"))
    }
}

fn build_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-goog-api-key",
        HeaderValue::from_str(api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    headers.insert("accept", HeaderValue::from_static("text/event-stream"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(api_key: Option<&str>) -> GeminiConfig {
        GeminiConfig {
            api_key: api_key.map(str::to_string),
            base_url: "http://127.0.0.1:9".to_string(),
            model: "gemini-2.0-flash".to_string(),
            system_instruction: None,
            options: GenerationOptions::default(),
        }
    }

    #[test]
    fn test_stream_url_uses_sse_endpoint() {
        assert_eq!(
            test_config(None).stream_url(),
            "http://127.0.0.1:9/models/gemini-2.0-flash:streamGenerateContent?alt=sse"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_request() {
        let client = GeminiClient::new(test_config(None));
        let Err(err) = client
            .send_messages_stream(&[HistoryEntry::user("질문")])
            .await
        else {
            panic!("expected a config error");
        };
        assert_eq!(err.kind, crate::providers::ProviderErrorKind::Config);
        assert_eq!(err.message, MISSING_API_KEY_MESSAGE);
    }

    #[test]
    fn test_builder_error_is_not_network() {
        let Err(err) = reqwest::Client::new().get("not a url").build() else {
            panic!("expected a builder error");
        };
        let classified = classify_reqwest_error(&err);
        assert_eq!(classified.kind, crate::providers::ProviderErrorKind::Request);
        assert!(classified.message.starts_with("Request error"));
    }

    #[test]
    fn test_headers_carry_api_key() {
        let headers = build_headers("secret");
        assert_eq!(headers["x-goog-api-key"], "secret");
        assert_eq!(headers["accept"], "text/event-stream");
    }
}
