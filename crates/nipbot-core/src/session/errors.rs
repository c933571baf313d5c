//! User-facing classification of session failures.

use std::fmt;

use crate::providers::{ProviderError, ProviderErrorKind};

/// Fallback phrase when the upstream gave no usable message.
pub const UNEXPECTED_ERROR_MESSAGE: &str =
    "공식 데이터를 가져오는 중 예상치 못한 문제가 발생했습니다.";

const INVALID_KEY_PATTERNS: &[&str] = &[
    "api_key_invalid",
    "api key not valid",
    "permission_denied",
    "unauthenticated",
    "http 401",
    "http 403",
];

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "http 429",
    "resource_exhausted",
    "quota",
    "rate limit",
    "too many requests",
];

const SAFETY_PATTERNS: &[&str] = &["safety", "blocked", "prohibited_content", "blocklist"];

/// What went wrong, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    /// No API key configured; nothing was sent.
    MissingApiKey,
    /// The upstream rejected the key.
    InvalidApiKey,
    /// Rate limit or quota exhausted.
    RateLimited,
    /// Prompt or answer blocked by safety filters.
    SafetyBlocked,
    /// Connection failure, timeout, or a dropped stream.
    Network,
    /// Any other upstream failure.
    Upstream,
}

/// A terminal session failure with its raw cause kept for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    /// Provider message the classification was derived from.
    pub detail: String,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Classifies a provider error by kind first, then by pattern-matching its text.
    pub fn from_provider(err: &ProviderError) -> Self {
        let kind = match err.kind {
            ProviderErrorKind::Config => ChatErrorKind::MissingApiKey,
            ProviderErrorKind::Blocked => ChatErrorKind::SafetyBlocked,
            _ => {
                let text = err.full_text().to_lowercase();
                let matches_any = |patterns: &[&str]| patterns.iter().any(|p| text.contains(p));
                if matches_any(INVALID_KEY_PATTERNS) {
                    ChatErrorKind::InvalidApiKey
                } else if matches_any(RATE_LIMIT_PATTERNS) {
                    ChatErrorKind::RateLimited
                } else if matches_any(SAFETY_PATTERNS) {
                    ChatErrorKind::SafetyBlocked
                } else if matches!(
                    err.kind,
                    ProviderErrorKind::Timeout | ProviderErrorKind::Network
                ) {
                    ChatErrorKind::Network
                } else {
                    ChatErrorKind::Upstream
                }
            }
        };
        Self::new(kind, err.message.clone())
    }

    /// Localized phrase shown in the transcript.
    pub fn user_message(&self) -> String {
        match self.kind {
            ChatErrorKind::MissingApiKey => self.detail.clone(),
            ChatErrorKind::InvalidApiKey => {
                "API 키가 유효하지 않습니다. GEMINI_API_KEY 설정을 확인해주세요.".to_string()
            }
            ChatErrorKind::RateLimited => {
                "요청이 너무 많아 일시적으로 제한되었습니다. 잠시 후 다시 시도해주세요."
                    .to_string()
            }
            ChatErrorKind::SafetyBlocked => {
                "안전 정책에 따라 답변이 차단되었습니다. 질문을 다르게 표현해 다시 시도해주세요."
                    .to_string()
            }
            ChatErrorKind::Network => {
                "네트워크 연결에 실패했습니다. 인터넷 연결을 확인한 뒤 다시 시도해주세요."
                    .to_string()
            }
            ChatErrorKind::Upstream => {
                let detail = self.detail.trim();
                if detail.is_empty() {
                    UNEXPECTED_ERROR_MESSAGE.to_string()
                } else {
                    detail.to_string()
                }
            }
        }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ChatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_is_missing_key() {
        let err = ChatError::from_provider(&ProviderError::config("no key"));
        assert_eq!(err.kind, ChatErrorKind::MissingApiKey);
        assert_eq!(err.user_message(), "no key");
    }

    #[test]
    fn test_rate_limit_from_http_status() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted (e.g. check quota).","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = ChatError::from_provider(&ProviderError::http_status(429, body));
        assert_eq!(err.kind, ChatErrorKind::RateLimited);
        assert!(err.user_message().contains("잠시 후"));
    }

    #[test]
    fn test_invalid_key_from_http_status() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let err = ChatError::from_provider(&ProviderError::http_status(400, body));
        assert_eq!(err.kind, ChatErrorKind::InvalidApiKey);
    }

    #[test]
    fn test_blocked_kind_is_safety() {
        let err = ChatError::from_provider(&ProviderError::blocked("SAFETY"));
        assert_eq!(err.kind, ChatErrorKind::SafetyBlocked);
    }

    #[test]
    fn test_stream_error_mentioning_safety() {
        let err = ChatError::from_provider(&ProviderError::api_error(
            "INVALID_ARGUMENT",
            "Request blocked due to SAFETY settings",
        ));
        assert_eq!(err.kind, ChatErrorKind::SafetyBlocked);
    }

    #[test]
    fn test_transport_kinds_are_network() {
        let err = ChatError::from_provider(&ProviderError::timeout("Request timed out"));
        assert_eq!(err.kind, ChatErrorKind::Network);
        let err = ChatError::from_provider(&ProviderError::network("Connection failed: refused"));
        assert_eq!(err.kind, ChatErrorKind::Network);
    }

    #[test]
    fn test_request_error_is_upstream() {
        let err = ChatError::from_provider(&ProviderError::request("Request error: bad body"));
        assert_eq!(err.kind, ChatErrorKind::Upstream);
        assert_eq!(err.user_message(), "Request error: bad body");
    }

    #[test]
    fn test_upstream_keeps_detail_or_falls_back() {
        let err = ChatError::from_provider(&ProviderError::http_status(500, ""));
        assert_eq!(err.kind, ChatErrorKind::Upstream);
        assert_eq!(err.user_message(), "HTTP 500");

        let empty = ChatError::new(ChatErrorKind::Upstream, "  ");
        assert_eq!(empty.user_message(), UNEXPECTED_ERROR_MESSAGE);
    }
}
