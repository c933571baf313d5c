//! LLM provider implementations.
//!
//! The provider layer is the only place that touches raw upstream payloads;
//! it yields [`ModelEvent`] records to the session client.

pub mod gemini;
pub mod shared;

pub use shared::{
    ChatRole, Citation, HistoryEntry, ModelEvent, ModelStream, ProviderError, ProviderErrorKind,
    ProviderResult, resolve_api_key, resolve_base_url,
};
