//! Gemini provider (Generative Language API, API key auth).

pub mod api;
pub mod request;
mod sse;

pub use api::{GeminiClient, GeminiConfig};
pub use request::GenerationOptions;
pub use sse::GeminiSseParser;
