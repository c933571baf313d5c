//! Runtime execution modes.
//!
//! - `repl`: interactive line-based chat (stdin/stdout)
//! - `output`: terminal rendering shared by `ask` and `repl`

pub mod output;
pub mod repl;

use std::sync::Arc;

use anyhow::{Context, Result};
use nipbot_core::config::Config;
use nipbot_core::providers::gemini::{GeminiClient, GeminiConfig};
use nipbot_core::transcript::{ChatController, DomainAllowList};

/// Builds a controller wired to Gemini. A missing API key is not an error
/// here; it surfaces in the transcript on the first submit.
pub fn build_controller(config: &Config) -> Result<ChatController<GeminiClient>> {
    let gemini = GeminiConfig::from_config(config).context("configure Gemini client")?;
    if gemini.api_key.is_none() {
        tracing::warn!("no Gemini API key configured");
    }
    Ok(ChatController::new(
        Arc::new(GeminiClient::new(gemini)),
        DomainAllowList::from_config(&config.grounding),
    ))
}
