//! Core nipbot library (providers, session streaming, transcript, rendering, export).

pub mod assets;
pub mod config;
pub mod export;
pub mod interrupt;
pub mod logging;
pub mod markdown;
pub mod prompts;
pub mod providers;
pub mod session;
pub mod transcript;
