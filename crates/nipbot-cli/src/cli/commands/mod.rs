//! CLI command handlers.

pub mod ask;
pub mod chat;
pub mod config;
pub mod export;
pub mod render;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

/// Reads a markdown source from a file, or stdin when no file is given.
pub(crate) fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}
