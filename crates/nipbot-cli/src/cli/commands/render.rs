//! Render command handler.

use std::path::Path;

use anyhow::Result;
use nipbot_core::markdown::render_markdown;

use super::read_input;

pub fn run(file: Option<&Path>) -> Result<()> {
    let markdown = read_input(file)?;
    println!("{}", render_markdown(&markdown));
    Ok(())
}
