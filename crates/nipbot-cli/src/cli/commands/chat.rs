//! Chat command handler.

use anyhow::Result;
use nipbot_core::config::Config;

use crate::modes;

pub async fn run(config: &Config) -> Result<()> {
    modes::repl::run(config).await
}
