//! Ask command handler.

use std::path::Path;

use anyhow::{Result, anyhow, bail};
use nipbot_core::config::Config;
use nipbot_core::interrupt::{self, InterruptedError};
use nipbot_core::session::SessionOutcome;

use crate::modes::{self, output};

pub struct AskOptions<'a> {
    pub prompt: &'a str,
    pub config: &'a Config,
    pub export_tables: bool,
    pub html: Option<&'a Path>,
}

pub async fn run(options: AskOptions<'_>) -> Result<()> {
    let mut chat = modes::build_controller(options.config)?;
    let mut observer = output::TerminalObserver::new(false);

    let outcome = {
        let turn = interrupt::begin_turn();
        chat.submit(options.prompt, turn.token(), &mut observer).await
    };

    if let Some(path) = options.html {
        output::save_html(path, chat.transcript())?;
    }

    let Some(outcome) = outcome else {
        bail!("Prompt is empty");
    };
    let answer = chat.transcript().last();
    match outcome {
        SessionOutcome::Completed => {
            if options.export_tables
                && let Some(answer) = answer
            {
                output::export_message_tables(answer, &options.config.export).await;
            }
            Ok(())
        }
        SessionOutcome::Failed => Err(anyhow!(
            "{}",
            answer.and_then(|m| m.text()).unwrap_or("request failed")
        )),
        SessionOutcome::Cancelled => Err(InterruptedError.into()),
    }
}
