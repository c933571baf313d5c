//! Line-based interactive chat.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use nipbot_core::config::Config;
use nipbot_core::interrupt::{self, InterruptedError};
use nipbot_core::markdown::extract_tables;
use nipbot_core::transcript::{ERROR_PREFIX, Message, Role};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::output::{self, TerminalObserver};

const WELCOME: &str = "예방접종 오피셜 봇: 질병관리청 공식 데이터로 답변합니다.";
const HELP: &str = "명령: /export [N] 표 이미지 저장, /save <파일> HTML 저장, /quit 종료";
const PROMPT: &str = "> ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Quit,
    Help,
    /// Export tables of the N-th answer (1-based), or the latest one with tables.
    Export(Option<usize>),
    Save(PathBuf),
    Ask(String),
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ReplCommand::Ask(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "quit" | "exit" | "q" => ReplCommand::Quit,
        "help" | "?" => ReplCommand::Help,
        "export" if arg.is_empty() => ReplCommand::Export(None),
        "export" => match arg.parse::<usize>() {
            Ok(n) if n > 0 => ReplCommand::Export(Some(n)),
            _ => ReplCommand::Unknown(line.to_string()),
        },
        "save" if !arg.is_empty() => ReplCommand::Save(PathBuf::from(arg)),
        _ => ReplCommand::Unknown(line.to_string()),
    }
}

/// Finished model answers, excluding the banner and error entries.
fn answers(messages: &[Message]) -> Vec<&Message> {
    messages
        .iter()
        .filter(|m| m.role == Role::Model && !m.is_streaming && m.image.is_none())
        .filter(|m| m.text().is_some_and(|t| !t.starts_with(ERROR_PREFIX)))
        .collect()
}

fn select_answer(messages: &[Message], index: Option<usize>) -> Option<&Message> {
    let answers = answers(messages);
    match index {
        Some(n) => answers.get(n - 1).copied(),
        None => answers
            .into_iter()
            .rev()
            .find(|m| m.text().is_some_and(|t| !extract_tables(t).is_empty())),
    }
}

fn prompt() {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "{PROMPT}");
    let _ = out.flush();
}

pub async fn run(config: &Config) -> Result<()> {
    let mut chat = super::build_controller(config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("{WELCOME}");
    eprintln!("{HELP}");

    loop {
        prompt();
        let line = tokio::select! {
            line = lines.next_line() => line.context("read stdin")?,
            () = interrupt::wait_for_interrupt() => {
                eprintln!();
                return Err(InterruptedError.into());
            }
        };
        let Some(line) = line else {
            // EOF
            println!();
            return Ok(());
        };

        match parse_command(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => return Ok(()),
            ReplCommand::Help => eprintln!("{HELP}"),
            ReplCommand::Unknown(input) => eprintln!("알 수 없는 명령입니다: {input}\n{HELP}"),
            ReplCommand::Save(path) => {
                if let Err(e) = output::save_html(&path, chat.transcript()) {
                    eprintln!("{e:#}");
                }
            }
            ReplCommand::Export(index) => match select_answer(chat.transcript(), index) {
                Some(answer) => output::export_message_tables(answer, &config.export).await,
                None => eprintln!("내보낼 표가 있는 답변이 없습니다."),
            },
            ReplCommand::Ask(text) => {
                let mut observer = TerminalObserver::new(true);
                let turn = interrupt::begin_turn();
                let outcome = chat.submit(&text, turn.token(), &mut observer).await;
                drop(turn);
                tracing::debug!(?outcome, "turn finished");
            }
        }
    }
}
