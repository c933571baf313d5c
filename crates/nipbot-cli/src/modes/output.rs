//! Terminal rendering of streamed answers.
//!
//! Answer text goes to stdout as it arrives; thoughts, status lines and
//! errors go to stderr so stdout can be piped.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{ContentArrangement, Table as TerminalTable};
use nipbot_core::config::ExportConfig;
use nipbot_core::export::export_tables;
use nipbot_core::markdown::{Table, extract_tables};
use nipbot_core::session::{SessionOutcome, StreamChunk};
use nipbot_core::transcript::html::truncate_title;
use nipbot_core::transcript::{GroundingSource, Message, TranscriptObserver, render_transcript_html};

const ANALYZING: &str = "NIP 데이터를 분석하고 있습니다...";
const THOUGHT_HEADER: &str = "[NIP 데이터 분석 프로세스]";

/// Streams a turn to the terminal.
pub struct TerminalObserver {
    report_errors: bool,
    thought_started: bool,
}

impl TerminalObserver {
    /// `report_errors`: print failed turns to stderr (the caller reports them otherwise).
    pub fn new(report_errors: bool) -> Self {
        Self {
            report_errors,
            thought_started: false,
        }
    }
}

impl TranscriptObserver for TerminalObserver {
    fn on_turn_started(&mut self, _messages: &[Message]) {
        self.thought_started = false;
        eprintln!("{ANALYZING}");
    }

    fn on_chunk(&mut self, chunk: &StreamChunk) {
        if let Some(thought) = &chunk.thought {
            let mut err = io::stderr().lock();
            if !self.thought_started {
                self.thought_started = true;
                let _ = writeln!(err, "{THOUGHT_HEADER}");
            }
            let _ = write!(err, "{thought}");
            let _ = err.flush();
        }
        if let Some(text) = &chunk.text {
            let mut out = io::stdout().lock();
            let _ = write!(out, "{text}");
            let _ = out.flush();
        }
    }

    fn on_message_finished(&mut self, message: &Message, outcome: SessionOutcome) {
        if self.thought_started {
            eprintln!();
        }
        match outcome {
            SessionOutcome::Completed => {
                println!();
                print_answer_extras(message);
            }
            SessionOutcome::Failed => {
                if self.report_errors {
                    eprintln!("{}", message.text().unwrap_or_default());
                }
            }
            SessionOutcome::Cancelled => {
                println!();
                eprintln!("(중단됨)");
            }
        }
    }
}

/// Renders a parsed table with box-drawing borders.
pub fn format_table(table: &Table) -> String {
    let mut rows = table.plain_rows().into_iter();
    let mut terminal = TerminalTable::new();
    terminal.set_content_arrangement(ContentArrangement::Dynamic);
    if let Some(header) = rows.next() {
        terminal.set_header(header);
    }
    for row in rows {
        terminal.add_row(row);
    }
    terminal.to_string()
}

/// One line per source: truncated title and URI.
pub fn format_sources(sources: &[GroundingSource]) -> String {
    let mut out = String::from("출처:");
    for source in sources {
        out.push_str(&format!("\n  - {} <{}>", truncate_title(&source.title), source.uri));
    }
    out
}

fn print_answer_extras(message: &Message) {
    if let Some(text) = message.text() {
        for table in extract_tables(text) {
            println!("{}", format_table(&table));
        }
    }
    if let Some(sources) = message.grounding_sources.as_deref().filter(|s| !s.is_empty()) {
        println!("{}", format_sources(sources));
    }
}

/// Writes the transcript as a standalone HTML page.
pub fn save_html(path: &Path, messages: &[Message]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, render_transcript_html(messages))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!("Saved transcript to {}", path.display());
    Ok(())
}

/// Exports the tables of one answer. Failures are only logged.
pub async fn export_message_tables(message: &Message, config: &ExportConfig) {
    let Some(text) = message.text().map(str::to_string) else {
        eprintln!("내보낼 표가 없습니다.");
        return;
    };
    let table_count = extract_tables(&text).len();
    if table_count == 0 {
        eprintln!("내보낼 표가 없습니다.");
        return;
    }

    let config = config.clone();
    let written = match tokio::task::spawn_blocking(move || export_tables(&text, &config)).await {
        Ok(written) => written,
        Err(err) => {
            tracing::error!(error = %err, "table export task failed");
            Vec::new()
        }
    };
    for path in &written {
        eprintln!("표 이미지를 저장했습니다: {}", path.display());
    }
    if written.len() < table_count {
        eprintln!("일부 표를 이미지로 저장하지 못했습니다. 로그를 확인해주세요.");
    }
}
