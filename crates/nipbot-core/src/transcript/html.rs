//! Standalone HTML page for a transcript.

use std::fmt::Write as _;

use super::{GroundingSource, Message, Role};
use crate::assets::INTRO_BANNER_ALT;
use crate::markdown::render_markdown;

const THOUGHT_TITLE: &str = "NIP 데이터 분석 프로세스";
const ANALYZING_INDICATOR: &str = "NIP 데이터를 분석하고 있습니다...";
const DISCLAIMER: &str = "※ 접종 전 반드시 지정 의료기관 전문의와 상담하세요.";
const SOURCE_TITLE_LIMIT: usize = 30;

const STYLE: &str = "\
body{font-family:sans-serif;max-width:56rem;margin:0 auto;background:#f8fafc;color:#1e293b}\
.message{display:flex;margin:1.5rem 1rem}\
.message.user{justify-content:flex-end}\
.bubble{border-radius:1rem;padding:1rem 1.25rem;border:1px solid #e2e8f0;background:#fff;max-width:85%;line-height:1.6}\
.message.user .bubble{background:#2563eb;color:#fff;border-color:#2563eb}\
.banner img{max-width:42rem;width:100%;border-radius:1rem}\
.thought{margin-bottom:1rem;padding:.75rem;background:#f8fafc;border-left:2px solid #e2e8f0;font-size:11px;color:#64748b;font-style:italic;white-space:pre-wrap}\
.thought-title{font-weight:bold;color:#94a3b8;font-style:normal}\
.indicator{font-size:12px;color:#94a3b8;font-style:italic}\
.sources a{display:inline-block;margin:.25rem;padding:.375rem .75rem;border:1px solid #e2e8f0;border-radius:.5rem;font-size:10px;color:#64748b;text-decoration:none}\
.table-container{overflow-x:auto;margin:.75rem 0}\
table{border-collapse:collapse}th,td{border:1px solid #cbd5e1;padding:.5rem .75rem}th{background:#eff6ff}\
footer{text-align:center;font-size:10px;color:#ef4444;margin:2rem 0}";

/// Renders the whole transcript as a self-contained HTML document.
pub fn render_transcript_html(messages: &[Message]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang=\"ko\">\n<head>\n<meta charset=\"utf-8\">\n<title>예방접종 오피셜 봇</title>\n<style>",
    );
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n<main>\n");
    for message in messages {
        html.push_str(&render_message(message));
        html.push('\n');
    }
    let _ = write!(html, "</main>\n<footer>{DISCLAIMER}</footer>\n</body>\n</html>\n");
    html
}

/// Renders a single transcript entry.
pub fn render_message(message: &Message) -> String {
    let role = match message.role {
        Role::User => "user",
        Role::Model => "model",
    };

    if let Some(image) = &message.image {
        return format!(
            "<div class=\"message {role} banner\"><img src=\"{}\" alt=\"{INTRO_BANNER_ALT}\"></div>",
            escape_html(image)
        );
    }

    let mut body = String::new();
    if let Some(thought) = message.thought() {
        let _ = write!(
            body,
            "<div class=\"thought\"><div class=\"thought-title\">{THOUGHT_TITLE}</div>{}</div>",
            escape_html(thought)
        );
    }
    match message.text() {
        Some(text) => body.push_str(&render_markdown(text)),
        None if message.is_streaming && message.thought().is_none() => {
            let _ = write!(body, "<div class=\"indicator\">{ANALYZING_INDICATOR}</div>");
        }
        None => {}
    }

    let mut html = format!("<div class=\"message {role}\"><div><div class=\"bubble\">{body}</div>");
    if let Some(sources) = message.grounding_sources.as_deref().filter(|s| !s.is_empty()) {
        html.push_str(&render_sources(sources));
    }
    html.push_str("</div></div>");
    html
}

fn render_sources(sources: &[GroundingSource]) -> String {
    let links: String = sources
        .iter()
        .map(|source| {
            format!(
                "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
                escape_html(&source.uri),
                escape_html(&truncate_title(&source.title))
            )
        })
        .collect();
    format!("<div class=\"sources\">{links}</div>")
}

/// Shortens titles longer than 30 characters, appending `...`.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() > SOURCE_TITLE_LIMIT {
        let head: String = title.chars().take(SOURCE_TITLE_LIMIT).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(text: Option<&str>, thought: Option<&str>, streaming: bool) -> Message {
        Message {
            role: Role::Model,
            text: text.map(str::to_string),
            thought: thought.map(str::to_string),
            image: None,
            is_streaming: streaming,
            grounding_sources: None,
        }
    }

    #[test]
    fn test_banner_renders_image() {
        let html = render_message(&Message::banner());
        assert!(html.contains("<img src=\"data:image/svg+xml;base64,"));
        assert!(html.contains("alt=\"안내 배너\""));
    }

    #[test]
    fn test_indicator_only_for_empty_streaming_placeholder() {
        assert!(render_message(&model(Some(""), Some(""), true)).contains(ANALYZING_INDICATOR));
        assert!(!render_message(&model(Some(""), Some("생각"), true)).contains(ANALYZING_INDICATOR));
        assert!(!render_message(&model(Some("답"), None, true)).contains(ANALYZING_INDICATOR));
        assert!(!render_message(&model(Some(""), None, false)).contains(ANALYZING_INDICATOR));
    }

    #[test]
    fn test_thought_block_is_escaped() {
        let html = render_message(&model(Some("**답**"), Some("a < b"), false));
        assert!(html.contains(THOUGHT_TITLE));
        assert!(html.contains("a &lt; b"));
        assert!(html.contains("<strong>답</strong>"));
    }

    #[test]
    fn test_sources_truncated() {
        let mut message = model(Some("답"), None, false);
        message.grounding_sources = Some(vec![GroundingSource {
            title: "가".repeat(31),
            uri: "https://nip.kdca.go.kr/a?x=1&y=2".to_string(),
        }]);
        let html = render_message(&message);
        assert!(html.contains(&format!("{}...</a>", "가".repeat(30))));
        assert!(html.contains("href=\"https://nip.kdca.go.kr/a?x=1&amp;y=2\""));
    }

    #[test]
    fn test_truncate_title_boundary() {
        let exact = "a".repeat(30);
        assert_eq!(truncate_title(&exact), exact);
        assert_eq!(truncate_title(&"a".repeat(31)), format!("{exact}..."));
    }

    #[test]
    fn test_page_wraps_all_messages() {
        let messages = vec![Message::banner(), Message::user("질문")];
        let html = render_transcript_html(&messages);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert_eq!(html.matches("class=\"message ").count(), 2);
        assert!(html.contains(DISCLAIMER));
    }
}
