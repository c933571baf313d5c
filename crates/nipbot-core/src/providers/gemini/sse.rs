//! Gemini SSE stream parser.
//!
//! Converts `streamGenerateContent?alt=sse` events into [`ModelEvent`]s. All
//! defensive access into the upstream JSON lives here.

use std::collections::VecDeque;
use std::pin::Pin;

use eventsource_stream::{EventStream, EventStreamError, Eventsource};
use futures_util::Stream;
use serde_json::Value;

use crate::providers::{Citation, ModelEvent, ProviderError, ProviderErrorKind, ProviderResult};

/// Upper bound for a buffered incomplete record before it is dropped.
const MAX_PARTIAL_RECORD_BYTES: usize = 1024 * 1024;

/// Finish reasons that mean the answer was withheld by safety filters.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
];

/// Gemini SSE stream parser.
///
/// Records whose JSON ends early are buffered and retried with the next event;
/// records that can never parse are dropped without surfacing an error.
pub struct GeminiSseParser<S> {
    inner: EventStream<S>,
    pending: VecDeque<ModelEvent>,
    partial: String,
}

impl<S> GeminiSseParser<S> {
    pub fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
            pending: VecDeque::new(),
            partial: String::new(),
        }
    }

    fn handle_event_data(&mut self, data: &str) {
        if data.trim().is_empty() || data.trim() == "[DONE]" {
            return;
        }

        let candidate = if self.partial.is_empty() {
            data.to_string()
        } else {
            format!("{}{}", self.partial, data)
        };

        match serde_json::from_str::<Value>(&candidate) {
            Ok(value) => {
                self.partial.clear();
                self.handle_chunk(&value);
            }
            Err(err) if err.is_eof() && candidate.len() <= MAX_PARTIAL_RECORD_BYTES => {
                tracing::debug!(bytes = candidate.len(), "buffering incomplete stream record");
                self.partial = candidate;
            }
            Err(err) => {
                let had_partial = !self.partial.is_empty();
                self.partial.clear();
                // A stale fragment must not poison a record that is fine on its own.
                if had_partial && let Ok(value) = serde_json::from_str::<Value>(data) {
                    self.handle_chunk(&value);
                    return;
                }
                tracing::debug!(error = %err, "discarding unparsable stream record");
            }
        }
    }

    fn handle_chunk(&mut self, value: &Value) {
        let payload = value.get("response").unwrap_or(value);

        if let Some(error) = value.get("error").or_else(|| payload.get("error")) {
            let status = error
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| error.get("code").map(ToString::to_string))
                .unwrap_or_else(|| "error".to_string());
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            self.pending.push_back(ModelEvent::Error { status, message });
            return;
        }

        if let Some(reason) = payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
        {
            self.pending.push_back(ModelEvent::Blocked {
                reason: reason.to_string(),
            });
            return;
        }

        let Some(candidate) = payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
        else {
            return;
        };

        if let Some(parts) = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
        {
            let mut thought = String::new();
            let mut text = String::new();
            for part in parts {
                let Some(part_text) = part.get("text").and_then(Value::as_str) else {
                    continue;
                };
                let is_thought = part.get("thought").and_then(Value::as_bool).unwrap_or(false);
                if is_thought {
                    thought.push_str(part_text);
                } else {
                    text.push_str(part_text);
                }
            }

            if !thought.is_empty() {
                self.pending.push_back(ModelEvent::Thought(thought));
            }
            if !text.is_empty() {
                self.pending.push_back(ModelEvent::Text(text));
            }
        }

        if let Some(chunks) = candidate
            .get("groundingMetadata")
            .and_then(|metadata| metadata.get("groundingChunks"))
            .and_then(Value::as_array)
        {
            let citations = chunks.iter().map(parse_citation).collect();
            self.pending.push_back(ModelEvent::Grounding(citations));
        }

        if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str)
            && BLOCKING_FINISH_REASONS.contains(&reason)
        {
            self.pending.push_back(ModelEvent::Blocked {
                reason: reason.to_string(),
            });
        }
    }
}

fn parse_citation(chunk: &Value) -> Citation {
    let web = chunk.get("web");
    let field = |name: &str| {
        web.and_then(|web| web.get(name))
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
    };
    Citation {
        title: field("title"),
        uri: field("uri"),
    }
}

impl<S, E> Stream for GeminiSseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ProviderResult<ModelEvent>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        loop {
            if let Some(event) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            let inner = Pin::new(&mut self.inner);
            match inner.poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => self.handle_event_data(&event.data),
                Poll::Ready(Some(Err(EventStreamError::Transport(e)))) => {
                    return Poll::Ready(Some(Err(ProviderError::network(format!(
                        "Network error while streaming: {e}"
                    )))));
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(ProviderError::new(
                        ProviderErrorKind::Parse,
                        format!("SSE stream error: {e}"),
                    ))));
                }
                Poll::Ready(None) => {
                    if !self.partial.is_empty() {
                        tracing::debug!(
                            bytes = self.partial.len(),
                            "dropping incomplete record at end of stream"
                        );
                        self.partial.clear();
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
