//! Streaming session client.
//!
//! Opens one streaming request per turn and turns provider records into
//! three kinds of callbacks: incremental chunks, a single completion carrying
//! the last grounding citations seen, or a single classified failure.
//! A cancelled session emits nothing further.

pub mod errors;

use std::future::Future;
use std::sync::Arc;

use futures_util::{Stream, StreamExt, stream};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use self::errors::{ChatError, ChatErrorKind, UNEXPECTED_ERROR_MESSAGE};
use crate::providers::gemini::GeminiClient;
use crate::providers::{Citation, HistoryEntry, ModelEvent, ModelStream, ProviderError, ProviderResult};

/// Anything that can open a model stream for a conversation history.
pub trait ChatBackend: Send + Sync + 'static {
    fn open_stream(
        &self,
        history: &[HistoryEntry],
    ) -> impl Future<Output = ProviderResult<ModelStream>> + Send;
}

impl ChatBackend for GeminiClient {
    fn open_stream(
        &self,
        history: &[HistoryEntry],
    ) -> impl Future<Output = ProviderResult<ModelStream>> + Send {
        self.send_messages_stream(history)
    }
}

/// Incremental piece of an answer. Either field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    pub text: Option<String>,
    pub thought: Option<String>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            thought: None,
        }
    }

    pub fn thought(thought: impl Into<String>) -> Self {
        Self {
            text: None,
            thought: Some(thought.into()),
        }
    }
}

/// Event emitted by [`session_events`].
///
/// `Completed` and `Failed` are terminal: the stream ends after either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Chunk(StreamChunk),
    Completed(Vec<Citation>),
    Failed(ChatError),
}

/// Callback sink for [`run_session`].
pub trait SessionHandler {
    fn on_chunk(&mut self, chunk: StreamChunk);
    fn on_complete(&mut self, citations: Vec<Citation>);
    fn on_error(&mut self, error: ChatError);
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Failed,
    Cancelled,
}

enum Phase<B> {
    Connect {
        backend: Arc<B>,
        history: Vec<HistoryEntry>,
    },
    Streaming {
        stream: ModelStream,
        citations: Vec<Citation>,
    },
    Finished,
}

/// Streams session events for one turn.
///
/// Cancellation is observed before connecting and after every received
/// record; once observed the stream ends without a terminal event.
pub fn session_events<B: ChatBackend>(
    backend: Arc<B>,
    history: Vec<HistoryEntry>,
    cancel: CancellationToken,
) -> impl Stream<Item = SessionEvent> + Send + 'static {
    stream::unfold(Phase::Connect { backend, history }, move |phase| {
        let cancel = cancel.clone();
        async move { advance(phase, &cancel).await }
    })
}

async fn advance<B: ChatBackend>(
    phase: Phase<B>,
    cancel: &CancellationToken,
) -> Option<(SessionEvent, Phase<B>)> {
    let (mut stream, mut citations) = match phase {
        Phase::Finished => return None,
        Phase::Streaming { stream, citations } => (stream, citations),
        Phase::Connect { backend, history } => {
            if cancel.is_cancelled() {
                return None;
            }
            let opened = tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                opened = backend.open_stream(&history) => opened,
            };
            match opened {
                Ok(stream) => (stream, Vec::new()),
                Err(err) => return Some((fail(&err), Phase::Finished)),
            }
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            next = stream.next() => next,
        };
        if cancel.is_cancelled() {
            return None;
        }

        let chunk = match next {
            Some(Ok(ModelEvent::Text(text))) => StreamChunk::text(text),
            Some(Ok(ModelEvent::Thought(thought))) => StreamChunk::thought(thought),
            Some(Ok(ModelEvent::Grounding(latest))) => {
                citations = latest;
                continue;
            }
            Some(Ok(ModelEvent::Blocked { reason })) => {
                return Some((fail(&ProviderError::blocked(&reason)), Phase::Finished));
            }
            Some(Ok(ModelEvent::Error { status, message })) => {
                return Some((
                    fail(&ProviderError::api_error(&status, &message)),
                    Phase::Finished,
                ));
            }
            Some(Err(err)) => return Some((fail(&err), Phase::Finished)),
            None => return Some((SessionEvent::Completed(citations), Phase::Finished)),
        };
        return Some((
            SessionEvent::Chunk(chunk),
            Phase::Streaming { stream, citations },
        ));
    }
}

fn fail(err: &ProviderError) -> SessionEvent {
    tracing::warn!(kind = %err.kind, error = %err.full_text(), "session failed");
    SessionEvent::Failed(ChatError::from_provider(err))
}

/// Drives one turn to its end, forwarding events to `handler`.
///
/// Exactly one of `on_complete`/`on_error` fires unless the session is
/// cancelled, in which case neither does.
pub async fn run_session<B, H>(
    backend: Arc<B>,
    history: Vec<HistoryEntry>,
    handler: &mut H,
    cancel: &CancellationToken,
) -> SessionOutcome
where
    B: ChatBackend,
    H: SessionHandler + ?Sized,
{
    let turn_id = Uuid::new_v4();
    tracing::info!(%turn_id, turns = history.len(), "session started");

    let events = session_events(backend, history, cancel.clone());
    futures_util::pin_mut!(events);

    while let Some(event) = events.next().await {
        match event {
            SessionEvent::Chunk(chunk) => handler.on_chunk(chunk),
            SessionEvent::Completed(citations) => {
                tracing::info!(%turn_id, citations = citations.len(), "session completed");
                handler.on_complete(citations);
                return SessionOutcome::Completed;
            }
            SessionEvent::Failed(error) => {
                tracing::info!(%turn_id, kind = ?error.kind, "session ended with error");
                handler.on_error(error);
                return SessionOutcome::Failed;
            }
        }
    }

    tracing::info!(%turn_id, "session cancelled");
    SessionOutcome::Cancelled
}


#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::testing::ScriptedBackend;
    use super::*;

    #[derive(Default)]
    struct Recorder {
        chunks: Vec<StreamChunk>,
        completions: Vec<Vec<Citation>>,
        errors: Vec<ChatError>,
    }

    impl SessionHandler for Recorder {
        fn on_chunk(&mut self, chunk: StreamChunk) {
            self.chunks.push(chunk);
        }

        fn on_complete(&mut self, citations: Vec<Citation>) {
            self.completions.push(citations);
        }

        fn on_error(&mut self, error: ChatError) {
            self.errors.push(error);
        }
    }

    fn citation(title: &str, uri: &str) -> Citation {
        Citation {
            title: Some(title.to_string()),
            uri: Some(uri.to_string()),
        }
    }

    #[tokio::test]
    async fn test_chunks_then_single_completion() {
        let backend = Arc::new(ScriptedBackend::texts(&["안", "녕"]));
        let mut recorder = Recorder::default();

        let outcome = run_session(
            Arc::clone(&backend),
            vec![HistoryEntry::user("질문")],
            &mut recorder,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome, SessionOutcome::Completed);
        assert_eq!(
            recorder.chunks,
            vec![StreamChunk::text("안"), StreamChunk::text("녕")]
        );
        assert_eq!(recorder.completions, vec![Vec::new()]);
        assert!(recorder.errors.is_empty());
        assert_eq!(
            *backend.last_history.lock().unwrap(),
            vec![HistoryEntry::user("질문")]
        );
    }

    #[tokio::test]
    async fn test_last_grounding_wins() {
        let backend = Arc::new(ScriptedBackend::events(vec![
            Ok(ModelEvent::Grounding(vec![citation("old", "https://kdca.go.kr/a")])),
            Ok(ModelEvent::Thought("검색 중".to_string())),
            Ok(ModelEvent::Text("답".to_string())),
            Ok(ModelEvent::Grounding(vec![citation("new", "https://kdca.go.kr/b")])),
        ]));

        let events: Vec<_> = session_events(
            backend,
            vec![HistoryEntry::user("q")],
            CancellationToken::new(),
        )
        .collect()
        .await;

        assert_eq!(
            events,
            vec![
                SessionEvent::Chunk(StreamChunk::thought("검색 중")),
                SessionEvent::Chunk(StreamChunk::text("답")),
                SessionEvent::Completed(vec![citation("new", "https://kdca.go.kr/b")]),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_key_fails_with_single_error() {
        let backend = Arc::new(ScriptedBackend::open_error(ProviderError::config(
            "API_KEY가 설정되지 않았습니다.",
        )));
        let mut recorder = Recorder::default();

        let outcome = run_session(
            backend,
            vec![HistoryEntry::user("q")],
            &mut recorder,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome, SessionOutcome::Failed);
        assert!(recorder.chunks.is_empty());
        assert!(recorder.completions.is_empty());
        assert_eq!(recorder.errors.len(), 1);
        assert_eq!(recorder.errors[0].kind, ChatErrorKind::MissingApiKey);
    }

    #[tokio::test]
    async fn test_mid_stream_error_after_chunks() {
        let backend = Arc::new(ScriptedBackend::events(vec![
            Ok(ModelEvent::Text("부분".to_string())),
            Err(ProviderError::http_status(429, "")),
            Ok(ModelEvent::Text("never".to_string())),
        ]));
        let mut recorder = Recorder::default();

        let outcome = run_session(
            backend,
            vec![HistoryEntry::user("q")],
            &mut recorder,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome, SessionOutcome::Failed);
        assert_eq!(recorder.chunks, vec![StreamChunk::text("부분")]);
        assert!(recorder.completions.is_empty());
        assert_eq!(recorder.errors[0].kind, ChatErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_blocked_record_is_safety_failure() {
        let backend = Arc::new(ScriptedBackend::events(vec![Ok(ModelEvent::Blocked {
            reason: "SAFETY".to_string(),
        })]));
        let events: Vec<_> = session_events(
            backend,
            vec![HistoryEntry::user("q")],
            CancellationToken::new(),
        )
        .collect()
        .await;

        assert_eq!(events.len(), 1);
        let SessionEvent::Failed(error) = &events[0] else {
            panic!("expected failure, got {:?}", events[0]);
        };
        assert_eq!(error.kind, ChatErrorKind::SafetyBlocked);
    }

    #[tokio::test]
    async fn test_cancelled_before_connect_never_opens() {
        let backend = Arc::new(ScriptedBackend::texts(&["a"]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut recorder = Recorder::default();

        let outcome = run_session(
            Arc::clone(&backend),
            vec![HistoryEntry::user("q")],
            &mut recorder,
            &cancel,
        )
        .await;

        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(backend.open_count(), 0);
        assert!(recorder.chunks.is_empty());
        assert!(recorder.completions.is_empty());
        assert!(recorder.errors.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_stops_callbacks() {
        struct CancelOnFirst {
            cancel: CancellationToken,
            inner: Recorder,
        }

        impl SessionHandler for CancelOnFirst {
            fn on_chunk(&mut self, chunk: StreamChunk) {
                self.cancel.cancel();
                self.inner.on_chunk(chunk);
            }
            fn on_complete(&mut self, citations: Vec<Citation>) {
                self.inner.on_complete(citations);
            }
            fn on_error(&mut self, error: ChatError) {
                self.inner.on_error(error);
            }
        }

        let backend = Arc::new(ScriptedBackend::texts(&["a", "b", "c"]));
        let cancel = CancellationToken::new();
        let mut handler = CancelOnFirst {
            cancel: cancel.clone(),
            inner: Recorder::default(),
        };

        let outcome = run_session(backend, vec![HistoryEntry::user("q")], &mut handler, &cancel).await;

        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(handler.inner.chunks, vec![StreamChunk::text("a")]);
        assert!(handler.inner.completions.is_empty());
        assert!(handler.inner.errors.is_empty());
    }
}
