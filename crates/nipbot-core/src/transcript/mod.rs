//! Chat transcript state and the controller that drives one turn at a time.
//!
//! The transcript is an ordered list of messages. It only grows, except that
//! the streaming placeholder (always the last entry while streaming) is
//! mutated in place until its turn ends.

pub mod grounding;
pub mod html;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub use self::grounding::DomainAllowList;
pub use self::html::render_transcript_html;
use crate::assets;
use crate::providers::{ChatRole, Citation, HistoryEntry};
use crate::session::{ChatBackend, ChatError, SessionHandler, SessionOutcome, StreamChunk, run_session};

/// Prefix of the model message that replaces a failed placeholder.
pub const ERROR_PREFIX: &str = "⚠️ 오류 발생: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ChatRole::User,
            Role::Model => ChatRole::Model,
        }
    }
}

/// A citation that survived the domain filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding_sources: Option<Vec<GroundingSource>>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: Some(text.into()),
            thought: None,
            image: None,
            is_streaming: false,
            grounding_sources: None,
        }
    }

    /// The intro banner: an image-only model message.
    pub fn banner() -> Self {
        Self {
            role: Role::Model,
            text: None,
            thought: None,
            image: Some(assets::intro_banner_uri()),
            is_streaming: false,
            grounding_sources: None,
        }
    }

    fn placeholder() -> Self {
        Self {
            role: Role::Model,
            text: Some(String::new()),
            thought: Some(String::new()),
            image: None,
            is_streaming: true,
            grounding_sources: None,
        }
    }

    fn error(error: &ChatError) -> Self {
        Self {
            role: Role::Model,
            text: Some(format!("{ERROR_PREFIX}{}", error.user_message())),
            thought: None,
            image: None,
            is_streaming: false,
            grounding_sources: None,
        }
    }

    /// Text if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    /// Thought if present and non-empty.
    pub fn thought(&self) -> Option<&str> {
        self.thought.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Loading,
    Error,
}

/// What `begin_turn` hands to the session client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub history: Vec<HistoryEntry>,
    /// Index of the streaming placeholder.
    pub placeholder: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    status: SessionStatus,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    /// A transcript holding only the intro banner.
    pub fn new() -> Self {
        Self {
            messages: vec![Message::banner()],
            status: SessionStatus::Idle,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    fn is_streaming(&self) -> bool {
        self.messages.iter().any(|m| m.is_streaming)
    }

    /// Appends the user message and a streaming placeholder.
    ///
    /// Returns `None` without touching the transcript when `text` is blank or
    /// a turn is already in progress.
    pub fn begin_turn(&mut self, text: &str) -> Option<PendingTurn> {
        if text.trim().is_empty() || self.status == SessionStatus::Loading || self.is_streaming() {
            return None;
        }

        let mut history: Vec<HistoryEntry> = self
            .messages
            .iter()
            .filter_map(|m| {
                m.text().map(|t| HistoryEntry {
                    role: m.role.into(),
                    text: t.to_string(),
                })
            })
            .collect();
        history.push(HistoryEntry::user(text));

        self.messages.push(Message::user(text));
        self.messages.push(Message::placeholder());
        self.status = SessionStatus::Loading;

        Some(PendingTurn {
            history,
            placeholder: self.messages.len() - 1,
        })
    }

    fn open_placeholder(&mut self, index: usize) -> Option<&mut Message> {
        self.messages.get_mut(index).filter(|m| m.is_streaming)
    }

    /// Concatenates a chunk into the placeholder.
    pub fn apply_chunk(&mut self, index: usize, chunk: &StreamChunk) {
        let Some(message) = self.open_placeholder(index) else {
            return;
        };
        if let Some(text) = &chunk.text {
            message.text.get_or_insert_with(String::new).push_str(text);
        }
        if let Some(thought) = &chunk.thought {
            message.thought.get_or_insert_with(String::new).push_str(thought);
        }
    }

    /// Closes the placeholder with its grounding sources.
    pub fn complete(&mut self, index: usize, sources: Vec<GroundingSource>) {
        let Some(message) = self.open_placeholder(index) else {
            return;
        };
        message.is_streaming = false;
        message.grounding_sources = Some(sources);
        self.status = SessionStatus::Idle;
    }

    /// Replaces the placeholder with an error message.
    pub fn fail(&mut self, index: usize, error: &ChatError) {
        let Some(message) = self.open_placeholder(index) else {
            return;
        };
        *message = Message::error(error);
        self.status = SessionStatus::Error;
    }

    /// Closes a cancelled placeholder, keeping whatever text arrived.
    pub fn cancel(&mut self, index: usize) {
        let Some(message) = self.open_placeholder(index) else {
            return;
        };
        message.is_streaming = false;
        self.status = SessionStatus::Idle;
    }
}

/// Front-end hook notified while a turn progresses.
pub trait TranscriptObserver {
    /// The user message and placeholder were appended; nothing was sent yet.
    fn on_turn_started(&mut self, _messages: &[Message]) {}

    fn on_chunk(&mut self, _chunk: &StreamChunk) {}

    fn on_message_finished(&mut self, _message: &Message, _outcome: SessionOutcome) {}
}

impl TranscriptObserver for () {}

struct TurnHandler<'a, O: ?Sized> {
    transcript: &'a mut Transcript,
    allow_list: &'a DomainAllowList,
    observer: &'a mut O,
    index: usize,
}

impl<O: TranscriptObserver + ?Sized> SessionHandler for TurnHandler<'_, O> {
    fn on_chunk(&mut self, chunk: StreamChunk) {
        self.transcript.apply_chunk(self.index, &chunk);
        self.observer.on_chunk(&chunk);
    }

    fn on_complete(&mut self, citations: Vec<Citation>) {
        let sources = self.allow_list.filter(&citations);
        self.transcript.complete(self.index, sources);
    }

    fn on_error(&mut self, error: ChatError) {
        self.transcript.fail(self.index, &error);
    }
}

/// Owns the transcript and runs turns against a backend.
pub struct ChatController<B> {
    backend: Arc<B>,
    transcript: Transcript,
    allow_list: DomainAllowList,
}

impl<B: ChatBackend> ChatController<B> {
    pub fn new(backend: Arc<B>, allow_list: DomainAllowList) -> Self {
        Self {
            backend,
            transcript: Transcript::new(),
            allow_list,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn status(&self) -> SessionStatus {
        self.transcript.status()
    }

    /// Runs one turn for `text`.
    ///
    /// Returns `None` when the submit was ignored (blank text or a turn in
    /// progress), otherwise how the turn ended.
    pub async fn submit<O>(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
        observer: &mut O,
    ) -> Option<SessionOutcome>
    where
        O: TranscriptObserver + ?Sized,
    {
        let PendingTurn {
            history,
            placeholder,
        } = self.transcript.begin_turn(text)?;
        observer.on_turn_started(self.transcript.messages());

        let mut handler = TurnHandler {
            transcript: &mut self.transcript,
            allow_list: &self.allow_list,
            observer: &mut *observer,
            index: placeholder,
        };
        let outcome = run_session(Arc::clone(&self.backend), history, &mut handler, cancel).await;

        if outcome == SessionOutcome::Cancelled {
            self.transcript.cancel(placeholder);
        }
        if let Some(message) = self.transcript.messages().get(placeholder) {
            observer.on_message_finished(message, outcome);
        }
        Some(outcome)
    }
}
