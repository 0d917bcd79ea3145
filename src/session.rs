//! Per-message response state.
//!
//! A [`StreamSession`] is created for each submitted message and consumes the
//! decoded events of its response. Every call to [`StreamSession::apply`]
//! returns a [`Transition`] telling the render pipeline what, if anything,
//! must be redrawn.

use chat_api::{EventStreamParser, ParsedEvent, SourceChunk};

/// Identifier for one submitted message.
pub type SessionId = u64;

/// Lifecycle of a session: `Pending -> Streaming -> {Completed | Errored}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Streaming,
    Completed,
    Errored,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Errored => "errored",
        }
    }

    /// True while the session still blocks new sends.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

/// Render work implied by one accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing visible changed.
    Unchanged,
    /// Answer text changed while streaming; redraw the cheap raw-text view.
    LiveRender,
    /// Session reached a terminal status; draw the final view once.
    FinalRender,
    /// Source metadata stored; shown only by the final view.
    MetadataRecorded,
}

#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    parser: EventStreamParser,
    response_text: String,
    sources: Option<Vec<String>>,
    source_chunks: Option<Vec<SourceChunk>>,
    status: SessionStatus,
    error_message: Option<String>,
}

impl StreamSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            parser: EventStreamParser::default(),
            response_text: String::new(),
            sources: None,
            source_chunks: None,
            status: SessionStatus::Pending,
            error_message: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn response_text(&self) -> &str {
        &self.response_text
    }

    pub fn sources(&self) -> Option<&[String]> {
        self.sources.as_deref()
    }

    pub fn source_chunks(&self) -> Option<&[SourceChunk]> {
        self.source_chunks.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Decode one body fragment into events, keeping partial records for the next call.
    pub fn decode(&mut self, fragment: &[u8]) -> Vec<ParsedEvent> {
        self.parser.feed(fragment)
    }

    pub fn apply(&mut self, event: ParsedEvent) -> Transition {
        match event {
            ParsedEvent::Start => {
                if self.status == SessionStatus::Pending {
                    self.set_status(SessionStatus::Streaming);
                    Transition::LiveRender
                } else {
                    Transition::Unchanged
                }
            }
            ParsedEvent::Chunk { content } => self.apply_chunk(content),
            ParsedEvent::Sources { content } => {
                if content.is_empty() {
                    return Transition::Unchanged;
                }
                self.sources = Some(content);
                Transition::MetadataRecorded
            }
            ParsedEvent::SourceChunks { content } => {
                self.source_chunks = Some(content);
                Transition::MetadataRecorded
            }
            ParsedEvent::Error { content } => {
                if self.status.is_terminal() {
                    tracing::debug!(
                        session = self.id,
                        status = self.status.as_str(),
                        "ignoring error event after terminal status"
                    );
                    return Transition::Unchanged;
                }
                tracing::warn!(session = self.id, error = %content, "server reported an error");
                self.error_message = Some(content);
                self.set_status(SessionStatus::Errored);
                Transition::FinalRender
            }
            ParsedEvent::Complete => self.complete(),
            ParsedEvent::Unrecognized { event_type, .. } => {
                tracing::debug!(session = self.id, event_type, "ignoring unrecognized event");
                Transition::Unchanged
            }
        }
    }

    /// Transport closed. Completion is implied when no terminal event was seen.
    pub fn finish_stream(&mut self) -> Transition {
        self.parser.finish();
        if self.status.is_active() {
            tracing::debug!(session = self.id, "stream closed without complete; completing");
        }
        self.complete()
    }

    /// Transport failed or was cancelled before the session finished.
    pub fn fail_transport(&mut self, message: impl Into<String>) -> Transition {
        if self.status.is_terminal() {
            return Transition::Unchanged;
        }
        self.error_message = Some(message.into());
        self.set_status(SessionStatus::Errored);
        Transition::FinalRender
    }

    fn apply_chunk(&mut self, content: String) -> Transition {
        match self.status {
            SessionStatus::Completed | SessionStatus::Errored => Transition::Unchanged,
            SessionStatus::Streaming if content == self.response_text => Transition::Unchanged,
            SessionStatus::Streaming => {
                self.response_text = content;
                Transition::LiveRender
            }
            SessionStatus::Pending => {
                self.response_text = content;
                self.set_status(SessionStatus::Streaming);
                Transition::LiveRender
            }
        }
    }

    fn complete(&mut self) -> Transition {
        if self.status.is_terminal() {
            return Transition::Unchanged;
        }
        self.set_status(SessionStatus::Completed);
        Transition::FinalRender
    }

    fn set_status(&mut self, status: SessionStatus) {
        tracing::debug!(
            session = self.id,
            from = self.status.as_str(),
            to = status.as_str(),
            "session status changed"
        );
        self.status = status;
    }
}
