use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire tag of each event the chat endpoint emits.
pub const START_EVENT: &str = "start";
pub const CHUNK_EVENT: &str = "chunk";
pub const SOURCES_EVENT: &str = "sources";
pub const SOURCE_CHUNKS_EVENT: &str = "source_chunks";
pub const ERROR_EVENT: &str = "error";
pub const COMPLETE_EVENT: &str = "complete";

/// One retrieved passage backing an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChunk {
    /// Display label; may embed a filename.
    pub source: String,
    #[serde(default)]
    pub url: String,
    /// Plain text, newlines are meaningful.
    pub content: String,
}

impl SourceChunk {
    pub fn new(
        source: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            url: url.into(),
            content: content.into(),
        }
    }
}

/// Event decoded from a single `data:` line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// Server acknowledged the request; no answer text yet.
    Start,
    /// Full answer text known so far. Replaces, never appends.
    Chunk { content: String },
    Sources { content: Vec<String> },
    SourceChunks { content: Vec<SourceChunk> },
    Error { content: String },
    Complete,
    /// Well-formed event with a tag this client does not know.
    Unrecognized { event_type: String, payload: Value },
}

impl ParsedEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::Start => START_EVENT,
            Self::Chunk { .. } => CHUNK_EVENT,
            Self::Sources { .. } => SOURCES_EVENT,
            Self::SourceChunks { .. } => SOURCE_CHUNKS_EVENT,
            Self::Error { .. } => ERROR_EVENT,
            Self::Complete => COMPLETE_EVENT,
            Self::Unrecognized { event_type, .. } => event_type,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Complete)
    }
}

/// Response of the knowledge areas endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeAreas {
    #[serde(default)]
    pub areas: Vec<String>,
}
