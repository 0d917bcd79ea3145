//! Transport-only primitives for the streamed chat endpoint.
//!
//! This crate owns request building, frame decoding and event parsing for the
//! chat server. It holds no session state and no rendering.
//!
//! Wire format: records separated by a blank line; every relevant line starts
//! with `data:` followed by a JSON object `{"type": ..., "content": ...}`.
//! Malformed lines are logged and skipped, never fatal.

pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod parser;
pub mod payload;
pub mod url;

pub use client::{
    await_or_cancel, is_cancelled, CancellationSignal, ChatApiClient, ChatTransport,
    FragmentStream,
};
pub use config::ChatApiConfig;
pub use decoder::FrameDecoder;
pub use error::ChatApiError;
pub use events::{KnowledgeAreas, ParsedEvent, SourceChunk};
pub use parser::{parse_record, EventStreamParser};
pub use payload::ChatRequest;
pub use url::{areas_url, chat_url};

pub use reqwest::StatusCode;
