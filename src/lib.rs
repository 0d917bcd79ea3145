//! Streaming chat client core.
//!
//! Invariant: `chunk` events carry the full answer so far; the session replaces
//! its text instead of appending, and the final rich render runs exactly once.
//!
//! # Public API Overview
//! - Drive a message end to end with [`ChatController::send`].
//! - Apply decoded events by hand with [`StreamSession::apply`] and project the
//!   returned [`Transition`] with [`RenderPipeline::render`].
//! - Plug page surfaces in through the traits in [`render::surface`].
//! - Read settings with [`EnvConfig::from_env`] and install logging with
//!   [`logging::init`].
//!
//! Wire decoding and HTTP live in the `chat_api` crate, re-exported as
//! [`chat_api`].

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod render;
pub mod session;

pub use chat_api;

pub use crate::config::EnvConfig;
pub use crate::controller::{
    ChatController, MessageOutcome, CANCELLED_MESSAGE, COMMUNICATION_FAILURE_MESSAGE,
    CONNECTION_LOST_MESSAGE,
};
pub use crate::error::{ConfigError, SendError};
pub use crate::render::{
    escape_html, markdown_to_html, MathTypesetter, MessageList, MessageSurface, RenderPipeline,
    SendControl, Sidebar, SourcesPanel, SourcesView, TypesetError,
};
pub use crate::session::{SessionId, SessionStatus, StreamSession, Transition};
