//! Projection of session state onto page-owned surfaces.
//!
//! All externally sourced text reaches markup through [`escape_html`] or the
//! markdown transform; nothing else builds HTML from server data.

pub mod escape;
pub mod greeting;
pub mod markdown;
pub mod memory;
pub mod pipeline;
pub mod sources;
pub mod surface;
pub mod typeset;

pub use escape::{escape_html, safe_url};
pub use greeting::{greeting_html, sidebar_html};
pub use markdown::{markdown_to_html, prewarm_code_highlighting, MarkdownHtml, MarkdownOptions};
pub use memory::{
    FailingTypesetter, RecordingList, RecordingPanel, RecordingSendControl, RecordingSidebar,
    RecordingSurface, RecordingTypesetter,
};
pub use pipeline::{error_html, RenderPipeline, DEFAULT_CURSOR};
pub use sources::{SourcesView, VIEW_SOURCES_ACTION};
pub use surface::{MessageList, MessageSurface, SendControl, Sidebar, SourcesPanel};
pub use typeset::{MathTypesetter, TypesetError};
