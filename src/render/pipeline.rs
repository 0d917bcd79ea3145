use chat_api::SourceChunk;

use crate::session::{SessionStatus, StreamSession, Transition};

use super::escape::escape_html;
use super::markdown::MarkdownHtml;
use super::sources::SourcesView;
use super::surface::MessageSurface;
use super::typeset::MathTypesetter;

/// Trailing glyph shown while an answer is still streaming.
pub const DEFAULT_CURSOR: &str = "\u{2588}";

/// Projects session state onto a message surface.
///
/// Live renders are raw escaped text plus a cursor and are cheap enough to run
/// for every chunk. The final render runs the markdown transform once, attaches
/// the sources affordance, and then hands the node to the typesetter.
pub struct RenderPipeline {
    cursor: String,
    markdown: MarkdownHtml,
    typesetter: Option<Box<dyn MathTypesetter>>,
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("cursor", &self.cursor)
            .field("markdown", &self.markdown)
            .field("typesetter", &self.typesetter.is_some())
            .finish()
    }
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPipeline {
    pub fn new() -> Self {
        Self {
            cursor: DEFAULT_CURSOR.to_string(),
            markdown: MarkdownHtml::default(),
            typesetter: None,
        }
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = cursor.into();
        self
    }

    pub fn with_markdown(mut self, markdown: MarkdownHtml) -> Self {
        self.markdown = markdown;
        self
    }

    pub fn with_typesetter(mut self, typesetter: Box<dyn MathTypesetter>) -> Self {
        self.typesetter = Some(typesetter);
        self
    }

    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    pub fn has_typesetter(&self) -> bool {
        self.typesetter.is_some()
    }

    /// Markup for the live view: escaped text, no markdown, trailing cursor.
    pub fn live_html(&self, text: &str) -> String {
        format!("{}{}", escape_html(text), escape_html(&self.cursor))
    }

    pub fn render_live(&self, text: &str, target: &mut dyn MessageSurface) {
        target.replace_html(&self.live_html(text));
        target.scroll_into_view();
    }

    /// Final rich view of a completed answer.
    ///
    /// Returns the sources view when both source lists were recorded; the
    /// affordance is already appended to `target` at that point.
    pub fn render_final(
        &mut self,
        text: &str,
        sources: Option<&[String]>,
        source_chunks: Option<&[SourceChunk]>,
        target: &mut dyn MessageSurface,
    ) -> Option<SourcesView> {
        let mut html = self.markdown.render(text);
        target.replace_html(&html);

        let view = match (sources, source_chunks) {
            (Some(labels), Some(chunks)) => SourcesView::new(labels, chunks),
            _ => None,
        };
        if let Some(view) = &view {
            let affordance = view.affordance_html();
            target.append_html(&affordance);
            html.push_str(&affordance);
        }

        if let Some(typesetter) = self.typesetter.as_mut() {
            if let Err(error) = typesetter.typeset(&html, target) {
                tracing::warn!(%error, "math typesetting failed; keeping untypeset content");
            }
        }

        target.scroll_into_view();
        view
    }

    /// Error block in place of the answer. Never typeset.
    pub fn render_error(&self, message: &str, target: &mut dyn MessageSurface) {
        target.replace_html(&error_html(message));
        target.scroll_into_view();
    }

    /// Apply the render work implied by `transition`.
    pub fn render(
        &mut self,
        transition: Transition,
        session: &StreamSession,
        target: &mut dyn MessageSurface,
    ) -> Option<SourcesView> {
        match transition {
            Transition::Unchanged | Transition::MetadataRecorded => None,
            Transition::LiveRender => {
                self.render_live(session.response_text(), target);
                None
            }
            Transition::FinalRender => match session.status() {
                SessionStatus::Errored => {
                    self.render_error(session.error_message().unwrap_or_default(), target);
                    None
                }
                _ => self.render_final(
                    session.response_text(),
                    session.sources(),
                    session.source_chunks(),
                    target,
                ),
            },
        }
    }
}

pub fn error_html(message: &str) -> String {
    format!("<div class=\"message-error\">{}</div>", escape_html(message))
}

#[cfg(test)]
mod tests {
    use chat_api::{ParsedEvent, SourceChunk};
    use pretty_assertions::assert_eq;

    use super::{error_html, RenderPipeline};
    use crate::render::memory::{FailingTypesetter, RecordingSurface, RecordingTypesetter};
    use crate::session::StreamSession;

    #[test]
    fn live_html_escapes_and_appends_cursor() {
        let pipeline = RenderPipeline::new().with_cursor("|");
        assert!(!pipeline.has_typesetter());
        assert_eq!(pipeline.live_html("a <b> & c"), "a &lt;b&gt; &amp; c|");
    }

    #[test]
    fn live_render_skips_markdown() {
        let pipeline = RenderPipeline::new();
        let mut surface = RecordingSurface::default();
        pipeline.render_live("**bold**", &mut surface);
        assert_eq!(surface.html(), "**bold**\u{2588}");
        assert_eq!(surface.scroll_count(), 1);
    }

    #[test]
    fn final_render_runs_markdown_without_cursor() {
        let mut pipeline = RenderPipeline::new();
        let mut surface = RecordingSurface::default();
        let view = pipeline.render_final("Hello", None, None, &mut surface);
        assert!(view.is_none());
        assert_eq!(surface.html(), "<p>Hello</p>\n");
    }

    #[test]
    fn affordance_needs_both_source_lists() {
        let mut pipeline = RenderPipeline::new();
        let labels = vec!["a.pdf".to_string()];
        let chunks = vec![SourceChunk::new("a.pdf", "", "text")];

        let mut surface = RecordingSurface::default();
        assert!(pipeline
            .render_final("x", Some(labels.as_slice()), None, &mut surface)
            .is_none());
        assert!(!surface.html().contains("sources-affordance"));

        let mut surface = RecordingSurface::default();
        let view = pipeline.render_final(
            "x",
            Some(labels.as_slice()),
            Some(chunks.as_slice()),
            &mut surface,
        );
        assert_eq!(view.map(|view| view.chunks().to_vec()), Some(chunks));
        assert!(surface.html().contains("sources-affordance"));
    }

    #[test]
    fn typesetter_sees_affordance_and_failures_are_swallowed() {
        let typesetter = RecordingTypesetter::default();
        let seen = typesetter.seen();
        let mut pipeline = RenderPipeline::new().with_typesetter(Box::new(typesetter));
        let labels = vec!["a.pdf".to_string()];
        let chunks = vec![SourceChunk::new("a.pdf", "", "text")];
        let mut surface = RecordingSurface::default();

        pipeline.render_final(
            "$x$",
            Some(labels.as_slice()),
            Some(chunks.as_slice()),
            &mut surface,
        );

        let seen = seen.lock().expect("typeset log").clone();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("math-inline"));
        assert!(seen[0].contains("sources-affordance"));

        let mut pipeline = RenderPipeline::new().with_typesetter(Box::new(FailingTypesetter));
        assert!(pipeline.has_typesetter());
        let mut surface = RecordingSurface::default();
        pipeline.render_final("done", None, None, &mut surface);
        assert_eq!(surface.html(), "<p>done</p>\n");
    }

    #[test]
    fn errored_session_renders_escaped_error_block() {
        let typesetter = RecordingTypesetter::default();
        let seen = typesetter.seen();
        let mut pipeline = RenderPipeline::new().with_typesetter(Box::new(typesetter));
        let mut session = StreamSession::new(7);
        let transition = session.apply(ParsedEvent::Error {
            content: "<quota> exceeded".to_string(),
        });
        let mut surface = RecordingSurface::default();

        let view = pipeline.render(transition, &session, &mut surface);

        assert!(view.is_none());
        assert_eq!(surface.html(), error_html("<quota> exceeded"));
        assert_eq!(
            surface.html(),
            "<div class=\"message-error\">&lt;quota&gt; exceeded</div>"
        );
        assert!(seen.lock().expect("typeset log").is_empty());
    }

    #[test]
    fn metadata_transitions_do_not_touch_the_surface() {
        let mut pipeline = RenderPipeline::new();
        let mut session = StreamSession::new(1);
        let transition = session.apply(ParsedEvent::Sources {
            content: vec!["a".to_string()],
        });
        let mut surface = RecordingSurface::default();
        pipeline.render(transition, &session, &mut surface);
        assert!(surface.history().is_empty());
    }
}
