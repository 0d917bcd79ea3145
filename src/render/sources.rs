use chat_api::SourceChunk;

use super::escape::{escape_html, safe_url};
use super::surface::SourcesPanel;

pub const VIEW_SOURCES_ACTION: &str = "view-sources";

/// Sources retained by a finished message.
///
/// Opening it redisplays exactly what the server sent; nothing is fetched again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcesView {
    labels: Vec<String>,
    chunks: Vec<SourceChunk>,
}

impl SourcesView {
    /// `None` unless both lists are non-empty.
    pub fn new(labels: &[String], chunks: &[SourceChunk]) -> Option<Self> {
        if labels.is_empty() || chunks.is_empty() {
            return None;
        }
        Some(Self {
            labels: labels.to_vec(),
            chunks: chunks.to_vec(),
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn chunks(&self) -> &[SourceChunk] {
        &self.chunks
    }

    /// Markup appended to the message: cited labels plus the button that opens the panel.
    pub fn affordance_html(&self) -> String {
        let mut html = String::from("<div class=\"sources-affordance\">\n<ul class=\"sources-list\">\n");
        for label in &self.labels {
            html.push_str(&format!("<li>{}</li>\n", escape_html(label)));
        }
        html.push_str("</ul>\n");
        html.push_str(&format!(
            "<button type=\"button\" class=\"sources-button\" data-action=\"{VIEW_SOURCES_ACTION}\">View sources ({})</button>\n",
            self.chunks.len()
        ));
        html.push_str("</div>\n");
        html
    }

    pub fn panel_html(&self) -> String {
        let mut html = String::from("<div class=\"source-chunks\">\n");
        for chunk in &self.chunks {
            html.push_str("<article class=\"source-chunk\">\n<h4>");
            let label = escape_html(&chunk.source);
            match safe_url(&chunk.url) {
                Some(url) => html.push_str(&format!(
                    "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{label}</a>",
                    escape_html(url)
                )),
                None => html.push_str(&label),
            }
            html.push_str("</h4>\n<pre class=\"source-content\">");
            html.push_str(&escape_html(&chunk.content));
            html.push_str("</pre>\n</article>\n");
        }
        html.push_str("</div>\n");
        html
    }

    /// Show the retained passages in the detail panel.
    pub fn open(&self, panel: &mut dyn SourcesPanel) {
        panel.show(&self.panel_html());
    }
}
