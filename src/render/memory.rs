//! In-memory render surfaces.
//!
//! They record every update instead of drawing it, which makes them the
//! surfaces of choice for tests and for headless callers that only want the
//! final markup.

use std::sync::{Arc, Mutex, MutexGuard};

use super::surface::{MessageList, MessageSurface, SendControl, Sidebar, SourcesPanel};
use super::typeset::{MathTypesetter, TypesetError};

/// Message node that keeps a snapshot of its content after every update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSurface {
    html: String,
    history: Vec<String>,
    scrolls: usize,
}

impl RecordingSurface {
    /// Current content.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Content after each update, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn scroll_count(&self) -> usize {
        self.scrolls
    }
}

impl MessageSurface for RecordingSurface {
    fn replace_html(&mut self, html: &str) {
        self.html = html.to_string();
        self.history.push(self.html.clone());
    }

    fn append_html(&mut self, html: &str) {
        self.html.push_str(html);
        self.history.push(self.html.clone());
    }

    fn scroll_into_view(&mut self) {
        self.scrolls += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingList {
    user_messages: Vec<String>,
    assistant_messages: usize,
}

impl RecordingList {
    pub fn user_messages(&self) -> &[String] {
        &self.user_messages
    }

    /// Number of assistant nodes handed out.
    pub fn assistant_messages(&self) -> usize {
        self.assistant_messages
    }
}

impl MessageList for RecordingList {
    type Message = RecordingSurface;

    fn append_user_message(&mut self, html: &str) {
        self.user_messages.push(html.to_string());
    }

    fn append_assistant_message(&mut self) -> RecordingSurface {
        self.assistant_messages += 1;
        RecordingSurface::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingPanel {
    shown: Vec<String>,
}

impl RecordingPanel {
    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    pub fn last(&self) -> Option<&str> {
        self.shown.last().map(String::as_str)
    }
}

impl SourcesPanel for RecordingPanel {
    fn show(&mut self, html: &str) {
        self.shown.push(html.to_string());
    }
}

/// Send control that remembers every enable/disable call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSendControl {
    enabled: bool,
    changes: Vec<bool>,
}

impl Default for RecordingSendControl {
    fn default() -> Self {
        Self {
            enabled: true,
            changes: Vec::new(),
        }
    }
}

impl RecordingSendControl {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn changes(&self) -> &[bool] {
        &self.changes
    }
}

impl SendControl for RecordingSendControl {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.changes.push(enabled);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSidebar {
    html: Option<String>,
}

impl RecordingSidebar {
    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }
}

impl Sidebar for RecordingSidebar {
    fn show(&mut self, html: &str) {
        self.html = Some(html.to_string());
    }
}

/// Typesetter that records the markup it was handed and leaves the node untouched.
#[derive(Debug, Clone, Default)]
pub struct RecordingTypesetter {
    seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingTypesetter {
    /// Shared log of typeset inputs; stays readable after the typesetter is boxed away.
    pub fn seen(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.seen)
    }

    pub fn calls(&self) -> usize {
        lock_unpoisoned(&self.seen).len()
    }
}

impl MathTypesetter for RecordingTypesetter {
    fn typeset(
        &mut self,
        html: &str,
        _target: &mut dyn MessageSurface,
    ) -> Result<(), TypesetError> {
        lock_unpoisoned(&self.seen).push(html.to_string());
        Ok(())
    }
}

/// Typesetter that always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingTypesetter;

impl MathTypesetter for FailingTypesetter {
    fn typeset(
        &mut self,
        _html: &str,
        _target: &mut dyn MessageSurface,
    ) -> Result<(), TypesetError> {
        Err(TypesetError::new("typesetter unavailable"))
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::{RecordingSendControl, RecordingSurface};
    use crate::render::surface::{MessageSurface, SendControl};

    #[test]
    fn surface_records_snapshots() {
        let mut surface = RecordingSurface::default();
        surface.replace_html("a");
        surface.append_html("b");
        surface.replace_html("c");
        assert_eq!(surface.html(), "c");
        assert_eq!(surface.history(), ["a", "ab", "c"]);
    }

    #[test]
    fn send_control_starts_enabled() {
        let mut control = RecordingSendControl::default();
        assert!(control.is_enabled());
        control.set_enabled(false);
        control.set_enabled(true);
        assert_eq!(control.changes(), [false, true]);
    }
}
