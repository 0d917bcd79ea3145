//! Render targets owned by the surrounding page.
//!
//! The core never looks these up; callers hand them in. Every `html` argument
//! is already escaped or produced by the markdown transform.

/// Content node of one assistant message.
pub trait MessageSurface {
    /// Replace the whole content of the node.
    fn replace_html(&mut self, html: &str);

    /// Append after the current content (used for the sources affordance).
    fn append_html(&mut self, html: &str);

    /// Keep the node in view after an update.
    fn scroll_into_view(&mut self) {}
}

/// Container holding the conversation.
pub trait MessageList {
    type Message: MessageSurface;

    fn append_user_message(&mut self, html: &str);

    /// Create an empty assistant message node and hand it out.
    fn append_assistant_message(&mut self) -> Self::Message;
}

/// Detail panel that lists retrieved passages.
pub trait SourcesPanel {
    fn show(&mut self, html: &str);
}

/// The send affordance; disabled while a session is active.
pub trait SendControl {
    fn set_enabled(&mut self, enabled: bool);
}

/// Knowledge area listing next to the conversation.
pub trait Sidebar {
    fn show(&mut self, html: &str);
}

impl<S: MessageSurface + ?Sized> MessageSurface for &mut S {
    fn replace_html(&mut self, html: &str) {
        (**self).replace_html(html);
    }

    fn append_html(&mut self, html: &str) {
        (**self).append_html(html);
    }

    fn scroll_into_view(&mut self) {
        (**self).scroll_into_view();
    }
}
