use thiserror::Error;

use super::surface::MessageSurface;

#[derive(Debug, Error)]
#[error("math typesetting failed: {message}")]
pub struct TypesetError {
    message: String,
}

impl TypesetError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Optional pass that turns math delimiters in a rendered message into typeset output.
///
/// Runs on final content only, after the markdown transform and after the
/// sources affordance has been attached. `html` is the node's full content at
/// that point; an implementation writes its result back through `target`.
pub trait MathTypesetter: Send {
    fn typeset(&mut self, html: &str, target: &mut dyn MessageSurface)
        -> Result<(), TypesetError>;
}
