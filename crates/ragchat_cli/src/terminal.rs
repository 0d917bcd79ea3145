//! Terminal-backed render surfaces.
//!
//! Live frames are drawn as a single status line on stderr (the tail of the
//! answer so far plus the cursor); the final markup is kept so the binary can
//! print it to stdout once the session ends.

use std::io::{self, Write};

use ragchat::{MessageList, MessageSurface, SendControl, Sidebar, SourcesPanel};
use unicode_width::UnicodeWidthChar;

const DEFAULT_COLUMNS: usize = 80;

#[derive(Debug, Default)]
pub struct TerminalMessage {
    html: String,
    updates: usize,
    progress: bool,
    echo: bool,
    cursor: String,
    columns: usize,
}

impl TerminalMessage {
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    fn report(&self) {
        if self.echo {
            print_block(&self.html);
        }
        if !self.progress {
            return;
        }
        let Some(line) = live_line(&self.html, &self.cursor, self.columns) else {
            return;
        };
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "\r\x1b[2K{line}");
        let _ = stderr.flush();
    }
}

/// Status line for a live frame: the last line of the answer, cut from the
/// left to fit `columns`, followed by the cursor. `None` for non-live markup.
pub fn live_line(html: &str, cursor: &str, columns: usize) -> Option<String> {
    if cursor.is_empty() {
        return None;
    }
    let text = html.strip_suffix(cursor)?;
    let text = unescape_html(text);
    let last_line = text.rsplit('\n').next().unwrap_or_default();

    let cursor_width: usize = cursor.chars().filter_map(UnicodeWidthChar::width).sum();
    let budget = columns.saturating_sub(cursor_width + 1);
    let mut width = 0;
    let mut start = last_line.len();
    for (index, ch) in last_line.char_indices().rev() {
        width += ch.width().unwrap_or(0);
        if width > budget {
            break;
        }
        start = index;
    }
    Some(format!("{}{cursor}", &last_line[start..]))
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn terminal_columns() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|columns| *columns > 0)
        .unwrap_or(DEFAULT_COLUMNS)
}

impl MessageSurface for TerminalMessage {
    fn replace_html(&mut self, html: &str) {
        self.html.clear();
        self.html.push_str(html);
        self.updates += 1;
        self.report();
    }

    fn append_html(&mut self, html: &str) {
        self.html.push_str(html);
        self.updates += 1;
        self.report();
    }
}

#[derive(Debug, Default)]
pub struct TerminalList {
    progress: bool,
    echo: bool,
    cursor: String,
}

impl TerminalList {
    /// `cursor` marks live frames; with `progress` they are drawn on stderr.
    pub fn new(progress: bool, cursor: impl Into<String>) -> Self {
        Self {
            progress,
            echo: false,
            cursor: cursor.into(),
        }
    }

    /// Assistant messages print every update to stdout (used for the greeting).
    pub fn echoing() -> Self {
        Self {
            progress: false,
            echo: true,
            cursor: String::new(),
        }
    }
}

impl MessageList for TerminalList {
    type Message = TerminalMessage;

    fn append_user_message(&mut self, html: &str) {
        tracing::debug!(message = html, "user message");
    }

    fn append_assistant_message(&mut self) -> TerminalMessage {
        TerminalMessage {
            progress: self.progress,
            echo: self.echo,
            cursor: self.cursor.clone(),
            columns: terminal_columns(),
            ..TerminalMessage::default()
        }
    }
}

/// Writes shown markup straight to stdout.
#[derive(Debug, Default)]
pub struct StdoutPanel;

impl SourcesPanel for StdoutPanel {
    fn show(&mut self, html: &str) {
        print_block(html);
    }
}

impl Sidebar for StdoutPanel {
    fn show(&mut self, html: &str) {
        print_block(html);
    }
}

/// Clears the progress line once the session releases the send control.
#[derive(Debug, Default)]
pub struct ProgressLine {
    progress: bool,
}

impl ProgressLine {
    pub fn new(progress: bool) -> Self {
        Self { progress }
    }
}

impl SendControl for ProgressLine {
    fn set_enabled(&mut self, enabled: bool) {
        if enabled && self.progress {
            let mut stderr = io::stderr().lock();
            let _ = write!(stderr, "\r\x1b[2K");
            let _ = stderr.flush();
        }
    }
}

pub fn print_block(html: &str) {
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(html.as_bytes());
    if !html.ends_with('\n') {
        let _ = stdout.write_all(b"\n");
    }
    let _ = stdout.flush();
}
