/// Default origin of the chat server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

pub const CHAT_PATH: &str = "/chat";
pub const AREAS_PATH: &str = "/areas";

/// Join a base URL and an endpoint path.
///
/// Blank input falls back to [`DEFAULT_BASE_URL`]; an endpoint path already present
/// at the end of the base is not duplicated.
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    let base = if base_url.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        base_url.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(path) {
        return trimmed.to_string();
    }
    format!("{trimmed}{path}")
}

pub fn chat_url(base_url: &str) -> String {
    endpoint_url(base_url, CHAT_PATH)
}

pub fn areas_url(base_url: &str) -> String {
    endpoint_url(base_url, AREAS_PATH)
}
