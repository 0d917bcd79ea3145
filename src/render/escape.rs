//! Escaping boundary for externally sourced text.
//!
//! Every string that did not come out of the markdown transform passes through
//! here before it reaches a surface as markup.

/// Escape text for use as HTML element content or a quoted attribute value.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Returns the URL when it is safe to place in `href`/`src`.
///
/// Relative URLs and `http`, `https` and `mailto` schemes pass; anything else
/// (`javascript:`, `data:`, ...) is rejected.
pub fn safe_url(url: &str) -> Option<&str> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    let scheme_end = trimmed.find(':');
    let path_start = trimmed.find(|ch: char| matches!(ch, '/' | '?' | '#'));
    let scheme = match (scheme_end, path_start) {
        (Some(colon), Some(path)) if colon > path => None,
        (Some(colon), _) => Some(&trimmed[..colon]),
        (None, _) => None,
    };

    match scheme {
        None => Some(trimmed),
        Some(scheme)
            if scheme.eq_ignore_ascii_case("http")
                || scheme.eq_ignore_ascii_case("https")
                || scheme.eq_ignore_ascii_case("mailto") =>
        {
            Some(trimmed)
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_html, safe_url};

    #[test]
    fn escapes_markup_and_quotes() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(escape_html("Olá, mundo █"), "Olá, mundo █");
    }

    #[test]
    fn safe_url_accepts_web_and_relative_links() {
        assert_eq!(safe_url("https://example.test/a"), Some("https://example.test/a"));
        assert_eq!(safe_url("/static/doc.pdf#page=3"), Some("/static/doc.pdf#page=3"));
        assert_eq!(safe_url("docs/a:b.pdf"), Some("docs/a:b.pdf"));
        assert_eq!(safe_url("mailto:help@example.test"), Some("mailto:help@example.test"));
    }

    #[test]
    fn safe_url_rejects_script_schemes() {
        assert_eq!(safe_url("javascript:alert(1)"), None);
        assert_eq!(safe_url(" JavaScript:alert(1)"), None);
        assert_eq!(safe_url("data:text/html;base64,xx"), None);
        assert_eq!(safe_url(""), None);
    }
}
