use chat_api::KnowledgeAreas;

use super::escape::escape_html;

/// First assistant message of a conversation, naming the available areas.
pub fn greeting_html(areas: &KnowledgeAreas) -> String {
    if areas.areas.is_empty() {
        return "<p>Hello! Ask me anything about the indexed documents.</p>\n".to_string();
    }

    let names = areas
        .areas
        .iter()
        .map(|area| format!("<strong>{}</strong>", escape_html(area)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("<p>Hello! I can answer questions about {names}.</p>\n")
}

pub fn sidebar_html(areas: &KnowledgeAreas) -> String {
    let mut html = String::from("<ul class=\"knowledge-areas\">\n");
    for area in &areas.areas {
        html.push_str(&format!("<li>{}</li>\n", escape_html(area)));
    }
    html.push_str("</ul>\n");
    html
}
