//! Markdown to HTML transform for final answers.
//!
//! Raw HTML inside the answer is never passed through: it is escaped like any
//! other text. Math spans are emitted with `\( \)` / `\[ \]` delimiters so a
//! typesetting pass can find them later.

use std::collections::HashMap;

use markdown::mdast::{self, AlignKind, Node};
use markdown::{to_mdast, Constructs, ParseOptions};
use once_cell::sync::Lazy;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use super::escape::{escape_html, safe_url};

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

pub const DEFAULT_CODE_THEME: &str = "base16-ocean.dark";

/// Loads syntax definitions and themes ahead of the first final render.
pub fn prewarm_code_highlighting() {
    Lazy::force(&SYNTAX_SET);
    Lazy::force(&THEME_SET);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownOptions {
    /// Highlight fenced code blocks whose language is known.
    pub highlight_code: bool,
    /// Recognize `$inline$` and `$$display$$` math.
    pub math: bool,
    pub code_theme: String,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            highlight_code: true,
            math: true,
            code_theme: DEFAULT_CODE_THEME.to_string(),
        }
    }
}

/// Render with default options.
pub fn markdown_to_html(text: &str) -> String {
    MarkdownHtml::default().render(text)
}

#[derive(Debug, Clone, Default)]
pub struct MarkdownHtml {
    options: MarkdownOptions,
}

impl MarkdownHtml {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MarkdownOptions {
        &self.options
    }

    pub fn render(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        let root = match to_mdast(text, &self.parse_options()) {
            Ok(node) => node,
            Err(message) => {
                tracing::warn!(%message, "markdown parse failed; rendering as plain text");
                return format!("<p>{}</p>\n", escape_html(text));
            }
        };

        let writer = HtmlWriter::new(&self.options, &root);
        let mut out = String::with_capacity(text.len() * 2);
        writer.render_node(&root, &mut out, false);
        out
    }

    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            constructs: Constructs {
                math_flow: self.options.math,
                math_text: self.options.math,
                ..Constructs::gfm()
            },
            ..ParseOptions::gfm()
        }
    }
}

/// One render pass over a parsed document.
struct HtmlWriter<'a> {
    options: &'a MarkdownOptions,
    /// Link reference definitions by normalized identifier; first one wins.
    definitions: HashMap<&'a str, &'a mdast::Definition>,
}

impl<'a> HtmlWriter<'a> {
    fn new(options: &'a MarkdownOptions, root: &'a Node) -> Self {
        let mut definitions = HashMap::new();
        collect_definitions(root, &mut definitions);
        Self {
            options,
            definitions,
        }
    }

    fn render_nodes(&self, nodes: &[Node], out: &mut String, tight: bool) {
        for node in nodes {
            self.render_node(node, out, tight);
        }
    }

    fn render_node(&self, node: &Node, out: &mut String, tight: bool) {
        match node {
            Node::Root(root) => self.render_nodes(&root.children, out, false),
            Node::Heading(heading) => {
                let depth = heading.depth.clamp(1, 6);
                out.push_str(&format!("<h{depth}>"));
                self.render_nodes(&heading.children, out, false);
                out.push_str(&format!("</h{depth}>\n"));
            }
            Node::Paragraph(paragraph) => {
                if tight {
                    self.render_nodes(&paragraph.children, out, false);
                } else {
                    out.push_str("<p>");
                    self.render_nodes(&paragraph.children, out, false);
                    out.push_str("</p>\n");
                }
            }
            Node::Text(text) => out.push_str(&escape_html(&text.value)),
            Node::Strong(strong) => self.wrap_inline("strong", &strong.children, out),
            Node::Emphasis(emphasis) => self.wrap_inline("em", &emphasis.children, out),
            Node::Delete(delete) => self.wrap_inline("del", &delete.children, out),
            Node::InlineCode(code) => {
                out.push_str("<code>");
                out.push_str(&escape_html(&code.value));
                out.push_str("</code>");
            }
            Node::Code(code) => self.render_code_block(code, out),
            Node::Link(link) => {
                self.render_link(&link.url, link.title.as_deref(), &link.children, out)
            }
            Node::LinkReference(reference) => {
                match self.definitions.get(reference.identifier.as_str()) {
                    Some(definition) => self.render_link(
                        &definition.url,
                        definition.title.as_deref(),
                        &reference.children,
                        out,
                    ),
                    None => self.render_nodes(&reference.children, out, false),
                }
            }
            Node::Image(image) => render_image(&image.url, &image.alt, out),
            Node::ImageReference(reference) => {
                match self.definitions.get(reference.identifier.as_str()) {
                    Some(definition) => render_image(&definition.url, &reference.alt, out),
                    None => out.push_str(&escape_html(&reference.alt)),
                }
            }
            Node::Definition(_) => {}
            Node::Break(_) => out.push_str("<br />\n"),
            Node::Html(html) => out.push_str(&escape_html(&html.value)),
            Node::InlineMath(math) => {
                out.push_str("<span class=\"math-inline\">\\(");
                out.push_str(&escape_html(&math.value));
                out.push_str("\\)</span>");
            }
            Node::Math(math) => {
                out.push_str("<div class=\"math-display\">\\[");
                out.push_str(&escape_html(&math.value));
                out.push_str("\\]</div>\n");
            }
            Node::List(list) => self.render_list(list, out),
            Node::ListItem(item) => self.render_list_item(item, out, tight),
            Node::Blockquote(blockquote) => {
                out.push_str("<blockquote>\n");
                self.render_nodes(&blockquote.children, out, false);
                out.push_str("</blockquote>\n");
            }
            Node::ThematicBreak(_) => out.push_str("<hr />\n"),
            Node::Table(table) => self.render_table(table, out),
            other => {
                if let Some(children) = other.children() {
                    self.render_nodes(children, out, tight);
                }
            }
        }
    }

    fn wrap_inline(&self, tag: &str, children: &[Node], out: &mut String) {
        out.push_str(&format!("<{tag}>"));
        self.render_nodes(children, out, false);
        out.push_str(&format!("</{tag}>"));
    }

    fn render_link(&self, url: &str, title: Option<&str>, children: &[Node], out: &mut String) {
        let Some(url) = safe_url(url) else {
            self.render_nodes(children, out, false);
            return;
        };

        out.push_str(&format!("<a href=\"{}\"", escape_html(url)));
        if let Some(title) = title {
            out.push_str(&format!(" title=\"{}\"", escape_html(title)));
        }
        out.push_str(" target=\"_blank\" rel=\"noopener noreferrer\">");
        self.render_nodes(children, out, false);
        out.push_str("</a>");
    }

    fn render_code_block(&self, code: &mdast::Code, out: &mut String) {
        let lang = code.lang.as_deref().map(str::trim).filter(|lang| !lang.is_empty());

        if let Some(highlighted) = lang.and_then(|lang| self.highlight(&code.value, lang)) {
            out.push_str(&highlighted);
            if !highlighted.ends_with('\n') {
                out.push('\n');
            }
            return;
        }

        match lang {
            Some(lang) => out.push_str(&format!(
                "<pre><code class=\"language-{}\">",
                escape_html(lang)
            )),
            None => out.push_str("<pre><code>"),
        }
        out.push_str(&escape_html(&code.value));
        out.push_str("</code></pre>\n");
    }

    fn highlight(&self, code: &str, lang: &str) -> Option<String> {
        if !self.options.highlight_code {
            return None;
        }

        let syntax = SYNTAX_SET.find_syntax_by_token(lang)?;
        let theme: &Theme = THEME_SET.themes.get(&self.options.code_theme)?;
        match highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme) {
            Ok(html) => Some(html),
            Err(error) => {
                tracing::debug!(%error, lang, "code highlighting failed; using plain block");
                None
            }
        }
    }

    fn render_list(&self, list: &mdast::List, out: &mut String) {
        let tight = !list.spread;
        if list.ordered {
            match list.start {
                Some(start) if start != 1 => out.push_str(&format!("<ol start=\"{start}\">\n")),
                _ => out.push_str("<ol>\n"),
            }
        } else {
            out.push_str("<ul>\n");
        }

        self.render_nodes(&list.children, out, tight);

        out.push_str(if list.ordered { "</ol>\n" } else { "</ul>\n" });
    }

    fn render_list_item(&self, item: &mdast::ListItem, out: &mut String, tight: bool) {
        out.push_str("<li>");
        match item.checked {
            Some(true) => out.push_str("<input type=\"checkbox\" checked disabled /> "),
            Some(false) => out.push_str("<input type=\"checkbox\" disabled /> "),
            None => {}
        }
        let tight = tight && !item.spread;
        if !tight {
            out.push('\n');
        }
        self.render_nodes(&item.children, out, tight);
        out.push_str("</li>\n");
    }

    fn render_table(&self, table: &mdast::Table, out: &mut String) {
        out.push_str("<table>\n");

        let rows: Vec<&mdast::TableRow> = table
            .children
            .iter()
            .filter_map(|node| match node {
                Node::TableRow(row) => Some(row),
                _ => None,
            })
            .collect();

        for (row_index, row) in rows.iter().enumerate() {
            if row_index == 0 {
                out.push_str("<thead>\n");
            } else if row_index == 1 {
                out.push_str("<tbody>\n");
            }

            let tag = if row_index == 0 { "th" } else { "td" };
            out.push_str("<tr>\n");
            for (column, cell) in row.children.iter().enumerate() {
                match table.align.get(column).and_then(align_name) {
                    Some(align) => out.push_str(&format!("<{tag} style=\"text-align: {align}\">")),
                    None => out.push_str(&format!("<{tag}>")),
                }
                if let Some(children) = cell.children() {
                    self.render_nodes(children, out, true);
                }
                out.push_str(&format!("</{tag}>\n"));
            }
            out.push_str("</tr>\n");

            if row_index == 0 {
                out.push_str("</thead>\n");
            }
        }

        if rows.len() > 1 {
            out.push_str("</tbody>\n");
        }
        out.push_str("</table>\n");
    }
}

fn render_image(url: &str, alt: &str, out: &mut String) {
    match safe_url(url) {
        Some(url) => out.push_str(&format!(
            "<img src=\"{}\" alt=\"{}\" />",
            escape_html(url),
            escape_html(alt)
        )),
        None => out.push_str(&escape_html(alt)),
    }
}

fn collect_definitions<'a>(
    node: &'a Node,
    definitions: &mut HashMap<&'a str, &'a mdast::Definition>,
) {
    if let Node::Definition(definition) = node {
        definitions
            .entry(definition.identifier.as_str())
            .or_insert(definition);
    }
    if let Some(children) = node.children() {
        for child in children {
            collect_definitions(child, definitions);
        }
    }
}

fn align_name(align: &AlignKind) -> Option<&'static str> {
    match align {
        AlignKind::Left => Some("left"),
        AlignKind::Right => Some("right"),
        AlignKind::Center => Some("center"),
        AlignKind::None => None,
    }
}
