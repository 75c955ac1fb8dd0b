//! Markdown to HTML transform invoked between fetch and link rewriting.

use pulldown_cmark::{Options, Parser, html};

/// Pure markdown-to-markup transform.
pub trait MarkdownRenderer: Send + Sync {
    /// Render markdown source to markup.
    fn render(&self, markdown: &str) -> String;
}

/// CommonMark renderer with the GitHub-flavored extensions docs rely on.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmarkRenderer;

impl CmarkRenderer {
    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_HEADING_ATTRIBUTES
    }
}

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options());
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_render_as_href_attributes() {
        let html = CmarkRenderer.render("See [the API](api/Actions.md#usage).");
        assert!(html.contains(r#"<a href="api/Actions.md#usage">the API</a>"#));
    }

    #[test]
    fn test_tables_are_enabled() {
        let html = CmarkRenderer.render("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }
}
