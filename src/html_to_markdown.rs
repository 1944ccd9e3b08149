//! HTML to Markdown conversion.
//!
//! Wraps the htmd converter from [`crate::custom_handlers`]. Building a
//! converter registers every handler, so instances are cached: one for table
//! conversion on and one for off. htmd converters hold `Rc`-based handler
//! state, so the cache is per thread.

use htmd::HtmlToMarkdown;
use std::cell::OnceCell;
use std::rc::Rc;

use crate::custom_handlers::create_converter;
use crate::error::{CleanerError, CleanerResult};

thread_local! {
    static CONVERTERS: ConverterCache = ConverterCache::default();
}

/// Lazily built converters keyed by the table-conversion flag
#[derive(Default)]
struct ConverterCache {
    with_tables: OnceCell<Rc<HtmlToMarkdown>>,
    without_tables: OnceCell<Rc<HtmlToMarkdown>>,
}

impl ConverterCache {
    fn get(&self, convert_tables: bool) -> Rc<HtmlToMarkdown> {
        let cell = if convert_tables {
            &self.with_tables
        } else {
            &self.without_tables
        };
        Rc::clone(cell.get_or_init(|| {
            tracing::debug!("Building Markdown converter (convert_tables={})", convert_tables);
            Rc::new(create_converter(convert_tables))
        }))
    }
}

/// The cached converter for this thread and flag
pub fn converter_for(convert_tables: bool) -> Rc<HtmlToMarkdown> {
    CONVERTERS.with(|cache| cache.get(convert_tables))
}

/// HTML to Markdown converter with configurable options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownConverter {
    convert_tables: bool,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self {
            convert_tables: true,
        }
    }
}

impl MarkdownConverter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Render tables as pipe tables (true) or keep them as HTML (false)
    #[must_use]
    pub fn with_convert_tables(mut self, convert: bool) -> Self {
        self.convert_tables = convert;
        self
    }

    pub fn convert_tables(&self) -> bool {
        self.convert_tables
    }

    /// Convert HTML to Markdown
    pub fn convert(&self, html: &str) -> CleanerResult<String> {
        let converter = converter_for(self.convert_tables);
        let markdown = converter
            .convert(html)
            .map_err(|e| CleanerError::Conversion(e.to_string()))?;
        tracing::debug!(
            "Converted {} bytes of HTML to {} bytes of Markdown",
            html.len(),
            markdown.len()
        );
        Ok(markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converter_cache_reuses_instances() {
        let first = converter_for(true);
        let second = converter_for(true);
        assert!(Rc::ptr_eq(&first, &second));

        let other = converter_for(false);
        assert!(!Rc::ptr_eq(&first, &other));
    }

    #[test]
    fn test_atx_headings_and_dash_bullets() {
        let markdown = MarkdownConverter::new()
            .convert("<h2>Title</h2><ul><li>one</li><li>two</li></ul>")
            .expect("conversion succeeds");
        assert!(markdown.contains("## Title"));
        assert!(markdown.contains("- one\n- two"), "got: {markdown}");
    }

    #[test]
    fn test_bold_and_links() {
        let markdown = MarkdownConverter::new()
            .convert(r#"<p><strong>Bold</strong> <a href="https://example.com">site</a></p>"#)
            .expect("conversion succeeds");
        assert!(markdown.contains("**Bold**"));
        assert!(markdown.contains("[site](https://example.com)"));
    }
}
