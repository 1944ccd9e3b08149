//! Presentation metadata removal.
//!
//! Confluence decorates almost every element with `class`, `style` and
//! `data-*` attributes. None of them survive into Markdown, but they still
//! cost parse time in the converter and leak into preserved HTML tables, so
//! they are stripped here. The one exception is a `language-*` class token,
//! which the fenced code block handler reads to tag the fence.

use regex::Regex;
use std::sync::LazyLock;

use super::dom::{parse_document, serialize_body};
use crate::error::CleanerResult;

static LANGUAGE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\blanguage-\S+").expect("LANGUAGE_CLASS_RE: hardcoded regex is valid")
});

/// Remove `class`, `style` and `data-*` attributes from every element
///
/// Falls back to the unmodified input (with a warning) if the tree cannot be
/// serialized.
pub fn remove_confluence_metadata(html: &str) -> String {
    match try_remove_confluence_metadata(html) {
        Ok(cleaned) => cleaned,
        Err(e) => {
            tracing::warn!("Metadata removal failed: {}, using unmodified HTML", e);
            html.to_string()
        }
    }
}

pub(crate) fn try_remove_confluence_metadata(html: &str) -> CleanerResult<String> {
    let document = parse_document(html);

    for node in document.descendants() {
        let Some(element) = node.as_element() else {
            continue;
        };
        let mut attrs = element.attributes.borrow_mut();

        let language_class = attrs
            .get("class")
            .and_then(|class| LANGUAGE_CLASS_RE.find(class))
            .map(|m| m.as_str().to_string());
        match language_class {
            Some(class) => {
                attrs.insert("class", class);
            }
            None => {
                attrs.remove("class");
            }
        }

        attrs.remove("style");

        let data_attrs: Vec<String> = attrs
            .map
            .keys()
            .map(|name| name.local.to_string())
            .filter(|name| name.starts_with("data-"))
            .collect();
        for name in data_attrs {
            attrs.remove(name.as_str());
        }
    }

    serialize_body(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_class_style_and_data() {
        let html = r#"<div class="x" style="color:red" data-y="1" id="keep"><p data-z="2">T</p></div>"#;
        let cleaned = remove_confluence_metadata(html);
        assert!(!cleaned.contains("class="));
        assert!(!cleaned.contains("style="));
        assert!(!cleaned.contains("data-"));
        assert!(cleaned.contains(r#"id="keep""#));
        assert!(cleaned.contains("<p>T</p>"));
    }

    #[test]
    fn test_keeps_only_language_token() {
        let html = r#"<pre><code class="hljs language-rust highlighted">fn x() {}</code></pre>"#;
        let cleaned = remove_confluence_metadata(html);
        assert!(cleaned.contains(r#"<code class="language-rust">"#), "got: {cleaned}");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(remove_confluence_metadata("just text"), "just text");
    }
}
