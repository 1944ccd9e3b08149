//! Custom handlers for htmd HTML-to-Markdown conversion
//!
//! htmd's defaults cover most of what Confluence emits. These handlers change
//! three things:
//!
//! - `<pre><code class="language-x">` becomes a fenced block tagged `x`, with
//!   the code's raw text (htmd would otherwise run it through its handlers)
//! - `<em>`/`<i>` use `*` as the delimiter
//! - tables are written back out as HTML: on one line for
//!   [`crate::markdown_postprocessing::convert_remaining_html_tables`] to
//!   render when table conversion is on, unchanged when it is off

use htmd::{
    Element, HtmlToMarkdown,
    element_handler::{HandlerResult, Handlers},
    options::{BulletListMarker, CodeBlockStyle, HeadingStyle, Options},
};
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use markup5ever_rcdom::{Node, NodeData, SerializableHandle};
use regex::Regex;
use std::rc::Rc;
use std::sync::LazyLock;

const TABLE_TAGS: &[&str] = &["table", "thead", "tbody", "tfoot", "tr", "th", "td"];

static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\n\s*").expect("LINE_BREAK_RE: hardcoded regex is valid")
});

/// Create an htmd converter for the cleaning pipeline
///
/// Table elements always bypass htmd's table rule. With `convert_tables` the
/// table is flattened onto one line so the pipe-table pass can pick it up;
/// without it the markup is kept as is.
pub fn create_converter(convert_tables: bool) -> HtmlToMarkdown {
    let options = Options {
        heading_style: HeadingStyle::Atx,
        code_block_style: CodeBlockStyle::Fenced,
        bullet_list_marker: BulletListMarker::Dash,
        ul_bullet_spacing: 1,
        ..Default::default()
    };

    let mut builder = HtmlToMarkdown::builder()
        .options(options)
        .skip_tags(vec!["script", "style", "head"])
        .add_handler(vec!["pre"], pre_handler)
        .add_handler(vec!["em", "i"], emphasis_handler);

    builder = if convert_tables {
        builder.add_handler(vec!["table"], table_handler)
    } else {
        builder.add_handler(TABLE_TAGS.to_vec(), verbatim_handler)
    };

    builder.build()
}

/// Handle `<pre>` elements as fenced code blocks
fn pre_handler(_handlers: &dyn Handlers, element: Element) -> Option<HandlerResult> {
    let (language, code) = match first_element_child(element.node) {
        Some(child) if is_element(&child, "code") => {
            (language_from_class(&child), extract_raw_text(&child))
        }
        _ => (None, extract_raw_text(element.node)),
    };
    let code = code.trim_matches('\n');

    Some(HandlerResult::from(format!(
        "\n\n```{}\n{}\n```\n\n",
        language.unwrap_or_default(),
        code
    )))
}

/// Handle `<em>`/`<i>` with `*` delimiters
fn emphasis_handler(handlers: &dyn Handlers, element: Element) -> Option<HandlerResult> {
    let content = handlers.walk_children(element.node).content;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Some(HandlerResult::from(content));
    }

    // Keep surrounding spaces outside the delimiters
    let leading = &content[..content.len() - content.trim_start().len()];
    let trailing = &content[content.trim_end().len()..];
    Some(HandlerResult::from(format!("{leading}*{trimmed}*{trailing}")))
}

/// Write a table out as single-line HTML between blank lines
fn table_handler(_handlers: &dyn Handlers, element: Element) -> Option<HandlerResult> {
    let html = serialize_node(element.node)?;
    let html = LINE_BREAK_RE.replace_all(html.trim(), " ");
    Some(HandlerResult::from(format!("\n\n{html}\n\n")))
}

/// Write table markup back out unchanged
fn verbatim_handler(_handlers: &dyn Handlers, element: Element) -> Option<HandlerResult> {
    let html = serialize_node(element.node)?;

    let is_table = matches!(&element.node.data, NodeData::Element { name, .. } if &*name.local == "table");
    if is_table {
        Some(HandlerResult::from(format!("\n\n{html}\n\n")))
    } else {
        Some(HandlerResult::from(html))
    }
}

// === Helper Functions ===

/// Serialize a node including its own tag
fn serialize_node(node: &Rc<Node>) -> Option<String> {
    let handle = SerializableHandle::from(Rc::clone(node));
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };

    let mut output = Vec::new();
    if let Err(e) = serialize(&mut output, &handle, opts) {
        tracing::warn!("Failed to serialize table element: {}", e);
        return None;
    }
    Some(String::from_utf8_lossy(&output).into_owned())
}

/// Extract raw text content from a node tree, preserving all whitespace
fn extract_raw_text(node: &Rc<Node>) -> String {
    let mut text = String::new();

    match &node.data {
        NodeData::Text { contents } => {
            text.push_str(&contents.borrow());
        }
        NodeData::Element { .. } | NodeData::Document | NodeData::Doctype { .. } => {
            for child in node.children.borrow().iter() {
                text.push_str(&extract_raw_text(child));
            }
        }
        NodeData::Comment { .. } | NodeData::ProcessingInstruction { .. } => {}
    }

    text
}

/// First element child, skipping whitespace-only text
fn first_element_child(node: &Rc<Node>) -> Option<Rc<Node>> {
    node.children
        .borrow()
        .iter()
        .find(|child| match &child.data {
            NodeData::Text { contents } => !contents.borrow().trim().is_empty(),
            NodeData::Comment { .. } => false,
            _ => true,
        })
        .filter(|child| matches!(child.data, NodeData::Element { .. }))
        .cloned()
}

fn is_element(node: &Rc<Node>, tag: &str) -> bool {
    matches!(&node.data, NodeData::Element { name, .. } if &*name.local == tag)
}

/// `x` from a `language-x` class token
fn language_from_class(node: &Rc<Node>) -> Option<String> {
    let NodeData::Element { attrs, .. } = &node.data else {
        return None;
    };
    attrs
        .borrow()
        .iter()
        .find(|a| &*a.name.local == "class")
        .and_then(|a| {
            a.value
                .split_whitespace()
                .find_map(|token| token.strip_prefix("language-"))
                .filter(|language| !language.is_empty())
                .map(str::to_string)
        })
}
