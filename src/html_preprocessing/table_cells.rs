//! Table cell flattening.
//!
//! Markdown pipe tables hold one line of inline content per cell, while
//! Confluence cells routinely wrap their content in `<p>`/`<div>` blocks,
//! lists and line breaks. This pass reduces every `<td>`/`<th>` to inline
//! content before conversion so each row renders as a single pipe-table line.
//!
//! Images are turned into literal `![alt](src)` text here rather than left to
//! the converter, whose escaping inside table cells mangles image syntax.

use kuchiki::NodeRef;

use super::dom::{
    elements_by_tag, is_any_tag, non_empty_attr, parse_document, replace_with_text,
    serialize_body, unwrap_node,
};
use crate::error::CleanerResult;

const BLOCK_TAGS: &[&str] = &["div", "p"];
const LIST_TAGS: &[&str] = &["ul", "ol"];
const INLINE_TAGS: &[&str] = &["img", "a", "strong", "em", "code", "b", "i"];

/// Flatten block content inside table cells and drop `colgroup`s
pub fn normalize_table_cells(html: &str) -> String {
    match try_normalize_table_cells(html) {
        Ok(normalized) => normalized,
        Err(e) => {
            tracing::warn!("Table cell normalization failed: {}, using unnormalized HTML", e);
            html.to_string()
        }
    }
}

pub(crate) fn try_normalize_table_cells(html: &str) -> CleanerResult<String> {
    let lowered = html.to_ascii_lowercase();
    if !lowered.contains("<td") && !lowered.contains("<th") && !lowered.contains("<colgroup") {
        return Ok(html.to_string());
    }

    let document = parse_document(html);

    let cells: Vec<NodeRef> = document
        .descendants()
        .filter(|n| is_any_tag(n, &["td", "th"]))
        .collect();
    for cell in &cells {
        flatten_blocks(cell);
        images_to_markdown(cell);
        lists_to_text(cell);
        remove_isolated_breaks(cell);
        remove_empty_elements(cell);
        trim_direct_text(cell);
    }

    for colgroup in elements_by_tag(&document, "colgroup") {
        colgroup.detach();
    }

    serialize_body(&document)
}

/// Replace `div`/`p` blocks innermost first until none remain
fn flatten_blocks(cell: &NodeRef) {
    while let Some(block) = cell.descendants().find(|n| {
        is_any_tag(n, BLOCK_TAGS) && !n.descendants().any(|d| is_any_tag(&d, BLOCK_TAGS))
    }) {
        let keeps_markup = block.descendants().any(|d| is_any_tag(&d, INLINE_TAGS));
        if keeps_markup {
            let has_content = block
                .children()
                .any(|c| c.as_element().is_some() || !c.text_contents().trim().is_empty());
            if has_content {
                unwrap_node(&block);
            } else {
                block.detach();
            }
        } else {
            let text = block.text_contents();
            let text = text.trim();
            if text.is_empty() {
                block.detach();
            } else {
                replace_with_text(&block, text);
            }
        }
    }
}

fn images_to_markdown(cell: &NodeRef) {
    for img in elements_by_tag(cell, "img") {
        let Some(src) = non_empty_attr(&img, "src") else {
            continue;
        };
        let alt = non_empty_attr(&img, "alt").unwrap_or_default();
        replace_with_text(&img, &format!("![{alt}]({src})"));
    }
}

/// Collapse each outermost list to its item texts joined by a space
fn lists_to_text(cell: &NodeRef) {
    let lists: Vec<NodeRef> = cell
        .descendants()
        .filter(|n| is_any_tag(n, LIST_TAGS))
        .filter(|n| !n.ancestors().any(|a| is_any_tag(&a, LIST_TAGS)))
        .collect();
    for list in lists {
        let items: Vec<String> = elements_by_tag(&list, "li")
            .iter()
            .map(|li| li.text_contents().trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();
        if items.is_empty() {
            list.detach();
        } else {
            replace_with_text(&list, &items.join(" "));
        }
    }
}

/// Drop `<br>`s that have no text on either side
fn remove_isolated_breaks(cell: &NodeRef) {
    for br in elements_by_tag(cell, "br") {
        let before = br
            .previous_sibling()
            .map(|n| n.text_contents())
            .unwrap_or_default();
        let after = br
            .next_sibling()
            .map(|n| n.text_contents())
            .unwrap_or_default();
        if before.trim().is_empty() && after.trim().is_empty() {
            br.detach();
        }
    }
}

/// Remove element leaves without text, repeating as parents become empty
fn remove_empty_elements(cell: &NodeRef) {
    loop {
        let empty: Vec<NodeRef> = cell
            .descendants()
            .filter(|n| n.as_element().is_some())
            .filter(|n| !n.children().any(|c| c.as_element().is_some()))
            .filter(|n| n.text_contents().trim().is_empty())
            .collect();
        if empty.is_empty() {
            break;
        }
        for node in empty {
            node.detach();
        }
    }
}

/// Trim the cell's direct text nodes
///
/// Whitespace at the cell edges is removed; whitespace between a text node
/// and a neighbouring element collapses to one space so inline runs like
/// `See <a>link</a> here` keep their word breaks.
fn trim_direct_text(cell: &NodeRef) {
    let children: Vec<NodeRef> = cell.children().collect();
    let last = children.len().saturating_sub(1);
    for (index, child) in children.iter().enumerate() {
        let Some(text) = child.as_text() else {
            continue;
        };
        let original = text.borrow().clone();
        let core = original.trim();
        let trimmed = if core.is_empty() {
            if index == 0 || index == last { String::new() } else { " ".to_string() }
        } else {
            let mut value = String::with_capacity(core.len() + 2);
            if index > 0 && original.starts_with(char::is_whitespace) {
                value.push(' ');
            }
            value.push_str(core);
            if index < last && original.ends_with(char::is_whitespace) {
                value.push(' ');
            }
            value
        };
        *text.borrow_mut() = trimmed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell_html(html: &str) -> String {
        let normalized = normalize_table_cells(html);
        let start = normalized.find("<td>").expect("cell present") + 4;
        let end = normalized.find("</td>").expect("cell closed");
        normalized[start..end].to_string()
    }

    #[test]
    fn test_text_blocks_become_text() {
        let html = "<table><tr><td><div><p>  First  </p></div></td></tr></table>";
        assert_eq!(cell_html(html), "First");
    }

    #[test]
    fn test_inline_markup_is_kept() {
        let html = r#"<table><tr><td><p>See <a href="/x">link</a> and <strong>bold</strong></p></td></tr></table>"#;
        assert_eq!(cell_html(html), r#"See <a href="/x">link</a> and <strong>bold</strong>"#);
    }

    #[test]
    fn test_images_become_markdown() {
        let html = r#"<table><tr><td><p><img src="/download/a.png" alt="Diagram"></p></td></tr></table>"#;
        assert_eq!(cell_html(html), "![Diagram](/download/a.png)");
    }

    #[test]
    fn test_lists_become_joined_text() {
        let html = "<table><tr><td><ul><li>one</li><li></li><li>two</li></ul></td></tr></table>";
        assert_eq!(cell_html(html), "one two");
    }

    #[test]
    fn test_empty_blocks_and_breaks_removed() {
        let html = "<table><tr><td><p></p><br><span> </span>value</td></tr></table>";
        assert_eq!(cell_html(html), "value");
    }

    #[test]
    fn test_colgroup_removed() {
        let html = r#"<table><colgroup><col style="width: 10px"></colgroup><tr><td>x</td></tr></table>"#;
        let normalized = normalize_table_cells(html);
        assert!(!normalized.contains("colgroup"));
        assert!(!normalized.contains("<col"));
    }

    #[test]
    fn test_uppercase_tags_are_normalized() {
        let html = "<TABLE><TR><TD><P>x</P></TD></TR></TABLE>";
        assert_eq!(cell_html(html), "x");
    }

    #[test]
    fn test_html_without_tables_is_untouched() {
        let html = "<p>no tables</p>";
        assert_eq!(normalize_table_cells(html), html);
    }
}
