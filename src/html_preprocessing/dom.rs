//! Small helpers over kuchiki's mutable DOM shared by the preprocessing passes.
//!
//! Every pass follows the same shape: parse the string into its own document,
//! collect the nodes to rewrite, mutate them in place, then serialize the
//! `<body>` children back to a string. The document is dropped at the end of
//! the pass, so no tree is ever shared between passes.

use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink;

use crate::error::CleanerResult;

/// Parse an HTML string (document or fragment) into a mutable tree
pub fn parse_document(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html.to_string())
}

/// Serialize the children of `<body>`, dropping the synthesized html/head wrapper
pub fn serialize_body(document: &NodeRef) -> CleanerResult<String> {
    match document.select_first("body") {
        Ok(body) => inner_html(body.as_node()),
        Err(()) => outer_html(document),
    }
}

/// Serialize a node's children
pub fn inner_html(node: &NodeRef) -> CleanerResult<String> {
    let mut output = Vec::new();
    for child in node.children() {
        child.serialize(&mut output)?;
    }
    Ok(String::from_utf8(output)?)
}

/// Serialize a node including its own tag
pub fn outer_html(node: &NodeRef) -> CleanerResult<String> {
    let mut output = Vec::new();
    node.serialize(&mut output)?;
    Ok(String::from_utf8(output)?)
}

/// Parse an HTML snippet into detached top-level nodes ready for insertion
pub fn parse_fragment(html: &str) -> Vec<NodeRef> {
    let document = parse_document(html);
    let Ok(body) = document.select_first("body") else {
        return Vec::new();
    };
    let nodes: Vec<NodeRef> = body.as_node().children().collect();
    for node in &nodes {
        node.detach();
    }
    nodes
}

/// Replace `node` with the nodes parsed from `html`
pub fn replace_with_html(node: &NodeRef, html: &str) {
    for replacement in parse_fragment(html) {
        node.insert_before(replacement);
    }
    node.detach();
}

/// Replace `node` with a single text node
pub fn replace_with_text(node: &NodeRef, text: &str) {
    node.insert_before(NodeRef::new_text(text));
    node.detach();
}

/// Replace `node` with its own children, keeping their order
pub fn unwrap_node(node: &NodeRef) {
    let children: Vec<NodeRef> = node.children().collect();
    for child in children {
        node.insert_before(child);
    }
    node.detach();
}

pub fn is_tag(node: &NodeRef, name: &str) -> bool {
    node.as_element().is_some_and(|el| &*el.name.local == name)
}

pub fn is_any_tag(node: &NodeRef, names: &[&str]) -> bool {
    node.as_element()
        .is_some_and(|el| names.contains(&&*el.name.local))
}

/// Attribute value, if present
pub fn attr(node: &NodeRef, name: &str) -> Option<String> {
    node.as_element()
        .and_then(|el| el.attributes.borrow().get(name).map(str::to_string))
}

/// Attribute value with surrounding whitespace removed; `None` when blank
pub fn non_empty_attr(node: &NodeRef, name: &str) -> Option<String> {
    attr(node, name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Whether the element's class list contains `class`
pub fn has_class(node: &NodeRef, class: &str) -> bool {
    attr(node, "class").is_some_and(|value| value.split_whitespace().any(|c| c == class))
}

/// Whether the element's class list contains any of `classes`
pub fn has_any_class(node: &NodeRef, classes: &[&str]) -> bool {
    attr(node, "class")
        .is_some_and(|value| value.split_whitespace().any(|c| classes.contains(&c)))
}

/// All descendant elements with the given tag, in document order
pub fn elements_by_tag(root: &NodeRef, name: &str) -> Vec<NodeRef> {
    root.descendants().filter(|n| is_tag(n, name)).collect()
}

/// All descendant elements carrying any of `classes`, in document order
pub fn elements_by_class(root: &NodeRef, classes: &[&str]) -> Vec<NodeRef> {
    root.descendants()
        .filter(|n| has_any_class(n, classes))
        .collect()
}

/// First descendant element with the given tag
pub fn first_by_tag(root: &NodeRef, name: &str) -> Option<NodeRef> {
    root.descendants().find(|n| is_tag(n, name))
}

/// First descendant element carrying `class`
pub fn first_by_class(root: &NodeRef, class: &str) -> Option<NodeRef> {
    root.descendants().find(|n| has_class(n, class))
}

/// Direct element children with the given tag
pub fn child_elements_by_tag(node: &NodeRef, name: &str) -> Vec<NodeRef> {
    node.children().filter(|n| is_tag(n, name)).collect()
}

/// Whether `node` is still part of the tree rooted at `root`
///
/// A node removed together with an ancestor keeps its own parent link, so
/// checking `parent()` alone is not enough.
pub fn is_within(node: &NodeRef, root: &NodeRef) -> bool {
    node.ancestors().any(|ancestor| ancestor == *root)
}
