//! PlantUML SVG → Mermaid flowchart conversion.
//!
//! Confluence's PlantUML macro renders graphs as inline SVG. The SVG is large
//! and unreadable as text, but Graphviz-style output carries the whole graph in
//! `<g class="node">` / `<g class="edge">` groups: each node group has the
//! node name in `<title>` and the visible label in `<text>`, and each edge
//! group has `A->B` in its `<title>`. That is enough to rebuild the graph as a
//! compact Mermaid flowchart.

use regex::Regex;
use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::CleanerResult;

/// Namespaced attributes such as `xlink:href`, whose prefix declaration is lost
/// when the SVG is re-serialized out of an HTML tree
static PREFIXED_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s[A-Za-z_][\w.-]*:[\w.-]+\s*=\s*(?:"[^"]*"|'[^']*')"#)
        .expect("PREFIXED_ATTR_RE: hardcoded regex is valid")
});

/// Edge titles look like `A->B` or `A-->B`
static EDGE_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)-+>(.+)$").expect("EDGE_TITLE_RE: hardcoded regex is valid")
});

/// One graph node taken from a `<g class="node">` group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramNode {
    /// The SVG element's own `id`, reused as the Mermaid node id
    pub id: String,
    /// `<title>` text, only used to resolve edge endpoints
    pub title: String,
    /// Visible `<text>` label, falling back to the title
    pub label: String,
}

/// One resolved edge between two node ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagramGraph {
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
}

impl DiagramGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Render as Mermaid flowchart source (without the code fence)
    pub fn to_mermaid(&self) -> String {
        let mut lines = Vec::with_capacity(1 + self.nodes.len() + self.edges.len());
        lines.push("flowchart LR".to_string());
        for node in &self.nodes {
            let label = node.label.replace('"', "&quot;");
            lines.push(format!("    {}[\"{}\"]", node.id, label));
        }
        for edge in &self.edges {
            lines.push(format!("    {} --> {}", edge.from, edge.to));
        }
        lines.join("\n")
    }
}

/// Convert PlantUML SVG markup into Mermaid flowchart source
///
/// Returns an empty string when the markup holds no graph (no nodes and no
/// edges) or cannot be parsed; callers keep the original content in that case.
pub fn convert_svg_to_mermaid(svg: &str) -> String {
    match extract_graph(svg) {
        Ok(graph) if !graph.is_empty() => graph.to_mermaid(),
        Ok(_) => String::new(),
        Err(e) => {
            tracing::warn!("SVG diagram extraction failed: {}", e);
            String::new()
        }
    }
}

/// Same as [`convert_svg_to_mermaid`] but wrapped in a ```` ```mermaid ```` fence
pub fn render_mermaid_block(svg: &str) -> String {
    let mermaid = convert_svg_to_mermaid(svg);
    if mermaid.is_empty() {
        return mermaid;
    }
    format!("```mermaid\n{mermaid}\n```")
}

/// Parse SVG markup and pull out its node and edge groups
pub fn extract_graph(svg: &str) -> CleanerResult<DiagramGraph> {
    // HTML serialization writes U+00A0 as `&nbsp;`, which XML does not define.
    let xml = svg.replace("&nbsp;", "&#160;");
    let xml = PREFIXED_ATTR_RE.replace_all(&xml, "");
    let document = Document::parse(xml.trim())?;

    let mut graph = DiagramGraph::default();
    for element in document.descendants().filter(|n| has_class(n, "node")) {
        let Some(id) = element.attribute("id") else {
            continue;
        };
        let title = first_child_text(element, "title");
        if title.is_empty() {
            continue;
        }
        let text = first_child_text(element, "text");
        let label = if text.is_empty() { title.clone() } else { text };
        graph.nodes.push(DiagramNode {
            id: id.to_string(),
            title,
            label,
        });
    }

    let title_to_id: HashMap<&str, &str> = graph
        .nodes
        .iter()
        .map(|node| (node.title.as_str(), node.id.as_str()))
        .collect();

    let mut edges = Vec::new();
    for element in document.descendants().filter(|n| has_class(n, "edge")) {
        let title = first_child_text(element, "title");
        let Some(caps) = EDGE_TITLE_RE.captures(&title) else {
            continue;
        };
        let from = title_to_id.get(caps[1].trim());
        let to = title_to_id.get(caps[2].trim());
        if let (Some(from), Some(to)) = (from, to) {
            edges.push(DiagramEdge {
                from: (*from).to_string(),
                to: (*to).to_string(),
            });
        }
    }
    graph.edges = edges;

    Ok(graph)
}

fn has_class(node: &Node, class: &str) -> bool {
    node.is_element()
        && node
            .attribute("class")
            .is_some_and(|value| value.split_whitespace().any(|c| c == class))
}

/// Trimmed text of the first descendant element named `tag`; empty if absent
fn first_child_text(node: Node, tag: &str) -> String {
    node.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == tag)
        .map(|n| {
            n.descendants()
                .filter(|d| d.is_text())
                .filter_map(|d| d.text())
                .collect::<String>()
        })
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}
