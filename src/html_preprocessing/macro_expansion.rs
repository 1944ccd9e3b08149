//! Confluence macro and layout expansion.
//!
//! Handles both markups Confluence hands out:
//!
//! - **Storage format**: `<ac:structured-macro ac:name="…">` (and legacy
//!   `<ac:macro>`) with `<ac:parameter>` children and an `ac:rich-text-body` or
//!   `ac:plain-text-body`, plus `ac:layout*`, `ac:image`, `ac:link` and `time`.
//! - **Rendered HTML**: elements tagged with `data-macro-name` and the viewer's
//!   CSS classes (`expand-container`, `plantuml-svg-image`, layout columns, ...).
//!
//! Detection relies on `class` and `data-*` attributes, so this pass has to run
//! before metadata removal.

use html_escape::encode_text;
use kuchiki::NodeRef;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::dom::{
    attr, child_elements_by_tag, elements_by_class, elements_by_tag, first_by_class, first_by_tag,
    has_class, inner_html, is_any_tag, is_within, non_empty_attr, parse_document,
    replace_with_html, replace_with_text, serialize_body, unwrap_node,
};
use super::macros::{MacroBody, MacroDescriptor, MacroKind, render_code_block, render_expand};
use super::svg_diagram::convert_svg_to_mermaid;
use crate::error::CleanerResult;

/// Self-closing storage tags; an HTML parser would leave them open and
/// swallow every following sibling
static SELF_CLOSING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<((?:ac|ri):[\w-]+|time)(\s[^<>]*?)?\s*/>")
        .expect("SELF_CLOSING_RE: hardcoded regex is valid")
});

static CDATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("CDATA_RE: hardcoded regex is valid")
});

static LANGUAGE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\blanguage-(\S+)").expect("LANGUAGE_CLASS_RE: hardcoded regex is valid")
});

/// `brush: java; gutter: false` in `data-syntaxhighlighter-params`
static BRUSH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"brush:\s*([\w+#-]+)").expect("BRUSH_RE: hardcoded regex is valid")
});

const STORAGE_MACRO_TAGS: &[&str] = &["ac:structured-macro", "ac:macro"];
const STORAGE_LAYOUT_TAGS: &[&str] = &["ac:layout", "ac:layout-section", "ac:layout-cell"];
const LAYOUT_CLASSES: &[&str] = &["contentLayout2", "columnLayout", "cell", "innerCell"];

/// Rewrite Confluence macros and layout markup into plain HTML
///
/// Falls back to the unmodified input (with a warning) on failure.
pub fn process_confluence_macros(html: &str) -> String {
    match try_process_confluence_macros(html) {
        Ok(processed) => processed,
        Err(e) => {
            tracing::warn!("Macro expansion failed: {}, using unexpanded HTML", e);
            html.to_string()
        }
    }
}

pub(crate) fn try_process_confluence_macros(html: &str) -> CleanerResult<String> {
    let normalized = normalize_storage_markup(html);
    let document = parse_document(&normalized);

    let storage_count = expand_storage_macros(&document)?;
    expand_storage_constructs(&document);

    // Page trees carry a macro name too; drop them before macros get unwrapped
    for tree in elements_by_class(&document, &["plugin_pagetree"]) {
        tree.detach();
    }
    convert_plantuml_diagrams(&document)?;
    let rendered_count = expand_rendered_macros(&document)?;
    expand_rendered_widgets(&document)?;

    tracing::debug!(
        "Expanded {} storage and {} rendered macros",
        storage_count,
        rendered_count
    );

    serialize_body(&document)
}

/// Make storage-format XML safe for an HTML5 parser
///
/// CDATA sections become escaped text, then self-closing `ac:*`, `ri:*` and
/// `time` tags become explicit open/close pairs. CDATA goes first so markup
/// quoted inside a code body is never rewritten.
pub fn normalize_storage_markup(html: &str) -> String {
    let escaped = if html.contains("<![CDATA[") {
        CDATA_RE
            .replace_all(html, |caps: &Captures| encode_text(&caps[1]).into_owned())
            .into_owned()
    } else {
        html.to_string()
    };

    if !escaped.contains("<ac:") && !escaped.contains("<ri:") && !escaped.contains("<time") {
        return escaped;
    }
    SELF_CLOSING_RE
        .replace_all(&escaped, |caps: &Captures| {
            let tag = &caps[1];
            let attrs = caps.get(2).map_or("", |m| m.as_str());
            format!("<{tag}{attrs}></{tag}>")
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Storage format
// ---------------------------------------------------------------------------

/// Expand `ac:structured-macro`/`ac:macro` elements, innermost first
fn expand_storage_macros(document: &NodeRef) -> CleanerResult<usize> {
    let macros: Vec<NodeRef> = document
        .descendants()
        .filter(|n| is_any_tag(n, STORAGE_MACRO_TAGS))
        .collect();

    let mut count = 0;
    for node in macros.iter().rev() {
        if !is_within(node, document) {
            continue;
        }
        let descriptor = storage_descriptor(node)?;
        replace_with_html(node, &descriptor.render());
        count += 1;
    }
    Ok(count)
}

fn storage_descriptor(node: &NodeRef) -> CleanerResult<MacroDescriptor> {
    let kind = MacroKind::from_name(&attr(node, "ac:name").unwrap_or_default());

    let mut parameters = BTreeMap::new();
    for parameter in child_elements_by_tag(node, "ac:parameter") {
        let name = attr(&parameter, "ac:name").unwrap_or_default();
        let value = parameter_value(&parameter, &mut parameters);
        parameters.insert(name, value);
    }

    let body = if let Some(rich) = child_elements_by_tag(node, "ac:rich-text-body").first() {
        MacroBody::Rich(inner_html(rich)?)
    } else if let Some(plain) = child_elements_by_tag(node, "ac:plain-text-body").first() {
        MacroBody::Plain(plain.text_contents())
    } else {
        MacroBody::Empty
    };

    Ok(MacroDescriptor {
        kind,
        parameters,
        body,
    })
}

/// Parameter value, resolving `ri:*` resource references
///
/// A page reference also records its space under `spaceKey`.
fn parameter_value(parameter: &NodeRef, parameters: &mut BTreeMap<String, String>) -> String {
    if let Some(page) = first_by_tag(parameter, "ri:page") {
        if let Some(space) = non_empty_attr(&page, "ri:space-key") {
            parameters.insert("spaceKey".to_string(), space);
        }
        return non_empty_attr(&page, "ri:content-title").unwrap_or_default();
    }
    if let Some(space) = first_by_tag(parameter, "ri:space") {
        return non_empty_attr(&space, "ri:space-key").unwrap_or_default();
    }
    if let Some(url) = first_by_tag(parameter, "ri:url") {
        return non_empty_attr(&url, "ri:value").unwrap_or_default();
    }
    parameter.text_contents().trim().to_string()
}

/// Layouts, images, links and timestamps outside of macro parameters
fn expand_storage_constructs(document: &NodeRef) {
    for layout in document
        .descendants()
        .filter(|n| is_any_tag(n, STORAGE_LAYOUT_TAGS))
        .collect::<Vec<_>>()
    {
        unwrap_node(&layout);
    }

    for image in elements_by_tag(document, "ac:image") {
        match storage_image_html(&image) {
            Some(img) => replace_with_html(&image, &img),
            None => image.detach(),
        }
    }

    for time in elements_by_tag(document, "time") {
        match non_empty_attr(&time, "datetime") {
            Some(datetime) => replace_with_text(&time, &datetime),
            None => unwrap_node(&time),
        }
    }

    for link in elements_by_tag(document, "ac:link") {
        match storage_link_text(&link) {
            Some(text) => replace_with_text(&link, &text),
            None => link.detach(),
        }
    }
}

fn storage_image_html(image: &NodeRef) -> Option<String> {
    let src = if let Some(attachment) = first_by_tag(image, "ri:attachment") {
        format!("attachment:{}", non_empty_attr(&attachment, "ri:filename")?)
    } else {
        non_empty_attr(&first_by_tag(image, "ri:url")?, "ri:value")?
    };

    let mut html = format!(
        r#"<img src="{}""#,
        html_escape::encode_double_quoted_attribute(&src)
    );
    if let Some(width) = non_empty_attr(image, "ac:width") {
        html.push_str(&format!(
            r#" width="{}""#,
            html_escape::encode_double_quoted_attribute(&width)
        ));
    }
    if let Some(alt) = non_empty_attr(image, "ac:alt") {
        html.push_str(&format!(
            r#" alt="{}""#,
            html_escape::encode_double_quoted_attribute(&alt)
        ));
    }
    html.push('>');
    Some(html)
}

fn storage_link_text(link: &NodeRef) -> Option<String> {
    let body = link
        .children()
        .find(|n| is_any_tag(n, &["ac:link-body", "ac:plain-text-link-body"]))
        .map(|body| body.text_contents().trim().to_string())
        .filter(|text| !text.is_empty());
    if body.is_some() {
        return body;
    }
    if let Some(page) = first_by_tag(link, "ri:page") {
        return non_empty_attr(&page, "ri:content-title");
    }
    if let Some(attachment) = first_by_tag(link, "ri:attachment") {
        return non_empty_attr(&attachment, "ri:filename");
    }
    None
}

// ---------------------------------------------------------------------------
// Rendered HTML
// ---------------------------------------------------------------------------

/// Expand `data-macro-name` elements, innermost first
fn expand_rendered_macros(document: &NodeRef) -> CleanerResult<usize> {
    let macros: Vec<NodeRef> = document
        .descendants()
        .filter(|n| attr(n, "data-macro-name").is_some())
        .collect();

    let mut count = 0;
    for node in macros.iter().rev() {
        if !is_within(node, document) {
            continue;
        }
        let kind = MacroKind::from_name(&attr(node, "data-macro-name").unwrap_or_default());
        match rendered_descriptor(node, kind)? {
            Some(descriptor) => replace_with_html(node, &descriptor.render()),
            None => unwrap_node(node),
        }
        count += 1;
    }
    Ok(count)
}

/// Descriptor for a rendered macro; `None` means "keep the content, drop the wrapper"
fn rendered_descriptor(node: &NodeRef, kind: MacroKind) -> CleanerResult<Option<MacroDescriptor>> {
    let descriptor = match kind {
        kind if kind.is_admonition() => {
            // The title becomes the heading; it must not also appear in the body
            let title = node.children().find(|n| has_class(n, "title")).map(|title| {
                title.detach();
                title.text_contents()
            });
            let body = match first_by_class(node, "confluence-information-macro-body") {
                Some(body) => inner_html(&body)?,
                None => inner_html(node)?,
            };
            let mut descriptor = MacroDescriptor::new(kind, MacroBody::Rich(body));
            if let Some(title) = title {
                descriptor = descriptor.with_parameter("title", title.trim());
            }
            descriptor
        }
        MacroKind::Code => {
            let source = first_by_tag(node, "pre").unwrap_or_else(|| node.clone());
            let mut descriptor =
                MacroDescriptor::new(MacroKind::Code, MacroBody::Plain(source.text_contents()));
            if let Some(language) = rendered_code_language(node) {
                descriptor = descriptor.with_parameter("language", &language);
            }
            descriptor
        }
        MacroKind::Toc => MacroDescriptor::new(MacroKind::Toc, MacroBody::Empty),
        MacroKind::Expand => {
            let body = match first_by_class(node, "expand-content") {
                Some(content) => inner_html(&content)?,
                None => inner_html(node)?,
            };
            let mut descriptor = MacroDescriptor::new(MacroKind::Expand, MacroBody::Rich(body));
            if let Some(control) = first_by_class(node, "expand-control-text") {
                descriptor = descriptor.with_parameter("title", control.text_contents().trim());
            }
            descriptor
        }
        _ => return Ok(None),
    };
    Ok(Some(descriptor))
}

/// Language from a `language-*` class or the syntax highlighter's `brush`
fn rendered_code_language(node: &NodeRef) -> Option<String> {
    node.inclusive_descendants().find_map(|n| {
        let from_class = attr(&n, "class")
            .and_then(|class| LANGUAGE_CLASS_RE.captures(&class).map(|caps| caps[1].to_string()));
        from_class.or_else(|| {
            attr(&n, "data-syntaxhighlighter-params")
                .and_then(|params| BRUSH_RE.captures(&params).map(|caps| caps[1].to_string()))
        })
    })
}

/// PlantUML SVG renderings to Mermaid code blocks; non-graph SVGs stay
fn convert_plantuml_diagrams(document: &NodeRef) -> CleanerResult<()> {
    for diagram in elements_by_class(document, &["plantuml-svg-image"]) {
        let mermaid = convert_svg_to_mermaid(&inner_html(&diagram)?);
        if !mermaid.is_empty() {
            let code = encode_text(&mermaid);
            replace_with_html(&diagram, &render_code_block(Some("mermaid"), &code));
        }
    }
    Ok(())
}

/// Viewer widgets identified by class rather than by macro name
fn expand_rendered_widgets(document: &NodeRef) -> CleanerResult<()> {
    let containers = elements_by_class(document, &["expand-container"]);
    for container in containers.iter().rev() {
        if !is_within(container, document) {
            continue;
        }
        let title = first_by_class(container, "expand-control-text")
            .map(|control| control.text_contents());
        let body = match first_by_class(container, "expand-content") {
            Some(content) => inner_html(&content)?,
            None => String::new(),
        };
        replace_with_html(container, &render_expand(title.as_deref(), &body));
    }

    for wrapper in elements_by_class(document, &["confluence-embedded-file-wrapper"]) {
        if !is_within(&wrapper, document) {
            continue;
        }
        for img in elements_by_tag(&wrapper, "img") {
            wrapper.insert_before(img);
        }
        wrapper.detach();
    }

    for layout in elements_by_class(document, LAYOUT_CLASSES) {
        unwrap_node(&layout);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_storage_elements(html: &str) -> bool {
        parse_document(html).descendants().any(|n| {
            n.as_element().is_some_and(|el| {
                el.name.local.starts_with("ac:") || el.name.local.starts_with("ri:")
            })
        })
    }

    #[test]
    fn test_info_macro_becomes_blockquote() {
        let html = r#"<ac:structured-macro ac:name="info"><ac:parameter ac:name="title">Heads up</ac:parameter><ac:rich-text-body><p>Body</p></ac:rich-text-body></ac:structured-macro>"#;
        let processed = process_confluence_macros(html);
        assert_eq!(
            processed,
            "<blockquote><p><strong>ℹ️ INFO: Heads up</strong></p><p>Body</p></blockquote>"
        );
    }

    #[test]
    fn test_code_macro_keeps_cdata_text() {
        let html = r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language">rust</ac:parameter><ac:plain-text-body><![CDATA[fn f() -> Vec<u8> { vec![] }]]></ac:plain-text-body></ac:structured-macro>"#;
        let processed = process_confluence_macros(html);
        assert_eq!(
            processed,
            r#"<pre><code class="language-rust">fn f() -&gt; Vec&lt;u8&gt; { vec![] }</code></pre>"#
        );
    }

    #[test]
    fn test_markup_quoted_in_cdata_is_not_rewritten() {
        let html = r#"<ac:structured-macro ac:name="code"><ac:plain-text-body><![CDATA[<ri:page ri:content-title="X"/> and <time/>]]></ac:plain-text-body></ac:structured-macro>"#;
        assert_eq!(
            process_confluence_macros(html),
            r#"<pre><code>&lt;ri:page ri:content-title="X"/&gt; and &lt;time/&gt;</code></pre>"#
        );
    }

    #[test]
    fn test_normalize_escapes_cdata_before_expanding_tags() {
        let html = r#"<ri:page ri:content-title="A" /><![CDATA[<time/>]]>"#;
        assert_eq!(
            normalize_storage_markup(html),
            r#"<ri:page ri:content-title="A"></ri:page>&lt;time/&gt;"#
        );
    }

    #[test]
    fn test_self_closing_toc_keeps_siblings() {
        let html = r#"<ac:structured-macro ac:name="toc" /><p>After</p>"#;
        assert_eq!(process_confluence_macros(html), "<p>After</p>");
    }

    #[test]
    fn test_nested_macros_expand_innermost_first() {
        let html = r#"<ac:structured-macro ac:name="expand"><ac:rich-text-body><ac:structured-macro ac:name="tip"><ac:rich-text-body><p>Inner</p></ac:rich-text-body></ac:structured-macro></ac:rich-text-body></ac:structured-macro>"#;
        let processed = process_confluence_macros(html);
        assert!(processed.starts_with("<div><strong>▶ Details</strong><br><br><blockquote>"));
        assert!(processed.contains("💡 TIP"));
        assert!(processed.contains("<p>Inner</p>"));
        assert!(!has_storage_elements(&processed));
    }

    #[test]
    fn test_include_cites_page_reference() {
        let html = r#"<ac:structured-macro ac:name="include"><ac:parameter ac:name=""><ac:link><ri:page ri:content-title="Setup Guide" ri:space-key="ENG" /></ac:link></ac:parameter></ac:structured-macro>"#;
        assert_eq!(
            process_confluence_macros(html),
            "<p>📄 Included page: Setup Guide</p>"
        );
    }

    #[test]
    fn test_widget_url_from_resource() {
        let html = r#"<ac:structured-macro ac:name="widget"><ac:parameter ac:name="url"><ri:url ri:value="https://example.com/v" /></ac:parameter><ac:parameter ac:name="width">400</ac:parameter></ac:structured-macro>"#;
        let processed = process_confluence_macros(html);
        assert!(processed.contains(r#"<a href="https://example.com/v">https://example.com/v</a>"#));
        assert!(processed.contains("(400×auto)"));
    }

    #[test]
    fn test_unrecognized_macro_keeps_body_only() {
        let html = r#"<ac:structured-macro ac:name="panel"><ac:parameter ac:name="bgColor">red</ac:parameter><ac:rich-text-body><p>Kept</p></ac:rich-text-body></ac:structured-macro>"#;
        assert_eq!(process_confluence_macros(html), "<p>Kept</p>");
    }

    #[test]
    fn test_layout_image_time_and_link() {
        let html = concat!(
            r#"<ac:layout><ac:layout-section ac:type="two_equal"><ac:layout-cell><p>Left</p></ac:layout-cell><ac:layout-cell>"#,
            r#"<p><ac:image ac:width="300" ac:alt="Arch"><ri:attachment ri:filename="arch.png" /></ac:image></p>"#,
            r#"<p>Due <time datetime="2024-05-01" /></p>"#,
            r#"<p>See <ac:link><ri:page ri:content-title="Runbook" /></ac:link></p>"#,
            r#"</ac:layout-cell></ac:layout-section></ac:layout>"#
        );
        let processed = process_confluence_macros(html);
        assert!(processed.starts_with("<p>Left</p><p><img "), "got: {processed}");
        assert!(processed.ends_with("<p>Due 2024-05-01</p><p>See Runbook</p>"));
        assert!(!has_storage_elements(&processed));

        let document = parse_document(&processed);
        let img = first_by_tag(&document, "img").expect("image rewritten");
        assert_eq!(attr(&img, "src").as_deref(), Some("attachment:arch.png"));
        assert_eq!(attr(&img, "width").as_deref(), Some("300"));
        assert_eq!(attr(&img, "alt").as_deref(), Some("Arch"));
    }

    #[test]
    fn test_link_body_wins_over_page_title() {
        let html = r#"<p><ac:link><ri:page ri:content-title="Target" /><ac:plain-text-link-body><![CDATA[click here]]></ac:plain-text-link-body></ac:link></p>"#;
        assert_eq!(process_confluence_macros(html), "<p>click here</p>");
    }

    #[test]
    fn test_rendered_info_macro() {
        let html = r#"<div class="confluence-information-macro" data-macro-name="warning"><p class="title">Stop</p><span class="aui-icon"></span><div class="confluence-information-macro-body"><p>Read first</p></div></div>"#;
        assert_eq!(
            process_confluence_macros(html),
            "<blockquote><p><strong>⚠️ WARNING: Stop</strong></p><p>Read first</p></blockquote>"
        );
    }

    #[test]
    fn test_rendered_info_title_without_body_container() {
        let html = r#"<div class="confluence-information-macro" data-macro-name="info"><p class="title">Heads</p><p>Body</p></div>"#;
        assert_eq!(
            process_confluence_macros(html),
            "<blockquote><p><strong>ℹ️ INFO: Heads</strong></p><p>Body</p></blockquote>"
        );
    }

    #[test]
    fn test_rendered_code_macro_reads_brush() {
        let html = r#"<div class="code panel" data-macro-name="code"><div class="codeContent"><pre class="syntaxhighlighter-pre" data-syntaxhighlighter-params="brush: java; gutter: false">int x = 1 &lt; 2;</pre></div></div>"#;
        assert_eq!(
            process_confluence_macros(html),
            r#"<pre><code class="language-java">int x = 1 &lt; 2;</code></pre>"#
        );
    }

    #[test]
    fn test_rendered_unknown_macro_is_unwrapped() {
        let html = r#"<div data-macro-name="status"><span>DONE</span></div>"#;
        assert_eq!(process_confluence_macros(html), "<span>DONE</span>");
    }

    #[test]
    fn test_expand_container() {
        let html = r#"<div class="expand-container"><div class="expand-control"><span class="expand-control-text">More info</span></div><div class="expand-content"><p>Hidden</p></div></div>"#;
        assert_eq!(
            process_confluence_macros(html),
            "<div><strong>▶ More info</strong><br><br><p>Hidden</p></div>"
        );
    }

    #[test]
    fn test_expand_container_without_title() {
        let html = r#"<div class="expand-container"><div class="expand-content">x</div></div>"#;
        assert!(process_confluence_macros(html).contains("▶ Details"));
    }

    #[test]
    fn test_embedded_file_wrapper() {
        let html = r#"<span class="confluence-embedded-file-wrapper"><img src="/a.png"></span><span class="confluence-embedded-file-wrapper"></span>"#;
        assert_eq!(process_confluence_macros(html), r#"<img src="/a.png">"#);
    }

    #[test]
    fn test_pagetree_with_macro_name_is_removed() {
        let html = r#"<p>before</p><div class="plugin_pagetree" data-macro-name="pagetree"><ul><li>nav</li></ul></div><p>after</p>"#;
        assert_eq!(process_confluence_macros(html), "<p>before</p><p>after</p>");
    }

    #[test]
    fn test_pagetree_and_layouts() {
        let html = r#"<div class="plugin_pagetree"><ul><li>nav</li></ul></div><div class="contentLayout2"><div class="columnLayout"><div class="cell"><div class="innerCell"><p>A</p><p>B</p></div></div></div></div>"#;
        assert_eq!(process_confluence_macros(html), "<p>A</p><p>B</p>");
    }

    #[test]
    fn test_plantuml_svg_becomes_mermaid() {
        let html = r#"<div class="plantuml-svg-image"><svg><g id="n1" class="node"><title>A</title><text>A</text></g><g id="n2" class="node"><title>B</title><text>B</text></g><g class="edge"><title>A-&gt;B</title></g></svg></div>"#;
        let processed = process_confluence_macros(html);
        assert!(processed.starts_with(r#"<pre><code class="language-mermaid">flowchart LR"#));
        assert!(processed.contains("n1 --&gt; n2"));
    }

    #[test]
    fn test_plantuml_without_graph_is_untouched() {
        let html = r#"<div class="plantuml-svg-image"><svg><rect></rect></svg></div>"#;
        assert!(process_confluence_macros(html).contains("plantuml-svg-image"));
    }

    #[test]
    fn test_normalize_leaves_plain_html_alone() {
        let html = "<p>a<br/>b</p>";
        assert_eq!(normalize_storage_markup(html), html);
    }
}
