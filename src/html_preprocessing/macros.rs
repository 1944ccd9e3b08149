//! Confluence macro model and rendering.
//!
//! A macro occurrence, whichever markup it came from, is reduced to a
//! [`MacroDescriptor`]: its kind, its named parameters and its body. Rendering a
//! descriptor yields plain HTML that the Markdown converter already knows how
//! to handle (blockquotes, fenced code, links, paragraphs).

use html_escape::{encode_double_quoted_attribute, encode_text};
use std::collections::BTreeMap;

use super::dom::parse_document;

/// Recognized macro names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroKind {
    Info,
    Warning,
    Note,
    Tip,
    /// `code` and `noformat`
    Code,
    Toc,
    Include,
    Expand,
    NewWindowLink,
    Widget,
    LinkGraph,
    /// Any other macro name, lowercased
    Unrecognized(String),
}

impl MacroKind {
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "info" => Self::Info,
            "warning" => Self::Warning,
            "note" => Self::Note,
            "tip" => Self::Tip,
            "code" | "noformat" => Self::Code,
            "toc" => Self::Toc,
            "include" => Self::Include,
            "expand" => Self::Expand,
            "new_window_link" => Self::NewWindowLink,
            "widget" => Self::Widget,
            "linkgraph" => Self::LinkGraph,
            _ => Self::Unrecognized(name),
        }
    }

    /// Bold prefix for the four admonition macros
    pub fn admonition_label(&self) -> Option<&'static str> {
        match self {
            Self::Info => Some("ℹ️ INFO"),
            Self::Warning => Some("⚠️ WARNING"),
            Self::Note => Some("📝 NOTE"),
            Self::Tip => Some("💡 TIP"),
            _ => None,
        }
    }

    pub fn is_admonition(&self) -> bool {
        self.admonition_label().is_some()
    }
}

/// Macro body as found in the markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroBody {
    /// Nested HTML (`ac:rich-text-body` or rendered content)
    Rich(String),
    /// Literal text (`ac:plain-text-body`, code blocks)
    Plain(String),
    Empty,
}

impl MacroBody {
    /// Body as HTML, escaping plain text
    pub fn to_html(&self) -> String {
        match self {
            Self::Rich(html) => html.clone(),
            Self::Plain(text) => encode_text(text).into_owned(),
            Self::Empty => String::new(),
        }
    }

    /// Body as text, dropping markup from rich bodies
    pub fn to_text(&self) -> String {
        match self {
            Self::Rich(html) => parse_document(html).text_contents(),
            Self::Plain(text) => text.clone(),
            Self::Empty => String::new(),
        }
    }
}

/// One macro occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDescriptor {
    pub kind: MacroKind,
    pub parameters: BTreeMap<String, String>,
    pub body: MacroBody,
}

impl MacroDescriptor {
    pub fn new(kind: MacroKind, body: MacroBody) -> Self {
        Self {
            kind,
            parameters: BTreeMap::new(),
            body,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.insert(name.to_string(), value.to_string());
        self
    }

    /// Trimmed, non-empty parameter value
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// First non-empty value among `names`
    fn first_parameter(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.parameter(name))
    }

    /// Rewrite the macro as plain HTML
    pub fn render(&self) -> String {
        match &self.kind {
            MacroKind::Info | MacroKind::Warning | MacroKind::Note | MacroKind::Tip => {
                self.render_admonition()
            }
            MacroKind::Code => self.render_code(),
            MacroKind::Toc => String::new(),
            MacroKind::Include => self.render_include(),
            MacroKind::Expand => render_expand(self.parameter("title"), &self.body.to_html()),
            MacroKind::NewWindowLink => self.render_new_window_link(),
            MacroKind::Widget => self.render_widget(),
            MacroKind::LinkGraph => self.render_link_graph(),
            MacroKind::Unrecognized(_) => self.body.to_html(),
        }
    }

    fn render_admonition(&self) -> String {
        let label = self.kind.admonition_label().unwrap_or_default();
        let heading = match self.parameter("title") {
            Some(title) => format!("{label}: {}", encode_text(title)),
            None => label.to_string(),
        };
        let body = match &self.body {
            MacroBody::Plain(text) => format!("<p>{}</p>", encode_text(text.trim())),
            body => body.to_html(),
        };
        format!("<blockquote><p><strong>{heading}</strong></p>{body}</blockquote>")
    }

    fn render_code(&self) -> String {
        let code = encode_text(&self.body.to_text()).into_owned();
        render_code_block(self.parameter("language"), &code)
    }

    fn render_include(&self) -> String {
        match self.first_parameter(&["", "title", "page"]) {
            Some(title) => format!("<p>📄 Included page: {}</p>", encode_text(title)),
            None => match self.first_parameter(&["spaceKey", "space"]) {
                Some(space) => format!("<p>📄 Included page: {}</p>", encode_text(space)),
                None => "<p>📄 Included page</p>".to_string(),
            },
        }
    }

    fn render_new_window_link(&self) -> String {
        let body_text = self.body.to_text();
        let body_text = body_text.trim();
        let link = self.parameter("link");
        let text = self
            .parameter("body")
            .or((!body_text.is_empty()).then_some(body_text))
            .or(link)
            .unwrap_or_default();

        match link {
            Some(link) => format!(
                r#"<a href="{}">{}</a>"#,
                encode_double_quoted_attribute(link),
                encode_text(text)
            ),
            None => encode_text(text).into_owned(),
        }
    }

    fn render_widget(&self) -> String {
        let mut html = String::from("<p>🧩 Widget");
        if let Some(url) = self.first_parameter(&["url", ""]) {
            html.push_str(&format!(
                r#": <a href="{}">{}</a>"#,
                encode_double_quoted_attribute(url),
                encode_text(url)
            ));
        }
        let width = self.parameter("width");
        let height = self.parameter("height");
        if width.is_some() || height.is_some() {
            html.push_str(&format!(
                " ({}×{})",
                encode_text(width.unwrap_or("auto")),
                encode_text(height.unwrap_or("auto"))
            ));
        }
        html.push_str("</p>");
        html
    }

    fn render_link_graph(&self) -> String {
        let mut parts = Vec::new();
        if let Some(space) = self.first_parameter(&["spaceKey", "space"]) {
            parts.push(format!("space: {}", encode_text(space)));
        }
        if let Some(labels) = self.first_parameter(&["labels", "label"]) {
            parts.push(format!("labels: {}", encode_text(labels)));
        }
        if parts.is_empty() {
            "<p>🔗 Link graph</p>".to_string()
        } else {
            format!("<p>🔗 Link graph ({})</p>", parts.join(", "))
        }
    }
}

/// `<pre><code>` block; `code` must already be escaped
pub(crate) fn render_code_block(language: Option<&str>, code: &str) -> String {
    match language {
        Some(language) => format!(
            r#"<pre><code class="language-{}">{code}</code></pre>"#,
            encode_double_quoted_attribute(language)
        ),
        None => format!("<pre><code>{code}</code></pre>"),
    }
}

/// Disclosure block with a bold `▶ title` marker; `body` is HTML
pub(crate) fn render_expand(title: Option<&str>, body: &str) -> String {
    let title = title.map(str::trim).filter(|t| !t.is_empty()).unwrap_or("Details");
    format!(
        "<div><strong>▶ {}</strong><br><br>{body}</div>",
        encode_text(title)
    )
}

/// Render a single macro from its type name and body
///
/// `content` is HTML for rich macros and literal text for `code`. The optional
/// `language` tags code blocks. Types without a rewrite return `content.trim()`.
pub fn expand_macro(macro_type: &str, content: &str, language: Option<&str>) -> String {
    let kind = MacroKind::from_name(macro_type);
    let body = match kind {
        MacroKind::Unrecognized(_) => return content.trim().to_string(),
        MacroKind::Code => MacroBody::Plain(content.to_string()),
        _ if content.trim().is_empty() => MacroBody::Empty,
        _ => MacroBody::Rich(content.trim().to_string()),
    };
    let mut descriptor = MacroDescriptor::new(kind, body);
    if let Some(language) = language {
        descriptor = descriptor.with_parameter("language", language);
    }
    descriptor.render()
}
