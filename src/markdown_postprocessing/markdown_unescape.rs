//! Removal of the converter's defensive backslash escapes.
//!
//! The converter escapes Markdown punctuation anywhere it could start
//! formatting (`ja\_JP`, `1\. item`, `\- note`). The output is read as text by
//! a model, not rendered, so the escapes are pure noise.

const ESCAPES: &[(&str, &str)] = &[
    ("\\_", "_"),
    ("\\-", "-"),
    ("\\*", "*"),
    ("\\#", "#"),
    ("\\.", "."),
    ("\\!", "!"),
];

/// Replace `\_ \- \* \# \. \!` with the bare character everywhere
pub fn unescape_markdown(markdown: &str) -> String {
    if !markdown.contains('\\') {
        return markdown.to_string();
    }
    ESCAPES
        .iter()
        .fold(markdown.to_string(), |text, (escaped, plain)| text.replace(escaped, plain))
}
