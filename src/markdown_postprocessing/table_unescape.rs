//! Unescaping of image and link syntax inside pipe table rows.
//!
//! Cell images are written as literal `![alt](src)` text before conversion,
//! and the converter escapes the brackets and parentheses like any other
//! text. Only table rows are touched.

/// Escape sequences undone on table rows, applied in order
const TABLE_ESCAPES: &[(&str, &str)] = &[
    ("!\\[", "!["),
    ("\\](", "]("),
    ("\\)", ")"),
    ("\\[", "["),
    ("\\]", "]"),
];

/// Undo bracket/parenthesis escaping on lines whose trimmed start is `|`
pub fn unescape_markdown_in_tables(markdown: &str) -> String {
    if !markdown.contains('|') || !markdown.contains('\\') {
        return markdown.to_string();
    }

    markdown
        .split('\n')
        .map(|line| {
            if line.trim_start().starts_with('|') {
                unescape_row(line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_row(line: &str) -> String {
    TABLE_ESCAPES
        .iter()
        .fold(line.to_string(), |row, (escaped, plain)| row.replace(escaped, plain))
}
