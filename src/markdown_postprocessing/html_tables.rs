//! Conversion of HTML tables left in the Markdown output.
//!
//! The converter writes every table out as HTML. Each outermost `<table>`
//! outside a code fence is rendered here as a pipe table with a `| --- |`
//! separator, promoting the first row to the header when there is no
//! `<thead>`. Text around the tables is left untouched.

use kuchiki::NodeRef;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use super::table_unescape::unescape_markdown_in_tables;
use crate::error::CleanerResult;
use crate::html_preprocessing::dom::{
    elements_by_tag, first_by_tag, inner_html, is_any_tag, parse_document, replace_with_text,
};
use crate::html_to_markdown::MarkdownConverter;

static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```.*?```").expect("CODE_FENCE_RE: hardcoded regex is valid")
});

/// Opening or closing table tag; group 1 is `/` for a closing tag
static TABLE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(/?)table\b[^>]*>").expect("TABLE_TAG_RE: hardcoded regex is valid")
});

/// Render `<table>` elements remaining in `markdown` as pipe tables
///
/// Falls back to the input (with a warning) on failure.
pub fn convert_remaining_html_tables(markdown: &str) -> String {
    match try_convert_remaining_html_tables(markdown) {
        Ok(converted) => converted,
        Err(e) => {
            tracing::warn!("Remaining table conversion failed: {}, keeping HTML tables", e);
            markdown.to_string()
        }
    }
}

fn try_convert_remaining_html_tables(markdown: &str) -> CleanerResult<String> {
    let spans = table_spans(markdown);
    if spans.is_empty() {
        return Ok(markdown.to_string());
    }
    tracing::debug!("Converting {} remaining HTML tables", spans.len());

    let mut output = String::with_capacity(markdown.len());
    let mut last = 0;
    for span in spans {
        output.push_str(&markdown[last..span.start]);
        output.push_str(&render_fragment(&markdown[span.clone()])?);
        last = span.end;
    }
    output.push_str(&markdown[last..]);
    Ok(output)
}

/// Byte ranges of the outermost tables, skipping tags inside code fences
///
/// An unclosed table is left alone.
fn table_spans(markdown: &str) -> Vec<Range<usize>> {
    if !markdown.to_ascii_lowercase().contains("<table") {
        return Vec::new();
    }
    let fences: Vec<Range<usize>> = CODE_FENCE_RE.find_iter(markdown).map(|m| m.range()).collect();

    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for caps in TABLE_TAG_RE.captures_iter(markdown) {
        let Some(tag) = caps.get(0) else { continue };
        if fences.iter().any(|fence| fence.contains(&tag.start())) {
            continue;
        }
        if caps[1].is_empty() {
            if depth == 0 {
                start = tag.start();
            }
            depth += 1;
        } else if depth > 0 {
            depth -= 1;
            if depth == 0 {
                spans.push(start..tag.end());
            }
        }
    }
    spans
}

/// Pipe table text for one outermost table and everything nested in it
fn render_fragment(html: &str) -> CleanerResult<String> {
    let document = parse_document(html);
    let tables = elements_by_tag(&document, "table");

    // Innermost first so nested tables are already text when the outer one renders
    for table in tables.iter().rev() {
        let rows = render_table(table)?;
        if rows.is_empty() {
            table.detach();
        } else {
            replace_with_text(table, &rows.join("\n"));
        }
    }

    let text = first_by_tag(&document, "body")
        .map(|body| body.text_contents())
        .unwrap_or_default();
    Ok(unescape_markdown_in_tables(text.trim()))
}

/// Pipe table lines for one table; empty when it has no rows
fn render_table(table: &NodeRef) -> CleanerResult<Vec<String>> {
    let mut lines = Vec::new();

    if let Some(thead) = first_by_tag(table, "thead") {
        let mut width = 0;
        for tr in elements_by_tag(&thead, "tr") {
            let cells: Vec<String> = row_cells(&tr).iter().map(cell_text).collect();
            if !cells.is_empty() {
                width = cells.len();
                lines.push(format_row(&cells));
            }
        }
        if width > 0 {
            lines.push(separator_row(width));
        }
    }
    let has_header = !lines.is_empty();

    let tbodies = elements_by_tag(table, "tbody");
    let mut rows: Vec<NodeRef> = if tbodies.is_empty() {
        elements_by_tag(table, "tr")
    } else {
        tbodies
            .iter()
            .flat_map(|tbody| elements_by_tag(tbody, "tr"))
            .collect()
    };

    if !has_header && !rows.is_empty() {
        let header = rows.remove(0);
        let cells: Vec<String> = row_cells(&header).iter().map(cell_text).collect();
        if !cells.is_empty() {
            lines.push(format_row(&cells));
            lines.push(separator_row(cells.len()));
        }
    }

    for tr in &rows {
        let cells = row_cells(tr)
            .iter()
            .map(cell_markdown)
            .collect::<CleanerResult<Vec<_>>>()?;
        if !cells.is_empty() {
            lines.push(format_row(&cells));
        }
    }

    Ok(lines)
}

/// Direct `th`/`td` children of a row
fn row_cells(tr: &NodeRef) -> Vec<NodeRef> {
    tr.children().filter(|n| is_any_tag(n, &["th", "td"])).collect()
}

fn cell_text(cell: &NodeRef) -> String {
    fold_newlines(cell.text_contents().trim())
}

/// Data cell content converted with a plain converter
fn cell_markdown(cell: &NodeRef) -> CleanerResult<String> {
    let html = inner_html(cell)?;
    if html.trim().is_empty() {
        return Ok(cell_text(cell));
    }
    let markdown = MarkdownConverter::new().convert(&html)?;
    Ok(fold_newlines(markdown.trim()))
}

fn fold_newlines(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_row(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

fn separator_row(width: usize) -> String {
    format_row(&vec!["---".to_string(); width])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_path_without_tables() {
        let markdown = "# Title\n\nSome *text* & more";
        assert_eq!(convert_remaining_html_tables(markdown), markdown);
    }

    #[test]
    fn test_first_row_promoted_to_header() {
        let markdown = "<table><tr><td>Name</td><td>Value</td></tr><tr><td>a</td><td><strong>1</strong></td></tr></table>";
        assert_eq!(
            convert_remaining_html_tables(markdown),
            "| Name | Value |\n| --- | --- |\n| a | **1** |"
        );
    }

    #[test]
    fn test_thead_supplies_header() {
        let markdown = "<table><thead><tr><th>H1</th><th>H2</th></tr></thead><tbody><tr><td>x</td><td>y</td></tr></tbody></table>";
        assert_eq!(
            convert_remaining_html_tables(markdown),
            "| H1 | H2 |\n| --- | --- |\n| x | y |"
        );
    }

    #[test]
    fn test_multiline_cells_fold_to_one_line() {
        let markdown = "<table><tr><td>H</td></tr><tr><td><p>one</p><p>two</p></td></tr></table>";
        assert_eq!(
            convert_remaining_html_tables(markdown),
            "| H |\n| --- |\n| one two |"
        );
    }

    #[test]
    fn test_empty_table_removed() {
        assert_eq!(convert_remaining_html_tables("before<table></table>after"), "beforeafter");
    }

    #[test]
    fn test_surrounding_markdown_untouched() {
        let markdown = "# A & B\n\n<table><tr><td>x</td></tr></table>\n\nUse `a < b`";
        assert_eq!(
            convert_remaining_html_tables(markdown),
            "# A & B\n\n| x |\n| --- |\n\nUse `a < b`"
        );
    }

    #[test]
    fn test_nested_table_rendered_once() {
        let markdown = "<table><tr><td>outer</td></tr><tr><td><table><tr><td>inner</td></tr></table></td></tr></table>";
        let converted = convert_remaining_html_tables(markdown);
        assert!(converted.starts_with("| outer |\n| --- |"), "got: {converted}");
        assert!(!converted.contains("<table"));
    }

    #[test]
    fn test_unclosed_table_left_alone() {
        let markdown = "text <table><tr><td>x";
        assert_eq!(convert_remaining_html_tables(markdown), markdown);
    }

    #[test]
    fn test_escaped_image_in_cell_is_restored() {
        let markdown = "<table><tr><td>Team</td></tr><tr><td>![Team](/download/team.png)</td></tr></table>";
        assert_eq!(
            convert_remaining_html_tables(markdown),
            "| Team |\n| --- |\n| ![Team](/download/team.png) |"
        );
    }

    #[test]
    fn test_tables_inside_code_fences_untouched() {
        let markdown = "```html\n<table><tr><td>a > b</td></tr></table>\n```\n\n<table><tr><td>x</td></tr></table>";
        assert_eq!(
            convert_remaining_html_tables(markdown),
            "```html\n<table><tr><td>a > b</td></tr></table>\n```\n\n| x |\n| --- |"
        );
    }
}
