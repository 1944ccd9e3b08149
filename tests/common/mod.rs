//! Shared helpers for the integration tests

use confluence_cleaner::{CleanerOptions, clean_confluence_html};

/// Clean with every stage enabled
#[allow(dead_code)]
pub fn clean(html: &str) -> String {
    clean_confluence_html(html, &CleanerOptions::default())
}

/// Whether some list item line holds exactly `text` after its `-` marker
///
/// Independent of how many spaces follow the marker.
#[allow(dead_code)]
pub fn has_bullet(markdown: &str, text: &str) -> bool {
    markdown.lines().any(|line| {
        line.trim_start()
            .strip_prefix('-')
            .is_some_and(|rest| rest.trim() == text)
    })
}

/// Whether some pipe table row contains every one of `cells`
///
/// Column padding is ignored, so this works for aligned and compact tables.
#[allow(dead_code)]
pub fn has_table_row(markdown: &str, cells: &[&str]) -> bool {
    markdown.lines().any(|line| {
        let line = line.trim();
        line.starts_with('|')
            && line.ends_with('|')
            && cells.iter().all(|cell| {
                line.split('|')
                    .map(str::trim)
                    .any(|column| column == *cell)
            })
    })
}

/// Whether the Markdown has a pipe table separator row (`| --- |`, `|:---|`, ...)
#[allow(dead_code)]
pub fn has_separator_row(markdown: &str) -> bool {
    markdown.lines().any(|line| {
        let line = line.trim();
        line.starts_with('|')
            && line.contains('-')
            && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
    })
}
