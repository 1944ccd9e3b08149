//! Confluence HTML to LLM-friendly Markdown.
//!
//! [`clean_confluence_html`] runs the whole pipeline:
//!
//! 1. HTML preprocessing ([`html_preprocessing`]): macro and layout expansion,
//!    metadata removal, table cell flattening
//! 2. HTML to Markdown conversion ([`html_to_markdown`])
//! 3. Markdown postprocessing ([`markdown_postprocessing`])
//!
//! Every stage is total. A stage that fails logs a warning and passes its
//! input through; if the pipeline as a whole fails or panics, the original
//! HTML is returned.

pub mod custom_handlers;
pub mod error;
pub mod html_preprocessing;
pub mod html_to_markdown;
pub mod markdown_postprocessing;
pub mod options;
pub mod token_estimator;

pub use error::{CleanerError, CleanerResult};
pub use html_preprocessing::{
    DiagramGraph, MacroKind, convert_svg_to_mermaid, expand_macro, normalize_table_cells,
    process_confluence_macros, remove_confluence_metadata,
};
pub use html_to_markdown::{MarkdownConverter, converter_for};
pub use markdown_postprocessing::{
    convert_remaining_html_tables, decode_html_entities, unescape_markdown,
    unescape_markdown_in_tables,
};
pub use options::CleanerOptions;
pub use token_estimator::{calculate_token_reduction, estimate_tokens, format_token_reduction};

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

/// Convert Confluence HTML into Markdown
///
/// Empty or whitespace-only input yields an empty string. Any internal error
/// or panic is logged and the original `html` is returned unchanged.
pub fn clean_confluence_html(html: &str, options: &CleanerOptions) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let outcome = catch_unwind(AssertUnwindSafe(|| run_pipeline(html, options)))
        .unwrap_or_else(|payload| Err(CleanerError::from_panic(payload.as_ref())));

    match outcome {
        Ok(markdown) => markdown,
        Err(e) => {
            tracing::error!("HTML to Markdown conversion failed: {}", e);
            html.to_string()
        }
    }
}

/// [`clean_confluence_html`] on tokio's blocking pool
pub async fn clean_confluence_html_async(html: String, options: CleanerOptions) -> String {
    let fallback = html.clone();
    match tokio::task::spawn_blocking(move || clean_confluence_html(&html, &options)).await {
        Ok(markdown) => markdown,
        Err(e) => {
            tracing::error!("Cleaning task failed: {}", e);
            fallback
        }
    }
}

fn run_pipeline(html: &str, options: &CleanerOptions) -> CleanerResult<String> {
    let start = Instant::now();
    let mut cleaned = html.to_string();

    // Macro detection reads class/data attributes, so it runs before metadata removal
    if options.expand_macros {
        cleaned = process_confluence_macros(&cleaned);
    }
    if options.remove_metadata {
        cleaned = remove_confluence_metadata(&cleaned);
    }
    if options.convert_tables {
        cleaned = normalize_table_cells(&cleaned);
    }

    let converter = MarkdownConverter::new().with_convert_tables(options.convert_tables);
    let mut markdown = converter.convert(&cleaned)?;

    markdown = unescape_markdown_in_tables(&markdown);
    if options.convert_tables {
        markdown = convert_remaining_html_tables(&markdown);
    }
    markdown = unescape_markdown(&markdown);
    markdown = decode_html_entities(&markdown);

    tracing::debug!(
        "Cleaned {} bytes of HTML into {} bytes of Markdown in {:?}",
        html.len(),
        markdown.len(),
        start.elapsed()
    );

    Ok(markdown)
}
