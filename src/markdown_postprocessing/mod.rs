//! String-level repairs applied to the converter's Markdown output.
//!
//! Applied in this order by [`crate::clean_confluence_html`]:
//!
//! 1. [`unescape_markdown_in_tables`]: image/link syntax inside pipe table rows
//! 2. [`convert_remaining_html_tables`]: HTML tables the converter passed through
//!    (only when table conversion is enabled)
//! 3. [`unescape_markdown`]: backslash escapes that add noise for LLM readers
//! 4. [`decode_html_entities`]: entities left in text and URLs

mod entity_decoding;
mod html_tables;
mod markdown_unescape;
mod table_unescape;

pub use entity_decoding::decode_html_entities;
pub use html_tables::convert_remaining_html_tables;
pub use markdown_unescape::unescape_markdown;
pub use table_unescape::unescape_markdown_in_tables;
